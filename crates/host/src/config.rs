//! Host configuration management

use anyhow::{Context, Result, anyhow};
use aoap::AccessoryStrings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSettings,
    #[serde(default)]
    pub registry: RegistrySettings,
    /// Identifying strings advertised during accessory negotiation
    #[serde(default)]
    pub accessory: AccessorySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSettings {
    #[serde(default = "HostSettings::default_log_level")]
    pub log_level: String,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

impl HostSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Path of the SQLite device registry
    #[serde(default = "RegistrySettings::default_db_path")]
    pub path: PathBuf,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            path: Self::default_db_path(),
        }
    }
}

impl RegistrySettings {
    fn default_db_path() -> PathBuf {
        if let Some(data_dir) = dirs::data_local_dir() {
            data_dir.join("aoap-host").join("usb_devices.db")
        } else {
            PathBuf::from("/var/lib/aoap-host/usb_devices.db")
        }
    }
}

/// The six identifying strings sent during the handshake.
///
/// The protocol only requires well-formed strings, not real metadata;
/// the defaults are the values the start sequence has always used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessorySettings {
    #[serde(default = "AccessorySettings::default_manufacturer")]
    pub manufacturer: String,
    #[serde(default = "AccessorySettings::default_model")]
    pub model: String,
    #[serde(default = "AccessorySettings::default_description")]
    pub description: String,
    #[serde(default = "AccessorySettings::default_version")]
    pub version: String,
    #[serde(default = "AccessorySettings::default_uri")]
    pub uri: String,
    #[serde(default = "AccessorySettings::default_serial")]
    pub serial: String,
}

impl Default for AccessorySettings {
    fn default() -> Self {
        Self {
            manufacturer: Self::default_manufacturer(),
            model: Self::default_model(),
            description: Self::default_description(),
            version: Self::default_version(),
            uri: Self::default_uri(),
            serial: Self::default_serial(),
        }
    }
}

impl AccessorySettings {
    fn default_manufacturer() -> String {
        "Manufacturer".to_string()
    }
    fn default_model() -> String {
        "Model".to_string()
    }
    fn default_description() -> String {
        "Description".to_string()
    }
    fn default_version() -> String {
        "1.0".to_string()
    }
    fn default_uri() -> String {
        "https://www.android.com/auto".to_string()
    }
    fn default_serial() -> String {
        "1234".to_string()
    }
}

impl From<AccessorySettings> for AccessoryStrings {
    fn from(settings: AccessorySettings) -> Self {
        AccessoryStrings {
            manufacturer: settings.manufacturer,
            model: settings.model,
            description: settings.description,
            version: settings.version,
            uri: settings.uri,
            serial: settings.serial,
        }
    }
}

impl HostConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidates = vec![Self::default_path(), PathBuf::from("/etc/aoap-host/host.toml")];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("no configuration file found"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read config file: {}", config_path.display()))?;

        let config: HostConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;

        tracing::info!("saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("aoap-host").join("host.toml")
        } else {
            PathBuf::from(".config/aoap-host/host.toml")
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.host.log_level.as_str()) {
            return Err(anyhow!(
                "invalid log level '{}', must be one of: {}",
                self.host.log_level,
                valid_levels.join(", ")
            ));
        }

        for (name, value) in [
            ("manufacturer", &self.accessory.manufacturer),
            ("model", &self.accessory.model),
            ("version", &self.accessory.version),
        ] {
            if value.is_empty() {
                return Err(anyhow!("accessory.{} must not be empty", name));
            }
        }

        Ok(())
    }
}
