//! aoap-host
//!
//! Daemon that watches the USB bus, negotiates accessory mode with
//! capable peripherals via the AOAP control-transfer handshake, and
//! keeps a deduplicated registry of every device it has seen.

use anyhow::{Context as _, Result};
use clap::Parser;
use common::{MonitorCommand, create_usb_bridge, setup_logging};
use host::config::HostConfig;
use host::orchestrator::AttachmentOrchestrator;
use host::permission::HostPermissionBroker;
use host::registry::{DeviceRegistry, SqliteRegistry};
use host::usb::{RusbOpener, spawn_usb_monitor};
use tokio::signal;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "aoap-host")]
#[command(
    author,
    version,
    about = "AOAP accessory host - negotiate USB accessory mode and track devices"
)]
#[command(long_about = "
Watches the USB bus for attached devices, classifies each one (CarPlay
companion, active accessory, accessory-capable, unsupported) and drives
the accessory-mode handshake where applicable. Seen devices are kept in
a persistent registry keyed by stable identity.

EXAMPLES:
    # Run with default config
    aoap-host

    # Run with custom config
    aoap-host --config /path/to/host.toml

    # Show every registered device
    aoap-host --list-devices

    # Remove one device from the registry by its key
    aoap-host --forget R58M123ABC

CONFIGURATION:
    The host looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/aoap-host/host.toml
    3. /etc/aoap-host/host.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List registered devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Delete the registry record with this dedup key and exit
    #[arg(long, value_name = "KEY")]
    forget: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = HostConfig::default();
        let path = HostConfig::default_path();
        config.save(&path).context("failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        HostConfig::load(Some(path.clone())).context("failed to load configuration")?
    } else {
        HostConfig::load_or_default()
    };

    let log_level = args.log_level.as_deref().unwrap_or(&config.host.log_level);
    setup_logging(log_level).context("failed to setup logging")?;

    info!("aoap-host v{}", env!("CARGO_PKG_VERSION"));

    let registry = SqliteRegistry::open(&config.registry.path)
        .with_context(|| format!("failed to open registry at {}", config.registry.path.display()))?;

    if args.list_devices {
        return list_devices_mode(&registry);
    }

    if let Some(key) = args.forget {
        return forget_mode(&registry, &key);
    }

    let context = rusb::Context::new().context("failed to initialize libusb")?;

    let (bridge, worker) = create_usb_bridge();
    let monitor_handle = spawn_usb_monitor(context.clone(), worker)
        .context("failed to start the USB monitor")?;

    let orchestrator = AttachmentOrchestrator::new(
        registry,
        HostPermissionBroker::new(context.clone()),
        RusbOpener::new(context),
        config.accessory.clone().into(),
    );
    let events = bridge.event_rx.clone();
    let orchestrator_handle = std::thread::spawn(move || orchestrator.run(events));

    info!("watching for USB attachments, press Ctrl+C to stop");
    signal::ctrl_c().await.context("failed to wait for Ctrl+C")?;

    info!("shutting down");
    let _ = bridge.command_tx.send(MonitorCommand::Shutdown).await;
    monitor_handle
        .join()
        .map_err(|_| anyhow::anyhow!("USB monitor thread panicked"))?;
    // The monitor held the last event sender; the orchestrator loop
    // drains and exits once it is gone.
    orchestrator_handle
        .join()
        .map_err(|_| anyhow::anyhow!("orchestrator thread panicked"))?;

    Ok(())
}

fn list_devices_mode(registry: &SqliteRegistry) -> Result<()> {
    let records = registry.list_all().context("failed to read the registry")?;

    if records.is_empty() {
        println!("No devices registered.");
        return Ok(());
    }

    println!(
        "{:<28} {:<9} {:<12} {:<20} KEY",
        "PRODUCT", "VID:PID", "TYPE", "LAST ATTACHED"
    );
    for record in records {
        println!(
            "{:<28} {:04x}:{:04x} {:<12} {:<20} {}",
            record.product_name.as_deref().unwrap_or("-"),
            record.vendor_id,
            record.product_id,
            record.device_type,
            record.attached_at.format("%Y-%m-%d %H:%M:%S"),
            record.key
        );
    }

    Ok(())
}

fn forget_mode(registry: &SqliteRegistry, key: &str) -> Result<()> {
    let deleted = registry
        .delete(&aoap::DeviceKey::new(key))
        .context("failed to delete from the registry")?;

    if deleted > 0 {
        println!("Removed {} record(s) for key {}", deleted, key);
    } else {
        println!("No record found for key {}", key);
    }

    Ok(())
}
