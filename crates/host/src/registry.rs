//! Persistent device registry
//!
//! Identity-keyed store of previously seen devices, used for
//! deduplication and type caching. Records are created on first attach,
//! get their type once classification completes, have their timestamp
//! refreshed on every re-attach, and are deleted only by explicit user
//! action; the registry never auto-expires entries.

use aoap::{ClassificationResult, DeviceIdentity, DeviceKey};
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use common::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use tracing::{debug, info};

/// Stored timestamp format, UTC with second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One registry row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRecord {
    /// Stable dedup key (serial number, else vendor:product:path).
    pub key: DeviceKey,
    pub device_name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    /// Stored classification, `"NA"` until classification succeeds.
    pub device_type: String,
    /// Last attach time, UTC, second precision.
    pub attached_at: DateTime<Utc>,
}

impl RegistryRecord {
    /// Fresh unclassified record for a just-attached identity.
    pub fn new(identity: &DeviceIdentity) -> Self {
        Self {
            key: identity.key(),
            device_name: identity.device_name.clone(),
            vendor_id: identity.vendor_id,
            product_id: identity.product_id,
            serial_number: identity.serial_number.clone(),
            manufacturer: identity.manufacturer.clone(),
            product_name: identity.product.clone(),
            device_type: ClassificationResult::UNCLASSIFIED.to_string(),
            attached_at: Utc::now().trunc_subsecs(0),
        }
    }

    /// Whether this record still awaits a classification result.
    pub fn is_unclassified(&self) -> bool {
        self.device_type == ClassificationResult::UNCLASSIFIED
    }
}

/// Identity-keyed record store consumed by the orchestrator.
///
/// `update_*` and `delete` return the number of affected rows so
/// callers can report a missing key.
pub trait DeviceRegistry {
    fn lookup(&self, key: &DeviceKey) -> Result<Option<RegistryRecord>>;
    /// Insert a record. Re-inserting an existing key must not create a
    /// second row; it refreshes only the timestamp.
    fn insert(&self, record: &RegistryRecord) -> Result<()>;
    fn update_type(&self, key: &DeviceKey, device_type: ClassificationResult) -> Result<usize>;
    fn update_timestamp(&self, key: &DeviceKey) -> Result<usize>;
    fn delete(&self, key: &DeviceKey) -> Result<usize>;
    /// All records in insertion order.
    fn list_all(&self) -> Result<Vec<RegistryRecord>>;
}

/// SQLite-backed registry.
pub struct SqliteRegistry {
    conn: Connection,
}

impl SqliteRegistry {
    /// Open (and create if needed) the registry database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(map_sql_err)?;
        Self::init_schema(&conn)?;
        info!("device registry opened at {}", path.display());
        Ok(Self { conn })
    }

    /// Ephemeral in-memory registry, used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(map_sql_err)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS usb_devices (
                sr_no INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE,
                device_name TEXT NOT NULL,
                vendor_id INTEGER NOT NULL,
                product_id INTEGER NOT NULL,
                serial_number TEXT,
                manufacturer TEXT,
                product_name TEXT,
                device_type TEXT NOT NULL DEFAULT 'NA',
                date_time TEXT NOT NULL
            )",
            [],
        )
        .map_err(map_sql_err)?;
        Ok(())
    }

    fn now_string() -> String {
        Utc::now().format(TIMESTAMP_FORMAT).to_string()
    }
}

const RECORD_COLUMNS: &str = "key, device_name, vendor_id, product_id, serial_number, \
                              manufacturer, product_name, device_type, date_time";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<RegistryRecord> {
    let stamp: String = row.get(8)?;
    let attached_at = NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?
        .and_utc();

    Ok(RegistryRecord {
        key: DeviceKey::new(row.get::<_, String>(0)?),
        device_name: row.get(1)?,
        vendor_id: row.get(2)?,
        product_id: row.get(3)?,
        serial_number: row.get(4)?,
        manufacturer: row.get(5)?,
        product_name: row.get(6)?,
        device_type: row.get(7)?,
        attached_at,
    })
}

fn map_sql_err(e: rusqlite::Error) -> Error {
    Error::Registry(e.to_string())
}

impl DeviceRegistry for SqliteRegistry {
    fn lookup(&self, key: &DeviceKey) -> Result<Option<RegistryRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM usb_devices WHERE key = ?1"),
                params![key.as_str()],
                row_to_record,
            )
            .optional()
            .map_err(map_sql_err)
    }

    fn insert(&self, record: &RegistryRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO usb_devices (key, device_name, vendor_id, product_id, \
                 serial_number, manufacturer, product_name, device_type, date_time) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                 ON CONFLICT(key) DO UPDATE SET date_time = excluded.date_time",
                params![
                    record.key.as_str(),
                    record.device_name,
                    record.vendor_id,
                    record.product_id,
                    record.serial_number,
                    record.manufacturer,
                    record.product_name,
                    record.device_type,
                    record.attached_at.format(TIMESTAMP_FORMAT).to_string(),
                ],
            )
            .map_err(map_sql_err)?;
        debug!("registry insert for key {}", record.key);
        Ok(())
    }

    fn update_type(&self, key: &DeviceKey, device_type: ClassificationResult) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE usb_devices SET device_type = ?2 WHERE key = ?1",
                params![key.as_str(), device_type.as_str()],
            )
            .map_err(map_sql_err)
    }

    fn update_timestamp(&self, key: &DeviceKey) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE usb_devices SET date_time = ?2 WHERE key = ?1",
                params![key.as_str(), Self::now_string()],
            )
            .map_err(map_sql_err)
    }

    fn delete(&self, key: &DeviceKey) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM usb_devices WHERE key = ?1",
                params![key.as_str()],
            )
            .map_err(map_sql_err)
    }

    fn list_all(&self) -> Result<Vec<RegistryRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM usb_devices ORDER BY sr_no"
            ))
            .map_err(map_sql_err)?;

        let rows = stmt
            .query_map([], row_to_record)
            .map_err(map_sql_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_sql_err)?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(serial: Option<&str>) -> DeviceIdentity {
        DeviceIdentity {
            serial_number: serial.map(String::from),
            ..DeviceIdentity::new(0x04E8, 0x6860, "/dev/bus/usb/001/004")
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let registry = SqliteRegistry::in_memory().unwrap();
        let record = RegistryRecord::new(&identity(Some("SER123")));

        registry.insert(&record).unwrap();
        let found = registry.lookup(&record.key).unwrap().unwrap();
        assert_eq!(found, record);
        assert!(found.is_unclassified());
    }

    #[test]
    fn test_lookup_missing_key() {
        let registry = SqliteRegistry::in_memory().unwrap();
        assert!(registry.lookup(&DeviceKey::new("nope")).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_keeps_single_row() {
        let registry = SqliteRegistry::in_memory().unwrap();
        let record = RegistryRecord::new(&identity(Some("SER123")));

        registry.insert(&record).unwrap();
        registry
            .update_type(&record.key, ClassificationResult::CarPlayCompanion)
            .unwrap();

        // Second insert of the same identity: one row, type untouched.
        registry.insert(&record).unwrap();
        let all = registry.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].device_type, "carplay");
    }

    #[test]
    fn test_update_type_rows_affected() {
        let registry = SqliteRegistry::in_memory().unwrap();
        let record = RegistryRecord::new(&identity(None));
        registry.insert(&record).unwrap();

        let rows = registry
            .update_type(&record.key, ClassificationResult::Unsupported)
            .unwrap();
        assert_eq!(rows, 1);

        let rows = registry
            .update_type(&DeviceKey::new("absent"), ClassificationResult::Unknown)
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn test_update_timestamp_touches_only_timestamp() {
        let registry = SqliteRegistry::in_memory().unwrap();
        let record = RegistryRecord::new(&identity(Some("SER999")));
        registry.insert(&record).unwrap();
        registry
            .update_type(&record.key, ClassificationResult::AndroidAccessoryNegotiated)
            .unwrap();

        assert_eq!(registry.update_timestamp(&record.key).unwrap(), 1);
        let found = registry.lookup(&record.key).unwrap().unwrap();
        assert_eq!(found.device_type, "negotiated");
    }

    #[test]
    fn test_delete() {
        let registry = SqliteRegistry::in_memory().unwrap();
        let record = RegistryRecord::new(&identity(Some("GONE")));
        registry.insert(&record).unwrap();

        assert_eq!(registry.delete(&record.key).unwrap(), 1);
        assert_eq!(registry.delete(&record.key).unwrap(), 0);
        assert!(registry.lookup(&record.key).unwrap().is_none());
    }

    #[test]
    fn test_list_all_insertion_order() {
        let registry = SqliteRegistry::in_memory().unwrap();
        for serial in ["A", "B", "C"] {
            registry
                .insert(&RegistryRecord::new(&identity(Some(serial))))
                .unwrap();
        }

        let keys: Vec<String> = registry
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| r.key.as_str().to_string())
            .collect();
        assert_eq!(keys, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_timestamp_round_trip_second_precision() {
        let registry = SqliteRegistry::in_memory().unwrap();
        let record = RegistryRecord::new(&identity(Some("TS")));
        registry.insert(&record).unwrap();

        let found = registry.lookup(&record.key).unwrap().unwrap();
        assert_eq!(found.attached_at, record.attached_at);
        assert_eq!(found.attached_at.timestamp_subsec_nanos(), 0);
    }
}
