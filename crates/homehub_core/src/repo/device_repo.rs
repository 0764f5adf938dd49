//! Device repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist new devices and power/detail mutations.
//! - List devices owned by one family.
//!
//! # Invariants
//! - Creation is a single INSERT: the row fully exists afterwards or not at
//!   all. Name collisions surface as `DuplicateDeviceName`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::model::device::{Device, DeviceDetailsUpdate, PowerState};
use crate::model::family::FamilyId;
use crate::repo::membership_repo::{constraint_kind, ConstraintKind, RepoError, RepoResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};

const WARRANTY_DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) const DEVICE_SELECT_SQL: &str = "SELECT
    device_name,
    family_id,
    created_by,
    created_time,
    warranty_expiration,
    power_state
FROM devices";

/// Repository interface for device mutations and family listings.
pub trait DeviceRepository {
    fn create_device(&self, device: &Device) -> RepoResult<()>;
    /// Stores the given power state; writing the current state again is a no-op success.
    fn set_power_state(&self, device_name: &str, state: PowerState) -> RepoResult<()>;
    fn update_details(&self, device_name: &str, update: &DeviceDetailsUpdate) -> RepoResult<()>;
    /// Lists devices owned by the family, ordered by name.
    fn list_devices_for_family(&self, family_id: FamilyId) -> RepoResult<Vec<Device>>;
}

/// SQLite-backed device repository.
pub struct SqliteDeviceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDeviceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DeviceRepository for SqliteDeviceRepository<'_> {
    fn create_device(&self, device: &Device) -> RepoResult<()> {
        crate::model::device::validate_device_name(&device.device_name)?;

        let inserted = self.conn.execute(
            "INSERT INTO devices (
                device_name,
                family_id,
                created_by,
                created_time,
                warranty_expiration,
                power_state
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                device.device_name.as_str(),
                device.family_id.map(|id| id.0),
                device.created_by.as_str(),
                device.created_time.timestamp_millis(),
                device.warranty_expiration.map(format_warranty),
                device.power_state.as_str(),
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(err) => Err(match constraint_kind(&err) {
                Some(ConstraintKind::Unique) => {
                    RepoError::DuplicateDeviceName(device.device_name.clone())
                }
                Some(ConstraintKind::ForeignKey) => match device.family_id {
                    Some(id) => RepoError::FamilyNotFound(id),
                    None => RepoError::from(err),
                },
                _ => RepoError::from(err),
            }),
        }
    }

    fn set_power_state(&self, device_name: &str, state: PowerState) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE devices SET power_state = ?1 WHERE device_name = ?2;",
            params![state.as_str(), device_name],
        )?;

        if changed == 0 {
            return Err(RepoError::DeviceNotFound(device_name.to_string()));
        }

        Ok(())
    }

    fn update_details(&self, device_name: &str, update: &DeviceDetailsUpdate) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE devices SET warranty_expiration = ?1 WHERE device_name = ?2;",
            params![update.warranty_expiration.map(format_warranty), device_name],
        )?;

        if changed == 0 {
            return Err(RepoError::DeviceNotFound(device_name.to_string()));
        }

        Ok(())
    }

    fn list_devices_for_family(&self, family_id: FamilyId) -> RepoResult<Vec<Device>> {
        let mut stmt = self.conn.prepare(&format!(
            "{DEVICE_SELECT_SQL}
             WHERE family_id = ?1
             ORDER BY device_name ASC;"
        ))?;
        let mut rows = stmt.query(params![family_id.0])?;
        let mut devices = Vec::new();

        while let Some(row) = rows.next()? {
            devices.push(parse_device_row(row)?);
        }

        Ok(devices)
    }
}

pub(crate) fn parse_device_row(row: &Row<'_>) -> RepoResult<Device> {
    let device_name: String = row.get("device_name")?;

    let created_ms: i64 = row.get("created_time")?;
    let created_time = DateTime::<Utc>::from_timestamp_millis(created_ms).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid created_time `{created_ms}` for device `{device_name}`"
        ))
    })?;

    let warranty_expiration = match row.get::<_, Option<String>>("warranty_expiration")? {
        Some(value) => Some(
            NaiveDate::parse_from_str(&value, WARRANTY_DATE_FORMAT).map_err(|_| {
                RepoError::InvalidData(format!(
                    "invalid warranty_expiration `{value}` for device `{device_name}`"
                ))
            })?,
        ),
        None => None,
    };

    let power_text: String = row.get("power_state")?;
    let power_state = PowerState::parse(&power_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid power_state `{power_text}` for device `{device_name}`"
        ))
    })?;

    Ok(Device {
        family_id: row.get::<_, Option<i64>>("family_id")?.map(FamilyId),
        created_by: row.get("created_by")?,
        created_time,
        warranty_expiration,
        power_state,
        device_name,
    })
}

fn format_warranty(date: NaiveDate) -> String {
    date.format(WARRANTY_DATE_FORMAT).to_string()
}
