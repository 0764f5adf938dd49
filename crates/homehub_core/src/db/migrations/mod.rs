//! Versioned household schema.
//!
//! Each step is one SQL batch; the version reached is stored in
//! `PRAGMA user_version`. Versions are strictly increasing.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, Transaction};
use std::time::Instant;

/// One schema step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

/// Schema steps shipped with this build.
pub const HOUSEHOLD_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "households",
        sql: include_str!("0001_households.sql"),
    },
    Migration {
        version: 2,
        name: "device_indexes",
        sql: include_str!("0002_device_indexes.sql"),
    },
];

pub fn latest_version() -> u32 {
    target_version(HOUSEHOLD_MIGRATIONS)
}

/// Brings the connection up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    apply_migration_set(conn, HOUSEHOLD_MIGRATIONS)
}

/// Applies the steps of `migrations` newer than the stored version inside a
/// single transaction.
///
/// # Side effects
/// - Emits one `db_migrate` event per applied step.
pub fn apply_migration_set(conn: &mut Connection, migrations: &[Migration]) -> DbResult<()> {
    let stored = stored_version(conn)?;
    let target = target_version(migrations);
    if stored > target {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: stored,
            latest_supported: target,
        });
    }

    let mut pending = migrations.iter().filter(|step| step.version > stored).peekable();
    if pending.peek().is_none() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        run_step(&tx, step)?;
    }
    tx.commit()?;
    Ok(())
}

fn run_step(tx: &Transaction<'_>, step: &Migration) -> DbResult<()> {
    let started_at = Instant::now();
    let applied = tx
        .execute_batch(step.sql)
        .and_then(|()| tx.pragma_update(None, "user_version", step.version));

    match applied {
        Ok(()) => {
            info!(
                "event=db_migrate module=db status=ok version={} name={} duration_ms={}",
                step.version,
                step.name,
                started_at.elapsed().as_millis()
            );
            Ok(())
        }
        Err(source) => {
            error!(
                "event=db_migrate module=db status=error version={} name={} error_code=db_migration_failed error={}",
                step.version,
                step.name,
                source
            );
            Err(DbError::Migration {
                version: step.version,
                name: step.name,
                source,
            })
        }
    }
}

fn target_version(migrations: &[Migration]) -> u32 {
    migrations.last().map_or(0, |step| step.version)
}

fn stored_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?;
    Ok(version)
}
