//! Ordered schema scripts for the stock store.
//!
//! The schema version lives in `PRAGMA user_version`. Scripts are
//! append-only: a shipped script is never edited, a new one is added.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, Transaction};

/// `(version, script)` pairs in ascending version order.
const SCRIPTS: &[(u32, &str)] = &[
    (1, include_str!("0001_master_data.sql")),
    (2, include_str!("0002_movements.sql")),
    (3, include_str!("0003_material_types.sql")),
];

/// Highest schema version this build can read and write.
pub fn latest_version() -> u32 {
    SCRIPTS.last().map_or(0, |(version, _)| *version)
}

/// Reads the schema version stamped on `conn`.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Brings `conn` up to `latest_version()`.
///
/// Every pending script runs in a single transaction; on failure the store
/// stays at its previous version.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found = schema_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::SchemaTooNew { found, supported });
    }

    let pending: Vec<_> = SCRIPTS
        .iter()
        .filter(|(version, _)| *version > found)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, script) in pending {
        run_script(&tx, *version, script)?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        found, supported
    );
    Ok(())
}

fn run_script(tx: &Transaction<'_>, version: u32, script: &str) -> DbResult<()> {
    tx.execute_batch(script)
        .and_then(|()| tx.pragma_update(None, "user_version", version))
        .map_err(|source| DbError::Migration { version, source })
}

#[cfg(test)]
mod tests {
    use super::{latest_version, SCRIPTS};

    #[test]
    fn script_versions_are_contiguous_from_one() {
        for (index, (version, _)) in SCRIPTS.iter().enumerate() {
            assert_eq!(*version as usize, index + 1);
        }
        assert_eq!(latest_version() as usize, SCRIPTS.len());
    }
}
