//! Stock store: connection setup and versioned schema.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, BUSY_TIMEOUT};

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening or upgrading the stock store.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Migration `version` failed; the pending batch was rolled back.
    Migration {
        version: u32,
        source: rusqlite::Error,
    },
    /// The file was written by a newer build.
    SchemaTooNew { found: u32, supported: u32 },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::Migration { version, source } => {
                write!(f, "schema migration {version} failed: {source}")
            }
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "stock schema v{found} is newer than this build supports (v{supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
