//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define data access contracts for master data and stock movements.
//! - Isolate SQL details from the movement use case.
//!
//! # Invariants
//! - Master-data writes validate records before SQL mutations.
//! - Stock columns are only written through the movement write unit.
//! - Repository APIs return semantic errors in addition to DB transport
//!   errors.

use crate::db::DbError;
use crate::model::material::{MasterDataError, MaterialId, MaterialTypeId, ProductId};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod material_repo;
pub mod material_type_repo;
pub mod movement_repo;
pub mod product_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for inventory persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(MasterDataError),
    Db(DbError),
    MaterialNotFound(MaterialId),
    MaterialTypeNotFound(MaterialTypeId),
    /// A material type with the same name (case-insensitive) exists.
    MaterialTypeExists(String),
    ProductNotFound(ProductId),
    InvalidData(String),
    /// Stored stock no longer matches the value read inside the write unit.
    StockConflict { entity: &'static str, id: Uuid },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::MaterialNotFound(id) => write!(f, "material not found: {id}"),
            Self::MaterialTypeNotFound(id) => write!(f, "material type not found: {id}"),
            Self::MaterialTypeExists(name) => write!(f, "material type `{name}` already exists"),
            Self::ProductNotFound(id) => write!(f, "product not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted stock data: {message}"),
            Self::StockConflict { entity, id } => {
                write!(f, "stock of {entity} {id} changed during the movement")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MasterDataError> for RepoError {
    fn from(value: MasterDataError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
