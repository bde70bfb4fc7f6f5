//! Stock-movement core for the inventory backend.
//! This crate owns the invariants that keep quantity-on-hand consistent.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::material::{
    InsufficientStock, MasterDataError, Material, MaterialId, MaterialType, MaterialTypeId,
    Product, ProductId, ProductVariation, StockLedger, UnitOfMeasurement, VariationId,
};
pub use model::movement::{
    validate_movement, EmployeeId, Movement, MovementDetail, MovementId, MovementLineRequest,
    MovementRequest, MovementType, MovementValidationError, StockItem, StockTarget,
    ValidatedMovement,
};
pub use repo::material_repo::{MaterialRepository, SqliteMaterialRepository};
pub use repo::material_type_repo::{MaterialTypeRepository, SqliteMaterialTypeRepository};
pub use repo::movement_repo::{
    MovementRepository, SqliteMovementRepository, SqliteStockUnit, StagedLine, StagedMovement,
    StockUnitOfWork, StockUpdate,
};
pub use repo::product_repo::{ProductRepository, SqliteProductRepository, VariationLookup};
pub use repo::{RepoError, RepoResult};
pub use service::movement_service::{MovementError, MovementErrorKind, MovementService};
pub use service::stock_adjuster::StockAdjuster;
