//! Stock movement use-case service.
//!
//! # Responsibility
//! - Validate, adjust and commit movements as one unit.
//! - Serve movement queries.
//!
//! # Invariants
//! - Validation runs before a write unit is opened.
//! - The first failing line aborts the movement; the unit is dropped and
//!   rolled back, so no staged change becomes visible.
//! - Errors are logged with a stable `error_code` and always returned to the
//!   caller.
//!
//! # Lifecycle
//! `received -> validated -> adjusted -> committed`, or `rejected` (validation)
//! / `failed` (lookup, stock rule, or store error).

use crate::model::material::{MaterialId, ProductId, VariationId};
use crate::model::movement::{
    validate_movement, EmployeeId, Movement, MovementId, MovementRequest, MovementType,
    MovementValidationError,
};
use crate::repo::movement_repo::{MovementRepository, StockUnitOfWork};
use crate::repo::RepoError;
use crate::service::stock_adjuster::StockAdjuster;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Failure class used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementErrorKind {
    /// Client input is wrong; safe to retry after correcting it.
    Validation,
    /// A business rule rejected the movement.
    Domain,
    /// The store failed; retry only after checking nothing was applied.
    Infrastructure,
}

impl MovementErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Domain => "domain",
            Self::Infrastructure => "infrastructure",
        }
    }
}

/// Errors from movement service operations.
#[derive(Debug)]
pub enum MovementError {
    Invalid(MovementValidationError),
    MaterialNotFound(MaterialId),
    ProductNotFound(ProductId),
    InsufficientMaterialStock {
        material_id: MaterialId,
        name: String,
        available: f64,
        requested: f64,
    },
    InsufficientVariationStock {
        variation_id: VariationId,
        available: f64,
        requested: f64,
    },
    MovementNotFound(MovementId),
    Repo(RepoError),
}

impl MovementError {
    pub fn kind(&self) -> MovementErrorKind {
        match self {
            Self::Invalid(_) => MovementErrorKind::Validation,
            Self::MaterialNotFound(_)
            | Self::ProductNotFound(_)
            | Self::InsufficientMaterialStock { .. }
            | Self::InsufficientVariationStock { .. }
            | Self::MovementNotFound(_) => MovementErrorKind::Domain,
            Self::Repo(_) => MovementErrorKind::Infrastructure,
        }
    }

    /// Stable machine-readable code, safe to log.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invalid(err) => match err {
                MovementValidationError::TypeRequired => "type_required",
                MovementValidationError::InvalidType(_) => "invalid_type",
                MovementValidationError::EmployeeRequired => "employee_required",
                MovementValidationError::LinesRequired => "lines_required",
                MovementValidationError::TargetRequired { .. } => "target_required",
                MovementValidationError::NotMaterialMovement { .. } => "not_material_movement",
                MovementValidationError::NotProductMovement { .. } => "not_product_movement",
                MovementValidationError::InvalidQuantity { .. } => "invalid_quantity",
            },
            Self::MaterialNotFound(_) => "material_not_found",
            Self::ProductNotFound(_) => "product_not_found",
            Self::InsufficientMaterialStock { .. } => "insufficient_material_stock",
            Self::InsufficientVariationStock { .. } => "insufficient_variation_stock",
            Self::MovementNotFound(_) => "movement_not_found",
            Self::Repo(RepoError::StockConflict { .. }) => "stock_conflict",
            Self::Repo(_) => "store_failure",
        }
    }
}

impl Display for MovementError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "{err}"),
            Self::MaterialNotFound(id) => write!(f, "material not found: {id}"),
            Self::ProductNotFound(id) => write!(f, "product not found: {id}"),
            Self::InsufficientMaterialStock { name, .. } => {
                write!(f, "insufficient stock in material {name}")
            }
            Self::InsufficientVariationStock { variation_id, .. } => {
                write!(f, "insufficient stock in product variation {variation_id}")
            }
            Self::MovementNotFound(id) => write!(f, "movement not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MovementError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MovementValidationError> for MovementError {
    fn from(value: MovementValidationError) -> Self {
        Self::Invalid(value)
    }
}

impl From<RepoError> for MovementError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::MaterialNotFound(id) => Self::MaterialNotFound(id),
            RepoError::ProductNotFound(id) => Self::ProductNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Movement service facade over a repository implementation.
pub struct MovementService<R: MovementRepository> {
    repo: R,
}

impl<R: MovementRepository> MovementService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Records a movement and its stock effects atomically.
    ///
    /// Returns the persisted movement with generated ids; each line carries
    /// the final stock of its material or variation.
    pub fn create_movement(
        &self,
        request: &MovementRequest,
        employee_id: EmployeeId,
    ) -> Result<Movement, MovementError> {
        let started_at = Instant::now();
        let result = self.record(request, employee_id);

        match &result {
            Ok(movement) => info!(
                "event=movement_create module=service status=ok movement_id={} type={} lines={} employee_id={} duration_ms={}",
                movement.id,
                movement.movement_type,
                movement.details.len(),
                employee_id,
                started_at.elapsed().as_millis()
            ),
            Err(err) if err.kind() == MovementErrorKind::Infrastructure => error!(
                "event=movement_create module=service status=error error_kind=infrastructure error_code={} duration_ms={} error={}",
                err.code(),
                started_at.elapsed().as_millis(),
                err
            ),
            Err(err) => warn!(
                "event=movement_create module=service status=rejected error_kind={} error_code={} duration_ms={}",
                err.kind().as_str(),
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }

        result
    }

    fn record(
        &self,
        request: &MovementRequest,
        employee_id: EmployeeId,
    ) -> Result<Movement, MovementError> {
        let validated = validate_movement(request, employee_id)?;

        let unit = self.repo.begin_stock_unit()?;
        let staged = {
            let mut adjuster = StockAdjuster::new(&unit, validated.movement_type);
            for line in &validated.lines {
                adjuster.adjust(line.target, line.quantity)?;
            }
            if !adjuster.provisioned_variations().is_empty() {
                info!(
                    "event=variation_provision module=service status=staged count={}",
                    adjuster.provisioned_variations().len()
                );
            }
            adjuster.into_staged(&validated)
        };

        Ok(unit.commit_movement(staged)?)
    }

    /// Lists every movement in creation order.
    pub fn find_all(&self) -> Result<Vec<Movement>, MovementError> {
        Ok(self.repo.list_movements(None)?)
    }

    /// Lists movements of one type. A type no movement can carry matches
    /// nothing.
    pub fn find_all_by_type(&self, movement_type: &str) -> Result<Vec<Movement>, MovementError> {
        match MovementType::parse(movement_type) {
            Some(parsed) => Ok(self.repo.list_movements(Some(parsed))?),
            None => Ok(Vec::new()),
        }
    }

    pub fn find_by_id(&self, id: MovementId) -> Result<Movement, MovementError> {
        self.repo
            .get_movement(id)?
            .ok_or(MovementError::MovementNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::{MovementError, MovementErrorKind};
    use crate::model::movement::MovementValidationError;
    use crate::repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn repo_not_found_maps_to_domain_errors() {
        let id = Uuid::new_v4();
        let err = MovementError::from(RepoError::MaterialNotFound(id));
        assert!(matches!(err, MovementError::MaterialNotFound(found) if found == id));
        assert_eq!(err.kind(), MovementErrorKind::Domain);
    }

    #[test]
    fn stock_conflict_is_infrastructure() {
        let err = MovementError::from(RepoError::StockConflict {
            entity: "material",
            id: Uuid::new_v4(),
        });
        assert_eq!(err.kind(), MovementErrorKind::Infrastructure);
        assert_eq!(err.code(), "stock_conflict");
    }

    #[test]
    fn validation_errors_keep_their_message() {
        let err = MovementError::from(MovementValidationError::EmployeeRequired);
        assert_eq!(err.kind(), MovementErrorKind::Validation);
        assert_eq!(err.to_string(), "employee is required");
    }
}
