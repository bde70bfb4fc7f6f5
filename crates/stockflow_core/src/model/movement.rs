//! Stock movement model and request validation.
//!
//! # Responsibility
//! - Define the inbound `MovementRequest` shape and its validator.
//! - Define the persisted `Movement` with resolved stock items.
//!
//! # Invariants
//! - A line targets a material XOR a product variation (`StockTarget`).
//! - Every line of a movement matches its `is_material_movement` flag.
//! - Line quantities are finite and strictly positive.
//! - Validation has no side effects.

use crate::model::material::{Material, MaterialId, ProductId, ProductVariation};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type MovementId = Uuid;
pub type MovementDetailId = Uuid;
pub type EmployeeId = i64;

/// Direction of a movement; applies to every line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Stock enters the warehouse.
    Input,
    /// Stock leaves the warehouse.
    Output,
}

impl MovementType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }

    /// Parses the storage/wire form (`input|output`, case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "input" => Some(Self::Input),
            "output" => Some(Self::Output),
            _ => None,
        }
    }
}

impl Display for MovementType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock owner a movement line points at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockTarget {
    Material { material_id: MaterialId },
    /// Resolved by find-or-create on `(product_id, number)`.
    ProductVariation { product_id: ProductId, number: f64 },
}

impl StockTarget {
    pub fn is_material(&self) -> bool {
        matches!(self, Self::Material { .. })
    }
}

/// One line of an inbound movement request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementLineRequest {
    pub quantity: f64,
    /// `None` when the caller supplied neither a material nor a variation.
    pub target: Option<StockTarget>,
}

impl MovementLineRequest {
    pub fn material(material_id: MaterialId, quantity: f64) -> Self {
        Self {
            quantity,
            target: Some(StockTarget::Material { material_id }),
        }
    }

    pub fn product_variation(product_id: ProductId, number: f64, quantity: f64) -> Self {
        Self {
            quantity,
            target: Some(StockTarget::ProductVariation { product_id, number }),
        }
    }
}

/// Inbound, not yet validated movement.
///
/// `movement_type` stays a raw string so that missing and unknown types are
/// reported by validation instead of by decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRequest {
    #[serde(rename = "type")]
    pub movement_type: String,
    pub is_material_movement: bool,
    pub lines: Vec<MovementLineRequest>,
}

impl MovementRequest {
    pub fn new(movement_type: impl Into<String>, is_material_movement: bool) -> Self {
        Self {
            movement_type: movement_type.into(),
            is_material_movement,
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, line: MovementLineRequest) -> Self {
        self.lines.push(line);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedLine {
    pub quantity: f64,
    pub target: StockTarget,
}

/// Movement request that passed every structural and business precondition.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMovement {
    pub movement_type: MovementType,
    pub is_material_movement: bool,
    pub employee_id: EmployeeId,
    pub lines: Vec<ValidatedLine>,
}

/// Client-caused rejection of a movement request.
///
/// `line` values are 1-based positions in the request.
#[derive(Debug, Clone, PartialEq)]
pub enum MovementValidationError {
    TypeRequired,
    InvalidType(String),
    EmployeeRequired,
    LinesRequired,
    TargetRequired { line: usize },
    NotMaterialMovement { line: usize },
    NotProductMovement { line: usize },
    InvalidQuantity { line: usize, quantity: f64 },
}

impl Display for MovementValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeRequired => write!(f, "type is required"),
            Self::InvalidType(value) => {
                write!(f, "unknown movement type `{value}`; expected input|output")
            }
            Self::EmployeeRequired => write!(f, "employee is required"),
            Self::LinesRequired => write!(f, "movement requires at least one line"),
            Self::TargetRequired { line } => {
                write!(f, "material or product variation required (line {line})")
            }
            Self::NotMaterialMovement { line } => {
                write!(f, "movement is not material movement (line {line})")
            }
            Self::NotProductMovement { line } => {
                write!(f, "movement is not product movement (line {line})")
            }
            Self::InvalidQuantity { line, quantity } => write!(
                f,
                "quantity must be a positive number, got {quantity} (line {line})"
            ),
        }
    }
}

impl Error for MovementValidationError {}

/// Checks a movement request before any stock is touched.
///
/// Checks run in a fixed order and the first failure is returned:
/// type, employee, line presence, then per line target, kind, quantity.
pub fn validate_movement(
    request: &MovementRequest,
    employee_id: EmployeeId,
) -> Result<ValidatedMovement, MovementValidationError> {
    let raw_type = request.movement_type.trim();
    if raw_type.is_empty() {
        return Err(MovementValidationError::TypeRequired);
    }
    let movement_type = MovementType::parse(raw_type)
        .ok_or_else(|| MovementValidationError::InvalidType(raw_type.to_string()))?;

    if employee_id <= 0 {
        return Err(MovementValidationError::EmployeeRequired);
    }

    if request.lines.is_empty() {
        return Err(MovementValidationError::LinesRequired);
    }

    let mut lines = Vec::with_capacity(request.lines.len());
    for (index, line_request) in request.lines.iter().enumerate() {
        let line = index + 1;
        let target = line_request
            .target
            .ok_or(MovementValidationError::TargetRequired { line })?;

        match (target.is_material(), request.is_material_movement) {
            (true, false) => return Err(MovementValidationError::NotMaterialMovement { line }),
            (false, true) => return Err(MovementValidationError::NotProductMovement { line }),
            _ => {}
        }

        let quantity = line_request.quantity;
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(MovementValidationError::InvalidQuantity { line, quantity });
        }

        lines.push(ValidatedLine { quantity, target });
    }

    Ok(ValidatedMovement {
        movement_type,
        is_material_movement: request.is_material_movement,
        employee_id,
        lines,
    })
}

/// Stock owner resolved for a persisted line, carrying its stock value as of
/// the commit (or as of the read for queried movements).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockItem {
    Material(Material),
    ProductVariation(ProductVariation),
}

impl StockItem {
    pub fn stock(&self) -> f64 {
        match self {
            Self::Material(material) => material.stock,
            Self::ProductVariation(variation) => variation.stock,
        }
    }
}

/// Persisted line of a movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementDetail {
    pub id: MovementDetailId,
    /// 1-based position within the movement.
    pub line_no: u32,
    pub quantity: f64,
    pub item: StockItem,
}

/// Persisted inventory event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub is_material_movement: bool,
    pub employee_id: EmployeeId,
    /// Unix epoch milliseconds assigned by the store.
    pub created_at: i64,
    pub details: Vec<MovementDetail>,
}

#[cfg(test)]
mod tests {
    use super::{
        validate_movement, MovementLineRequest, MovementRequest, MovementType,
        MovementValidationError, StockTarget,
    };
    use uuid::Uuid;

    fn material_output(quantity: f64) -> MovementRequest {
        MovementRequest::new("output", true)
            .with_line(MovementLineRequest::material(Uuid::new_v4(), quantity))
    }

    #[test]
    fn type_is_checked_before_employee() {
        let mut request = material_output(1.0);
        request.movement_type = "   ".to_string();
        assert_eq!(
            validate_movement(&request, 0),
            Err(MovementValidationError::TypeRequired)
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut request = material_output(1.0);
        request.movement_type = "transfer".to_string();
        assert_eq!(
            validate_movement(&request, 7),
            Err(MovementValidationError::InvalidType("transfer".to_string()))
        );
    }

    #[test]
    fn non_positive_employee_is_rejected() {
        let request = material_output(1.0);
        assert_eq!(
            validate_movement(&request, 0),
            Err(MovementValidationError::EmployeeRequired)
        );
        assert_eq!(
            validate_movement(&request, -3),
            Err(MovementValidationError::EmployeeRequired)
        );
    }

    #[test]
    fn empty_lines_are_rejected() {
        let request = MovementRequest::new("input", true);
        assert_eq!(
            validate_movement(&request, 7),
            Err(MovementValidationError::LinesRequired)
        );
    }

    #[test]
    fn missing_target_reports_line_position() {
        let request = material_output(1.0).with_line(MovementLineRequest {
            quantity: 2.0,
            target: None,
        });
        let err = validate_movement(&request, 7).unwrap_err();
        assert_eq!(err, MovementValidationError::TargetRequired { line: 2 });
        assert!(err
            .to_string()
            .starts_with("material or product variation required"));
    }

    #[test]
    fn kind_mismatch_is_rejected_both_ways() {
        let variation_in_material = MovementRequest::new("input", true).with_line(
            MovementLineRequest::product_variation(Uuid::new_v4(), 42.0, 1.0),
        );
        assert_eq!(
            validate_movement(&variation_in_material, 7),
            Err(MovementValidationError::NotProductMovement { line: 1 })
        );

        let material_in_product = MovementRequest::new("input", false)
            .with_line(MovementLineRequest::material(Uuid::new_v4(), 1.0));
        assert_eq!(
            validate_movement(&material_in_product, 7),
            Err(MovementValidationError::NotMaterialMovement { line: 1 })
        );
        assert_eq!(
            validate_movement(&material_in_product, 7)
                .unwrap_err()
                .to_string(),
            "movement is not material movement (line 1)"
        );
    }

    #[test]
    fn non_positive_or_nan_quantity_is_rejected() {
        for quantity in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = validate_movement(&material_output(quantity), 7).unwrap_err();
            assert!(matches!(
                err,
                MovementValidationError::InvalidQuantity { line: 1, .. }
            ));
        }
    }

    #[test]
    fn valid_request_keeps_line_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let request = MovementRequest::new("Input", true)
            .with_line(MovementLineRequest::material(first, 1.5))
            .with_line(MovementLineRequest::material(second, 3.0));

        let validated = validate_movement(&request, 7).unwrap();
        assert_eq!(validated.movement_type, MovementType::Input);
        assert_eq!(validated.employee_id, 7);
        assert_eq!(
            validated.lines[0].target,
            StockTarget::Material { material_id: first }
        );
        assert_eq!(validated.lines[1].quantity, 3.0);
    }

    #[test]
    fn request_deserializes_from_wire_shape() {
        let request: MovementRequest = serde_json::from_str(
            r#"{
                "type": "output",
                "is_material_movement": false,
                "lines": [
                    {"quantity": 2.0, "target": {"kind": "product_variation", "product_id": "6f9619ff-8b86-d011-b42d-00cf4fc964ff", "number": 40.5}},
                    {"quantity": 1.0, "target": null}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(request.movement_type, "output");
        assert!(matches!(
            request.lines[0].target,
            Some(StockTarget::ProductVariation { number, .. }) if number == 40.5
        ));
        assert_eq!(request.lines[1].target, None);
    }
}
