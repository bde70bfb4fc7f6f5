//! Stock-owning master records.
//!
//! # Responsibility
//! - Define `MaterialType`, `Material`, `Product` and `ProductVariation`
//!   records.
//! - Provide the floor-at-zero stock arithmetic shared by both stock owners.
//!
//! # Invariants
//! - `stock` is never negative after `StockLedger::apply_movement`.
//! - A rejected adjustment leaves `stock` untouched.
//! - `(product_id, number)` identifies at most one `ProductVariation`.

use crate::model::movement::MovementType;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type MaterialTypeId = Uuid;
pub type MaterialId = Uuid;
pub type ProductId = Uuid;
pub type VariationId = Uuid;

/// Tolerance for float residue when an output drains stock exactly.
const STOCK_EPSILON: f64 = 1e-9;

/// Output quantity exceeds what is on hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsufficientStock {
    pub available: f64,
    pub requested: f64,
}

impl Display for InsufficientStock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requested {} but only {} on hand",
            self.requested, self.available
        )
    }
}

impl Error for InsufficientStock {}

/// Computes the stock level after moving `quantity` in `movement_type`
/// direction.
///
/// Float residue within `STOCK_EPSILON` of zero is clamped to zero.
pub fn next_stock(
    current: f64,
    quantity: f64,
    movement_type: MovementType,
) -> Result<f64, InsufficientStock> {
    match movement_type {
        MovementType::Input => Ok(current + quantity),
        MovementType::Output => {
            let next = current - quantity;
            if next < -STOCK_EPSILON {
                return Err(InsufficientStock {
                    available: current,
                    requested: quantity,
                });
            }
            Ok(next.max(0.0))
        }
    }
}

/// Quantity-on-hand holder for one stock-owning record.
pub trait StockLedger {
    fn stock(&self) -> f64;

    fn stock_mut(&mut self) -> &mut f64;

    /// Applies a movement to this holder, or leaves it untouched on failure.
    fn apply_movement(
        &mut self,
        movement_type: MovementType,
        quantity: f64,
    ) -> Result<f64, InsufficientStock> {
        let next = next_stock(self.stock(), quantity, movement_type)?;
        *self.stock_mut() = next;
        Ok(next)
    }
}

/// Master-data field validation failure.
#[derive(Debug, Clone, PartialEq)]
pub enum MasterDataError {
    BlankName,
    NameTooShort { min: usize },
    NameTooLong { max: usize },
    NegativeValue { field: &'static str, value: f64 },
    NonFiniteValue { field: &'static str },
}

impl Display for MasterDataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
            Self::NameTooShort { min } => write!(f, "name must be at least {min} characters"),
            Self::NameTooLong { max } => write!(f, "name must be at most {max} characters"),
            Self::NegativeValue { field, value } => {
                write!(f, "{field} must not be negative, got {value}")
            }
            Self::NonFiniteValue { field } => write!(f, "{field} must be a finite number"),
        }
    }
}

impl Error for MasterDataError {}

/// Unit a material's stock is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfMeasurement {
    Unit,
    Kilogram,
    Gram,
    Liter,
    Milliliter,
    Meter,
    Centimeter,
    SquareMeter,
}

impl UnitOfMeasurement {
    pub const ALL: [Self; 8] = [
        Self::Unit,
        Self::Kilogram,
        Self::Gram,
        Self::Liter,
        Self::Milliliter,
        Self::Meter,
        Self::Centimeter,
        Self::SquareMeter,
    ];

    /// Stored form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Kilogram => "kilogram",
            Self::Gram => "gram",
            Self::Liter => "liter",
            Self::Milliliter => "milliliter",
            Self::Meter => "meter",
            Self::Centimeter => "centimeter",
            Self::SquareMeter => "square_meter",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Unit => "u",
            Self::Kilogram => "kg",
            Self::Gram => "g",
            Self::Liter => "l",
            Self::Milliliter => "ml",
            Self::Meter => "m",
            Self::Centimeter => "cm",
            Self::SquareMeter => "m2",
        }
    }

    /// Accepts the stored form or the symbol, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|unit| {
            unit.as_str().eq_ignore_ascii_case(value) || unit.symbol().eq_ignore_ascii_case(value)
        })
    }
}

impl Display for UnitOfMeasurement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification shared by materials counted in the same unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialType {
    pub id: MaterialTypeId,
    pub name: String,
    pub description: String,
    pub unit: UnitOfMeasurement,
}

impl MaterialType {
    pub const NAME_MIN_CHARS: usize = 2;
    pub const NAME_MAX_CHARS: usize = 20;

    pub fn new(name: impl Into<String>, unit: UnitOfMeasurement) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            unit,
        }
    }

    /// Name is required and 2..=20 characters once trimmed.
    pub fn validate(&self) -> Result<(), MasterDataError> {
        validate_name(&self.name)?;
        let chars = self.name.trim().chars().count();
        if chars < Self::NAME_MIN_CHARS {
            return Err(MasterDataError::NameTooShort {
                min: Self::NAME_MIN_CHARS,
            });
        }
        if chars > Self::NAME_MAX_CHARS {
            return Err(MasterDataError::NameTooLong {
                max: Self::NAME_MAX_CHARS,
            });
        }
        Ok(())
    }
}

/// Raw material tracked by stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: f64,
    /// Stock level at or below which the material should be re-ordered.
    pub reposition_point: f64,
    pub material_type: Option<MaterialType>,
}

impl Material {
    /// Creates an empty material with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            price: 0.0,
            stock: 0.0,
            reposition_point: 0.0,
            material_type: None,
        }
    }

    pub fn with_type(mut self, material_type: MaterialType) -> Self {
        self.material_type = Some(material_type);
        self
    }

    /// Symbol of the unit stock is counted in, if the material is typed.
    pub fn unit_symbol(&self) -> Option<&'static str> {
        self.material_type
            .as_ref()
            .map(|material_type| material_type.unit.symbol())
    }

    pub fn validate(&self) -> Result<(), MasterDataError> {
        validate_name(&self.name)?;
        validate_amount("price", self.price)?;
        validate_amount("stock", self.stock)?;
        validate_amount("reposition_point", self.reposition_point)
    }

    pub fn needs_reposition(&self) -> bool {
        self.stock <= self.reposition_point
    }
}

impl StockLedger for Material {
    fn stock(&self) -> f64 {
        self.stock
    }

    fn stock_mut(&mut self) -> &mut f64 {
        &mut self.stock
    }
}

/// Finished product; stock lives on its variations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: f64,
}

impl Product {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            price: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), MasterDataError> {
        validate_name(&self.name)?;
        validate_amount("price", self.price)
    }
}

/// One variant (size, gauge, ...) of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariation {
    pub id: VariationId,
    pub product_id: ProductId,
    pub number: f64,
    pub stock: f64,
}

impl ProductVariation {
    /// Creates a variation with zero stock.
    pub fn new(product_id: ProductId, number: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            number,
            stock: 0.0,
        }
    }
}

impl StockLedger for ProductVariation {
    fn stock(&self) -> f64 {
        self.stock
    }

    fn stock_mut(&mut self) -> &mut f64 {
        &mut self.stock
    }
}

fn validate_name(name: &str) -> Result<(), MasterDataError> {
    if name.trim().is_empty() {
        return Err(MasterDataError::BlankName);
    }
    Ok(())
}

fn validate_amount(field: &'static str, value: f64) -> Result<(), MasterDataError> {
    if !value.is_finite() {
        return Err(MasterDataError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(MasterDataError::NegativeValue { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        next_stock, InsufficientStock, MasterDataError, Material, MaterialType, StockLedger,
        UnitOfMeasurement,
    };
    use crate::model::movement::MovementType;

    #[test]
    fn output_past_zero_is_rejected_without_mutation() {
        let mut material = Material::new("Steel");
        material.stock = 6.0;

        let err = material
            .apply_movement(MovementType::Output, 10.0)
            .unwrap_err();
        assert_eq!(
            err,
            InsufficientStock {
                available: 6.0,
                requested: 10.0
            }
        );
        assert_eq!(material.stock, 6.0);
    }

    #[test]
    fn output_draining_exactly_clamps_float_residue() {
        let after_first = next_stock(0.3, 0.1, MovementType::Output).unwrap();
        let after_second = next_stock(after_first, 0.2, MovementType::Output).unwrap();
        assert_eq!(after_second, 0.0);
    }

    #[test]
    fn input_adds_quantity() {
        let mut material = Material::new("Copper");
        assert_eq!(material.apply_movement(MovementType::Input, 2.5), Ok(2.5));
        assert_eq!(material.stock, 2.5);
    }

    #[test]
    fn validate_rejects_blank_name_and_negative_stock() {
        assert_eq!(
            Material::new("  ").validate(),
            Err(MasterDataError::BlankName)
        );

        let mut material = Material::new("Zinc");
        material.stock = -1.0;
        assert!(matches!(
            material.validate(),
            Err(MasterDataError::NegativeValue { field: "stock", .. })
        ));
    }

    #[test]
    fn reposition_threshold_is_inclusive() {
        let mut material = Material::new("Bolts");
        material.reposition_point = 5.0;
        material.stock = 5.0;
        assert!(material.needs_reposition());
        material.stock = 5.5;
        assert!(!material.needs_reposition());
    }

    #[test]
    fn unit_parses_stored_form_and_symbol() {
        assert_eq!(
            UnitOfMeasurement::parse("KG"),
            Some(UnitOfMeasurement::Kilogram)
        );
        assert_eq!(
            UnitOfMeasurement::parse(" square_meter "),
            Some(UnitOfMeasurement::SquareMeter)
        );
        assert_eq!(UnitOfMeasurement::parse("furlong"), None);
        for unit in UnitOfMeasurement::ALL {
            assert_eq!(UnitOfMeasurement::parse(unit.as_str()), Some(unit));
        }
    }

    #[test]
    fn material_type_name_length_is_bounded() {
        let unit = UnitOfMeasurement::Meter;
        assert_eq!(
            MaterialType::new("", unit).validate(),
            Err(MasterDataError::BlankName)
        );
        assert_eq!(
            MaterialType::new("W", unit).validate(),
            Err(MasterDataError::NameTooShort { min: 2 })
        );
        assert_eq!(
            MaterialType::new("x".repeat(21), unit).validate(),
            Err(MasterDataError::NameTooLong { max: 20 })
        );
        assert_eq!(MaterialType::new("Wire", unit).validate(), Ok(()));
    }

    #[test]
    fn typed_material_reports_its_unit() {
        let wire = MaterialType::new("Wire", UnitOfMeasurement::Meter);
        assert_eq!(Material::new("Copper").unit_symbol(), None);
        assert_eq!(Material::new("Copper").with_type(wire).unit_symbol(), Some("m"));
    }
}
