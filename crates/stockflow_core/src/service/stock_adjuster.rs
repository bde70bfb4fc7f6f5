//! Per-line stock adjustment inside a movement write unit.
//!
//! # Responsibility
//! - Resolve each line's stock owner through the open write unit.
//! - Stage the new stock value with the floor-at-zero rule.
//! - Turn the staged state into a `StagedMovement` for the recorder.
//!
//! # Invariants
//! - Nothing is written here except provisioned variations, which live in
//!   the same uncommitted unit.
//! - Lines touching the same entity see each other's staged effect.
//! - A rejected line leaves previously staged values untouched.

use crate::model::material::{
    Material, MaterialId, ProductId, ProductVariation, StockLedger, VariationId,
};
use crate::model::movement::{MovementType, StockItem, StockTarget, ValidatedMovement};
use crate::repo::movement_repo::{StagedLine, StagedMovement, StockUnitOfWork, StockUpdate};
use crate::repo::product_repo::VariationLookup;
use crate::service::movement_service::MovementError;

struct Staged<T> {
    /// Stock as read inside the unit; the compare-and-swap expectation.
    read_stock: f64,
    entity: T,
}

/// Stages stock adjustments for one movement.
pub struct StockAdjuster<'u, U: StockUnitOfWork> {
    unit: &'u U,
    movement_type: MovementType,
    materials: Vec<Staged<Material>>,
    variations: Vec<Staged<ProductVariation>>,
    /// Touched entities in first-touched order.
    touched: Vec<StockTarget>,
    lines: Vec<(f64, StockTarget)>,
    provisioned: Vec<VariationId>,
}

impl<'u, U: StockUnitOfWork> StockAdjuster<'u, U> {
    pub fn new(unit: &'u U, movement_type: MovementType) -> Self {
        Self {
            unit,
            movement_type,
            materials: Vec::new(),
            variations: Vec::new(),
            touched: Vec::new(),
            lines: Vec::new(),
            provisioned: Vec::new(),
        }
    }

    /// Applies one line and returns the staged stock owner.
    pub fn adjust(
        &mut self,
        target: StockTarget,
        quantity: f64,
    ) -> Result<StockItem, MovementError> {
        let item = match target {
            StockTarget::Material { material_id } => {
                StockItem::Material(self.adjust_material(material_id, quantity)?)
            }
            StockTarget::ProductVariation { product_id, number } => StockItem::ProductVariation(
                self.adjust_product_variation(product_id, number, quantity)?,
            ),
        };
        self.lines.push((quantity, target));
        Ok(item)
    }

    /// Material path: the material must exist.
    pub fn adjust_material(
        &mut self,
        material_id: MaterialId,
        quantity: f64,
    ) -> Result<Material, MovementError> {
        let index = match self
            .materials
            .iter()
            .position(|staged| staged.entity.id == material_id)
        {
            Some(index) => index,
            None => {
                let material = self
                    .unit
                    .load_material(material_id)?
                    .ok_or(MovementError::MaterialNotFound(material_id))?;
                self.materials.push(Staged {
                    read_stock: material.stock,
                    entity: material,
                });
                self.touched.push(StockTarget::Material { material_id });
                self.materials.len() - 1
            }
        };

        let material = &mut self.materials[index].entity;
        material
            .apply_movement(self.movement_type, quantity)
            .map_err(|shortfall| MovementError::InsufficientMaterialStock {
                material_id,
                name: material.name.clone(),
                available: shortfall.available,
                requested: shortfall.requested,
            })?;
        Ok(material.clone())
    }

    /// Product-variation path: a missing variation is provisioned with zero
    /// stock before the movement is applied.
    pub fn adjust_product_variation(
        &mut self,
        product_id: ProductId,
        number: f64,
        quantity: f64,
    ) -> Result<ProductVariation, MovementError> {
        let index = match self.variations.iter().position(|staged| {
            staged.entity.product_id == product_id && staged.entity.number == number
        }) {
            Some(index) => index,
            None => {
                let lookup = self.unit.find_or_create_variation(product_id, number)?;
                if let VariationLookup::Created(variation) = &lookup {
                    self.provisioned.push(variation.id);
                }
                let variation = lookup.into_variation();
                self.touched
                    .push(StockTarget::ProductVariation { product_id, number });
                self.variations.push(Staged {
                    read_stock: variation.stock,
                    entity: variation,
                });
                self.variations.len() - 1
            }
        };

        let variation = &mut self.variations[index].entity;
        variation
            .apply_movement(self.movement_type, quantity)
            .map_err(|shortfall| MovementError::InsufficientVariationStock {
                variation_id: variation.id,
                available: shortfall.available,
                requested: shortfall.requested,
            })?;
        Ok(variation.clone())
    }

    /// Ids of variations provisioned by this movement so far.
    pub fn provisioned_variations(&self) -> &[VariationId] {
        &self.provisioned
    }

    /// Builds the recorder input. Every line carries the final staged state
    /// of its stock owner.
    pub fn into_staged(self, validated: &ValidatedMovement) -> StagedMovement {
        let lines = self
            .lines
            .iter()
            .filter_map(|(quantity, target)| {
                self.final_item(target).map(|item| StagedLine {
                    quantity: *quantity,
                    item,
                })
            })
            .collect();

        let updates = self
            .touched
            .iter()
            .filter_map(|target| self.update_for(target))
            .collect();

        StagedMovement {
            movement_type: validated.movement_type,
            is_material_movement: validated.is_material_movement,
            employee_id: validated.employee_id,
            lines,
            updates,
        }
    }

    fn final_item(&self, target: &StockTarget) -> Option<StockItem> {
        match *target {
            StockTarget::Material { material_id } => self
                .find_material(material_id)
                .map(|staged| StockItem::Material(staged.entity.clone())),
            StockTarget::ProductVariation { product_id, number } => self
                .find_variation(product_id, number)
                .map(|staged| StockItem::ProductVariation(staged.entity.clone())),
        }
    }

    fn update_for(&self, target: &StockTarget) -> Option<StockUpdate> {
        match *target {
            StockTarget::Material { material_id } => self
                .find_material(material_id)
                .map(|staged| StockUpdate::Material {
                    id: staged.entity.id,
                    expected: staged.read_stock,
                    new_stock: staged.entity.stock,
                }),
            StockTarget::ProductVariation { product_id, number } => self
                .find_variation(product_id, number)
                .map(|staged| StockUpdate::ProductVariation {
                    id: staged.entity.id,
                    expected: staged.read_stock,
                    new_stock: staged.entity.stock,
                }),
        }
    }

    fn find_material(&self, material_id: MaterialId) -> Option<&Staged<Material>> {
        self.materials
            .iter()
            .find(|staged| staged.entity.id == material_id)
    }

    fn find_variation(
        &self,
        product_id: ProductId,
        number: f64,
    ) -> Option<&Staged<ProductVariation>> {
        self.variations.iter().find(|staged| {
            staged.entity.product_id == product_id && staged.entity.number == number
        })
    }
}

#[cfg(test)]
mod tests {
    use super::StockAdjuster;
    use crate::model::material::{Material, MaterialId, ProductId, ProductVariation};
    use crate::model::movement::{
        Movement, MovementType, StockItem, StockTarget, ValidatedMovement,
    };
    use crate::repo::movement_repo::{StagedMovement, StockUnitOfWork, StockUpdate};
    use crate::repo::product_repo::VariationLookup;
    use crate::repo::{RepoError, RepoResult};
    use crate::service::movement_service::MovementError;
    use std::cell::RefCell;

    /// In-memory unit that records provisioning calls.
    struct FakeUnit {
        materials: Vec<Material>,
        variations: RefCell<Vec<ProductVariation>>,
        product_ids: Vec<ProductId>,
    }

    impl StockUnitOfWork for FakeUnit {
        fn load_material(&self, id: MaterialId) -> RepoResult<Option<Material>> {
            Ok(self.materials.iter().find(|m| m.id == id).cloned())
        }

        fn find_or_create_variation(
            &self,
            product_id: ProductId,
            number: f64,
        ) -> RepoResult<VariationLookup> {
            let mut variations = self.variations.borrow_mut();
            if let Some(existing) = variations
                .iter()
                .find(|v| v.product_id == product_id && v.number == number)
            {
                return Ok(VariationLookup::Found(existing.clone()));
            }
            if !self.product_ids.contains(&product_id) {
                return Err(RepoError::ProductNotFound(product_id));
            }
            let created = ProductVariation::new(product_id, number);
            variations.push(created.clone());
            Ok(VariationLookup::Created(created))
        }

        fn commit_movement(self, _staged: StagedMovement) -> RepoResult<Movement> {
            unreachable!("adjuster never commits")
        }
    }

    fn unit_with_material(stock: f64) -> (FakeUnit, MaterialId) {
        let mut material = Material::new("Steel");
        material.stock = stock;
        let id = material.id;
        (
            FakeUnit {
                materials: vec![material],
                variations: RefCell::new(Vec::new()),
                product_ids: Vec::new(),
            },
            id,
        )
    }

    fn validated(movement_type: MovementType, is_material_movement: bool) -> ValidatedMovement {
        ValidatedMovement {
            movement_type,
            is_material_movement,
            employee_id: 7,
            lines: Vec::new(),
        }
    }

    #[test]
    fn repeated_material_lines_accumulate_and_stage_one_update() {
        let (unit, id) = unit_with_material(10.0);
        let mut adjuster = StockAdjuster::new(&unit, MovementType::Output);

        adjuster
            .adjust(StockTarget::Material { material_id: id }, 4.0)
            .unwrap();
        let second = adjuster
            .adjust(StockTarget::Material { material_id: id }, 5.0)
            .unwrap();
        assert_eq!(second.stock(), 1.0);

        let staged = adjuster.into_staged(&validated(MovementType::Output, true));
        assert_eq!(staged.lines.len(), 2);
        assert!(staged.lines.iter().all(|line| line.item.stock() == 1.0));
        assert_eq!(
            staged.updates,
            vec![StockUpdate::Material {
                id,
                expected: 10.0,
                new_stock: 1.0
            }]
        );
    }

    #[test]
    fn cumulative_overdraw_is_rejected_on_the_offending_line() {
        let (unit, id) = unit_with_material(10.0);
        let mut adjuster = StockAdjuster::new(&unit, MovementType::Output);

        adjuster.adjust_material(id, 6.0).unwrap();
        let err = adjuster.adjust_material(id, 6.0).unwrap_err();
        assert!(matches!(
            err,
            MovementError::InsufficientMaterialStock { available, requested, .. }
                if available == 4.0 && requested == 6.0
        ));
        assert_eq!(err.to_string(), "insufficient stock in material Steel");
    }

    #[test]
    fn unknown_material_is_reported() {
        let (unit, _) = unit_with_material(1.0);
        let mut adjuster = StockAdjuster::new(&unit, MovementType::Input);
        let missing = MaterialId::new_v4();

        let err = adjuster.adjust_material(missing, 1.0).unwrap_err();
        assert!(matches!(err, MovementError::MaterialNotFound(id) if id == missing));
    }

    #[test]
    fn missing_variation_is_provisioned_once() {
        let product_id = ProductId::new_v4();
        let unit = FakeUnit {
            materials: Vec::new(),
            variations: RefCell::new(Vec::new()),
            product_ids: vec![product_id],
        };
        let mut adjuster = StockAdjuster::new(&unit, MovementType::Input);

        let first = adjuster
            .adjust_product_variation(product_id, 42.0, 3.0)
            .unwrap();
        let second = adjuster
            .adjust_product_variation(product_id, 42.0, 2.0)
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.stock, 5.0);
        assert_eq!(adjuster.provisioned_variations(), &[first.id]);

        let staged = adjuster.into_staged(&validated(MovementType::Input, false));
        assert!(matches!(
            staged.updates.as_slice(),
            [StockUpdate::ProductVariation { expected, new_stock, .. }]
                if *expected == 0.0 && *new_stock == 5.0
        ));
        assert!(matches!(
            &staged.lines[0].item,
            StockItem::ProductVariation(variation) if variation.stock == 5.0
        ));
    }

    #[test]
    fn output_on_fresh_variation_is_insufficient() {
        let product_id = ProductId::new_v4();
        let unit = FakeUnit {
            materials: Vec::new(),
            variations: RefCell::new(Vec::new()),
            product_ids: vec![product_id],
        };
        let mut adjuster = StockAdjuster::new(&unit, MovementType::Output);

        let err = adjuster
            .adjust_product_variation(product_id, 38.0, 1.0)
            .unwrap_err();
        match &err {
            MovementError::InsufficientVariationStock { variation_id, .. } => assert_eq!(
                err.to_string(),
                format!("insufficient stock in product variation {variation_id}")
            ),
            other => panic!("unexpected error: {other}"),
        }
    }
}
