//! Movement repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Open the write unit in which stock is read, staged and committed.
//! - Persist a movement header, its lines and every stock update atomically.
//! - Serve movement read queries.
//!
//! # Invariants
//! - A write unit holds the database write lock from its first read until it
//!   commits or is dropped (`BEGIN IMMEDIATE`).
//! - Every stock update is a compare-and-swap against the value read inside
//!   the same unit; a mismatch aborts the whole movement.
//! - Dropping a unit without `commit_movement` rolls back every write,
//!   including variations provisioned through it.

use crate::model::material::{Material, MaterialId, ProductId, VariationId};
use crate::model::movement::{
    EmployeeId, Movement, MovementDetail, MovementId, MovementType, StockItem,
};
use crate::repo::material_repo::{compare_and_swap_material_stock, load_material};
use crate::repo::product_repo::{
    compare_and_swap_variation_stock, find_or_create_variation_in, load_variation_by_id,
    VariationLookup,
};
use crate::repo::{bool_to_int, parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const MOVEMENT_SELECT_SQL: &str = "SELECT
    uuid,
    type,
    is_material_movement,
    employee_id,
    created_at
FROM movements";

/// Final stock value for one entity touched by a movement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StockUpdate {
    Material {
        id: MaterialId,
        expected: f64,
        new_stock: f64,
    },
    ProductVariation {
        id: VariationId,
        expected: f64,
        new_stock: f64,
    },
}

/// Line ready to persist, carrying the resolved stock owner.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedLine {
    pub quantity: f64,
    pub item: StockItem,
}

/// Movement whose stock effects were computed but not yet written.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedMovement {
    pub movement_type: MovementType,
    pub is_material_movement: bool,
    pub employee_id: EmployeeId,
    pub lines: Vec<StagedLine>,
    /// One entry per distinct entity, in first-touched order.
    pub updates: Vec<StockUpdate>,
}

/// Transactional scope for one movement.
pub trait StockUnitOfWork {
    fn load_material(&self, id: MaterialId) -> RepoResult<Option<Material>>;

    fn find_or_create_variation(
        &self,
        product_id: ProductId,
        number: f64,
    ) -> RepoResult<VariationLookup>;

    /// Writes header, lines and stock updates, then commits.
    ///
    /// Any failure rolls back everything written through this unit.
    fn commit_movement(self, staged: StagedMovement) -> RepoResult<Movement>;
}

/// Repository interface for stock movements.
pub trait MovementRepository {
    type Unit<'a>: StockUnitOfWork
    where
        Self: 'a;

    /// Opens a write unit holding the write lock.
    fn begin_stock_unit(&self) -> RepoResult<Self::Unit<'_>>;

    /// Lists movements ordered by creation, optionally filtered by type.
    fn list_movements(&self, movement_type: Option<MovementType>) -> RepoResult<Vec<Movement>>;

    fn get_movement(&self, id: MovementId) -> RepoResult<Option<Movement>>;
}

/// SQLite-backed movement repository.
pub struct SqliteMovementRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMovementRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl MovementRepository for SqliteMovementRepository<'_> {
    type Unit<'a>
        = SqliteStockUnit<'a>
    where
        Self: 'a;

    fn begin_stock_unit(&self) -> RepoResult<SqliteStockUnit<'_>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        Ok(SqliteStockUnit { tx })
    }

    fn list_movements(&self, movement_type: Option<MovementType>) -> RepoResult<Vec<Movement>> {
        let mut sql = format!("{MOVEMENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(movement_type) = movement_type {
            sql.push_str(" AND type = ?");
            bind_values.push(Value::Text(movement_type.as_str().to_string()));
        }
        sql.push_str(" ORDER BY created_at ASC, rowid ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut movements = Vec::new();
        while let Some(row) = rows.next()? {
            let mut movement = parse_movement_row(row)?;
            movement.details = load_details(self.conn, movement.id)?;
            movements.push(movement);
        }

        Ok(movements)
    }

    fn get_movement(&self, id: MovementId) -> RepoResult<Option<Movement>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MOVEMENT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            let mut movement = parse_movement_row(row)?;
            movement.details = load_details(self.conn, movement.id)?;
            return Ok(Some(movement));
        }

        Ok(None)
    }
}

/// Write unit backed by an immediate SQLite transaction.
pub struct SqliteStockUnit<'conn> {
    tx: Transaction<'conn>,
}

impl StockUnitOfWork for SqliteStockUnit<'_> {
    fn load_material(&self, id: MaterialId) -> RepoResult<Option<Material>> {
        load_material(&self.tx, id)
    }

    fn find_or_create_variation(
        &self,
        product_id: ProductId,
        number: f64,
    ) -> RepoResult<VariationLookup> {
        find_or_create_variation_in(&self.tx, product_id, number)
    }

    fn commit_movement(self, staged: StagedMovement) -> RepoResult<Movement> {
        let movement_id = Uuid::new_v4();
        self.tx.execute(
            "INSERT INTO movements (uuid, type, is_material_movement, employee_id)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                movement_id.to_string(),
                staged.movement_type.as_str(),
                bool_to_int(staged.is_material_movement),
                staged.employee_id,
            ],
        )?;

        let mut details = Vec::with_capacity(staged.lines.len());
        for (index, line) in staged.lines.into_iter().enumerate() {
            let line_no = u32::try_from(index + 1).map_err(|_| {
                RepoError::InvalidData(format!("movement has too many lines ({index})"))
            })?;
            let detail_id = Uuid::new_v4();
            let (material_uuid, variation_uuid) = match &line.item {
                StockItem::Material(material) => (Some(material.id.to_string()), None),
                StockItem::ProductVariation(variation) => (None, Some(variation.id.to_string())),
            };
            self.tx.execute(
                "INSERT INTO movement_details (
                    uuid,
                    movement_uuid,
                    line_no,
                    quantity,
                    material_uuid,
                    variation_uuid
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    detail_id.to_string(),
                    movement_id.to_string(),
                    line_no,
                    line.quantity,
                    material_uuid,
                    variation_uuid,
                ],
            )?;
            details.push(MovementDetail {
                id: detail_id,
                line_no,
                quantity: line.quantity,
                item: line.item,
            });
        }

        for update in &staged.updates {
            match *update {
                StockUpdate::Material {
                    id,
                    expected,
                    new_stock,
                } => compare_and_swap_material_stock(&self.tx, id, expected, new_stock)?,
                StockUpdate::ProductVariation {
                    id,
                    expected,
                    new_stock,
                } => compare_and_swap_variation_stock(&self.tx, id, expected, new_stock)?,
            }
        }

        let created_at: i64 = self.tx.query_row(
            "SELECT created_at FROM movements WHERE uuid = ?1;",
            [movement_id.to_string()],
            |row| row.get(0),
        )?;

        self.tx.commit()?;

        Ok(Movement {
            id: movement_id,
            movement_type: staged.movement_type,
            is_material_movement: staged.is_material_movement,
            employee_id: staged.employee_id,
            created_at,
            details,
        })
    }
}

fn parse_movement_row(row: &Row<'_>) -> RepoResult<Movement> {
    let uuid_text: String = row.get("uuid")?;
    let type_text: String = row.get("type")?;
    let movement_type = MovementType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid movement type `{type_text}` in movements.type"))
    })?;
    let is_material_movement = match row.get::<_, i64>("is_material_movement")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_material_movement value `{other}` in movements.is_material_movement"
            )));
        }
    };

    Ok(Movement {
        id: parse_uuid(&uuid_text, "movements.uuid")?,
        movement_type,
        is_material_movement,
        employee_id: row.get("employee_id")?,
        created_at: row.get("created_at")?,
        details: Vec::new(),
    })
}

fn load_details(conn: &Connection, movement_id: MovementId) -> RepoResult<Vec<MovementDetail>> {
    let mut stmt = conn.prepare(
        "SELECT
            uuid,
            line_no,
            quantity,
            material_uuid,
            variation_uuid
         FROM movement_details
         WHERE movement_uuid = ?1
         ORDER BY line_no ASC;",
    )?;
    let mut rows = stmt.query([movement_id.to_string()])?;
    let mut details = Vec::new();
    while let Some(row) = rows.next()? {
        let uuid_text: String = row.get("uuid")?;
        let material_text: Option<String> = row.get("material_uuid")?;
        let variation_text: Option<String> = row.get("variation_uuid")?;

        let item = match (material_text, variation_text) {
            (Some(material_text), None) => {
                let id = parse_uuid(&material_text, "movement_details.material_uuid")?;
                let material = load_material(conn, id)?.ok_or(RepoError::MaterialNotFound(id))?;
                StockItem::Material(material)
            }
            (None, Some(variation_text)) => {
                let id = parse_uuid(&variation_text, "movement_details.variation_uuid")?;
                let variation = load_variation_by_id(conn, id)?.ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "movement line references missing variation {id}"
                    ))
                })?;
                StockItem::ProductVariation(variation)
            }
            _ => {
                return Err(RepoError::InvalidData(format!(
                    "movement line {uuid_text} must reference exactly one stock owner"
                )));
            }
        };

        details.push(MovementDetail {
            id: parse_uuid(&uuid_text, "movement_details.uuid")?,
            line_no: row.get("line_no")?,
            quantity: row.get("quantity")?,
            item,
        });
    }
    Ok(details)
}
