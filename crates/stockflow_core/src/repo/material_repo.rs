//! Material repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `create_material` validates the record before inserting it, and a typed
//!   material must reference a stored material type.
//! - Reads join the material type so callers see the unit of measurement.
//! - Stock is written only by `compare_and_swap_material_stock`, which the
//!   movement write unit calls inside its transaction.

use crate::model::material::{Material, MaterialId, MaterialType, UnitOfMeasurement};
use crate::repo::material_type_repo::material_type_exists;
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const MATERIAL_SELECT_SQL: &str = "SELECT
    m.uuid AS uuid,
    m.name AS name,
    m.description AS description,
    m.price AS price,
    m.stock AS stock,
    m.reposition_point AS reposition_point,
    t.uuid AS type_uuid,
    t.name AS type_name,
    t.description AS type_description,
    t.unit AS type_unit
FROM materials m
LEFT JOIN material_types t ON t.uuid = m.material_type_uuid";

/// Repository interface for material master data.
pub trait MaterialRepository {
    fn create_material(&self, material: &Material) -> RepoResult<MaterialId>;
    fn get_material(&self, id: MaterialId) -> RepoResult<Option<Material>>;
    /// Lists materials ordered by name.
    fn list_materials(&self) -> RepoResult<Vec<Material>>;
    /// Lists materials whose stock is at or below their reposition point.
    fn list_materials_to_reposition(&self) -> RepoResult<Vec<Material>>;
}

/// SQLite-backed material repository.
pub struct SqliteMaterialRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMaterialRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl MaterialRepository for SqliteMaterialRepository<'_> {
    fn create_material(&self, material: &Material) -> RepoResult<MaterialId> {
        material.validate()?;
        let type_uuid = match &material.material_type {
            Some(material_type) => {
                if !material_type_exists(self.conn, material_type.id)? {
                    return Err(RepoError::MaterialTypeNotFound(material_type.id));
                }
                Some(material_type.id.to_string())
            }
            None => None,
        };

        self.conn.execute(
            "INSERT INTO materials (
                uuid,
                name,
                description,
                price,
                stock,
                reposition_point,
                material_type_uuid
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                material.id.to_string(),
                material.name.trim(),
                material.description.as_str(),
                material.price,
                material.stock,
                material.reposition_point,
                type_uuid,
            ],
        )?;

        Ok(material.id)
    }

    fn get_material(&self, id: MaterialId) -> RepoResult<Option<Material>> {
        load_material(self.conn, id)
    }

    fn list_materials(&self) -> RepoResult<Vec<Material>> {
        query_materials(
            self.conn,
            &format!("{MATERIAL_SELECT_SQL} ORDER BY m.name COLLATE NOCASE ASC, m.uuid ASC;"),
        )
    }

    fn list_materials_to_reposition(&self) -> RepoResult<Vec<Material>> {
        query_materials(
            self.conn,
            &format!(
                "{MATERIAL_SELECT_SQL}
                 WHERE m.stock <= m.reposition_point
                 ORDER BY m.stock - m.reposition_point ASC, m.name COLLATE NOCASE ASC;"
            ),
        )
    }
}

pub(crate) fn load_material(conn: &Connection, id: MaterialId) -> RepoResult<Option<Material>> {
    let mut stmt = conn.prepare(&format!("{MATERIAL_SELECT_SQL} WHERE m.uuid = ?1;"))?;
    let row = stmt
        .query_row([id.to_string()], |row| Ok(parse_material_row(row)))
        .optional()?;
    row.transpose()
}

/// Writes `new_stock` only if the stored value still equals `expected`.
pub(crate) fn compare_and_swap_material_stock(
    conn: &Connection,
    id: MaterialId,
    expected: f64,
    new_stock: f64,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE materials
         SET
            stock = ?3,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE uuid = ?1
           AND stock = ?2;",
        params![id.to_string(), expected, new_stock],
    )?;

    if changed == 0 {
        return Err(RepoError::StockConflict {
            entity: "material",
            id,
        });
    }

    Ok(())
}

fn query_materials(conn: &Connection, sql: &str) -> RepoResult<Vec<Material>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut materials = Vec::new();
    while let Some(row) = rows.next()? {
        materials.push(parse_material_row(row)?);
    }
    Ok(materials)
}

fn parse_material_row(row: &Row<'_>) -> RepoResult<Material> {
    let uuid_text: String = row.get("uuid")?;
    let material_type = match row.get::<_, Option<String>>("type_uuid")? {
        Some(type_text) => {
            let unit_text: String = row.get("type_unit")?;
            let unit = UnitOfMeasurement::parse(&unit_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid unit `{unit_text}` in material_types.unit"
                ))
            })?;
            Some(MaterialType {
                id: parse_uuid(&type_text, "material_types.uuid")?,
                name: row.get("type_name")?,
                description: row.get("type_description")?,
                unit,
            })
        }
        None => None,
    };
    Ok(Material {
        id: parse_uuid(&uuid_text, "materials.uuid")?,
        name: row.get("name")?,
        description: row.get("description")?,
        price: row.get("price")?,
        stock: row.get("stock")?,
        reposition_point: row.get("reposition_point")?,
        material_type,
    })
}
