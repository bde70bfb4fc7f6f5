//! Material type repository: the unit-of-measurement catalogue materials
//! are classified by.

use crate::model::material::{MaterialType, MaterialTypeId, UnitOfMeasurement};
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const MATERIAL_TYPE_SELECT_SQL: &str = "SELECT uuid, name, description, unit FROM material_types";

pub trait MaterialTypeRepository {
    /// Stores a validated material type; names are unique ignoring case.
    fn create_material_type(&self, material_type: &MaterialType) -> RepoResult<MaterialTypeId>;
    fn get_material_type(&self, id: MaterialTypeId) -> RepoResult<Option<MaterialType>>;
    fn find_material_type_by_name(&self, name: &str) -> RepoResult<Option<MaterialType>>;
    /// Lists material types ordered by name.
    fn list_material_types(&self) -> RepoResult<Vec<MaterialType>>;
}

pub struct SqliteMaterialTypeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMaterialTypeRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl MaterialTypeRepository for SqliteMaterialTypeRepository<'_> {
    fn create_material_type(&self, material_type: &MaterialType) -> RepoResult<MaterialTypeId> {
        material_type.validate()?;
        let name = material_type.name.trim();
        if self.find_material_type_by_name(name)?.is_some() {
            return Err(RepoError::MaterialTypeExists(name.to_string()));
        }

        self.conn.execute(
            "INSERT INTO material_types (uuid, name, description, unit)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                material_type.id.to_string(),
                name,
                material_type.description.as_str(),
                material_type.unit.as_str(),
            ],
        )?;
        Ok(material_type.id)
    }

    fn get_material_type(&self, id: MaterialTypeId) -> RepoResult<Option<MaterialType>> {
        query_one(
            self.conn,
            &format!("{MATERIAL_TYPE_SELECT_SQL} WHERE uuid = ?1;"),
            &id.to_string(),
        )
    }

    fn find_material_type_by_name(&self, name: &str) -> RepoResult<Option<MaterialType>> {
        query_one(
            self.conn,
            &format!("{MATERIAL_TYPE_SELECT_SQL} WHERE name = ?1 COLLATE NOCASE;"),
            name.trim(),
        )
    }

    fn list_material_types(&self) -> RepoResult<Vec<MaterialType>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MATERIAL_TYPE_SELECT_SQL} ORDER BY name COLLATE NOCASE ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut material_types = Vec::new();
        while let Some(row) = rows.next()? {
            material_types.push(parse_material_type_row(row)?);
        }
        Ok(material_types)
    }
}

pub(crate) fn material_type_exists(conn: &Connection, id: MaterialTypeId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM material_types WHERE uuid = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn query_one(conn: &Connection, sql: &str, key: &str) -> RepoResult<Option<MaterialType>> {
    let mut stmt = conn.prepare(sql)?;
    let row = stmt
        .query_row([key], |row| Ok(parse_material_type_row(row)))
        .optional()?;
    row.transpose()
}

fn parse_material_type_row(row: &Row<'_>) -> RepoResult<MaterialType> {
    let uuid_text: String = row.get("uuid")?;
    let unit_text: String = row.get("unit")?;
    let unit = UnitOfMeasurement::parse(&unit_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid unit `{unit_text}` in material_types.unit"))
    })?;
    Ok(MaterialType {
        id: parse_uuid(&uuid_text, "material_types.uuid")?,
        name: row.get("name")?,
        description: row.get("description")?,
        unit,
    })
}
