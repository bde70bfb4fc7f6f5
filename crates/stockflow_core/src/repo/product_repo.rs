//! Product and product-variation repository contracts and SQLite
//! implementation.
//!
//! # Responsibility
//! - Persist product master records.
//! - Resolve product variations by `(product_id, number)`, provisioning
//!   missing ones on demand (find-or-create).
//!
//! # Invariants
//! - `(product_uuid, number)` is unique; find-or-create never yields two rows
//!   for the same pair.
//! - A provisioned variation starts with zero stock.
//! - Variations are only provisioned for existing products.

use crate::model::material::{Product, ProductId, ProductVariation, VariationId};
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const VARIATION_SELECT_SQL: &str = "SELECT
    uuid,
    product_uuid,
    number,
    stock
FROM product_variations";

/// Tagged result of a find-or-create lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum VariationLookup {
    /// The variation already existed.
    Found(ProductVariation),
    /// The variation was provisioned by this lookup.
    Created(ProductVariation),
}

impl VariationLookup {
    pub fn variation(&self) -> &ProductVariation {
        match self {
            Self::Found(variation) | Self::Created(variation) => variation,
        }
    }

    pub fn into_variation(self) -> ProductVariation {
        match self {
            Self::Found(variation) | Self::Created(variation) => variation,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Repository interface for products and their variations.
pub trait ProductRepository {
    fn create_product(&self, product: &Product) -> RepoResult<ProductId>;
    fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>>;
    fn get_variation(
        &self,
        product_id: ProductId,
        number: f64,
    ) -> RepoResult<Option<ProductVariation>>;
    /// Returns the variation for `(product_id, number)`, creating it with zero
    /// stock when it does not exist yet.
    fn find_or_create_variation(
        &self,
        product_id: ProductId,
        number: f64,
    ) -> RepoResult<VariationLookup>;
    /// Lists variations of one product ordered by number.
    fn list_variations(&self, product_id: ProductId) -> RepoResult<Vec<ProductVariation>>;
}

/// SQLite-backed product repository.
pub struct SqliteProductRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProductRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProductRepository for SqliteProductRepository<'_> {
    fn create_product(&self, product: &Product) -> RepoResult<ProductId> {
        product.validate()?;

        self.conn.execute(
            "INSERT INTO products (uuid, name, description, price)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                product.id.to_string(),
                product.name.trim(),
                product.description.as_str(),
                product.price,
            ],
        )?;

        Ok(product.id)
    }

    fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, name, description, price
             FROM products
             WHERE uuid = ?1;",
        )?;
        let row = stmt
            .query_row([id.to_string()], |row| Ok(parse_product_row(row)))
            .optional()?;
        row.transpose()
    }

    fn get_variation(
        &self,
        product_id: ProductId,
        number: f64,
    ) -> RepoResult<Option<ProductVariation>> {
        load_variation(self.conn, product_id, number)
    }

    fn find_or_create_variation(
        &self,
        product_id: ProductId,
        number: f64,
    ) -> RepoResult<VariationLookup> {
        find_or_create_variation_in(self.conn, product_id, number)
    }

    fn list_variations(&self, product_id: ProductId) -> RepoResult<Vec<ProductVariation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VARIATION_SELECT_SQL}
             WHERE product_uuid = ?1
             ORDER BY number ASC;"
        ))?;
        let mut rows = stmt.query([product_id.to_string()])?;
        let mut variations = Vec::new();
        while let Some(row) = rows.next()? {
            variations.push(parse_variation_row(row)?);
        }
        Ok(variations)
    }
}

/// Find-or-create on any connection or open transaction.
///
/// The insert uses `ON CONFLICT DO NOTHING`, so a concurrent writer that
/// provisions the same pair first turns this call into `Found`.
pub(crate) fn find_or_create_variation_in(
    conn: &Connection,
    product_id: ProductId,
    number: f64,
) -> RepoResult<VariationLookup> {
    if !number.is_finite() {
        return Err(RepoError::InvalidData(format!(
            "variation number must be finite, got {number}"
        )));
    }
    if let Some(existing) = load_variation(conn, product_id, number)? {
        return Ok(VariationLookup::Found(existing));
    }
    if !product_exists(conn, product_id)? {
        return Err(RepoError::ProductNotFound(product_id));
    }

    let candidate = ProductVariation::new(product_id, number);
    let inserted = conn.execute(
        "INSERT INTO product_variations (uuid, product_uuid, number, stock)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (product_uuid, number) DO NOTHING;",
        params![
            candidate.id.to_string(),
            product_id.to_string(),
            number,
            candidate.stock,
        ],
    )?;

    let variation = load_variation(conn, product_id, number)?.ok_or_else(|| {
        RepoError::InvalidData(format!(
            "variation {number} of product {product_id} missing after insert"
        ))
    })?;

    if inserted == 1 {
        Ok(VariationLookup::Created(variation))
    } else {
        Ok(VariationLookup::Found(variation))
    }
}

pub(crate) fn load_variation(
    conn: &Connection,
    product_id: ProductId,
    number: f64,
) -> RepoResult<Option<ProductVariation>> {
    let mut stmt = conn.prepare(&format!(
        "{VARIATION_SELECT_SQL} WHERE product_uuid = ?1 AND number = ?2;"
    ))?;
    let row = stmt
        .query_row(params![product_id.to_string(), number], |row| {
            Ok(parse_variation_row(row))
        })
        .optional()?;
    row.transpose()
}

pub(crate) fn load_variation_by_id(
    conn: &Connection,
    id: VariationId,
) -> RepoResult<Option<ProductVariation>> {
    let mut stmt = conn.prepare(&format!("{VARIATION_SELECT_SQL} WHERE uuid = ?1;"))?;
    let row = stmt
        .query_row([id.to_string()], |row| Ok(parse_variation_row(row)))
        .optional()?;
    row.transpose()
}

/// Writes `new_stock` only if the stored value still equals `expected`.
pub(crate) fn compare_and_swap_variation_stock(
    conn: &Connection,
    id: VariationId,
    expected: f64,
    new_stock: f64,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE product_variations
         SET
            stock = ?3,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE uuid = ?1
           AND stock = ?2;",
        params![id.to_string(), expected, new_stock],
    )?;

    if changed == 0 {
        return Err(RepoError::StockConflict {
            entity: "product variation",
            id,
        });
    }

    Ok(())
}

fn product_exists(conn: &Connection, product_id: ProductId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM products WHERE uuid = ?1);",
        [product_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_product_row(row: &Row<'_>) -> RepoResult<Product> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Product {
        id: parse_uuid(&uuid_text, "products.uuid")?,
        name: row.get("name")?,
        description: row.get("description")?,
        price: row.get("price")?,
    })
}

fn parse_variation_row(row: &Row<'_>) -> RepoResult<ProductVariation> {
    let uuid_text: String = row.get("uuid")?;
    let product_text: String = row.get("product_uuid")?;
    let id: Uuid = parse_uuid(&uuid_text, "product_variations.uuid")?;
    Ok(ProductVariation {
        id,
        product_id: parse_uuid(&product_text, "product_variations.product_uuid")?,
        number: row.get("number")?,
        stock: row.get("stock")?,
    })
}
