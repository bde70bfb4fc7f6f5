use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use stockflow_core::{MovementLineRequest, ProductId, UnitOfMeasurement};
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "stockflow",
    about = "Stock movements for materials and product variations",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Stock database file; overrides STOCKFLOW_DB_PATH
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register and list material types and their units
    MaterialType(MaterialTypeArgs),
    /// Register and inspect materials
    Material(MaterialArgs),
    /// Register products and their variations
    Product(ProductArgs),
    /// Record and inspect stock movements
    Movement(MovementArgs),
}

#[derive(Args)]
pub struct MaterialTypeArgs {
    #[command(subcommand)]
    pub action: MaterialTypeAction,
}

#[derive(Subcommand)]
pub enum MaterialTypeAction {
    /// Register a material type
    Add {
        name: String,
        /// Unit name or symbol (kg, m, m2, u, ...)
        #[arg(long, value_parser = parse_unit)]
        unit: UnitOfMeasurement,
        #[arg(long)]
        description: Option<String>,
    },
    /// List every material type
    List,
}

#[derive(Args)]
pub struct MaterialArgs {
    #[command(subcommand)]
    pub action: MaterialAction,
}

#[derive(Subcommand)]
pub enum MaterialAction {
    /// Register a material
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        price: f64,
        #[arg(long, default_value_t = 0.0)]
        stock: f64,
        #[arg(long, default_value_t = 0.0)]
        reposition_point: f64,
        /// Material type name
        #[arg(long = "type")]
        material_type: Option<String>,
    },
    /// List every material
    List,
    /// List materials at or below their reposition point
    Reposition,
}

#[derive(Args)]
pub struct ProductArgs {
    #[command(subcommand)]
    pub action: ProductAction,
}

#[derive(Subcommand)]
pub enum ProductAction {
    /// Register a product, optionally with variations at zero stock
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        price: f64,
        /// Variation number to provision (repeatable)
        #[arg(long = "variation")]
        variations: Vec<f64>,
    },
}

#[derive(Args)]
pub struct MovementArgs {
    #[command(subcommand)]
    pub action: MovementAction,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MovementKind {
    Material,
    Product,
}

#[derive(Subcommand)]
pub enum MovementAction {
    /// Record a movement
    Create {
        /// input | output
        #[arg(long = "type")]
        movement_type: String,
        #[arg(long, value_enum)]
        kind: MovementKind,
        #[arg(long)]
        employee: i64,
        /// MATERIAL_ID=QUANTITY (repeatable)
        #[arg(long = "material", value_parser = parse_material_line)]
        materials: Vec<MovementLineRequest>,
        /// PRODUCT_ID@NUMBER=QUANTITY (repeatable)
        #[arg(long = "variation", value_parser = parse_variation_line)]
        variations: Vec<MovementLineRequest>,
    },
    /// List movements, optionally of one type
    List {
        #[arg(long = "type")]
        movement_type: Option<String>,
    },
    /// Show one movement
    Show { id: Uuid },
}

pub fn parse_unit(value: &str) -> Result<UnitOfMeasurement, String> {
    UnitOfMeasurement::parse(value).ok_or_else(|| format!("unknown unit `{value}`"))
}

fn split_quantity(value: &str) -> Result<(&str, f64), String> {
    let (target, quantity) = value
        .rsplit_once('=')
        .ok_or_else(|| format!("`{value}` is missing `=QUANTITY`"))?;
    let quantity = quantity
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid quantity in `{value}`: {err}"))?;
    Ok((target.trim(), quantity))
}

pub fn parse_material_line(value: &str) -> Result<MovementLineRequest, String> {
    let (material, quantity) = split_quantity(value)?;
    let material_id = Uuid::parse_str(material)
        .map_err(|err| format!("invalid material id `{material}`: {err}"))?;
    Ok(MovementLineRequest::material(material_id, quantity))
}

pub fn parse_variation_line(value: &str) -> Result<MovementLineRequest, String> {
    let (target, quantity) = split_quantity(value)?;
    let (product, number) = target
        .split_once('@')
        .ok_or_else(|| format!("`{value}` is missing `@NUMBER`"))?;
    let product_id: ProductId = Uuid::parse_str(product.trim())
        .map_err(|err| format!("invalid product id `{product}`: {err}"))?;
    let number = number
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid variation number in `{value}`: {err}"))?;
    Ok(MovementLineRequest::product_variation(
        product_id, number, quantity,
    ))
}
