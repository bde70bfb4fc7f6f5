use crate::cli::*;
use anyhow::Context;
use log::info;
use serde::Serialize;
use std::path::Path;
use stockflow_core::config::DB_PATH_VAR;
use stockflow_core::db::open_db;
use stockflow_core::{
    CoreConfig, Material, MaterialRepository, MaterialType, MaterialTypeRepository, Movement,
    MovementRequest, MovementService, Product, ProductRepository, SqliteMaterialRepository,
    SqliteMaterialTypeRepository, SqliteMovementRepository, SqliteProductRepository, StockItem,
};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(cli.db.as_deref())?;
    config
        .init_logging()
        .context("failed to start logging")?;
    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;

    let json = cli.json;
    match cli.command {
        Command::MaterialType(args) => cmd_material_type(&conn, args.action, json),
        Command::Material(args) => cmd_material(&conn, args.action, json),
        Command::Product(args) => cmd_product(&conn, args.action, json),
        Command::Movement(args) => cmd_movement(&conn, args.action, json),
    }
}

fn resolve_config(db_override: Option<&Path>) -> anyhow::Result<CoreConfig> {
    let config = CoreConfig::from_lookup(|var| {
        if var == DB_PATH_VAR {
            if let Some(path) = db_override {
                return Some(path.display().to_string());
            }
        }
        std::env::var(var).ok()
    })?;
    Ok(config)
}

fn cmd_material_type(
    conn: &rusqlite::Connection,
    action: MaterialTypeAction,
    json: bool,
) -> anyhow::Result<()> {
    let repo = SqliteMaterialTypeRepository::new(conn);
    let material_types = match action {
        MaterialTypeAction::Add {
            name,
            unit,
            description,
        } => {
            let mut material_type = MaterialType::new(name, unit);
            material_type.description = description.unwrap_or_default();
            repo.create_material_type(&material_type)?;
            info!(
                "event=material_type_add module=cli status=ok material_type_id={} unit={}",
                material_type.id, unit
            );
            vec![material_type]
        }
        MaterialTypeAction::List => repo.list_material_types()?,
    };

    if json {
        return print_json(&material_types);
    }
    if material_types.is_empty() {
        println!("No material types.");
    }
    for material_type in &material_types {
        println!(
            "{}  {}  unit={} ({})",
            material_type.id,
            material_type.name,
            material_type.unit,
            material_type.unit.symbol()
        );
    }
    Ok(())
}

fn cmd_material(
    conn: &rusqlite::Connection,
    action: MaterialAction,
    json: bool,
) -> anyhow::Result<()> {
    let repo = SqliteMaterialRepository::new(conn);
    match action {
        MaterialAction::Add {
            name,
            description,
            price,
            stock,
            reposition_point,
            material_type,
        } => {
            let mut material = Material::new(name);
            if let Some(type_name) = material_type {
                let found = SqliteMaterialTypeRepository::new(conn)
                    .find_material_type_by_name(&type_name)?
                    .with_context(|| format!("material type `{type_name}` not found"))?;
                material = material.with_type(found);
            }
            material.description = description.unwrap_or_default();
            material.price = price;
            material.stock = stock;
            material.reposition_point = reposition_point;
            repo.create_material(&material)?;
            info!(
                "event=material_add module=cli status=ok material_id={}",
                material.id
            );
            print_materials(&[material], json)
        }
        MaterialAction::List => print_materials(&repo.list_materials()?, json),
        MaterialAction::Reposition => {
            print_materials(&repo.list_materials_to_reposition()?, json)
        }
    }
}

fn cmd_product(
    conn: &rusqlite::Connection,
    action: ProductAction,
    json: bool,
) -> anyhow::Result<()> {
    let repo = SqliteProductRepository::new(conn);
    match action {
        ProductAction::Add {
            name,
            description,
            price,
            variations,
        } => {
            let mut product = Product::new(name);
            product.description = description.unwrap_or_default();
            product.price = price;
            let product_id = repo.create_product(&product)?;
            for number in variations {
                repo.find_or_create_variation(product_id, number)?;
            }
            let variations = repo.list_variations(product_id)?;
            info!(
                "event=product_add module=cli status=ok product_id={} variations={}",
                product_id,
                variations.len()
            );

            if json {
                return print_json(&serde_json::json!({
                    "product": product,
                    "variations": variations,
                }));
            }
            println!("{}  {}  price={}", product.id, product.name, product.price);
            for variation in &variations {
                println!(
                    "  variation {}  number={}  stock={}",
                    variation.id, variation.number, variation.stock
                );
            }
            Ok(())
        }
    }
}

fn cmd_movement(
    conn: &rusqlite::Connection,
    action: MovementAction,
    json: bool,
) -> anyhow::Result<()> {
    let service = MovementService::new(SqliteMovementRepository::new(conn));
    match action {
        MovementAction::Create {
            movement_type,
            kind,
            employee,
            materials,
            variations,
        } => {
            let mut request =
                MovementRequest::new(movement_type, matches!(kind, MovementKind::Material));
            request.lines.extend(materials);
            request.lines.extend(variations);
            let movement = service.create_movement(&request, employee)?;
            print_movements(&[movement], json)
        }
        MovementAction::List { movement_type } => {
            let movements = match movement_type {
                Some(movement_type) => service.find_all_by_type(&movement_type)?,
                None => service.find_all()?,
            };
            print_movements(&movements, json)
        }
        MovementAction::Show { id } => print_movements(&[service.find_by_id(id)?], json),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_materials(materials: &[Material], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(materials);
    }
    if materials.is_empty() {
        println!("No materials.");
    }
    for material in materials {
        let flag = if material.needs_reposition() {
            "  [reposition]"
        } else {
            ""
        };
        let unit = material.unit_symbol().unwrap_or("");
        println!(
            "{}  {}  stock={}{unit}  reposition_point={}{unit}{}",
            material.id, material.name, material.stock, material.reposition_point, flag
        );
    }
    Ok(())
}

fn print_movements(movements: &[Movement], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(movements);
    }
    if movements.is_empty() {
        println!("No movements.");
    }
    for movement in movements {
        println!(
            "{}  {}  {}  employee={}  created_at={}",
            movement.id,
            movement.movement_type,
            if movement.is_material_movement {
                "material"
            } else {
                "product"
            },
            movement.employee_id,
            movement.created_at
        );
        for detail in &movement.details {
            match &detail.item {
                StockItem::Material(material) => {
                    let unit = material.unit_symbol().unwrap_or("");
                    println!(
                        "  #{} material {} ({})  quantity={}{unit}  stock={}{unit}",
                        detail.line_no, material.id, material.name, detail.quantity, material.stock
                    )
                }
                StockItem::ProductVariation(variation) => println!(
                    "  #{} variation {} (product {} number {})  quantity={}  stock={}",
                    detail.line_no,
                    variation.id,
                    variation.product_id,
                    variation.number,
                    detail.quantity,
                    variation.stock
                ),
            }
        }
    }
    Ok(())
}
