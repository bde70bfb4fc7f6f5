use rusqlite::Connection;
use stockflow_core::db::open_db_in_memory;
use stockflow_core::{
    Material, MaterialRepository, MovementError, MovementErrorKind, MovementLineRequest,
    MovementRepository, MovementRequest, MovementService, MovementType, Product,
    ProductRepository, RepoError, SqliteMaterialRepository, SqliteMovementRepository,
    SqliteProductRepository, StagedLine, StagedMovement, StockItem, StockUnitOfWork, StockUpdate,
};

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn refuse_detail_writes(conn: &Connection) {
    conn.execute_batch(
        "CREATE TRIGGER refuse_movement_details
         BEFORE INSERT ON movement_details
         BEGIN
             SELECT RAISE(ABORT, 'detail write refused');
         END;",
    )
    .unwrap();
}

#[test]
fn store_failure_on_detail_write_leaves_no_trace() {
    let conn = open_db_in_memory().unwrap();
    let materials = SqliteMaterialRepository::new(&conn);
    let mut steel = Material::new("Steel");
    steel.stock = 10.0;
    let steel_id = materials.create_material(&steel).unwrap();
    refuse_detail_writes(&conn);

    let service = MovementService::new(SqliteMovementRepository::new(&conn));
    let request = MovementRequest::new("output", true)
        .with_line(MovementLineRequest::material(steel_id, 4.0));
    let err = service.create_movement(&request, 7).unwrap_err();

    assert!(matches!(err, MovementError::Repo(RepoError::Db(_))));
    assert_eq!(err.kind(), MovementErrorKind::Infrastructure);
    assert_eq!(err.code(), "store_failure");
    assert_eq!(count(&conn, "movements"), 0);
    assert_eq!(
        materials.get_material(steel_id).unwrap().unwrap().stock,
        10.0
    );
}

#[test]
fn store_failure_discards_provisioned_variation() {
    let conn = open_db_in_memory().unwrap();
    let products = SqliteProductRepository::new(&conn);
    let boot = products.create_product(&Product::new("Boot")).unwrap();
    refuse_detail_writes(&conn);

    let service = MovementService::new(SqliteMovementRepository::new(&conn));
    let request = MovementRequest::new("input", false)
        .with_line(MovementLineRequest::product_variation(boot, 41.0, 3.0));
    let err = service.create_movement(&request, 7).unwrap_err();

    assert_eq!(err.kind(), MovementErrorKind::Infrastructure);
    assert_eq!(count(&conn, "movements"), 0);
    assert!(products.list_variations(boot).unwrap().is_empty());
}

#[test]
fn commit_with_stale_expectation_is_a_conflict() {
    let conn = open_db_in_memory().unwrap();
    let materials = SqliteMaterialRepository::new(&conn);
    let mut steel = Material::new("Steel");
    steel.stock = 10.0;
    let steel_id = materials.create_material(&steel).unwrap();

    let repo = SqliteMovementRepository::new(&conn);
    let unit = repo.begin_stock_unit().unwrap();
    let mut loaded = unit.load_material(steel_id).unwrap().unwrap();
    loaded.stock = 6.0;
    let staged = StagedMovement {
        movement_type: MovementType::Output,
        is_material_movement: true,
        employee_id: 7,
        lines: vec![StagedLine {
            quantity: 4.0,
            item: StockItem::Material(loaded),
        }],
        updates: vec![StockUpdate::Material {
            id: steel_id,
            expected: 9.0,
            new_stock: 6.0,
        }],
    };

    let err = unit.commit_movement(staged).unwrap_err();
    assert!(matches!(
        err,
        RepoError::StockConflict { entity: "material", id } if id == steel_id
    ));
    assert_eq!(count(&conn, "movements"), 0);
    assert_eq!(count(&conn, "movement_details"), 0);
    assert_eq!(
        materials.get_material(steel_id).unwrap().unwrap().stock,
        10.0
    );
}

#[test]
fn dropped_unit_rolls_back_provisioned_variation() {
    let conn = open_db_in_memory().unwrap();
    let products = SqliteProductRepository::new(&conn);
    let boot = products.create_product(&Product::new("Boot")).unwrap();

    let repo = SqliteMovementRepository::new(&conn);
    {
        let unit = repo.begin_stock_unit().unwrap();
        let lookup = unit.find_or_create_variation(boot, 44.0).unwrap();
        assert!(lookup.was_created());
        assert_eq!(lookup.variation().stock, 0.0);
    }

    assert!(products.get_variation(boot, 44.0).unwrap().is_none());
}
