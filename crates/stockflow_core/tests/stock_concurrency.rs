use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use stockflow_core::db::open_db;
use stockflow_core::{
    Material, MaterialId, MaterialRepository, Movement, MovementError, MovementLineRequest,
    MovementRequest, MovementService, SqliteMaterialRepository, SqliteMovementRepository,
};

fn seed_steel(path: &Path, stock: f64) -> MaterialId {
    let conn = open_db(path).unwrap();
    let mut steel = Material::new("Steel");
    steel.stock = stock;
    SqliteMaterialRepository::new(&conn)
        .create_material(&steel)
        .unwrap()
}

fn race_outputs(
    path: &Path,
    material_id: MaterialId,
    quantity: f64,
    writers: usize,
) -> Vec<Result<Movement, MovementError>> {
    let barrier = Arc::new(Barrier::new(writers));
    let handles: Vec<_> = (0..writers)
        .map(|writer| {
            let barrier = Arc::clone(&barrier);
            let path = path.to_path_buf();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = MovementService::new(SqliteMovementRepository::new(&conn));
                let request = MovementRequest::new("output", true)
                    .with_line(MovementLineRequest::material(material_id, quantity));
                barrier.wait();
                service.create_movement(&request, writer as i64 + 1)
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect()
}

fn stock_of(path: &Path, material_id: MaterialId) -> f64 {
    let conn = open_db(path).unwrap();
    SqliteMaterialRepository::new(&conn)
        .get_material(material_id)
        .unwrap()
        .unwrap()
        .stock
}

#[test]
fn competing_outputs_cannot_both_spend_the_same_stock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stock.sqlite3");
    let steel = seed_steel(&path, 10.0);

    let results = race_outputs(&path, steel, 8.0, 2);

    let succeeded = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert!(results.iter().any(|result| matches!(
        result,
        Err(MovementError::InsufficientMaterialStock { available, .. }) if *available == 2.0
    )));
    assert_eq!(stock_of(&path, steel), 2.0);
}

#[test]
fn many_writers_drain_stock_without_going_negative() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stock.sqlite3");
    let steel = seed_steel(&path, 10.0);

    let results = race_outputs(&path, steel, 3.0, 5);

    let succeeded = results.iter().filter(|result| result.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|result| matches!(result, Err(MovementError::InsufficientMaterialStock { .. })))
        .count();
    assert_eq!(succeeded, 3);
    assert_eq!(rejected, 2);
    assert_eq!(stock_of(&path, steel), 1.0);
}
