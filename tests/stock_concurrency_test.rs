//! Concurrency behavior of the availability check: two racing consumers of
//! the same stock level row must serialize, so exactly one wins when both
//! ask for more than half of what remains. The test database runs on a
//! single connection, which serializes writers the way the production row
//! locks do on Postgres.

mod common;

use common::*;
use rust_decimal_macros::dec;
use stockcore::entities::stock_movement::MovementType;
use stockcore::services::movements::NewMovement;
use stockcore::services::reservations::NewReservation;
use uuid::Uuid;

#[tokio::test]
async fn racing_out_validations_cannot_both_win() {
    let app = spawn_app().await;
    let product = seed_product(&app, "RACE-01").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;
    seed_stock(&app, product.id, location.id, None, dec!(10)).await;

    // two draft movements, each wanting 8 of the 10 on hand
    let mut draft_ids = Vec::new();
    for _ in 0..2 {
        let movement = app
            .services
            .movements
            .create(
                &app.ctx,
                NewMovement {
                    movement_type: MovementType::Out,
                    product_id: product.id,
                    lot_id: None,
                    source_location_id: Some(location.id),
                    destination_location_id: None,
                    quantity: dec!(8),
                    unit_cost: None,
                    reason: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        draft_ids.push(movement.id);
    }

    let mut tasks = Vec::new();
    for movement_id in draft_ids {
        let services = app.services.clone();
        let ctx = app.ctx.clone();
        tasks.push(tokio::spawn(async move {
            services.movements.validate(&ctx, movement_id).await.is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(
        successes, 1,
        "exactly one of the racing validations may succeed"
    );
    assert_eq!(quantity_at(&app, product.id, location.id, None).await, dec!(2));
}

#[tokio::test]
async fn concurrent_reservations_stop_at_available_stock() {
    let app = spawn_app().await;
    let product = seed_product(&app, "RACE-02").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;
    seed_stock(&app, product.id, location.id, None, dec!(10)).await;

    // 20 concurrent holds of 1 unit each against 10 on hand
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let services = app.services.clone();
        let ctx = app.ctx.clone();
        let product_id = product.id;
        let location_id = location.id;
        tasks.push(tokio::spawn(async move {
            services
                .reservations
                .create(
                    &ctx,
                    NewReservation {
                        product_id,
                        location_id,
                        lot_id: None,
                        quantity: dec!(1),
                        reference_type: "sales_order".to_string(),
                        reference_id: Uuid::new_v4(),
                        reference_label: None,
                        expiry_date: None,
                        notes: None,
                    },
                )
                .await
                .is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(
        successes, 10,
        "exactly 10 reservations should succeed; got {}",
        successes
    );
    assert_eq!(reserved_at(&app, product.id, location.id, None).await, dec!(10));
    // the invariant held throughout: reserved never exceeded quantity
    let level = app
        .services
        .stock_levels
        .get(&app.ctx, product.id, location.id, None)
        .await
        .unwrap()
        .unwrap();
    assert!(level.reserved_quantity <= level.quantity);
    assert_eq!(level.available_quantity(), dec!(0));
}
