mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stockcore::entities::stock_movement::MovementType;
use stockcore::errors::ServiceError;
use stockcore::services::movements::NewMovement;
use stockcore::services::reservations::NewReservation;
use uuid::Uuid;

fn reservation(product_id: Uuid, location_id: Uuid, quantity: Decimal) -> NewReservation {
    NewReservation {
        product_id,
        location_id,
        lot_id: None,
        quantity,
        reference_type: "sales_order".to_string(),
        reference_id: Uuid::new_v4(),
        reference_label: None,
        expiry_date: None,
        notes: None,
    }
}

#[tokio::test]
async fn reserving_reduces_availability_and_rejects_overdraw() {
    let app = spawn_app().await;
    let product = seed_product(&app, "RSV-01").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;
    seed_stock(&app, product.id, location.id, None, dec!(100)).await;

    app.services
        .reservations
        .create(&app.ctx, reservation(product.id, location.id, dec!(30)))
        .await
        .unwrap();

    let available = app
        .services
        .stock_levels
        .available(&app.ctx, product.id, location.id, None)
        .await
        .unwrap();
    assert_eq!(available, dec!(70));

    let err = app
        .services
        .reservations
        .create(&app.ctx, reservation(product.id, location.id, dec!(80)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    // the rejected attempt changed nothing
    assert_eq!(reserved_at(&app, product.id, location.id, None).await, dec!(30));
    assert_eq!(quantity_at(&app, product.id, location.id, None).await, dec!(100));
}

#[tokio::test]
async fn reservation_requires_positive_quantity() {
    let app = spawn_app().await;
    let product = seed_product(&app, "RSV-02").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;
    seed_stock(&app, product.id, location.id, None, dec!(10)).await;

    let err = app
        .services
        .reservations
        .create(&app.ctx, reservation(product.id, location.id, dec!(0)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));
}

#[tokio::test]
async fn missing_stock_level_reads_as_zero_available() {
    let app = spawn_app().await;
    let product = seed_product(&app, "RSV-03").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;

    let err = app
        .services
        .reservations
        .create(&app.ctx, reservation(product.id, location.id, dec!(1)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
}

#[tokio::test]
async fn release_is_not_idempotent_but_fails_safely() {
    let app = spawn_app().await;
    let product = seed_product(&app, "RSV-04").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;
    seed_stock(&app, product.id, location.id, None, dec!(50)).await;

    let created = app
        .services
        .reservations
        .create(&app.ctx, reservation(product.id, location.id, dec!(20)))
        .await
        .unwrap();
    assert_eq!(reserved_at(&app, product.id, location.id, None).await, dec!(20));

    let released = app
        .services
        .reservations
        .release(&app.ctx, created.id)
        .await
        .unwrap();
    assert_eq!(released.status, "released");
    assert_eq!(reserved_at(&app, product.id, location.id, None).await, dec!(0));

    // second release fails with InvalidState and changes nothing
    let err = app
        .services
        .reservations
        .release(&app.ctx, created.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
    assert_eq!(reserved_at(&app, product.id, location.id, None).await, dec!(0));
}

#[tokio::test]
async fn release_by_reference_frees_all_matching_holds() {
    let app = spawn_app().await;
    let product = seed_product(&app, "RSV-05").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;
    seed_stock(&app, product.id, location.id, None, dec!(100)).await;

    let order_id = Uuid::new_v4();
    for quantity in [dec!(10), dec!(15)] {
        app.services
            .reservations
            .create(
                &app.ctx,
                NewReservation {
                    reference_id: order_id,
                    ..reservation(product.id, location.id, quantity)
                },
            )
            .await
            .unwrap();
    }
    // an unrelated hold that must survive
    app.services
        .reservations
        .create(&app.ctx, reservation(product.id, location.id, dec!(5)))
        .await
        .unwrap();
    assert_eq!(reserved_at(&app, product.id, location.id, None).await, dec!(30));

    let released = app
        .services
        .reservations
        .release_by_reference(&app.ctx, "sales_order", order_id)
        .await
        .unwrap();
    assert_eq!(released, 2);
    assert_eq!(reserved_at(&app, product.id, location.id, None).await, dec!(5));

    // nothing left to release for that order
    let released = app
        .services
        .reservations
        .release_by_reference(&app.ctx, "sales_order", order_id)
        .await
        .unwrap();
    assert_eq!(released, 0);
}

#[tokio::test]
async fn sweep_expires_stale_holds_and_is_idempotent() {
    let app = spawn_app().await;
    let product = seed_product(&app, "RSV-06").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;
    seed_stock(&app, product.id, location.id, None, dec!(40)).await;

    let stale = app
        .services
        .reservations
        .create(
            &app.ctx,
            NewReservation {
                expiry_date: Some(Utc::now() - Duration::hours(1)),
                ..reservation(product.id, location.id, dec!(10))
            },
        )
        .await
        .unwrap();
    // a hold with no expiry never expires
    app.services
        .reservations
        .create(&app.ctx, reservation(product.id, location.id, dec!(4)))
        .await
        .unwrap();

    let outcome = app.services.reservations.sweep_expired().await.unwrap();
    assert_eq!(outcome.released, 1);
    assert_eq!(reserved_at(&app, product.id, location.id, None).await, dec!(4));

    let reloaded = app.services.reservations.get(&app.ctx, stale.id).await.unwrap();
    assert_eq!(reloaded.status, "expired");

    // running again finds nothing
    let outcome = app.services.reservations.sweep_expired().await.unwrap();
    assert_eq!(outcome.released, 0);
}

#[tokio::test]
async fn reserved_units_are_not_available_to_outbound_movements() {
    let app = spawn_app().await;
    let product = seed_product(&app, "RSV-07").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;
    seed_stock(&app, product.id, location.id, None, dec!(10)).await;

    app.services
        .reservations
        .create(&app.ctx, reservation(product.id, location.id, dec!(5)))
        .await
        .unwrap();

    let out = app
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

    let err = app.services.movements.validate(&app.ctx, out.id).await.unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
}

#[tokio::test]
async fn lot_scoped_reservations_use_their_own_row() {
    let app = spawn_app().await;
    let product = seed_product(&app, "RSV-08").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;
    let lot = seed_lot(&app, product.id, "LOT-A").await;
    seed_stock(&app, product.id, location.id, None, dec!(10)).await;
    seed_stock(&app, product.id, location.id, Some(lot.id), dec!(3)).await;

    // the lot row only has 3 available even though the lot-less row has 10
    let err = app
        .services
        .reservations
        .create(
            &app.ctx,
            NewReservation {
                lot_id: Some(lot.id),
                ..reservation(product.id, location.id, dec!(5))
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    app.services
        .reservations
        .create(
            &app.ctx,
            NewReservation {
                lot_id: Some(lot.id),
                ..reservation(product.id, location.id, dec!(3))
            },
        )
        .await
        .unwrap();
    assert_eq!(
        reserved_at(&app, product.id, location.id, Some(lot.id)).await,
        dec!(3)
    );
    assert_eq!(reserved_at(&app, product.id, location.id, None).await, dec!(0));
}
