mod common;

use assert_matches::assert_matches;
use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stockcore::entities::stock_movement::{MovementStatus, MovementType};
use stockcore::errors::ServiceError;
use stockcore::prelude::*;
use stockcore::services::movements::{MovementFilter, NewMovement, UpdateMovement};
use uuid::Uuid;

fn movement(movement_type: MovementType, product_id: Uuid, quantity: Decimal) -> NewMovement {
    NewMovement {
        movement_type,
        product_id,
        lot_id: None,
        source_location_id: None,
        destination_location_id: None,
        quantity,
        unit_cost: None,
        reason: None,
        notes: None,
    }
}

#[tokio::test]
async fn incoming_movement_credits_destination() {
    let app = spawn_app().await;
    let product = seed_product(&app, "IN-01").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;

    let created = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                destination_location_id: Some(location.id),
                ..movement(MovementType::In, product.id, dec!(25))
            },
        )
        .await
        .unwrap();

    assert_eq!(created.status, "draft");
    assert!(created.reference.starts_with("MOV-"));
    assert_eq!(quantity_at(&app, product.id, location.id, None).await, dec!(0));

    let validated = app
        .services
        .movements
        .validate(&app.ctx, created.id)
        .await
        .unwrap();
    assert_eq!(validated.status, "validated");
    assert!(validated.validated_at.is_some());
    assert_eq!(validated.validated_by, Some(app.ctx.user_id));
    assert_eq!(
        quantity_at(&app, product.id, location.id, None).await,
        dec!(25)
    );
}

#[tokio::test]
async fn outgoing_movement_requires_available_stock() {
    let app = spawn_app().await;
    let product = seed_product(&app, "OUT-01").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;
    seed_stock(&app, product.id, location.id, None, dec!(5)).await;

    let created = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                source_location_id: Some(location.id),
                ..movement(MovementType::Out, product.id, dec!(8))
            },
        )
        .await
        .unwrap();

    let err = app
        .services
        .movements
        .validate(&app.ctx, created.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    // the failed transition left everything untouched
    assert_eq!(quantity_at(&app, product.id, location.id, None).await, dec!(5));
    let reloaded = app.services.movements.get(&app.ctx, created.id).await.unwrap();
    assert_eq!(reloaded.status, "draft");
}

#[tokio::test]
async fn outgoing_movement_debits_source() {
    let app = spawn_app().await;
    let product = seed_product(&app, "OUT-02").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;
    seed_stock(&app, product.id, location.id, None, dec!(50)).await;

    let created = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                source_location_id: Some(location.id),
                ..movement(MovementType::Out, product.id, dec!(20))
            },
        )
        .await
        .unwrap();
    app.services.movements.validate(&app.ctx, created.id).await.unwrap();

    assert_eq!(
        quantity_at(&app, product.id, location.id, None).await,
        dec!(30)
    );
}

#[tokio::test]
async fn transfer_movement_moves_between_locations() {
    let app = spawn_app().await;
    let product = seed_product(&app, "TRN-01").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let source = seed_location(&app, warehouse.id, "A1").await;
    let destination = seed_location(&app, warehouse.id, "B1").await;
    seed_stock(&app, product.id, source.id, None, dec!(40)).await;

    let created = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                source_location_id: Some(source.id),
                destination_location_id: Some(destination.id),
                ..movement(MovementType::Transfer, product.id, dec!(15))
            },
        )
        .await
        .unwrap();
    app.services.movements.validate(&app.ctx, created.id).await.unwrap();

    assert_eq!(quantity_at(&app, product.id, source.id, None).await, dec!(25));
    assert_eq!(
        quantity_at(&app, product.id, destination.id, None).await,
        dec!(15)
    );
}

#[tokio::test]
async fn adjustment_sets_absolute_quantity() {
    let app = spawn_app().await;
    let product = seed_product(&app, "ADJ-01").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;
    seed_stock(&app, product.id, location.id, None, dec!(100)).await;

    let created = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                destination_location_id: Some(location.id),
                ..movement(MovementType::Adjustment, product.id, dec!(42))
            },
        )
        .await
        .unwrap();
    app.services.movements.validate(&app.ctx, created.id).await.unwrap();

    // set, not added
    assert_eq!(quantity_at(&app, product.id, location.id, None).await, dec!(42));
}

#[tokio::test]
async fn validate_is_a_one_way_transition() {
    let app = spawn_app().await;
    let product = seed_product(&app, "ONCE-01").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;

    let created = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                destination_location_id: Some(location.id),
                ..movement(MovementType::In, product.id, dec!(10))
            },
        )
        .await
        .unwrap();
    app.services.movements.validate(&app.ctx, created.id).await.unwrap();

    let err = app
        .services
        .movements
        .validate(&app.ctx, created.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
    // stock was not credited twice
    assert_eq!(quantity_at(&app, product.id, location.id, None).await, dec!(10));
}

#[tokio::test]
async fn cancel_reverses_validated_movements_exactly() {
    let app = spawn_app().await;
    let product = seed_product(&app, "REV-01").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let a = seed_location(&app, warehouse.id, "A1").await;
    let b = seed_location(&app, warehouse.id, "B1").await;
    seed_stock(&app, product.id, a.id, None, dec!(60)).await;

    // out then cancel: back to 60
    let out = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                source_location_id: Some(a.id),
                ..movement(MovementType::Out, product.id, dec!(10))
            },
        )
        .await
        .unwrap();
    app.services.movements.validate(&app.ctx, out.id).await.unwrap();
    assert_eq!(quantity_at(&app, product.id, a.id, None).await, dec!(50));
    app.services.movements.cancel(&app.ctx, out.id).await.unwrap();
    assert_eq!(quantity_at(&app, product.id, a.id, None).await, dec!(60));

    // transfer then cancel: both sides restored
    let transfer = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                source_location_id: Some(a.id),
                destination_location_id: Some(b.id),
                ..movement(MovementType::Transfer, product.id, dec!(25))
            },
        )
        .await
        .unwrap();
    app.services.movements.validate(&app.ctx, transfer.id).await.unwrap();
    assert_eq!(quantity_at(&app, product.id, a.id, None).await, dec!(35));
    assert_eq!(quantity_at(&app, product.id, b.id, None).await, dec!(25));
    app.services.movements.cancel(&app.ctx, transfer.id).await.unwrap();
    assert_eq!(quantity_at(&app, product.id, a.id, None).await, dec!(60));
    assert_eq!(quantity_at(&app, product.id, b.id, None).await, dec!(0));
}

#[tokio::test]
async fn validated_adjustment_cannot_be_cancelled() {
    let app = spawn_app().await;
    let product = seed_product(&app, "ADJ-02").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;
    seed_stock(&app, product.id, location.id, None, dec!(9)).await;

    let adjustment = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                destination_location_id: Some(location.id),
                ..movement(MovementType::Adjustment, product.id, dec!(30))
            },
        )
        .await
        .unwrap();
    app.services.movements.validate(&app.ctx, adjustment.id).await.unwrap();

    let err = app
        .services
        .movements
        .cancel(&app.ctx, adjustment.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    // status and stock untouched by the rejected cancel
    let reloaded = app.services.movements.get(&app.ctx, adjustment.id).await.unwrap();
    assert_eq!(reloaded.status, "validated");
    assert_eq!(quantity_at(&app, product.id, location.id, None).await, dec!(30));

    // cancelling a draft adjustment is still fine
    let draft = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                destination_location_id: Some(location.id),
                ..movement(MovementType::Adjustment, product.id, dec!(5))
            },
        )
        .await
        .unwrap();
    let cancelled = app.services.movements.cancel(&app.ctx, draft.id).await.unwrap();
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(quantity_at(&app, product.id, location.id, None).await, dec!(30));
}

#[tokio::test]
async fn cancel_twice_is_rejected() {
    let app = spawn_app().await;
    let product = seed_product(&app, "CXL-01").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;

    let created = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                destination_location_id: Some(location.id),
                ..movement(MovementType::In, product.id, dec!(5))
            },
        )
        .await
        .unwrap();
    app.services.movements.cancel(&app.ctx, created.id).await.unwrap();

    let err = app
        .services
        .movements
        .cancel(&app.ctx, created.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn create_rejects_bad_input() {
    let app = spawn_app().await;
    let product = seed_product(&app, "BAD-01").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;

    let err = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                destination_location_id: Some(location.id),
                ..movement(MovementType::In, product.id, dec!(0))
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));

    // in requires a destination
    let err = app
        .services
        .movements
        .create(&app.ctx, movement(MovementType::In, product.id, dec!(5)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));

    // out requires a source
    let err = app
        .services
        .movements
        .create(&app.ctx, movement(MovementType::Out, product.id, dec!(5)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));

    // transfer requires both
    let err = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                source_location_id: Some(location.id),
                ..movement(MovementType::Transfer, product.id, dec!(5))
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));
}

#[tokio::test]
async fn update_is_draft_only_and_limited_to_notes() {
    let app = spawn_app().await;
    let product = seed_product(&app, "UPD-01").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;

    let created = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                destination_location_id: Some(location.id),
                ..movement(MovementType::In, product.id, dec!(5))
            },
        )
        .await
        .unwrap();

    let updated = app
        .services
        .movements
        .update(
            &app.ctx,
            created.id,
            UpdateMovement {
                reason: Some("recount".to_string()),
                notes: Some("found extra pallet".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.reason.as_deref(), Some("recount"));

    app.services.movements.validate(&app.ctx, created.id).await.unwrap();
    let err = app
        .services
        .movements
        .update(&app.ctx, created.id, UpdateMovement::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn movements_are_tenant_scoped() {
    let app = spawn_app().await;
    let product = seed_product(&app, "TEN-01").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;

    let created = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                destination_location_id: Some(location.id),
                ..movement(MovementType::In, product.id, dec!(5))
            },
        )
        .await
        .unwrap();

    let other_tenant = ActorContext::system(Uuid::new_v4());
    let err = app
        .services
        .movements
        .get(&other_tenant, created.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn list_filters_by_status_and_type() {
    let app = spawn_app().await;
    let product = seed_product(&app, "LST-01").await;
    let warehouse = seed_warehouse(&app, "WH1").await;
    let location = seed_location(&app, warehouse.id, "A1").await;

    let first = app
        .services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                destination_location_id: Some(location.id),
                ..movement(MovementType::In, product.id, dec!(5))
            },
        )
        .await
        .unwrap();
    app.services.movements.validate(&app.ctx, first.id).await.unwrap();

    app.services
        .movements
        .create(
            &app.ctx,
            NewMovement {
                destination_location_id: Some(location.id),
                ..movement(MovementType::Adjustment, product.id, dec!(7))
            },
        )
        .await
        .unwrap();

    let (validated, total) = app
        .services
        .movements
        .list(
            &app.ctx,
            MovementFilter {
                status: Some(MovementStatus::Validated),
                ..Default::default()
            },
            1,
            20,
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(validated.len(), 1);
    assert_eq!(validated[0].id, first.id);

    let (adjustments, _) = app
        .services
        .movements
        .list(
            &app.ctx,
            MovementFilter {
                movement_type: Some(MovementType::Adjustment),
                ..Default::default()
            },
            1,
            20,
        )
        .await
        .unwrap();
    assert_eq!(adjustments.len(), 1);
    assert_eq!(adjustments[0].movement_type, "adjustment");
}
