mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use common::*;
use rust_decimal_macros::dec;
use stockcore::entities::stock_movement::{MovementStatus, MovementType};
use stockcore::errors::ServiceError;
use stockcore::services::movements::MovementFilter;
use stockcore::services::transfers::{
    NewTransfer, NewTransferLine, ReceiveTransfer, ReceivedLine, ShipTransfer,
};

fn new_transfer(
    source_warehouse_id: uuid::Uuid,
    destination_warehouse_id: uuid::Uuid,
    lines: Vec<NewTransferLine>,
) -> NewTransfer {
    NewTransfer {
        source_warehouse_id,
        destination_warehouse_id,
        transfer_date: Utc::now().date_naive(),
        expected_arrival_date: None,
        notes: None,
        lines,
    }
}

#[tokio::test]
async fn full_workflow_with_shortage_on_receipt() {
    let app = spawn_app().await;
    let product = seed_product(&app, "TRF-01").await;
    let wh1 = seed_warehouse(&app, "WH1").await;
    let wh2 = seed_warehouse(&app, "WH2").await;
    let wh1_loc = seed_location(&app, wh1.id, "A1").await;
    let wh2_loc = seed_location(&app, wh2.id, "B1").await;
    seed_stock(&app, product.id, wh1_loc.id, None, dec!(50)).await;

    let details = app
        .services
        .transfers
        .create(
            &app.ctx,
            new_transfer(
                wh1.id,
                wh2.id,
                vec![NewTransferLine {
                    product_id: product.id,
                    lot_id: None,
                    quantity_sent: dec!(20),
                }],
            ),
        )
        .await
        .unwrap();
    assert!(details.transfer.reference.starts_with("TRF-"));
    assert_eq!(details.transfer.status, "draft");
    assert_eq!(details.lines.len(), 1);

    // validate: source debited, one validated out movement on the ledger
    let details = app
        .services
        .transfers
        .validate(&app.ctx, details.transfer.id)
        .await
        .unwrap();
    assert_eq!(details.transfer.status, "validated");
    assert_eq!(quantity_at(&app, product.id, wh1_loc.id, None).await, dec!(30));

    let (outs, _) = app
        .services
        .movements
        .list(
            &app.ctx,
            MovementFilter {
                movement_type: Some(MovementType::Out),
                status: Some(MovementStatus::Validated),
                ..Default::default()
            },
            1,
            20,
        )
        .await
        .unwrap();
    assert_eq!(outs.len(), 1);
    assert_eq!(outs[0].quantity, dec!(20));
    assert_eq!(outs[0].source_location_id, Some(wh1_loc.id));

    // ship: paperwork only
    let shipped = app
        .services
        .transfers
        .ship(
            &app.ctx,
            details.transfer.id,
            ShipTransfer {
                transporter: Some("DHL".to_string()),
                tracking_number: Some("TRK-123".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(shipped.status, "in_transit");
    assert_eq!(quantity_at(&app, product.id, wh1_loc.id, None).await, dec!(30));
    assert_eq!(quantity_at(&app, product.id, wh2_loc.id, None).await, dec!(0));

    // receive 18 of 20: destination credited with 18, an in movement and a
    // discrepancy adjustment both land on the ledger
    let line_id = details.lines[0].id;
    let received = app
        .services
        .transfers
        .receive(
            &app.ctx,
            details.transfer.id,
            ReceiveTransfer {
                lines: vec![ReceivedLine {
                    line_id,
                    quantity_received: dec!(18),
                }],
            },
        )
        .await
        .unwrap();
    assert_eq!(received.transfer.status, "received");
    assert!(received.transfer.actual_arrival_date.is_some());
    assert_eq!(received.lines[0].quantity_received, Some(dec!(18)));
    assert_eq!(quantity_at(&app, product.id, wh2_loc.id, None).await, dec!(18));

    let (ins, _) = app
        .services
        .movements
        .list(
            &app.ctx,
            MovementFilter {
                movement_type: Some(MovementType::In),
                ..Default::default()
            },
            1,
            20,
        )
        .await
        .unwrap();
    assert_eq!(ins.len(), 1);
    assert_eq!(ins[0].quantity, dec!(18));

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
    assert_eq!(adjustments[0].quantity, dec!(18));
}

#[tokio::test]
async fn receive_defaults_to_sent_quantity() {
    let app = spawn_app().await;
    let product = seed_product(&app, "TRF-02").await;
    let wh1 = seed_warehouse(&app, "WH1").await;
    let wh2 = seed_warehouse(&app, "WH2").await;
    let wh1_loc = seed_location(&app, wh1.id, "A1").await;
    let wh2_loc = seed_location(&app, wh2.id, "B1").await;
    seed_stock(&app, product.id, wh1_loc.id, None, dec!(30)).await;

    let details = app
        .services
        .transfers
        .create(
            &app.ctx,
            new_transfer(
                wh1.id,
                wh2.id,
                vec![NewTransferLine {
                    product_id: product.id,
                    lot_id: None,
                    quantity_sent: dec!(12),
                }],
            ),
        )
        .await
        .unwrap();
    app.services.transfers.validate(&app.ctx, details.transfer.id).await.unwrap();
    app.services
        .transfers
        .ship(&app.ctx, details.transfer.id, ShipTransfer::default())
        .await
        .unwrap();

    let received = app
        .services
        .transfers
        .receive(&app.ctx, details.transfer.id, ReceiveTransfer::default())
        .await
        .unwrap();
    assert_eq!(received.lines[0].quantity_received, Some(dec!(12)));
    assert_eq!(quantity_at(&app, product.id, wh2_loc.id, None).await, dec!(12));

    // full receipt: no discrepancy adjustment
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
    assert!(adjustments.is_empty());
}

#[tokio::test]
async fn create_rejects_same_warehouse_and_bad_lines() {
    let app = spawn_app().await;
    let product = seed_product(&app, "TRF-03").await;
    let wh1 = seed_warehouse(&app, "WH1").await;
    let wh2 = seed_warehouse(&app, "WH2").await;

    let err = app
        .services
        .transfers
        .create(&app.ctx, new_transfer(wh1.id, wh1.id, vec![]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));

    let err = app
        .services
        .transfers
        .create(
            &app.ctx,
            new_transfer(
                wh1.id,
                wh2.id,
                vec![NewTransferLine {
                    product_id: product.id,
                    lot_id: None,
                    quantity_sent: dec!(0),
                }],
            ),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));
}

#[tokio::test]
async fn validate_requires_lines_and_stock() {
    let app = spawn_app().await;
    let product = seed_product(&app, "TRF-04").await;
    let other = seed_product(&app, "TRF-04B").await;
    let wh1 = seed_warehouse(&app, "WH1").await;
    let wh2 = seed_warehouse(&app, "WH2").await;
    let wh1_loc = seed_location(&app, wh1.id, "A1").await;
    seed_location(&app, wh2.id, "B1").await;
    seed_stock(&app, product.id, wh1_loc.id, None, dec!(10)).await;

    // no lines
    let empty = app
        .services
        .transfers
        .create(&app.ctx, new_transfer(wh1.id, wh2.id, vec![]))
        .await
        .unwrap();
    let err = app
        .services
        .transfers
        .validate(&app.ctx, empty.transfer.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));

    // second line short: the whole validation rolls back, including the
    // first line's decrement
    let partial = app
        .services
        .transfers
        .create(
            &app.ctx,
            new_transfer(
                wh1.id,
                wh2.id,
                vec![
                    NewTransferLine {
                        product_id: product.id,
                        lot_id: None,
                        quantity_sent: dec!(5),
                    },
                    NewTransferLine {
                        product_id: other.id,
                        lot_id: None,
                        quantity_sent: dec!(1),
                    },
                ],
            ),
        )
        .await
        .unwrap();
    let err = app
        .services
        .transfers
        .validate(&app.ctx, partial.transfer.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(quantity_at(&app, product.id, wh1_loc.id, None).await, dec!(10));
    let reloaded = app
        .services
        .transfers
        .get(&app.ctx, partial.transfer.id)
        .await
        .unwrap();
    assert_eq!(reloaded.transfer.status, "draft");
}

#[tokio::test]
async fn cancel_restores_source_after_validation() {
    let app = spawn_app().await;
    let product = seed_product(&app, "TRF-05").await;
    let wh1 = seed_warehouse(&app, "WH1").await;
    let wh2 = seed_warehouse(&app, "WH2").await;
    let wh1_loc = seed_location(&app, wh1.id, "A1").await;
    seed_location(&app, wh2.id, "B1").await;
    seed_stock(&app, product.id, wh1_loc.id, None, dec!(25)).await;

    let details = app
        .services
        .transfers
        .create(
            &app.ctx,
            new_transfer(
                wh1.id,
                wh2.id,
                vec![NewTransferLine {
                    product_id: product.id,
                    lot_id: None,
                    quantity_sent: dec!(25),
                }],
            ),
        )
        .await
        .unwrap();
    app.services.transfers.validate(&app.ctx, details.transfer.id).await.unwrap();
    app.services
        .transfers
        .ship(&app.ctx, details.transfer.id, ShipTransfer::default())
        .await
        .unwrap();
    assert_eq!(quantity_at(&app, product.id, wh1_loc.id, None).await, dec!(0));

    let cancelled = app
        .services
        .transfers
        .cancel(&app.ctx, details.transfer.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(quantity_at(&app, product.id, wh1_loc.id, None).await, dec!(25));
}

#[tokio::test]
async fn lifecycle_guards_reject_out_of_order_calls() {
    let app = spawn_app().await;
    let product = seed_product(&app, "TRF-06").await;
    let wh1 = seed_warehouse(&app, "WH1").await;
    let wh2 = seed_warehouse(&app, "WH2").await;
    let wh1_loc = seed_location(&app, wh1.id, "A1").await;
    seed_location(&app, wh2.id, "B1").await;
    seed_stock(&app, product.id, wh1_loc.id, None, dec!(10)).await;

    let details = app
        .services
        .transfers
        .create(
            &app.ctx,
            new_transfer(
                wh1.id,
                wh2.id,
                vec![NewTransferLine {
                    product_id: product.id,
                    lot_id: None,
                    quantity_sent: dec!(10),
                }],
            ),
        )
        .await
        .unwrap();

    // cannot ship or receive a draft
    let err = app
        .services
        .transfers
        .ship(&app.ctx, details.transfer.id, ShipTransfer::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
    let err = app
        .services
        .transfers
        .receive(&app.ctx, details.transfer.id, ReceiveTransfer::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    app.services.transfers.validate(&app.ctx, details.transfer.id).await.unwrap();
    app.services
        .transfers
        .ship(&app.ctx, details.transfer.id, ShipTransfer::default())
        .await
        .unwrap();
    app.services
        .transfers
        .receive(&app.ctx, details.transfer.id, ReceiveTransfer::default())
        .await
        .unwrap();

    // a received transfer cannot be cancelled
    let err = app
        .services
        .transfers
        .cancel(&app.ctx, details.transfer.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}
