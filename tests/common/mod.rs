#![allow(dead_code)]

use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::sync::Arc;
use stockcore::entities::{lot, product, stock_level, stock_location, warehouse};
use stockcore::prelude::*;
use uuid::Uuid;

/// A wired module over an in-memory SQLite database. One connection so the
/// shared memory database and its migrations are visible everywhere; it
/// also serializes writers the way the production row locks do.
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub services: ServiceContainer,
    pub ctx: ActorContext,
}

pub async fn spawn_app() -> TestApp {
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.expect("sqlite connect");
    stockcore::db::run_migrations(&db).await.expect("migrations");

    let db = Arc::new(db);
    let (event_sender, receiver) = EventSender::channel(64);
    tokio::spawn(stockcore::events::process_events(receiver));

    let factory = ServiceFactory::new(db.clone(), event_sender)
        .with_audit_sink(Arc::new(NullAuditSink));
    let services = ServiceContainer::new(&factory);
    let ctx = ActorContext::system(Uuid::new_v4());

    TestApp { db, services, ctx }
}

pub struct ProductSpec {
    pub sku: String,
    pub cost_price: Decimal,
    pub reorder_point: Decimal,
    pub reorder_quantity: Decimal,
    pub optimal_order_quantity: Decimal,
    pub min_stock_level: Decimal,
    pub lead_time_days: i32,
}

impl Default for ProductSpec {
    fn default() -> Self {
        Self {
            sku: "SKU-0001".to_string(),
            cost_price: Decimal::ZERO,
            reorder_point: Decimal::ZERO,
            reorder_quantity: Decimal::ZERO,
            optimal_order_quantity: Decimal::ZERO,
            min_stock_level: Decimal::ZERO,
            lead_time_days: 0,
        }
    }
}

pub async fn seed_product_with(app: &TestApp, spec: ProductSpec) -> product::Model {
    product::ActiveModel {
        sku: Set(spec.sku.clone()),
        barcode: Set(None),
        name: Set(format!("Product {}", spec.sku)),
        description: Set(None),
        category_id: Set(None),
        product_type: Set("stockable".to_string()),
        unit_of_measure: Set("pce".to_string()),
        sale_price: Set(Decimal::ZERO),
        cost_price: Set(spec.cost_price),
        tracking_type: Set("none".to_string()),
        min_stock_level: Set(spec.min_stock_level),
        max_stock_level: Set(Decimal::ZERO),
        reorder_point: Set(spec.reorder_point),
        reorder_quantity: Set(spec.reorder_quantity),
        optimal_order_quantity: Set(spec.optimal_order_quantity),
        average_daily_consumption: Set(Decimal::ZERO),
        abc_classification: Set(None),
        lead_time_days: Set(spec.lead_time_days),
        is_active: Set(true),
        company_id: Set(app.ctx.company_id),
        ..Default::default()
    }
    .insert(&*app.db)
    .await
    .expect("seed product")
}

pub async fn seed_product(app: &TestApp, sku: &str) -> product::Model {
    seed_product_with(
        app,
        ProductSpec {
            sku: sku.to_string(),
            ..Default::default()
        },
    )
    .await
}

pub async fn seed_warehouse(app: &TestApp, code: &str) -> warehouse::Model {
    warehouse::ActiveModel {
        name: Set(format!("Warehouse {}", code)),
        code: Set(code.to_string()),
        address: Set(None),
        is_active: Set(true),
        company_id: Set(app.ctx.company_id),
        ..Default::default()
    }
    .insert(&*app.db)
    .await
    .expect("seed warehouse")
}

pub async fn seed_location(
    app: &TestApp,
    warehouse_id: Uuid,
    code: &str,
) -> stock_location::Model {
    stock_location::ActiveModel {
        warehouse_id: Set(warehouse_id),
        name: Set(format!("Location {}", code)),
        code: Set(code.to_string()),
        aisle: Set(None),
        shelf: Set(None),
        bin: Set(None),
        location_type: Set("storage".to_string()),
        is_active: Set(true),
        company_id: Set(app.ctx.company_id),
        ..Default::default()
    }
    .insert(&*app.db)
    .await
    .expect("seed location")
}

pub async fn seed_lot(app: &TestApp, product_id: Uuid, number: &str) -> lot::Model {
    lot::ActiveModel {
        product_id: Set(product_id),
        lot_number: Set(number.to_string()),
        expiry_date: Set(None),
        best_before_date: Set(None),
        manufacturing_date: Set(None),
        notes: Set(None),
        is_active: Set(true),
        company_id: Set(app.ctx.company_id),
        ..Default::default()
    }
    .insert(&*app.db)
    .await
    .expect("seed lot")
}

pub async fn seed_stock(
    app: &TestApp,
    product_id: Uuid,
    location_id: Uuid,
    lot_id: Option<Uuid>,
    quantity: Decimal,
) -> stock_level::Model {
    stock_level::ActiveModel {
        product_id: Set(product_id),
        location_id: Set(location_id),
        lot_id: Set(lot_id),
        quantity: Set(quantity),
        reserved_quantity: Set(Decimal::ZERO),
        company_id: Set(app.ctx.company_id),
        ..Default::default()
    }
    .insert(&*app.db)
    .await
    .expect("seed stock level")
}

/// Current quantity for a triple, zero when the row does not exist.
pub async fn quantity_at(
    app: &TestApp,
    product_id: Uuid,
    location_id: Uuid,
    lot_id: Option<Uuid>,
) -> Decimal {
    app.services
        .stock_levels
        .get(&app.ctx, product_id, location_id, lot_id)
        .await
        .expect("stock level lookup")
        .map(|l| l.quantity)
        .unwrap_or(Decimal::ZERO)
}

/// Current reserved quantity for a triple, zero when the row does not exist.
pub async fn reserved_at(
    app: &TestApp,
    product_id: Uuid,
    location_id: Uuid,
    lot_id: Option<Uuid>,
) -> Decimal {
    app.services
        .stock_levels
        .get(&app.ctx, product_id, location_id, lot_id)
        .await
        .expect("stock level lookup")
        .map(|l| l.reserved_quantity)
        .unwrap_or(Decimal::ZERO)
}
