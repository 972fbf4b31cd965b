//! The quantity-at-rest table and its transactional access helpers.
//!
//! The `pub(crate)` functions here are the only way the movement engine,
//! reservation manager and workflows touch `stock_levels` rows. They run on
//! the caller's transaction and take row locks on backends that support
//! them, so a concurrent availability check and decrement on the same
//! (product, location, lot) key serialize instead of racing.

use crate::auth::{ActorContext, Capability};
use crate::db::{self, DbPool};
use crate::entities::stock_level::{self, Entity as StockLevel};
use crate::errors::ServiceError;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

fn triple_filter(
    company_id: Uuid,
    product_id: Uuid,
    location_id: Uuid,
    lot_id: Option<Uuid>,
) -> sea_orm::Condition {
    let mut condition = sea_orm::Condition::all()
        .add(stock_level::Column::CompanyId.eq(company_id))
        .add(stock_level::Column::ProductId.eq(product_id))
        .add(stock_level::Column::LocationId.eq(location_id));
    condition = match lot_id {
        Some(lot) => condition.add(stock_level::Column::LotId.eq(lot)),
        None => condition.add(stock_level::Column::LotId.is_null()),
    };
    condition
}

/// Looks up the row for a triple, taking a row lock where the backend
/// supports it. Mutating callers must use this rather than a plain find.
pub(crate) async fn find_for_update<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    product_id: Uuid,
    location_id: Uuid,
    lot_id: Option<Uuid>,
) -> Result<Option<stock_level::Model>, ServiceError> {
    let mut query =
        StockLevel::find().filter(triple_filter(company_id, product_id, location_id, lot_id));
    if db::supports_row_locks(conn.get_database_backend()) {
        query = query.lock_exclusive();
    }
    query.one(conn).await.map_err(ServiceError::db_error)
}

/// Fetches the row for a triple, creating a zero row on first touch.
pub(crate) async fn get_or_create<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    product_id: Uuid,
    location_id: Uuid,
    lot_id: Option<Uuid>,
) -> Result<stock_level::Model, ServiceError> {
    if let Some(level) =
        find_for_update(conn, company_id, product_id, location_id, lot_id).await?
    {
        return Ok(level);
    }

    let level = stock_level::ActiveModel {
        product_id: Set(product_id),
        location_id: Set(location_id),
        lot_id: Set(lot_id),
        quantity: Set(Decimal::ZERO),
        reserved_quantity: Set(Decimal::ZERO),
        company_id: Set(company_id),
        ..Default::default()
    };
    level
        .insert(conn)
        .await
        .map_err(|e| ServiceError::conflict_on_unique(e, "stock level"))
}

pub(crate) async fn update_quantity<C: ConnectionTrait>(
    conn: &C,
    level: stock_level::Model,
    new_quantity: Decimal,
) -> Result<stock_level::Model, ServiceError> {
    let mut active: stock_level::ActiveModel = level.into();
    active.quantity = Set(new_quantity);
    active.update(conn).await.map_err(ServiceError::db_error)
}

pub(crate) async fn update_reserved<C: ConnectionTrait>(
    conn: &C,
    level: stock_level::Model,
    new_reserved: Decimal,
) -> Result<stock_level::Model, ServiceError> {
    let mut active: stock_level::ActiveModel = level.into();
    active.reserved_quantity = Set(new_reserved);
    active.update(conn).await.map_err(ServiceError::db_error)
}

/// Total physical quantity for a product across all locations and lots.
/// Valuation reads this *before* the current movement's increment lands,
/// otherwise the incoming quantity would be double-counted in the average.
pub(crate) async fn product_total_quantity<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    product_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let levels = StockLevel::find()
        .filter(stock_level::Column::CompanyId.eq(company_id))
        .filter(stock_level::Column::ProductId.eq(product_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(levels.iter().map(|l| l.quantity).sum())
}

/// Per-product quantity and reservation totals across all locations.
pub(crate) async fn product_totals<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    product_id: Uuid,
) -> Result<(Decimal, Decimal), ServiceError> {
    let levels = StockLevel::find()
        .filter(stock_level::Column::CompanyId.eq(company_id))
        .filter(stock_level::Column::ProductId.eq(product_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    let quantity = levels.iter().map(|l| l.quantity).sum();
    let reserved = levels.iter().map(|l| l.reserved_quantity).sum();
    Ok((quantity, reserved))
}

/// Aggregate view of one product's stock position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStockTotals {
    pub product_id: Uuid,
    pub total_quantity: Decimal,
    pub total_reserved: Decimal,
    pub total_available: Decimal,
}

/// Read-side access to stock levels.
#[derive(Clone)]
pub struct StockLevelService {
    db_pool: Arc<DbPool>,
}

impl StockLevelService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Gets the stock level row for a triple, if one has been created.
    #[instrument(skip(self, ctx))]
    pub async fn get(
        &self,
        ctx: &ActorContext,
        product_id: Uuid,
        location_id: Uuid,
        lot_id: Option<Uuid>,
    ) -> Result<Option<stock_level::Model>, ServiceError> {
        ctx.require(Capability::StockView)?;
        StockLevel::find()
            .filter(triple_filter(ctx.company_id, product_id, location_id, lot_id))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Available quantity for a triple; a missing row reads as zero.
    #[instrument(skip(self, ctx))]
    pub async fn available(
        &self,
        ctx: &ActorContext,
        product_id: Uuid,
        location_id: Uuid,
        lot_id: Option<Uuid>,
    ) -> Result<Decimal, ServiceError> {
        Ok(self
            .get(ctx, product_id, location_id, lot_id)
            .await?
            .map(|l| l.available_quantity())
            .unwrap_or(Decimal::ZERO))
    }

    /// All stock level rows for a product.
    #[instrument(skip(self, ctx))]
    pub async fn list_for_product(
        &self,
        ctx: &ActorContext,
        product_id: Uuid,
    ) -> Result<Vec<stock_level::Model>, ServiceError> {
        ctx.require(Capability::StockView)?;
        StockLevel::find()
            .filter(stock_level::Column::CompanyId.eq(ctx.company_id))
            .filter(stock_level::Column::ProductId.eq(product_id))
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Company-wide totals for a product.
    #[instrument(skip(self, ctx))]
    pub async fn totals_for_product(
        &self,
        ctx: &ActorContext,
        product_id: Uuid,
    ) -> Result<ProductStockTotals, ServiceError> {
        ctx.require(Capability::StockView)?;
        let (quantity, reserved) =
            product_totals(&*self.db_pool, ctx.company_id, product_id).await?;
        Ok(ProductStockTotals {
            product_id,
            total_quantity: quantity,
            total_reserved: reserved,
            total_available: quantity - reserved,
        })
    }
}
