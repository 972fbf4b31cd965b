//! Read-side stock KPIs and low-stock alerts. Pure aggregation; no writes.

use crate::auth::{ActorContext, Capability};
use crate::db::DbPool;
use crate::entities::lot::{self, Entity as Lot};
use crate::entities::product::{self, Entity as Product, PRODUCT_TYPE_STOCKABLE};
use crate::entities::stock_level::{self, Entity as StockLevel};
use crate::errors::ServiceError;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

const EXPIRY_HORIZON_DAYS: i64 = 30;

/// Headline figures for the stock dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockKpis {
    pub total_products: u64,
    pub total_stock_value: Decimal,
    pub low_stock_count: u64,
    pub out_of_stock_count: u64,
    pub expiring_soon_count: u64,
}

/// One product at or below its reorder point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAlert {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub current_stock: Decimal,
    pub min_stock_level: Decimal,
    pub reorder_point: Decimal,
}

/// Service for dashboard aggregates.
#[derive(Clone)]
pub struct StockDashboardService {
    db_pool: Arc<DbPool>,
}

impl StockDashboardService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Computes the headline KPIs for the tenant.
    #[instrument(skip(self, ctx))]
    pub async fn kpis(&self, ctx: &ActorContext) -> Result<StockKpis, ServiceError> {
        ctx.require(Capability::StockView)?;
        let db = &*self.db_pool;

        let products = Product::find()
            .filter(product::Column::CompanyId.eq(ctx.company_id))
            .filter(product::Column::IsActive.eq(true))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let totals = company_totals(db, ctx.company_id).await?;

        let mut total_stock_value = Decimal::ZERO;
        let mut low_stock_count = 0u64;
        let mut out_of_stock_count = 0u64;
        for p in &products {
            let total_qty = totals.get(&p.id).copied().unwrap_or(Decimal::ZERO);
            total_stock_value += total_qty * p.cost_price;
            if p.reorder_point > Decimal::ZERO
                && total_qty > Decimal::ZERO
                && total_qty <= p.reorder_point
            {
                low_stock_count += 1;
            }
            if p.product_type == PRODUCT_TYPE_STOCKABLE && total_qty <= Decimal::ZERO {
                out_of_stock_count += 1;
            }
        }

        let today = Utc::now().date_naive();
        let cutoff = today + Duration::days(EXPIRY_HORIZON_DAYS);
        let expiring_soon_count = Lot::find()
            .filter(lot::Column::CompanyId.eq(ctx.company_id))
            .filter(lot::Column::IsActive.eq(true))
            .filter(lot::Column::ExpiryDate.is_not_null())
            .filter(lot::Column::ExpiryDate.gte(today))
            .filter(lot::Column::ExpiryDate.lte(cutoff))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .len() as u64;

        Ok(StockKpis {
            total_products: products.len() as u64,
            total_stock_value,
            low_stock_count,
            out_of_stock_count,
            expiring_soon_count,
        })
    }

    /// Active products at or below their reorder point.
    #[instrument(skip(self, ctx))]
    pub async fn alerts(&self, ctx: &ActorContext) -> Result<Vec<StockAlert>, ServiceError> {
        ctx.require(Capability::StockView)?;
        let db = &*self.db_pool;

        let products = Product::find()
            .filter(product::Column::CompanyId.eq(ctx.company_id))
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::ReorderPoint.gt(Decimal::ZERO))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let totals = company_totals(db, ctx.company_id).await?;

        let mut alerts = Vec::new();
        for p in products {
            let current_stock = totals.get(&p.id).copied().unwrap_or(Decimal::ZERO);
            if current_stock <= p.reorder_point {
                alerts.push(StockAlert {
                    product_id: p.id,
                    product_name: p.name,
                    sku: p.sku,
                    current_stock,
                    min_stock_level: p.min_stock_level,
                    reorder_point: p.reorder_point,
                });
            }
        }
        Ok(alerts)
    }
}

/// Per-product quantity totals across the whole tenant, in one scan.
async fn company_totals(
    db: &DbPool,
    company_id: Uuid,
) -> Result<HashMap<Uuid, Decimal>, ServiceError> {
    let levels = StockLevel::find()
        .filter(stock_level::Column::CompanyId.eq(company_id))
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;

    let mut totals: HashMap<Uuid, Decimal> = HashMap::new();
    for level in levels {
        *totals.entry(level.product_id).or_insert(Decimal::ZERO) += level.quantity;
    }
    Ok(totals)
}
