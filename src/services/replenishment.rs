//! Replenishment and ABC analytics: derived read-side computations over the
//! stock level store and the movement ledger, plus the two product-field
//! writers they feed (average daily consumption / reorder point, and ABC
//! classification).

use crate::auth::{ActorContext, Capability};
use crate::db::DbPool;
use crate::entities::product::{self, AbcClass, Entity as Product, PRODUCT_TYPE_STOCKABLE};
use crate::entities::stock_movement::{
    self, Entity as StockMovement, MovementStatus, MovementType,
};
use crate::errors::ServiceError;
use crate::services::stock_levels;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

const QUANTITY_SCALE: u32 = 3;
const CONSUMPTION_WINDOW_DAYS: i64 = 30;
const ABC_A_CUTOFF: Decimal = Decimal::from_parts(80, 0, 0, false, 2); // 0.80
const ABC_B_CUTOFF: Decimal = Decimal::from_parts(95, 0, 0, false, 2); // 0.95

/// One product that should be reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplenishmentSuggestion {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub current_stock: Decimal,
    pub reserved_stock: Decimal,
    pub available_stock: Decimal,
    pub reorder_point: Decimal,
    pub suggested_quantity: Decimal,
    pub lead_time_days: i32,
    pub estimated_cost: Decimal,
    pub abc_classification: Option<String>,
}

/// Filters for suggestion queries.
#[derive(Debug, Clone, Default)]
pub struct SuggestionFilter {
    pub category_id: Option<Uuid>,
    pub abc_classification: Option<AbcClass>,
}

/// Outbound consumption over one trailing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodConsumption {
    pub days: i64,
    pub total_out: Decimal,
    pub daily_average: Decimal,
}

/// Consumption statistics for a product over 7/30/90 days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionStats {
    pub product_id: Uuid,
    pub periods: Vec<PeriodConsumption>,
}

/// Per-class counts after an ABC classification run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbcBreakdown {
    pub a: u64,
    pub b: u64,
    pub c: u64,
}

/// Service for replenishment analytics.
#[derive(Clone)]
pub struct ReplenishmentService {
    db_pool: Arc<DbPool>,
}

impl ReplenishmentService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Products whose available stock has fallen to or below their reorder
    /// point. Suggested quantity prefers the optimal order quantity, then
    /// the reorder quantity, then twice the reorder point.
    #[instrument(skip(self, ctx, filter))]
    pub async fn suggestions(
        &self,
        ctx: &ActorContext,
        filter: SuggestionFilter,
    ) -> Result<Vec<ReplenishmentSuggestion>, ServiceError> {
        ctx.require(Capability::ReplenishmentManage)?;
        let db = &*self.db_pool;

        let mut query = Product::find()
            .filter(product::Column::CompanyId.eq(ctx.company_id))
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::ProductType.eq(PRODUCT_TYPE_STOCKABLE))
            .filter(product::Column::ReorderPoint.gt(Decimal::ZERO));
        if let Some(category_id) = filter.category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }
        if let Some(classification) = filter.abc_classification {
            query =
                query.filter(product::Column::AbcClassification.eq(classification.as_str()));
        }
        let products = query.all(db).await.map_err(ServiceError::db_error)?;

        let mut suggestions = Vec::new();
        for p in products {
            let (total_qty, total_reserved) =
                stock_levels::product_totals(db, ctx.company_id, p.id).await?;
            let available = total_qty - total_reserved;
            if available > p.reorder_point {
                continue;
            }

            let suggested = if p.optimal_order_quantity > Decimal::ZERO {
                p.optimal_order_quantity
            } else if p.reorder_quantity > Decimal::ZERO {
                p.reorder_quantity
            } else {
                p.reorder_point * Decimal::TWO
            };

            suggestions.push(ReplenishmentSuggestion {
                product_id: p.id,
                product_name: p.name,
                sku: p.sku,
                current_stock: total_qty,
                reserved_stock: total_reserved,
                available_stock: available,
                reorder_point: p.reorder_point,
                suggested_quantity: suggested,
                lead_time_days: p.lead_time_days,
                estimated_cost: suggested * p.cost_price,
                abc_classification: p.abc_classification,
            });
        }
        Ok(suggestions)
    }

    /// Validated outbound totals and daily averages over 7, 30 and 90 days.
    #[instrument(skip(self, ctx))]
    pub async fn consumption_stats(
        &self,
        ctx: &ActorContext,
        product_id: Uuid,
    ) -> Result<ConsumptionStats, ServiceError> {
        ctx.require(Capability::ReplenishmentManage)?;
        let db = &*self.db_pool;

        Product::find_by_id(product_id)
            .filter(product::Column::CompanyId.eq(ctx.company_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let mut periods = Vec::with_capacity(3);
        for days in [7i64, 30, 90] {
            let total_out =
                outbound_total(db, ctx.company_id, product_id, days).await?;
            let daily_average = (total_out / Decimal::from(days)).round_dp(QUANTITY_SCALE);
            periods.push(PeriodConsumption {
                days,
                total_out,
                daily_average,
            });
        }

        Ok(ConsumptionStats {
            product_id,
            periods,
        })
    }

    /// Recomputes every stockable product's average daily consumption from
    /// the trailing 30 days of validated outbound movements, and, where a
    /// lead time is set, its reorder point:
    /// `avg_daily x lead_time_days + min_stock_level`. Returns the number
    /// of products touched.
    #[instrument(skip(self, ctx))]
    pub async fn recalculate_reorder_points(
        &self,
        ctx: &ActorContext,
    ) -> Result<u64, ServiceError> {
        ctx.require(Capability::ReplenishmentManage)?;
        let db = &*self.db_pool;

        let products = Product::find()
            .filter(product::Column::CompanyId.eq(ctx.company_id))
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::ProductType.eq(PRODUCT_TYPE_STOCKABLE))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut count = 0u64;
        for p in products {
            let total_out =
                outbound_total(db, ctx.company_id, p.id, CONSUMPTION_WINDOW_DAYS).await?;
            let avg_daily = (total_out / Decimal::from(CONSUMPTION_WINDOW_DAYS))
                .round_dp(QUANTITY_SCALE);

            let lead_time_days = p.lead_time_days;
            let min_stock_level = p.min_stock_level;
            let mut active: product::ActiveModel = p.into();
            active.average_daily_consumption = Set(avg_daily);
            if lead_time_days > 0 {
                let reorder = (avg_daily * Decimal::from(lead_time_days) + min_stock_level)
                    .round_dp(QUANTITY_SCALE);
                active.reorder_point = Set(reorder);
            }
            active.update(db).await.map_err(ServiceError::db_error)?;
            count += 1;
        }

        info!(products = count, "Recalculated reorder points");
        Ok(count)
    }

    /// Classifies products by cumulative stock-value contribution: the top
    /// 80% of value is class A, the next 15% class B, the tail class C.
    /// Persists the classification and returns per-class counts.
    #[instrument(skip(self, ctx))]
    pub async fn classify_abc(&self, ctx: &ActorContext) -> Result<AbcBreakdown, ServiceError> {
        ctx.require(Capability::ReplenishmentManage)?;
        let db = &*self.db_pool;

        let products = Product::find()
            .filter(product::Column::CompanyId.eq(ctx.company_id))
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::ProductType.eq(PRODUCT_TYPE_STOCKABLE))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut valued = Vec::with_capacity(products.len());
        for p in products {
            let (total_qty, _) = stock_levels::product_totals(db, ctx.company_id, p.id).await?;
            let value = total_qty * p.cost_price;
            valued.push((p, value));
        }

        let total_value: Decimal = valued.iter().map(|(_, v)| *v).sum();
        let mut breakdown = AbcBreakdown::default();
        if total_value <= Decimal::ZERO {
            return Ok(breakdown);
        }

        valued.sort_by(|a, b| b.1.cmp(&a.1));

        let mut cumulative = Decimal::ZERO;
        for (p, value) in valued {
            cumulative += value;
            let share = cumulative / total_value;
            let class = if share <= ABC_A_CUTOFF {
                AbcClass::A
            } else if share <= ABC_B_CUTOFF {
                AbcClass::B
            } else {
                AbcClass::C
            };

            match class {
                AbcClass::A => breakdown.a += 1,
                AbcClass::B => breakdown.b += 1,
                AbcClass::C => breakdown.c += 1,
            }

            let mut active: product::ActiveModel = p.into();
            active.abc_classification = Set(Some(class.as_str().to_string()));
            active.update(db).await.map_err(ServiceError::db_error)?;
        }

        info!(
            a = breakdown.a,
            b = breakdown.b,
            c = breakdown.c,
            "Classified products by stock value"
        );
        Ok(breakdown)
    }
}

/// Sum of validated `out` movement quantities for a product over a trailing
/// window.
async fn outbound_total<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    product_id: Uuid,
    days: i64,
) -> Result<Decimal, ServiceError> {
    let since = Utc::now() - Duration::days(days);
    let movements = StockMovement::find()
        .filter(stock_movement::Column::CompanyId.eq(company_id))
        .filter(stock_movement::Column::ProductId.eq(product_id))
        .filter(stock_movement::Column::MovementType.eq(MovementType::Out.as_str()))
        .filter(stock_movement::Column::Status.eq(MovementStatus::Validated.as_str()))
        .filter(stock_movement::Column::ValidatedAt.gte(since))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(movements.iter().map(|m| m.quantity).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn abc_cutoff_constants_match_the_classic_split() {
        assert_eq!(ABC_A_CUTOFF, dec!(0.80));
        assert_eq!(ABC_B_CUTOFF, dec!(0.95));
    }
}
