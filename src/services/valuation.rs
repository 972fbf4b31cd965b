//! Weighted-average cost (CUMP) recomputation.
//!
//! The cost lives on the product row and is company-wide, while quantity is
//! location-partitioned. Each costed incoming movement folds its quantity
//! into the average using the product's total quantity read *before* that
//! movement's increment was applied to the stock level store.

use crate::entities::product::{self, Entity as Product};
use crate::errors::ServiceError;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::info;
use uuid::Uuid;

/// Monetary scale for stored costs.
const COST_SCALE: u32 = 2;

/// `(old_total * old_cost + incoming * unit_cost) / (old_total + incoming)`,
/// rounded to the monetary scale. Returns `None` when the denominator is
/// not positive, in which case the stored cost must stay untouched.
pub fn weighted_average_cost(
    current_cost: Decimal,
    current_total_qty: Decimal,
    incoming_qty: Decimal,
    incoming_unit_cost: Decimal,
) -> Option<Decimal> {
    let new_total_qty = current_total_qty + incoming_qty;
    if new_total_qty <= Decimal::ZERO {
        return None;
    }
    let total_value = current_total_qty * current_cost + incoming_qty * incoming_unit_cost;
    Some((total_value / new_total_qty).round_dp(COST_SCALE))
}

/// Recomputes and persists the product's average cost for a validated
/// incoming movement. `pre_update_total` is the company-wide quantity
/// captured before the movement's own quantity was added.
pub(crate) async fn apply_incoming_cost<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    product_id: Uuid,
    pre_update_total: Decimal,
    incoming_qty: Decimal,
    incoming_unit_cost: Decimal,
) -> Result<(), ServiceError> {
    let product = Product::find_by_id(product_id)
        .filter(product::Column::CompanyId.eq(company_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

    let Some(new_cost) = weighted_average_cost(
        product.cost_price,
        pre_update_total,
        incoming_qty,
        incoming_unit_cost,
    ) else {
        return Ok(());
    };

    if new_cost == product.cost_price {
        return Ok(());
    }

    let old_cost = product.cost_price;
    let mut active: product::ActiveModel = product.into();
    active.cost_price = Set(new_cost);
    active.update(conn).await.map_err(ServiceError::db_error)?;

    info!(
        product_id = %product_id,
        old_cost = %old_cost,
        new_cost = %new_cost,
        incoming_qty = %incoming_qty,
        "Recomputed weighted-average cost"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn folds_incoming_quantity_into_average() {
        // 100 units at 8 plus 50 units at 10 -> 8.67 at the monetary scale
        let cost = weighted_average_cost(dec!(8), dec!(100), dec!(50), dec!(10)).unwrap();
        assert_eq!(cost, dec!(8.67));
    }

    #[test]
    fn first_receipt_takes_incoming_cost() {
        let cost = weighted_average_cost(dec!(0), dec!(0), dec!(25), dec!(4.50)).unwrap();
        assert_eq!(cost, dec!(4.50));
    }

    #[test]
    fn zero_denominator_leaves_cost_unchanged() {
        assert_eq!(
            weighted_average_cost(dec!(8), dec!(-10), dec!(10), dec!(12)),
            None
        );
        assert_eq!(weighted_average_cost(dec!(8), dec!(0), dec!(0), dec!(12)), None);
    }

    #[test]
    fn negative_on_hand_with_larger_receipt_still_averages() {
        // A negative pre-update total (possible after manual adjustments)
        // with a large enough receipt keeps the denominator positive.
        let cost = weighted_average_cost(dec!(8), dec!(-10), dec!(110), dec!(10)).unwrap();
        assert_eq!(cost, dec!(10.20));
    }

    proptest! {
        #[test]
        fn average_stays_between_old_and_incoming_cost(
            old_cost in 0u32..10_000,
            old_qty in 1u32..100_000,
            incoming_qty in 1u32..100_000,
            incoming_cost in 0u32..10_000,
        ) {
            let old_cost = Decimal::from(old_cost) / dec!(100);
            let incoming_cost = Decimal::from(incoming_cost) / dec!(100);
            let old_qty = Decimal::from(old_qty);
            let incoming_qty = Decimal::from(incoming_qty);

            let avg = weighted_average_cost(old_cost, old_qty, incoming_qty, incoming_cost)
                .expect("positive quantities always produce a cost");

            let lo = old_cost.min(incoming_cost) - dec!(0.01);
            let hi = old_cost.max(incoming_cost) + dec!(0.01);
            prop_assert!(avg >= lo && avg <= hi, "avg {} outside [{}, {}]", avg, lo, hi);
        }
    }
}
