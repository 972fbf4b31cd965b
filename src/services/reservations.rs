//! Soft holds against available stock.
//!
//! Reservations are additive to and independent of movements: they only
//! ever adjust `StockLevel.reserved_quantity`. The availability check and
//! the reserved-quantity bump happen in one transaction under the same row
//! locks as the movement engine, so holds and outbound validations cannot
//! both win the same units.

use crate::audit::{AuditEntry, AuditSink};
use crate::auth::{ActorContext, Capability};
use crate::db::DbPool;
use crate::entities::stock_reservation::{
    self, Entity as StockReservation, ReservationStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::movements::check_pagination;
use crate::services::stock_levels;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Input for creating a reservation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewReservation {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 50))]
    pub reference_type: String,
    pub reference_id: Uuid,
    #[validate(length(max = 255))]
    pub reference_label: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Filters for listing reservations.
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub product_id: Option<Uuid>,
    pub status: Option<ReservationStatus>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
}

/// Result of one expiry sweep run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOutcome {
    /// Number of reservations flipped to expired.
    pub released: u64,
    /// Timestamp the sweep ran at.
    pub swept_at: DateTime<Utc>,
}

/// Service for stock reservations.
#[derive(Clone)]
pub struct ReservationService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    audit: Arc<dyn AuditSink>,
}

impl ReservationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            db_pool,
            event_sender,
            audit,
        }
    }

    /// Places a hold on available stock.
    #[instrument(skip(self, ctx, input))]
    pub async fn create(
        &self,
        ctx: &ActorContext,
        input: NewReservation,
    ) -> Result<stock_reservation::Model, ServiceError> {
        ctx.require(Capability::ReservationManage)?;
        input.validate()?;

        if input.quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Quantity must be positive".to_string(),
            ));
        }

        let company_id = ctx.company_id;
        let user_id = ctx.user_id;
        let reservation = self
            .db_pool
            .transaction::<_, stock_reservation::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    // A missing stock level row reads as zero available, so
                    // the request below can only pass when the row exists.
                    let level = stock_levels::find_for_update(
                        txn,
                        company_id,
                        input.product_id,
                        input.location_id,
                        input.lot_id,
                    )
                    .await?;

                    let available = level
                        .as_ref()
                        .map(|l| l.available_quantity())
                        .unwrap_or(Decimal::ZERO);
                    if available < input.quantity {
                        return Err(ServiceError::InsufficientStock(format!(
                            "Available: {}, Requested: {}",
                            available, input.quantity
                        )));
                    }
                    let level = level.ok_or_else(|| {
                        ServiceError::InternalError(
                            "stock level disappeared during reservation".to_string(),
                        )
                    })?;

                    let new_reserved = level.reserved_quantity + input.quantity;
                    stock_levels::update_reserved(txn, level, new_reserved).await?;

                    let reservation = stock_reservation::ActiveModel {
                        product_id: Set(input.product_id),
                        location_id: Set(input.location_id),
                        lot_id: Set(input.lot_id),
                        quantity: Set(input.quantity),
                        reference_type: Set(input.reference_type),
                        reference_id: Set(input.reference_id),
                        reference_label: Set(input.reference_label),
                        status: Set(ReservationStatus::Active.as_str().to_string()),
                        expiry_date: Set(input.expiry_date),
                        notes: Set(input.notes),
                        reserved_by: Set(user_id),
                        company_id: Set(company_id),
                        ..Default::default()
                    };
                    reservation.insert(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.audit
            .record(
                AuditEntry::new(
                    ctx.user_id,
                    ctx.company_id,
                    "create",
                    "stock_reservation",
                    reservation.id,
                    format!(
                        "Reserved {} of product {} for {}",
                        reservation.quantity, reservation.product_id, reservation.reference_type
                    ),
                )
                .with_new_values(serde_json::json!({
                    "quantity": reservation.quantity.to_string(),
                    "reference_type": reservation.reference_type,
                })),
            )
            .await;

        self.publish(Event::ReservationCreated {
            reservation_id: reservation.id,
            product_id: reservation.product_id,
            quantity: reservation.quantity,
        })
        .await;

        Ok(reservation)
    }

    /// Releases an active reservation, freeing its hold.
    #[instrument(skip(self, ctx))]
    pub async fn release(
        &self,
        ctx: &ActorContext,
        reservation_id: Uuid,
    ) -> Result<stock_reservation::Model, ServiceError> {
        ctx.require(Capability::ReservationManage)?;

        let company_id = ctx.company_id;
        let reservation = self
            .db_pool
            .transaction::<_, stock_reservation::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let reservation = StockReservation::find_by_id(reservation_id)
                        .filter(stock_reservation::Column::CompanyId.eq(company_id))
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Reservation {} not found",
                                reservation_id
                            ))
                        })?;

                    let next_status = reservation.status()?.into_released()?;
                    release_hold(txn, &reservation).await?;

                    let mut active: stock_reservation::ActiveModel = reservation.into();
                    active.status = Set(next_status.as_str().to_string());
                    active.update(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "release",
                "stock_reservation",
                reservation.id,
                format!("Released reservation {}", reservation.id),
            ))
            .await;

        self.publish(Event::ReservationReleased {
            reservation_id: reservation.id,
        })
        .await;

        Ok(reservation)
    }

    /// Releases every active reservation held for a business document.
    /// Returns the number released.
    #[instrument(skip(self, ctx))]
    pub async fn release_by_reference(
        &self,
        ctx: &ActorContext,
        reference_type: &str,
        reference_id: Uuid,
    ) -> Result<u64, ServiceError> {
        ctx.require(Capability::ReservationManage)?;

        let company_id = ctx.company_id;
        let reference_type_owned = reference_type.to_string();
        let released = self
            .db_pool
            .transaction::<_, u64, ServiceError>(move |txn| {
                Box::pin(async move {
                    let reservations = StockReservation::find()
                        .filter(stock_reservation::Column::CompanyId.eq(company_id))
                        .filter(
                            stock_reservation::Column::ReferenceType
                                .eq(reference_type_owned.as_str()),
                        )
                        .filter(stock_reservation::Column::ReferenceId.eq(reference_id))
                        .filter(
                            stock_reservation::Column::Status
                                .eq(ReservationStatus::Active.as_str()),
                        )
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let mut count = 0u64;
                    for reservation in reservations {
                        let next_status = reservation.status()?.into_released()?;
                        release_hold(txn, &reservation).await?;
                        let mut active: stock_reservation::ActiveModel = reservation.into();
                        active.status = Set(next_status.as_str().to_string());
                        active.update(txn).await.map_err(ServiceError::db_error)?;
                        count += 1;
                    }
                    Ok(count)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        if released > 0 {
            self.audit
                .record(AuditEntry::new(
                    ctx.user_id,
                    ctx.company_id,
                    "release_batch",
                    "stock_reservation",
                    reference_id,
                    format!(
                        "Released {} reservations for {} {}",
                        released, reference_type, reference_id
                    ),
                ))
                .await;

            self.publish(Event::ReservationsReleasedByReference {
                reference_type: reference_type.to_string(),
                reference_id,
                released,
            })
            .await;
        }

        Ok(released)
    }

    /// Flips every past-expiry active reservation to expired and frees its
    /// hold. Idempotent; intended to run on a recurring timer owned by the
    /// embedding process. Sweeps all tenants: the background job has no
    /// actor.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> Result<SweepOutcome, ServiceError> {
        let now = Utc::now();
        let released = self
            .db_pool
            .transaction::<_, u64, ServiceError>(move |txn| {
                Box::pin(async move {
                    let expired = StockReservation::find()
                        .filter(
                            stock_reservation::Column::Status
                                .eq(ReservationStatus::Active.as_str()),
                        )
                        .filter(stock_reservation::Column::ExpiryDate.is_not_null())
                        .filter(stock_reservation::Column::ExpiryDate.lte(now))
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let mut count = 0u64;
                    for reservation in expired {
                        let next_status = reservation.status()?.into_expired()?;
                        release_hold(txn, &reservation).await?;
                        let mut active: stock_reservation::ActiveModel = reservation.into();
                        active.status = Set(next_status.as_str().to_string());
                        active.update(txn).await.map_err(ServiceError::db_error)?;
                        count += 1;
                    }
                    Ok(count)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        if released > 0 {
            info!(released, "Expired stale reservations");
            self.publish(Event::ReservationsExpired { released }).await;
        }

        Ok(SweepOutcome {
            released,
            swept_at: now,
        })
    }

    /// Fetches one reservation.
    #[instrument(skip(self, ctx))]
    pub async fn get(
        &self,
        ctx: &ActorContext,
        reservation_id: Uuid,
    ) -> Result<stock_reservation::Model, ServiceError> {
        ctx.require(Capability::StockView)?;
        StockReservation::find_by_id(reservation_id)
            .filter(stock_reservation::Column::CompanyId.eq(ctx.company_id))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Reservation {} not found", reservation_id))
            })
    }

    /// Lists reservations for the tenant, newest first.
    #[instrument(skip(self, ctx, filter))]
    pub async fn list(
        &self,
        ctx: &ActorContext,
        filter: ReservationFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_reservation::Model>, u64), ServiceError> {
        ctx.require(Capability::StockView)?;
        check_pagination(page, limit)?;

        let mut query = StockReservation::find()
            .filter(stock_reservation::Column::CompanyId.eq(ctx.company_id))
            .order_by_desc(stock_reservation::Column::CreatedAt);

        if let Some(product_id) = filter.product_id {
            query = query.filter(stock_reservation::Column::ProductId.eq(product_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(stock_reservation::Column::Status.eq(status.as_str()));
        }
        if let Some(reference_type) = filter.reference_type {
            query = query
                .filter(stock_reservation::Column::ReferenceType.eq(reference_type.as_str()));
        }
        if let Some(reference_id) = filter.reference_id {
            query = query.filter(stock_reservation::Column::ReferenceId.eq(reference_id));
        }

        let paginator = query.paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;
        Ok((items, total))
    }

    async fn publish(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "Failed to publish reservation event");
        }
    }
}

/// Subtracts a reservation's quantity from its stock level row, clamped at
/// zero as a guard against drift.
async fn release_hold(
    txn: &DatabaseTransaction,
    reservation: &stock_reservation::Model,
) -> Result<(), ServiceError> {
    let level = stock_levels::find_for_update(
        txn,
        reservation.company_id,
        reservation.product_id,
        reservation.location_id,
        reservation.lot_id,
    )
    .await?;

    if let Some(level) = level {
        let new_reserved = (level.reserved_quantity - reservation.quantity).max(Decimal::ZERO);
        stock_levels::update_reserved(txn, level, new_reserved).await?;
    }
    Ok(())
}
