//! The movement engine: the state machine that turns draft ledger records
//! into stock mutations.
//!
//! Every transition runs as one database transaction; a failed step leaves
//! the movement and the stock level store exactly as they were. Validation
//! is the only forward transition, cancellation reverses the exact
//! validate-time mutation for `in`/`out`/`transfer`. A validated
//! `adjustment` cannot be cancelled: there is no prior absolute value to
//! restore, and flipping only the status would leave a misleading ledger.

use crate::audit::{AuditEntry, AuditSink};
use crate::auth::{ActorContext, Capability};
use crate::db::DbPool;
use crate::entities::stock_movement::{
    self, Entity as StockMovement, MovementStatus, MovementType,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::sequence::{ReferenceAllocator, MOVEMENT_PREFIX};
use crate::services::{stock_levels, valuation};
use chrono::Utc;
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

/// Input for creating a draft movement.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewMovement {
    pub movement_type: MovementType,
    pub product_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub source_location_id: Option<Uuid>,
    pub destination_location_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Draft-only mutable fields. Structural fields (type, quantities,
/// locations) are immutable after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateMovement {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Filters for listing movements.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub movement_type: Option<MovementType>,
    pub status: Option<MovementStatus>,
    pub product_id: Option<Uuid>,
    pub search: Option<String>,
}

/// An already-validated ledger row recorded on behalf of a workflow that
/// mutates stock itself (transfer lines, inventory count adjustments).
pub(crate) struct LedgerEntry {
    pub movement_type: MovementType,
    pub product_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub source_location_id: Option<Uuid>,
    pub destination_location_id: Option<Uuid>,
    pub quantity: Decimal,
    pub reason: String,
    pub notes: Option<String>,
    pub validated_by: Uuid,
    pub company_id: Uuid,
}

pub(crate) async fn record_validated_movement(
    txn: &DatabaseTransaction,
    references: &dyn ReferenceAllocator,
    entry: LedgerEntry,
) -> Result<stock_movement::Model, ServiceError> {
    let reference = references
        .next_reference(txn, MOVEMENT_PREFIX, Utc::now().date_naive())
        .await?;
    let now = Utc::now();
    let movement = stock_movement::ActiveModel {
        reference: Set(reference),
        movement_type: Set(entry.movement_type.as_str().to_string()),
        product_id: Set(entry.product_id),
        lot_id: Set(entry.lot_id),
        source_location_id: Set(entry.source_location_id),
        destination_location_id: Set(entry.destination_location_id),
        quantity: Set(entry.quantity),
        unit_cost: Set(None),
        status: Set(MovementStatus::Validated.as_str().to_string()),
        reason: Set(Some(entry.reason)),
        notes: Set(entry.notes),
        validated_by: Set(Some(entry.validated_by)),
        validated_at: Set(Some(now)),
        company_id: Set(entry.company_id),
        ..Default::default()
    };
    movement
        .insert(txn)
        .await
        .map_err(|e| ServiceError::conflict_on_unique(e, "movement reference"))
}

/// Service for the movement ledger and its state machine.
#[derive(Clone)]
pub struct MovementService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    audit: Arc<dyn AuditSink>,
    references: Arc<dyn ReferenceAllocator>,
}

impl MovementService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        audit: Arc<dyn AuditSink>,
        references: Arc<dyn ReferenceAllocator>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            audit,
            references,
        }
    }

    /// Creates a draft movement with a freshly allocated reference.
    #[instrument(skip(self, ctx, input))]
    pub async fn create(
        &self,
        ctx: &ActorContext,
        input: NewMovement,
    ) -> Result<stock_movement::Model, ServiceError> {
        ctx.require(Capability::MovementCreate)?;
        input.validate()?;

        if input.quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Quantity must be positive".to_string(),
            ));
        }
        let movement_type = input.movement_type;
        if movement_type.requires_source() && input.source_location_id.is_none() {
            return Err(ServiceError::InvalidInput(format!(
                "Source location required for {} movement",
                movement_type.as_str()
            )));
        }
        if movement_type.requires_destination() && input.destination_location_id.is_none() {
            return Err(ServiceError::InvalidInput(format!(
                "Destination location required for {} movement",
                movement_type.as_str()
            )));
        }

        let references = Arc::clone(&self.references);
        let company_id = ctx.company_id;
        let movement = self
            .db_pool
            .transaction::<_, stock_movement::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let reference = references
                        .next_reference(txn, MOVEMENT_PREFIX, Utc::now().date_naive())
                        .await?;
                    let movement = stock_movement::ActiveModel {
                        reference: Set(reference),
                        movement_type: Set(movement_type.as_str().to_string()),
                        product_id: Set(input.product_id),
                        lot_id: Set(input.lot_id),
                        source_location_id: Set(input.source_location_id),
                        destination_location_id: Set(input.destination_location_id),
                        quantity: Set(input.quantity),
                        unit_cost: Set(input.unit_cost),
                        status: Set(MovementStatus::Draft.as_str().to_string()),
                        reason: Set(input.reason),
                        notes: Set(input.notes),
                        company_id: Set(company_id),
                        ..Default::default()
                    };
                    movement
                        .insert(txn)
                        .await
                        .map_err(|e| ServiceError::conflict_on_unique(e, "movement reference"))
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
                    "stock_movement",
                    movement.id,
                    format!(
                        "Created {} movement {}",
                        movement.movement_type, movement.reference
                    ),
                )
                .with_new_values(serde_json::json!({
                    "reference": movement.reference,
                    "movement_type": movement.movement_type,
                    "quantity": movement.quantity.to_string(),
                })),
            )
            .await;

        self.publish(Event::MovementCreated {
            movement_id: movement.id,
            reference: movement.reference.clone(),
        })
        .await;

        Ok(movement)
    }

    /// Validates a draft movement, applying its type-specific stock
    /// mutation. Irreversible forward transition.
    #[instrument(skip(self, ctx))]
    pub async fn validate(
        &self,
        ctx: &ActorContext,
        movement_id: Uuid,
    ) -> Result<stock_movement::Model, ServiceError> {
        ctx.require(Capability::MovementValidate)?;

        let company_id = ctx.company_id;
        let user_id = ctx.user_id;
        let movement = self
            .db_pool
            .transaction::<_, stock_movement::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let movement = find_movement(txn, company_id, movement_id).await?;
                    let next_status = movement.status()?.into_validated()?;
                    let movement_type = movement.movement_type()?;

                    apply_validation(txn, &movement, movement_type, company_id).await?;

                    let mut active: stock_movement::ActiveModel = movement.into();
                    active.status = Set(next_status.as_str().to_string());
                    active.validated_by = Set(Some(user_id));
                    active.validated_at = Set(Some(Utc::now()));
                    active.update(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        info!(
            movement_id = %movement.id,
            reference = %movement.reference,
            movement_type = %movement.movement_type,
            "Validated stock movement"
        );

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "validate",
                "stock_movement",
                movement.id,
                format!(
                    "Validated {} movement {}",
                    movement.movement_type, movement.reference
                ),
            ))
            .await;

        self.publish(Event::MovementValidated {
            movement_id: movement.id,
            movement_type: movement.movement_type.clone(),
            product_id: movement.product_id,
            quantity: movement.quantity,
        })
        .await;

        Ok(movement)
    }

    /// Cancels a movement. From draft this is a pure state flip; from
    /// validated it reverses the exact validate-time mutation. Validated
    /// adjustments are rejected, as is cancelling twice.
    #[instrument(skip(self, ctx))]
    pub async fn cancel(
        &self,
        ctx: &ActorContext,
        movement_id: Uuid,
    ) -> Result<stock_movement::Model, ServiceError> {
        ctx.require(Capability::MovementCancel)?;

        let company_id = ctx.company_id;
        let movement = self
            .db_pool
            .transaction::<_, stock_movement::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let movement = find_movement(txn, company_id, movement_id).await?;
                    let current = movement.status()?;
                    let next_status = current.into_cancelled()?;

                    if current == MovementStatus::Validated {
                        apply_reversal(txn, &movement, company_id).await?;
                    }

                    let mut active: stock_movement::ActiveModel = movement.into();
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
                "cancel",
                "stock_movement",
                movement.id,
                format!("Cancelled movement {}", movement.reference),
            ))
            .await;

        self.publish(Event::MovementCancelled {
            movement_id: movement.id,
            was_validated: movement.validated_at.is_some(),
        })
        .await;

        Ok(movement)
    }

    /// Updates the mutable fields of a draft movement.
    #[instrument(skip(self, ctx, changes))]
    pub async fn update(
        &self,
        ctx: &ActorContext,
        movement_id: Uuid,
        changes: UpdateMovement,
    ) -> Result<stock_movement::Model, ServiceError> {
        ctx.require(Capability::MovementCreate)?;
        changes.validate()?;

        let movement = find_movement(&*self.db_pool, ctx.company_id, movement_id).await?;
        if !movement.status()?.is_draft() {
            return Err(ServiceError::InvalidState(
                "can only update draft movements".to_string(),
            ));
        }

        let mut active: stock_movement::ActiveModel = movement.into();
        if let Some(reason) = changes.reason {
            active.reason = Set(Some(reason));
        }
        if let Some(notes) = changes.notes {
            active.notes = Set(Some(notes));
        }
        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Fetches one movement.
    #[instrument(skip(self, ctx))]
    pub async fn get(
        &self,
        ctx: &ActorContext,
        movement_id: Uuid,
    ) -> Result<stock_movement::Model, ServiceError> {
        ctx.require(Capability::StockView)?;
        find_movement(&*self.db_pool, ctx.company_id, movement_id).await
    }

    /// Lists movements for the tenant, newest first.
    #[instrument(skip(self, ctx, filter))]
    pub async fn list(
        &self,
        ctx: &ActorContext,
        filter: MovementFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        ctx.require(Capability::StockView)?;
        check_pagination(page, limit)?;

        let mut query = StockMovement::find()
            .filter(stock_movement::Column::CompanyId.eq(ctx.company_id))
            .order_by_desc(stock_movement::Column::CreatedAt);

        if let Some(movement_type) = filter.movement_type {
            query = query.filter(stock_movement::Column::MovementType.eq(movement_type.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(stock_movement::Column::Status.eq(status.as_str()));
        }
        if let Some(product_id) = filter.product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(search) = filter.search {
            query = query.filter(stock_movement::Column::Reference.contains(search.as_str()));
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
            warn!(error = %e, "Failed to publish stock event");
        }
    }
}

pub(crate) fn check_pagination(page: u64, limit: u64) -> Result<(), ServiceError> {
    if page == 0 {
        return Err(ServiceError::ValidationError(
            "Page number must be greater than 0".to_string(),
        ));
    }
    if limit == 0 || limit > 1000 {
        return Err(ServiceError::ValidationError(
            "Limit must be between 1 and 1000".to_string(),
        ));
    }
    Ok(())
}

async fn find_movement<C: sea_orm::ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    movement_id: Uuid,
) -> Result<stock_movement::Model, ServiceError> {
    StockMovement::find_by_id(movement_id)
        .filter(stock_movement::Column::CompanyId.eq(company_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Movement {} not found", movement_id)))
}

/// Applies the validate-time stock mutation for one movement.
async fn apply_validation(
    txn: &DatabaseTransaction,
    movement: &stock_movement::Model,
    movement_type: MovementType,
    company_id: Uuid,
) -> Result<(), ServiceError> {
    let qty = movement.quantity;
    match movement_type {
        MovementType::In => {
            let destination = required_destination(movement)?;
            let incoming_cost = movement.unit_cost.filter(|c| *c > Decimal::ZERO);
            // Capture the company-wide total before this movement's
            // increment lands; reading it afterwards would double-count
            // the incoming quantity in the average.
            let pre_update_total = if incoming_cost.is_some() {
                stock_levels::product_total_quantity(txn, company_id, movement.product_id).await?
            } else {
                Decimal::ZERO
            };

            let level = stock_levels::get_or_create(
                txn,
                company_id,
                movement.product_id,
                destination,
                movement.lot_id,
            )
            .await?;
            let new_qty = level.quantity + qty;
            stock_levels::update_quantity(txn, level, new_qty).await?;

            if let Some(unit_cost) = incoming_cost {
                valuation::apply_incoming_cost(
                    txn,
                    company_id,
                    movement.product_id,
                    pre_update_total,
                    qty,
                    unit_cost,
                )
                .await?;
            }
        }
        MovementType::Out => {
            let source = required_source(movement)?;
            let level = stock_levels::get_or_create(
                txn,
                company_id,
                movement.product_id,
                source,
                movement.lot_id,
            )
            .await?;
            let available = level.available_quantity();
            if available < qty {
                return Err(ServiceError::InsufficientStock(format!(
                    "Available: {}, Requested: {}",
                    available, qty
                )));
            }
            let new_qty = level.quantity - qty;
            stock_levels::update_quantity(txn, level, new_qty).await?;
        }
        MovementType::Transfer => {
            let source = required_source(movement)?;
            let destination = required_destination(movement)?;

            let source_level = stock_levels::get_or_create(
                txn,
                company_id,
                movement.product_id,
                source,
                movement.lot_id,
            )
            .await?;
            let available = source_level.available_quantity();
            if available < qty {
                return Err(ServiceError::InsufficientStock(format!(
                    "Insufficient stock at source. Available: {}, Requested: {}",
                    available, qty
                )));
            }
            let new_source_qty = source_level.quantity - qty;
            stock_levels::update_quantity(txn, source_level, new_source_qty).await?;

            let destination_level = stock_levels::get_or_create(
                txn,
                company_id,
                movement.product_id,
                destination,
                movement.lot_id,
            )
            .await?;
            let new_destination_qty = destination_level.quantity + qty;
            stock_levels::update_quantity(txn, destination_level, new_destination_qty).await?;
        }
        MovementType::Adjustment => {
            // Absolute semantics: the destination quantity is set to the
            // movement quantity, not adjusted by it.
            let destination = required_destination(movement)?;
            let level = stock_levels::get_or_create(
                txn,
                company_id,
                movement.product_id,
                destination,
                movement.lot_id,
            )
            .await?;
            stock_levels::update_quantity(txn, level, qty).await?;
        }
    }
    Ok(())
}

/// Reverses the validate-time mutation of a validated movement.
async fn apply_reversal(
    txn: &DatabaseTransaction,
    movement: &stock_movement::Model,
    company_id: Uuid,
) -> Result<(), ServiceError> {
    let qty = movement.quantity;
    match movement.movement_type()? {
        MovementType::In => {
            let destination = required_destination(movement)?;
            let level = stock_levels::get_or_create(
                txn,
                company_id,
                movement.product_id,
                destination,
                movement.lot_id,
            )
            .await?;
            let new_qty = level.quantity - qty;
            stock_levels::update_quantity(txn, level, new_qty).await?;
        }
        MovementType::Out => {
            let source = required_source(movement)?;
            let level = stock_levels::get_or_create(
                txn,
                company_id,
                movement.product_id,
                source,
                movement.lot_id,
            )
            .await?;
            let new_qty = level.quantity + qty;
            stock_levels::update_quantity(txn, level, new_qty).await?;
        }
        MovementType::Transfer => {
            let source = required_source(movement)?;
            let destination = required_destination(movement)?;

            let source_level = stock_levels::get_or_create(
                txn,
                company_id,
                movement.product_id,
                source,
                movement.lot_id,
            )
            .await?;
            let new_source_qty = source_level.quantity + qty;
            stock_levels::update_quantity(txn, source_level, new_source_qty).await?;

            let destination_level = stock_levels::get_or_create(
                txn,
                company_id,
                movement.product_id,
                destination,
                movement.lot_id,
            )
            .await?;
            let new_destination_qty = destination_level.quantity - qty;
            stock_levels::update_quantity(txn, destination_level, new_destination_qty).await?;
        }
        MovementType::Adjustment => {
            return Err(ServiceError::InvalidState(
                "a validated adjustment movement cannot be cancelled: there is no prior \
                 absolute quantity to restore"
                    .to_string(),
            ));
        }
    }
    Ok(())
}

fn required_source(movement: &stock_movement::Model) -> Result<Uuid, ServiceError> {
    movement.source_location_id.ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "{} movement has no source location",
            movement.movement_type
        ))
    })
}

fn required_destination(movement: &stock_movement::Model) -> Result<Uuid, ServiceError> {
    movement.destination_location_id.ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "{} movement has no destination location",
            movement.movement_type
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn pagination_bounds() {
        assert!(check_pagination(1, 20).is_ok());
        assert!(check_pagination(10, 1000).is_ok());
        assert_matches!(
            check_pagination(0, 20),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            check_pagination(1, 0),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            check_pagination(1, 1001),
            Err(ServiceError::ValidationError(_))
        );
    }
}
