//! Cross-warehouse transfer workflow.
//!
//! Source stock leaves at `validate`, travels while `in_transit`, and lands
//! at `receive`. Each stock effect also writes an already-validated ledger
//! movement, so the movement history alone reconstructs the transfer.
//!
//! Transfers operate at warehouse granularity: the stock point on each side
//! is the warehouse's *default location*, its first active location in
//! creation order. A warehouse with several locations always stages
//! transfers through that one; callers needing per-location precision
//! should move stock with location-level transfer movements instead.

use crate::audit::{AuditEntry, AuditSink};
use crate::auth::{ActorContext, Capability};
use crate::db::DbPool;
use crate::entities::stock_location::{self, Entity as StockLocation};
use crate::entities::stock_movement::MovementType;
use crate::entities::stock_transfer::{self, Entity as StockTransfer, TransferStatus};
use crate::entities::stock_transfer_line::{self, Entity as StockTransferLine};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::sequence::{ReferenceAllocator, TRANSFER_PREFIX};
use crate::services::movements::{self, check_pagination, LedgerEntry};
use crate::services::stock_levels;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// One product line of a new transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransferLine {
    pub product_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub quantity_sent: Decimal,
}

/// Input for creating a transfer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewTransfer {
    pub source_warehouse_id: Uuid,
    pub destination_warehouse_id: Uuid,
    pub transfer_date: NaiveDate,
    pub expected_arrival_date: Option<NaiveDate>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub lines: Vec<NewTransferLine>,
}

/// Draft-only mutable fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTransfer {
    pub transfer_date: Option<NaiveDate>,
    pub expected_arrival_date: Option<NaiveDate>,
    #[validate(length(max = 255))]
    pub transporter: Option<String>,
    #[validate(length(max = 255))]
    pub tracking_number: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Transporter metadata attached when shipping.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ShipTransfer {
    #[validate(length(max = 255))]
    pub transporter: Option<String>,
    #[validate(length(max = 255))]
    pub tracking_number: Option<String>,
}

/// Caller-supplied received quantity for one line; lines not listed default
/// to their sent quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub line_id: Uuid,
    pub quantity_received: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiveTransfer {
    pub lines: Vec<ReceivedLine>,
}

/// A transfer together with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferDetails {
    pub transfer: stock_transfer::Model,
    pub lines: Vec<stock_transfer_line::Model>,
}

/// Filters for listing transfers.
#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    pub warehouse_id: Option<Uuid>,
    pub search: Option<String>,
}

/// Service for the cross-warehouse transfer workflow.
#[derive(Clone)]
pub struct TransferService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    audit: Arc<dyn AuditSink>,
    references: Arc<dyn ReferenceAllocator>,
}

impl TransferService {
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

    /// Creates a draft transfer with its lines.
    #[instrument(skip(self, ctx, input))]
    pub async fn create(
        &self,
        ctx: &ActorContext,
        input: NewTransfer,
    ) -> Result<TransferDetails, ServiceError> {
        ctx.require(Capability::TransferManage)?;
        input.validate()?;

        if input.source_warehouse_id == input.destination_warehouse_id {
            return Err(ServiceError::InvalidInput(
                "Source and destination warehouses must be different".to_string(),
            ));
        }
        if input
            .lines
            .iter()
            .any(|line| line.quantity_sent <= Decimal::ZERO)
        {
            return Err(ServiceError::InvalidInput(
                "Line quantities must be positive".to_string(),
            ));
        }

        let references = Arc::clone(&self.references);
        let company_id = ctx.company_id;
        let user_id = ctx.user_id;
        let details = self
            .db_pool
            .transaction::<_, TransferDetails, ServiceError>(move |txn| {
                Box::pin(async move {
                    let reference = references
                        .next_reference(txn, TRANSFER_PREFIX, Utc::now().date_naive())
                        .await?;
                    let transfer = stock_transfer::ActiveModel {
                        reference: Set(reference),
                        source_warehouse_id: Set(input.source_warehouse_id),
                        destination_warehouse_id: Set(input.destination_warehouse_id),
                        status: Set(TransferStatus::Draft.as_str().to_string()),
                        transfer_date: Set(input.transfer_date),
                        expected_arrival_date: Set(input.expected_arrival_date),
                        notes: Set(input.notes),
                        created_by: Set(user_id),
                        company_id: Set(company_id),
                        ..Default::default()
                    };
                    let transfer = transfer
                        .insert(txn)
                        .await
                        .map_err(|e| ServiceError::conflict_on_unique(e, "transfer reference"))?;

                    let mut lines = Vec::with_capacity(input.lines.len());
                    for line in input.lines {
                        let line = stock_transfer_line::ActiveModel {
                            transfer_id: Set(transfer.id),
                            product_id: Set(line.product_id),
                            lot_id: Set(line.lot_id),
                            quantity_sent: Set(line.quantity_sent),
                            quantity_received: Set(None),
                            ..Default::default()
                        };
                        lines.push(line.insert(txn).await.map_err(ServiceError::db_error)?);
                    }

                    Ok(TransferDetails { transfer, lines })
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "create",
                "stock_transfer",
                details.transfer.id,
                format!(
                    "Created transfer {} ({} -> {})",
                    details.transfer.reference,
                    details.transfer.source_warehouse_id,
                    details.transfer.destination_warehouse_id
                ),
            ))
            .await;

        self.publish(Event::TransferCreated {
            transfer_id: details.transfer.id,
            reference: details.transfer.reference.clone(),
        })
        .await;

        Ok(details)
    }

    /// Validates a draft transfer: checks and decrements source stock for
    /// every line (fail-fast on the first insufficiency) and records one
    /// validated `out` movement per line.
    #[instrument(skip(self, ctx))]
    pub async fn validate(
        &self,
        ctx: &ActorContext,
        transfer_id: Uuid,
    ) -> Result<TransferDetails, ServiceError> {
        ctx.require(Capability::TransferManage)?;

        let references = Arc::clone(&self.references);
        let company_id = ctx.company_id;
        let user_id = ctx.user_id;
        let details = self
            .db_pool
            .transaction::<_, TransferDetails, ServiceError>(move |txn| {
                Box::pin(async move {
                    let transfer = find_transfer(txn, company_id, transfer_id).await?;
                    let next_status = transfer.status()?.into_validated()?;

                    let lines = load_lines(txn, transfer.id).await?;
                    if lines.is_empty() {
                        return Err(ServiceError::InvalidInput(
                            "Transfer must have at least one line".to_string(),
                        ));
                    }

                    let source_location =
                        default_location(txn, company_id, transfer.source_warehouse_id).await?;

                    for line in &lines {
                        let level = stock_levels::get_or_create(
                            txn,
                            company_id,
                            line.product_id,
                            source_location.id,
                            line.lot_id,
                        )
                        .await?;
                        let available = level.available_quantity();
                        if available < line.quantity_sent {
                            return Err(ServiceError::InsufficientStock(format!(
                                "Insufficient stock for product {}. Available: {}, Requested: {}",
                                line.product_id, available, line.quantity_sent
                            )));
                        }
                        let new_qty = level.quantity - line.quantity_sent;
                        stock_levels::update_quantity(txn, level, new_qty).await?;

                        movements::record_validated_movement(
                            txn,
                            references.as_ref(),
                            LedgerEntry {
                                movement_type: MovementType::Out,
                                product_id: line.product_id,
                                lot_id: line.lot_id,
                                source_location_id: Some(source_location.id),
                                destination_location_id: None,
                                quantity: line.quantity_sent,
                                reason: format!("Transfer {} - outgoing", transfer.reference),
                                notes: None,
                                validated_by: user_id,
                                company_id,
                            },
                        )
                        .await?;
                    }

                    let mut active: stock_transfer::ActiveModel = transfer.into();
                    active.status = Set(next_status.as_str().to_string());
                    let transfer = active.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok(TransferDetails { transfer, lines })
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "validate",
                "stock_transfer",
                details.transfer.id,
                format!("Validated transfer {}", details.transfer.reference),
            ))
            .await;

        self.publish(Event::TransferValidated {
            transfer_id: details.transfer.id,
        })
        .await;

        Ok(details)
    }

    /// Marks a validated transfer as on the road. No stock effect: the
    /// source was already debited at validation.
    #[instrument(skip(self, ctx, body))]
    pub async fn ship(
        &self,
        ctx: &ActorContext,
        transfer_id: Uuid,
        body: ShipTransfer,
    ) -> Result<stock_transfer::Model, ServiceError> {
        ctx.require(Capability::TransferManage)?;
        body.validate()?;

        let transfer = find_transfer(&*self.db_pool, ctx.company_id, transfer_id).await?;
        let next_status = transfer.status()?.into_in_transit()?;

        let mut active: stock_transfer::ActiveModel = transfer.into();
        if let Some(transporter) = body.transporter {
            active.transporter = Set(Some(transporter));
        }
        if let Some(tracking_number) = body.tracking_number {
            active.tracking_number = Set(Some(tracking_number));
        }
        active.status = Set(next_status.as_str().to_string());
        let transfer = active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "ship",
                "stock_transfer",
                transfer.id,
                format!("Shipped transfer {}", transfer.reference),
            ))
            .await;

        self.publish(Event::TransferShipped {
            transfer_id: transfer.id,
        })
        .await;

        Ok(transfer)
    }

    /// Receives an in-transit transfer: credits the destination default
    /// location with each line's received quantity (defaulting to the sent
    /// quantity), records an `in` movement per line, and on shortage an
    /// extra `adjustment` movement carrying the received amount so the
    /// discrepancy is its own ledger entry.
    #[instrument(skip(self, ctx, body))]
    pub async fn receive(
        &self,
        ctx: &ActorContext,
        transfer_id: Uuid,
        body: ReceiveTransfer,
    ) -> Result<TransferDetails, ServiceError> {
        ctx.require(Capability::TransferManage)?;

        if body
            .lines
            .iter()
            .any(|line| line.quantity_received < Decimal::ZERO)
        {
            return Err(ServiceError::InvalidInput(
                "Received quantities cannot be negative".to_string(),
            ));
        }

        let references = Arc::clone(&self.references);
        let company_id = ctx.company_id;
        let user_id = ctx.user_id;
        let details = self
            .db_pool
            .transaction::<_, TransferDetails, ServiceError>(move |txn| {
                Box::pin(async move {
                    let transfer = find_transfer(txn, company_id, transfer_id).await?;
                    let next_status = transfer.status()?.into_received()?;

                    let destination_location =
                        default_location(txn, company_id, transfer.destination_warehouse_id)
                            .await?;

                    let received_map: HashMap<Uuid, Decimal> = body
                        .lines
                        .into_iter()
                        .map(|line| (line.line_id, line.quantity_received))
                        .collect();

                    let lines = load_lines(txn, transfer.id).await?;
                    let mut updated_lines = Vec::with_capacity(lines.len());
                    for line in lines {
                        let quantity_received = received_map
                            .get(&line.id)
                            .copied()
                            .unwrap_or(line.quantity_sent);
                        let quantity_sent = line.quantity_sent;
                        let product_id = line.product_id;
                        let lot_id = line.lot_id;

                        let mut active: stock_transfer_line::ActiveModel = line.into();
                        active.quantity_received = Set(Some(quantity_received));
                        updated_lines
                            .push(active.update(txn).await.map_err(ServiceError::db_error)?);

                        let level = stock_levels::get_or_create(
                            txn,
                            company_id,
                            product_id,
                            destination_location.id,
                            lot_id,
                        )
                        .await?;
                        let new_qty = level.quantity + quantity_received;
                        stock_levels::update_quantity(txn, level, new_qty).await?;

                        if quantity_received > Decimal::ZERO {
                            movements::record_validated_movement(
                                txn,
                                references.as_ref(),
                                LedgerEntry {
                                    movement_type: MovementType::In,
                                    product_id,
                                    lot_id,
                                    source_location_id: None,
                                    destination_location_id: Some(destination_location.id),
                                    quantity: quantity_received,
                                    reason: format!(
                                        "Transfer {} - incoming",
                                        transfer.reference
                                    ),
                                    notes: None,
                                    validated_by: user_id,
                                    company_id,
                                },
                            )
                            .await?;
                        }

                        // Shortages get their own ledger entry carrying the
                        // received amount rather than a delta.
                        if quantity_received < quantity_sent {
                            movements::record_validated_movement(
                                txn,
                                references.as_ref(),
                                LedgerEntry {
                                    movement_type: MovementType::Adjustment,
                                    product_id,
                                    lot_id,
                                    source_location_id: None,
                                    destination_location_id: Some(destination_location.id),
                                    quantity: quantity_received,
                                    reason: format!(
                                        "Transfer {} - discrepancy adjustment (sent: {}, received: {})",
                                        transfer.reference, quantity_sent, quantity_received
                                    ),
                                    notes: None,
                                    validated_by: user_id,
                                    company_id,
                                },
                            )
                            .await?;
                        }
                    }

                    let mut active: stock_transfer::ActiveModel = transfer.into();
                    active.status = Set(next_status.as_str().to_string());
                    active.actual_arrival_date = Set(Some(Utc::now().date_naive()));
                    let transfer = active.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok(TransferDetails {
                        transfer,
                        lines: updated_lines,
                    })
                })
            })
            .await
            .map_err(ServiceError::from)?;

        info!(
            transfer_id = %details.transfer.id,
            reference = %details.transfer.reference,
            "Received stock transfer"
        );

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "receive",
                "stock_transfer",
                details.transfer.id,
                format!("Received transfer {}", details.transfer.reference),
            ))
            .await;

        self.publish(Event::TransferReceived {
            transfer_id: details.transfer.id,
        })
        .await;

        Ok(details)
    }

    /// Cancels a transfer. From draft this is a pure flip; from
    /// validated/in_transit the source-side decrement is reversed first.
    /// A received transfer cannot be cancelled.
    #[instrument(skip(self, ctx))]
    pub async fn cancel(
        &self,
        ctx: &ActorContext,
        transfer_id: Uuid,
    ) -> Result<stock_transfer::Model, ServiceError> {
        ctx.require(Capability::TransferManage)?;

        let company_id = ctx.company_id;
        let transfer = self
            .db_pool
            .transaction::<_, stock_transfer::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let transfer = find_transfer(txn, company_id, transfer_id).await?;
                    let current = transfer.status()?;
                    let next_status = current.into_cancelled()?;

                    if current.source_stock_deducted() {
                        let source_location =
                            default_location(txn, company_id, transfer.source_warehouse_id)
                                .await?;
                        for line in load_lines(txn, transfer.id).await? {
                            let level = stock_levels::get_or_create(
                                txn,
                                company_id,
                                line.product_id,
                                source_location.id,
                                line.lot_id,
                            )
                            .await?;
                            let new_qty = level.quantity + line.quantity_sent;
                            stock_levels::update_quantity(txn, level, new_qty).await?;
                        }
                    }

                    let mut active: stock_transfer::ActiveModel = transfer.into();
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
                "stock_transfer",
                transfer.id,
                format!("Cancelled transfer {}", transfer.reference),
            ))
            .await;

        self.publish(Event::TransferCancelled {
            transfer_id: transfer.id,
        })
        .await;

        Ok(transfer)
    }

    /// Updates the mutable fields of a draft transfer.
    #[instrument(skip(self, ctx, changes))]
    pub async fn update(
        &self,
        ctx: &ActorContext,
        transfer_id: Uuid,
        changes: UpdateTransfer,
    ) -> Result<stock_transfer::Model, ServiceError> {
        ctx.require(Capability::TransferManage)?;
        changes.validate()?;

        let transfer = find_transfer(&*self.db_pool, ctx.company_id, transfer_id).await?;
        if !transfer.status()?.is_draft() {
            return Err(ServiceError::InvalidState(
                "can only update draft transfers".to_string(),
            ));
        }

        let mut active: stock_transfer::ActiveModel = transfer.into();
        if let Some(transfer_date) = changes.transfer_date {
            active.transfer_date = Set(transfer_date);
        }
        if let Some(expected_arrival_date) = changes.expected_arrival_date {
            active.expected_arrival_date = Set(Some(expected_arrival_date));
        }
        if let Some(transporter) = changes.transporter {
            active.transporter = Set(Some(transporter));
        }
        if let Some(tracking_number) = changes.tracking_number {
            active.tracking_number = Set(Some(tracking_number));
        }
        if let Some(notes) = changes.notes {
            active.notes = Set(Some(notes));
        }
        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Fetches one transfer with its lines.
    #[instrument(skip(self, ctx))]
    pub async fn get(
        &self,
        ctx: &ActorContext,
        transfer_id: Uuid,
    ) -> Result<TransferDetails, ServiceError> {
        ctx.require(Capability::StockView)?;
        let transfer = find_transfer(&*self.db_pool, ctx.company_id, transfer_id).await?;
        let lines = load_lines(&*self.db_pool, transfer.id).await?;
        Ok(TransferDetails { transfer, lines })
    }

    /// Lists transfers for the tenant, newest first.
    #[instrument(skip(self, ctx, filter))]
    pub async fn list(
        &self,
        ctx: &ActorContext,
        filter: TransferFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_transfer::Model>, u64), ServiceError> {
        ctx.require(Capability::StockView)?;
        check_pagination(page, limit)?;

        let mut query = StockTransfer::find()
            .filter(stock_transfer::Column::CompanyId.eq(ctx.company_id))
            .order_by_desc(stock_transfer::Column::CreatedAt);

        if let Some(status) = filter.status {
            query = query.filter(stock_transfer::Column::Status.eq(status.as_str()));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(
                Condition::any()
                    .add(stock_transfer::Column::SourceWarehouseId.eq(warehouse_id))
                    .add(stock_transfer::Column::DestinationWarehouseId.eq(warehouse_id)),
            );
        }
        if let Some(search) = filter.search {
            query = query.filter(stock_transfer::Column::Reference.contains(search.as_str()));
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
            warn!(error = %e, "Failed to publish transfer event");
        }
    }
}

async fn find_transfer<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    transfer_id: Uuid,
) -> Result<stock_transfer::Model, ServiceError> {
    StockTransfer::find_by_id(transfer_id)
        .filter(stock_transfer::Column::CompanyId.eq(company_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Transfer {} not found", transfer_id)))
}

async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    transfer_id: Uuid,
) -> Result<Vec<stock_transfer_line::Model>, ServiceError> {
    StockTransferLine::find()
        .filter(stock_transfer_line::Column::TransferId.eq(transfer_id))
        .order_by_asc(stock_transfer_line::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

/// The warehouse's implicit stock point: its first active location in
/// creation order.
pub(crate) async fn default_location<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    warehouse_id: Uuid,
) -> Result<stock_location::Model, ServiceError> {
    StockLocation::find()
        .filter(stock_location::Column::CompanyId.eq(company_id))
        .filter(stock_location::Column::WarehouseId.eq(warehouse_id))
        .filter(stock_location::Column::IsActive.eq(true))
        .order_by_asc(stock_location::Column::CreatedAt)
        .limit(1)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "No active location found for warehouse {}",
                warehouse_id
            ))
        })
}
