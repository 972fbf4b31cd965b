//! Physical count sessions.
//!
//! A session snapshots expected quantities at creation, stages counts while
//! in progress, and applies the differences at validation: one validated
//! `adjustment` movement per differing line plus a direct write of the
//! counted quantity into the stock level store. Movements recorded between
//! creation and start are not reflected in the snapshot; recreate the
//! session if that matters.

use crate::audit::{AuditEntry, AuditSink};
use crate::auth::{ActorContext, Capability};
use crate::db::DbPool;
use crate::entities::inventory::{self, Entity as Inventory, InventoryStatus};
use crate::entities::inventory_line::{self, Entity as InventoryLine};
use crate::entities::stock_level::{self, Entity as StockLevel};
use crate::entities::stock_location::{self, Entity as StockLocation};
use crate::entities::stock_movement::MovementType;
use crate::entities::warehouse::{self, Entity as Warehouse};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::sequence::{ReferenceAllocator, INVENTORY_PREFIX};
use crate::services::movements::{self, check_pagination, LedgerEntry};
use crate::services::stock_levels;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Input for creating a count session.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewInventoryCount {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub warehouse_id: Uuid,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Staged count for one line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateInventoryLine {
    pub counted_quantity: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// A session together with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryCountDetails {
    pub inventory: inventory::Model,
    pub lines: Vec<inventory_line::Model>,
}

/// Filters for listing sessions.
#[derive(Debug, Clone, Default)]
pub struct InventoryCountFilter {
    pub status: Option<InventoryStatus>,
    pub warehouse_id: Option<Uuid>,
    pub search: Option<String>,
}

/// Service for inventory count sessions.
#[derive(Clone)]
pub struct InventoryCountService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    audit: Arc<dyn AuditSink>,
    references: Arc<dyn ReferenceAllocator>,
}

impl InventoryCountService {
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

    /// Creates a draft session, snapshotting every stock level row at every
    /// active location of the warehouse into expected quantities.
    #[instrument(skip(self, ctx, input))]
    pub async fn create(
        &self,
        ctx: &ActorContext,
        input: NewInventoryCount,
    ) -> Result<InventoryCountDetails, ServiceError> {
        ctx.require(Capability::InventoryCount)?;
        input.validate()?;

        let references = Arc::clone(&self.references);
        let company_id = ctx.company_id;
        let user_id = ctx.user_id;
        let details = self
            .db_pool
            .transaction::<_, InventoryCountDetails, ServiceError>(move |txn| {
                Box::pin(async move {
                    let warehouse = Warehouse::find_by_id(input.warehouse_id)
                        .filter(warehouse::Column::CompanyId.eq(company_id))
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Warehouse {} not found",
                                input.warehouse_id
                            ))
                        })?;

                    let reference = references
                        .next_reference(txn, INVENTORY_PREFIX, Utc::now().date_naive())
                        .await?;
                    let session = inventory::ActiveModel {
                        reference: Set(reference),
                        name: Set(input.name),
                        warehouse_id: Set(warehouse.id),
                        status: Set(InventoryStatus::Draft.as_str().to_string()),
                        notes: Set(input.notes),
                        created_by: Set(user_id),
                        company_id: Set(company_id),
                        ..Default::default()
                    };
                    let session = session
                        .insert(txn)
                        .await
                        .map_err(|e| ServiceError::conflict_on_unique(e, "inventory reference"))?;

                    let lines =
                        snapshot_lines(txn, company_id, warehouse.id, session.id, None).await?;

                    Ok(InventoryCountDetails {
                        inventory: session,
                        lines,
                    })
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "create",
                "inventory",
                details.inventory.id,
                format!(
                    "Created inventory session '{}' ({})",
                    details.inventory.name, details.inventory.reference
                ),
            ))
            .await;

        self.publish(Event::InventoryCountCreated {
            inventory_id: details.inventory.id,
            reference: details.inventory.reference.clone(),
            lines: details.lines.len() as u64,
        })
        .await;

        Ok(details)
    }

    /// Starts a draft session. Counting happens against the snapshot taken
    /// at creation time.
    #[instrument(skip(self, ctx))]
    pub async fn start(
        &self,
        ctx: &ActorContext,
        inventory_id: Uuid,
    ) -> Result<inventory::Model, ServiceError> {
        ctx.require(Capability::InventoryCount)?;

        let session = find_session(&*self.db_pool, ctx.company_id, inventory_id).await?;
        let next_status = session.status()?.into_in_progress()?;

        let mut active: inventory::ActiveModel = session.into();
        active.status = Set(next_status.as_str().to_string());
        active.started_at = Set(Some(Utc::now()));
        let session = active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "start",
                "inventory",
                session.id,
                format!("Started inventory '{}'", session.name),
            ))
            .await;

        self.publish(Event::InventoryCountStarted {
            inventory_id: session.id,
        })
        .await;

        Ok(session)
    }

    /// Stages a counted quantity on one line of an in-progress session.
    /// No stock effect until the session validates.
    #[instrument(skip(self, ctx, changes))]
    pub async fn update_line(
        &self,
        ctx: &ActorContext,
        inventory_id: Uuid,
        line_id: Uuid,
        changes: UpdateInventoryLine,
    ) -> Result<inventory_line::Model, ServiceError> {
        ctx.require(Capability::InventoryCount)?;
        changes.validate()?;

        if matches!(changes.counted_quantity, Some(q) if q < Decimal::ZERO) {
            return Err(ServiceError::InvalidInput(
                "Counted quantity cannot be negative".to_string(),
            ));
        }

        let session = find_session(&*self.db_pool, ctx.company_id, inventory_id).await?;
        if !session.status()?.is_in_progress() {
            return Err(ServiceError::InvalidState(
                "can only update lines of an in-progress inventory".to_string(),
            ));
        }

        let line = InventoryLine::find_by_id(line_id)
            .filter(inventory_line::Column::InventoryId.eq(session.id))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Inventory line {} not found", line_id))
            })?;

        let mut active: inventory_line::ActiveModel = line.into();
        if let Some(counted) = changes.counted_quantity {
            active.counted_quantity = Set(Some(counted));
        }
        if let Some(notes) = changes.notes {
            active.notes = Set(Some(notes));
        }
        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Validates an in-progress session: every counted line whose count
    /// differs from the snapshot gets a validated `adjustment` movement and
    /// a direct stock level write of the counted quantity. Uncounted and
    /// zero-difference lines are skipped.
    #[instrument(skip(self, ctx))]
    pub async fn validate(
        &self,
        ctx: &ActorContext,
        inventory_id: Uuid,
    ) -> Result<InventoryCountDetails, ServiceError> {
        ctx.require(Capability::InventoryCount)?;

        let references = Arc::clone(&self.references);
        let company_id = ctx.company_id;
        let user_id = ctx.user_id;
        let (details, adjustments) = self
            .db_pool
            .transaction::<_, (InventoryCountDetails, u64), ServiceError>(move |txn| {
                Box::pin(async move {
                    let session = find_session(txn, company_id, inventory_id).await?;
                    let next_status = session.status()?.into_validated()?;

                    let lines = load_lines(txn, session.id).await?;
                    let mut adjustments = 0u64;
                    for line in &lines {
                        let Some(counted) = line.counted_quantity else {
                            continue;
                        };
                        let difference = counted - line.expected_quantity;
                        if difference == Decimal::ZERO {
                            continue;
                        }

                        movements::record_validated_movement(
                            txn,
                            references.as_ref(),
                            LedgerEntry {
                                movement_type: MovementType::Adjustment,
                                product_id: line.product_id,
                                lot_id: line.lot_id,
                                source_location_id: None,
                                destination_location_id: Some(line.location_id),
                                quantity: counted,
                                reason: format!(
                                    "Inventory adjustment from {}",
                                    session.reference
                                ),
                                notes: Some(format!(
                                    "Expected: {}, Counted: {}, Diff: {}",
                                    line.expected_quantity, counted, difference
                                )),
                                validated_by: user_id,
                                company_id,
                            },
                        )
                        .await?;

                        // Materialize the counted quantity directly rather
                        // than replaying the movement.
                        let level = stock_levels::find_for_update(
                            txn,
                            company_id,
                            line.product_id,
                            line.location_id,
                            line.lot_id,
                        )
                        .await?;
                        match level {
                            Some(level) => {
                                stock_levels::update_quantity(txn, level, counted).await?;
                            }
                            None => {
                                let level = stock_level::ActiveModel {
                                    product_id: Set(line.product_id),
                                    location_id: Set(line.location_id),
                                    lot_id: Set(line.lot_id),
                                    quantity: Set(counted),
                                    reserved_quantity: Set(Decimal::ZERO),
                                    company_id: Set(company_id),
                                    ..Default::default()
                                };
                                level.insert(txn).await.map_err(ServiceError::db_error)?;
                            }
                        }
                        adjustments += 1;
                    }

                    let mut active: inventory::ActiveModel = session.into();
                    active.status = Set(next_status.as_str().to_string());
                    active.completed_at = Set(Some(Utc::now()));
                    let session = active.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok((
                        InventoryCountDetails {
                            inventory: session,
                            lines,
                        },
                        adjustments,
                    ))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        info!(
            inventory_id = %details.inventory.id,
            reference = %details.inventory.reference,
            adjustments,
            "Validated inventory session"
        );

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "validate",
                "inventory",
                details.inventory.id,
                format!(
                    "Validated inventory '{}' ({})",
                    details.inventory.name, details.inventory.reference
                ),
            ))
            .await;

        self.publish(Event::InventoryCountValidated {
            inventory_id: details.inventory.id,
            adjustments,
        })
        .await;

        Ok(details)
    }

    /// Cancels a draft or in-progress session. Pure state flip: validate is
    /// the only transition that touches stock.
    #[instrument(skip(self, ctx))]
    pub async fn cancel(
        &self,
        ctx: &ActorContext,
        inventory_id: Uuid,
    ) -> Result<inventory::Model, ServiceError> {
        ctx.require(Capability::InventoryCount)?;

        let session = find_session(&*self.db_pool, ctx.company_id, inventory_id).await?;
        let next_status = session.status()?.into_cancelled()?;

        let mut active: inventory::ActiveModel = session.into();
        active.status = Set(next_status.as_str().to_string());
        let session = active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "cancel",
                "inventory",
                session.id,
                format!("Cancelled inventory '{}'", session.name),
            ))
            .await;

        self.publish(Event::InventoryCountCancelled {
            inventory_id: session.id,
        })
        .await;

        Ok(session)
    }

    /// Fetches one session with its lines.
    #[instrument(skip(self, ctx))]
    pub async fn get(
        &self,
        ctx: &ActorContext,
        inventory_id: Uuid,
    ) -> Result<InventoryCountDetails, ServiceError> {
        ctx.require(Capability::StockView)?;
        let session = find_session(&*self.db_pool, ctx.company_id, inventory_id).await?;
        let lines = load_lines(&*self.db_pool, session.id).await?;
        Ok(InventoryCountDetails {
            inventory: session,
            lines,
        })
    }

    /// Lists sessions for the tenant, newest first.
    #[instrument(skip(self, ctx, filter))]
    pub async fn list(
        &self,
        ctx: &ActorContext,
        filter: InventoryCountFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<inventory::Model>, u64), ServiceError> {
        ctx.require(Capability::StockView)?;
        check_pagination(page, limit)?;

        let mut query = Inventory::find()
            .filter(inventory::Column::CompanyId.eq(ctx.company_id))
            .order_by_desc(inventory::Column::CreatedAt);

        if let Some(status) = filter.status {
            query = query.filter(inventory::Column::Status.eq(status.as_str()));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(inventory::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(search) = filter.search {
            query = query.filter(
                sea_orm::Condition::any()
                    .add(inventory::Column::Reference.contains(search.as_str()))
                    .add(inventory::Column::Name.contains(search.as_str())),
            );
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
            warn!(error = %e, "Failed to publish inventory event");
        }
    }
}

async fn find_session<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    inventory_id: Uuid,
) -> Result<inventory::Model, ServiceError> {
    Inventory::find_by_id(inventory_id)
        .filter(inventory::Column::CompanyId.eq(company_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Inventory {} not found", inventory_id)))
}

async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    inventory_id: Uuid,
) -> Result<Vec<inventory_line::Model>, ServiceError> {
    InventoryLine::find()
        .filter(inventory_line::Column::InventoryId.eq(inventory_id))
        .order_by_asc(inventory_line::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

/// Snapshots stock levels at the warehouse's active locations into lines of
/// a session, optionally restricted to a product id set (used by the cycle
/// planner's classification/category filters).
pub(crate) async fn snapshot_lines(
    txn: &DatabaseTransaction,
    company_id: Uuid,
    warehouse_id: Uuid,
    inventory_id: Uuid,
    product_ids: Option<&[Uuid]>,
) -> Result<Vec<inventory_line::Model>, ServiceError> {
    let location_ids: Vec<Uuid> = StockLocation::find()
        .filter(stock_location::Column::CompanyId.eq(company_id))
        .filter(stock_location::Column::WarehouseId.eq(warehouse_id))
        .filter(stock_location::Column::IsActive.eq(true))
        .all(txn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|location| location.id)
        .collect();

    if location_ids.is_empty() {
        return Ok(Vec::new());
    }
    if matches!(product_ids, Some(ids) if ids.is_empty()) {
        return Ok(Vec::new());
    }

    let mut query = StockLevel::find()
        .filter(stock_level::Column::CompanyId.eq(company_id))
        .filter(stock_level::Column::LocationId.is_in(location_ids));
    if let Some(ids) = product_ids {
        query = query.filter(stock_level::Column::ProductId.is_in(ids.to_vec()));
    }
    let levels = query.all(txn).await.map_err(ServiceError::db_error)?;

    let mut lines = Vec::with_capacity(levels.len());
    for level in levels {
        let line = inventory_line::ActiveModel {
            inventory_id: Set(inventory_id),
            product_id: Set(level.product_id),
            location_id: Set(level.location_id),
            lot_id: Set(level.lot_id),
            expected_quantity: Set(level.quantity),
            counted_quantity: Set(None),
            ..Default::default()
        };
        lines.push(line.insert(txn).await.map_err(ServiceError::db_error)?);
    }
    Ok(lines)
}
