//! Recurring count planning.
//!
//! Cycles schedule counts by ABC classification: class A monthly, B
//! quarterly, C yearly. Starting a cycle spawns an in-progress count
//! session restricted to the cycle's classification/category over its
//! warehouse; completing it requires that session to have validated.

use crate::audit::{AuditEntry, AuditSink};
use crate::auth::{ActorContext, Capability};
use crate::db::DbPool;
use crate::entities::inventory::{self, Entity as Inventory, InventoryStatus};
use crate::entities::inventory_cycle::{
    self, CycleFrequency, CycleStatus, Entity as InventoryCycle,
};
use crate::entities::product::{self, AbcClass, Entity as Product, PRODUCT_TYPE_STOCKABLE};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::sequence::{ReferenceAllocator, INVENTORY_PREFIX};
use crate::services::inventory_counts;
use crate::services::movements::check_pagination;
use chrono::{Months, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Input for creating one planned cycle.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewCycle {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub frequency: CycleFrequency,
    pub classification: Option<AbcClass>,
    pub category_id: Option<Uuid>,
    pub warehouse_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub assigned_to: Option<Uuid>,
}

/// Input for bulk-generating cycles over a period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateCycles {
    pub warehouse_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub assigned_to: Option<Uuid>,
}

/// Filters for listing cycles.
#[derive(Debug, Clone, Default)]
pub struct CycleFilter {
    pub status: Option<CycleStatus>,
    pub warehouse_id: Option<Uuid>,
    pub frequency: Option<CycleFrequency>,
    pub classification: Option<AbcClass>,
}

fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    // chrono clamps to the last day of the resulting month
    date.checked_add_months(Months::new(months)).unwrap_or(date)
}

/// Service for recurring inventory cycles.
#[derive(Clone)]
pub struct InventoryCycleService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    audit: Arc<dyn AuditSink>,
    references: Arc<dyn ReferenceAllocator>,
}

impl InventoryCycleService {
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

    /// Creates one planned cycle.
    #[instrument(skip(self, ctx, input))]
    pub async fn create(
        &self,
        ctx: &ActorContext,
        input: NewCycle,
    ) -> Result<inventory_cycle::Model, ServiceError> {
        ctx.require(Capability::InventoryCount)?;
        input.validate()?;

        if input.start_date > input.end_date {
            return Err(ServiceError::InvalidInput(
                "Cycle start date must not be after its end date".to_string(),
            ));
        }

        let cycle = inventory_cycle::ActiveModel {
            name: Set(input.name),
            frequency: Set(input.frequency.as_str().to_string()),
            classification: Set(input.classification.map(|c| c.as_str().to_string())),
            category_id: Set(input.category_id),
            warehouse_id: Set(input.warehouse_id),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            assigned_to: Set(input.assigned_to),
            status: Set(CycleStatus::Planned.as_str().to_string()),
            company_id: Set(ctx.company_id),
            ..Default::default()
        };
        let cycle = cycle
            .insert(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "create",
                "inventory_cycle",
                cycle.id,
                format!("Created inventory cycle '{}' ({})", cycle.name, cycle.frequency),
            ))
            .await;

        Ok(cycle)
    }

    /// Generates planned cycles over a period following the ABC cadence:
    /// A monthly, B quarterly, C yearly.
    #[instrument(skip(self, ctx, input))]
    pub async fn generate(
        &self,
        ctx: &ActorContext,
        input: GenerateCycles,
    ) -> Result<Vec<inventory_cycle::Model>, ServiceError> {
        ctx.require(Capability::InventoryCount)?;

        if input.period_start >= input.period_end {
            return Err(ServiceError::InvalidInput(
                "Generation period start must be before its end".to_string(),
            ));
        }

        let GenerateCycles {
            warehouse_id,
            period_start,
            period_end,
            assigned_to,
        } = input;
        let company_id = ctx.company_id;
        let cycles = self
            .db_pool
            .transaction::<_, Vec<inventory_cycle::Model>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let plan = [
                        (AbcClass::A, CycleFrequency::Monthly),
                        (AbcClass::B, CycleFrequency::Quarterly),
                        (AbcClass::C, CycleFrequency::Yearly),
                    ];

                    let mut created = Vec::new();
                    for (class, frequency) in plan {
                        let mut current_start = period_start;
                        while current_start < period_end {
                            let mut cycle_end = add_months(current_start, frequency.months());
                            if cycle_end > period_end {
                                cycle_end = period_end;
                            }

                            let cycle = inventory_cycle::ActiveModel {
                                name: Set(format!(
                                    "Cycle {} - {}",
                                    class.as_str(),
                                    current_start.format("%Y-%m")
                                )),
                                frequency: Set(frequency.as_str().to_string()),
                                classification: Set(Some(class.as_str().to_string())),
                                warehouse_id: Set(warehouse_id),
                                start_date: Set(current_start),
                                end_date: Set(cycle_end),
                                assigned_to: Set(assigned_to),
                                status: Set(CycleStatus::Planned.as_str().to_string()),
                                company_id: Set(company_id),
                                ..Default::default()
                            };
                            created
                                .push(cycle.insert(txn).await.map_err(ServiceError::db_error)?);
                            current_start = cycle_end;
                        }
                    }
                    Ok(created)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "generate",
                "inventory_cycle",
                warehouse_id,
                format!(
                    "Generated {} inventory cycles for period {} to {}",
                    cycles.len(),
                    period_start,
                    period_end
                ),
            ))
            .await;

        Ok(cycles)
    }

    /// Starts a planned cycle, spawning an in-progress count session whose
    /// snapshot is filtered by the cycle's classification and category.
    #[instrument(skip(self, ctx))]
    pub async fn start(
        &self,
        ctx: &ActorContext,
        cycle_id: Uuid,
    ) -> Result<inventory_cycle::Model, ServiceError> {
        ctx.require(Capability::InventoryCount)?;

        let references = Arc::clone(&self.references);
        let company_id = ctx.company_id;
        let user_id = ctx.user_id;
        let (cycle, inventory_id) = self
            .db_pool
            .transaction::<_, (inventory_cycle::Model, Uuid), ServiceError>(move |txn| {
                Box::pin(async move {
                    let cycle = find_cycle(txn, company_id, cycle_id).await?;
                    let next_status = cycle.status()?.into_in_progress()?;

                    let reference = references
                        .next_reference(txn, INVENTORY_PREFIX, Utc::now().date_naive())
                        .await?;
                    let session = inventory::ActiveModel {
                        reference: Set(reference),
                        name: Set(format!("Cycle count {}", cycle.name)),
                        warehouse_id: Set(cycle.warehouse_id),
                        status: Set(InventoryStatus::InProgress.as_str().to_string()),
                        notes: Set(Some(format!("Auto-generated from cycle '{}'", cycle.name))),
                        created_by: Set(user_id),
                        company_id: Set(company_id),
                        ..Default::default()
                    };
                    let session = session
                        .insert(txn)
                        .await
                        .map_err(|e| ServiceError::conflict_on_unique(e, "inventory reference"))?;

                    // Restrict the snapshot to the cycle's product scope.
                    let mut product_query = Product::find()
                        .filter(product::Column::CompanyId.eq(company_id))
                        .filter(product::Column::IsActive.eq(true))
                        .filter(product::Column::ProductType.eq(PRODUCT_TYPE_STOCKABLE));
                    if let Some(classification) = cycle.classification.as_deref() {
                        product_query = product_query
                            .filter(product::Column::AbcClassification.eq(classification));
                    }
                    if let Some(category_id) = cycle.category_id {
                        product_query =
                            product_query.filter(product::Column::CategoryId.eq(category_id));
                    }
                    let product_ids: Vec<Uuid> = product_query
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .into_iter()
                        .map(|p| p.id)
                        .collect();

                    inventory_counts::snapshot_lines(
                        txn,
                        company_id,
                        cycle.warehouse_id,
                        session.id,
                        Some(&product_ids),
                    )
                    .await?;

                    let mut active: inventory_cycle::ActiveModel = cycle.into();
                    active.status = Set(next_status.as_str().to_string());
                    active.inventory_id = Set(Some(session.id));
                    let cycle = active.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok((cycle, session.id))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "start",
                "inventory_cycle",
                cycle.id,
                format!("Started cycle '{}'", cycle.name),
            ))
            .await;

        self.publish(Event::CycleStarted {
            cycle_id: cycle.id,
            inventory_id,
        })
        .await;

        Ok(cycle)
    }

    /// Completes an in-progress cycle. The linked count session, if any,
    /// must have been validated first.
    #[instrument(skip(self, ctx))]
    pub async fn complete(
        &self,
        ctx: &ActorContext,
        cycle_id: Uuid,
    ) -> Result<inventory_cycle::Model, ServiceError> {
        ctx.require(Capability::InventoryCount)?;

        let cycle = find_cycle(&*self.db_pool, ctx.company_id, cycle_id).await?;
        let next_status = cycle.status()?.into_completed()?;

        if let Some(inventory_id) = cycle.inventory_id {
            let session = Inventory::find_by_id(inventory_id)
                .filter(inventory::Column::CompanyId.eq(ctx.company_id))
                .one(&*self.db_pool)
                .await
                .map_err(ServiceError::db_error)?;
            if let Some(session) = session {
                if session.status()? != InventoryStatus::Validated {
                    return Err(ServiceError::InvalidState(
                        "linked inventory must be validated before completing the cycle"
                            .to_string(),
                    ));
                }
            }
        }

        let mut active: inventory_cycle::ActiveModel = cycle.into();
        active.status = Set(next_status.as_str().to_string());
        let cycle = active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        self.audit
            .record(AuditEntry::new(
                ctx.user_id,
                ctx.company_id,
                "complete",
                "inventory_cycle",
                cycle.id,
                format!("Completed cycle '{}'", cycle.name),
            ))
            .await;

        self.publish(Event::CycleCompleted { cycle_id: cycle.id }).await;

        Ok(cycle)
    }

    /// Fetches one cycle.
    #[instrument(skip(self, ctx))]
    pub async fn get(
        &self,
        ctx: &ActorContext,
        cycle_id: Uuid,
    ) -> Result<inventory_cycle::Model, ServiceError> {
        ctx.require(Capability::StockView)?;
        find_cycle(&*self.db_pool, ctx.company_id, cycle_id).await
    }

    /// Lists cycles for the tenant, most recent start date first.
    #[instrument(skip(self, ctx, filter))]
    pub async fn list(
        &self,
        ctx: &ActorContext,
        filter: CycleFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<inventory_cycle::Model>, u64), ServiceError> {
        ctx.require(Capability::StockView)?;
        check_pagination(page, limit)?;

        let mut query = InventoryCycle::find()
            .filter(inventory_cycle::Column::CompanyId.eq(ctx.company_id))
            .order_by_desc(inventory_cycle::Column::StartDate);

        if let Some(status) = filter.status {
            query = query.filter(inventory_cycle::Column::Status.eq(status.as_str()));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(inventory_cycle::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(frequency) = filter.frequency {
            query = query.filter(inventory_cycle::Column::Frequency.eq(frequency.as_str()));
        }
        if let Some(classification) = filter.classification {
            query = query
                .filter(inventory_cycle::Column::Classification.eq(classification.as_str()));
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
            warn!(error = %e, "Failed to publish cycle event");
        }
    }
}

async fn find_cycle<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    cycle_id: Uuid,
) -> Result<inventory_cycle::Model, ServiceError> {
    InventoryCycle::find_by_id(cycle_id)
        .filter(inventory_cycle::Column::CompanyId.eq(company_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Inventory cycle {} not found", cycle_id)))
}
