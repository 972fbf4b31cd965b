use std::sync::Arc;

use crate::{
    audit::{AuditSink, TracingAuditSink},
    db::DbPool,
    events::EventSender,
    sequence::{DbReferenceAllocator, ReferenceAllocator},
    services::{
        inventory_counts::InventoryCountService, inventory_cycles::InventoryCycleService,
        movements::MovementService, replenishment::ReplenishmentService,
        reservations::ReservationService, stock_dashboard::StockDashboardService,
        stock_levels::StockLevelService, transfers::TransferService,
    },
};

/// Factory for creating service instances with shared dependencies.
pub struct ServiceFactory {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    audit: Arc<dyn AuditSink>,
    references: Arc<dyn ReferenceAllocator>,
}

impl ServiceFactory {
    /// Creates a factory with the default audit sink and reference
    /// allocator.
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
            audit: Arc::new(TracingAuditSink),
            references: Arc::new(DbReferenceAllocator),
        }
    }

    /// Swaps in a custom audit sink.
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Swaps in a custom reference allocator.
    pub fn with_reference_allocator(mut self, references: Arc<dyn ReferenceAllocator>) -> Self {
        self.references = references;
        self
    }

    pub fn stock_level_service(&self) -> StockLevelService {
        StockLevelService::new(self.db_pool.clone())
    }

    pub fn movement_service(&self) -> MovementService {
        MovementService::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.audit.clone(),
            self.references.clone(),
        )
    }

    pub fn reservation_service(&self) -> ReservationService {
        ReservationService::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.audit.clone(),
        )
    }

    pub fn transfer_service(&self) -> TransferService {
        TransferService::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.audit.clone(),
            self.references.clone(),
        )
    }

    pub fn inventory_count_service(&self) -> InventoryCountService {
        InventoryCountService::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.audit.clone(),
            self.references.clone(),
        )
    }

    pub fn inventory_cycle_service(&self) -> InventoryCycleService {
        InventoryCycleService::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.audit.clone(),
            self.references.clone(),
        )
    }

    pub fn replenishment_service(&self) -> ReplenishmentService {
        ReplenishmentService::new(self.db_pool.clone())
    }

    pub fn stock_dashboard_service(&self) -> StockDashboardService {
        StockDashboardService::new(self.db_pool.clone())
    }

    /// Gets a reference to the database pool.
    pub fn db_pool(&self) -> &Arc<DbPool> {
        &self.db_pool
    }

    /// Gets a reference to the event sender.
    pub fn event_sender(&self) -> &EventSender {
        &self.event_sender
    }
}

/// Service container holding all service instances.
#[derive(Clone)]
pub struct ServiceContainer {
    pub stock_levels: Arc<StockLevelService>,
    pub movements: Arc<MovementService>,
    pub reservations: Arc<ReservationService>,
    pub transfers: Arc<TransferService>,
    pub inventory_counts: Arc<InventoryCountService>,
    pub inventory_cycles: Arc<InventoryCycleService>,
    pub replenishment: Arc<ReplenishmentService>,
    pub stock_dashboard: Arc<StockDashboardService>,
}

impl ServiceContainer {
    /// Creates a new service container with all services initialized.
    pub fn new(factory: &ServiceFactory) -> Self {
        Self {
            stock_levels: Arc::new(factory.stock_level_service()),
            movements: Arc::new(factory.movement_service()),
            reservations: Arc::new(factory.reservation_service()),
            transfers: Arc::new(factory.transfer_service()),
            inventory_counts: Arc::new(factory.inventory_count_service()),
            inventory_cycles: Arc::new(factory.inventory_cycle_service()),
            replenishment: Arc::new(factory.replenishment_service()),
            stock_dashboard: Arc::new(factory.stock_dashboard_service()),
        }
    }
}
