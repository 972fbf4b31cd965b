//! Stockcore
//!
//! Multi-tenant stock ledger and quantity-consistency engine: products,
//! warehouses, locations, lots, stock levels, movements, transfers,
//! reservations, inventory counts and replenishment analytics, all scoped
//! by company and driven through explicit state machines.
//!
//! This crate is a library, not a network service. A thin transport layer
//! owns authentication and routing; it hands every operation an
//! [`auth::ActorContext`] and calls into the services in
//! [`services::factory::ServiceContainer`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod sequence;
pub mod services;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

/// The wired-up stock module: connection, configuration, event channel and
/// all services. The embedding application owns the event receiver side
/// (see [`events::process_events`]) and any recurring timers (the
/// reservation expiry sweep).
#[derive(Clone)]
pub struct StockModule {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: services::factory::ServiceContainer,
}

impl StockModule {
    /// Wires services over an established connection.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let factory = services::factory::ServiceFactory::new(db.clone(), event_sender.clone());
        let services = services::factory::ServiceContainer::new(&factory);
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }

    /// Connects, optionally migrates, and wires services from
    /// configuration. Returns the module and the event receiver the caller
    /// should drain.
    pub async fn init(
        config: config::AppConfig,
    ) -> Result<(Self, tokio::sync::mpsc::Receiver<events::Event>), errors::ServiceError> {
        let pool = db::establish_connection_from_app_config(&config).await?;
        if config.auto_migrate {
            db::run_migrations(&pool).await?;
        }
        let (event_sender, receiver) = events::EventSender::channel(256);
        Ok((Self::new(Arc::new(pool), config, event_sender), receiver))
    }
}

pub mod prelude {
    pub use crate::audit::{AuditEntry, AuditSink, NullAuditSink, TracingAuditSink};
    pub use crate::auth::{ActorContext, AllowAll, Capability, CapabilityCheck};
    pub use crate::config::AppConfig;
    pub use crate::db::DbPool;
    pub use crate::errors::ServiceError;
    pub use crate::events::{Event, EventSender};
    pub use crate::sequence::{DbReferenceAllocator, ReferenceAllocator};
    pub use crate::services::factory::{ServiceContainer, ServiceFactory};
    pub use crate::StockModule;
}
