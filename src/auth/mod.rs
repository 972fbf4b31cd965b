//! Actor identity and capability checking.
//!
//! The core does not authenticate anyone. Callers hand every operation an
//! [`ActorContext`] carrying the acting user, the tenant (company) and a
//! capability checker. Services gate themselves with
//! [`ActorContext::require`]; how capabilities are granted (roles, wildcard
//! permission strings, API keys) is entirely the checker implementation's
//! business and never leaks into the core.

use crate::errors::ServiceError;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Closed set of capabilities the stock module checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    StockView,
    MovementCreate,
    MovementValidate,
    MovementCancel,
    ReservationManage,
    TransferManage,
    InventoryCount,
    ReplenishmentManage,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::StockView => "stock.view",
            Capability::MovementCreate => "stock.movement.create",
            Capability::MovementValidate => "stock.movement.validate",
            Capability::MovementCancel => "stock.movement.cancel",
            Capability::ReservationManage => "stock.reservation.manage",
            Capability::TransferManage => "stock.transfer.manage",
            Capability::InventoryCount => "stock.inventory.count",
            Capability::ReplenishmentManage => "stock.replenishment.manage",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability resolution interface implemented at the edge.
pub trait CapabilityCheck: Send + Sync {
    fn allows(&self, capability: Capability) -> bool;
}

/// Grants everything. Used by system actors and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl CapabilityCheck for AllowAll {
    fn allows(&self, _capability: Capability) -> bool {
        true
    }
}

/// Checker backed by a static set of granted permission strings, with
/// `stock.*` and `*` wildcard support. This is a convenience implementation
/// for embedders that store permissions as strings; the matching logic lives
/// here, at the boundary, not in the services.
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    granted: HashSet<String>,
}

impl StaticCapabilities {
    pub fn new<I, S>(granted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: granted.into_iter().map(Into::into).collect(),
        }
    }
}

impl CapabilityCheck for StaticCapabilities {
    fn allows(&self, capability: Capability) -> bool {
        let name = capability.as_str();
        if self.granted.contains(name) || self.granted.contains("*") {
            return true;
        }
        // "stock.*" style prefix wildcards
        name.rmatch_indices('.')
            .any(|(idx, _)| self.granted.contains(&format!("{}.*", &name[..idx])))
    }
}

/// Identity and tenancy for one operation.
#[derive(Clone)]
pub struct ActorContext {
    pub user_id: Uuid,
    pub company_id: Uuid,
    capabilities: Arc<dyn CapabilityCheck>,
}

impl fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorContext")
            .field("user_id", &self.user_id)
            .field("company_id", &self.company_id)
            .finish()
    }
}

impl ActorContext {
    pub fn new(user_id: Uuid, company_id: Uuid, capabilities: Arc<dyn CapabilityCheck>) -> Self {
        Self {
            user_id,
            company_id,
            capabilities,
        }
    }

    /// A fully privileged actor for a tenant, e.g. background jobs and tests.
    pub fn system(company_id: Uuid) -> Self {
        Self::new(Uuid::nil(), company_id, Arc::new(AllowAll))
    }

    pub fn require(&self, capability: Capability) -> Result<(), ServiceError> {
        if self.capabilities.allows(capability) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "missing capability '{}'",
                capability
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_capabilities_exact_match() {
        let caps = StaticCapabilities::new(["stock.view", "stock.movement.create"]);
        assert!(caps.allows(Capability::StockView));
        assert!(caps.allows(Capability::MovementCreate));
        assert!(!caps.allows(Capability::MovementValidate));
    }

    #[test]
    fn static_capabilities_wildcards() {
        let caps = StaticCapabilities::new(["stock.*"]);
        assert!(caps.allows(Capability::StockView));
        assert!(caps.allows(Capability::TransferManage));

        let nested = StaticCapabilities::new(["stock.movement.*"]);
        assert!(nested.allows(Capability::MovementValidate));
        assert!(!nested.allows(Capability::ReservationManage));

        let all = StaticCapabilities::new(["*"]);
        assert!(all.allows(Capability::ReplenishmentManage));
    }

    #[test]
    fn actor_context_require() {
        let company = Uuid::new_v4();
        let ctx = ActorContext::new(
            Uuid::new_v4(),
            company,
            Arc::new(StaticCapabilities::new(["stock.view"])),
        );
        assert!(ctx.require(Capability::StockView).is_ok());
        assert!(matches!(
            ctx.require(Capability::MovementValidate),
            Err(ServiceError::Forbidden(_))
        ));

        let system = ActorContext::system(company);
        assert!(system.require(Capability::MovementValidate).is_ok());
    }
}
