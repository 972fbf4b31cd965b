use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a physical count session. `validated` is terminal and never
/// cancellable; only `validate` touches stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryStatus {
    Draft,
    InProgress,
    Validated,
    Cancelled,
}

impl InventoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::Draft => "draft",
            InventoryStatus::InProgress => "in_progress",
            InventoryStatus::Validated => "validated",
            InventoryStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InventoryStatus::Draft),
            "in_progress" => Some(InventoryStatus::InProgress),
            "validated" => Some(InventoryStatus::Validated),
            "cancelled" => Some(InventoryStatus::Cancelled),
            _ => None,
        }
    }

    pub(crate) fn parse(s: &str) -> Result<Self, ServiceError> {
        Self::from_str(s).ok_or_else(|| {
            ServiceError::InternalError(format!("unknown inventory status '{}'", s))
        })
    }

    pub fn into_in_progress(self) -> Result<Self, ServiceError> {
        match self {
            InventoryStatus::Draft => Ok(InventoryStatus::InProgress),
            other => Err(ServiceError::InvalidState(format!(
                "can only start a draft inventory, not '{}'",
                other.as_str()
            ))),
        }
    }

    pub fn into_validated(self) -> Result<Self, ServiceError> {
        match self {
            InventoryStatus::InProgress => Ok(InventoryStatus::Validated),
            other => Err(ServiceError::InvalidState(format!(
                "can only validate an in-progress inventory, not '{}'",
                other.as_str()
            ))),
        }
    }

    pub fn into_cancelled(self) -> Result<Self, ServiceError> {
        match self {
            InventoryStatus::Draft | InventoryStatus::InProgress => {
                Ok(InventoryStatus::Cancelled)
            }
            InventoryStatus::Validated => Err(ServiceError::InvalidState(
                "cannot cancel a validated inventory".to_string(),
            )),
            InventoryStatus::Cancelled => Err(ServiceError::InvalidState(
                "inventory is already cancelled".to_string(),
            )),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, InventoryStatus::InProgress)
    }
}

/// A physical count session over one warehouse.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub reference: String,
    pub name: String,
    pub warehouse_id: Uuid,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub company_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn status(&self) -> Result<InventoryStatus, ServiceError> {
        InventoryStatus::parse(&self.status)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory_line::Entity")]
    Lines,
}

impl Related<super::inventory_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(Some(now));
        Ok(active_model)
    }
}
