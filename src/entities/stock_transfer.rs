use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a cross-warehouse transfer. Source stock is deducted at
/// `validate`; shipping is a paperwork step; `receive` credits the
/// destination. Cancellation from `validated`/`in_transit` must restock the
/// source before flipping state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Draft,
    Validated,
    InTransit,
    Received,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Draft => "draft",
            TransferStatus::Validated => "validated",
            TransferStatus::InTransit => "in_transit",
            TransferStatus::Received => "received",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(TransferStatus::Draft),
            "validated" => Some(TransferStatus::Validated),
            "in_transit" => Some(TransferStatus::InTransit),
            "received" => Some(TransferStatus::Received),
            "cancelled" => Some(TransferStatus::Cancelled),
            _ => None,
        }
    }

    pub(crate) fn parse(s: &str) -> Result<Self, ServiceError> {
        Self::from_str(s).ok_or_else(|| {
            ServiceError::InternalError(format!("unknown transfer status '{}'", s))
        })
    }

    pub fn into_validated(self) -> Result<Self, ServiceError> {
        match self {
            TransferStatus::Draft => Ok(TransferStatus::Validated),
            other => Err(ServiceError::InvalidState(format!(
                "can only validate a draft transfer, not '{}'",
                other.as_str()
            ))),
        }
    }

    pub fn into_in_transit(self) -> Result<Self, ServiceError> {
        match self {
            TransferStatus::Validated => Ok(TransferStatus::InTransit),
            other => Err(ServiceError::InvalidState(format!(
                "can only ship a validated transfer, not '{}'",
                other.as_str()
            ))),
        }
    }

    pub fn into_received(self) -> Result<Self, ServiceError> {
        match self {
            TransferStatus::InTransit => Ok(TransferStatus::Received),
            other => Err(ServiceError::InvalidState(format!(
                "can only receive an in-transit transfer, not '{}'",
                other.as_str()
            ))),
        }
    }

    pub fn into_cancelled(self) -> Result<Self, ServiceError> {
        match self {
            TransferStatus::Draft | TransferStatus::Validated | TransferStatus::InTransit => {
                Ok(TransferStatus::Cancelled)
            }
            other => Err(ServiceError::InvalidState(format!(
                "cannot cancel a transfer with status '{}'",
                other.as_str()
            ))),
        }
    }

    /// True when the source-side decrement has already been applied, so a
    /// cancellation must put the quantities back.
    pub fn source_stock_deducted(&self) -> bool {
        matches!(self, TransferStatus::Validated | TransferStatus::InTransit)
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, TransferStatus::Draft)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub reference: String,
    pub source_warehouse_id: Uuid,
    pub destination_warehouse_id: Uuid,
    pub status: String,
    pub transfer_date: NaiveDate,
    pub expected_arrival_date: Option<NaiveDate>,
    pub actual_arrival_date: Option<NaiveDate>,
    pub transporter: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub company_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn status(&self) -> Result<TransferStatus, ServiceError> {
        TransferStatus::parse(&self.status)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_transfer_line::Entity")]
    Lines,
}

impl Related<super::stock_transfer_line::Entity> for Entity {
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
