use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a soft hold. `released` and `expired` are distinct terminal
/// states so the audit trail shows whether a hold was freed deliberately or
/// by the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Active,
    Released,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Released => "released",
            ReservationStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ReservationStatus::Active),
            "released" => Some(ReservationStatus::Released),
            "expired" => Some(ReservationStatus::Expired),
            _ => None,
        }
    }

    pub(crate) fn parse(s: &str) -> Result<Self, ServiceError> {
        Self::from_str(s).ok_or_else(|| {
            ServiceError::InternalError(format!("unknown reservation status '{}'", s))
        })
    }

    pub fn into_released(self) -> Result<Self, ServiceError> {
        match self {
            ReservationStatus::Active => Ok(ReservationStatus::Released),
            other => Err(ServiceError::InvalidState(format!(
                "cannot release a reservation with status '{}'",
                other.as_str()
            ))),
        }
    }

    pub fn into_expired(self) -> Result<Self, ServiceError> {
        match self {
            ReservationStatus::Active => Ok(ReservationStatus::Expired),
            other => Err(ServiceError::InvalidState(format!(
                "cannot expire a reservation with status '{}'",
                other.as_str()
            ))),
        }
    }
}

/// A soft hold against available stock. Reservations never touch the
/// movement ledger; they only adjust `StockLevel.reserved_quantity`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub lot_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
    pub quantity: Decimal,
    pub reference_type: String,
    pub reference_id: Uuid,
    pub reference_label: Option<String>,
    pub status: String,
    pub expiry_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub reserved_by: Uuid,
    pub company_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn status(&self) -> Result<ReservationStatus, ServiceError> {
        ReservationStatus::parse(&self.status)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.map(|exp| exp <= now).unwrap_or(false)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

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
