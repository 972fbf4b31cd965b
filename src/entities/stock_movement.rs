use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of ledger transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementType {
    In,
    Out,
    Transfer,
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Transfer => "transfer",
            MovementType::Adjustment => "adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in" => Some(MovementType::In),
            "out" => Some(MovementType::Out),
            "transfer" => Some(MovementType::Transfer),
            "adjustment" => Some(MovementType::Adjustment),
            _ => None,
        }
    }

    pub(crate) fn parse(s: &str) -> Result<Self, ServiceError> {
        Self::from_str(s).ok_or_else(|| {
            ServiceError::InternalError(format!("unknown movement type '{}'", s))
        })
    }

    /// Location requirements per type: `in` and `adjustment` target a
    /// destination, `out` a source, `transfer` both. Adjustment sets an
    /// absolute quantity at its destination rather than adding a delta.
    pub fn requires_source(&self) -> bool {
        matches!(self, MovementType::Out | MovementType::Transfer)
    }

    pub fn requires_destination(&self) -> bool {
        matches!(
            self,
            MovementType::In | MovementType::Transfer | MovementType::Adjustment
        )
    }
}

/// Lifecycle of a movement. Transitions are the only way a status changes:
/// draft → validated (irreversible forward), draft → cancelled, and
/// validated → cancelled (which triggers a stock reversal in the engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementStatus {
    Draft,
    Validated,
    Cancelled,
}

impl MovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementStatus::Draft => "draft",
            MovementStatus::Validated => "validated",
            MovementStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(MovementStatus::Draft),
            "validated" => Some(MovementStatus::Validated),
            "cancelled" => Some(MovementStatus::Cancelled),
            _ => None,
        }
    }

    pub(crate) fn parse(s: &str) -> Result<Self, ServiceError> {
        Self::from_str(s).ok_or_else(|| {
            ServiceError::InternalError(format!("unknown movement status '{}'", s))
        })
    }

    pub fn into_validated(self) -> Result<Self, ServiceError> {
        match self {
            MovementStatus::Draft => Ok(MovementStatus::Validated),
            other => Err(ServiceError::InvalidState(format!(
                "cannot validate a movement with status '{}'",
                other.as_str()
            ))),
        }
    }

    pub fn into_cancelled(self) -> Result<Self, ServiceError> {
        match self {
            MovementStatus::Draft | MovementStatus::Validated => Ok(MovementStatus::Cancelled),
            MovementStatus::Cancelled => Err(ServiceError::InvalidState(
                "movement is already cancelled".to_string(),
            )),
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, MovementStatus::Draft)
    }
}

/// An immutable (once validated) stock ledger record.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub reference: String,
    pub movement_type: String,
    pub product_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub source_location_id: Option<Uuid>,
    pub destination_location_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub unit_cost: Option<Decimal>,
    pub status: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub validated_by: Option<Uuid>,
    pub validated_at: Option<DateTime<Utc>>,
    pub company_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn movement_type(&self) -> Result<MovementType, ServiceError> {
        MovementType::parse(&self.movement_type)
    }

    pub fn status(&self) -> Result<MovementStatus, ServiceError> {
        MovementStatus::parse(&self.status)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
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

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn type_string_round_trip() {
        for ty in [
            MovementType::In,
            MovementType::Out,
            MovementType::Transfer,
            MovementType::Adjustment,
        ] {
            assert_eq!(MovementType::from_str(ty.as_str()), Some(ty));
        }
        assert_eq!(MovementType::from_str("teleport"), None);
    }

    #[test]
    fn location_requirements_per_type() {
        assert!(!MovementType::In.requires_source());
        assert!(MovementType::In.requires_destination());
        assert!(MovementType::Out.requires_source());
        assert!(!MovementType::Out.requires_destination());
        assert!(MovementType::Transfer.requires_source());
        assert!(MovementType::Transfer.requires_destination());
        assert!(!MovementType::Adjustment.requires_source());
        assert!(MovementType::Adjustment.requires_destination());
    }

    #[test]
    fn status_transitions() {
        assert_eq!(
            MovementStatus::Draft.into_validated().unwrap(),
            MovementStatus::Validated
        );
        assert_matches!(
            MovementStatus::Validated.into_validated(),
            Err(ServiceError::InvalidState(_))
        );
        assert_matches!(
            MovementStatus::Cancelled.into_validated(),
            Err(ServiceError::InvalidState(_))
        );

        assert_eq!(
            MovementStatus::Draft.into_cancelled().unwrap(),
            MovementStatus::Cancelled
        );
        assert_eq!(
            MovementStatus::Validated.into_cancelled().unwrap(),
            MovementStatus::Cancelled
        );
        assert_matches!(
            MovementStatus::Cancelled.into_cancelled(),
            Err(ServiceError::InvalidState(_))
        );
    }
}
