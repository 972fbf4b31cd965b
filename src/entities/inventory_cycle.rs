use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Count cadence for a recurring cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleFrequency {
    Monthly,
    Quarterly,
    Yearly,
}

impl CycleFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleFrequency::Monthly => "monthly",
            CycleFrequency::Quarterly => "quarterly",
            CycleFrequency::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(CycleFrequency::Monthly),
            "quarterly" => Some(CycleFrequency::Quarterly),
            "yearly" => Some(CycleFrequency::Yearly),
            _ => None,
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            CycleFrequency::Monthly => 1,
            CycleFrequency::Quarterly => 3,
            CycleFrequency::Yearly => 12,
        }
    }
}

/// Lifecycle of a planned recurring count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleStatus {
    Planned,
    InProgress,
    Completed,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Planned => "planned",
            CycleStatus::InProgress => "in_progress",
            CycleStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(CycleStatus::Planned),
            "in_progress" => Some(CycleStatus::InProgress),
            "completed" => Some(CycleStatus::Completed),
            _ => None,
        }
    }

    pub(crate) fn parse(s: &str) -> Result<Self, ServiceError> {
        Self::from_str(s)
            .ok_or_else(|| ServiceError::InternalError(format!("unknown cycle status '{}'", s)))
    }

    pub fn into_in_progress(self) -> Result<Self, ServiceError> {
        match self {
            CycleStatus::Planned => Ok(CycleStatus::InProgress),
            other => Err(ServiceError::InvalidState(format!(
                "can only start a planned cycle, not '{}'",
                other.as_str()
            ))),
        }
    }

    pub fn into_completed(self) -> Result<Self, ServiceError> {
        match self {
            CycleStatus::InProgress => Ok(CycleStatus::Completed),
            other => Err(ServiceError::InvalidState(format!(
                "can only complete an in-progress cycle, not '{}'",
                other.as_str()
            ))),
        }
    }
}

/// A recurring-count schedule, optionally filtered by ABC class and
/// category, linked to the count session it spawns when started.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_cycles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub frequency: String,
    pub classification: Option<String>,
    pub category_id: Option<Uuid>,
    pub warehouse_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub assigned_to: Option<Uuid>,
    pub inventory_id: Option<Uuid>,
    pub status: String,
    pub company_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn status(&self) -> Result<CycleStatus, ServiceError> {
        CycleStatus::parse(&self.status)
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

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn frequency_month_spans() {
        assert_eq!(CycleFrequency::Monthly.months(), 1);
        assert_eq!(CycleFrequency::Quarterly.months(), 3);
        assert_eq!(CycleFrequency::Yearly.months(), 12);
    }

    #[test]
    fn status_transitions() {
        assert_eq!(
            CycleStatus::Planned.into_in_progress().unwrap(),
            CycleStatus::InProgress
        );
        assert_matches!(
            CycleStatus::Completed.into_in_progress(),
            Err(ServiceError::InvalidState(_))
        );
        assert_matches!(
            CycleStatus::Planned.into_completed(),
            Err(ServiceError::InvalidState(_))
        );
    }
}
