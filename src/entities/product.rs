use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// ABC tiering by cumulative stock-value contribution. Drives count
/// frequency and replenishment priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbcClass {
    A,
    B,
    C,
}

impl AbcClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbcClass::A => "A",
            AbcClass::B => "B",
            AbcClass::C => "C",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "A" => Some(AbcClass::A),
            "B" => Some(AbcClass::B),
            "C" => Some(AbcClass::C),
            _ => None,
        }
    }
}

pub const PRODUCT_TYPE_STOCKABLE: &str = "stockable";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub product_type: String,
    pub unit_of_measure: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub sale_price: Decimal,
    /// Current weighted-average cost (CUMP). Written only by the valuation
    /// engine, company-wide while quantity stays location-partitioned.
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub cost_price: Decimal,
    pub tracking_type: String,
    #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
    pub min_stock_level: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
    pub max_stock_level: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
    pub reorder_point: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
    pub reorder_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
    pub optimal_order_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
    pub average_daily_consumption: Decimal,
    pub abc_classification: Option<String>,
    pub lead_time_days: i32,
    pub is_active: bool,
    pub company_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn is_stockable(&self) -> bool {
        self.product_type == PRODUCT_TYPE_STOCKABLE
    }

    pub fn abc_class(&self) -> Option<AbcClass> {
        self.abc_classification.as_deref().and_then(AbcClass::from_str)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product_category::Entity",
        from = "Column::CategoryId",
        to = "super::product_category::Column::Id"
    )]
    Category,
}

impl Related<super::product_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
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
