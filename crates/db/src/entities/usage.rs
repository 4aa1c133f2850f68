//! `SeaORM` Entity for usage table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "usage")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub subscription_id: Uuid,
    pub date: Date,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub amortised_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub total_cost: Decimal,
    pub invoice_section: String,
    pub monthly_upload: Option<Date>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::subscription::Entity",
        from = "Column::SubscriptionId",
        to = "super::subscription::Column::SubscriptionId"
    )]
    Subscription,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
