//! `SeaORM` Entity for cost_recovery table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "cost_recovery")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub finance_id: i64,
    pub subscription_id: Uuid,
    pub month: Date,
    pub finance_code: String,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub amount: Decimal,
    pub date_recovered: Option<DateTimeWithTimeZone>,
    pub admin: Uuid,
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
    #[sea_orm(
        belongs_to = "super::finance::Entity",
        from = "Column::FinanceId",
        to = "super::finance::Column::Id"
    )]
    Finance,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl Related<super::finance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Finance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
