//! `SeaORM` Entity for the usage_view materialized view.
//!
//! Read-only per-subscription rollup of the usage table, refreshed after
//! every upload.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_view")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub subscription_id: Uuid,
    pub first_usage: Option<Date>,
    pub latest_usage: Option<Date>,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub amortised_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub total_cost: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
