//! `SeaORM` active enums.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use budgetguard_core::reconcile::BillingStatus as CoreBillingStatus;

/// Reason stored on a disabling status row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "billing_status")]
pub enum BillingStatus {
    /// Approval window ended.
    #[sea_orm(string_value = "EXPIRED")]
    Expired,
    /// Usage exceeds allocation.
    #[sea_orm(string_value = "OVER_BUDGET")]
    OverBudget,
    /// Both.
    #[sea_orm(string_value = "OVER_BUDGET_AND_EXPIRED")]
    OverBudgetAndExpired,
}

impl From<CoreBillingStatus> for BillingStatus {
    fn from(value: CoreBillingStatus) -> Self {
        match value {
            CoreBillingStatus::Expired => Self::Expired,
            CoreBillingStatus::OverBudget => Self::OverBudget,
            CoreBillingStatus::OverBudgetAndExpired => Self::OverBudgetAndExpired,
        }
    }
}

impl From<BillingStatus> for CoreBillingStatus {
    fn from(value: BillingStatus) -> Self {
        match value {
            BillingStatus::Expired => Self::Expired,
            BillingStatus::OverBudget => Self::OverBudget,
            BillingStatus::OverBudgetAndExpired => Self::OverBudgetAndExpired,
        }
    }
}
