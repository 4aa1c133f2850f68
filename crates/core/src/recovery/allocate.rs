//! Priority-ordered water filling.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// A finance record covering the month being recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinanceSlice {
    /// Finance row id.
    pub finance_id: i64,
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Cost centre.
    pub finance_code: String,
    /// Lower values are recovered first.
    pub priority: i32,
    /// Total fundable amount.
    pub amount: Decimal,
    /// Sum of earlier recoveries against this row.
    pub already_recovered: Decimal,
}

impl FinanceSlice {
    /// Amount still available.
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.amount - self.already_recovered
    }
}

/// Amount attributed to one finance row for the month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recovery {
    /// Finance row id.
    pub finance_id: i64,
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Cost centre.
    pub finance_code: String,
    /// Recovered amount, possibly zero.
    pub amount: Decimal,
}

/// Splits `total_usage` across `finances` in ascending priority, ties broken
/// by finance id.
///
/// Each row recovers `min(available, usage left)`. Every row yields a
/// recovery, including zero amounts. Usage left once all rows are exhausted
/// stays unrecovered.
#[must_use]
pub fn allocate(total_usage: Decimal, finances: &[FinanceSlice]) -> Vec<Recovery> {
    let mut ordered: Vec<&FinanceSlice> = finances.iter().collect();
    ordered.sort_by_key(|f| (f.priority, f.finance_id));

    let mut recharged = Decimal::ZERO;
    ordered
        .into_iter()
        .map(|finance| {
            let recoverable = finance.available().min(total_usage - recharged);
            recharged += recoverable;
            Recovery {
                finance_id: finance.finance_id,
                subscription_id: finance.subscription_id,
                finance_code: finance.finance_code.clone(),
                amount: recoverable,
            }
        })
        .collect()
}
