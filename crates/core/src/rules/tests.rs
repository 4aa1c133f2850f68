//! Tests for ledger write rules.

use chrono::{Duration, NaiveDate};
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use super::*;
use crate::summary::SubscriptionSummary;
use budgetguard_shared::AppError;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn approved_summary() -> SubscriptionSummary {
    let mut s = SubscriptionSummary::empty(Uuid::new_v4());
    s.approved_from = Some(date(2024, 6, 1));
    s.approved_to = Some(date(2024, 12, 31));
    s.approved = dec!(1000);
    s.allocated = dec!(600);
    s.total_cost = dec!(200);
    s
}

fn approval(summary: &SubscriptionSummary, amount: Decimal) -> NewApproval {
    NewApproval {
        subscription_id: summary.subscription_id,
        ticket: "T-1".to_string(),
        amount,
        currency: "GBP".to_string(),
        date_from: date(2024, 6, 1),
        date_to: date(2024, 12, 31),
        allocate: false,
        force: false,
    }
}

fn allocation(summary: &SubscriptionSummary, amount: Decimal) -> NewAllocation {
    NewAllocation {
        subscription_id: summary.subscription_id,
        ticket: "T-2".to_string(),
        amount,
        currency: "GBP".to_string(),
    }
}

fn finance(from: NaiveDate, to: NaiveDate) -> NewFinance {
    NewFinance {
        subscription_id: Uuid::nil(),
        ticket: "F-1".to_string(),
        amount: dec!(100),
        priority: 1,
        finance_code: "FC".to_string(),
        date_from: from,
        date_to: to,
    }
}

// ============================================================================
// Approvals
// ============================================================================

#[test]
fn test_positive_approval_extending_range() {
    let summary = approved_summary();
    let mut new = approval(&summary, dec!(500));
    new.date_to = date(2025, 6, 30);
    assert!(check_approval(&new, &summary, today()).is_ok());
}

#[test]
fn test_first_approval_needs_no_history() {
    let summary = SubscriptionSummary::empty(Uuid::new_v4());
    let new = approval(&summary, dec!(10));
    assert!(check_approval(&new, &summary, today()).is_ok());
}

#[test]
fn test_approval_date_to_in_past() {
    let summary = approved_summary();
    let mut new = approval(&summary, dec!(1));
    new.date_to = date(2024, 6, 14);
    new.date_from = date(2024, 6, 1);
    let err = check_approval(&new, &summary, today()).unwrap_err();
    assert_eq!(err.to_string(), "Date to (2024-06-14) cannot be in the past");
}

#[rstest]
#[case("USD")]
#[case("gbp")]
fn test_approval_rejects_other_currency(#[case] currency: &str) {
    let summary = approved_summary();
    let mut new = approval(&summary, dec!(1));
    new.currency = currency.to_string();
    assert_eq!(
        check_approval(&new, &summary, today()),
        Err(LedgerError::UnsupportedCurrency(currency.to_string()))
    );
}

#[test]
fn test_allocation_rejects_lowercase_currency() {
    let summary = approved_summary();
    let mut new = allocation(&summary, dec!(1));
    new.currency = "gbp".to_string();
    assert_eq!(
        check_allocation(&new, &summary),
        Err(LedgerError::UnsupportedCurrency("gbp".to_string()))
    );
}

#[test]
fn test_unforced_approval_window() {
    let summary = SubscriptionSummary::empty(Uuid::new_v4());
    let mut new = approval(&summary, dec!(1));
    new.date_from = today() - Duration::days(31);
    assert_eq!(
        check_approval(&new, &summary, today()),
        Err(LedgerError::DateFromTooOld(new.date_from))
    );

    new.force = true;
    assert!(check_approval(&new, &summary, today()).is_ok());
    assert_eq!(new.recorded_ticket(), "T-1 (forced)");
}

#[test]
fn test_positive_approval_cannot_shorten() {
    let summary = approved_summary();
    let mut new = approval(&summary, dec!(1));
    new.date_to = date(2024, 11, 30);
    assert!(matches!(
        check_approval(&new, &summary, today()),
        Err(LedgerError::EndsBeforeApproved { .. })
    ));
}

#[test]
fn test_negative_approval_requires_budget() {
    let summary = SubscriptionSummary::empty(Uuid::new_v4());
    let new = approval(&summary, dec!(-1));
    assert_eq!(
        check_approval(&new, &summary, today()),
        Err(LedgerError::NoApprovals)
    );
}

#[test]
fn test_negative_approval_must_match_range() {
    let summary = approved_summary();
    let mut new = approval(&summary, dec!(-1));
    new.date_to = date(2025, 1, 31);
    assert!(matches!(
        check_approval(&new, &summary, today()),
        Err(LedgerError::RangeMismatch { .. })
    ));
}

#[rstest]
#[case(dec!(-400), false, true)]
#[case(dec!(-401), false, false)]
#[case(dec!(-700), true, true)]
#[case(dec!(-801), true, false)]
fn test_negative_approval_limits(
    #[case] amount: Decimal,
    #[case] allocate: bool,
    #[case] ok: bool,
) {
    // unused = 1000 - 200 = 800, unallocated = 1000 - 600 = 400
    let summary = approved_summary();
    let mut new = approval(&summary, amount);
    new.allocate = allocate;
    assert_eq!(check_approval(&new, &summary, today()).is_ok(), ok);
}

// ============================================================================
// Allocations
// ============================================================================

#[rstest]
#[case(dec!(400), true)]
#[case(dec!(400.01), false)]
#[case(dec!(-400), true)]
#[case(dec!(-400.01), false)]
fn test_allocation_limits(#[case] amount: Decimal, #[case] ok: bool) {
    // unallocated = 400, unused = 600 - 200 = 400
    let summary = approved_summary();
    assert_eq!(check_allocation(&allocation(&summary, amount), &summary).is_ok(), ok);
}

#[test]
fn test_allocation_requires_approval() {
    let summary = SubscriptionSummary::empty(Uuid::new_v4());
    assert_eq!(
        check_allocation(&allocation(&summary, dec!(1)), &summary),
        Err(LedgerError::NoApprovals)
    );
}

#[test]
fn test_zero_allocation_rejected() {
    let summary = approved_summary();
    let err = check_allocation(&allocation(&summary, Decimal::ZERO), &summary).unwrap_err();
    let app: AppError = err.into();
    assert_eq!(app.error_code(), "VALIDATION_ERROR");
    assert_eq!(app.detail(), "Allocation cannot be equal to zero");
}

// ============================================================================
// Finance
// ============================================================================

#[test]
fn test_finance_widened_to_whole_months() {
    let widened = finance(date(2024, 2, 10), date(2024, 2, 11)).with_whole_months();
    assert_eq!(widened.date_from, date(2024, 2, 1));
    assert_eq!(widened.date_to, date(2024, 2, 29));
}

#[test]
fn test_new_finance_after_recovered_month() {
    let new = finance(date(2024, 3, 1), date(2024, 5, 31));
    assert!(check_new_finance(&new, Some(date(2024, 2, 1))).is_ok());

    let err = check_new_finance(&new, Some(date(2024, 3, 1))).unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyRecovered { .. }));
}

#[test]
fn test_new_finance_negative_amount() {
    let mut new = finance(date(2024, 3, 1), date(2024, 5, 31));
    new.amount = dec!(-1);
    assert_eq!(
        check_new_finance(&new, None),
        Err(LedgerError::NegativeAmount(dec!(-1)))
    );
}

#[test]
fn test_finance_update_may_extend_end_past_recovered_month() {
    let old = finance(date(2024, 1, 1), date(2024, 6, 30));
    let mut new = old.clone();
    new.date_to = date(2024, 7, 31);
    assert!(check_finance_update(&old, &new, Some(date(2024, 6, 1))).is_ok());
}

#[rstest]
#[case(date(2024, 2, 1), date(2024, 6, 30), "old date_from")]
#[case(date(2024, 1, 1), date(2024, 4, 30), "new date_to")]
fn test_finance_update_guards_recovered_months(
    #[case] from: NaiveDate,
    #[case] to: NaiveDate,
    #[case] boundary: &str,
) {
    let old = finance(date(2024, 1, 1), date(2024, 6, 30));
    let mut new = old.clone();
    new.date_from = from;
    new.date_to = to;
    let err = check_finance_update(&old, &new, Some(date(2024, 5, 1))).unwrap_err();
    assert_eq!(err.to_string(), format!("{boundary} has been recovered"));
}

#[test]
fn test_finance_update_keeps_subscription() {
    let old = finance(date(2024, 1, 1), date(2024, 6, 30));
    let mut new = old.clone();
    new.subscription_id = Uuid::new_v4();
    assert_eq!(
        check_finance_update(&old, &new, None),
        Err(LedgerError::SubscriptionMismatch)
    );
}
