//! Tests for cost-recovery rules.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use super::*;
use budgetguard_shared::AppError;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn month(y: i32, m: u32) -> RecoveryMonth {
    RecoveryMonth::from_ym(y, m).unwrap()
}

fn finance(id: i64, priority: i32, amount: Decimal) -> FinanceSlice {
    FinanceSlice {
        finance_id: id,
        subscription_id: Uuid::nil(),
        finance_code: format!("FC-{id}"),
        priority,
        amount,
        already_recovered: Decimal::ZERO,
    }
}

// ============================================================================
// Months
// ============================================================================

#[test]
fn test_month_requires_first_day() {
    assert!(RecoveryMonth::new(date(2024, 5, 1)).is_ok());
    let err = RecoveryMonth::new(date(2024, 5, 3)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Month must be the first day of a month, got 2024-05-03"
    );
}

#[test]
fn test_month_arithmetic() {
    assert_eq!(month(2023, 12).next(), month(2024, 1));
    assert_eq!(month(2024, 1).previous(), month(2023, 12));
    assert_eq!(month(2024, 2).last_day(), date(2024, 2, 29));
    assert_eq!(RecoveryMonth::last_complete(date(2024, 3, 31)), month(2024, 2));
    assert_eq!(month(2001, 2).to_string(), "2001-02");
}

#[test]
fn test_commit_must_follow_watermark() {
    let err = validate_month(month(2001, 3), Some(month(2001, 1)), date(2024, 1, 1), true)
        .unwrap_err();
    assert_eq!(err.to_string(), "Expected 2001-02");

    let app: AppError = err.into();
    assert_eq!(app.status_code(), 400);
}

#[test]
fn test_dry_run_ignores_watermark() {
    assert!(validate_month(month(2001, 3), Some(month(2001, 1)), date(2024, 1, 1), false).is_ok());
}

#[test]
fn test_first_commit_accepts_any_month() {
    assert!(validate_month(month(2019, 7), None, date(2024, 1, 1), true).is_ok());
}

#[test]
fn test_current_month_is_too_late() {
    let today = date(2024, 6, 15);
    assert!(validate_month(month(2024, 5), None, today, false).is_ok());
    let err = validate_month(month(2024, 6), None, today, false).unwrap_err();
    assert_eq!(err.to_string(), "Cannot recover later than 2024-05");
}

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn test_priority_tie_break() {
    let recoveries = allocate(dec!(3), &[finance(2, 100, dec!(2)), finance(1, 99, dec!(2))]);

    assert_eq!(recoveries.len(), 2);
    assert_eq!(recoveries[0].finance_id, 1);
    assert_eq!(recoveries[0].amount, dec!(2));
    assert_eq!(recoveries[1].finance_id, 2);
    assert_eq!(recoveries[1].amount, dec!(1));
}

#[test]
fn test_equal_priority_ordered_by_id() {
    let recoveries = allocate(dec!(1), &[finance(7, 1, dec!(5)), finance(3, 1, dec!(5))]);
    assert_eq!(recoveries[0].finance_id, 3);
    assert_eq!(recoveries[0].amount, dec!(1));
    assert_eq!(recoveries[1].amount, Decimal::ZERO);
}

#[test]
fn test_zero_rows_kept_when_usage_exhausted() {
    let recoveries = allocate(Decimal::ZERO, &[finance(1, 1, dec!(10))]);
    assert_eq!(recoveries.len(), 1);
    assert_eq!(recoveries[0].amount, Decimal::ZERO);
}

#[test]
fn test_previous_recoveries_reduce_availability() {
    let mut first = finance(1, 1, dec!(10));
    first.already_recovered = dec!(9);
    let recoveries = allocate(dec!(5), &[first, finance(2, 2, dec!(10))]);
    assert_eq!(recoveries[0].amount, dec!(1));
    assert_eq!(recoveries[1].amount, dec!(4));
}

#[test]
fn test_unrecovered_usage_is_left_over() {
    let recoveries = allocate(dec!(50), &[finance(1, 1, dec!(10))]);
    assert_eq!(recoveries[0].amount, dec!(10));
}

fn money() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Recovered totals never exceed usage or any finance row.
    #[test]
    fn prop_conservation(
        usage in money(),
        rows in prop::collection::vec((0i32..5, money(), money()), 0..8),
    ) {
        let finances: Vec<FinanceSlice> = rows
            .into_iter()
            .enumerate()
            .map(|(i, (priority, amount, spent))| FinanceSlice {
                already_recovered: spent.min(amount),
                ..finance(i64::try_from(i).unwrap(), priority, amount)
            })
            .collect();

        let recoveries = allocate(usage, &finances);
        prop_assert_eq!(recoveries.len(), finances.len());

        let total: Decimal = recoveries.iter().map(|r| r.amount).sum();
        prop_assert!(total <= usage);

        for recovery in &recoveries {
            let row = finances.iter().find(|f| f.finance_id == recovery.finance_id).unwrap();
            prop_assert!(recovery.amount >= Decimal::ZERO);
            prop_assert!(row.already_recovered + recovery.amount <= row.amount);
        }
    }

    /// The watermark only ever admits its successor.
    #[test]
    fn prop_watermark_admits_only_next(y in 2000i32..2020, m in 1u32..=12, skip in 2u32..24) {
        let last = month(y, m);
        let today = date(2030, 1, 1);
        prop_assert!(validate_month(last.next(), Some(last), today, true).is_ok());

        let mut later = last;
        for _ in 0..skip {
            later = later.next();
        }
        prop_assert!(validate_month(later, Some(last), today, true).is_err());
        prop_assert!(validate_month(last, Some(last), today, true).is_err());
    }
}
