//! Recovery months and the watermark rules.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::error::RecoveryError;

/// A calendar month, held as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecoveryMonth(NaiveDate);

impl RecoveryMonth {
    /// Wraps a first-of-month date.
    ///
    /// # Errors
    ///
    /// Returns `NotFirstOfMonth` for any other day.
    pub fn new(date: NaiveDate) -> Result<Self, RecoveryError> {
        if date.day() == 1 {
            Ok(Self(date))
        } else {
            Err(RecoveryError::NotFirstOfMonth(date))
        }
    }

    /// The month containing `date`.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    /// Builds a month from its year and number, `None` when out of range.
    #[must_use]
    pub fn from_ym(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    /// First day of the month.
    #[must_use]
    pub const fn first_day(self) -> NaiveDate {
        self.0
    }

    /// Last day of the month.
    #[must_use]
    pub fn last_day(self) -> NaiveDate {
        self.next().0.pred_opt().unwrap_or(self.0)
    }

    /// The following month.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.checked_add_months(Months::new(1)).unwrap_or(self.0))
    }

    /// The preceding month.
    #[must_use]
    pub fn previous(self) -> Self {
        Self(self.0.checked_sub_months(Months::new(1)).unwrap_or(self.0))
    }

    /// Latest month whose usage is final on `today`: the one before the
    /// current month.
    #[must_use]
    pub fn last_complete(today: NaiveDate) -> Self {
        Self::containing(today).previous()
    }

    /// Calendar year.
    #[must_use]
    pub fn year(self) -> i32 {
        self.0.year()
    }

    /// Month number, 1-12.
    #[must_use]
    pub fn month(self) -> u32 {
        self.0.month()
    }
}

impl std::fmt::Display for RecoveryMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

/// Checks a requested month against the watermark and the clock.
///
/// Committed runs must target the month after `last_logged` (any month when
/// nothing has been committed). No run may target a month whose usage is
/// not final yet.
///
/// # Errors
///
/// Returns `UnexpectedMonth` or `TooLate`.
pub fn validate_month(
    month: RecoveryMonth,
    last_logged: Option<RecoveryMonth>,
    today: NaiveDate,
    commit: bool,
) -> Result<(), RecoveryError> {
    if commit && let Some(last) = last_logged {
        let expected = last.next();
        if month != expected {
            return Err(RecoveryError::UnexpectedMonth { expected });
        }
    }

    let latest = RecoveryMonth::last_complete(today);
    if month > latest {
        return Err(RecoveryError::TooLate { latest });
    }

    Ok(())
}
