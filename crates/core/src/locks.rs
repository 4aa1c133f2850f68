//! Named advisory lock keys.
//!
//! PostgreSQL advisory locks are keyed by a signed 64-bit integer. Names are
//! turned into keys by taking the first 8 bytes of their SHA-256 digest,
//! read big-endian.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::recovery::RecoveryMonth;

/// Derives the advisory lock key for a name.
#[must_use]
pub fn lock_key(name: &str) -> i64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

/// Operations serialized through advisory locks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockName {
    /// Usage upload for an exact date range.
    UsageUpload {
        /// First day covered.
        start: NaiveDate,
        /// Last day covered.
        end: NaiveDate,
    },
    /// Cost recovery for one month.
    CostRecovery(RecoveryMonth),
    /// The cost recovery watermark, across all months.
    CostRecoveryLog,
    /// Refresh of a materialized view.
    MaterializedViewRefresh(String),
    /// Creation of subscription rows.
    SubscriptionCreation,
}

impl LockName {
    /// Lock for refreshing `view`.
    #[must_use]
    pub fn view_refresh(view: &str) -> Self {
        Self::MaterializedViewRefresh(view.to_string())
    }

    /// The advisory lock key.
    #[must_use]
    pub fn key(&self) -> i64 {
        lock_key(&self.to_string())
    }
}

impl std::fmt::Display for LockName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UsageUpload { start, end } => write!(f, "usage_upload_{start}_{end}"),
            Self::CostRecovery(month) => {
                write!(f, "cost_recovery_{}_{:02}", month.year(), month.month())
            }
            Self::CostRecoveryLog => f.write_str("cost_recovery_log"),
            Self::MaterializedViewRefresh(view) => write!(f, "materialized_view_refresh_{view}"),
            Self::SubscriptionCreation => f.write_str("subscription_creation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lock_names() {
        let month = RecoveryMonth::from_ym(2021, 3).unwrap();
        assert_eq!(LockName::CostRecovery(month).to_string(), "cost_recovery_2021_03");

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            LockName::UsageUpload { start, end }.to_string(),
            "usage_upload_2024-01-01_2024-01-31"
        );
        assert_eq!(
            LockName::view_refresh("usage_view").to_string(),
            "materialized_view_refresh_usage_view"
        );
        assert_eq!(LockName::SubscriptionCreation.to_string(), "subscription_creation");
        assert_eq!(LockName::CostRecoveryLog.to_string(), "cost_recovery_log");
    }

    #[test]
    fn test_lock_key_known_value() {
        // sha256("") = e3b0c44298fc1c14...
        assert_eq!(lock_key(""), i64::from_be_bytes([0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14]));
    }

    #[test]
    fn test_neighbouring_months_differ() {
        let march = LockName::CostRecovery(RecoveryMonth::from_ym(2021, 3).unwrap());
        let april = LockName::CostRecovery(RecoveryMonth::from_ym(2021, 4).unwrap());
        assert_ne!(march.key(), april.key());
        assert_ne!(march.key(), LockName::CostRecoveryLog.key());
    }

    proptest! {
        #[test]
        fn prop_lock_key_is_deterministic(name in ".{0,64}") {
            prop_assert_eq!(lock_key(&name), lock_key(&name.clone()));
        }
    }
}
