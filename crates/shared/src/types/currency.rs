//! The single currency budgets are kept in.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are `rust_decimal::Decimal` everywhere; this module only names
//! the currency they are denominated in.

use serde::{Deserialize, Serialize};

/// Currency every approval and allocation must be recorded in.
pub const DEFAULT_CURRENCY: Currency = Currency::Gbp;

/// ISO 4217 currency codes accepted by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Pound sterling
    Gbp,
}

impl Currency {
    /// ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Gbp => "GBP",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GBP" => Ok(Self::Gbp),
            _ => Err(format!("Only GBP is supported, got {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_currency_from_str() {
        assert_eq!(Currency::from_str("GBP").unwrap(), Currency::Gbp);
    }

    #[test]
    fn test_currency_code_is_case_sensitive() {
        assert!(Currency::from_str("gbp").is_err());
        assert!(Currency::from_str("Gbp").is_err());
    }

    #[test]
    fn test_currency_rejects_others() {
        let err = Currency::from_str("USD").unwrap_err();
        assert_eq!(err, "Only GBP is supported, got USD");
    }

    #[test]
    fn test_currency_display() {
        assert_eq!(DEFAULT_CURRENCY.to_string(), "GBP");
        assert_eq!(serde_json::to_string(&Currency::Gbp).unwrap(), "\"GBP\"");
    }
}
