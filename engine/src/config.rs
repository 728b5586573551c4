//! Configuration management for the brokerage engine.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Durations are plain integers here; services turn them into `chrono`
//! durations at the point of use.

use brokerage_core::error::DomainError;
use brokerage_core::types::{Money, Percentage};
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_RESPONSE_WINDOW_HOURS: i64 = 48;
const DEFAULT_VAT_RATE_PERCENT: u32 = 0;
const DEFAULT_MINIMUM_NET: u64 = 100;
const DEFAULT_ENTRY_LIFETIME_DAYS: i64 = 30;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Negotiation approval workflow configuration
    pub negotiation: NegotiationConfig,
    /// Commission computation configuration
    pub commission: CommissionConfig,
    /// Waiting list configuration
    pub waiting_list: WaitingListConfig,
}

/// Negotiation approval workflow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// Manager response window in hours (default: 48)
    pub response_window_hours: i64,
}

impl NegotiationConfig {
    /// The response window as a duration
    #[must_use]
    pub fn response_window(&self) -> Duration {
        Duration::hours(self.response_window_hours)
    }
}

/// Commission computation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionConfig {
    /// VAT rate applied on top of the gross commission, in percent
    /// (default: 0)
    pub vat_rate_percent: Decimal,
    /// Floor for the computed net amount; creation rejects anything below
    /// (default: 100)
    pub minimum_net: Decimal,
}

impl CommissionConfig {
    /// The VAT rate as a validated percentage.
    ///
    /// `from_env` filters the range, but the fields are public, so a
    /// hand-built config is validated here rather than trusted.
    ///
    /// # Errors
    ///
    /// [`DomainError::PercentageOutOfRange`] when the configured rate
    /// falls outside `[0, 100]`.
    pub fn vat_rate(&self) -> Result<Percentage, DomainError> {
        Percentage::new(self.vat_rate_percent)
    }

    /// The minimum net amount as money
    #[must_use]
    pub fn minimum_net(&self) -> Money {
        Money::new(self.minimum_net)
    }
}

/// Waiting list configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingListConfig {
    /// How long a new entry stays serviceable, in days (default: 30)
    pub entry_lifetime_days: i64,
}

impl WaitingListConfig {
    /// The entry lifetime as a duration
    #[must_use]
    pub fn entry_lifetime(&self) -> Duration {
        Duration::days(self.entry_lifetime_days)
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to the
    /// documented defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            negotiation: NegotiationConfig {
                response_window_hours: env::var("NEGOTIATION_RESPONSE_WINDOW_HOURS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|hours| *hours > 0)
                    .unwrap_or(DEFAULT_RESPONSE_WINDOW_HOURS),
            },
            commission: CommissionConfig {
                vat_rate_percent: env::var("COMMISSION_VAT_RATE_PERCENT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|rate| *rate >= Decimal::ZERO && *rate <= Decimal::ONE_HUNDRED)
                    .unwrap_or_else(|| Decimal::from(DEFAULT_VAT_RATE_PERCENT)),
                minimum_net: env::var("COMMISSION_MINIMUM_NET")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|minimum| *minimum >= Decimal::ZERO)
                    .unwrap_or_else(|| Decimal::from(DEFAULT_MINIMUM_NET)),
            },
            waiting_list: WaitingListConfig {
                entry_lifetime_days: env::var("WAITING_LIST_ENTRY_LIFETIME_DAYS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|days| *days > 0)
                    .unwrap_or(DEFAULT_ENTRY_LIFETIME_DAYS),
            },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            negotiation: NegotiationConfig {
                response_window_hours: DEFAULT_RESPONSE_WINDOW_HOURS,
            },
            commission: CommissionConfig {
                vat_rate_percent: Decimal::from(DEFAULT_VAT_RATE_PERCENT),
                minimum_net: Decimal::from(DEFAULT_MINIMUM_NET),
            },
            waiting_list: WaitingListConfig {
                entry_lifetime_days: DEFAULT_ENTRY_LIFETIME_DAYS,
            },
        }
    }
}
