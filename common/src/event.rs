//! Rate change events.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::monetary::Currency;
use crate::time::constants::RATE_SCALE;

/// A target whose rate moved since its previous observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateChange {
    /// Target currency.
    pub target: Currency,
    /// Rate from the most recent prior observation.
    pub previous: Decimal,
    /// Freshly fetched rate.
    pub current: Decimal,
}

impl RateChange {
    /// Create a new change record.
    pub fn new(target: Currency, previous: Decimal, current: Decimal) -> Self {
        Self {
            target,
            previous,
            current,
        }
    }

    /// Human readable description, e.g. `USD: 1.000000 → 1.200000`.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = RATE_SCALE as usize;
        write!(
            f,
            "{}: {:.*} → {:.*}",
            self.target,
            scale,
            self.previous.round_dp(RATE_SCALE),
            scale,
            self.current.round_dp(RATE_SCALE)
        )
    }
}

/// Emitted once per write cycle that detected at least one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Event ID.
    pub id: Uuid,
    /// Base currency of the cycle.
    pub base: Currency,
    /// Changes ordered by target currency code.
    pub changes: Vec<RateChange>,
    /// When the changes were detected.
    pub detected_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Build an event, or `None` when there is nothing to report.
    pub fn from_changes(base: Currency, changes: Vec<RateChange>) -> Option<Self> {
        if changes.is_empty() {
            return None;
        }

        Some(Self {
            id: Uuid::new_v4(),
            base,
            changes,
            detected_at: Utc::now(),
        })
    }

    /// Change descriptions in order.
    pub fn descriptions(&self) -> Vec<String> {
        self.changes.iter().map(RateChange::describe).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_change_description_format() {
        let change = RateChange::new(Currency::usd(), dec!(1.00), dec!(1.20));
        assert_eq!(change.describe(), "USD: 1.000000 → 1.200000");

        let change = RateChange::new(Currency::jpy(), dec!(160.1234567), dec!(159.9));
        assert_eq!(change.describe(), "JPY: 160.123457 → 159.900000");
    }

    #[test]
    fn test_no_event_without_changes() {
        assert!(ChangeEvent::from_changes(Currency::eur(), Vec::new()).is_none());
    }

    #[test]
    fn test_event_keeps_change_order() {
        let event = ChangeEvent::from_changes(
            Currency::eur(),
            vec![
                RateChange::new(Currency::usd(), dec!(1.1), dec!(1.2)),
                RateChange::new(Currency::gbp(), dec!(0.9), dec!(0.8)),
            ],
        )
        .unwrap();

        assert_eq!(event.base, Currency::eur());
        assert_eq!(
            event.descriptions(),
            vec![
                "USD: 1.100000 → 1.200000".to_string(),
                "GBP: 0.900000 → 0.800000".to_string(),
            ]
        );
    }
}
