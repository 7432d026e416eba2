//! Currency and rate types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CurrencyCodeError;
use crate::time::constants::RATE_SCALE;

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    ///
    /// The code is upper-cased but otherwise taken as-is; upstream data is
    /// trusted. Use [`Currency::parse`] for user input.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    /// Parse a user supplied code, requiring exactly three ASCII letters.
    pub fn parse(code: &str) -> Result<Self, CurrencyCodeError> {
        let trimmed = code.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CurrencyCodeError::Malformed(code.to_string()));
        }
        Ok(Self::new(trimmed))
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Common currencies
    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn gbp() -> Self {
        Self::new("GBP")
    }

    pub fn jpy() -> Self {
        Self::new("JPY")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for Currency {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A base/target currency pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Currency the rate is expressed relative to.
    pub base: Currency,
    /// Currency being tracked against the base.
    pub target: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, target: Currency) -> Self {
        Self { base, target }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.target)
    }
}

/// Mapping from target currency to rate. One entry per target.
pub type RateMap = BTreeMap<Currency, Decimal>;

/// Round a rate to the precision the durable store keeps.
pub fn normalize_rate(rate: Decimal) -> Decimal {
    rate.round_dp(RATE_SCALE)
}

/// A single recorded (base, target, rate) fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateObservation {
    /// Base currency.
    pub base: Currency,
    /// Target currency.
    pub target: Currency,
    /// Rate of one unit of base in target, at storage precision.
    pub rate: Decimal,
    /// When the rate was fetched.
    pub observed_at: DateTime<Utc>,
}

impl RateObservation {
    /// Create a new observation. The rate is normalized to storage precision.
    pub fn new(base: Currency, target: Currency, rate: Decimal, observed_at: DateTime<Utc>) -> Self {
        Self {
            base,
            target,
            rate: normalize_rate(rate),
            observed_at,
        }
    }

    /// Get the currency pair of this observation.
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.base.clone(), self.target.clone())
    }
}

/// Latest known rates for a base against a set of targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Base currency.
    pub base: Currency,
    /// Target to rate mapping.
    pub rates: RateMap,
}

impl RateSnapshot {
    /// Create a new snapshot.
    pub fn new(base: Currency, rates: RateMap) -> Self {
        Self { base, rates }
    }

    /// Keep only the entries for the given targets.
    pub fn restricted_to(&self, targets: &[Currency]) -> RateMap {
        self.rates
            .iter()
            .filter(|(target, _)| targets.contains(target))
            .map(|(target, rate)| (target.clone(), *rate))
            .collect()
    }

    /// Get the rate for a target, if known.
    pub fn rate(&self, target: &Currency) -> Option<Decimal> {
        self.rates.get(target).copied()
    }

    /// Number of targets in the snapshot.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Check if the snapshot holds no rates.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
