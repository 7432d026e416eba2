//! Row mapping for the `currency_rate` table.

use chrono::{DateTime, Utc};
use ratewatch_common::{Currency, RateObservation};
use rust_decimal::Decimal;

/// One row of `currency_rate`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CurrencyRateRow {
    pub base_currency: String,
    pub target_currency: String,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl From<CurrencyRateRow> for RateObservation {
    fn from(row: CurrencyRateRow) -> Self {
        RateObservation::new(
            Currency::new(row.base_currency),
            Currency::new(row.target_currency),
            row.rate,
            row.fetched_at,
        )
    }
}

impl From<&RateObservation> for CurrencyRateRow {
    fn from(obs: &RateObservation) -> Self {
        Self {
            base_currency: obs.base.code().to_string(),
            target_currency: obs.target.code().to_string(),
            rate: obs.rate,
            fetched_at: obs.observed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_row_to_observation() {
        let fetched_at = Utc::now();
        let row = CurrencyRateRow {
            base_currency: "eur".to_string(),
            target_currency: "USD".to_string(),
            rate: dec!(1.123456),
            fetched_at,
        };

        let obs = RateObservation::from(row);

        assert_eq!(obs.base, Currency::eur());
        assert_eq!(obs.target, Currency::usd());
        assert_eq!(obs.rate, dec!(1.123456));
        assert_eq!(obs.observed_at, fetched_at);
    }

    #[test]
    fn test_observation_to_row() {
        let obs = RateObservation::new(Currency::eur(), Currency::gbp(), dec!(0.876543), Utc::now());

        let row = CurrencyRateRow::from(&obs);

        assert_eq!(row.base_currency, "EUR");
        assert_eq!(row.target_currency, "GBP");
        assert_eq!(row.rate, dec!(0.876543));
    }
}
