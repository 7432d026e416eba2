//! Runs against a live database: `DATABASE_URL=... cargo test -- --ignored`.

use chrono::{Duration, Utc};
use ratewatch_common::{Currency, CurrencyPair, RateObservation};
use ratewatch_fx::RateStore;
use ratewatch_store::PgRateStore;
use rust_decimal_macros::dec;

async fn connect() -> PgRateStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let store = PgRateStore::connect(&url, 2).await.unwrap();
    store.migrate().await.unwrap();
    store
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn batch_round_trip_and_latest() {
    let store = connect().await;
    // Unique base per run keeps tests independent of existing rows
    let base = Currency::new(format!("T{:02}", Utc::now().timestamp_subsec_micros() % 100));
    let earlier = Utc::now() - Duration::hours(1);
    let now = Utc::now();

    store
        .save_batch(&[
            RateObservation::new(base.clone(), Currency::usd(), dec!(1.0), earlier),
            RateObservation::new(base.clone(), Currency::gbp(), dec!(0.8), earlier),
        ])
        .await
        .unwrap();
    store
        .save_batch(&[RateObservation::new(base.clone(), Currency::usd(), dec!(1.2), now)])
        .await
        .unwrap();

    let latest = store
        .find_latest(&CurrencyPair::new(base.clone(), Currency::usd()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.rate, dec!(1.2));

    let rows = store
        .query_latest_for_many(&base, &[Currency::usd(), Currency::gbp()])
        .await
        .unwrap();
    assert_eq!(rows.first().map(|r| r.rate), Some(dec!(1.2)));
    assert!(rows.iter().any(|r| r.target == Currency::gbp()));

    sqlx::query("DELETE FROM currency_rate WHERE base_currency = $1")
        .bind(base.code())
        .execute(store.pool())
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn empty_batch_is_a_no_op() {
    let store = connect().await;
    store.save_batch(&[]).await.unwrap();
}
