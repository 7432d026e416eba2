//! End-to-end behaviour of the rate core against in-memory collaborators.

use std::sync::Arc;

use chrono::{Duration, Utc};
use ratewatch_common::{Currency, RateMap, RateObservation};
use ratewatch_fx::cache::{MemoryRateCache, UnavailableCache};
use ratewatch_fx::notifier::RecordingNotifier;
use ratewatch_fx::provider::MockRateProvider;
use ratewatch_fx::store::{FaultyRateStore, MemoryRateStore};
use ratewatch_fx::{derive_cache_key, CoreConfig, ExchangeRateCore, RateError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn eur() -> Currency {
    Currency::eur()
}

fn usd_gbp() -> Vec<Currency> {
    vec![Currency::usd(), Currency::gbp()]
}

fn rates(entries: &[(&str, Decimal)]) -> RateMap {
    entries
        .iter()
        .map(|(code, rate)| (Currency::new(*code), *rate))
        .collect()
}

fn prior(target: Currency, rate: Decimal) -> RateObservation {
    RateObservation::new(eur(), target, rate, Utc::now() - Duration::hours(1))
}

fn core_with(
    provider: &Arc<MockRateProvider>,
    store: &Arc<FaultyRateStore>,
    cache: &Arc<MemoryRateCache>,
    notifier: &Arc<RecordingNotifier>,
) -> ExchangeRateCore {
    ExchangeRateCore::new(
        provider.clone(),
        store.clone(),
        cache.clone(),
        CoreConfig::default(),
    )
    .with_notifier(notifier.clone())
}

#[test]
fn cache_key_ignores_permutation_and_case() {
    assert_eq!(
        derive_cache_key("eur", &["usd", "gbp"]),
        derive_cache_key("EUR", &["GBP", "USD"])
    );
}

#[tokio::test]
async fn read_path_never_calls_provider() {
    let provider = Arc::new(MockRateProvider::new("test"));
    provider.set_rate(Currency::usd(), dec!(9.99));
    let store = Arc::new(FaultyRateStore::new(MemoryRateStore::new()));
    let cache = Arc::new(MemoryRateCache::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let core = core_with(&provider, &store, &cache, &notifier);

    let first = core.get_rates(&eur(), &usd_gbp()).await.unwrap();
    let second = core.get_rates(&eur(), &[Currency::usd()]).await.unwrap();

    assert!(first.is_empty());
    assert!(second.is_empty());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn cache_hit_skips_store() {
    let provider = Arc::new(MockRateProvider::new("test"));
    let store = Arc::new(FaultyRateStore::unavailable());
    let cache = Arc::new(MemoryRateCache::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let core = core_with(&provider, &store, &cache, &notifier);

    let cached = rates(&[("USD", dec!(1.1)), ("GBP", dec!(0.9))]);
    cache.insert(derive_cache_key("EUR", &usd_gbp()), cached.clone());

    let result = core.get_rates(&eur(), &usd_gbp()).await.unwrap();

    assert_eq!(result, cached);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn cache_miss_keeps_first_row_per_target() {
    let now = Utc::now();
    let store = Arc::new(FaultyRateStore::new(MemoryRateStore::with_observations(vec![
        RateObservation::new(eur(), Currency::usd(), dec!(1.1), now),
        RateObservation::new(eur(), Currency::gbp(), dec!(0.9), now),
        RateObservation::new(eur(), Currency::usd(), dec!(1.2), now),
    ])));
    let provider = Arc::new(MockRateProvider::new("test"));
    let cache = Arc::new(MemoryRateCache::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let core = core_with(&provider, &store, &cache, &notifier);

    let result = core.get_rates(&eur(), &usd_gbp()).await.unwrap();

    let expected = rates(&[("USD", dec!(1.1)), ("GBP", dec!(0.9))]);
    assert_eq!(result, expected);
    assert_eq!(cache.lookup(&derive_cache_key("EUR", &usd_gbp())), Some(expected));
}

#[tokio::test]
async fn first_update_persists_without_notification() {
    let provider = Arc::new(MockRateProvider::new("test"));
    provider.set_rate(Currency::usd(), dec!(1.1));
    provider.set_rate(Currency::gbp(), dec!(0.9));
    let store = Arc::new(FaultyRateStore::new(MemoryRateStore::new()));
    let cache = Arc::new(MemoryRateCache::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let core = core_with(&provider, &store, &cache, &notifier);

    let outcome = core.update_rates(&eur(), &usd_gbp()).await.unwrap();

    assert_eq!(outcome.persisted, 2);
    assert_eq!(store.inner().len(), 2);
    assert!(notifier.events().is_empty());

    let observed_at: Vec<_> = store.inner().all().iter().map(|o| o.observed_at).collect();
    assert_eq!(observed_at[0], observed_at[1]);

    let expected = rates(&[("USD", dec!(1.1)), ("GBP", dec!(0.9))]);
    assert_eq!(cache.lookup(&derive_cache_key("EUR", &usd_gbp())), Some(expected));
}

#[tokio::test]
async fn changed_rate_emits_one_event_then_persists() {
    let provider = Arc::new(MockRateProvider::new("test"));
    provider.set_rate(Currency::usd(), dec!(1.20));
    let store = Arc::new(FaultyRateStore::new(MemoryRateStore::with_observations(vec![
        prior(Currency::usd(), dec!(1.00)),
    ])));
    let cache = Arc::new(MemoryRateCache::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let core = core_with(&provider, &store, &cache, &notifier);

    core.update_rates(&eur(), &[Currency::usd()]).await.unwrap();

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].base, eur());
    assert_eq!(events[0].descriptions(), vec!["USD: 1.000000 → 1.200000".to_string()]);

    let latest = store.inner().all().pop().unwrap();
    assert_eq!(latest.rate, dec!(1.2));
}

#[tokio::test]
async fn unchanged_rate_emits_nothing() {
    let provider = Arc::new(MockRateProvider::new("test"));
    provider.set_rate(Currency::usd(), dec!(1.1));
    let store = Arc::new(FaultyRateStore::new(MemoryRateStore::with_observations(vec![
        prior(Currency::usd(), dec!(1.10)),
    ])));
    let cache = Arc::new(MemoryRateCache::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let core = core_with(&provider, &store, &cache, &notifier);

    let outcome = core.update_rates(&eur(), &[Currency::usd()]).await.unwrap();

    assert!(outcome.event.is_none());
    assert!(notifier.events().is_empty());
    assert_eq!(store.inner().len(), 2);
}

#[tokio::test]
async fn provider_failure_persists_and_notifies_nothing() {
    let provider = Arc::new(MockRateProvider::new("test"));
    provider.set_rate(Currency::usd(), dec!(1.2));
    provider.set_failing(true);
    let store = Arc::new(FaultyRateStore::new(MemoryRateStore::with_observations(vec![
        prior(Currency::usd(), dec!(1.0)),
    ])));
    let cache = Arc::new(MemoryRateCache::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let core = core_with(&provider, &store, &cache, &notifier);

    let result = core.update_rates(&eur(), &[Currency::usd()]).await;

    assert!(matches!(result, Err(RateError::FetchFailed(_))));
    assert_eq!(store.inner().len(), 1);
    assert_eq!(store.calls(), 0);
    assert!(notifier.events().is_empty());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn persist_failure_leaves_cache_untouched() {
    let provider = Arc::new(MockRateProvider::new("test"));
    provider.set_rate(Currency::usd(), dec!(1.2));
    let store = Arc::new(FaultyRateStore::new(MemoryRateStore::with_observations(vec![
        prior(Currency::usd(), dec!(1.0)),
    ])));
    store.set_fail_saves(true);
    let cache = Arc::new(MemoryRateCache::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let core = core_with(&provider, &store, &cache, &notifier);

    let key = derive_cache_key("EUR", &[Currency::usd()]);
    let stale = rates(&[("USD", dec!(1.0))]);
    cache.insert(key.clone(), stale.clone());

    let result = core.update_rates(&eur(), &[Currency::usd()]).await;

    assert!(matches!(result, Err(RateError::PersistFailed(_))));
    assert_eq!(cache.lookup(&key), Some(stale));
    assert_eq!(store.inner().len(), 1);
    // Delivered before the failed commit and not retracted
    assert_eq!(notifier.events().len(), 1);
}

#[tokio::test]
async fn unrequested_target_is_persisted_and_diffed_but_not_cached() {
    let provider = Arc::new(MockRateProvider::new("test"));
    provider.set_rate(Currency::usd(), dec!(1.2));
    provider.set_rate(Currency::jpy(), dec!(160));
    let store = Arc::new(FaultyRateStore::new(MemoryRateStore::with_observations(vec![
        prior(Currency::jpy(), dec!(150)),
    ])));
    let cache = Arc::new(MemoryRateCache::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let core = core_with(&provider, &store, &cache, &notifier);

    let outcome = core.update_rates(&eur(), &[Currency::usd()]).await.unwrap();

    assert_eq!(outcome.persisted, 2);
    assert_eq!(store.inner().len(), 3);

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].descriptions(), vec!["JPY: 150.000000 → 160.000000"]);

    let key = derive_cache_key("EUR", &[Currency::usd()]);
    assert_eq!(cache.lookup(&key), Some(rates(&[("USD", dec!(1.2))])));
    assert_eq!(outcome.snapshot.rates, rates(&[("USD", dec!(1.2))]));
}

#[tokio::test]
async fn cache_outage_does_not_fail_the_write() {
    let provider = Arc::new(MockRateProvider::new("test"));
    provider.set_rate(Currency::usd(), dec!(1.2));
    let store = Arc::new(FaultyRateStore::new(MemoryRateStore::with_observations(vec![
        prior(Currency::usd(), dec!(1.0)),
    ])));
    let cache = Arc::new(UnavailableCache::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let core = ExchangeRateCore::new(
        provider.clone(),
        store.clone(),
        cache.clone(),
        CoreConfig::default(),
    )
    .with_notifier(notifier.clone());

    let outcome = core.update_rates(&eur(), &[Currency::usd()]).await.unwrap();

    assert_eq!(outcome.persisted, 1);
    assert_eq!(store.inner().len(), 2);
    assert_eq!(notifier.events().len(), 1);
    // Only the prime touched the cache
    assert_eq!(cache.calls(), 1);
}

#[tokio::test]
async fn empty_targets_rejected_before_collaborators() {
    let provider = Arc::new(MockRateProvider::new("test"));
    let store = Arc::new(FaultyRateStore::new(MemoryRateStore::new()));
    let cache = Arc::new(UnavailableCache::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let core = ExchangeRateCore::new(
        provider.clone(),
        store.clone(),
        cache.clone(),
        CoreConfig::default(),
    )
    .with_notifier(notifier.clone());

    let read = core.get_rates(&eur(), &[]).await;
    let write = core.update_rates(&eur(), &[]).await;

    assert!(matches!(read, Err(RateError::InvalidInput(_))));
    assert!(matches!(write, Err(RateError::InvalidInput(_))));
    assert_eq!(provider.calls(), 0);
    assert_eq!(store.calls(), 0);
    assert_eq!(cache.calls(), 0);
    assert!(notifier.events().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reads_agree() {
    let store = Arc::new(FaultyRateStore::new(MemoryRateStore::with_observations(vec![
        prior(Currency::usd(), dec!(1.1)),
        prior(Currency::gbp(), dec!(0.9)),
    ])));
    let provider = Arc::new(MockRateProvider::new("test"));
    let cache = Arc::new(MemoryRateCache::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let core = Arc::new(core_with(&provider, &store, &cache, &notifier));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let core = core.clone();
            tokio::spawn(async move { core.get_rates(&Currency::eur(), &usd_gbp()).await })
        })
        .collect();

    let expected = rates(&[("USD", dec!(1.1)), ("GBP", dec!(0.9))]);
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), expected);
    }
    assert_eq!(cache.len(), 1);
    assert_eq!(provider.calls(), 0);
}
