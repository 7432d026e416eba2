//! Exchange rate core: cache-then-store reads and fetch/diff/notify/persist writes.

use std::sync::Arc;

use chrono::{Duration, Utc};
use ratewatch_common::{
    constants, normalize_rate, ChangeEvent, Currency, CurrencyPair, RateChange, RateMap,
    RateObservation, RateSnapshot,
};
use tracing::{debug, info, instrument, warn};

use crate::cache::RateCache;
use crate::cache_key::derive_cache_key;
use crate::error::{RateError, RateResult};
use crate::notifier::ChangeNotifier;
use crate::provider::RateProvider;
use crate::store::RateStore;

/// Configuration for the rate core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// TTL applied to every cache write.
    pub cache_ttl: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            cache_ttl: constants::rate_cache_ttl(),
        }
    }
}

/// Result of a completed write cycle.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// Fetched rates restricted to the requested targets, as cached.
    pub snapshot: RateSnapshot,
    /// Event handed to the notifier, if anything changed.
    pub event: Option<ChangeEvent>,
    /// Number of observations committed.
    pub persisted: usize,
}

/// Orchestrates the provider, store, cache and notifier.
///
/// Holds no mutable state of its own, so one instance can serve concurrent
/// readers and writers. Concurrent misses for the same key each query the
/// store. Concurrent writers for the same base are not serialized: each diffs
/// against whatever the store has committed when it looks.
pub struct ExchangeRateCore {
    provider: Arc<dyn RateProvider>,
    store: Arc<dyn RateStore>,
    cache: Arc<dyn RateCache>,
    notifier: Option<Arc<dyn ChangeNotifier>>,
    config: CoreConfig,
}

impl ExchangeRateCore {
    /// Create a core without a notifier.
    pub fn new(
        provider: Arc<dyn RateProvider>,
        store: Arc<dyn RateStore>,
        cache: Arc<dyn RateCache>,
        config: CoreConfig,
    ) -> Self {
        Self {
            provider,
            store,
            cache,
            notifier: None,
            config,
        }
    }

    /// Attach a change notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Latest known rates for `base` against `targets`.
    ///
    /// Served from cache when possible, otherwise rebuilt from the store and
    /// written back to the cache. Targets without history are left out. Never
    /// calls the provider.
    #[instrument(skip(self, targets), fields(base = %base, targets = targets.len()))]
    pub async fn get_rates(&self, base: &Currency, targets: &[Currency]) -> RateResult<RateMap> {
        ensure_targets(targets)?;

        let key = derive_cache_key(base.code(), targets);
        match self.cache.get(&key).await {
            Ok(Some(rates)) => {
                debug!(key = %key, "Serving rates from cache");
                return Ok(rates);
            }
            Ok(None) => debug!(key = %key, "Rates not cached"),
            Err(e) => warn!(key = %key, error = %e, "Cache lookup failed, reading store"),
        }

        let rows = self
            .store
            .query_latest_for_many(base, targets)
            .await
            .map_err(RateError::StoreUnavailable)?;

        let rates = latest_per_target(rows, targets);
        self.prime(&key, &rates).await;

        Ok(rates)
    }

    /// Fetch fresh rates, report changes, persist them and prime the cache.
    ///
    /// Change events are delivered before persistence; a notifier failure is
    /// logged and does not stop the write. The cache is only primed once the
    /// batch has committed.
    #[instrument(skip(self, targets), fields(base = %base, targets = targets.len()))]
    pub async fn update_rates(&self, base: &Currency, targets: &[Currency]) -> RateResult<UpdateOutcome> {
        ensure_targets(targets)?;

        let fetched: RateMap = self
            .provider
            .fetch_rates(base, targets)
            .await
            .map_err(RateError::FetchFailed)?
            .into_iter()
            .map(|(target, rate)| (target, normalize_rate(rate)))
            .collect();
        let fetched_at = Utc::now();

        if fetched.is_empty() {
            warn!(provider = self.provider.name(), "Provider returned no rates");
            return Ok(UpdateOutcome {
                snapshot: RateSnapshot::new(base.clone(), RateMap::new()),
                event: None,
                persisted: 0,
            });
        }

        let changes = self.detect_changes(base, &fetched).await?;
        let event = ChangeEvent::from_changes(base.clone(), changes);
        if let Some(event) = &event {
            self.dispatch(event).await;
        }

        let observations: Vec<RateObservation> = fetched
            .iter()
            .map(|(target, rate)| RateObservation::new(base.clone(), target.clone(), *rate, fetched_at))
            .collect();

        self.store
            .save_batch(&observations)
            .await
            .map_err(RateError::PersistFailed)?;

        let snapshot = RateSnapshot::new(base.clone(), fetched);
        let rates = snapshot.restricted_to(targets);
        let key = derive_cache_key(base.code(), targets);
        self.prime(&key, &rates).await;

        info!(
            persisted = observations.len(),
            changes = event.as_ref().map_or(0, |e| e.changes.len()),
            "Rates updated"
        );

        Ok(UpdateOutcome {
            snapshot: RateSnapshot::new(base.clone(), rates),
            event,
            persisted: observations.len(),
        })
    }

    /// Compare each fetched rate with the most recent stored one.
    ///
    /// A target without history is not a change. Equality is exact.
    async fn detect_changes(&self, base: &Currency, fetched: &RateMap) -> RateResult<Vec<RateChange>> {
        let mut changes = Vec::new();

        for (target, rate) in fetched {
            let pair = CurrencyPair::new(base.clone(), target.clone());
            let previous = self
                .store
                .find_latest(&pair)
                .await
                .map_err(RateError::StoreUnavailable)?;

            if let Some(previous) = previous {
                if previous.rate != *rate {
                    changes.push(RateChange::new(target.clone(), previous.rate, *rate));
                }
            }
        }

        Ok(changes)
    }

    async fn dispatch(&self, event: &ChangeEvent) {
        let Some(notifier) = &self.notifier else {
            debug!(event_id = %event.id, "No notifier configured, dropping change event");
            return;
        };

        match notifier.notify(event.clone()).await {
            Ok(()) => debug!(
                event_id = %event.id,
                notifier = notifier.name(),
                changes = event.changes.len(),
                "Change event delivered"
            ),
            Err(e) => warn!(
                event_id = %event.id,
                notifier = notifier.name(),
                error = %e,
                "Change notification failed, continuing"
            ),
        }
    }

    async fn prime(&self, key: &str, rates: &RateMap) {
        if let Err(e) = self.cache.set(key, rates, self.config.cache_ttl).await {
            warn!(key, error = %e, "Failed to prime rate cache");
        }
    }
}

fn ensure_targets(targets: &[Currency]) -> RateResult<()> {
    if targets.is_empty() {
        return Err(RateError::InvalidInput(
            "at least one target currency is required".to_string(),
        ));
    }
    Ok(())
}

/// First row seen per requested target wins.
fn latest_per_target(rows: Vec<RateObservation>, targets: &[Currency]) -> RateMap {
    let mut rates = RateMap::new();
    for row in rows {
        if targets.contains(&row.target) {
            rates.entry(row.target).or_insert(row.rate);
        }
    }
    rates
}
