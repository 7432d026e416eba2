//! Rate store trait and in-memory implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use ratewatch_common::{Currency, CurrencyPair, RateObservation};

use crate::error::StoreError;

/// Append-only persistence of rate observations.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Most recent observation for a pair.
    async fn find_latest(&self, pair: &CurrencyPair) -> Result<Option<RateObservation>, StoreError>;

    /// Observations for `base` against any of `targets`, newest first.
    ///
    /// May contain several rows per target; callers keep the first one seen.
    async fn query_latest_for_many(
        &self,
        base: &Currency,
        targets: &[Currency],
    ) -> Result<Vec<RateObservation>, StoreError>;

    /// Persist a batch atomically: either every observation is saved or none.
    async fn save_batch(&self, observations: &[RateObservation]) -> Result<(), StoreError>;
}

/// In-process store. Equal timestamps keep insertion order.
#[derive(Default)]
pub struct MemoryRateStore {
    observations: RwLock<Vec<RateObservation>>,
}

impl MemoryRateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given rows in order.
    pub fn with_observations(observations: Vec<RateObservation>) -> Self {
        Self {
            observations: RwLock::new(observations),
        }
    }

    /// Number of stored observations.
    pub fn len(&self) -> usize {
        self.observations.read().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.observations.read().is_empty()
    }

    /// Copy of all stored observations in insertion order.
    pub fn all(&self) -> Vec<RateObservation> {
        self.observations.read().clone()
    }

    fn newest_first<F>(&self, filter: F) -> Vec<RateObservation>
    where
        F: Fn(&RateObservation) -> bool,
    {
        let mut rows: Vec<RateObservation> = self
            .observations
            .read()
            .iter()
            .filter(|obs| filter(obs))
            .cloned()
            .collect();
        // Stable sort keeps insertion order among ties
        rows.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        rows
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn find_latest(&self, pair: &CurrencyPair) -> Result<Option<RateObservation>, StoreError> {
        Ok(self
            .newest_first(|obs| obs.base == pair.base && obs.target == pair.target)
            .into_iter()
            .next())
    }

    async fn query_latest_for_many(
        &self,
        base: &Currency,
        targets: &[Currency],
    ) -> Result<Vec<RateObservation>, StoreError> {
        Ok(self.newest_first(|obs| &obs.base == base && targets.contains(&obs.target)))
    }

    async fn save_batch(&self, observations: &[RateObservation]) -> Result<(), StoreError> {
        self.observations.write().extend_from_slice(observations);
        Ok(())
    }
}

/// Store wrapper that can be switched into failure modes.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct FaultyRateStore {
    inner: MemoryRateStore,
    fail_queries: std::sync::atomic::AtomicBool,
    fail_saves: std::sync::atomic::AtomicBool,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl FaultyRateStore {
    /// Wrap a store.
    pub fn new(inner: MemoryRateStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    /// A store that fails every call.
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.set_fail_queries(true);
        store.set_fail_saves(true);
        store
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of calls received, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// The wrapped store.
    pub fn inner(&self) -> &MemoryRateStore {
        &self.inner
    }

    fn touch(&self) {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_queries(&self) -> Result<(), StoreError> {
        self.touch();
        if self.fail_queries.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Query("database is unavailable".to_string()));
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateStore for FaultyRateStore {
    async fn find_latest(&self, pair: &CurrencyPair) -> Result<Option<RateObservation>, StoreError> {
        self.check_queries()?;
        self.inner.find_latest(pair).await
    }

    async fn query_latest_for_many(
        &self,
        base: &Currency,
        targets: &[Currency],
    ) -> Result<Vec<RateObservation>, StoreError> {
        self.check_queries()?;
        self.inner.query_latest_for_many(base, targets).await
    }

    async fn save_batch(&self, observations: &[RateObservation]) -> Result<(), StoreError> {
        self.touch();
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Write("transaction rolled back".to_string()));
        }
        self.inner.save_batch(observations).await
    }
}
