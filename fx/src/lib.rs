//! Ratewatch FX Core
//!
//! Rate caching and change detection for a base currency against a set of
//! target currencies.
//!
//! # Features
//!
//! - Deterministic cache keys independent of target order and case
//! - Cache-then-store read path with best-effort cache priming
//! - Fetch, diff, notify, persist and prime on the write path
//! - Pluggable provider, store, cache and notifier collaborators
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ratewatch_fx::{CoreConfig, ExchangeRateCore, FrankfurterProvider, MemoryRateCache, LogNotifier};
//! use ratewatch_common::Currency;
//!
//! let core = ExchangeRateCore::new(provider, store, Arc::new(MemoryRateCache::new()), CoreConfig::default())
//!     .with_notifier(Arc::new(LogNotifier::new()));
//!
//! // Scheduled job
//! core.update_rates(&Currency::eur(), &[Currency::usd(), Currency::gbp()]).await?;
//!
//! // Request handler
//! let rates = core.get_rates(&Currency::eur(), &[Currency::usd()]).await?;
//! ```

pub mod cache_key;
pub mod cache;
pub mod provider;
pub mod store;
pub mod notifier;
pub mod engine;
pub mod error;

pub use cache_key::derive_cache_key;
pub use cache::{MemoryRateCache, RateCache, RateCacheConfig};
pub use provider::{FrankfurterProvider, RateProvider};
pub use store::{MemoryRateStore, RateStore};
pub use notifier::{ChangeNotifier, ChannelNotifier, LogNotifier};
pub use engine::{CoreConfig, ExchangeRateCore, UpdateOutcome};
pub use error::{CacheError, NotifyError, ProviderError, RateError, RateResult, StoreError};
