//! Rate provider trait and implementations.

use async_trait::async_trait;
use ratewatch_common::{Currency, RateMap};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::error::ProviderError;

/// Default Frankfurter API endpoint.
pub const FRANKFURTER_API_BASE: &str = "https://api.frankfurter.app";

/// Trait for upstream FX rate providers.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Fetch the latest rates of `base` against each of `targets`.
    ///
    /// A response without rates yields an empty mapping, not an error.
    async fn fetch_rates(&self, base: &Currency, targets: &[Currency]) -> Result<RateMap, ProviderError>;
}

/// Body of `GET /latest`.
#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    rates: Option<BTreeMap<String, f64>>,
}

/// Rate provider backed by the Frankfurter public API.
pub struct FrankfurterProvider {
    client: Client,
    base_url: String,
}

impl FrankfurterProvider {
    /// Create a provider for the public endpoint.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_base_url(FRANKFURTER_API_BASE, timeout)
    }

    /// Create a provider for a custom endpoint.
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Build the `latest` URL for a request.
    fn latest_url(&self, base: &Currency, targets: &[Currency]) -> Result<Url, ProviderError> {
        let to = targets
            .iter()
            .map(Currency::code)
            .collect::<Vec<_>>()
            .join(",");

        Url::parse_with_params(
            &format!("{}/latest", self.base_url.trim_end_matches('/')),
            &[("from", base.code()), ("to", to.as_str())],
        )
        .map_err(|e| ProviderError::Transport(format!("Invalid provider URL: {}", e)))
    }
}

/// Convert a decoded body into a rate mapping.
fn parse_latest(body: &[u8]) -> Result<RateMap, ProviderError> {
    let response: LatestResponse = serde_json::from_slice(body)
        .map_err(|e| ProviderError::Decode(format!("JSON parse error: {}", e)))?;

    let mut rates = RateMap::new();
    for (code, value) in response.rates.unwrap_or_default() {
        let rate = Decimal::try_from(value)
            .map_err(|e| ProviderError::Decode(format!("Invalid rate for {}: {}", code, e)))?;
        rates.insert(Currency::new(code), rate);
    }

    Ok(rates)
}

#[async_trait]
impl RateProvider for FrankfurterProvider {
    fn name(&self) -> &str {
        "frankfurter"
    }

    #[instrument(skip(self, targets), fields(base = %base, targets = targets.len()))]
    async fn fetch_rates(&self, base: &Currency, targets: &[Currency]) -> Result<RateMap, ProviderError> {
        let url = self.latest_url(base, targets)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(format!("Failed to read body: {}", e)))?;

        let rates = parse_latest(&body)?;
        debug!(received = rates.len(), "Fetched rates from provider");

        Ok(rates)
    }
}

/// Mock rate provider for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateProvider {
    name: String,
    rates: parking_lot::Mutex<RateMap>,
    fail: std::sync::atomic::AtomicBool,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateProvider {
    /// Create a new mock provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: parking_lot::Mutex::new(RateMap::new()),
            fail: std::sync::atomic::AtomicBool::new(false),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Set the rate returned for a target.
    pub fn set_rate(&self, target: Currency, rate: Decimal) {
        self.rates.lock().insert(target, rate);
    }

    /// Make every fetch fail with a transport error.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of fetches received.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_rates(&self, _base: &Currency, _targets: &[Currency]) -> Result<RateMap, ProviderError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ProviderError::Transport("connection reset".to_string()));
        }

        Ok(self.rates.lock().clone())
    }
}
