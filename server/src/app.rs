//! Service wiring: collaborators, notifier consumer and scheduled fetches.

use std::sync::Arc;
use std::time::Duration;

use ratewatch_common::{ChangeEvent, Currency};
use ratewatch_fx::{
    ChannelNotifier, CoreConfig, ExchangeRateCore, FrankfurterProvider, LogNotifier,
    MemoryRateCache, RateCacheConfig, RateProvider, RateStore,
};
use ratewatch_store::PgRateStore;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{NotifierKind, ServiceConfig};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human readable.
    Pretty,
}

/// Initialize logging from `RUST_LOG` (default `info`).
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

/// Assembled rate core plus the tasks it owns.
pub struct App {
    /// Shared rate core.
    pub core: Arc<ExchangeRateCore>,
    /// Consumer draining the change event queue, if one is configured.
    pub consumer: Option<JoinHandle<usize>>,
}

impl App {
    /// Release the core and wait up to `grace` for queued change events.
    ///
    /// The queue only closes once every other clone of `core` is gone, so
    /// callers drop theirs first. Returns the number of events the consumer
    /// handled, or `None` without a consumer or when it did not finish.
    pub async fn shutdown(self, grace: Duration) -> Option<usize> {
        let App { core, consumer } = self;
        drop(core);

        let consumer = consumer?;
        match tokio::time::timeout(grace, consumer).await {
            Ok(Ok(handled)) => Some(handled),
            Ok(Err(e)) => {
                error!(error = %e, "Change event consumer failed");
                None
            }
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Change event queue not drained before shutdown"
                );
                None
            }
        }
    }
}

/// Connect to the database and upstream provider and build the core.
pub async fn connect(config: &ServiceConfig) -> anyhow::Result<App> {
    let store = PgRateStore::connect(&config.database_url, config.db_max_connections).await?;
    store.migrate().await?;

    let provider = FrankfurterProvider::with_base_url(&config.provider.base_url, config.provider.timeout)?;

    info!(
        provider = provider.name(),
        provider_url = %config.provider.base_url,
        "Collaborators ready"
    );

    assemble(config, Arc::new(provider), Arc::new(store))
}

/// Build the core over the given provider and store.
///
/// Must be called within a Tokio runtime when the channel notifier is used.
pub fn assemble(
    config: &ServiceConfig,
    provider: Arc<dyn RateProvider>,
    store: Arc<dyn RateStore>,
) -> anyhow::Result<App> {
    let kind = config.notifier_kind().map_err(anyhow::Error::msg)?;

    let cache = Arc::new(MemoryRateCache::with_config(RateCacheConfig {
        default_ttl: config.cache_ttl(),
        ..Default::default()
    }));
    let core = ExchangeRateCore::new(
        provider,
        store,
        cache,
        CoreConfig {
            cache_ttl: config.cache_ttl(),
        },
    );

    let (core, consumer) = match kind {
        NotifierKind::Log => (core.with_notifier(Arc::new(LogNotifier::new())), None),
        NotifierKind::Channel => {
            let (notifier, rx) = ChannelNotifier::new(config.notifier_queue_capacity);
            let consumer = tokio::spawn(consume_events(rx));
            (core.with_notifier(Arc::new(notifier)), Some(consumer))
        }
        NotifierKind::None => (core, None),
    };

    info!(notifier = ?kind, cache_ttl_secs = config.cache_ttl_secs, "Rate core assembled");

    Ok(App {
        core: Arc::new(core),
        consumer,
    })
}

/// Drain queued change events until every sender is gone.
///
/// Returns the number of events handled.
pub async fn consume_events(mut rx: mpsc::Receiver<ChangeEvent>) -> usize {
    let mut handled = 0;
    while let Some(event) = rx.recv().await {
        handled += 1;
        for description in event.descriptions() {
            info!(
                event_id = %event.id,
                base = %event.base,
                change = %description,
                "Currency rate changed"
            );
        }
    }
    info!(handled, "Change event queue closed");
    handled
}

/// Run `update_rates` every `interval` until `shutdown` flips to true.
///
/// The first cycle runs immediately. A failed cycle is logged and the loop
/// carries on; retrying is left to the next tick.
pub async fn run_schedule(
    core: Arc<ExchangeRateCore>,
    base: Currency,
    targets: Vec<Currency>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        base = %base,
        targets = targets.len(),
        interval_secs = interval.as_secs(),
        "Scheduled rate fetch started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match core.update_rates(&base, &targets).await {
                    Ok(outcome) => info!(
                        persisted = outcome.persisted,
                        changed = outcome.event.is_some(),
                        "Scheduled fetch complete"
                    ),
                    Err(e) if e.is_client_error() => {
                        error!(error = %e, "Scheduled fetch rejected, stopping");
                        break;
                    }
                    Err(e) => warn!(error = %e, "Scheduled fetch failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Scheduled rate fetch stopped");
}
