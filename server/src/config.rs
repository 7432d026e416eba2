//! Service configuration.

use std::str::FromStr;
use std::time::Duration;

use ratewatch_common::{constants, Currency};

/// How change events are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    /// Write each change to the log.
    Log,
    /// Queue events for an in-process consumer task.
    Channel,
    /// Drop events.
    None,
}

impl FromStr for NotifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(NotifierKind::Log),
            "channel" => Ok(NotifierKind::Channel),
            "none" | "" => Ok(NotifierKind::None),
            other => Err(format!("Unknown notifier: {}", other)),
        }
    }
}

/// Upstream provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider base URL.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: ratewatch_fx::provider::FRANKFURTER_API_BASE.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// In-process periodic fetch.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Base currency to fetch.
    pub base: String,
    /// Target currencies. Empty disables the schedule.
    pub targets: Vec<String>,
    /// Time between fetches.
    pub interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            base: constants::DEFAULT_BASE_CURRENCY.to_string(),
            targets: Vec::new(),
            interval: Duration::from_secs(3600),
        }
    }
}

impl ScheduleConfig {
    /// Check if scheduled fetching is enabled.
    pub fn is_enabled(&self) -> bool {
        !self.targets.is_empty()
    }

    /// Parse the configured base and target codes.
    pub fn currencies(&self) -> Result<(Currency, Vec<Currency>), String> {
        let base = Currency::parse(&self.base).map_err(|e| e.to_string())?;
        let targets = self
            .targets
            .iter()
            .map(|code| Currency::parse(code))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;
        Ok((base, targets))
    }
}

/// Main service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Database URL.
    pub database_url: String,
    /// Maximum pooled database connections.
    pub db_max_connections: u32,
    /// Provider configuration.
    pub provider: ProviderConfig,
    /// Cache TTL in seconds.
    pub cache_ttl_secs: i64,
    /// Change notifier name: `log`, `channel` or `none`.
    pub notifier: String,
    /// Queue capacity for the channel notifier.
    pub notifier_queue_capacity: usize,
    /// Scheduled fetch configuration.
    pub schedule: ScheduleConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            database_url: "postgres://localhost/ratewatch".to_string(),
            db_max_connections: 5,
            provider: ProviderConfig::default(),
            cache_ttl_secs: constants::RATE_CACHE_TTL_SECS,
            notifier: "log".to_string(),
            notifier_queue_capacity: 1024,
            schedule: ScheduleConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Unparseable numbers keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("RATEWATCH_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Some(port) = lookup("RATEWATCH_LISTEN_PORT").and_then(|p| p.parse().ok()) {
            config.listen_port = port;
        }

        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }

        if let Some(max) = lookup("RATEWATCH_DB_MAX_CONNECTIONS").and_then(|m| m.parse().ok()) {
            config.db_max_connections = max;
        }

        if let Some(url) = lookup("RATEWATCH_PROVIDER_URL") {
            config.provider.base_url = url;
        }

        if let Some(secs) = lookup("RATEWATCH_PROVIDER_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.provider.timeout = Duration::from_secs(secs);
        }

        if let Some(ttl) = lookup("RATEWATCH_CACHE_TTL_SECS").and_then(|t| t.parse().ok()) {
            config.cache_ttl_secs = ttl;
        }

        if let Some(kind) = lookup("RATEWATCH_NOTIFIER") {
            config.notifier = kind;
        }

        if let Some(capacity) = lookup("RATEWATCH_NOTIFIER_QUEUE").and_then(|c| c.parse().ok()) {
            config.notifier_queue_capacity = capacity;
        }

        if let Some(base) = lookup("RATEWATCH_SCHEDULE_BASE") {
            config.schedule.base = base;
        }

        if let Some(targets) = lookup("RATEWATCH_SCHEDULE_TARGETS") {
            config.schedule.targets = split_codes(&targets);
        }

        if let Some(secs) = lookup("RATEWATCH_SCHEDULE_INTERVAL_SECS").and_then(|s| s.parse().ok()) {
            config.schedule.interval = Duration::from_secs(secs);
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.database_url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }

        if self.db_max_connections == 0 {
            return Err("Database pool needs at least one connection".to_string());
        }

        if self.cache_ttl_secs <= 0 {
            return Err("Cache TTL must be positive".to_string());
        }

        if self.notifier_kind()? == NotifierKind::Channel && self.notifier_queue_capacity == 0 {
            return Err("Notifier queue capacity cannot be 0".to_string());
        }

        if self.schedule.is_enabled() {
            if self.schedule.interval.is_zero() {
                return Err("Schedule interval cannot be 0".to_string());
            }
            self.schedule.currencies()?;
        }

        Ok(())
    }

    /// Parsed notifier kind.
    pub fn notifier_kind(&self) -> Result<NotifierKind, String> {
        self.notifier.parse()
    }

    /// Cache TTL as a duration.
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs)
    }
}

/// Split a comma separated code list, dropping empty segments.
pub fn split_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_uppercase)
        .collect()
}
