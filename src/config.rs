//! Configuration module
//!
//! Loaded from a TOML file (default `~/.config/texnouz-booking/config.toml`).
//! Every section and field is optional; missing values fall back to the
//! defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::BookingPolicy;
use crate::infrastructure::DatabaseConfig;
use crate::shared::errors::ConfigError;
use crate::shared::RetryConfig;

/// Upper bound for every `[booking]` minute field (30 days)
pub const MAX_POLICY_MINUTES: i64 = 60 * 24 * 30;

/// Default config location
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("texnouz-booking")
        .join("config.toml")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSection,
    pub booking: BookingSection,
    pub scheduler: SchedulerSection,
    pub events: EventsSection,
    pub logging: LoggingSection,
    pub server: ServerSection,
    pub metrics: MetricsSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite://./booking.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingSection {
    pub payment_grace_minutes: i64,
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
    pub cancellation_cutoff_minutes: i64,
    pub no_show_grace_minutes: i64,
    pub currency: String,
}

impl Default for BookingSection {
    fn default() -> Self {
        Self {
            payment_grace_minutes: 15,
            min_duration_minutes: 30,
            max_duration_minutes: 480,
            cancellation_cutoff_minutes: 60,
            no_show_grace_minutes: 15,
            currency: "UZS".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// How often overdue PENDING reservations are expired
    pub expiry_interval_secs: u64,
    /// How often checked-in reservations are checked for no-shows
    pub no_show_interval_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            expiry_interval_secs: 15,
            no_show_interval_secs: 60,
            retry_max_attempts: 3,
            retry_initial_delay_ms: 200,
            retry_max_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsSection {
    /// Broadcast buffer per subscriber
    pub capacity: usize,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// trace, debug, info, warn, error or a full EnvFilter directive
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Upper bound for background tasks to stop after a shutdown signal
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub enabled: bool,
    /// Prometheus scrape endpoint
    pub listen: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "127.0.0.1:9464".to_string(),
        }
    }
}

impl AppConfig {
    /// Read and validate a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path, raw).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        let b = &self.booking;

        if self.database.url.trim().is_empty() {
            return invalid("database.url must not be empty");
        }
        if self.database.max_connections == 0 {
            return invalid("database.max_connections must be at least 1");
        }
        if b.payment_grace_minutes <= 0 {
            return invalid("booking.payment_grace_minutes must be positive");
        }
        if b.min_duration_minutes <= 0 || b.max_duration_minutes < b.min_duration_minutes {
            return invalid("booking duration bounds must satisfy 0 < min <= max");
        }
        if b.cancellation_cutoff_minutes < 0 || b.no_show_grace_minutes < 0 {
            return invalid("booking cutoffs must not be negative");
        }
        let minute_fields = [
            ("payment_grace_minutes", b.payment_grace_minutes),
            ("min_duration_minutes", b.min_duration_minutes),
            ("max_duration_minutes", b.max_duration_minutes),
            ("cancellation_cutoff_minutes", b.cancellation_cutoff_minutes),
            ("no_show_grace_minutes", b.no_show_grace_minutes),
        ];
        if let Some((name, _)) = minute_fields
            .iter()
            .find(|(_, value)| *value > MAX_POLICY_MINUTES)
        {
            return Err(ConfigError::Invalid(format!(
                "booking.{} must not exceed {} minutes",
                name, MAX_POLICY_MINUTES
            )));
        }
        if b.currency.trim().is_empty() {
            return invalid("booking.currency must not be empty");
        }
        if self.scheduler.expiry_interval_secs == 0 || self.scheduler.no_show_interval_secs == 0 {
            return invalid("scheduler intervals must be at least 1 second");
        }
        if self.scheduler.retry_max_attempts == 0 {
            return invalid("scheduler.retry_max_attempts must be at least 1");
        }
        if self.events.capacity == 0 {
            return invalid("events.capacity must be at least 1");
        }
        if !matches!(self.logging.format.to_lowercase().as_str(), "pretty" | "json") {
            return invalid("logging.format must be \"pretty\" or \"json\"");
        }
        if self.metrics.enabled && self.metrics.listen.parse::<std::net::SocketAddr>().is_err() {
            return invalid("metrics.listen must be a socket address");
        }
        Ok(())
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
        }
    }

    pub fn booking_policy(&self) -> BookingPolicy {
        let b = &self.booking;
        BookingPolicy {
            payment_grace: policy_minutes(b.payment_grace_minutes),
            min_duration: policy_minutes(b.min_duration_minutes),
            max_duration: policy_minutes(b.max_duration_minutes),
            cancellation_cutoff: policy_minutes(b.cancellation_cutoff_minutes),
            no_show_grace: policy_minutes(b.no_show_grace_minutes),
            default_currency: b.currency.clone(),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        let s = &self.scheduler;
        RetryConfig {
            max_attempts: s.retry_max_attempts,
            initial_delay: Duration::from_millis(s.retry_initial_delay_ms),
            max_delay: Duration::from_millis(s.retry_max_delay_ms.max(s.retry_initial_delay_ms)),
            ..RetryConfig::default()
        }
    }
}

/// Clamped so an unvalidated config cannot overflow `chrono::Duration`.
fn policy_minutes(minutes: i64) -> chrono::Duration {
    chrono::Duration::minutes(minutes.clamp(-MAX_POLICY_MINUTES, MAX_POLICY_MINUTES))
}
