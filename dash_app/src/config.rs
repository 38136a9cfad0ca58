use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "DASHBOARD_";

pub const DEFAULT_HN_COUNT: usize = 10;
pub const MAX_HN_COUNT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Prod,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Service configuration. Every field can be overridden with a
/// `DASHBOARD_`-prefixed environment variable, e.g. `DASHBOARD_WIDGET_TTL_SECS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub env: Environment,
    pub addr: String,

    pub weather_lat: f64,
    pub weather_lon: f64,
    pub weather_hours: u32,
    pub weather_location: String,

    pub hn_count: usize,

    pub widget_ttl_secs: u64,
    pub fetch_concurrency: usize,
    pub fetch_timeout_secs: u64,

    pub http_retries: u32,
    pub http_backoff_ms: u64,
    pub user_agent: String,

    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: Environment::Dev,
            addr: "0.0.0.0:8080".to_string(),
            weather_lat: 38.947_654,
            weather_lon: -76.476_169,
            weather_hours: 6,
            weather_location: "Annapolis, MD".to_string(),
            hn_count: DEFAULT_HN_COUNT,
            widget_ttl_secs: 300,
            fetch_concurrency: 8,
            fetch_timeout_secs: 20,
            http_retries: 2,
            http_backoff_ms: 250,
            user_agent: "dashboard/0.1".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Defaults overlaid with `DASHBOARD_*` environment variables.
    #[must_use]
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// # Errors
    ///
    /// Fails when a value cannot be parsed or is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    /// # Errors
    ///
    /// Fails when a value cannot be parsed or is out of range.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first field found out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-90.0..=90.0).contains(&self.weather_lat) {
            return Err(invalid("weather_lat", "must be within [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&self.weather_lon) {
            return Err(invalid("weather_lon", "must be within [-180, 180]"));
        }
        if !(1..=72).contains(&self.weather_hours) {
            return Err(invalid("weather_hours", "must be between 1 and 72"));
        }
        if self.fetch_concurrency == 0 {
            return Err(invalid("fetch_concurrency", "must be at least 1"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(invalid("fetch_timeout_secs", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    #[must_use]
    pub const fn widget_ttl(&self) -> Duration {
        Duration::from_secs(self.widget_ttl_secs)
    }

    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    #[must_use]
    pub const fn http_backoff(&self) -> Duration {
        Duration::from_millis(self.http_backoff_ms)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Number of stories for the Hacker News widget, at most
    /// [`MAX_HN_COUNT`]. Zero falls back to [`DEFAULT_HN_COUNT`].
    #[must_use]
    pub fn hn_count(&self) -> usize {
        match self.hn_count {
            0 => DEFAULT_HN_COUNT,
            count => count.min(MAX_HN_COUNT),
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
