//! Configuration management for the hotel service.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Every variable is optional; malformed values are an error rather than
//! being silently replaced by the default.
//!
//! | Variable | Default |
//! |---|---|
//! | `HOTEL_NODE_ID` | `node-1` |
//! | `HOTEL_LOG_LEVEL` | `info` |
//! | `HOTEL_METRICS_ADDR` | unset (no Prometheus recorder) |
//! | `HOTEL_SHUTDOWN_TIMEOUT_SECS` | `30` |
//! | `HOTEL_MAX_QUEUE_WAIT_MS` | `5000` (`0` waits forever) |
//! | `HOTEL_DEGRADED_QUEUE_DEPTH` | `256` |
//! | `HOTEL_COMMIT_RETRIES` | `3` |
//! | `HOTEL_COMMIT_RETRY_DELAY_MS` | `5` |
//! | `HOTEL_EVENT_BUS_CAPACITY` | `1024` |

use hotel_ops_runtime::{CoordinatorConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue {
        /// Variable name
        var: &'static str,
        /// Offending value
        value: String,
    },
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Node identity and observability
    pub server: ServerConfig,
    /// Coordinator and commit tuning
    pub booking: BookingConfig,
}

/// Node identity and observability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Identifier of this node; names its execution context
    pub node_id: String,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Where the Prometheus scrape endpoint is exposed, if at all
    pub metrics_addr: Option<SocketAddr>,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
}

/// Coordinator and commit tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Longest an operation may wait in its key's queue, 0 = unlimited
    pub max_queue_wait_ms: u64,
    /// Queue depth at which health reports degraded
    pub degraded_queue_depth: usize,
    /// Retries of a commit that lost a compare-and-set race
    pub commit_retries: usize,
    /// Initial backoff between commit retries
    pub commit_retry_delay_ms: u64,
    /// Events buffered per event bus subscriber
    pub event_bus_capacity: usize,
    /// Reservations whose history the audit trail keeps
    pub audit_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: "node-1".to_string(),
            log_level: "info".to_string(),
            metrics_addr: None,
            shutdown_timeout_secs: 30,
        }
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            max_queue_wait_ms: 5_000,
            degraded_queue_depth: 256,
            commit_retries: 3,
            commit_retry_delay_ms: 5,
            event_bus_capacity: 1_024,
            audit_capacity: 10_000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { server: ServerConfig::default(), booking: BookingConfig::default() }
    }
}

impl Config {
    /// Load configuration from the process environment, after reading a
    /// `.env` file if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is malformed or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is malformed or the result is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            server: ServerConfig {
                node_id: lookup("HOTEL_NODE_ID").unwrap_or(defaults.server.node_id),
                log_level: lookup("HOTEL_LOG_LEVEL").unwrap_or(defaults.server.log_level),
                metrics_addr: match lookup("HOTEL_METRICS_ADDR") {
                    Some(value) => Some(parse_value("HOTEL_METRICS_ADDR", &value)?),
                    None => None,
                },
                shutdown_timeout_secs: parse(&lookup, "HOTEL_SHUTDOWN_TIMEOUT_SECS", defaults.server.shutdown_timeout_secs)?,
            },
            booking: BookingConfig {
                max_queue_wait_ms: parse(&lookup, "HOTEL_MAX_QUEUE_WAIT_MS", defaults.booking.max_queue_wait_ms)?,
                degraded_queue_depth: parse(&lookup, "HOTEL_DEGRADED_QUEUE_DEPTH", defaults.booking.degraded_queue_depth)?,
                commit_retries: parse(&lookup, "HOTEL_COMMIT_RETRIES", defaults.booking.commit_retries)?,
                commit_retry_delay_ms: parse(&lookup, "HOTEL_COMMIT_RETRY_DELAY_MS", defaults.booking.commit_retry_delay_ms)?,
                event_bus_capacity: parse(&lookup, "HOTEL_EVENT_BUS_CAPACITY", defaults.booking.event_bus_capacity)?,
                audit_capacity: parse(&lookup, "HOTEL_AUDIT_CAPACITY", defaults.booking.audit_capacity)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a blank node id, a zero
    /// shutdown timeout, or a zero event bus or audit capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.node_id.trim().is_empty() {
            return Err(ConfigError::Validation("node_id must not be blank".to_string()));
        }
        if self.server.shutdown_timeout_secs == 0 {
            return Err(ConfigError::Validation("shutdown_timeout_secs must be > 0".to_string()));
        }
        if self.booking.event_bus_capacity == 0 {
            return Err(ConfigError::Validation("event_bus_capacity must be > 0".to_string()));
        }
        if self.booking.audit_capacity == 0 {
            return Err(ConfigError::Validation("audit_capacity must be > 0".to_string()));
        }
        Ok(())
    }

    /// Graceful shutdown timeout
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Coordinator settings derived from this configuration
    #[must_use]
    pub const fn coordinator_config(&self) -> CoordinatorConfig {
        let base = CoordinatorConfig {
            max_queue_wait: None,
            shutdown_timeout: self.shutdown_timeout(),
            degraded_queue_depth: self.booking.degraded_queue_depth,
        };
        if self.booking.max_queue_wait_ms == 0 {
            base
        } else {
            base.with_max_queue_wait(Duration::from_millis(self.booking.max_queue_wait_ms))
        }
    }

    /// Retry policy for commits that lose a compare-and-set race
    #[must_use]
    pub fn commit_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.booking.commit_retries)
            .initial_delay(Duration::from_millis(self.booking.commit_retry_delay_ms))
            .jitter(0.5)
            .build()
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    lookup(var).map_or(Ok(default), |value| parse_value(var, &value))
}

fn parse_value<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue { var, value: value.to_string() })
}
