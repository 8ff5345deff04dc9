//! Configuration types for TinyChat.
//!
//! `ChatConfig` represents the `tinychat.toml` file that selects the active
//! storage driver, the default sort directions, the event channel capacity
//! and logging output. Every field has a default, so an empty file is valid.

use serde::{Deserialize, Serialize};

use crate::pagination::SortDirection;

/// Name under which the in-memory driver is always registered.
pub const DEFAULT_DRIVER_NAME: &str = "memory";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub sort: SortConfig,

    #[serde(default)]
    pub events: EventConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage driver selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Name of the active driver.
    #[serde(default = "default_driver")]
    pub driver: String,

    /// SQLite database URL. When set, a SQLite driver is registered as `"sqlite"`.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Read connections opened next to the single SQLite writer.
    #[serde(default = "default_max_readers")]
    pub max_readers: u32,
}

fn default_driver() -> String {
    DEFAULT_DRIVER_NAME.to_string()
}

fn default_max_readers() -> u32 {
    8
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            database_url: None,
            max_readers: default_max_readers(),
        }
    }
}

/// Default sort directions for resident views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortConfig {
    #[serde(default)]
    pub sessions: SortDirection,

    #[serde(default)]
    pub messages: SortDirection,
}

/// Event broadcast settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Capacity of the broadcast channel behind `subscribe_events()`.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

/// Logging output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// Bridge spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
            otel: false,
        }
    }
}
