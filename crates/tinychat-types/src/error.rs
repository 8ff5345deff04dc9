use thiserror::Error;

/// Errors raised by storage drivers for backend faults.
///
/// Ordinary not-found or no-op outcomes are not errors: drivers report those
/// as `None`, `false` or an empty page.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The backend could not be reached (closed or exhausted pool, I/O).
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),
}

/// Errors surfaced by the session cache and registry.
///
/// Only configuration faults and malformed stored data are raised; every
/// persistence failure is reported as a value instead.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The configured active driver name has no registered driver.
    #[error("no storage driver registered under '{0}'")]
    DriverNotFound(String),

    /// A stored `extra` payload is not valid JSON.
    #[error("malformed extra data on {entity} '{id}': {source}")]
    MalformedExtra {
        entity: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ChatError {
    pub fn malformed_extra(
        entity: &'static str,
        id: impl Into<String>,
        source: serde_json::Error,
    ) -> Self {
        Self::MalformedExtra {
            entity,
            id: id.into(),
            source,
        }
    }

    /// Whether this is a configuration error (as opposed to bad data).
    pub fn is_config(&self) -> bool {
        matches!(self, Self::DriverNotFound(_))
    }
}
