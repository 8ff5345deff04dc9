//! Session cache and the registry that owns resident sessions.

pub mod merge;
pub mod registry;
pub mod session;

pub use registry::SessionRegistry;
pub use session::{SessionCache, SessionHooks};

use tinychat_types::error::RepositoryError;
use tracing::warn;

/// Collapse a driver result into its value, treating `Err` like the
/// failure value (`None`, `false` or an empty page).
pub(crate) fn settle<T: Default>(op: &'static str, result: Result<T, RepositoryError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(op, error = %err, "storage driver call failed");
            T::default()
        }
    }
}
