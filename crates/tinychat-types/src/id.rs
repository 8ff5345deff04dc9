//! Identifier and timestamp helpers.
//!
//! Ids are prefixed UUID v7 strings, so locally generated temporary ids and
//! driver-assigned ids share one opaque string space.

use uuid::Uuid;

/// Generate a fresh session id (`session-<uuid>`).
pub fn new_session_id() -> String {
    format!("session-{}", Uuid::now_v7().simple())
}

/// Generate a fresh message id (`message-<uuid>`).
pub fn new_message_id() -> String {
    format!("message-{}", Uuid::now_v7().simple())
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
