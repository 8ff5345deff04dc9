//! Change notification: a synchronous topic emitter plus a broadcast bus
//! for async consumers.

pub mod bus;
pub mod emitter;

pub use bus::EventBus;
pub use emitter::{EventEmitter, SubscriptionId};
