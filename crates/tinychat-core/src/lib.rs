//! Session cache and storage driver contract for TinyChat.
//!
//! This crate defines the storage "port" (`ChatStorageDriver`) and the cache
//! that keeps sessions and messages synchronized with whichever driver is
//! active. It depends only on `tinychat-types` -- never on `tinychat-infra`
//! or any database/IO crate. The in-memory reference driver lives here
//! because the driver registry is always seeded with it.

pub mod chat;
pub mod event;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use chat::{SessionCache, SessionHooks, SessionRegistry};
pub use event::{EventBus, EventEmitter, SubscriptionId};
pub use storage::{BoxChatStorageDriver, ChatStorageDriver, DriverRegistry, MemoryDriver};
