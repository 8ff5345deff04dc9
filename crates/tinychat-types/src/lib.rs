//! Shared domain types for TinyChat.
//!
//! This crate contains the data model shared by the cache and every storage
//! driver: sessions, messages, pagination, change events, configuration and
//! their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod extra;
pub mod id;
pub mod pagination;
