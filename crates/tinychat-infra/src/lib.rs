//! Infrastructure layer for TinyChat.
//!
//! Contains the SQLite implementation of the `ChatStorageDriver` port from
//! `tinychat-core`, configuration loading from the data directory, and the
//! bootstrap that wires both into a ready `SessionRegistry`.

pub mod bootstrap;
pub mod config;
pub mod sqlite;
