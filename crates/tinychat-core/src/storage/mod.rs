//! Storage driver contract, dynamic dispatch wrapper, reference in-memory
//! driver and the name-indexed driver registry.

pub mod box_driver;
pub mod driver;
pub mod memory;
pub mod registry;

pub use box_driver::BoxChatStorageDriver;
pub use driver::ChatStorageDriver;
pub use memory::MemoryDriver;
pub use registry::DriverRegistry;
