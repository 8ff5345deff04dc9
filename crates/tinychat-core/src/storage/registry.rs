//! Driver registry for runtime storage selection.
//!
//! A name-indexed registry of boxed storage drivers plus the name of the
//! active one. Always carries a `MemoryDriver` under `"memory"`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tinychat_types::config::{DEFAULT_DRIVER_NAME, StorageConfig};
use tinychat_types::error::ChatError;
use tracing::debug;

use super::box_driver::BoxChatStorageDriver;
use super::driver::ChatStorageDriver;
use super::memory::MemoryDriver;

struct DriverTable {
    drivers: HashMap<String, BoxChatStorageDriver>,
    active: String,
}

/// Registry of storage drivers, indexed by name, with one active selection.
///
/// Selecting a name does not validate it; an unknown name only surfaces as
/// `ChatError::DriverNotFound` when a storage operation resolves the driver.
pub struct DriverRegistry {
    table: RwLock<DriverTable>,
}

impl DriverRegistry {
    /// Create a registry seeded with the memory driver, selecting
    /// `config.driver` as active.
    pub fn new(config: &StorageConfig) -> Self {
        let mut drivers = HashMap::new();
        drivers.insert(
            DEFAULT_DRIVER_NAME.to_string(),
            BoxChatStorageDriver::new(MemoryDriver::new(DEFAULT_DRIVER_NAME)),
        );
        Self {
            table: RwLock::new(DriverTable {
                drivers,
                active: config.driver.clone(),
            }),
        }
    }

    /// Register a driver under its own name.
    ///
    /// If a driver with this name already exists, it is replaced.
    pub fn register_driver<T: ChatStorageDriver + 'static>(&self, driver: T) {
        self.register_boxed(BoxChatStorageDriver::new(driver));
    }

    /// Register an already boxed driver under its own name.
    pub fn register_boxed(&self, driver: BoxChatStorageDriver) {
        let name = driver.name().to_string();
        debug!(driver = %name, "registered storage driver");
        self.write().drivers.insert(name, driver);
    }

    /// Select the active driver by name.
    pub fn configure_active(&self, name: impl Into<String>) {
        let name = name.into();
        debug!(driver = %name, "selected storage driver");
        self.write().active = name;
    }

    /// Name of the currently selected driver.
    pub fn active_name(&self) -> String {
        self.read().active.clone()
    }

    /// List all registered driver names, sorted.
    pub fn driver_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().drivers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up a driver by name.
    pub fn get(&self, name: &str) -> Option<BoxChatStorageDriver> {
        self.read().drivers.get(name).cloned()
    }

    /// Resolve the active driver.
    ///
    /// Fails with `ChatError::DriverNotFound` when the selected name has no
    /// registered driver. No I/O happens here.
    pub fn resolve_active(&self) -> Result<BoxChatStorageDriver, ChatError> {
        let table = self.read();
        table
            .drivers
            .get(&table.active)
            .cloned()
            .ok_or_else(|| ChatError::DriverNotFound(table.active.clone()))
    }

    fn read(&self) -> RwLockReadGuard<'_, DriverTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DriverTable> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new(&StorageConfig::default())
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("active", &self.active_name())
            .field("drivers", &self.driver_names())
            .finish()
    }
}
