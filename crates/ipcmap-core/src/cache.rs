//! Handle-to-pointer cache

use crate::config::{CacheConfig, MismatchPolicy};
use crate::driver::IpcDriver;
use crate::error::{CloseFailure, DriverError, TeardownError};
use crate::guard::DeviceScope;
use crate::handle::{DeviceId, DevicePtr, IpcHandle};
use crate::{Error, Result};
use std::collections::HashMap;

/// An open mapping held by the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    /// Local pointer returned by the driver
    pub ptr: DevicePtr,
    /// Device the mapping was opened on, bound again when it is closed
    pub device_id: DeviceId,
}

/// Operation counters since the cache was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub opens: u64,
    pub hits: u64,
    pub closes: u64,
    pub failed_opens: u64,
    pub failed_closes: u64,
}

/// Cache of IPC handles opened in this process
///
/// Each distinct handle is opened at most once and closed at most once.
/// Dropping the cache closes every mapping it still holds.
pub struct HandleCache<D: IpcDriver, S: DeviceScope> {
    driver: D,
    scope: S,
    config: CacheConfig,
    table: HashMap<IpcHandle, Mapping>,
    stats: CacheStats,
}

impl<D: IpcDriver, S: DeviceScope> HandleCache<D, S> {
    /// Create an empty cache with the default configuration
    pub fn new(driver: D, scope: S) -> Self {
        Self::with_config(driver, scope, CacheConfig::default())
    }

    /// Create an empty cache with the given configuration
    pub fn with_config(driver: D, scope: S, config: CacheConfig) -> Self {
        Self {
            driver,
            scope,
            config,
            table: HashMap::with_capacity(config.initial_capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Number of open mappings
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Check whether `handle` is currently mapped
    pub fn contains(&self, handle: &IpcHandle) -> bool {
        self.table.contains_key(handle)
    }

    /// Get the mapping held for `handle`
    pub fn mapping(&self, handle: &IpcHandle) -> Option<Mapping> {
        self.table.get(handle).copied()
    }

    /// Iterate over the mapped handles, in no particular order
    pub fn handles(&self) -> impl Iterator<Item = &IpcHandle> + '_ {
        self.table.keys()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Get the local pointer for `handle`, opening it on `device_id` on a miss
    ///
    /// A hit returns the cached pointer. When the handle was mapped on another
    /// device the configured [`MismatchPolicy`] decides between returning the
    /// original mapping and failing. A failed open leaves the table untouched.
    pub fn resolve(&mut self, handle: &IpcHandle, device_id: DeviceId) -> Result<DevicePtr> {
        if let Some(mapping) = self.table.get(handle) {
            if mapping.device_id != device_id {
                match self.config.mismatch_policy {
                    MismatchPolicy::Ignore => log::warn!(
                        "{:?} requested on device {} but mapped on device {}, reusing existing mapping",
                        handle,
                        device_id,
                        mapping.device_id
                    ),
                    MismatchPolicy::Reject => {
                        return Err(Error::DeviceMismatch {
                            handle: *handle,
                            requested: device_id,
                            mapped: mapping.device_id,
                        })
                    }
                }
            }
            self.stats.hits += 1;
            return Ok(mapping.ptr);
        }

        let ptr = match Self::open_on(&self.driver, &self.scope, handle, device_id) {
            Ok(ptr) => ptr,
            Err(e) => {
                self.stats.failed_opens += 1;
                return Err(e.into());
            }
        };

        log::debug!("opened {:?} on device {} at {}", handle, device_id, ptr);
        self.table.insert(*handle, Mapping { ptr, device_id });
        self.stats.opens += 1;
        Ok(ptr)
    }

    /// Close the mapping held for `handle`
    ///
    /// Returns `false` when the handle is not mapped. If the driver fails to
    /// close, the entry stays in the table and the error is returned.
    pub fn release(&mut self, handle: &IpcHandle) -> Result<bool> {
        let Some(mapping) = self.table.get(handle).copied() else {
            return Ok(false);
        };

        if let Err(e) = Self::close_on(&self.driver, &self.scope, &mapping) {
            self.stats.failed_closes += 1;
            return Err(e.into());
        }

        self.table.remove(handle);
        self.stats.closes += 1;
        log::debug!("closed {:?} on device {}", handle, mapping.device_id);
        Ok(true)
    }

    /// Close every remaining mapping and consume the cache
    ///
    /// All entries are attempted even if some fail; the failures are
    /// returned together.
    pub fn teardown(mut self) -> std::result::Result<(), TeardownError> {
        self.close_all()
    }

    fn close_all(&mut self) -> std::result::Result<(), TeardownError> {
        let mut failures = Vec::new();

        for (handle, mapping) in self.table.drain() {
            match Self::close_on(&self.driver, &self.scope, &mapping) {
                Ok(()) => self.stats.closes += 1,
                Err(error) => {
                    self.stats.failed_closes += 1;
                    failures.push(CloseFailure {
                        handle,
                        device_id: mapping.device_id,
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TeardownError { failures })
        }
    }

    fn open_on(
        driver: &D,
        scope: &S,
        handle: &IpcHandle,
        device_id: DeviceId,
    ) -> std::result::Result<DevicePtr, DriverError> {
        let _guard = scope.enter(device_id)?;
        driver.open(handle, device_id)
    }

    fn close_on(driver: &D, scope: &S, mapping: &Mapping) -> std::result::Result<(), DriverError> {
        let _guard = scope.enter(mapping.device_id)?;
        driver.close(mapping.ptr)
    }
}

impl<D: IpcDriver, S: DeviceScope> Drop for HandleCache<D, S> {
    fn drop(&mut self) {
        if let Err(e) = self.close_all() {
            for failure in &e.failures {
                log::error!(
                    "failed to close {:?} on device {}: {}",
                    failure.handle,
                    failure.device_id,
                    failure.error
                );
            }
        }
    }
}
