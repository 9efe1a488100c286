//! Thread-safe wrapper around [`HandleCache`]

use crate::cache::{CacheStats, HandleCache, Mapping};
use crate::driver::IpcDriver;
use crate::error::TeardownError;
use crate::guard::DeviceScope;
use crate::handle::{DeviceId, DevicePtr, IpcHandle};
use crate::Result;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Handle cache shared between threads
///
/// Every operation holds one lock for its whole duration, device binding
/// included, so two callers never rebind the device concurrently.
pub struct SharedHandleCache<D: IpcDriver, S: DeviceScope> {
    inner: Mutex<HandleCache<D, S>>,
}

impl<D: IpcDriver, S: DeviceScope> SharedHandleCache<D, S> {
    pub fn new(cache: HandleCache<D, S>) -> Self {
        Self {
            inner: Mutex::new(cache),
        }
    }

    // The table is only mutated after a driver call succeeds, so a panic
    // while the lock is held cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, HandleCache<D, S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`HandleCache::resolve`]
    pub fn resolve(&self, handle: &IpcHandle, device_id: DeviceId) -> Result<DevicePtr> {
        self.lock().resolve(handle, device_id)
    }

    /// See [`HandleCache::release`]
    pub fn release(&self, handle: &IpcHandle) -> Result<bool> {
        self.lock().release(handle)
    }

    pub fn contains(&self, handle: &IpcHandle) -> bool {
        self.lock().contains(handle)
    }

    pub fn mapping(&self, handle: &IpcHandle) -> Option<Mapping> {
        self.lock().mapping(handle)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }

    pub fn into_inner(self) -> HandleCache<D, S> {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`HandleCache::teardown`]
    pub fn teardown(self) -> std::result::Result<(), TeardownError> {
        self.into_inner().teardown()
    }
}

impl<D: IpcDriver, S: DeviceScope> From<HandleCache<D, S>> for SharedHandleCache<D, S> {
    fn from(cache: HandleCache<D, S>) -> Self {
        Self::new(cache)
    }
}
