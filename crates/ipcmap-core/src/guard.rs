//! RAII device context scope

use crate::error::DriverError;
use crate::handle::DeviceId;

/// Binds the calling thread to a device for the lifetime of a guard
///
/// Implementations must restore the previously bound device when the guard
/// is dropped, whatever the exit path.
pub trait DeviceScope {
    /// Guard holding the binding
    type Guard<'a>
    where
        Self: 'a;

    /// Bind `device_id` until the returned guard is dropped
    fn enter(&self, device_id: DeviceId) -> Result<Self::Guard<'_>, DriverError>;
}

/// Scope for drivers without per-thread device state
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScope;

impl DeviceScope for NoopScope {
    type Guard<'a> = ();

    fn enter(&self, _device_id: DeviceId) -> Result<Self::Guard<'_>, DriverError> {
        Ok(())
    }
}
