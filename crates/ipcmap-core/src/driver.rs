//! Driver capability consumed by the cache

use crate::error::DriverError;
use crate::handle::{DeviceId, DevicePtr, IpcHandle};

/// IPC mapping primitives of a device driver
///
/// Both calls are made while the matching device context is bound
/// (see [`DeviceScope`](crate::guard::DeviceScope)).
pub trait IpcDriver {
    /// Map the memory behind `handle` into this process on `device_id`
    fn open(&self, handle: &IpcHandle, device_id: DeviceId) -> Result<DevicePtr, DriverError>;

    /// Unmap a pointer previously returned by [`IpcDriver::open`]
    fn close(&self, ptr: DevicePtr) -> Result<(), DriverError>;
}

impl<T: IpcDriver + ?Sized> IpcDriver for &T {
    fn open(&self, handle: &IpcHandle, device_id: DeviceId) -> Result<DevicePtr, DriverError> {
        (**self).open(handle, device_id)
    }

    fn close(&self, ptr: DevicePtr) -> Result<(), DriverError> {
        (**self).close(ptr)
    }
}

impl<T: IpcDriver + ?Sized> IpcDriver for Box<T> {
    fn open(&self, handle: &IpcHandle, device_id: DeviceId) -> Result<DevicePtr, DriverError> {
        (**self).open(handle, device_id)
    }

    fn close(&self, ptr: DevicePtr) -> Result<(), DriverError> {
        (**self).close(ptr)
    }
}
