//! CUDA driver backend

use crate::cache::HandleCache;
use crate::driver::IpcDriver;
use crate::error::{DriverError, DriverOp};
use crate::guard::DeviceScope;
use crate::handle::{DeviceId, DevicePtr, IpcHandle, IPC_HANDLE_SIZE};
use crate::Result;
use cudarc::driver::sys;
use std::marker::PhantomData;

fn check(op: DriverOp, call: &str, result: sys::CUresult) -> std::result::Result<(), DriverError> {
    if result != sys::CUresult::CUDA_SUCCESS {
        return Err(DriverError::new(
            op,
            result as i32,
            format!("{} failed: {:?}", call, result),
        ));
    }
    Ok(())
}

fn to_raw_handle(handle: &IpcHandle) -> sys::CUipcMemHandle {
    let mut raw = sys::CUipcMemHandle {
        reserved: [0; IPC_HANDLE_SIZE],
    };
    for (dst, src) in raw.reserved.iter_mut().zip(handle.as_bytes()) {
        *dst = *src as _;
    }
    raw
}

/// IPC primitives of the CUDA driver API
#[derive(Debug)]
pub struct CudaDriver {
    flags: u32,
}

impl CudaDriver {
    /// Initialize the driver API
    pub fn new() -> std::result::Result<Self, DriverError> {
        unsafe {
            check(DriverOp::Init, "cuInit", sys::cuInit(0))?;
        }
        Ok(Self {
            flags: sys::CUipcMem_flags::CU_IPC_MEM_LAZY_ENABLE_PEER_ACCESS as u32,
        })
    }
}

impl IpcDriver for CudaDriver {
    fn open(&self, handle: &IpcHandle, _device_id: DeviceId) -> std::result::Result<DevicePtr, DriverError> {
        let mut ptr: sys::CUdeviceptr = 0;
        unsafe {
            check(
                DriverOp::Open,
                "cuIpcOpenMemHandle",
                sys::cuIpcOpenMemHandle_v2(&mut ptr, to_raw_handle(handle), self.flags),
            )?;
        }
        Ok(DevicePtr::new(ptr as u64))
    }

    fn close(&self, ptr: DevicePtr) -> std::result::Result<(), DriverError> {
        unsafe {
            check(
                DriverOp::Close,
                "cuIpcCloseMemHandle",
                sys::cuIpcCloseMemHandle(ptr.as_raw() as sys::CUdeviceptr),
            )
        }
    }
}

/// Binds a device's primary context to the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct CudaDeviceScope;

/// Primary context pushed by [`CudaDeviceScope::enter`]
///
/// Popped and released on drop. Context stacks are per thread, so the
/// guard cannot leave the thread that created it.
pub struct CudaContextGuard {
    device: sys::CUdevice,
    device_id: DeviceId,
    _not_send: PhantomData<*const ()>,
}

impl DeviceScope for CudaDeviceScope {
    type Guard<'a> = CudaContextGuard;

    fn enter(&self, device_id: DeviceId) -> std::result::Result<Self::Guard<'_>, DriverError> {
        let mut device: sys::CUdevice = 0;
        let mut context: sys::CUcontext = std::ptr::null_mut();

        unsafe {
            check(DriverOp::Bind, "cuDeviceGet", sys::cuDeviceGet(&mut device, device_id))?;
            check(
                DriverOp::Bind,
                "cuDevicePrimaryCtxRetain",
                sys::cuDevicePrimaryCtxRetain(&mut context, device),
            )?;
            if let Err(e) = check(DriverOp::Bind, "cuCtxPushCurrent", sys::cuCtxPushCurrent_v2(context)) {
                let _ = sys::cuDevicePrimaryCtxRelease_v2(device);
                return Err(e);
            }
        }

        Ok(CudaContextGuard {
            device,
            device_id,
            _not_send: PhantomData,
        })
    }
}

impl Drop for CudaContextGuard {
    fn drop(&mut self) {
        let mut popped: sys::CUcontext = std::ptr::null_mut();
        unsafe {
            if let Err(e) = check(DriverOp::Bind, "cuCtxPopCurrent", sys::cuCtxPopCurrent_v2(&mut popped)) {
                log::warn!("failed to restore context after device {}: {}", self.device_id, e);
            }
            if let Err(e) = check(
                DriverOp::Bind,
                "cuDevicePrimaryCtxRelease",
                sys::cuDevicePrimaryCtxRelease_v2(self.device),
            ) {
                log::warn!("failed to release primary context of device {}: {}", self.device_id, e);
            }
        }
    }
}

impl HandleCache<CudaDriver, CudaDeviceScope> {
    /// Create a cache backed by the CUDA driver API
    pub fn cuda() -> Result<Self> {
        Ok(Self::new(CudaDriver::new()?, CudaDeviceScope))
    }
}

/// Export an IPC handle for device memory allocated in this process
///
/// The context owning `ptr` must be current on the calling thread.
pub fn export_handle(ptr: u64) -> std::result::Result<IpcHandle, DriverError> {
    let mut raw = sys::CUipcMemHandle {
        reserved: [0; IPC_HANDLE_SIZE],
    };
    unsafe {
        check(
            DriverOp::Export,
            "cuIpcGetMemHandle",
            sys::cuIpcGetMemHandle(&mut raw, ptr as sys::CUdeviceptr),
        )?;
    }

    let mut bytes = [0u8; IPC_HANDLE_SIZE];
    for (dst, src) in bytes.iter_mut().zip(raw.reserved.iter()) {
        *dst = *src as u8;
    }
    Ok(IpcHandle::from_bytes(bytes))
}
