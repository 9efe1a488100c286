//! ipcmap - Process-local cache of cross-process GPU memory mappings
//!
//! Maps opaque IPC handles exported by other processes to device pointers
//! valid in this process, opening each handle at most once.

pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
pub mod guard;
pub mod handle;
pub mod sync;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use cache::{CacheStats, HandleCache, Mapping};
pub use config::{CacheConfig, MismatchPolicy, DEFAULT_CAPACITY};
pub use driver::IpcDriver;
pub use error::{CloseFailure, DriverError, DriverOp, Error, Result, TeardownError};
pub use guard::{DeviceScope, NoopScope};
pub use handle::{DeviceId, DevicePtr, IpcHandle, IPC_HANDLE_SIZE};
pub use sync::SharedHandleCache;

#[cfg(feature = "cuda")]
pub use cuda::{CudaContextGuard, CudaDeviceScope, CudaDriver};
