//! Python bindings for ipcmap

use ipcmap_core::{
    DeviceId, DevicePtr, DeviceScope, DriverError, DriverOp, HandleCache as CoreCache, IpcDriver,
    IpcHandle,
};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;

#[cfg(feature = "cuda")]
use ipcmap_core::{CudaDeviceScope, CudaDriver};

/// Convert ipcmap error to Python exception
fn to_py_err(e: ipcmap_core::Error) -> PyErr {
    match e {
        ipcmap_core::Error::InvalidHandleLength { .. } => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

/// Convert a Python exception raised by the backend to a driver error
///
/// Uses the exception's integer `code` attribute when present.
fn backend_err(py: Python<'_>, op: DriverOp, e: PyErr) -> DriverError {
    let code = e
        .value(py)
        .getattr("code")
        .and_then(|code| code.extract::<i32>())
        .unwrap_or(-1);
    DriverError::new(op, code, e.to_string())
}

/// Driver implemented by a Python object
///
/// The object provides `open(handle: bytes, device: int) -> int` and
/// `close(ptr: int)`.
struct PyDriver {
    backend: PyObject,
}

impl IpcDriver for PyDriver {
    fn open(&self, handle: &IpcHandle, device_id: DeviceId) -> Result<DevicePtr, DriverError> {
        Python::with_gil(|py| {
            let bytes = PyBytes::new(py, handle.as_bytes());
            self.backend
                .call_method1(py, "open", (bytes, device_id))
                .and_then(|ptr| ptr.extract::<u64>(py))
                .map(DevicePtr::new)
                .map_err(|e| backend_err(py, DriverOp::Open, e))
        })
    }

    fn close(&self, ptr: DevicePtr) -> Result<(), DriverError> {
        Python::with_gil(|py| {
            self.backend
                .call_method1(py, "close", (ptr.as_raw(),))
                .map(|_| ())
                .map_err(|e| backend_err(py, DriverOp::Close, e))
        })
    }
}

/// Device scope implemented by a Python object
///
/// The object provides `current_device() -> int` and `set_device(device: int)`.
struct PyScope {
    backend: PyObject,
}

/// Restores the device that was current before `enter`
struct PyScopeGuard<'a> {
    scope: &'a PyScope,
    previous: DeviceId,
}

impl DeviceScope for PyScope {
    type Guard<'a> = PyScopeGuard<'a>;

    fn enter(&self, device_id: DeviceId) -> Result<Self::Guard<'_>, DriverError> {
        Python::with_gil(|py| {
            let previous = self
                .backend
                .call_method0(py, "current_device")
                .and_then(|device| device.extract::<DeviceId>(py))
                .map_err(|e| backend_err(py, DriverOp::Bind, e))?;
            self.backend
                .call_method1(py, "set_device", (device_id,))
                .map_err(|e| backend_err(py, DriverOp::Bind, e))?;
            Ok(PyScopeGuard {
                scope: self,
                previous,
            })
        })
    }
}

impl Drop for PyScopeGuard<'_> {
    fn drop(&mut self) {
        Python::with_gil(|py| {
            if let Err(e) = self
                .scope
                .backend
                .call_method1(py, "set_device", (self.previous,))
            {
                log::warn!("failed to restore device {}: {}", self.previous, e);
            }
        });
    }
}

enum Backend {
    Python(CoreCache<PyDriver, PyScope>),
    #[cfg(feature = "cuda")]
    Cuda(CoreCache<CudaDriver, CudaDeviceScope>),
}

macro_rules! dispatch {
    ($backend:expr, $cache:ident => $body:expr) => {
        match $backend {
            Backend::Python($cache) => $body,
            #[cfg(feature = "cuda")]
            Backend::Cuda($cache) => $body,
        }
    };
}

/// Python wrapper for HandleCache
///
/// Closes every mapping still open when it is garbage collected
#[pyclass(unsendable)]
struct HandleCache {
    backend: Option<Backend>,
}

impl HandleCache {
    fn backend(&self) -> PyResult<&Backend> {
        self.backend
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("handle cache already torn down"))
    }

    fn backend_mut(&mut self) -> PyResult<&mut Backend> {
        self.backend
            .as_mut()
            .ok_or_else(|| PyRuntimeError::new_err("handle cache already torn down"))
    }
}

#[pymethods]
impl HandleCache {
    /// Create a cache driven by a Python backend object
    #[new]
    fn new(py: Python<'_>, backend: PyObject) -> Self {
        let driver = PyDriver {
            backend: backend.clone_ref(py),
        };
        let scope = PyScope { backend };
        Self {
            backend: Some(Backend::Python(CoreCache::new(driver, scope))),
        }
    }

    /// Create a cache backed by the CUDA driver API
    #[cfg(feature = "cuda")]
    #[staticmethod]
    fn cuda() -> PyResult<Self> {
        let cache = CoreCache::cuda().map_err(to_py_err)?;
        Ok(Self {
            backend: Some(Backend::Cuda(cache)),
        })
    }

    /// Get the local device pointer for an IPC handle
    fn resolve(&mut self, handle: &[u8], device_id: DeviceId) -> PyResult<u64> {
        let handle = IpcHandle::try_from(handle).map_err(to_py_err)?;
        let ptr = dispatch!(self.backend_mut()?, cache => cache.resolve(&handle, device_id))
            .map_err(to_py_err)?;
        Ok(ptr.as_raw())
    }

    /// Close the mapping for an IPC handle, returns False if not mapped
    fn release(&mut self, handle: &[u8]) -> PyResult<bool> {
        let handle = IpcHandle::try_from(handle).map_err(to_py_err)?;
        dispatch!(self.backend_mut()?, cache => cache.release(&handle)).map_err(to_py_err)
    }

    /// Close every remaining mapping
    fn teardown(&mut self) -> PyResult<()> {
        let backend = self
            .backend
            .take()
            .ok_or_else(|| PyRuntimeError::new_err("handle cache already torn down"))?;
        dispatch!(backend, cache => cache.teardown())
            .map_err(|e| to_py_err(e.into()))
    }

    fn __len__(&self) -> PyResult<usize> {
        Ok(dispatch!(self.backend()?, cache => cache.len()))
    }

    fn __contains__(&self, handle: &[u8]) -> PyResult<bool> {
        let handle = IpcHandle::try_from(handle).map_err(to_py_err)?;
        Ok(dispatch!(self.backend()?, cache => cache.contains(&handle)))
    }
}

#[pymodule]
fn ipcmap(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<HandleCache>()?;
    m.add("IPC_HANDLE_SIZE", ipcmap_core::IPC_HANDLE_SIZE)?;
    Ok(())
}
