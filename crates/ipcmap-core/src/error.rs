//! Error types for ipcmap

use crate::handle::{DeviceId, IpcHandle};
use std::fmt;
use thiserror::Error;

/// Driver call that produced a [`DriverError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverOp {
    /// Opening a mapping for an IPC handle
    Open,
    /// Closing a previously opened mapping
    Close,
    /// Binding the calling thread to a device context
    Bind,
    /// Initializing the driver
    Init,
    /// Exporting an IPC handle for local device memory
    Export,
}

impl fmt::Display for DriverOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverOp::Open => write!(f, "open"),
            DriverOp::Close => write!(f, "close"),
            DriverOp::Bind => write!(f, "bind"),
            DriverOp::Init => write!(f, "init"),
            DriverOp::Export => write!(f, "export"),
        }
    }
}

/// Failure reported by the underlying device driver
///
/// The code is the driver's native result code and is never interpreted here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("driver {op} failed with code {code}: {message}")]
pub struct DriverError {
    pub op: DriverOp,
    pub code: i32,
    pub message: String,
}

impl DriverError {
    pub fn new(op: DriverOp, code: i32, message: impl Into<String>) -> Self {
        Self {
            op,
            code,
            message: message.into(),
        }
    }
}

/// A mapping that could not be closed during teardown
#[derive(Debug, Clone)]
pub struct CloseFailure {
    pub handle: IpcHandle,
    pub device_id: DeviceId,
    pub error: DriverError,
}

/// Every close failure collected while tearing a cache down
#[derive(Error, Debug, Clone)]
#[error("{} mapping(s) failed to close during teardown", .failures.len())]
pub struct TeardownError {
    pub failures: Vec<CloseFailure>,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("handle {handle:?} is mapped on device {mapped}, requested device {requested}")]
    DeviceMismatch {
        handle: IpcHandle,
        requested: DeviceId,
        mapped: DeviceId,
    },

    #[error("invalid handle length: expected {expected} bytes, got {actual}")]
    InvalidHandleLength { expected: usize, actual: usize },

    #[error(transparent)]
    Teardown(#[from] TeardownError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::new(DriverOp::Open, 400, "invalid handle");
        assert_eq!(err.to_string(), "driver open failed with code 400: invalid handle");

        let err: Error = err.into();
        assert!(matches!(err, Error::Driver(DriverError { op: DriverOp::Open, code: 400, .. })));
    }

    #[test]
    fn test_driver_op_names() {
        let err = DriverError::new(DriverOp::Init, 100, "no device");
        assert_eq!(err.to_string(), "driver init failed with code 100: no device");
        let err = DriverError::new(DriverOp::Export, 1, "invalid value");
        assert_eq!(err.to_string(), "driver export failed with code 1: invalid value");
    }

    #[test]
    fn test_teardown_error_counts_failures() {
        let failure = CloseFailure {
            handle: IpcHandle::default(),
            device_id: 1,
            error: DriverError::new(DriverOp::Close, 1, "busy"),
        };
        let err = TeardownError {
            failures: vec![failure.clone(), failure],
        };
        assert_eq!(err.to_string(), "2 mapping(s) failed to close during teardown");
    }
}
