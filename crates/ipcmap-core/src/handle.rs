//! IPC handle and device pointer types

use crate::{Error, Result};
use std::fmt;

/// CUDA IPC handle size (64 bytes, defined by NVIDIA)
pub const IPC_HANDLE_SIZE: usize = 64;

/// Device ordinal, as used by the CUDA driver
pub type DeviceId = i32;

/// Opaque IPC memory handle exported by another process
///
/// Compared and hashed byte-wise; the contents are never interpreted.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct IpcHandle {
    reserved: [u8; IPC_HANDLE_SIZE],
}

impl IpcHandle {
    pub const fn from_bytes(bytes: [u8; IPC_HANDLE_SIZE]) -> Self {
        Self { reserved: bytes }
    }

    pub fn as_bytes(&self) -> &[u8; IPC_HANDLE_SIZE] {
        &self.reserved
    }
}

impl Default for IpcHandle {
    fn default() -> Self {
        Self {
            reserved: [0u8; IPC_HANDLE_SIZE],
        }
    }
}

impl fmt::Debug for IpcHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IpcHandle({:02x?}...)", &self.reserved[..8])
    }
}

impl From<[u8; IPC_HANDLE_SIZE]> for IpcHandle {
    fn from(bytes: [u8; IPC_HANDLE_SIZE]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl TryFrom<&[u8]> for IpcHandle {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let reserved = bytes.try_into().map_err(|_| Error::InvalidHandleLength {
            expected: IPC_HANDLE_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self { reserved })
    }
}

/// Device pointer valid in this process's address space
///
/// Never dereferenced by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevicePtr(u64);

impl DevicePtr {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_handle_equality_is_bytewise() {
        let mut bytes = [7u8; IPC_HANDLE_SIZE];
        let a = IpcHandle::from_bytes(bytes);
        let b = IpcHandle::from(bytes);
        bytes[63] = 8;
        let c = IpcHandle::from_bytes(bytes);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_handle_from_slice() {
        let bytes = vec![3u8; IPC_HANDLE_SIZE];
        let handle = IpcHandle::try_from(bytes.as_slice()).unwrap();
        assert_eq!(handle.as_bytes(), &[3u8; IPC_HANDLE_SIZE]);

        let err = IpcHandle::try_from(&bytes[..10]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidHandleLength {
                expected: IPC_HANDLE_SIZE,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_handle_debug_is_truncated() {
        let handle = IpcHandle::default();
        assert_eq!(format!("{:?}", handle), "IpcHandle([00, 00, 00, 00, 00, 00, 00, 00]...)");
    }

    #[test]
    fn test_device_ptr() {
        let ptr = DevicePtr::new(0x7f00_0000);
        assert_eq!(ptr.as_raw(), 0x7f00_0000);
        assert_eq!(ptr.to_string(), "0x7f000000");
        assert!(!ptr.is_null());
        assert!(DevicePtr::new(0).is_null());
    }
}
