//! Recording mock driver shared by the cache tests

#![allow(dead_code)]

use ipcmap_core::{
    DeviceId, DevicePtr, DeviceScope, DriverError, DriverOp, IpcDriver, IpcHandle, IPC_HANDLE_SIZE,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
pub struct MockState {
    next_ptr: u64,
    /// Currently bound device, `None` outside any scope
    bound: Option<DeviceId>,
    /// (handle, device argument, device bound during the call)
    pub opens: Vec<(IpcHandle, DeviceId, Option<DeviceId>)>,
    /// (pointer, device bound during the call)
    pub closes: Vec<(DevicePtr, Option<DeviceId>)>,
    /// Devices passed to `enter`, in call order
    pub scopes: Vec<DeviceId>,
    pub fail_open: HashSet<IpcHandle>,
    pub fail_close: HashSet<DevicePtr>,
    pub fail_bind: HashSet<DeviceId>,
    /// Handles whose open panics instead of returning
    pub panic_open: HashSet<IpcHandle>,
}

/// Shared view over what the mock driver and scope recorded
#[derive(Clone, Default)]
pub struct Recorder {
    state: Arc<Mutex<MockState>>,
}

impl Recorder {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn open_count(&self) -> usize {
        self.state().opens.len()
    }

    pub fn close_count(&self) -> usize {
        self.state().closes.len()
    }

    pub fn bound(&self) -> Option<DeviceId> {
        self.state().bound
    }

    pub fn fail_open(&self, handle: IpcHandle) {
        self.state().fail_open.insert(handle);
    }

    pub fn fail_close(&self, ptr: DevicePtr) {
        self.state().fail_close.insert(ptr);
    }

    pub fn fail_bind(&self, device_id: DeviceId) {
        self.state().fail_bind.insert(device_id);
    }

    pub fn panic_open(&self, handle: IpcHandle) {
        self.state().panic_open.insert(handle);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.panic_open.clear();
        state.fail_open.clear();
        state.fail_close.clear();
        state.fail_bind.clear();
    }
}

pub struct MockDriver {
    recorder: Recorder,
}

impl IpcDriver for MockDriver {
    fn open(&self, handle: &IpcHandle, device_id: DeviceId) -> Result<DevicePtr, DriverError> {
        let mut state = self.recorder.state();
        let bound = state.bound;
        state.opens.push((*handle, device_id, bound));
        if state.panic_open.contains(handle) {
            // unlock first so the recorder stays usable after unwinding
            drop(state);
            panic!("driver panicked opening {:?}", handle);
        }
        if state.fail_open.contains(handle) {
            return Err(DriverError::new(DriverOp::Open, 400, "invalid handle"));
        }
        state.next_ptr += 0x1000;
        Ok(DevicePtr::new(state.next_ptr))
    }

    fn close(&self, ptr: DevicePtr) -> Result<(), DriverError> {
        let mut state = self.recorder.state();
        let bound = state.bound;
        state.closes.push((ptr, bound));
        if state.fail_close.contains(&ptr) {
            return Err(DriverError::new(DriverOp::Close, 1, "invalid value"));
        }
        Ok(())
    }
}

pub struct MockScope {
    recorder: Recorder,
}

/// Restores the previously bound device on drop
pub struct MockGuard<'a> {
    recorder: &'a Recorder,
    previous: Option<DeviceId>,
}

impl DeviceScope for MockScope {
    type Guard<'a> = MockGuard<'a>;

    fn enter(&self, device_id: DeviceId) -> Result<Self::Guard<'_>, DriverError> {
        let mut state = self.recorder.state();
        state.scopes.push(device_id);
        if state.fail_bind.contains(&device_id) {
            return Err(DriverError::new(DriverOp::Bind, 101, "invalid device"));
        }
        let previous = state.bound.replace(device_id);
        Ok(MockGuard {
            recorder: &self.recorder,
            previous,
        })
    }
}

impl Drop for MockGuard<'_> {
    fn drop(&mut self) {
        self.recorder.state().bound = self.previous;
    }
}

pub fn mock() -> (Recorder, MockDriver, MockScope) {
    let recorder = Recorder::default();
    let driver = MockDriver {
        recorder: recorder.clone(),
    };
    let scope = MockScope {
        recorder: recorder.clone(),
    };
    (recorder, driver, scope)
}

pub fn handle(seed: u8) -> IpcHandle {
    let mut bytes = [0u8; IPC_HANDLE_SIZE];
    bytes[0] = seed;
    bytes[IPC_HANDLE_SIZE - 1] = seed.wrapping_mul(31);
    IpcHandle::from_bytes(bytes)
}
