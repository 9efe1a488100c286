//! Exporter - allocate device memory and publish its IPC handle
//!
//! The handle is written to POSIX shared memory so that `importer`
//! can pick it up from another process.
//!
//! Usage:
//! ```bash
//! cargo run -p ipcmap-core --features cuda --example exporter
//! ```

use cudarc::driver::{CudaDevice, DevicePtr};
use ipcmap_core::cuda::export_handle;
use ipcmap_core::IPC_HANDLE_SIZE;
use shared_memory::ShmemConf;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let device = CudaDevice::new(0)?;
    let data: Vec<f32> = (0..1024).map(|i| i as f32).collect();
    let slice = device.htod_copy(data)?;

    let handle = export_handle(*slice.device_ptr())?;
    println!("Exported {:?}", handle);

    let shm = ShmemConf::new()
        .size(IPC_HANDLE_SIZE)
        .os_id("/ipcmap_demo")
        .create()?;
    unsafe {
        std::ptr::copy_nonoverlapping(handle.as_bytes().as_ptr(), shm.as_ptr(), IPC_HANDLE_SIZE);
    }

    // The allocation must outlive every importer mapping.
    println!("Handle published. Press Ctrl+C to exit...");
    loop {
        thread::sleep(Duration::from_secs(1));
    }
}
