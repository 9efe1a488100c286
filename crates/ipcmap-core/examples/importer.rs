//! Importer - map a handle published by `exporter`
//!
//! Usage:
//! ```bash
//! cargo run -p ipcmap-core --features cuda --example importer
//! ```

use ipcmap_core::{HandleCache, IpcHandle, IPC_HANDLE_SIZE};
use shared_memory::ShmemConf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let shm = ShmemConf::new().os_id("/ipcmap_demo").open()?;
    let mut bytes = [0u8; IPC_HANDLE_SIZE];
    unsafe {
        std::ptr::copy_nonoverlapping(shm.as_ptr(), bytes.as_mut_ptr(), IPC_HANDLE_SIZE);
    }
    let handle = IpcHandle::from_bytes(bytes);

    let mut cache = HandleCache::cuda()?;
    let ptr = cache.resolve(&handle, 0)?;
    println!("Mapped {:?} at {}", handle, ptr);

    // Second lookup is served from the cache
    let again = cache.resolve(&handle, 0)?;
    println!("Cached lookup: {} (opens: {})", again, cache.stats().opens);

    cache.release(&handle)?;
    cache.teardown()?;
    Ok(())
}
