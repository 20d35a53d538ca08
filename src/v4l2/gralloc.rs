//! Graphics-buffer locking for user-pointer capture.
//!
//! The framework hands the HAL opaque buffer handles; the gralloc layer
//! turns them into addressable memory for the duration of a capture. The
//! bridge keeps the address-to-handle bookkeeping the wrapper needs to
//! unlock buffers as the driver returns them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::errors::{HalError, HalResult};

/// Opaque graphics-buffer identity, owned by the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct BufferHandle(pub u64);

/// A locked buffer's userspace mapping.
#[derive(Debug, Clone, Copy)]
pub struct MappedRegion {
    pub addr: usize,
    pub len: usize,
}

/// The external allocator contract: lock a handle into memory, unlock it
/// when capture is done.
pub trait BufferMapper: Send + Sync {
    fn lock(&self, handle: BufferHandle, size: usize) -> HalResult<MappedRegion>;
    fn unlock(&self, handle: BufferHandle) -> HalResult<()>;
}

/// Lock-state bookkeeping between the V4L2 wrapper and the mapper.
pub struct GrallocBridge {
    mapper: Arc<dyn BufferMapper>,
    locked: Mutex<HashMap<usize, BufferHandle>>,
}

impl GrallocBridge {
    pub fn new(mapper: Arc<dyn BufferMapper>) -> Self {
        Self {
            mapper,
            locked: Mutex::new(HashMap::new()),
        }
    }

    /// Locks `handle` and records the mapping. The mapping must be at least
    /// `size` bytes or the lock is rolled back.
    pub fn lock(&self, handle: BufferHandle, size: usize) -> HalResult<MappedRegion> {
        let region = self.mapper.lock(handle, size)?;
        if region.len < size {
            let _ = self.mapper.unlock(handle);
            return Err(HalError::invalid_argument(format!(
                "buffer {handle:?} holds {} bytes, device needs {size}",
                region.len
            )));
        }
        self.locked
            .lock()
            .expect("lock poisoned")
            .insert(region.addr, handle);
        Ok(region)
    }

    /// Unlocks the buffer mapped at `addr`, as reported back by the driver.
    pub fn unlock_by_addr(&self, addr: usize) -> HalResult<BufferHandle> {
        let handle = self
            .locked
            .lock()
            .expect("lock poisoned")
            .remove(&addr)
            .ok_or_else(|| {
                HalError::invalid_argument(format!("no locked buffer at {addr:#x}"))
            })?;
        self.mapper.unlock(handle)?;
        Ok(handle)
    }

    /// Unlocks everything. Used on stream transitions, where the driver
    /// implicitly returns all queued buffers.
    pub fn unlock_all(&self) {
        let drained: Vec<(usize, BufferHandle)> = self
            .locked
            .lock()
            .expect("lock poisoned")
            .drain()
            .collect();
        for (addr, handle) in drained {
            if let Err(e) = self.mapper.unlock(handle) {
                log::warn!("failed to unlock buffer {handle:?} at {addr:#x}: {e}");
            }
        }
    }

    pub fn locked_count(&self) -> usize {
        self.locked.lock().expect("lock poisoned").len()
    }
}
