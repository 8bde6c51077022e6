//! Host-side buffer storage shared by the CPU backends.

use std::collections::HashMap;

use crate::ascii_pipeline::backend::compute::BufferId;
use crate::ascii_pipeline::common::error::{ConversionError, Result};

/// Byte buffers addressed by handle. Allocation zero-fills, release is
/// idempotent.
#[derive(Debug, Default)]
pub struct BufferPool {
    buffers: HashMap<BufferId, Vec<u8>>,
    next_id: u64,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, len: usize) -> Result<BufferId> {
        if len == 0 {
            return Err(ConversionError::AllocationError(
                "zero-length buffer".to_string(),
            ));
        }
        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.buffers.insert(id, vec![0; len]);
        Ok(id)
    }

    pub fn release(&mut self, id: BufferId) {
        self.buffers.remove(&id);
    }

    pub fn upload(&mut self, id: BufferId, bytes: &[u8], offset: usize) -> Result<()> {
        let buf = self
            .buffers
            .get_mut(&id)
            .ok_or_else(|| ConversionError::TransferError(format!("unknown buffer {id:?}")))?;
        let end = offset + bytes.len();
        if end > buf.len() {
            return Err(ConversionError::TransferError(format!(
                "write of {} bytes at offset {offset} overruns a {} byte buffer",
                bytes.len(),
                buf.len()
            )));
        }
        buf[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn download(&self, id: BufferId) -> Result<Vec<u8>> {
        self.buffers
            .get(&id)
            .cloned()
            .ok_or_else(|| ConversionError::TransferError(format!("unknown buffer {id:?}")))
    }

    /// Borrows a buffer for reading during a dispatch.
    pub fn get(&self, id: BufferId) -> Result<&[u8]> {
        self.buffers
            .get(&id)
            .map(Vec::as_slice)
            .ok_or_else(|| ConversionError::DispatchError(format!("unknown buffer {id:?}")))
    }

    /// Detaches a buffer so it can be written while other pool buffers
    /// stay borrowed. Pair with [`BufferPool::put_back`].
    pub fn take(&mut self, id: BufferId) -> Result<Vec<u8>> {
        self.buffers
            .remove(&id)
            .ok_or_else(|| ConversionError::DispatchError(format!("unknown buffer {id:?}")))
    }

    pub fn put_back(&mut self, id: BufferId, buf: Vec<u8>) {
        self.buffers.insert(id, buf);
    }

    /// Number of live buffers, used by tests watching for leaks.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }
}
