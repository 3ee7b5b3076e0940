// Buffer bridge - Host access to core linear memory
//
// Regions allocated in the core are represented by `LinearBuffer`, which is
// neither `Copy` nor `Clone`: freeing consumes it, so a region cannot be
// freed twice or written after it was released.

use crate::audio::AudioChunk;
use crate::core::{CoreError, CoreModule, Ptr};
use crate::display::{frame_len, FrameView};

/// A region of core memory owned by the host
#[derive(Debug, PartialEq, Eq)]
pub struct LinearBuffer {
    ptr: Ptr,
    len: usize,
}

impl LinearBuffer {
    pub fn ptr(&self) -> Ptr {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// (ptr, len) pair as the core's session entry point expects it
    pub fn region(&self) -> (Ptr, usize) {
        (self.ptr, self.len)
    }
}

/// Borrowing accessor over a core's linear memory
pub struct BufferBridge<'c> {
    core: &'c mut dyn CoreModule,
}

impl<'c> BufferBridge<'c> {
    pub fn new(core: &'c mut dyn CoreModule) -> Self {
        Self { core }
    }

    /// Allocate `size` bytes inside the core
    ///
    /// # Errors
    ///
    /// Allocation failures are returned as-is; they are not retried
    pub fn alloc(&mut self, size: usize) -> Result<LinearBuffer, CoreError> {
        let ptr = self.core.allocate(size)?;
        let in_bounds = (ptr as usize)
            .checked_add(size)
            .is_some_and(|end| end <= self.core.memory().len());
        if !in_bounds {
            // The core still owns the region it handed out
            let _ = self.core.free(ptr);
            return Err(CoreError::OutOfBounds { ptr, len: size });
        }
        Ok(LinearBuffer { ptr, len: size })
    }

    /// Copy `bytes` into the start of `buffer`
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is longer than the buffer
    pub fn write(&mut self, buffer: &LinearBuffer, bytes: &[u8]) -> Result<(), CoreError> {
        assert!(
            bytes.len() <= buffer.len,
            "write of {} bytes into a {}-byte buffer",
            bytes.len(),
            buffer.len
        );
        let region = slice_mut(self.core.memory_mut(), buffer.ptr, bytes.len())?;
        region.copy_from_slice(bytes);
        Ok(())
    }

    /// Release a buffer
    pub fn free(&mut self, buffer: LinearBuffer) -> Result<(), CoreError> {
        self.core.free(buffer.ptr)
    }

    /// Allocate a buffer holding a copy of `bytes`
    pub fn alloc_with(&mut self, bytes: &[u8]) -> Result<LinearBuffer, CoreError> {
        let buffer = self.alloc(bytes.len())?;
        if let Err(e) = self.write(&buffer, bytes) {
            let _ = self.free(buffer);
            return Err(e);
        }
        Ok(buffer)
    }

    /// Borrow an RGBA frame at `ptr` without copying
    ///
    /// The view borrows the bridge, so it cannot outlive the next core call.
    pub fn read_pixels(
        &self,
        ptr: Ptr,
        width: u32,
        height: u32,
    ) -> Result<FrameView<'_>, CoreError> {
        let len = frame_len(width, height);
        let bytes = slice(self.core.memory(), ptr, len)?;
        FrameView::new(width, height, bytes).ok_or(CoreError::OutOfBounds { ptr, len })
    }

    /// Copy `count` little-endian f32 samples out of core memory
    pub fn read_samples(
        &self,
        ptr: Ptr,
        count: usize,
        sample_rate: u32,
    ) -> Result<AudioChunk, CoreError> {
        let bytes = slice(self.core.memory(), ptr, count * 4)?;
        let samples = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(AudioChunk::mono(samples, sample_rate))
    }

    /// Copy `len` raw bytes out of core memory
    pub fn read_bytes(&self, ptr: Ptr, len: usize) -> Result<Vec<u8>, CoreError> {
        slice(self.core.memory(), ptr, len).map(|b| b.to_vec())
    }
}

fn slice(memory: &[u8], ptr: Ptr, len: usize) -> Result<&[u8], CoreError> {
    let start = ptr as usize;
    start
        .checked_add(len)
        .and_then(|end| memory.get(start..end))
        .ok_or(CoreError::OutOfBounds { ptr, len })
}

fn slice_mut(memory: &mut [u8], ptr: Ptr, len: usize) -> Result<&mut [u8], CoreError> {
    let start = ptr as usize;
    start
        .checked_add(len)
        .and_then(move |end| memory.get_mut(start..end))
        .ok_or(CoreError::OutOfBounds { ptr, len })
}
