//! Bump-pointer allocation inside one fixed byte buffer.
//!
//! A [`BufferManager`] never owns its buffer. The monotonic resource hands
//! it either caller storage or an upstream block and keeps ownership of
//! that memory elsewhere.

use std::ptr::NonNull;

use marl_core::layout::padding_for;

use crate::raw;

/// Bump allocator over a borrowed buffer.
///
/// Allocation advances a cursor; nothing is freed individually. All
/// previous allocations become invalid at once on [`release`](Self::release).
#[derive(Debug, Default)]
pub struct BufferManager {
    /// Start of the current buffer. `None` before the first buffer arrives.
    buffer: Option<NonNull<u8>>,
    /// Size of the current buffer in bytes.
    size: usize,
    /// Bump pointer: bytes consumed from the start of `buffer`.
    cursor: usize,
}

impl BufferManager {
    /// A manager with no buffer. Every allocation fails until
    /// [`replace_buffer`](Self::replace_buffer) supplies one.
    pub const fn empty() -> Self {
        Self {
            buffer: None,
            size: 0,
            cursor: 0,
        }
    }

    /// Manage `size` bytes starting at `buffer`.
    ///
    /// # Safety
    ///
    /// `buffer` must be valid for reads and writes of `size` bytes for as
    /// long as this manager hands out pointers into it.
    pub unsafe fn new(buffer: NonNull<u8>, size: usize) -> Self {
        Self {
            buffer: Some(buffer),
            size,
            cursor: 0,
        }
    }

    /// Bump-allocate `size` bytes aligned to `alignment`.
    ///
    /// Returns `None` if the padded request does not fit in the remaining
    /// space; the cursor is left unchanged. `alignment` must be a power of
    /// two.
    pub fn allocate(&mut self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        let base = self.buffer?;
        let addr = base.as_ptr().addr().wrapping_add(self.cursor);
        let offset = self.cursor + padding_for(addr, alignment);
        let end = offset.checked_add(size)?;
        if end > self.size {
            return None;
        }
        // SAFETY: `offset <= end <= size`, inside the buffer.
        let ptr = unsafe { raw::byte_add(base, offset) };
        self.cursor = end;
        Some(ptr)
    }

    /// Swap in a new buffer with the cursor at zero.
    ///
    /// Returns the previous buffer so the caller can account for it.
    ///
    /// # Safety
    ///
    /// Same contract as [`BufferManager::new`].
    pub unsafe fn replace_buffer(&mut self, buffer: NonNull<u8>, size: usize) -> Option<NonNull<u8>> {
        let previous = self.buffer.replace(buffer);
        self.size = size;
        self.cursor = 0;
        previous
    }

    /// Reset the bump pointer without touching the buffer.
    pub fn release(&mut self) {
        self.cursor = 0;
    }

    /// Forget the buffer entirely.
    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    /// Start of the current buffer.
    pub fn buffer(&self) -> Option<NonNull<u8>> {
        self.buffer
    }

    /// Size of the current buffer in bytes.
    pub fn buffer_size(&self) -> usize {
        self.size
    }

    /// Bytes consumed, padding included.
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Bytes left before the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.size - self.cursor
    }
}
