//! Fixed-size block pool for one size class.
//!
//! A [`Pool`] carves equal blocks out of chunks obtained through a
//! [`SimplePoolManager`]. Freed blocks go onto an intrusive LIFO free list
//! and are handed out again before any new chunk is carved. Memory only
//! returns upstream on [`Pool::release`].
//!
//! Chunk sizes start at one block and double on every growth, capped at
//! `max_blocks`, so n allocations cost O(log n) upstream requests until the
//! cap is reached.

use std::fmt;
use std::ptr::NonNull;

use marl_core::layout::align_up;
use marl_core::{AllocError, MemoryResource, MAX_ALIGN};

use crate::block_list::SimplePoolManager;
use crate::config::PoolOptions;
use crate::raw::{self, FreeLink};

/// Position inside the chunk currently being carved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChunkCursor {
    /// No chunk yet, or the pool was released.
    Empty,
    /// Carving `next`; `remaining` blocks are left. Zero means exhausted.
    Active { next: NonNull<u8>, remaining: usize },
}

/// Allocator for blocks of a single size.
pub struct Pool<'u> {
    block_size: usize,
    real_block_size: usize,
    max_blocks: usize,
    current_chunk_size: usize,
    chunks: SimplePoolManager<'u>,
    free_list: Option<NonNull<FreeLink>>,
    cursor: ChunkCursor,
}

impl<'u> Pool<'u> {
    /// A pool of `block_size`-byte blocks drawing chunks from `upstream`.
    ///
    /// The stored block size is rounded up to a multiple of [`MAX_ALIGN`]
    /// (and to at least `MAX_ALIGN`) so every block can hold a free-list
    /// link. `max_blocks == 0` selects
    /// [`PoolOptions::DEFAULT_MAX_BLOCKS_PER_CHUNK`].
    pub fn new(block_size: usize, max_blocks: usize, upstream: &'u dyn MemoryResource) -> Self {
        // Saturates; an unrepresentable block size fails at the first chunk.
        let real_block_size = align_up(block_size.max(MAX_ALIGN), MAX_ALIGN)
            .unwrap_or(usize::MAX & !(MAX_ALIGN - 1));
        let max_blocks = match max_blocks {
            0 => PoolOptions::DEFAULT_MAX_BLOCKS_PER_CHUNK,
            n => n,
        };
        Self {
            block_size,
            real_block_size,
            max_blocks,
            current_chunk_size: 1,
            chunks: SimplePoolManager::new(upstream),
            free_list: None,
            cursor: ChunkCursor::Empty,
        }
    }

    /// Hand out one block of [`real_block_size`](Self::real_block_size)
    /// bytes, aligned to [`MAX_ALIGN`].
    ///
    /// # Errors
    ///
    /// Upstream failure while growing. The pool is unchanged in that case.
    pub fn allocate(&mut self) -> Result<NonNull<u8>, AllocError> {
        // SAFETY: every link was written by `deallocate` into a block of a
        // chunk this pool still owns.
        if let Some(block) = unsafe { raw::pop_free(&mut self.free_list) } {
            return Ok(block);
        }

        let (block, remaining) = match self.cursor {
            ChunkCursor::Active { next, remaining } if remaining > 0 => (next, remaining),
            _ => self.grow()?,
        };
        self.cursor = ChunkCursor::Active {
            // SAFETY: `block` starts one of `remaining` whole blocks left in
            // the chunk, so stepping past it lands at most one past the end.
            next: unsafe { raw::byte_add(block, self.real_block_size) },
            remaining: remaining - 1,
        };
        Ok(block)
    }

    /// Put a block back on the free list.
    ///
    /// # Safety
    ///
    /// `ptr` must have come from [`allocate`](Self::allocate) on this pool,
    /// since the last [`release`](Self::release), and not be freed already.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        // SAFETY: the block is ours, at least MAX_ALIGN bytes and aligned,
        // and nobody else uses it once freed.
        unsafe { raw::push_free(&mut self.free_list, ptr) };
    }

    /// Return every chunk upstream and reset growth to one block.
    pub fn release(&mut self) {
        self.free_list = None;
        self.cursor = ChunkCursor::Empty;
        self.current_chunk_size = 1;
        self.chunks.release();
    }

    /// Obtain the next chunk and advance the growth counter.
    fn grow(&mut self) -> Result<(NonNull<u8>, usize), AllocError> {
        let blocks = self.current_chunk_size;
        let layout_error = AllocError::InvalidLayout {
            bytes: self.real_block_size,
            alignment: MAX_ALIGN,
        };
        let bytes = blocks
            .checked_mul(self.real_block_size)
            .ok_or_else(|| layout_error.clone())?;
        let chunk = self.chunks.allocate(bytes, MAX_ALIGN)?.ok_or(layout_error)?;
        log::trace!(
            "pool({}): new chunk of {} blocks ({} bytes)",
            self.block_size,
            blocks,
            bytes
        );
        self.current_chunk_size = blocks.saturating_mul(2).min(self.max_blocks);
        Ok((chunk, blocks))
    }

    /// Requested block size.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Block size actually carved, a multiple of [`MAX_ALIGN`].
    pub fn real_block_size(&self) -> usize {
        self.real_block_size
    }

    /// Growth cap in blocks per chunk.
    pub fn max_blocks(&self) -> usize {
        self.max_blocks
    }

    /// Blocks the next chunk will hold.
    pub fn current_chunk_size(&self) -> usize {
        self.current_chunk_size
    }

    /// Blocks waiting on the free list.
    pub fn free_count(&self) -> usize {
        // SAFETY: see `allocate`.
        unsafe { raw::free_list_len(self.free_list) }
    }

    /// Chunks currently held from upstream.
    pub fn chunk_count(&self) -> usize {
        self.chunks.block_count()
    }
}

impl fmt::Debug for Pool<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("block_size", &self.block_size)
            .field("real_block_size", &self.real_block_size)
            .field("current_chunk_size", &self.current_chunk_size)
            .field("chunks", &self.chunk_count())
            .field("free", &self.free_count())
            .finish()
    }
}
