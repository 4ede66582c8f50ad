//! Size-segregated pool resource.
//!
//! [`UnsynchronizedPoolResource`] keeps one [`Pool`] per size class, from
//! [`MAX_ALIGN`] bytes up to the configured largest pooled block in steps
//! of `MAX_ALIGN`. Requests are routed by size:
//!
//! ```text
//! allocate(bytes, alignment)
//!   ├── alignment > MAX_ALIGN ──────────────┐
//!   ├── round_up(bytes) > max_block_size ───┴──► oversized (SimplePoolManager)
//!   └── otherwise ──► pools[pool_index(bytes)] ──► free list, else chunk
//! ```
//!
//! Pooled blocks are recycled through per-class free lists and return
//! upstream only on release. Oversized blocks go back upstream as soon as
//! they are deallocated.

use std::cell::RefCell;
use std::fmt;
use std::ptr::NonNull;

use marl_core::layout::{dangling, is_valid_alignment, rounded_size};
use marl_core::{get_default_resource, AllocError, MemoryResource, MAX_ALIGN};

use crate::block_list::SimplePoolManager;
use crate::config::PoolOptions;
use crate::pool::Pool;

struct PoolState<'u> {
    /// `pools[i]` serves blocks of `(i + 1) * MAX_ALIGN` bytes.
    pools: Vec<Pool<'u>>,
    oversized: SimplePoolManager<'u>,
}

/// Pool resource without internal synchronization.
///
/// Built for single-threaded use: the type is `!Sync`, and
/// [`release`](Self::release) takes `&mut self`.
pub struct UnsynchronizedPoolResource<'u> {
    state: RefCell<PoolState<'u>>,
    options: PoolOptions,
    max_block_size: usize,
}

impl UnsynchronizedPoolResource<'static> {
    /// Default options over the current default resource.
    pub fn new() -> Self {
        Self::with_options(PoolOptions::default())
    }

    /// `options` over the current default resource.
    pub fn with_options(options: PoolOptions) -> Self {
        Self::with_options_and_upstream(options, get_default_resource())
    }
}

impl Default for UnsynchronizedPoolResource<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'u> UnsynchronizedPoolResource<'u> {
    /// `options` over `upstream`. Zero-valued fields take their defaults.
    pub fn with_options_and_upstream(
        options: PoolOptions,
        upstream: &'u dyn MemoryResource,
    ) -> Self {
        let options = options.normalized();
        let max_block_size = options.largest_required_pool_block;
        let pools = (1..=max_block_size / MAX_ALIGN)
            .map(|class| Pool::new(class * MAX_ALIGN, options.max_blocks_per_chunk, upstream))
            .collect::<Vec<_>>();
        log::debug!(
            "pool resource: {} size classes up to {} bytes, {} blocks per chunk max",
            pools.len(),
            max_block_size,
            options.max_blocks_per_chunk
        );
        Self {
            state: RefCell::new(PoolState {
                pools,
                oversized: SimplePoolManager::new(upstream),
            }),
            options,
            max_block_size,
        }
    }

    /// Size class serving a pooled request of `bytes` bytes.
    ///
    /// Rounds up: class `i` holds requests of `i * MAX_ALIGN + 1` through
    /// `(i + 1) * MAX_ALIGN` bytes, and a zero-byte request lands in class 0.
    pub const fn pool_index(bytes: usize) -> usize {
        bytes.saturating_sub(1) / MAX_ALIGN
    }

    /// Return every pooled chunk and every oversized block upstream.
    pub fn release(&mut self) {
        let state = self.state.get_mut();
        for pool in &mut state.pools {
            pool.release();
        }
        let oversized = state.oversized.block_count();
        state.oversized.release();
        log::debug!("pool resource released ({oversized} oversized blocks)");
    }

    /// Normalized options in effect.
    pub fn options(&self) -> PoolOptions {
        self.options
    }

    /// The resource chunks are drawn from.
    pub fn upstream(&self) -> &'u dyn MemoryResource {
        self.state.borrow().oversized.upstream()
    }

    /// Number of size classes.
    pub fn pool_count(&self) -> usize {
        self.state.borrow().pools.len()
    }

    /// Largest request served from a pool.
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Chunks held from upstream across all pools.
    pub fn chunk_count(&self) -> usize {
        self.state.borrow().pools.iter().map(Pool::chunk_count).sum()
    }

    /// Oversized blocks currently outstanding.
    pub fn oversized_count(&self) -> usize {
        self.state.borrow().oversized.block_count()
    }

    fn is_oversized(&self, rounded: usize, alignment: usize) -> bool {
        rounded > self.max_block_size || alignment > MAX_ALIGN
    }
}

impl MemoryResource for UnsynchronizedPoolResource<'_> {
    fn allocate(&self, bytes: usize, alignment: usize) -> Result<NonNull<u8>, AllocError> {
        if !is_valid_alignment(alignment) {
            return Err(AllocError::InvalidLayout { bytes, alignment });
        }
        let rounded = rounded_size(bytes, alignment)?;
        let mut state = self.state.borrow_mut();

        if self.is_oversized(rounded, alignment) {
            log::trace!("pool resource: {bytes} bytes at {alignment} goes upstream");
            return Ok(state
                .oversized
                .allocate(bytes, alignment)?
                .unwrap_or_else(|| dangling(alignment)));
        }
        state.pools[Self::pool_index(bytes)].allocate()
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, alignment: usize) {
        // Nothing with an invalid layout was ever handed out.
        let Ok(rounded) = rounded_size(bytes, alignment) else {
            return;
        };
        let mut state = self.state.borrow_mut();

        if self.is_oversized(rounded, alignment) {
            // Zero-byte blocks are dangling and unknown to the manager.
            state.oversized.deallocate(ptr);
            return;
        }
        if let Some(pool) = state.pools.get_mut(Self::pool_index(bytes)) {
            // SAFETY: the caller passes the layout used to allocate, which
            // routes to the same pool.
            unsafe { pool.deallocate(ptr) };
        }
    }
}

impl fmt::Debug for UnsynchronizedPoolResource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsynchronizedPoolResource")
            .field("options", &self.options)
            .field("chunks", &self.chunk_count())
            .field("oversized", &self.oversized_count())
            .finish()
    }
}
