//! Resource configuration parameters.

use marl_core::layout::align_up;
use marl_core::MAX_ALIGN;

/// Cap on the monotonic arena's growth size: 1 MiB.
///
/// Requests larger than this still succeed; the arena grows to the request
/// size for that one buffer and then returns to the cap.
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// First upstream buffer size of a monotonic arena built without one.
pub const DEFAULT_INITIAL_SIZE: usize = 1024;

/// Tuning knobs for [`UnsynchronizedPoolResource`](crate::UnsynchronizedPoolResource).
///
/// A zero field means "use the built-in default". Values are normalized
/// once at construction and are immutable afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolOptions {
    /// Upper bound on how many blocks a single chunk may hold.
    ///
    /// Chunks start at one block and double up to this cap.
    /// Default: 64.
    pub max_blocks_per_chunk: usize,

    /// Largest request, in bytes, served from a size-class pool.
    ///
    /// Anything bigger goes straight to the upstream resource. Values above
    /// the default are clamped to it, and the result is rounded up to a
    /// multiple of [`MAX_ALIGN`]. Default: 256.
    pub largest_required_pool_block: usize,
}

impl PoolOptions {
    /// Default growth cap for pool chunks, in blocks.
    pub const DEFAULT_MAX_BLOCKS_PER_CHUNK: usize = 64;

    /// Default (and maximum) pooled block size in bytes.
    pub const DEFAULT_LARGEST_REQUIRED_POOL_BLOCK: usize = 256;

    /// Options with both fields set explicitly.
    pub fn new(max_blocks_per_chunk: usize, largest_required_pool_block: usize) -> Self {
        Self {
            max_blocks_per_chunk,
            largest_required_pool_block,
        }
    }

    /// Replace sentinels with defaults and round the block bound.
    ///
    /// Idempotent: normalizing twice gives the same result.
    pub fn normalized(self) -> Self {
        let max_blocks_per_chunk = match self.max_blocks_per_chunk {
            0 => Self::DEFAULT_MAX_BLOCKS_PER_CHUNK,
            n => n,
        };
        let largest = match self.largest_required_pool_block {
            0 => Self::DEFAULT_LARGEST_REQUIRED_POOL_BLOCK,
            n if n > Self::DEFAULT_LARGEST_REQUIRED_POOL_BLOCK => {
                Self::DEFAULT_LARGEST_REQUIRED_POOL_BLOCK
            }
            n => n,
        };
        // `largest <= 256`, so rounding cannot overflow.
        let largest_required_pool_block =
            align_up(largest, MAX_ALIGN).unwrap_or(Self::DEFAULT_LARGEST_REQUIRED_POOL_BLOCK);
        Self {
            max_blocks_per_chunk,
            largest_required_pool_block,
        }
    }

    /// Number of size classes these options produce once normalized.
    pub fn pool_count(&self) -> usize {
        self.normalized().largest_required_pool_block / MAX_ALIGN
    }
}
