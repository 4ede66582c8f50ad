//! Concrete memory resources for Marl.
//!
//! Two allocation strategies built on the [`MemoryResource`] contract from
//! `marl-core`, plus the building blocks they share. This is the only crate
//! in the workspace that dereferences raw memory; every such access goes
//! through the private `raw` module.
//!
//! # Architecture
//!
//! ```text
//! MonotonicBufferResource            UnsynchronizedPoolResource
//! ├── BufferManager (bump cursor)    ├── Pool × N (one per size class)
//! └── SimplePoolManager (history)    │   ├── free list (LIFO, in freed blocks)
//!                                    │   └── SimplePoolManager (chunks)
//!                                    └── SimplePoolManager (oversized)
//!
//! SimplePoolManager ──► upstream: &dyn MemoryResource
//! ```
//!
//! # Releasing memory
//!
//! Neither strategy returns memory upstream on individual deallocation,
//! except the pool resource's oversized blocks. Everything else goes back
//! on `release()` or drop. `release` takes `&mut self`, so it cannot run
//! while a [`PolymorphicAllocator`](marl_core::PolymorphicAllocator) still
//! borrows the resource.
//!
//! [`MemoryResource`]: marl_core::MemoryResource

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod block_list;
pub mod buffer;
pub mod config;
pub mod monotonic;
pub mod pool;
pub mod pool_resource;
mod raw;

// Public re-exports for the primary API surface.
pub use block_list::SimplePoolManager;
pub use buffer::BufferManager;
pub use config::{PoolOptions, DEFAULT_INITIAL_SIZE, MAX_BUFFER_SIZE};
pub use monotonic::MonotonicBufferResource;
pub use pool::Pool;
pub use pool_resource::UnsynchronizedPoolResource;
