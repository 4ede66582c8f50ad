//! Marl: pluggable memory resources.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Marl sub-crates. For most users, adding `marl` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use marl::prelude::*;
//!
//! // A pool that draws its chunks from a monotonic arena.
//! let mut arena = MonotonicBufferResource::with_initial_size(4096, new_delete_resource());
//! {
//!     let pool = UnsynchronizedPoolResource::with_options_and_upstream(
//!         PoolOptions::default(),
//!         &arena,
//!     );
//!     let alloc = PolymorphicAllocator::<u32>::with_resource(&pool);
//!
//!     let p = alloc.allocate(8).unwrap();
//!     unsafe {
//!         p.as_ptr().write(7);
//!         assert_eq!(*p.as_ptr(), 7);
//!         alloc.deallocate(p, 8);
//!     }
//! }
//! // Hand every arena buffer back to the global allocator.
//! arena.release();
//! assert_eq!(arena.upstream_buffer_count(), 0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`resource`] | `marl-core` | `MemoryResource`, `AllocError`, built-in and default resources, `PolymorphicAllocator` |
//! | [`arena`] | `marl-arena` | Monotonic and pool resources and their building blocks |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// The resource contract and typed allocator (`marl-core`).
///
/// Defines [`resource::MemoryResource`], [`resource::AllocError`], the
/// process-wide default resource and [`resource::PolymorphicAllocator`].
pub use marl_core as resource;

/// Concrete allocation strategies (`marl-arena`).
///
/// [`arena::MonotonicBufferResource`] for bump allocation with bulk
/// release, [`arena::UnsynchronizedPoolResource`] for size-class pooling.
pub use marl_arena as arena;

/// Common imports for typical Marl usage.
///
/// ```rust
/// use marl::prelude::*;
/// ```
pub mod prelude {
    // Contract
    pub use marl_core::{resources_equal, AllocError, MemoryResource, MAX_ALIGN};

    // Built-in and default resources
    pub use marl_core::{
        get_default_resource, new_delete_resource, null_memory_resource, set_default_resource,
    };

    // Typed allocator
    pub use marl_core::PolymorphicAllocator;

    // Strategies
    pub use marl_arena::{MonotonicBufferResource, PoolOptions, UnsynchronizedPoolResource};
}
