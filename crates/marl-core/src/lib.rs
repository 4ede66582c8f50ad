//! Core memory-resource abstractions for the Marl allocator workspace.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! contract every allocation strategy implements and every consumer depends
//! on, plus the pieces that need no strategy of their own:
//!
//! - [`MemoryResource`]: the dynamic-dispatch allocation contract.
//! - [`NewDeleteResource`] / [`NullMemoryResource`]: built-in singletons.
//! - [`get_default_resource`] / [`set_default_resource`]: the process-wide
//!   default consumers bind to when no resource is supplied.
//! - [`PolymorphicAllocator`]: the typed, copyable façade containers use.
//!
//! Concrete strategies (monotonic arena, size-class pools) live in
//! `marl-arena`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod allocator;
pub mod builtin;
pub mod default_resource;
pub mod error;
pub mod layout;
pub mod resource;

pub use allocator::PolymorphicAllocator;
pub use builtin::{
    new_delete_resource, null_memory_resource, NewDeleteResource, NullMemoryResource,
};
pub use default_resource::{get_default_resource, set_default_resource, SharedResource};
pub use error::AllocError;
pub use layout::{align_up, dangling, is_valid_alignment, DEFAULT_ALIGNMENT, MAX_ALIGN};
pub use resource::{resources_equal, MemoryResource};
