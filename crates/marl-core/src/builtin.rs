//! Built-in resources: the global-allocator resource and the null resource.
//!
//! Both are process-wide singletons. Each static carries a byte of state
//! so the two have distinct addresses; identity equality relies on that.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::AllocError;
use crate::layout::{dangling, rounded_size};
use crate::resource::MemoryResource;

/// Resource backed by the global allocator (`std::alloc`).
///
/// Requests are rounded up to a multiple of their alignment before reaching
/// the global allocator; deallocation recomputes the same layout. Zero-byte
/// requests return a dangling, well-aligned pointer without touching the
/// global allocator.
#[derive(Debug)]
pub struct NewDeleteResource {
    _tag: u8,
}

/// Resource whose every allocation fails.
///
/// Useful as the upstream of a resource that must never grow, and in tests
/// of out-of-memory paths.
#[derive(Debug)]
pub struct NullMemoryResource {
    _tag: u8,
}

static NEW_DELETE: NewDeleteResource = NewDeleteResource { _tag: 0 };
static NULL_RESOURCE: NullMemoryResource = NullMemoryResource { _tag: 1 };

/// The process-wide [`NewDeleteResource`].
pub fn new_delete_resource() -> &'static NewDeleteResource {
    &NEW_DELETE
}

/// The process-wide [`NullMemoryResource`].
pub fn null_memory_resource() -> &'static NullMemoryResource {
    &NULL_RESOURCE
}

impl MemoryResource for NewDeleteResource {
    fn allocate(&self, bytes: usize, alignment: usize) -> Result<NonNull<u8>, AllocError> {
        let size = rounded_size(bytes, alignment)?;
        if size == 0 {
            return Ok(dangling(alignment));
        }
        let layout = Layout::from_size_align(size, alignment)
            .map_err(|_| AllocError::InvalidLayout { bytes, alignment })?;
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError::out_of_memory(bytes, alignment))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, alignment: usize) {
        let Ok(size) = rounded_size(bytes, alignment) else {
            return;
        };
        if size == 0 {
            return;
        }
        // SAFETY: the caller passes the `(bytes, alignment)` used in
        // `allocate`, which validated this exact layout.
        unsafe {
            let layout = Layout::from_size_align_unchecked(size, alignment);
            alloc::dealloc(ptr.as_ptr(), layout);
        }
    }
}

impl MemoryResource for NullMemoryResource {
    fn allocate(&self, bytes: usize, alignment: usize) -> Result<NonNull<u8>, AllocError> {
        Err(AllocError::out_of_memory(bytes, alignment))
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _bytes: usize, _alignment: usize) {}
}
