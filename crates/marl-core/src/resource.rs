//! The memory-resource contract.

use std::ptr::NonNull;

use crate::error::AllocError;

/// A source of raw, untyped memory.
///
/// Every allocation strategy in the workspace implements this trait, and
/// every consumer holds a non-owning `&dyn MemoryResource`. A resource must
/// outlive all consumers bound to it; the borrow checker enforces this
/// through the lifetime carried by
/// [`PolymorphicAllocator`](crate::PolymorphicAllocator).
///
/// Resources store no per-allocation metadata. The caller of
/// [`deallocate`](MemoryResource::deallocate) must therefore hand back the
/// exact `(bytes, alignment)` pair it passed to
/// [`allocate`](MemoryResource::allocate).
///
/// Implementations are free to be unsynchronized: methods take `&self`, and
/// strategies that mutate internal state use `RefCell`, which makes them
/// `!Sync`.
pub trait MemoryResource {
    /// Allocate `bytes` bytes aligned to `alignment`.
    ///
    /// Never returns a null pointer. `alignment` must be a power of two.
    ///
    /// # Errors
    ///
    /// [`AllocError::OutOfMemory`] if neither this resource nor its upstream
    /// can satisfy the request, [`AllocError::InvalidLayout`] for a malformed
    /// alignment. On error nothing has been allocated.
    fn allocate(&self, bytes: usize, alignment: usize) -> Result<NonNull<u8>, AllocError>;

    /// Return memory obtained from [`allocate`](MemoryResource::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this same resource (or
    /// one it [`is_equal`](MemoryResource::is_equal) to) with the identical
    /// `bytes` and `alignment`, and must not have been deallocated since.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, alignment: usize);

    /// Whether memory allocated from `self` can be deallocated through
    /// `other` and vice versa.
    ///
    /// The default is instance identity.
    fn is_equal(&self, other: &dyn MemoryResource) -> bool {
        std::ptr::addr_eq(self as *const Self, other as *const dyn MemoryResource)
    }
}

/// `a` and `b` are the same instance, or `a` considers `b` interchangeable.
pub fn resources_equal(a: &dyn MemoryResource, b: &dyn MemoryResource) -> bool {
    std::ptr::addr_eq(a as *const dyn MemoryResource, b as *const dyn MemoryResource)
        || a.is_equal(b)
}
