//! Typed allocator façade over a [`MemoryResource`].

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use crate::default_resource::get_default_resource;
use crate::error::AllocError;
use crate::resource::{resources_equal, MemoryResource};

/// A copyable handle that allocates arrays of `T` from a bound resource.
///
/// This is what containers hold. It binds `size_of::<T>()` and
/// `align_of::<T>()` to a non-owning `&'r dyn MemoryResource`; copying the
/// handle copies only the reference. The lifetime `'r` keeps the resource
/// alive (and un-released) for as long as any handle exists.
///
/// The resource is fixed at construction. [`PolymorphicAllocator::new`]
/// captures the default resource once and never re-resolves it.
pub struct PolymorphicAllocator<'r, T> {
    resource: &'r dyn MemoryResource,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PolymorphicAllocator<'static, T> {
    /// Bind to the current process-wide default resource.
    pub fn new() -> Self {
        Self::with_resource(get_default_resource())
    }
}

impl<T> Default for PolymorphicAllocator<'static, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r, T> PolymorphicAllocator<'r, T> {
    /// Bind to `resource`.
    pub fn with_resource(resource: &'r dyn MemoryResource) -> Self {
        Self {
            resource,
            _marker: PhantomData,
        }
    }

    /// The bound resource.
    pub fn resource(&self) -> &'r dyn MemoryResource {
        self.resource
    }

    /// Allocate uninitialized storage for `n` values of `T`.
    ///
    /// # Errors
    ///
    /// [`AllocError::CapacityOverflow`] if `n * size_of::<T>()` overflows,
    /// otherwise whatever the resource reports.
    pub fn allocate(&self, n: usize) -> Result<NonNull<T>, AllocError> {
        let bytes = Self::byte_count(n)?;
        self.resource
            .allocate(bytes, mem::align_of::<T>())
            .map(NonNull::cast)
    }

    /// Return storage for `n` values of `T`.
    ///
    /// Values stored in the memory are not dropped.
    ///
    /// # Safety
    ///
    /// `p` must come from [`allocate`](Self::allocate) on an allocator whose
    /// resource is equal to this one, called with the same `n`.
    pub unsafe fn deallocate(&self, p: NonNull<T>, n: usize) {
        let bytes = n.wrapping_mul(mem::size_of::<T>());
        // SAFETY: `allocate(n)` succeeded with these exact bytes and alignment.
        unsafe {
            self.resource
                .deallocate(p.cast(), bytes, mem::align_of::<T>())
        };
    }

    /// The same resource, typed for `U`.
    pub fn rebind<U>(&self) -> PolymorphicAllocator<'r, U> {
        PolymorphicAllocator::with_resource(self.resource)
    }

    fn byte_count(n: usize) -> Result<usize, AllocError> {
        let elem_size = mem::size_of::<T>();
        n.checked_mul(elem_size)
            .ok_or(AllocError::CapacityOverflow {
                count: n,
                elem_size,
            })
    }
}

impl<T> Clone for PolymorphicAllocator<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PolymorphicAllocator<'_, T> {}

impl<'r, T> From<&'r dyn MemoryResource> for PolymorphicAllocator<'r, T> {
    fn from(resource: &'r dyn MemoryResource) -> Self {
        Self::with_resource(resource)
    }
}

impl<'a, 'b, T, U> PartialEq<PolymorphicAllocator<'b, U>> for PolymorphicAllocator<'a, T> {
    fn eq(&self, other: &PolymorphicAllocator<'b, U>) -> bool {
        resources_equal(self.resource, other.resource)
    }
}

impl<T> Eq for PolymorphicAllocator<'_, T> {}

impl<T> fmt::Debug for PolymorphicAllocator<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolymorphicAllocator")
            .field("value_type", &std::any::type_name::<T>())
            .field("resource", &(self.resource as *const dyn MemoryResource))
            .finish()
    }
}
