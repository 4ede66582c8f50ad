//! Reusable resource fixtures.
//!
//! - [`FailingResource`]: forwards a fixed number of allocations, then fails.
//! - [`assert_disjoint`]: checks that live allocations never overlap.

use std::cell::Cell;
use std::ptr::NonNull;

use marl_core::{new_delete_resource, AllocError, MemoryResource};

/// Upstream that succeeds `succeed_count` times, then reports out-of-memory.
///
/// Deallocation always forwards, so blocks obtained before the cut-off are
/// returned normally.
pub struct FailingResource<'u> {
    upstream: &'u dyn MemoryResource,
    remaining: Cell<usize>,
    failures: Cell<usize>,
}

impl FailingResource<'static> {
    /// Succeed `succeed_count` times on top of the global allocator.
    pub fn after(succeed_count: usize) -> Self {
        Self::after_over(succeed_count, new_delete_resource())
    }
}

impl<'u> FailingResource<'u> {
    /// Succeed `succeed_count` times on top of `upstream`.
    pub fn after_over(succeed_count: usize, upstream: &'u dyn MemoryResource) -> Self {
        Self {
            upstream,
            remaining: Cell::new(succeed_count),
            failures: Cell::new(0),
        }
    }

    /// Allow `count` more successful allocations.
    pub fn refill(&self, count: usize) {
        self.remaining.set(count);
    }

    /// How many requests have been refused.
    pub fn failures(&self) -> usize {
        self.failures.get()
    }
}

impl MemoryResource for FailingResource<'_> {
    fn allocate(&self, bytes: usize, alignment: usize) -> Result<NonNull<u8>, AllocError> {
        let remaining = self.remaining.get();
        if remaining == 0 {
            self.failures.set(self.failures.get() + 1);
            return Err(AllocError::out_of_memory(bytes, alignment));
        }
        let ptr = self.upstream.allocate(bytes, alignment)?;
        self.remaining.set(remaining - 1);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, alignment: usize) {
        // SAFETY: forwarded unchanged from our caller.
        unsafe { self.upstream.deallocate(ptr, bytes, alignment) };
    }
}

/// Panic if any two `(ptr, len)` ranges overlap.
///
/// Zero-length ranges never overlap anything.
pub fn assert_disjoint(ranges: &[(NonNull<u8>, usize)]) {
    let mut sorted: Vec<(usize, usize)> = ranges
        .iter()
        .filter(|&&(_, len)| len > 0)
        .map(|&(p, len)| (p.as_ptr() as usize, len))
        .collect();
    sorted.sort_unstable();
    for pair in sorted.windows(2) {
        let (a, a_len) = pair[0];
        let (b, _) = pair[1];
        assert!(
            a + a_len <= b,
            "allocation {a:#x}+{a_len} overlaps allocation at {b:#x}"
        );
    }
}
