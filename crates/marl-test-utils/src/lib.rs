//! Test utilities and instrumented resources for Marl development.
//!
//! Provides upstream resources that observe or sabotage the strategies
//! under test:
//!
//! - [`CountingResource`] records every upstream request and checks that
//!   each block comes back exactly once with its original size and
//!   alignment.
//! - [`FailingResource`] succeeds a fixed number of times, then reports
//!   out-of-memory.
//!
//! Both panic on contract violations, which is the point: a strategy that
//! frees the wrong layout or double-frees fails its test loudly.

#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod fixtures;

use std::cell::{Cell, RefCell};
use std::ptr::NonNull;

use indexmap::IndexMap;
use marl_core::{new_delete_resource, AllocError, MemoryResource};

pub use fixtures::{assert_disjoint, FailingResource};

/// Running totals kept by [`CountingResource`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpstreamStats {
    /// Successful `allocate` calls.
    pub allocations: usize,
    /// `deallocate` calls.
    pub deallocations: usize,
    /// Bytes handed out over the resource's lifetime.
    pub bytes_allocated: usize,
    /// Bytes returned over the resource's lifetime.
    pub bytes_deallocated: usize,
}

/// Upstream resource that tracks every live block.
///
/// Forwards to another resource (the global allocator by default) and keeps
/// a map from block address to the `(bytes, alignment)` it was allocated
/// with. `deallocate` panics if the address is unknown (double free or
/// foreign pointer) or if the layout does not match.
pub struct CountingResource<'u> {
    upstream: &'u dyn MemoryResource,
    live: RefCell<IndexMap<usize, (usize, usize)>>,
    requests: RefCell<Vec<(usize, usize)>>,
    stats: Cell<UpstreamStats>,
}

impl CountingResource<'static> {
    /// Count on top of the global allocator.
    pub fn new() -> Self {
        Self::over(new_delete_resource())
    }
}

impl Default for CountingResource<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'u> CountingResource<'u> {
    /// Count on top of `upstream`.
    pub fn over(upstream: &'u dyn MemoryResource) -> Self {
        Self {
            upstream,
            live: RefCell::new(IndexMap::new()),
            requests: RefCell::new(Vec::new()),
            stats: Cell::new(UpstreamStats::default()),
        }
    }

    /// Totals so far.
    pub fn stats(&self) -> UpstreamStats {
        self.stats.get()
    }

    /// Every successful `(bytes, alignment)` request, in order.
    pub fn requests(&self) -> Vec<(usize, usize)> {
        self.requests.borrow().clone()
    }

    /// Number of blocks handed out and not yet returned.
    pub fn live_blocks(&self) -> usize {
        self.live.borrow().len()
    }

    /// Bytes handed out and not yet returned.
    pub fn live_bytes(&self) -> usize {
        self.live.borrow().values().map(|&(bytes, _)| bytes).sum()
    }

    /// Whether `ptr` lies inside some live block.
    pub fn owns(&self, ptr: NonNull<u8>) -> bool {
        let addr = ptr.as_ptr() as usize;
        self.live
            .borrow()
            .iter()
            .any(|(&start, &(bytes, _))| addr >= start && addr < start + bytes)
    }

    /// Start address of the live block containing `ptr`, if any.
    pub fn block_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        let addr = ptr.as_ptr() as usize;
        self.live
            .borrow()
            .iter()
            .find(|&(&start, &(bytes, _))| addr >= start && addr < start + bytes)
            .map(|(&start, _)| start)
    }

    /// Panic unless every block has been returned.
    pub fn assert_all_returned(&self) {
        let live = self.live.borrow();
        assert!(
            live.is_empty(),
            "{} upstream blocks still live: {:?}",
            live.len(),
            live.iter().collect::<Vec<_>>()
        );
        let stats = self.stats.get();
        assert_eq!(stats.allocations, stats.deallocations);
        assert_eq!(stats.bytes_allocated, stats.bytes_deallocated);
    }
}

impl MemoryResource for CountingResource<'_> {
    fn allocate(&self, bytes: usize, alignment: usize) -> Result<NonNull<u8>, AllocError> {
        let ptr = self.upstream.allocate(bytes, alignment)?;
        let previous = self
            .live
            .borrow_mut()
            .insert(ptr.as_ptr() as usize, (bytes, alignment));
        assert!(previous.is_none(), "upstream returned a live address twice");
        self.requests.borrow_mut().push((bytes, alignment));
        let mut stats = self.stats.get();
        stats.allocations += 1;
        stats.bytes_allocated += bytes;
        self.stats.set(stats);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, alignment: usize) {
        let recorded = self.live.borrow_mut().swap_remove(&(ptr.as_ptr() as usize));
        match recorded {
            Some(layout) => assert_eq!(
                layout,
                (bytes, alignment),
                "deallocate layout does not match allocate"
            ),
            None => panic!("deallocate of unknown or already-freed block {ptr:p}"),
        }
        let mut stats = self.stats.get();
        stats.deallocations += 1;
        stats.bytes_deallocated += bytes;
        self.stats.set(stats);
        // SAFETY: the layout was just checked against the recorded request.
        unsafe { self.upstream.deallocate(ptr, bytes, alignment) };
    }
}
