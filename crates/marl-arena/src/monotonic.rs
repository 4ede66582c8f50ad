//! Monotonic arena: bump allocation over buffers that double in size.
//!
//! [`MonotonicBufferResource`] serves every request from its current
//! buffer. When a request does not fit, it obtains a bigger buffer from its
//! upstream resource and carries on there; the old buffer stays alive until
//! [`release`](MonotonicBufferResource::release). Individual deallocation
//! is a no-op.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use marl_core::layout::{align_up, is_valid_alignment, rounded_size};
use marl_core::{get_default_resource, AllocError, MemoryResource, MAX_ALIGN};

use crate::block_list::SimplePoolManager;
use crate::buffer::BufferManager;
use crate::config::{DEFAULT_INITIAL_SIZE, MAX_BUFFER_SIZE};

struct MonotonicState<'a> {
    /// Arena currently being bumped.
    buffer: BufferManager,
    /// Every buffer obtained from upstream, newest first.
    history: SimplePoolManager<'a>,
    next_buffer_size: usize,
}

/// Arena resource whose capacity doubles, up to [`MAX_BUFFER_SIZE`], each
/// time the current buffer runs out.
///
/// Not thread-safe: the resource is `!Sync` and must stay on one thread.
/// [`release`](Self::release) takes `&mut self`, so no allocator can still
/// be borrowing it when its memory goes back upstream.
pub struct MonotonicBufferResource<'a> {
    state: RefCell<MonotonicState<'a>>,
    /// Caller storage supplied at construction, restored on release.
    initial_buffer: Option<(NonNull<u8>, usize)>,
    initial_next_size: usize,
    _buffer: PhantomData<&'a mut [u8]>,
}

impl MonotonicBufferResource<'static> {
    /// Arena over the current default resource with the default first
    /// buffer size.
    pub fn new() -> Self {
        Self::with_upstream(get_default_resource())
    }
}

impl Default for MonotonicBufferResource<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> MonotonicBufferResource<'a> {
    /// Arena over `upstream` with the default first buffer size.
    pub fn with_upstream(upstream: &'a dyn MemoryResource) -> Self {
        Self::with_initial_size(DEFAULT_INITIAL_SIZE, upstream)
    }

    /// Arena whose first upstream buffer holds `initial_size` bytes,
    /// rounded up to [`MAX_ALIGN`]. Zero selects [`DEFAULT_INITIAL_SIZE`].
    pub fn with_initial_size(initial_size: usize, upstream: &'a dyn MemoryResource) -> Self {
        let next = match initial_size {
            0 => DEFAULT_INITIAL_SIZE,
            n => align_up(n, MAX_ALIGN).unwrap_or(MAX_BUFFER_SIZE),
        };
        Self::from_parts(None, next, upstream)
    }

    /// Arena that starts in caller-provided storage.
    ///
    /// Upstream is contacted only once `buffer` is full. The first upstream
    /// buffer is twice the (rounded) length of `buffer`, capped at
    /// [`MAX_BUFFER_SIZE`].
    pub fn with_buffer(buffer: &'a mut [u8], upstream: &'a dyn MemoryResource) -> Self {
        let len = buffer.len();
        let next = match align_up(len, MAX_ALIGN) {
            Some(0) => DEFAULT_INITIAL_SIZE,
            Some(n) => n.saturating_mul(2).min(MAX_BUFFER_SIZE),
            None => MAX_BUFFER_SIZE,
        };
        let start = NonNull::from(buffer).cast::<u8>();
        Self::from_parts(Some((start, len)), next, upstream)
    }

    fn from_parts(
        initial_buffer: Option<(NonNull<u8>, usize)>,
        next_buffer_size: usize,
        upstream: &'a dyn MemoryResource,
    ) -> Self {
        let buffer = match initial_buffer {
            // SAFETY: the storage is borrowed mutably for `'a`, which
            // outlives this resource.
            Some((start, len)) => unsafe { BufferManager::new(start, len) },
            None => BufferManager::empty(),
        };
        Self {
            state: RefCell::new(MonotonicState {
                buffer,
                history: SimplePoolManager::new(upstream),
                next_buffer_size,
            }),
            initial_buffer,
            initial_next_size: next_buffer_size,
            _buffer: PhantomData,
        }
    }

    /// Return every upstream buffer and restore the freshly constructed
    /// state: the caller buffer (if any) is reused from its start and the
    /// growth size is back to its initial value.
    pub fn release(&mut self) {
        let initial_buffer = self.initial_buffer;
        let initial_next_size = self.initial_next_size;
        let state = self.state.get_mut();

        let buffers = state.history.block_count();
        state.history.release();
        state.buffer = match initial_buffer {
            // SAFETY: as in `from_parts`.
            Some((start, len)) => unsafe { BufferManager::new(start, len) },
            None => BufferManager::empty(),
        };
        state.next_buffer_size = initial_next_size;
        log::debug!("monotonic arena released {buffers} upstream buffers");
    }

    /// Size of the next buffer requested from upstream.
    pub fn next_buffer_size(&self) -> usize {
        self.state.borrow().next_buffer_size
    }

    /// Buffers currently held from upstream.
    pub fn upstream_buffer_count(&self) -> usize {
        self.state.borrow().history.block_count()
    }

    /// Bytes left in the current buffer.
    pub fn remaining(&self) -> usize {
        self.state.borrow().buffer.remaining()
    }

    /// The resource buffers are drawn from.
    pub fn upstream(&self) -> &'a dyn MemoryResource {
        self.state.borrow().history.upstream()
    }
}

impl MemoryResource for MonotonicBufferResource<'_> {
    fn allocate(&self, bytes: usize, alignment: usize) -> Result<NonNull<u8>, AllocError> {
        if !is_valid_alignment(alignment) {
            return Err(AllocError::InvalidLayout { bytes, alignment });
        }
        let mut state = self.state.borrow_mut();
        if let Some(ptr) = state.buffer.allocate(bytes, alignment) {
            return Ok(ptr);
        }

        let needed = rounded_size(bytes, alignment)?;
        let size = state.next_buffer_size.max(needed);
        // Aligned to the request, so it fits at offset zero.
        let fresh = state
            .history
            .allocate(size, alignment.max(MAX_ALIGN))?
            .ok_or(AllocError::InvalidLayout { bytes, alignment })?;
        // SAFETY: `fresh` holds `size` bytes owned by `history` until release.
        unsafe { state.buffer.replace_buffer(fresh, size) };
        state.next_buffer_size = size.saturating_mul(2).min(MAX_BUFFER_SIZE);
        log::debug!(
            "monotonic arena grew to a {size} byte buffer (next {})",
            state.next_buffer_size
        );

        state
            .buffer
            .allocate(bytes, alignment)
            .ok_or(AllocError::InvalidLayout { bytes, alignment })
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _bytes: usize, _alignment: usize) {}
}

impl fmt::Debug for MonotonicBufferResource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MonotonicBufferResource")
            .field("buffer_size", &state.buffer.buffer_size())
            .field("used", &state.buffer.used())
            .field("next_buffer_size", &state.next_buffer_size)
            .field("upstream_buffers", &state.history.block_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marl_core::resources_equal;
    use marl_test_utils::{CountingResource, FailingResource};

    #[repr(C, align(64))]
    struct Backing([u8; 128]);

    #[test]
    fn second_allocation_grows_once() {
        let counting = CountingResource::new();
        let arena = MonotonicBufferResource::with_initial_size(64, &counting);

        let a = arena.allocate(40, 8).unwrap();
        assert_eq!(arena.upstream_buffer_count(), 1);
        assert_eq!(arena.next_buffer_size(), 128);

        let b = arena.allocate(40, 8).unwrap();
        assert_eq!(arena.upstream_buffer_count(), 2);
        assert_eq!(arena.next_buffer_size(), 256);

        let requests = counting.requests();
        assert_eq!(requests[1].0 - requests[0].0, 64);
        assert_ne!(counting.block_of(a), counting.block_of(b));
    }

    #[test]
    fn fits_stay_in_current_buffer() {
        let counting = CountingResource::new();
        let arena = MonotonicBufferResource::with_initial_size(256, &counting);
        let a = arena.allocate(16, 16).unwrap();
        let b = arena.allocate(16, 16).unwrap();
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 16);
        assert_eq!(arena.upstream_buffer_count(), 1);
        assert_eq!(arena.remaining(), 256 - 32);
        assert!(resources_equal(arena.upstream(), &counting));
    }

    #[test]
    fn oversized_request_raises_buffer_size() {
        let counting = CountingResource::new();
        let arena = MonotonicBufferResource::with_initial_size(64, &counting);
        arena.allocate(1000, 8).unwrap();
        assert_eq!(arena.next_buffer_size(), 2000);
        assert_eq!(arena.remaining(), 0);
    }

    #[test]
    fn growth_is_capped() {
        let counting = CountingResource::new();
        let arena = MonotonicBufferResource::with_initial_size(MAX_BUFFER_SIZE / 2, &counting);
        arena.allocate(1, 1).unwrap();
        assert_eq!(arena.next_buffer_size(), MAX_BUFFER_SIZE);
        arena.allocate(MAX_BUFFER_SIZE / 2, 1).unwrap();
        assert_eq!(arena.next_buffer_size(), MAX_BUFFER_SIZE);

        // A request above the cap gets a buffer of its own size.
        arena.allocate(2 * MAX_BUFFER_SIZE, 1).unwrap();
        assert_eq!(arena.next_buffer_size(), MAX_BUFFER_SIZE);
    }

    #[test]
    fn over_aligned_growth_is_aligned() {
        let counting = CountingResource::new();
        let arena = MonotonicBufferResource::with_initial_size(64, &counting);
        let p = arena.allocate(8, 4096).unwrap();
        assert_eq!(p.as_ptr() as usize % 4096, 0);
        assert_eq!(counting.requests()[0].1, 4096);
    }

    #[test]
    fn zero_initial_size_uses_default() {
        let counting = CountingResource::new();
        let arena = MonotonicBufferResource::with_initial_size(0, &counting);
        assert_eq!(arena.next_buffer_size(), DEFAULT_INITIAL_SIZE);
        let arena = MonotonicBufferResource::with_initial_size(20, &counting);
        assert_eq!(arena.next_buffer_size(), align_up(20, MAX_ALIGN).unwrap());
    }

    #[test]
    fn deallocate_is_a_no_op() {
        let counting = CountingResource::new();
        let arena = MonotonicBufferResource::with_initial_size(64, &counting);
        let a = arena.allocate(32, 8).unwrap();
        unsafe { arena.deallocate(a, 32, 8) };
        let b = arena.allocate(32, 8).unwrap();
        assert_ne!(a, b);
        assert_eq!(counting.stats().deallocations, 0);
    }

    #[test]
    fn caller_buffer_is_used_first_and_restored() {
        let mut backing = Backing([0; 128]);
        let start = backing.0.as_ptr() as usize;
        let counting = CountingResource::new();
        let mut arena = MonotonicBufferResource::with_buffer(&mut backing.0, &counting);
        assert_eq!(arena.next_buffer_size(), 256);

        let a = arena.allocate(100, 4).unwrap();
        assert_eq!(a.as_ptr() as usize, start);
        assert_eq!(counting.stats().allocations, 0);

        arena.allocate(100, 4).unwrap();
        assert_eq!(counting.stats().allocations, 1);
        assert_eq!(counting.requests()[0].1, MAX_ALIGN);

        arena.release();
        counting.assert_all_returned();
        assert_eq!(arena.next_buffer_size(), 256);
        assert_eq!(arena.allocate(100, 4).unwrap().as_ptr() as usize, start);
    }

    #[test]
    fn release_restores_fresh_state() {
        let counting = CountingResource::new();
        let mut arena = MonotonicBufferResource::with_initial_size(64, &counting);
        for _ in 0..20 {
            arena.allocate(48, 16).unwrap();
        }
        arena.release();
        counting.assert_all_returned();
        assert_eq!(arena.next_buffer_size(), 64);
        assert_eq!(arena.upstream_buffer_count(), 0);
        assert_eq!(arena.remaining(), 0);

        arena.release();
        assert_eq!(counting.stats().deallocations, counting.stats().allocations);

        arena.allocate(40, 8).unwrap();
        assert_eq!(arena.next_buffer_size(), 128);
    }

    #[test]
    fn upstream_failure_changes_nothing() {
        let failing = FailingResource::after(0);
        let arena = MonotonicBufferResource::with_initial_size(64, &failing);
        let err = arena.allocate(8, 8).unwrap_err();
        assert!(err.is_out_of_memory());
        assert_eq!(arena.next_buffer_size(), 64);
        assert_eq!(arena.upstream_buffer_count(), 0);
    }

    #[test]
    fn bad_alignment_is_rejected() {
        let arena =
            MonotonicBufferResource::with_initial_size(64, marl_core::null_memory_resource());
        assert_eq!(
            arena.allocate(8, 3),
            Err(AllocError::InvalidLayout {
                bytes: 8,
                alignment: 3
            })
        );
    }

    #[test]
    fn equality_is_identity() {
        let counting = CountingResource::new();
        let a = MonotonicBufferResource::with_upstream(&counting);
        let b = MonotonicBufferResource::with_upstream(&counting);
        assert!(resources_equal(&a, &a));
        assert!(!resources_equal(&a, &b));
    }

    #[test]
    fn drop_returns_buffers() {
        let counting = CountingResource::new();
        {
            let arena = MonotonicBufferResource::with_initial_size(32, &counting);
            for _ in 0..10 {
                arena.allocate(24, 8).unwrap();
            }
        }
        counting.assert_all_returned();
    }
}
