//! Integration test: contracts every resource strategy must honour.
//!
//! Each strategy runs over a `CountingResource`, which panics on a
//! mismatched or repeated upstream free, so a test that completes has also
//! proven the upstream contract.

use std::ptr::NonNull;

use marl_arena::{MonotonicBufferResource, PoolOptions, UnsynchronizedPoolResource};
use marl_core::{
    new_delete_resource, null_memory_resource, resources_equal, AllocError, MemoryResource,
    PolymorphicAllocator, MAX_ALIGN,
};
use marl_test_utils::{assert_disjoint, CountingResource, FailingResource};
use proptest::prelude::*;

// ── Helpers ──────────────────────────────────────────────────────────

/// Allocate every `(bytes, alignment)` pair and check the results.
fn allocate_all(
    resource: &dyn MemoryResource,
    requests: &[(usize, usize)],
) -> Vec<(NonNull<u8>, usize, usize)> {
    let live: Vec<_> = requests
        .iter()
        .map(|&(bytes, alignment)| {
            let p = resource.allocate(bytes, alignment).unwrap();
            assert_eq!(p.as_ptr() as usize % alignment, 0);
            (p, bytes, alignment)
        })
        .collect();
    let ranges: Vec<_> = live.iter().map(|&(p, bytes, _)| (p, bytes)).collect();
    assert_disjoint(&ranges);
    live
}

/// Fill every live block with a distinct byte, then check none were
/// clobbered by a neighbour.
fn scribble_and_verify(live: &[(NonNull<u8>, usize, usize)]) {
    for (i, &(p, bytes, _)) in live.iter().enumerate() {
        unsafe { p.as_ptr().write_bytes(i as u8, bytes) };
    }
    for (i, &(p, bytes, _)) in live.iter().enumerate() {
        let slice = unsafe { std::slice::from_raw_parts(p.as_ptr(), bytes) };
        assert!(slice.iter().all(|&b| b == i as u8), "block {i} was overwritten");
    }
}

fn free_all(resource: &dyn MemoryResource, live: Vec<(NonNull<u8>, usize, usize)>) {
    for (p, bytes, alignment) in live {
        unsafe { resource.deallocate(p, bytes, alignment) };
    }
}

const MIXED: &[(usize, usize)] = &[
    (1, 1),
    (7, 1),
    (16, 16),
    (24, 8),
    (100, 4),
    (256, 16),
    (257, 8),
    (4000, 64),
    (0, 8),
    (33, 32),
];

// ── Round trip and release ───────────────────────────────────────────

#[test]
fn monotonic_round_trip_and_release() {
    let counting = CountingResource::new();
    let mut arena = MonotonicBufferResource::with_initial_size(64, &counting);

    let live = allocate_all(&arena, MIXED);
    scribble_and_verify(&live);
    free_all(&arena, live);
    assert!(counting.live_blocks() > 0);

    arena.release();
    counting.assert_all_returned();

    // Behaves like a fresh instance.
    let fresh = CountingResource::new();
    let reference = MonotonicBufferResource::with_initial_size(64, &fresh);
    assert_eq!(arena.next_buffer_size(), reference.next_buffer_size());
    allocate_all(&arena, MIXED);
    allocate_all(&reference, MIXED);
    assert_eq!(counting.requests().len() / 2, fresh.requests().len());
}

#[test]
fn pool_round_trip_and_release() {
    let counting = CountingResource::new();
    let mut pool = UnsynchronizedPoolResource::with_options_and_upstream(
        PoolOptions::default(),
        &counting,
    );

    for _ in 0..3 {
        let live = allocate_all(&pool, MIXED);
        scribble_and_verify(&live);
        free_all(&pool, live);
    }
    // Pooled chunks are retained until release; oversized ones are not.
    assert_eq!(pool.oversized_count(), 0);
    assert!(counting.live_blocks() > 0);

    pool.release();
    counting.assert_all_returned();
    pool.release();
    counting.assert_all_returned();
}

#[test]
fn pool_reuses_memory_across_rounds() {
    let counting = CountingResource::new();
    let pool = UnsynchronizedPoolResource::with_options_and_upstream(
        PoolOptions::default(),
        &counting,
    );
    let sizes: Vec<(usize, usize)> = (1..=64).map(|i| (i * 4, 4)).collect();

    let live = allocate_all(&pool, &sizes);
    free_all(&pool, live);
    let chunks = pool.chunk_count();
    let requests = counting.requests().len();

    for _ in 0..10 {
        let live = allocate_all(&pool, &sizes);
        free_all(&pool, live);
    }
    assert_eq!(pool.chunk_count(), chunks);
    assert_eq!(counting.requests().len(), requests);
}

// ── Growth ───────────────────────────────────────────────────────────

#[test]
fn monotonic_doubles_from_64() {
    let counting = CountingResource::new();
    let arena = MonotonicBufferResource::with_initial_size(64, &counting);

    let first = arena.allocate(40, 8).unwrap();
    let buffers_after_first = arena.upstream_buffer_count();
    let second = arena.allocate(40, 8).unwrap();

    assert_eq!(arena.upstream_buffer_count(), buffers_after_first + 1);
    let requests = counting.requests();
    let (first_request, second_request) = (requests[0].0, requests[1].0);
    assert_eq!(second_request - first_request, 128 - 64);
    assert!(counting.owns(second));
    assert_ne!(counting.block_of(first), counting.block_of(second));
}

// ── Nesting ──────────────────────────────────────────────────────────

#[test]
fn pool_over_monotonic() {
    let counting = CountingResource::new();
    let mut arena = MonotonicBufferResource::with_initial_size(256, &counting);
    {
        let pool = UnsynchronizedPoolResource::with_options_and_upstream(
            PoolOptions::new(8, 128),
            &arena,
        );
        let live = allocate_all(&pool, MIXED);
        scribble_and_verify(&live);
        free_all(&pool, live);

        // Every pool request landed in arena memory.
        assert!(arena.upstream_buffer_count() > 0);
    }
    // The pool handed its chunks back, but the arena only frees on release.
    assert!(counting.live_blocks() > 0);
    arena.release();
    counting.assert_all_returned();
}

#[test]
fn monotonic_over_pool() {
    let counting = CountingResource::new();
    let mut pool = UnsynchronizedPoolResource::with_options_and_upstream(
        PoolOptions::default(),
        &counting,
    );
    {
        let arena = MonotonicBufferResource::with_initial_size(32, &pool);
        let live = allocate_all(&arena, MIXED);
        scribble_and_verify(&live);
    }
    pool.release();
    counting.assert_all_returned();
}

// ── Failure propagation ──────────────────────────────────────────────

#[test]
fn failures_propagate_unchanged() {
    let null = null_memory_resource();
    let arena = MonotonicBufferResource::with_initial_size(64, null);
    let pool =
        UnsynchronizedPoolResource::with_options_and_upstream(PoolOptions::default(), null);

    for resource in [&arena as &dyn MemoryResource, &pool] {
        let err = resource.allocate(8, 8).unwrap_err();
        assert!(matches!(err, AllocError::OutOfMemory { .. }));
        assert!(!err.to_string().is_empty());
    }
}

#[test]
fn failed_growth_keeps_earlier_blocks_valid() {
    let failing = FailingResource::after(1);
    let arena = MonotonicBufferResource::with_initial_size(64, &failing);
    let a = arena.allocate(64, 8).unwrap();
    unsafe { a.as_ptr().write_bytes(0xAB, 64) };

    assert!(arena.allocate(8, 8).unwrap_err().is_out_of_memory());
    assert_eq!(failing.failures(), 1);
    assert_eq!(unsafe { *a.as_ptr().add(63) }, 0xAB);

    failing.refill(1);
    arena.allocate(8, 8).unwrap();
}

// ── Typed allocator ──────────────────────────────────────────────────

#[test]
fn typed_allocator_over_each_strategy() {
    let counting = CountingResource::new();
    let mut arena = MonotonicBufferResource::with_initial_size(64, &counting);
    let pool = UnsynchronizedPoolResource::with_options_and_upstream(
        PoolOptions::default(),
        &counting,
    );

    for resource in [&arena as &dyn MemoryResource, &pool] {
        let alloc = PolymorphicAllocator::<u64>::with_resource(resource);
        let p = alloc.allocate(10).unwrap();
        unsafe {
            for i in 0..10 {
                p.as_ptr().add(i).write(i as u64 * 3);
            }
            assert_eq!(*p.as_ptr().add(9), 27);
            alloc.deallocate(p, 10);
        }

        let bytes = alloc.rebind::<u8>();
        assert_eq!(alloc, bytes);
    }

    let a = PolymorphicAllocator::<u32>::with_resource(&arena);
    let b = PolymorphicAllocator::<u32>::with_resource(&pool);
    let copy = a;
    assert_ne!(a, b);
    assert_eq!(a, copy);

    drop(pool);
    arena.release();
    counting.assert_all_returned();
}

#[test]
fn typed_allocator_overflow_is_reported() {
    let arena = MonotonicBufferResource::with_upstream(new_delete_resource());
    let alloc = PolymorphicAllocator::<u64>::with_resource(&arena);
    assert!(matches!(
        alloc.allocate(usize::MAX),
        Err(AllocError::CapacityOverflow { .. })
    ));
    assert_eq!(arena.upstream_buffer_count(), 0);
}

// ── Equality ─────────────────────────────────────────────────────────

#[test]
fn resources_are_equal_only_to_themselves() {
    let arena = MonotonicBufferResource::with_upstream(new_delete_resource());
    let pool = UnsynchronizedPoolResource::with_options_and_upstream(
        PoolOptions::default(),
        new_delete_resource(),
    );
    assert!(resources_equal(&arena, &arena));
    assert!(resources_equal(&pool, &pool));
    assert!(!resources_equal(&arena, &pool));
    assert!(!resources_equal(new_delete_resource(), null_memory_resource()));
    assert!(resources_equal(new_delete_resource(), new_delete_resource()));
}

// ── Properties ───────────────────────────────────────────────────────

fn request() -> impl Strategy<Value = (usize, usize)> {
    (0usize..2048, 0u32..8).prop_map(|(bytes, shift)| (bytes, 1usize << shift))
}

proptest! {
    #[test]
    fn monotonic_allocations_are_disjoint(
        initial in 0usize..512,
        requests in prop::collection::vec(request(), 1..64),
    ) {
        let counting = CountingResource::new();
        let mut arena = MonotonicBufferResource::with_initial_size(initial, &counting);
        let live = allocate_all(&arena, &requests);
        scribble_and_verify(&live);
        arena.release();
        counting.assert_all_returned();
    }

    #[test]
    fn pool_allocations_are_disjoint(
        max_blocks in 0usize..8,
        largest in 0usize..300,
        requests in prop::collection::vec(request(), 1..64),
    ) {
        let counting = CountingResource::new();
        let mut pool = UnsynchronizedPoolResource::with_options_and_upstream(
            PoolOptions::new(max_blocks, largest),
            &counting,
        );
        prop_assert_eq!(pool.max_block_size() % MAX_ALIGN, 0);
        let live = allocate_all(&pool, &requests);
        scribble_and_verify(&live);
        free_all(&pool, live);
        pool.release();
        counting.assert_all_returned();
    }

    #[test]
    fn pool_reuse_is_lifo(bytes in 1usize..=256) {
        let pool = UnsynchronizedPoolResource::with_options_and_upstream(
            PoolOptions::default(),
            new_delete_resource(),
        );
        let p = pool.allocate(bytes, 1).unwrap();
        let q = pool.allocate(bytes, 1).unwrap();
        unsafe {
            pool.deallocate(p, bytes, 1);
            pool.deallocate(q, bytes, 1);
        }
        prop_assert_eq!(pool.allocate(bytes, 1).unwrap(), q);
        prop_assert_eq!(pool.allocate(bytes, 1).unwrap(), p);
    }

    #[test]
    fn pool_index_depends_only_on_bytes(bytes in 0usize..4096, other in 0usize..4096) {
        type R = UnsynchronizedPoolResource<'static>;
        prop_assert_eq!(R::pool_index(bytes), R::pool_index(bytes));
        if bytes.div_ceil(MAX_ALIGN) == other.div_ceil(MAX_ALIGN) && bytes > 0 && other > 0 {
            prop_assert_eq!(R::pool_index(bytes), R::pool_index(other));
        }
    }
}
