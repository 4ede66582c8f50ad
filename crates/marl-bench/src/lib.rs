//! Benchmark workloads for the Marl memory resources.
//!
//! Provides deterministic allocation traces that every strategy can replay:
//!
//! - [`churn_workload`]: interleaved allocations and frees with a seeded
//!   size distribution, for measuring reuse.
//! - [`bump_workload`]: allocations only, for measuring raw throughput.
//! - [`replay`]: drive a trace against any [`MemoryResource`].

#![deny(rustdoc::broken_intra_doc_links)]

use std::ptr::NonNull;

use marl_core::{AllocError, MemoryResource};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// One step of an allocation trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// Allocate `bytes` at `alignment` and keep the block live.
    Alloc {
        /// Requested size.
        bytes: usize,
        /// Requested alignment, a power of two.
        alignment: usize,
    },
    /// Free the live block at this index (modulo the live count).
    Free(usize),
}

/// Mostly small requests with an occasional large one, mirroring what
/// containers of small nodes ask for.
fn sample_request(rng: &mut ChaCha8Rng) -> (usize, usize) {
    let roll = rng.next_u32();
    let bytes = match roll % 16 {
        0 => 512 + (roll >> 8) as usize % 4096,
        1..=3 => 64 + (roll >> 8) as usize % 192,
        _ => 1 + (roll >> 8) as usize % 64,
    };
    let alignment = 1 << ((roll >> 4) % 4);
    (bytes, alignment)
}

/// `len` steps of allocations and frees, seeded for reproducibility.
///
/// Roughly one step in three frees a live block, so the live set grows
/// slowly while blocks are constantly recycled.
pub fn churn_workload(seed: u64, len: usize) -> Vec<Op> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            if rng.next_u32() % 3 == 0 {
                Op::Free(rng.next_u32() as usize)
            } else {
                let (bytes, alignment) = sample_request(&mut rng);
                Op::Alloc { bytes, alignment }
            }
        })
        .collect()
}

/// `len` allocations and no frees.
pub fn bump_workload(seed: u64, len: usize) -> Vec<Op> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            let (bytes, alignment) = sample_request(&mut rng);
            Op::Alloc { bytes, alignment }
        })
        .collect()
}

/// Replay `ops` against `resource`, then free whatever is still live.
///
/// Returns the number of bytes allocated over the run.
///
/// # Errors
///
/// The first allocation failure. Blocks allocated before it are freed.
pub fn replay(resource: &dyn MemoryResource, ops: &[Op]) -> Result<usize, AllocError> {
    let mut live: Vec<(NonNull<u8>, usize, usize)> = Vec::new();
    let mut total = 0;
    let mut outcome = Ok(());

    for &op in ops {
        match op {
            Op::Alloc { bytes, alignment } => match resource.allocate(bytes, alignment) {
                Ok(p) => {
                    live.push((p, bytes, alignment));
                    total += bytes;
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            },
            Op::Free(_) if live.is_empty() => {}
            Op::Free(index) => {
                let (p, bytes, alignment) = live.swap_remove(index % live.len());
                // SAFETY: `p` came from `resource` with this exact layout.
                unsafe { resource.deallocate(p, bytes, alignment) };
            }
        }
    }

    for (p, bytes, alignment) in live {
        // SAFETY: as above.
        unsafe { resource.deallocate(p, bytes, alignment) };
    }
    outcome.map(|()| total)
}
