//! Size and alignment arithmetic shared by every resource.

use std::ptr::NonNull;

use crate::error::AllocError;

/// The platform's fundamental alignment, approximating C's
/// `alignof(max_align_t)` as two machine words.
///
/// 32-bit x86 is pinned to 16 because its `max_align_t` (and Rust's
/// `u128`) is 16-aligned there. Pool size classes are multiples of this
/// value and upstream blocks are always requested with at least this
/// alignment.
#[cfg(not(target_arch = "x86"))]
pub const MAX_ALIGN: usize = 2 * std::mem::size_of::<usize>();

/// The platform's fundamental alignment, matching `alignof(max_align_t)`
/// on 32-bit x86.
#[cfg(target_arch = "x86")]
pub const MAX_ALIGN: usize = 16;

/// Alignment to use when the caller has no stronger requirement.
pub const DEFAULT_ALIGNMENT: usize = MAX_ALIGN;

const _: () = assert!(MAX_ALIGN.is_power_of_two());

/// Whether `alignment` is usable: a non-zero power of two.
#[inline]
pub fn is_valid_alignment(alignment: usize) -> bool {
    alignment.is_power_of_two()
}

/// Round `bytes` up to the next multiple of `alignment`.
///
/// Returns `None` on overflow. `alignment` must be a power of two.
#[inline]
pub fn align_up(bytes: usize, alignment: usize) -> Option<usize> {
    debug_assert!(is_valid_alignment(alignment));
    let mask = alignment - 1;
    bytes.checked_add(mask).map(|n| n & !mask)
}

/// Number of padding bytes needed to move `addr` up to `alignment`.
#[inline]
pub fn padding_for(addr: usize, alignment: usize) -> usize {
    debug_assert!(is_valid_alignment(alignment));
    addr.wrapping_neg() & (alignment - 1)
}

/// Validate a `(bytes, alignment)` request and return the rounded size.
///
/// # Errors
///
/// [`AllocError::InvalidLayout`] if `alignment` is not a power of two or the
/// rounded size overflows.
pub fn rounded_size(bytes: usize, alignment: usize) -> Result<usize, AllocError> {
    if !is_valid_alignment(alignment) {
        return Err(AllocError::InvalidLayout { bytes, alignment });
    }
    align_up(bytes, alignment).ok_or(AllocError::InvalidLayout { bytes, alignment })
}

/// A non-null pointer aligned to `alignment` that owns no memory.
///
/// Returned for zero-byte requests. It must never be dereferenced.
pub fn dangling(alignment: usize) -> NonNull<u8> {
    NonNull::new(std::ptr::without_provenance_mut(alignment)).unwrap_or(NonNull::dangling())
}
