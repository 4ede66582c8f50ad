//! Low-level primitives for reading and writing bookkeeping records inside
//! raw memory.
//!
//! Every `unsafe` pointer access in the crate goes through one of the
//! functions here. Each carries its own `# Safety` contract.

use std::mem;
use std::ptr::NonNull;

use marl_core::MAX_ALIGN;

/// Header placed at the start of every upstream block owned by a
/// [`SimplePoolManager`](crate::block_list::SimplePoolManager).
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub(crate) struct BlockHeader {
    /// Next block in the owning manager's list.
    pub next: Option<NonNull<BlockHeader>>,
    /// Total bytes requested from upstream, header included.
    pub bytes: usize,
    /// Alignment requested from upstream.
    pub alignment: usize,
}

/// Free-list record overlaid on the first bytes of a released pool block.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub(crate) struct FreeLink {
    pub next: Option<NonNull<FreeLink>>,
}

// Every pool block is at least MAX_ALIGN bytes and MAX_ALIGN aligned.
const _: () = assert!(mem::size_of::<FreeLink>() <= MAX_ALIGN);
const _: () = assert!(mem::align_of::<FreeLink>() <= MAX_ALIGN);
// Upstream blocks are requested with at least MAX_ALIGN alignment.
const _: () = assert!(mem::align_of::<BlockHeader>() <= MAX_ALIGN);

/// Advance `base` by `offset` bytes.
///
/// # Safety
///
/// `base + offset` must stay within (or one past the end of) the
/// allocation `base` points into.
#[inline]
pub(crate) unsafe fn byte_add(base: NonNull<u8>, offset: usize) -> NonNull<u8> {
    // SAFETY: in bounds per the caller; an in-bounds offset from a non-null
    // pointer is non-null.
    unsafe { base.add(offset) }
}

/// Write `header` at the start of `block`.
///
/// # Safety
///
/// `block` must be valid for writes of `size_of::<BlockHeader>()` bytes and
/// aligned for `BlockHeader`.
#[inline]
pub(crate) unsafe fn write_header(block: NonNull<u8>, header: BlockHeader) -> NonNull<BlockHeader> {
    let block = block.cast::<BlockHeader>();
    // SAFETY: valid and aligned per the caller.
    unsafe { block.as_ptr().write(header) };
    block
}

/// Read the header of a block written by [`write_header`].
///
/// # Safety
///
/// `block` must point to a header written by [`write_header`] whose memory
/// has not been returned upstream.
#[inline]
pub(crate) unsafe fn read_header(block: NonNull<BlockHeader>) -> BlockHeader {
    // SAFETY: live, initialized header per the caller.
    unsafe { block.as_ptr().read() }
}

/// Overwrite the `next` link of a live header.
///
/// # Safety
///
/// Same as [`read_header`].
#[inline]
pub(crate) unsafe fn set_next(block: NonNull<BlockHeader>, next: Option<NonNull<BlockHeader>>) {
    // SAFETY: live, initialized header per the caller.
    unsafe { (*block.as_ptr()).next = next };
}

/// Push `block` onto the free list headed by `head`.
///
/// # Safety
///
/// `block` must be valid for writes of `size_of::<FreeLink>()` bytes,
/// aligned for `FreeLink`, and not in use by anyone else until popped.
#[inline]
pub(crate) unsafe fn push_free(head: &mut Option<NonNull<FreeLink>>, block: NonNull<u8>) {
    let link = block.cast::<FreeLink>();
    // SAFETY: per the caller.
    unsafe { link.as_ptr().write(FreeLink { next: *head }) };
    *head = Some(link);
}

/// Pop the head of the free list, if any.
///
/// # Safety
///
/// Every link reachable from `head` must have been written by
/// [`push_free`] into memory that is still allocated.
#[inline]
pub(crate) unsafe fn pop_free(head: &mut Option<NonNull<FreeLink>>) -> Option<NonNull<u8>> {
    let link = (*head)?;
    // SAFETY: live link per the caller.
    *head = unsafe { link.as_ptr().read() }.next;
    Some(link.cast())
}

/// Count the links reachable from `head`.
///
/// # Safety
///
/// Same as [`pop_free`].
pub(crate) unsafe fn free_list_len(head: Option<NonNull<FreeLink>>) -> usize {
    let mut len = 0;
    let mut cursor = head;
    while let Some(link) = cursor {
        len += 1;
        // SAFETY: live link per the caller.
        cursor = unsafe { link.as_ptr().read() }.next;
    }
    len
}
