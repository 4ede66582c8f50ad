//! Upstream block bookkeeping for bulk release.
//!
//! [`SimplePoolManager`] requests raw blocks from an upstream resource and
//! threads them onto an intrusive singly linked list so they can all be
//! returned at once. It never hands a block out twice.

use std::fmt;
use std::mem;
use std::ptr::NonNull;

use marl_core::layout::align_up;
use marl_core::{AllocError, MemoryResource, MAX_ALIGN};

use crate::raw::{self, BlockHeader};

/// Owner of every block a resource obtained from its upstream.
///
/// Each block starts with a [`BlockHeader`] recording the exact
/// `(bytes, alignment)` pair passed upstream, so [`release`](Self::release)
/// can honour the upstream's deallocation contract. The header is padded
/// to the requested alignment and the caller receives the bytes after it.
///
/// Dropping the manager releases every block.
pub struct SimplePoolManager<'u> {
    upstream: &'u dyn MemoryResource,
    head: Option<NonNull<BlockHeader>>,
}

impl<'u> SimplePoolManager<'u> {
    /// An empty manager drawing from `upstream`.
    pub fn new(upstream: &'u dyn MemoryResource) -> Self {
        Self {
            upstream,
            head: None,
        }
    }

    /// The resource blocks are drawn from.
    pub fn upstream(&self) -> &'u dyn MemoryResource {
        self.upstream
    }

    /// Obtain a block with `size` usable bytes aligned to `alignment`.
    ///
    /// Returns `Ok(None)` for `size == 0` without contacting upstream.
    ///
    /// # Errors
    ///
    /// Upstream failures are returned unchanged and the list is left as it
    /// was. [`AllocError::InvalidLayout`] if the padded size overflows.
    pub fn allocate(
        &mut self,
        size: usize,
        alignment: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        if size == 0 {
            return Ok(None);
        }
        let upstream_alignment = alignment.max(MAX_ALIGN);
        let prefix = header_prefix(upstream_alignment);
        let total = prefix
            .checked_add(size)
            .ok_or(AllocError::InvalidLayout {
                bytes: size,
                alignment,
            })?;

        let block = self.upstream.allocate(total, upstream_alignment)?;
        // SAFETY: `block` is a fresh upstream allocation of `total >= prefix`
        // bytes aligned to at least MAX_ALIGN, which covers the header.
        let header = unsafe {
            raw::write_header(
                block,
                BlockHeader {
                    next: self.head,
                    bytes: total,
                    alignment: upstream_alignment,
                },
            )
        };
        self.head = Some(header);
        // SAFETY: `prefix < total`.
        Ok(Some(unsafe { raw::byte_add(block, prefix) }))
    }

    /// Return a single block to upstream ahead of [`release`](Self::release).
    ///
    /// `ptr` is the pointer [`allocate`](Self::allocate) returned. Walks the
    /// list, so this is O(blocks). Returns `false` (and does nothing) if
    /// `ptr` is not owned by this manager.
    pub fn deallocate(&mut self, ptr: NonNull<u8>) -> bool {
        let mut prev: Option<NonNull<BlockHeader>> = None;
        let mut cursor = self.head;
        while let Some(block) = cursor {
            // SAFETY: every block on the list is live until released.
            let header = unsafe { raw::read_header(block) };
            // SAFETY: the prefix was in bounds when the block was handed out.
            let payload = unsafe { raw::byte_add(block.cast(), header_prefix(header.alignment)) };
            if payload == ptr {
                match prev {
                    // SAFETY: `prev` is a live block on the list.
                    Some(prev) => unsafe { raw::set_next(prev, header.next) },
                    None => self.head = header.next,
                }
                // SAFETY: the header records the exact request made upstream.
                unsafe {
                    self.upstream
                        .deallocate(block.cast(), header.bytes, header.alignment)
                };
                return true;
            }
            prev = Some(block);
            cursor = header.next;
        }
        false
    }

    /// Return every block to upstream and empty the list.
    pub fn release(&mut self) {
        let mut cursor = self.head.take();
        while let Some(block) = cursor {
            // SAFETY: every block on the list is live until released, and
            // the header records the exact request made upstream.
            unsafe {
                let header = raw::read_header(block);
                cursor = header.next;
                self.upstream
                    .deallocate(block.cast(), header.bytes, header.alignment);
            }
        }
    }

    /// Whether the manager currently owns no blocks.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Number of blocks currently owned.
    pub fn block_count(&self) -> usize {
        self.headers().count()
    }

    /// Total bytes currently held from upstream, headers included.
    pub fn upstream_bytes(&self) -> usize {
        self.headers().map(|h| h.bytes).sum()
    }

    fn headers(&self) -> impl Iterator<Item = BlockHeader> + '_ {
        // SAFETY: every block on the list is live until released, and
        // `&self` prevents a concurrent release.
        std::iter::successors(self.head.map(|b| unsafe { raw::read_header(b) }), |h| {
            h.next.map(|b| unsafe { raw::read_header(b) })
        })
    }
}

impl Drop for SimplePoolManager<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for SimplePoolManager<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimplePoolManager")
            .field("blocks", &self.block_count())
            .field("upstream_bytes", &self.upstream_bytes())
            .finish()
    }
}

/// Bytes reserved in front of the payload for the header, keeping the
/// payload aligned to `alignment`.
fn header_prefix(alignment: usize) -> usize {
    // A power of two no smaller than MAX_ALIGN cannot make this overflow.
    align_up(mem::size_of::<BlockHeader>(), alignment).unwrap_or(usize::MAX)
}
