//! The process-wide default resource.
//!
//! Consumers constructed without an explicit resource bind to whatever
//! [`get_default_resource`] returns at that moment and keep it for their
//! whole lifetime. Swapping the default later never affects them.

use std::sync::{Mutex, PoisonError};

use crate::builtin::new_delete_resource;
use crate::resource::MemoryResource;

/// A resource that may be installed as the process-wide default.
///
/// It must live for the rest of the program and be shareable across
/// threads, since any thread may pick it up.
pub type SharedResource = &'static (dyn MemoryResource + Sync);

/// `None` until first access, then the current default.
static DEFAULT_RESOURCE: Mutex<Option<SharedResource>> = Mutex::new(None);

/// The current default resource.
///
/// Initialized to [`new_delete_resource`] on first use.
pub fn get_default_resource() -> SharedResource {
    let mut slot = DEFAULT_RESOURCE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    *slot.get_or_insert_with(|| new_delete_resource() as SharedResource)
}

/// Install `resource` as the default and return the previous one.
///
/// `None` restores [`new_delete_resource`].
pub fn set_default_resource(resource: Option<SharedResource>) -> SharedResource {
    let next = resource.unwrap_or_else(|| new_delete_resource() as SharedResource);
    let mut slot = DEFAULT_RESOURCE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let previous = slot
        .replace(next)
        .unwrap_or_else(|| new_delete_resource() as SharedResource);
    log::debug!(
        "default memory resource replaced ({:p} -> {:p})",
        previous as *const dyn MemoryResource,
        next as *const dyn MemoryResource,
    );
    previous
}
