use std::{alloc::Layout, ptr::NonNull};

use crate::error::{Error, Result};

use super::MemResource;

/// Sink strategy: every allocation fails. Useful as an arena upstream in
/// tests and to cap fallback chains.
pub struct NullResource {
    _priv: (),
}

static NULL: NullResource = NullResource { _priv: () };

/// The process-wide sink instance.
pub fn null_resource() -> &'static NullResource {
    &NULL
}

impl MemResource for NullResource {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        Err(Error::Exhausted {
            bytes: layout.size(),
            align: layout.align(),
        })
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}
}
