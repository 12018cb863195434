use std::{alloc::Layout, ptr::NonNull};

use crate::error::{Error, Result};

use super::MemResource;

/// Pass-through strategy: defers every request to the host's
/// general-purpose allocator.
pub struct SystemResource {
    _priv: (),
}

pub(crate) static SYSTEM: SystemResource = SystemResource { _priv: () };

/// The process-wide pass-through instance. All handles obtained here point
/// at the same strategy and compare equal.
pub fn system_resource() -> &'static SystemResource {
    &SYSTEM
}

impl MemResource for SystemResource {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        if layout.size() == 0 {
            return Ok(super::dangling(layout));
        }

        // Safety: layout has a non-zero size
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(Error::Exhausted {
            bytes: layout.size(),
            align: layout.align(),
        })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) };
        }
    }
}
