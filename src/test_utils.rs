use std::{alloc::Layout, cell::RefCell, ptr::NonNull};

use parking_lot::Mutex;

use crate::{
    error::Result,
    resource::{MemResource, system::system_resource},
};

/// Tests that touch the process-wide default resource serialize on this.
pub(crate) static GLOBAL_RESOURCE_LOCK: Mutex<()> = Mutex::new(());

/// Upstream that records every request it serves, backed by the
/// pass-through strategy.
#[derive(Default)]
pub(crate) struct RecordingResource {
    allocs: RefCell<Vec<Layout>>,
    deallocs: RefCell<Vec<Layout>>,
}

impl RecordingResource {
    pub(crate) fn alloc_count(&self) -> usize {
        self.allocs.borrow().len()
    }

    pub(crate) fn dealloc_count(&self) -> usize {
        self.deallocs.borrow().len()
    }

    pub(crate) fn alloc_sizes(&self) -> Vec<usize> {
        self.allocs.borrow().iter().map(Layout::size).collect()
    }
}

impl MemResource for RecordingResource {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        let ptr = system_resource().allocate(layout)?;
        self.allocs.borrow_mut().push(layout);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.deallocs.borrow_mut().push(layout);
        unsafe { system_resource().deallocate(ptr, layout) }
    }
}
