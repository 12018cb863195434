use std::{alloc::Layout, ptr::NonNull};

use crate::error::{Error, Result};

pub mod bump_arena;
pub mod null;
pub mod system;

/// Largest alignment the host guarantees for any primitive type. Requests
/// that do not care about alignment get this one.
pub const MAX_ALIGN: usize = if align_of::<u128>() > align_of::<usize>() {
    align_of::<u128>()
} else {
    align_of::<usize>()
};

/// Contract every allocation strategy implements. `allocate` and
/// `deallocate` are the only extension points; construction policy,
/// rebinding and alignment defaults live in the adapter layer.
///
/// A returned pointer is a capability token: the caller hands it back to
/// `deallocate` unchanged, together with the layout it remembered, and the
/// strategy decides when the memory is actually reclaimed.
pub trait MemResource {
    /// Returns storage of at least `layout.size()` bytes aligned to
    /// `layout.align()`, or [`Error::Exhausted`] when the strategy cannot
    /// satisfy the request.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>>;

    /// Releases storage previously returned by `allocate`.
    ///
    /// Strategies may treat this as a true free or a no-op.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this same instance
    /// with a matching `layout`, and must not be released twice.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Strategy-defined handle equality. Identity by default; used only for
    /// comparing two allocator handles, never for allocation behavior.
    fn is_equal(&self, other: &dyn MemResource) -> bool {
        std::ptr::addr_eq(self as *const Self, other as *const dyn MemResource)
    }

    /// `allocate` at [`MAX_ALIGN`].
    fn allocate_default(&self, bytes: usize) -> Result<NonNull<u8>> {
        let layout = Layout::from_size_align(bytes, MAX_ALIGN)
            .map_err(|_| Error::Overflow { count: bytes, size: 1 })?;
        self.allocate(layout)
    }

    /// `deallocate` at [`MAX_ALIGN`].
    ///
    /// # Safety
    ///
    /// Same contract as [`MemResource::deallocate`]; `ptr` must come from
    /// [`MemResource::allocate_default`] with the same `bytes`.
    unsafe fn deallocate_default(&self, ptr: NonNull<u8>, bytes: usize) {
        let Ok(layout) = Layout::from_size_align(bytes, MAX_ALIGN) else {
            debug_assert!(false, "deallocate size was never allocatable");
            return;
        };
        unsafe { self.deallocate(ptr, layout) }
    }
}

/// Two handles are equal when they point at the same strategy instance or
/// when the strategy's own predicate says so.
pub fn resource_eq(a: &dyn MemResource, b: &dyn MemResource) -> bool {
    std::ptr::addr_eq(a as *const dyn MemResource, b as *const dyn MemResource) || a.is_equal(b)
}

/// Zero-size requests get a well-aligned address and no storage.
pub(crate) fn dangling(layout: Layout) -> NonNull<u8> {
    // align is a power of two, so never zero
    unsafe { NonNull::new_unchecked(std::ptr::without_provenance_mut(layout.align())) }
}
