use std::{alloc::Layout, fmt, marker::PhantomData, ptr::NonNull};

use crate::{
    construct::ConstructIn,
    error::{Error, Result},
    global::get_default_resource,
    resource::{MemResource, resource_eq},
};

/// Untyped, copyable allocator handle: one non-owning reference to a
/// strategy, never null by construction. This is what allocator-aware
/// objects store.
pub struct AllocRef<'r> {
    res: &'r dyn MemResource,
}

impl<'r> AllocRef<'r> {
    pub fn new(res: &'r dyn MemResource) -> Self {
        Self { res }
    }

    pub fn resource(&self) -> &'r dyn MemResource {
        self.res
    }

    pub fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        self.res.allocate(layout)
    }

    /// # Safety
    ///
    /// Same contract as [`MemResource::deallocate`].
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { self.res.deallocate(ptr, layout) }
    }
}

impl Clone for AllocRef<'_> {
    fn clone(&self) -> Self {
        *self
    }
}

impl Copy for AllocRef<'_> {}

impl PartialEq for AllocRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        resource_eq(self.res, other.res)
    }
}

impl Default for AllocRef<'_> {
    fn default() -> Self {
        Self::new(get_default_resource())
    }
}

impl fmt::Debug for AllocRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AllocRef")
            .field(&(self.res as *const dyn MemResource))
            .finish()
    }
}

/// Typed adapter over a strategy. Copying rebinds; in-place mutation of the
/// binding does not exist. Element-count arithmetic, the uses-allocator
/// construction protocol and rebinding all live here, so strategies stay
/// minimal.
pub struct PolyAlloc<'r, T> {
    raw: AllocRef<'r>,
    _marker: PhantomData<fn() -> T>,
}

impl<'r, T> PolyAlloc<'r, T> {
    pub fn new(res: &'r dyn MemResource) -> Self {
        Self::from_handle(AllocRef::new(res))
    }

    pub fn from_handle(raw: AllocRef<'r>) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub fn resource(&self) -> &'r dyn MemResource {
        self.raw.resource()
    }

    pub fn handle(&self) -> AllocRef<'r> {
        self.raw
    }

    /// The same binding, viewed at another element type.
    pub fn rebind<U>(&self) -> PolyAlloc<'r, U> {
        PolyAlloc::from_handle(self.raw)
    }

    /// Storage for `n` values of `T`. Fails with [`Error::Overflow`] when
    /// the byte count overflows and propagates strategy failures unchanged.
    /// `n == 0` yields a dangling pointer without consulting the strategy.
    pub fn allocate(&self, n: usize) -> Result<NonNull<T>> {
        let layout = Layout::array::<T>(n).map_err(|_| Error::Overflow {
            count: n,
            size: size_of::<T>(),
        })?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        Ok(self.raw.allocate(layout)?.cast())
    }

    /// # Safety
    ///
    /// `p` must come from [`PolyAlloc::allocate`] with this exact `n` on an
    /// adapter bound to an equal resource, and must not be released twice.
    pub unsafe fn deallocate(&self, p: NonNull<T>, n: usize) {
        let Ok(layout) = Layout::array::<T>(n) else {
            debug_assert!(false, "deallocate count was never allocatable");
            return;
        };
        if layout.size() == 0 {
            return;
        }
        unsafe { self.raw.deallocate(p.cast(), layout) }
    }

    /// Builds a `T` in place, injecting the bound allocator according to
    /// the construction form `T` declares (see [`crate::construct`]).
    ///
    /// # Safety
    ///
    /// `p` must be valid for writes of `T` and properly aligned.
    pub unsafe fn construct<Args, Form>(&self, p: NonNull<T>, args: Args)
    where
        T: ConstructIn<'r, Args, Form>,
    {
        unsafe { p.as_ptr().write(T::construct_in(args, self.raw)) }
    }

    /// Drops the value in place. Destruction never consults the allocator.
    ///
    /// # Safety
    ///
    /// `p` must point to a live, properly initialized `T`.
    pub unsafe fn destroy(&self, p: NonNull<T>) {
        unsafe { p.as_ptr().drop_in_place() }
    }

    /// The adapter a copied container should use: bound to the process
    /// default at call time, not to this adapter's resource. A bespoke
    /// arena does not silently propagate through copies.
    pub fn select_on_copy(&self) -> PolyAlloc<'static, T> {
        PolyAlloc::new(get_default_resource())
    }
}

impl<'r, A, B> PolyAlloc<'r, (A, B)> {
    /// Piecewise construction of a two-element tuple: each element resolves
    /// its own construction form independently.
    ///
    /// # Safety
    ///
    /// `p` must be valid for writes of `(A, B)` and properly aligned.
    pub unsafe fn construct_pair<ArgsA, ArgsB, FormA, FormB>(
        &self,
        p: NonNull<(A, B)>,
        first: ArgsA,
        second: ArgsB,
    ) where
        A: ConstructIn<'r, ArgsA, FormA>,
        B: ConstructIn<'r, ArgsB, FormB>,
    {
        let pair = (
            A::construct_in(first, self.raw),
            B::construct_in(second, self.raw),
        );
        unsafe { p.as_ptr().write(pair) }
    }
}

impl<T> Clone for PolyAlloc<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PolyAlloc<'_, T> {}

impl<'r, T> Default for PolyAlloc<'r, T> {
    fn default() -> Self {
        Self::new(get_default_resource())
    }
}

impl<'r, T, U> PartialEq<PolyAlloc<'r, U>> for PolyAlloc<'r, T> {
    fn eq(&self, other: &PolyAlloc<'r, U>) -> bool {
        self.raw == other.raw
    }
}

impl<T> fmt::Debug for PolyAlloc<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PolyAlloc").field(&self.raw).finish()
    }
}
