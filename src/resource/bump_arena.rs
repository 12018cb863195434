use std::{alloc::Layout, cell::Cell, ptr::NonNull};

use crate::{
    error::{Error, Result},
    global::get_default_resource,
};

use super::MemResource;

/// First upstream chunk payload when no initial size is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Ceiling for the geometric growth of chunk payloads.
const MAX_CHUNK_SIZE: usize = 4 << 20;

/// Embedded at the front of every upstream block; links the chain
/// most-recent-first.
struct ChunkHeader {
    prev: Option<NonNull<ChunkHeader>>,
    /// Layout of the whole upstream block, header included.
    layout: Layout,
}

/// Growing bump-pointer arena. Allocation is pure pointer arithmetic inside
/// the current chunk; a request that does not fit acquires exactly one new
/// chunk from the upstream strategy, sized to `max(request, next_chunk_size)`.
/// Individual deallocation is a no-op: space is only reclaimed in bulk by
/// [`BumpArena::release`] (or drop).
///
/// Single-thread use only; the interior `Cell` state keeps the type `!Sync`.
pub struct BumpArena<'up> {
    upstream: &'up dyn MemResource,
    head: Cell<Option<NonNull<ChunkHeader>>>,
    cursor: Cell<*mut u8>,
    remaining: Cell<usize>,
    next_chunk_size: Cell<usize>,
    initial_chunk_size: usize,
    seed: Option<(NonNull<u8>, usize)>,
    memory_usage: Cell<usize>,
}

impl<'up> BumpArena<'up> {
    /// Arena over the process-default upstream.
    pub fn new() -> Self {
        Self::new_in(get_default_resource())
    }

    pub fn new_in(upstream: &'up dyn MemResource) -> Self {
        Self::with_initial_size_in(DEFAULT_CHUNK_SIZE, upstream)
    }

    /// The first chunk will hold at least `initial_size` bytes.
    pub fn with_initial_size(initial_size: usize) -> Self {
        Self::with_initial_size_in(initial_size, get_default_resource())
    }

    pub fn with_initial_size_in(initial_size: usize, upstream: &'up dyn MemResource) -> Self {
        assert!(initial_size > 0, "initial chunk size must not be zero");
        Self {
            upstream,
            head: Cell::new(None),
            cursor: Cell::new(std::ptr::null_mut()),
            remaining: Cell::new(0),
            next_chunk_size: Cell::new(initial_size),
            initial_chunk_size: initial_size,
            seed: None,
            memory_usage: Cell::new(0),
        }
    }

    /// Pre-seeds the arena with a caller-supplied buffer; the upstream is
    /// not consulted until the buffer is exhausted. `release` restores the
    /// buffer instead of returning it anywhere.
    pub fn with_buffer(buffer: &'up mut [u8]) -> Self {
        Self::with_buffer_in(buffer, get_default_resource())
    }

    pub fn with_buffer_in(buffer: &'up mut [u8], upstream: &'up dyn MemResource) -> Self {
        let len = buffer.len();
        let ptr = NonNull::from(buffer).cast::<u8>();
        let next = len.max(DEFAULT_CHUNK_SIZE);
        Self {
            upstream,
            head: Cell::new(None),
            cursor: Cell::new(ptr.as_ptr()),
            remaining: Cell::new(len),
            next_chunk_size: Cell::new(next),
            initial_chunk_size: next,
            seed: Some((ptr, len)),
            memory_usage: Cell::new(0),
        }
    }

    pub fn upstream(&self) -> &'up dyn MemResource {
        self.upstream
    }

    /// Bytes currently held from the upstream, seed buffer excluded.
    pub fn memory_usage(&self) -> usize {
        self.memory_usage.get()
    }

    /// Returns every chunk to the upstream and resets to the freshly
    /// constructed state, seed buffer and initial chunk size included.
    /// Invalidates all live allocations at once. Idempotent.
    pub fn release(&self) {
        let mut cur = self.head.take();
        while let Some(hdr) = cur {
            let ChunkHeader { prev, layout } = unsafe { hdr.as_ptr().read() };
            unsafe { self.upstream.deallocate(hdr.cast(), layout) };
            cur = prev;
        }

        match self.seed {
            Some((ptr, len)) => {
                self.cursor.set(ptr.as_ptr());
                self.remaining.set(len);
            }
            None => {
                self.cursor.set(std::ptr::null_mut());
                self.remaining.set(0);
            }
        }
        self.next_chunk_size.set(self.initial_chunk_size);

        if self.memory_usage.get() != 0 {
            tracing::trace!(released = self.memory_usage.get(), "released arena chunks");
        }
        self.memory_usage.set(0);
    }

    fn try_bump(&self, layout: Layout) -> Option<NonNull<u8>> {
        let (slop, aligned) = align_up(self.cursor.get(), layout.align());
        let need = slop.checked_add(layout.size())?;
        if need > self.remaining.get() {
            return None;
        }
        self.cursor.set(aligned.wrapping_add(layout.size()));
        self.remaining.set(self.remaining.get() - need);
        NonNull::new(aligned)
    }

    /// Acquires one upstream chunk large enough for `layout` and serves the
    /// request from its front. The request is never split across chunks; an
    /// upstream failure propagates with the arena state unchanged.
    fn grow(&self, layout: Layout) -> Result<NonNull<u8>> {
        let align = layout.align().max(align_of::<ChunkHeader>());
        let header = size_of::<ChunkHeader>().next_multiple_of(align);
        let capacity = layout.size().max(self.next_chunk_size.get());
        let total = header.checked_add(capacity).ok_or(Error::Overflow {
            count: capacity,
            size: 1,
        })?;
        let chunk_layout = Layout::from_size_align(total, align).map_err(|_| Error::Overflow {
            count: total,
            size: 1,
        })?;

        let block = self.upstream.allocate(chunk_layout)?;
        let hdr = block.cast::<ChunkHeader>();
        unsafe {
            hdr.as_ptr().write(ChunkHeader {
                prev: self.head.get(),
                layout: chunk_layout,
            });
        }
        self.head.set(Some(hdr));

        // `header` is a multiple of the requested alignment, so the request
        // is served from the chunk front with no slop
        let start = unsafe { block.as_ptr().add(header) };
        self.cursor.set(start.wrapping_add(layout.size()));
        self.remaining.set(capacity - layout.size());
        self.memory_usage
            .set(self.memory_usage.get() + chunk_layout.size());

        let next = self.next_chunk_size.get();
        if next < MAX_CHUNK_SIZE {
            self.next_chunk_size
                .set(next.saturating_mul(2).min(MAX_CHUNK_SIZE));
        }
        tracing::trace!(capacity, "acquired chunk from upstream");

        // Safety: start lies header bytes inside a live block of
        // header + capacity bytes
        Ok(unsafe { NonNull::new_unchecked(start) })
    }
}

fn align_up(ptr: *mut u8, align: usize) -> (usize, *mut u8) {
    let slop = ptr.align_offset(align);
    (slop, ptr.wrapping_add(slop))
}

impl Default for BumpArena<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl MemResource for BumpArena<'_> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        if layout.size() == 0 {
            return Ok(super::dangling(layout));
        }
        match self.try_bump(layout) {
            Some(ptr) => Ok(ptr),
            None => self.grow(layout),
        }
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        // space is only reclaimed in bulk by release()
    }
}

impl Drop for BumpArena<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::alloc::Layout;

    use itertools::Itertools;
    use rand::Rng;

    use super::{BumpArena, ChunkHeader, DEFAULT_CHUNK_SIZE};
    use crate::{
        error::Error,
        resource::{MAX_ALIGN, MemResource, null::null_resource, system::system_resource},
        test_utils::RecordingResource,
    };

    fn header_overhead(align: usize) -> usize {
        size_of::<ChunkHeader>().next_multiple_of(align.max(align_of::<ChunkHeader>()))
    }

    #[test]
    fn test_sequential_allocations_are_increasing_and_disjoint() {
        let arena = BumpArena::with_initial_size_in(1024, system_resource());
        let layout = Layout::from_size_align(24, 8).expect("valid layout");

        let ptrs = (0..16)
            .map(|_| arena.allocate(layout).expect("allocate not failed"))
            .collect_vec();

        for (p, q) in ptrs.iter().tuple_windows() {
            assert!(
                p.as_ptr() as usize + layout.size() <= q.as_ptr() as usize,
                "offsets must be strictly increasing and non-overlapping"
            );
        }
    }

    #[test]
    fn test_allocations_are_aligned() {
        let arena = BumpArena::new_in(system_resource());

        for align in [1usize, 2, 4, 8, 16, 64, 256, 4096] {
            let layout = Layout::from_size_align(3, align).expect("valid layout");
            let ptr = arena.allocate(layout).expect("allocate not failed");
            assert_eq!(ptr.as_ptr() as usize % align, 0);
        }
    }

    #[test]
    fn test_storage_does_not_overlap_across_random_layouts() {
        let mut rng = rand::rng();
        let arena = BumpArena::with_initial_size_in(64, system_resource());

        let blocks = (0..200u8)
            .map(|fill| {
                let size = rng.random_range(1..96);
                let align = 1 << rng.random_range(0..5);
                let layout = Layout::from_size_align(size, align).expect("valid layout");
                let ptr = arena.allocate(layout).expect("allocate not failed");
                unsafe { std::ptr::write_bytes(ptr.as_ptr(), fill, size) };
                (ptr, size, fill)
            })
            .collect_vec();

        // any overlap would have been clobbered by a later fill
        for (ptr, size, fill) in blocks {
            for i in 0..size {
                assert_eq!(unsafe { *ptr.as_ptr().add(i) }, fill);
            }
        }
    }

    #[test]
    fn test_second_allocation_triggers_single_chunk_growth() {
        // 40 + 40 > 64: the second call must acquire exactly one new chunk,
        // sized by the geometric policy (128 >= 80)
        let upstream = RecordingResource::default();
        let arena = BumpArena::with_initial_size_in(64, &upstream);

        arena.allocate_default(40).expect("allocate not failed");
        assert_eq!(upstream.alloc_count(), 1);

        arena.allocate_default(40).expect("allocate not failed");
        assert_eq!(upstream.alloc_count(), 2);

        let overhead = header_overhead(MAX_ALIGN);
        let sizes = upstream.alloc_sizes();
        assert_eq!(sizes[0], overhead + 64);
        assert_eq!(sizes[1], overhead + 128);
    }

    #[test]
    fn test_chunk_sizes_are_non_decreasing() {
        let upstream = RecordingResource::default();
        let arena = BumpArena::with_initial_size_in(64, &upstream);

        for _ in 0..64 {
            arena.allocate_default(64).expect("allocate not failed");
        }

        let sizes = upstream.alloc_sizes();
        assert!(sizes.len() >= 2);
        for (a, b) in sizes.iter().tuple_windows() {
            assert!(a <= b, "chunk sizes must be non-decreasing");
        }
    }

    #[test]
    fn test_oversized_request_gets_chunk_at_least_that_large() {
        let upstream = RecordingResource::default();
        let arena = BumpArena::with_initial_size_in(64, &upstream);

        arena.allocate_default(10_000).expect("allocate not failed");

        assert_eq!(upstream.alloc_count(), 1);
        assert!(upstream.alloc_sizes()[0] >= 10_000);
    }

    #[test]
    fn test_deallocate_is_a_noop() {
        let upstream = RecordingResource::default();
        let arena = BumpArena::new_in(&upstream);

        let layout = Layout::from_size_align(32, 8).expect("valid layout");
        let a = arena.allocate(layout).expect("allocate not failed");
        unsafe { arena.deallocate(a, layout) };

        let b = arena.allocate(layout).expect("allocate not failed");
        assert_ne!(a.as_ptr(), b.as_ptr(), "bump space is never reused");
        assert!(upstream.dealloc_count() == 0);
    }

    #[test]
    fn test_release_returns_every_chunk_and_resets() {
        let upstream = RecordingResource::default();
        let arena = BumpArena::with_initial_size_in(64, &upstream);

        for _ in 0..16 {
            arena.allocate_default(48).expect("allocate not failed");
        }
        let acquired = upstream.alloc_count();
        assert!(acquired >= 2);
        assert!(arena.memory_usage() > 0);

        arena.release();
        assert_eq!(upstream.dealloc_count(), acquired);
        assert_eq!(arena.memory_usage(), 0);

        // release twice in a row is a no-op the second time
        arena.release();
        assert_eq!(upstream.dealloc_count(), acquired);

        // a fresh allocation behaves like a newly constructed arena
        arena.allocate_default(40).expect("allocate not failed");
        let sizes = upstream.alloc_sizes();
        assert_eq!(sizes[acquired], sizes[0]);
    }

    #[test]
    fn test_drop_releases_chunks() {
        let upstream = RecordingResource::default();
        {
            let arena = BumpArena::new_in(&upstream);
            arena.allocate_default(128).expect("allocate not failed");
        }
        assert_eq!(upstream.alloc_count(), upstream.dealloc_count());
    }

    #[test]
    fn test_seeded_buffer_defers_upstream() {
        let upstream = RecordingResource::default();
        let mut buffer = [0u8; 128];
        let arena = BumpArena::with_buffer_in(&mut buffer, &upstream);

        for _ in 0..4 {
            let ptr = arena.allocate_default(16).expect("allocate not failed");
            assert_eq!(ptr.as_ptr() as usize % MAX_ALIGN, 0);
        }
        assert_eq!(upstream.alloc_count(), 0);

        // exhausting the seed falls through to the upstream
        arena.allocate_default(512).expect("allocate not failed");
        assert_eq!(upstream.alloc_count(), 1);

        // release restores the seed, so small requests stay local again
        arena.release();
        arena.allocate_default(16).expect("allocate not failed");
        assert_eq!(upstream.alloc_count(), 1);
    }

    #[test]
    fn test_upstream_failure_propagates_and_leaves_arena_usable() {
        let mut buffer = [0u8; 64];
        let arena = BumpArena::with_buffer_in(&mut buffer, null_resource());

        arena.allocate_default(16).expect("seed should serve this");

        let err = arena.allocate_default(512).expect_err("sink upstream must fail");
        assert!(matches!(err, Error::Exhausted { .. }));
        assert_eq!(arena.memory_usage(), 0);

        // the failed growth did not corrupt the bump state
        arena.allocate_default(16).expect("seed should still serve this");
    }

    #[test]
    fn test_zero_size_allocation_skips_upstream() {
        let arena = BumpArena::new_in(null_resource());
        let layout = Layout::from_size_align(0, 32).expect("valid layout");

        let ptr = arena.allocate(layout).expect("zero-size never fails");
        assert_eq!(ptr.as_ptr() as usize % 32, 0);
    }

    #[test]
    fn test_memory_usage_tracks_upstream_bytes() {
        let upstream = RecordingResource::default();
        let arena = BumpArena::with_initial_size_in(64, &upstream);

        arena.allocate_default(40).expect("allocate not failed");
        arena.allocate_default(40).expect("allocate not failed");

        assert_eq!(
            arena.memory_usage(),
            upstream.alloc_sizes().iter().sum::<usize>()
        );
    }

    #[test]
    fn test_default_initial_chunk() {
        let upstream = RecordingResource::default();
        let arena = BumpArena::new_in(&upstream);

        arena.allocate_default(1).expect("allocate not failed");
        assert!(upstream.alloc_sizes()[0] >= DEFAULT_CHUNK_SIZE);
    }
}
