use polyalloc::prelude::*;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A message buffer that opts into receiving its allocator last.
struct Message<'r> {
    data: std::ptr::NonNull<u8>,
    len: usize,
    alloc: AllocRef<'r>,
}

impl<'r> SuffixConstruct<'r, (&str,)> for Message<'r> {
    fn suffix_construct((text,): (&str,), alloc: AllocRef<'r>) -> Self {
        let layout = std::alloc::Layout::from_size_align(text.len(), 1).expect("valid layout");
        let data = alloc.allocate(layout).expect("allocate failed");
        unsafe {
            std::ptr::copy_nonoverlapping(text.as_ptr(), data.as_ptr(), text.len());
        }
        Self {
            data,
            len: text.len(),
            alloc,
        }
    }
}

impl Message<'_> {
    fn text(&self) -> &str {
        unsafe {
            std::str::from_utf8_unchecked(std::slice::from_raw_parts(self.data.as_ptr(), self.len))
        }
    }
}

impl Drop for Message<'_> {
    fn drop(&mut self) {
        let layout = std::alloc::Layout::from_size_align(self.len, 1).expect("valid layout");
        unsafe { self.alloc.deallocate(self.data, layout) };
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    // all transient allocations below land in one arena and are reclaimed
    // in bulk when it drops
    let arena = BumpArena::with_initial_size(256);
    let alloc: PolyAlloc<'_, Message<'_>> = PolyAlloc::new(&arena);

    let slot = alloc.allocate(1).expect("allocate failed");
    unsafe { alloc.construct(slot, ("hello from the arena",)) };

    let msg = unsafe { slot.as_ref() };
    println!("message: {:?}", msg.text());
    println!("arena holds {} upstream bytes", arena.memory_usage());

    unsafe {
        alloc.destroy(slot);
        alloc.deallocate(slot, 1);
    }

    // a scoped default override: everything that asks for the process
    // default inside this block gets the sink and must handle failure
    {
        let _guard = DefaultResourceGuard::install(null_resource());
        let failing: PolyAlloc<'_, u64> = PolyAlloc::default();
        println!("sink allocation: {:?}", failing.allocate(8));
    }

    let healthy: PolyAlloc<'_, u64> = PolyAlloc::default();
    let nums = healthy.allocate(8).expect("allocate failed");
    unsafe { healthy.deallocate(nums, 8) };
    println!("default restored: allocation succeeded");
}
