use parking_lot::RwLock;

use crate::resource::{
    MemResource,
    system::{SYSTEM, system_resource},
};

/// Resources installable as the process-wide default must be reachable from
/// every thread.
pub type DynResource = dyn MemResource + Sync;

// A `&dyn` handle is two words, so the swappable slot is a lock rather than
// a bare atomic. Last set wins; readers observe either the old or the new
// value.
static DEFAULT: RwLock<&'static DynResource> = RwLock::new(&SYSTEM);

/// Current process-wide default resource; the pass-through strategy until
/// someone installs another.
pub fn get_default_resource() -> &'static DynResource {
    *DEFAULT.read()
}

/// Installs `r` as the default (the pass-through strategy when `None`) and
/// returns the previous value, so callers can restore it later.
pub fn set_default_resource(r: Option<&'static DynResource>) -> &'static DynResource {
    let new = r.unwrap_or(system_resource());
    let prev = {
        let mut slot = DEFAULT.write();
        std::mem::replace(&mut *slot, new)
    };
    tracing::debug!("default memory resource replaced");
    prev
}

/// Scoped override: installs a default on construction, restores the
/// previous one on drop.
pub struct DefaultResourceGuard {
    prev: &'static DynResource,
}

impl DefaultResourceGuard {
    pub fn install(r: &'static DynResource) -> Self {
        Self {
            prev: set_default_resource(Some(r)),
        }
    }
}

impl Drop for DefaultResourceGuard {
    fn drop(&mut self) {
        set_default_resource(Some(self.prev));
    }
}
