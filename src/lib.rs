mod construct;
mod poly_alloc;
#[cfg(test)]
mod test_utils;

pub mod error;
pub mod global;
pub mod resource;

pub use construct::{
    Construct, ConstructIn, PlainForm, PrefixConstruct, PrefixForm, SuffixConstruct, SuffixForm,
};
pub use poly_alloc::{AllocRef, PolyAlloc};

pub mod prelude {
    pub use crate::{
        construct::{Construct, PrefixConstruct, SuffixConstruct},
        error::{Error, Result},
        global::{
            DefaultResourceGuard, DynResource, get_default_resource, set_default_resource,
        },
        poly_alloc::{AllocRef, PolyAlloc},
        resource::{
            MAX_ALIGN, MemResource, bump_arena::BumpArena, null::null_resource, resource_eq,
            system::system_resource,
        },
    };
}
