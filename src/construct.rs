//! The capability query behind uses-allocator construction: does a type
//! accept an injected allocator handle, and in which argument position?
//! Resolved per `(type, argument-list)` pair by trait selection, never at
//! runtime. Argument lists are tuples.

use crate::poly_alloc::AllocRef;

/// Plain construction: the type has no use for the allocator that places it.
pub trait Construct<Args>: Sized {
    fn construct(args: Args) -> Self;
}

/// Allocator-aware construction with the handle leading the arguments.
pub trait PrefixConstruct<'r, Args>: Sized {
    fn prefix_construct(alloc: AllocRef<'r>, args: Args) -> Self;
}

/// Allocator-aware construction with the handle trailing the arguments.
pub trait SuffixConstruct<'r, Args>: Sized {
    fn suffix_construct(args: Args, alloc: AllocRef<'r>) -> Self;
}

// Every type moves in from a value of itself, and defaults in from no
// arguments, without declaring anything.
impl<T> Construct<(T,)> for T {
    fn construct((value,): (T,)) -> Self {
        value
    }
}

impl<T: Default> Construct<()> for T {
    fn construct(_args: ()) -> Self {
        T::default()
    }
}

pub struct PlainForm;
pub struct PrefixForm;
pub struct SuffixForm;

/// Dispatcher over the three construction forms. `Form` is fixed by
/// whichever construction trait the target implements; bound to use, never
/// to implement. A type with no matching construction trait for the given
/// arguments cannot be built through an adapter at all, and one declaring
/// several forms for the same argument list makes every call ambiguous.
/// Both are compile errors, not runtime failures.
pub trait ConstructIn<'r, Args, Form>: Sized {
    fn construct_in(args: Args, alloc: AllocRef<'r>) -> Self;
}

impl<'r, Args, T: Construct<Args>> ConstructIn<'r, Args, PlainForm> for T {
    fn construct_in(args: Args, _alloc: AllocRef<'r>) -> Self {
        T::construct(args)
    }
}

impl<'r, Args, T: PrefixConstruct<'r, Args>> ConstructIn<'r, Args, PrefixForm> for T {
    fn construct_in(args: Args, alloc: AllocRef<'r>) -> Self {
        T::prefix_construct(alloc, args)
    }
}

impl<'r, Args, T: SuffixConstruct<'r, Args>> ConstructIn<'r, Args, SuffixForm> for T {
    fn construct_in(args: Args, alloc: AllocRef<'r>) -> Self {
        T::suffix_construct(args, alloc)
    }
}
