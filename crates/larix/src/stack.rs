//! Native stack headroom for the recursive parser and evaluator.
//!
//! Nesting is already capped by the parser, but a capped tree can still be
//! deeper than a small thread stack allows. Each recursive step therefore
//! asks `stacker` for room first.

/// Headroom below which a fresh stack segment is allocated.
#[cfg(not(target_arch = "wasm32"))]
const MIN_HEADROOM: usize = 128 * 1024;

/// Size of each fresh segment.
#[cfg(not(target_arch = "wasm32"))]
const SEGMENT_SIZE: usize = 1024 * 1024;

/// Run `f`, switching to a new stack segment when the current one is
/// nearly used up.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn with_stack_room<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(MIN_HEADROOM, SEGMENT_SIZE, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn with_stack_room<R>(f: impl FnOnce() -> R) -> R {
    f()
}
