//! Run the same data-parallel code with or without rayon.
//!
//! With the `parallel` feature the prelude re-exports rayon. Without it, the prelude provides
//! serial stand-ins with the same method names, backed by `core` iterators.

#![no_std]

#[cfg(feature = "parallel")]
pub mod prelude {
    pub use rayon::prelude::*;
}

#[cfg(not(feature = "parallel"))]
mod serial;

#[cfg(not(feature = "parallel"))]
pub mod prelude {
    pub use core::iter::{
        ExactSizeIterator as IndexedParallelIterator, Iterator as ParallelIterator,
    };

    pub use super::serial::*;
}

/// Number of workers the ambient pool will use for a parallel iterator.
///
/// Always 1 when the `parallel` feature is disabled.
#[inline]
pub fn current_num_threads() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}
