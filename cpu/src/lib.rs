//! Cache-tiled, unrolled and fork-join parallel transposition of row-major matrices.
//!
//! The pieces stack as follows:
//! - [`plan_geometry`] picks one square tile edge per cache level.
//! - [`kernel::transpose_tile`] copies one leaf tile with an unrolled inner loop.
//! - [`transpose`] walks the tile hierarchy and runs the kernel on every leaf.
//! - [`transpose_parallel`] hands disjoint bands of output rows to a pool of workers.

#![no_std]

extern crate alloc;

mod cache;
mod config;
mod driver;
pub mod kernel;
mod parallel;
mod planner;

pub use cache::*;
pub use config::*;
pub use driver::*;
pub use parallel::*;
pub use planner::*;
pub use tiler_matrix::{
    BoundsError, ConfigurationError, ResourceError, TransposeError, TransposeResult,
};
