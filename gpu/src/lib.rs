//! Shared-memory staged transposition on a GPU-style execution model.
//!
//! The matrix is cut into a grid of square tiles. Each tile is handled by one block of
//! cooperating units that stage the tile in a padded scratch buffer, synchronise once, and
//! write it back transposed. Blocks are independent and run in any order.
//!
//! [`EmulatedDevice`] runs that model on host threads. Other backends plug in through
//! [`ComputeDevice`].

#![no_std]

extern crate alloc;

pub mod bank;
mod device;
mod dispatch;
mod kernel;
mod scratch;

pub use device::*;
pub use dispatch::*;
pub use scratch::*;
