//! Matrix library.

#![no_std]

extern crate alloc;

use core::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

pub mod dense;
pub mod error;
pub mod tile;

pub use error::*;
pub use tile::TileDescriptor;

/// Shape of a matrix: `width` columns and `height` rows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: usize,
    pub height: usize,
}

impl Dimensions {
    /// The shape of this matrix's transpose.
    #[must_use]
    pub const fn transposed(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.width * self.height
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Display for Dimensions {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}

pub trait Matrix<T> {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }
}
