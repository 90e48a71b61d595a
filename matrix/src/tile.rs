//! Rectangular tiles of an output matrix.
//!
//! A [`TileDescriptor`] addresses a sub-region of the transposed output `B`. Rows range over
//! `[0, N)` and columns over `[0, M)` for an `M×N` input `A`; the same tile reads `A` with the
//! two offsets swapped.

use core::fmt::{Display, Formatter};
use core::ops::Range;

use crate::error::BoundsError;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TileDescriptor {
    pub row_offset: usize,
    pub col_offset: usize,
    pub rows: usize,
    pub cols: usize,
}

impl TileDescriptor {
    #[must_use]
    pub const fn new(row_offset: usize, col_offset: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_offset,
            col_offset,
            rows,
            cols,
        }
    }

    /// The tile covering an entire `height × width` matrix.
    #[must_use]
    pub const fn full(height: usize, width: usize) -> Self {
        Self::new(0, 0, height, width)
    }

    #[must_use]
    pub const fn row_end(&self) -> usize {
        self.row_offset + self.rows
    }

    #[must_use]
    pub const fn col_end(&self) -> usize {
        self.col_offset + self.cols
    }

    #[must_use]
    pub const fn row_range(&self) -> Range<usize> {
        self.row_offset..self.row_end()
    }

    #[must_use]
    pub const fn col_range(&self) -> Range<usize> {
        self.col_offset..self.col_end()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows * self.cols
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// The same region seen from the input side: rows and columns swapped.
    #[must_use]
    pub const fn transposed(&self) -> Self {
        Self::new(self.col_offset, self.row_offset, self.cols, self.rows)
    }

    /// Check that this tile lies inside rows `[row_start, row_start + height)` and columns
    /// `[0, width)`.
    pub const fn check_within(
        &self,
        row_start: usize,
        height: usize,
        width: usize,
    ) -> Result<(), BoundsError> {
        if self.row_offset < row_start
            || self.row_end() > row_start + height
            || self.col_end() > width
        {
            return Err(BoundsError {
                tile: *self,
                height,
                width,
            });
        }
        Ok(())
    }

    /// Partition this tile into a row-major grid of `edge × edge` sub-tiles.
    ///
    /// Sub-tiles on the bottom and right edges are truncated when the extents are not
    /// multiples of `edge`. The grid covers the tile exactly.
    ///
    /// # Panics
    /// Panics if `edge == 0`.
    #[must_use]
    pub fn split(self, edge: usize) -> TileGrid {
        assert!(edge > 0, "tile edge must be positive");
        TileGrid {
            parent: self,
            edge,
            next: 0,
            tile_rows: self.rows.div_ceil(edge),
            tile_cols: self.cols.div_ceil(edge),
        }
    }
}

impl Display for TileDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "[{}..{}, {}..{}]",
            self.row_offset,
            self.row_end(),
            self.col_offset,
            self.col_end()
        )
    }
}

/// Iterator over the sub-tiles produced by [`TileDescriptor::split`].
///
/// Column tiles vary fastest, so consecutive tiles share a band of output rows.
#[derive(Clone, Debug)]
pub struct TileGrid {
    parent: TileDescriptor,
    edge: usize,
    next: usize,
    tile_rows: usize,
    tile_cols: usize,
}

impl TileGrid {
    /// Number of sub-tiles along the rows and the columns.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.tile_rows, self.tile_cols)
    }
}

impl Iterator for TileGrid {
    type Item = TileDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.tile_rows * self.tile_cols {
            return None;
        }
        let r = self.next / self.tile_cols;
        let c = self.next % self.tile_cols;
        self.next += 1;

        let row_offset = self.parent.row_offset + r * self.edge;
        let col_offset = self.parent.col_offset + c * self.edge;
        Some(TileDescriptor::new(
            row_offset,
            col_offset,
            self.edge.min(self.parent.row_end() - row_offset),
            self.edge.min(self.parent.col_end() - col_offset),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.tile_rows * self.tile_cols - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileGrid {}
