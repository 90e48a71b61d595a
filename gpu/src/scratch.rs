use alloc::vec;
use alloc::vec::Vec;

use crate::bank::ScratchLayout;

/// A block's scratch tile during the load phase.
///
/// Units may only write while they hold `&mut SharedTile`. [`SharedTile::sync`] is the block-wide
/// barrier: it ends the load phase and hands out a read-only [`SyncedTile`], so no unit can read
/// before every unit has written, and no unit can write again until the reads are done.
#[derive(Clone, Debug)]
pub struct SharedTile<T> {
    values: Vec<T>,
    layout: ScratchLayout,
}

impl<T: Copy + Default> SharedTile<T> {
    pub fn new(layout: ScratchLayout) -> Self {
        Self {
            values: vec![T::default(); layout.len()],
            layout,
        }
    }

    #[must_use]
    pub const fn layout(&self) -> ScratchLayout {
        self.layout
    }

    #[inline]
    pub fn store(&mut self, row: usize, col: usize, value: T) {
        debug_assert!(row < self.layout.edge && col < self.layout.edge);
        self.values[self.layout.index(row, col)] = value;
    }

    /// Block-wide barrier between the load and store phases.
    pub fn sync(&mut self) -> SyncedTile<'_, T> {
        SyncedTile {
            values: &self.values,
            layout: self.layout,
        }
    }
}

/// A block's scratch tile after the barrier. Read-only.
#[derive(Copy, Clone, Debug)]
pub struct SyncedTile<'a, T> {
    values: &'a [T],
    layout: ScratchLayout,
}

impl<T: Copy> SyncedTile<'_, T> {
    #[inline]
    #[must_use]
    pub fn load(&self, row: usize, col: usize) -> T {
        debug_assert!(row < self.layout.edge && col < self.layout.edge);
        self.values[self.layout.index(row, col)]
    }
}
