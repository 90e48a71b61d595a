//! Scratch layout and the bank-conflict model used to pick its padding.
//!
//! Scratch memory is split into `bank_count` banks of `bank_width_bytes` each; word `w` lives in
//! bank `w % bank_count`. When the units of one warp touch distinct words in the same bank,
//! those accesses serialize. Reading a tile column-wise with a row stride equal to the tile edge
//! puts every access of a warp in the same bank whenever the edge is a multiple of the bank
//! count. One word of padding per row shifts each row by one bank.
//!
//! When a warp covers exactly one tile row of 4-byte elements and the edge is a multiple of the
//! bank count (the default 32-edge tile on 32 banks), padding makes both phases conflict-free.
//! Other shapes can keep a small residual conflict: a 16-edge tile whose warps span two rows
//! still serializes two ways. [`phase_conflict_degree`] reports the exact figure.

use alloc::vec;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::{CubeDim, DeviceProperties};

/// Shape of one block's scratch tile: `edge` rows of `edge + padding` elements.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScratchLayout {
    pub edge: usize,
    pub padding: usize,
}

impl ScratchLayout {
    /// The layout the staged kernel uses: one element of padding per row.
    #[must_use]
    pub const fn padded(edge: usize) -> Self {
        Self { edge, padding: 1 }
    }

    #[must_use]
    pub const fn unpadded(edge: usize) -> Self {
        Self { edge, padding: 0 }
    }

    #[must_use]
    pub const fn stride(&self) -> usize {
        self.edge + self.padding
    }

    /// Number of elements in the scratch buffer, padding included.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.edge * self.stride()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    #[must_use]
    pub const fn index(&self, row: usize, col: usize) -> usize {
        row * self.stride() + col
    }

    #[must_use]
    pub const fn bytes(&self, element_size: usize) -> usize {
        self.len() * element_size
    }
}

/// Address-to-bank mapping of a device's scratch memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BankModel {
    pub bank_count: usize,
    pub bank_width_bytes: usize,
}

impl BankModel {
    #[must_use]
    pub const fn from_properties(properties: &DeviceProperties) -> Self {
        Self {
            bank_count: properties.bank_count,
            bank_width_bytes: properties.bank_width_bytes,
        }
    }

    #[inline]
    #[must_use]
    pub const fn bank_of_word(&self, word: usize) -> usize {
        word % self.bank_count
    }

    /// Serialization factor of one warp-wide access to the given element indices.
    ///
    /// Units reading the same word are served by one broadcast, so only distinct words count.
    /// Returns 0 for an empty access and 1 for a conflict-free one.
    pub fn conflict_degree(
        &self,
        element_indices: impl IntoIterator<Item = usize>,
        element_size: usize,
    ) -> usize {
        let mut words: Vec<usize> = element_indices
            .into_iter()
            .flat_map(|index| {
                let first = index * element_size / self.bank_width_bytes;
                let last = ((index + 1) * element_size - 1) / self.bank_width_bytes;
                first..=last
            })
            .collect();
        words.sort_unstable();
        words.dedup();

        let mut per_bank = vec![0usize; self.bank_count];
        for word in words {
            per_bank[self.bank_of_word(word)] += 1;
        }
        per_bank.into_iter().max().unwrap_or(0)
    }
}

/// The two scratch-touching phases of the staged transpose.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Units write scratch row-wise.
    Load,
    /// Units read scratch column-wise.
    Store,
}

/// Worst conflict degree over every warp and loop iteration of one phase.
///
/// Units are numbered `y * cube.x + x` and grouped into warps of `warp_size` consecutive units,
/// matching [`CubeDim::units`]. Unit `(x, y)` touches scratch row `r` (load) or column `r`
/// (store) for `r = y, y + cube.y, ...` below the tile edge.
pub fn phase_conflict_degree(
    layout: ScratchLayout,
    cube: CubeDim,
    warp_size: usize,
    model: BankModel,
    element_size: usize,
    phase: Phase,
) -> usize {
    if cube.count() == 0 || warp_size == 0 {
        return 0;
    }
    let iterations = layout.edge.div_ceil(cube.y);
    let units: Vec<_> = cube.units().collect();

    let mut worst = 0;
    for step in 0..iterations {
        for warp in units.chunks(warp_size) {
            let accesses = warp.iter().filter_map(|unit| {
                let r = unit.y + step * cube.y;
                (r < layout.edge && unit.x < layout.edge).then(|| match phase {
                    Phase::Load => layout.index(r, unit.x),
                    Phase::Store => layout.index(unit.x, r),
                })
            });
            worst = worst.max(model.conflict_degree(accesses, element_size));
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> BankModel {
        BankModel::from_properties(&DeviceProperties::default())
    }

    fn degree(layout: ScratchLayout, block_rows: usize, phase: Phase) -> usize {
        let cube = CubeDim {
            x: layout.edge,
            y: block_rows,
        };
        phase_conflict_degree(layout, cube, 32, model(), 4, phase)
    }

    #[test]
    fn layout_geometry() {
        let layout = ScratchLayout::padded(32);
        assert_eq!(layout.stride(), 33);
        assert_eq!(layout.len(), 32 * 33);
        assert_eq!(layout.index(2, 5), 71);
        assert_eq!(layout.bytes(4), 4224);
        assert!(ScratchLayout::padded(0).is_empty());
    }

    #[test]
    fn broadcast_is_not_a_conflict() {
        assert_eq!(model().conflict_degree([5, 5, 5], 4), 1);
        assert_eq!(model().conflict_degree([0, 32, 64], 4), 3);
        assert_eq!(model().conflict_degree([], 4), 0);
    }

    #[test]
    fn wide_elements_span_two_words() {
        // Element 16 of an 8-byte type occupies words 32 and 33, banks 0 and 1.
        assert_eq!(model().conflict_degree([0, 16], 8), 2);
        assert_eq!(model().conflict_degree([0, 1], 8), 1);
    }

    #[test]
    fn unpadded_column_reads_fully_serialize() {
        let layout = ScratchLayout::unpadded(32);
        assert_eq!(degree(layout, 8, Phase::Load), 1);
        assert_eq!(degree(layout, 8, Phase::Store), 32);
    }

    #[test]
    fn padding_removes_conflicts() {
        for edge in [32, 64] {
            let layout = ScratchLayout::padded(edge);
            assert_eq!(degree(layout, 8, Phase::Load), 1, "edge {edge}");
            assert_eq!(degree(layout, 8, Phase::Store), 1, "edge {edge}");
        }
    }

    #[test]
    fn half_warp_rows_keep_a_two_way_conflict() {
        let padded = ScratchLayout::padded(16);
        assert_eq!(degree(padded, 2, Phase::Store), 2);
        assert_eq!(degree(padded, 2, Phase::Load), 2);
        assert_eq!(degree(ScratchLayout::unpadded(16), 2, Phase::Store), 8);
    }

    #[test]
    fn padding_never_hurts() {
        for edge in [4, 8, 16, 24, 32] {
            for block_rows in [1, 2, 4, 8] {
                let padded = degree(ScratchLayout::padded(edge), block_rows, Phase::Store);
                let unpadded = degree(ScratchLayout::unpadded(edge), block_rows, Phase::Store);
                assert!(padded <= unpadded, "edge {edge} rows {block_rows}");
            }
        }
    }
}
