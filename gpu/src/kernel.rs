use core::marker::PhantomData;
use core::sync::atomic::{AtomicPtr, Ordering};

use tiler_matrix::dense::{RowMajorMatrixView, RowMajorMatrixViewMut};

use crate::bank::ScratchLayout;
use crate::{BlockIdx, CubeDim, LaunchConfig, SharedTile, SyncedTile, UnitPos};

/// A block program with one scratch load phase and one store phase separated by a barrier.
pub(crate) trait CooperativeKernel: Sync {
    type Elem: Copy + Default;

    fn layout(&self) -> ScratchLayout;

    fn cube_dim(&self) -> CubeDim;

    /// Work done by `unit` before the barrier.
    fn load(&self, block: BlockIdx, unit: UnitPos, scratch: &mut SharedTile<Self::Elem>);

    /// Work done by `unit` after the barrier.
    fn store(&self, block: BlockIdx, unit: UnitPos, scratch: &SyncedTile<'_, Self::Elem>);
}

/// Run every unit of `block` through both phases, reusing `scratch`.
///
/// Units run in order on the calling thread. The whole load phase finishes before the barrier,
/// which is what a block-wide synchronisation guarantees on real hardware.
pub(crate) fn run_block<K: CooperativeKernel>(
    kernel: &K,
    block: BlockIdx,
    scratch: &mut SharedTile<K::Elem>,
) {
    let cube = kernel.cube_dim();
    for unit in cube.units() {
        kernel.load(block, unit, scratch);
    }
    let tile = scratch.sync();
    for unit in cube.units() {
        kernel.store(block, unit, &tile);
    }
}

/// Output matrix shared by every block of a launch.
///
/// Blocks write disjoint tiles, so handing each one the base pointer is sound as long as each
/// block of a grid runs at most once at a time. [`launch`](crate::launch) is the only caller and
/// runs every block exactly once.
struct GlobalOutput<'a, T> {
    ptr: AtomicPtr<T>,
    len: usize,
    width: usize,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T> GlobalOutput<'a, T> {
    fn new(view: RowMajorMatrixViewMut<'a, T>) -> Self {
        let RowMajorMatrixViewMut { values, width } = view;
        Self {
            ptr: AtomicPtr::new(values.as_mut_ptr()),
            len: values.len(),
            width,
            _marker: PhantomData,
        }
    }

    /// # Safety
    ///
    /// No other thread may access element `(row, col)` during this call.
    #[inline]
    unsafe fn write(&self, row: usize, col: usize, value: T) {
        let index = row * self.width + col;
        assert!(index < self.len);
        unsafe { self.ptr.load(Ordering::Relaxed).add(index).write(value) }
    }
}

/// Tiled transpose that stages each `tile x tile` block in padded scratch memory.
///
/// Block `(bx, by)` owns input rows `by * tile..` and columns `bx * tile..`. A block has
/// `tile x block_rows` units; unit `(x, y)` handles scratch rows `y, y + block_rows, ...`.
/// Load reads input rows with consecutive units on consecutive columns and writes scratch
/// row-wise. Store reads scratch column-wise and writes output rows, again with consecutive
/// units on consecutive columns. Both phases mask positions past the matrix edge.
pub(crate) struct StagedTranspose<'a, T> {
    input: RowMajorMatrixView<'a, T>,
    output: GlobalOutput<'a, T>,
    height: usize,
    width: usize,
    tile: usize,
    block_rows: usize,
}

impl<'a, T> StagedTranspose<'a, T> {
    /// Shapes must already have been checked with
    /// [`check_transpose_shapes`](tiler_matrix::dense::check_transpose_shapes).
    pub(crate) fn new(
        input: RowMajorMatrixView<'a, T>,
        output: RowMajorMatrixViewMut<'a, T>,
        config: &LaunchConfig,
    ) -> Self {
        let width = input.width;
        let height = input.values.len().checked_div(width).unwrap_or(0);
        Self {
            input,
            output: GlobalOutput::new(output),
            height,
            width,
            tile: config.tile,
            block_rows: config.block_rows,
        }
    }
}

impl<T: Copy + Default + Send + Sync> CooperativeKernel for StagedTranspose<'_, T> {
    type Elem = T;

    fn layout(&self) -> ScratchLayout {
        ScratchLayout::padded(self.tile)
    }

    fn cube_dim(&self) -> CubeDim {
        CubeDim {
            x: self.tile,
            y: self.block_rows,
        }
    }

    #[inline]
    fn load(&self, block: BlockIdx, unit: UnitPos, scratch: &mut SharedTile<T>) {
        let col = block.x * self.tile + unit.x;
        if col >= self.width {
            return;
        }
        let base_row = block.y * self.tile;
        for r in (unit.y..self.tile).step_by(self.block_rows) {
            let row = base_row + r;
            if row >= self.height {
                break;
            }
            scratch.store(r, unit.x, self.input.values[row * self.width + col]);
        }
    }

    #[inline]
    fn store(&self, block: BlockIdx, unit: UnitPos, scratch: &SyncedTile<'_, T>) {
        // Output column `out_col` is input row `out_col`.
        let out_col = block.y * self.tile + unit.x;
        if out_col >= self.height {
            return;
        }
        let base_out_row = block.x * self.tile;
        for c in (unit.y..self.tile).step_by(self.block_rows) {
            let out_row = base_out_row + c;
            if out_row >= self.width {
                break;
            }
            // SAFETY: `(out_row, out_col)` lies in this block's output tile, and within the
            // block only the unit with `x == out_col % tile` and `y == c % block_rows` visits it.
            unsafe { self.output.write(out_row, out_col, scratch.load(unit.x, c)) }
        }
    }
}
