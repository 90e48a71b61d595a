//! Leaf tile kernel.
//!
//! A leaf tile covers output rows `i ∈ [row_offset, row_end)` and output columns
//! `j ∈ [col_offset, col_end)`, and performs `B[i][j] = A[j][i]`:
//!
//! ```text
//!          A (M × N)                          B (N × M)
//!     ┌──────────────────┐               ┌───────────────────┐
//!     │      col i       │               │                   │
//!     │        │         │    ───────►   │ row i: j j+1 .. j+U-1
//!     │  row j ▼ a       │               │        ▲          │
//!     │  row j+1 b       │               │        └ one store of U values
//!     │  ...             │               │                   │
//!     └──────────────────┘               └───────────────────┘
//! ```
//!
//! The inner loop gathers `U` values down one column of `A` into a `[T; U]` block, then writes
//! them as one contiguous run of `B`. The `U` loads are independent of each other, so the core
//! can keep several strided reads in flight while the previous run drains to memory.

use core::array;

use tiler_matrix::dense::{RowMajorMatrixView, RowMajorMatrixViewMut};
use tiler_matrix::{BoundsError, Matrix, TileDescriptor};

use crate::config::Unroll;

/// Transpose one tile of `src` into a band of the output.
///
/// `dst` holds output rows `[band_row_start, band_row_start + dst.height())` of the full
/// transpose and `tile` is expressed in full-output coordinates.
///
/// Returns a [`BoundsError`] without writing anything if the tile does not fit in either
/// matrix.
pub fn transpose_tile<T: Copy>(
    src: RowMajorMatrixView<'_, T>,
    dst: &mut RowMajorMatrixViewMut<'_, T>,
    band_row_start: usize,
    tile: TileDescriptor,
    unroll: Unroll,
) -> Result<(), BoundsError> {
    tile.check_within(band_row_start, dst.height(), dst.width())?;
    tile.transposed().check_within(0, src.height(), src.width())?;

    // SAFETY: both bounds checks above passed, so every index below lands inside the slices.
    unsafe {
        match unroll {
            Unroll::Four => transpose_tile_unrolled::<T, 4>(src, dst, band_row_start, tile),
            Unroll::Eight => transpose_tile_unrolled::<T, 8>(src, dst, band_row_start, tile),
        }
    }
    Ok(())
}

/// # Safety
///
/// `tile` must lie inside the output band `dst` (offset by `band_row_start`) and, transposed,
/// inside `src`.
#[inline]
unsafe fn transpose_tile_unrolled<T: Copy, const U: usize>(
    src: RowMajorMatrixView<'_, T>,
    dst: &mut RowMajorMatrixViewMut<'_, T>,
    band_row_start: usize,
    tile: TileDescriptor,
) {
    let src_width = src.width;
    let dst_width = dst.width;
    let unrolled_end = tile.col_offset + tile.cols - tile.cols % U;

    for i in tile.row_range() {
        let dst_row = (i - band_row_start) * dst_width;

        let mut j = tile.col_offset;
        while j < unrolled_end {
            // SAFETY: j + U <= col_end <= src height and i < row_end <= src width.
            let block: [T; U] =
                array::from_fn(|k| unsafe { *src.values.get_unchecked((j + k) * src_width + i) });
            // SAFETY: the run [j, j + U) lies inside output row i of the band.
            unsafe {
                dst.values
                    .get_unchecked_mut(dst_row + j..dst_row + j + U)
                    .copy_from_slice(&block);
            }
            j += U;
        }

        // Remainder columns when the tile width is not a multiple of U.
        for j in unrolled_end..tile.col_end() {
            // SAFETY: same bounds as the unrolled loop, one element at a time.
            unsafe {
                *dst.values.get_unchecked_mut(dst_row + j) =
                    *src.values.get_unchecked(j * src_width + i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use proptest::prelude::*;
    use tiler_matrix::dense::RowMajorMatrix;

    use super::*;

    fn transpose_reference<T: Copy + Default>(input: &[T], width: usize, height: usize) -> Vec<T> {
        let mut output = vec![T::default(); width * height];
        for y in 0..height {
            for x in 0..width {
                output[x * height + y] = input[y * width + x];
            }
        }
        output
    }

    #[test]
    fn four_by_three() {
        let a = RowMajorMatrix::new((0..12).map(|v| v as f32).collect(), 3);
        for unroll in [Unroll::Four, Unroll::Eight] {
            let mut b = RowMajorMatrix::<f32>::default(4, 3);
            transpose_tile(
                a.as_view(),
                &mut b.as_view_mut(),
                0,
                TileDescriptor::full(3, 4),
                unroll,
            )
            .unwrap();
            let expected: Vec<f32> = [0, 3, 6, 9, 1, 4, 7, 10, 2, 5, 8, 11]
                .into_iter()
                .map(|v| v as f32)
                .collect();
            assert_eq!(b.values, expected);
        }
    }

    #[test]
    fn writes_only_inside_tile() {
        let a = RowMajorMatrix::new((1..=64).collect::<Vec<u32>>(), 8);
        let mut b = RowMajorMatrix::<u32>::default(8, 8);
        let tile = TileDescriptor::new(2, 1, 3, 5);
        transpose_tile(a.as_view(), &mut b.as_view_mut(), 0, tile, Unroll::Four).unwrap();
        for i in 0..8 {
            for j in 0..8 {
                let inside = tile.row_range().contains(&i) && tile.col_range().contains(&j);
                let expected = if inside { a.get(j, i) } else { 0 };
                assert_eq!(b.get(i, j), expected, "at ({i}, {j})");
            }
        }
    }

    #[test]
    fn band_offsets_are_applied() {
        // Output is 6×4; the band holds output rows 2..5.
        let a = RowMajorMatrix::new((0..24).collect::<Vec<u32>>(), 6);
        let mut band = vec![0u32; 3 * 4];
        let mut dst = RowMajorMatrixViewMut::new(&mut band, 4);
        transpose_tile(a.as_view(), &mut dst, 2, TileDescriptor::new(2, 0, 3, 4), Unroll::Four)
            .unwrap();
        let full = transpose_reference(&a.values, 6, 4);
        assert_eq!(band, full[2 * 4..5 * 4]);
    }

    #[test]
    fn out_of_bounds_tile_is_rejected_before_writing() {
        let a = RowMajorMatrix::new(vec![1.0_f32; 12], 3);
        let mut b = RowMajorMatrix::<f32>::default(4, 3);
        let tile = TileDescriptor::new(0, 2, 3, 3);
        let err = transpose_tile(a.as_view(), &mut b.as_view_mut(), 0, tile, Unroll::Four)
            .unwrap_err();
        assert_eq!(err.tile, tile);
        assert!(b.values.iter().all(|&v| v == 0.0));

        let mut band = vec![0.0_f32; 4];
        let mut dst = RowMajorMatrixViewMut::new(&mut band, 4);
        assert!(
            transpose_tile(a.as_view(), &mut dst, 1, TileDescriptor::new(0, 0, 1, 4), Unroll::Four)
                .is_err()
        );
    }

    proptest! {
        #[test]
        fn matches_reference(
            height in 1..40_usize,
            width in 1..40_usize,
            eight in any::<bool>(),
        ) {
            let unroll = if eight { Unroll::Eight } else { Unroll::Four };
            let input: Vec<f32> = (0..height * width).map(|v| v as f32 * 0.5 - 3.0).collect();
            let a = RowMajorMatrix::new(input.clone(), width);
            let mut b = RowMajorMatrix::<f32>::default(height, width);
            transpose_tile(
                a.as_view(),
                &mut b.as_view_mut(),
                0,
                TileDescriptor::full(width, height),
                unroll,
            )
            .unwrap();
            let expected = transpose_reference(&input, width, height);
            prop_assert_eq!(
                b.values.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
                expected.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
            );
        }
    }
}
