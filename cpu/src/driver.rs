use alloc::vec;

use tiler_matrix::dense::{
    RowMajorMatrix, RowMajorMatrixView, RowMajorMatrixViewMut, check_transpose_shapes,
};
use tiler_matrix::{BoundsError, ConfigurationError, Matrix, TileDescriptor, TransposeResult};
use tracing::instrument;

use crate::config::TransposeConfig;
use crate::kernel::transpose_tile;
use crate::planner::TileGeometry;

/// Transpose `a` into `b` on the calling thread, tiling for the configured caches.
///
/// `b` must have `a`'s width as its height and `a`'s height as its width. Shape errors are
/// reported before anything is written.
#[instrument(level = "debug", skip_all, fields(dims = %a.dimensions()))]
pub fn transpose<T: Copy>(
    a: RowMajorMatrixView<'_, T>,
    b: RowMajorMatrixViewMut<'_, T>,
    config: &TransposeConfig,
) -> TransposeResult<()> {
    let dims = check_transpose_shapes(&a, &b)?;
    let geometry = config.resolve_geometry(dims.height, dims.width, size_of::<T>())?;
    transpose_with_geometry(a, b, &geometry)
}

/// Like [`transpose`], with a geometry planned (or cached) by the caller.
pub fn transpose_with_geometry<T: Copy>(
    a: RowMajorMatrixView<'_, T>,
    mut b: RowMajorMatrixViewMut<'_, T>,
    geometry: &TileGeometry,
) -> TransposeResult<()> {
    check_transpose_shapes(&a, &b)?;
    let region = TileDescriptor::full(b.height(), b.width());
    transpose_region(a, &mut b, 0, region, geometry)?;
    Ok(())
}

/// Allocate the output and transpose `a` into it.
pub fn transposed<T: Copy + Default>(
    a: RowMajorMatrixView<'_, T>,
    config: &TransposeConfig,
) -> TransposeResult<RowMajorMatrix<T>> {
    let dims = a.dimensions();
    let mut b = RowMajorMatrix::new(vec![T::default(); dims.len()], dims.height);
    transpose(a, b.as_view_mut(), config)?;
    Ok(b)
}

/// Transpose a `height × width` matrix at `src` into the `width × height` buffer at `dst`.
///
/// Rejects buffers whose address ranges overlap with [`ConfigurationError::Overlapping`], and
/// shapes whose byte size does not fit in `usize` with [`ConfigurationError::SizeOverflow`].
///
/// # Safety
///
/// `src` must be valid for reads of `height * width` elements and `dst` valid for writes of as
/// many, both properly aligned and not mutated elsewhere for the duration of the call.
pub unsafe fn transpose_raw<T: Copy>(
    src: *const T,
    dst: *mut T,
    height: usize,
    width: usize,
    config: &TransposeConfig,
) -> TransposeResult<()> {
    if height == 0 || width == 0 {
        return Err(ConfigurationError::ZeroDimension { height, width }.into());
    }
    let (len, bytes) = height
        .checked_mul(width)
        .and_then(|len| Some((len, len.checked_mul(size_of::<T>())?)))
        .ok_or(ConfigurationError::SizeOverflow { height, width })?;
    let src_range = src as usize..(src as usize).saturating_add(bytes);
    let dst_range = dst as usize..(dst as usize).saturating_add(bytes);
    if src_range.start < dst_range.end && dst_range.start < src_range.end {
        return Err(ConfigurationError::Overlapping.into());
    }

    // SAFETY: validity is the caller's contract and the ranges were just shown disjoint.
    let (src, dst) = unsafe {
        (
            core::slice::from_raw_parts(src, len),
            core::slice::from_raw_parts_mut(dst, len),
        )
    };
    transpose(
        RowMajorMatrixView::new(src, width),
        RowMajorMatrixViewMut::new(dst, height),
        config,
    )
}

/// Visit the leaves of the tile hierarchy below `region`, outermost level first.
///
/// Each level splits its tile row-major into `edges[0]`-sized sub-tiles and fully descends into
/// one sub-tile before starting the next. So the source and destination tiles of the level
/// stay hot until every leaf inside them is done.
///
/// With no edges, `region` itself is the only leaf.
pub fn for_each_leaf<E, F>(region: TileDescriptor, edges: &[usize], visit: &mut F) -> Result<(), E>
where
    F: FnMut(TileDescriptor) -> Result<(), E>,
{
    match edges.split_first() {
        None => visit(region),
        Some((&edge, inner)) => {
            for tile in region.split(edge) {
                for_each_leaf(tile, inner, visit)?;
            }
            Ok(())
        }
    }
}

/// Transpose every leaf of `region` into the output band `dst`.
pub(crate) fn transpose_region<T: Copy>(
    a: RowMajorMatrixView<'_, T>,
    dst: &mut RowMajorMatrixViewMut<'_, T>,
    band_row_start: usize,
    region: TileDescriptor,
    geometry: &TileGeometry,
) -> Result<(), BoundsError> {
    let unroll = geometry.unroll();
    let result = for_each_leaf(region, geometry.edges(), &mut |leaf| {
        transpose_tile(a, dst, band_row_start, leaf, unroll)
    });
    debug_assert!(result.is_ok(), "planned tiles must stay in bounds: {result:?}");
    result
}
