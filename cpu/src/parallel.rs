//! Fork-join dispatch of the tiled transpose.
//!
//! The output `B` is cut into horizontal bands of whole rows. Band `k` of `B` is produced from
//! the column strip `k` of `A`, so bands are disjoint `&mut` chunks of one slice and workers
//! share nothing but the read-only input:
//!
//! ```text
//!            A (M × N)                       B (N × M)
//!     ┌─────┬─────┬─────┐              ┌─────────────────┐
//!     │     │     │     │              │     band 0      │ ← worker 0
//!     │  0  │  1  │  2  │    ─────►    ├─────────────────┤
//!     │     │     │     │              │     band 1      │ ← worker 1
//!     │     │     │     │              ├─────────────────┤
//!     └─────┴─────┴─────┘              │     band 2      │ ← worker 2
//!                                      └─────────────────┘
//! ```
//!
//! The join at the end of the parallel iterator is the only synchronisation point.

use core::ops::Range;

use tiler_matrix::dense::{RowMajorMatrixView, RowMajorMatrixViewMut, check_transpose_shapes};
use tiler_matrix::{ConfigurationError, Matrix, ResourceError, TileDescriptor, TransposeResult};
use tiler_maybe_rayon::prelude::*;
use tracing::{debug, debug_span, instrument, warn};

use crate::config::TransposeConfig;
use crate::driver::{transpose_region, transpose_with_geometry};
use crate::planner::TileGeometry;

/// Uniform split of the output rows `[0, height)` into consecutive bands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BandPartition {
    /// Number of output rows per band. The last band may be shorter.
    pub band_rows: usize,
    pub height: usize,
}

impl BandPartition {
    #[must_use]
    pub const fn num_bands(&self) -> usize {
        self.height.div_ceil(self.band_rows)
    }

    /// Output rows owned by band `index`.
    #[must_use]
    pub fn band(&self, index: usize) -> Range<usize> {
        let start = index * self.band_rows;
        start..(start + self.band_rows).min(self.height)
    }

    pub fn bands(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.num_bands()).map(|index| self.band(index))
    }
}

/// Split `height` output rows into bands for `worker_count` workers.
///
/// Bands are one outermost tile tall when that already gives every worker a band. Otherwise
/// they shrink to `ceil(height / worker_count)` rows, rounded up to the innermost tile edge so
/// leaf tiles are never cut.
#[must_use]
pub fn partition_output_rows(
    height: usize,
    geometry: &TileGeometry,
    worker_count: usize,
) -> BandPartition {
    let workers = worker_count.max(1);
    let band_rows = match (geometry.outermost(), geometry.innermost()) {
        (Some(outer), _) if height.div_ceil(outer) >= workers => outer,
        (_, Some(inner)) => height.div_ceil(workers).next_multiple_of(inner),
        _ => height,
    };
    BandPartition {
        band_rows: band_rows.max(1),
        height,
    }
}

/// Transpose `a` into `b` using `worker_count` workers.
///
/// Falls back to the single-threaded driver when a worker pool of that size cannot be created.
/// Returns only after every band has been written.
#[instrument(level = "debug", skip_all, fields(dims = %a.dimensions(), workers = worker_count))]
pub fn transpose_parallel<T: Copy + Send + Sync>(
    a: RowMajorMatrixView<'_, T>,
    b: RowMajorMatrixViewMut<'_, T>,
    worker_count: usize,
    config: &TransposeConfig,
) -> TransposeResult<()> {
    if worker_count == 0 {
        return Err(ConfigurationError::ZeroWorkers.into());
    }
    let dims = check_transpose_shapes(&a, &b)?;
    let geometry = config.resolve_geometry(dims.height, dims.width, size_of::<T>())?;
    transpose_parallel_with_geometry(a, b, worker_count, &geometry)
}

/// Like [`transpose_parallel`], with a geometry planned (or cached) by the caller.
pub fn transpose_parallel_with_geometry<T: Copy + Send + Sync>(
    a: RowMajorMatrixView<'_, T>,
    b: RowMajorMatrixViewMut<'_, T>,
    worker_count: usize,
    geometry: &TileGeometry,
) -> TransposeResult<()> {
    if worker_count == 0 {
        return Err(ConfigurationError::ZeroWorkers.into());
    }
    check_transpose_shapes(&a, &b)?;
    let partition = partition_output_rows(b.height(), geometry, worker_count);
    if geometry.is_degenerate() || partition.num_bands() == 1 {
        return transpose_with_geometry(a, b, geometry);
    }
    debug!(
        band_rows = partition.band_rows,
        bands = partition.num_bands(),
        "dispatching bands"
    );

    #[cfg(feature = "parallel")]
    {
        with_pool_or_serial(pool::worker_pool(worker_count), a, b, geometry, |pool, a, b| {
            match pool {
                Some(pool) => pool.install(|| run_bands(a, b, &partition, geometry)),
                None => run_bands(a, b, &partition, geometry),
            }
        })
    }

    #[cfg(not(feature = "parallel"))]
    {
        run_bands(a, b, &partition, geometry)
    }
}

/// Run `parallel` with the acquired worker pool, or transpose on the calling thread when the
/// pool could not be created.
#[cfg_attr(not(feature = "parallel"), allow(dead_code))]
fn with_pool_or_serial<'a, 'b, T, P, F>(
    pool: Result<P, ResourceError>,
    a: RowMajorMatrixView<'a, T>,
    b: RowMajorMatrixViewMut<'b, T>,
    geometry: &TileGeometry,
    parallel: F,
) -> TransposeResult<()>
where
    T: Copy,
    F: FnOnce(P, RowMajorMatrixView<'a, T>, RowMajorMatrixViewMut<'b, T>) -> TransposeResult<()>,
{
    match pool {
        Ok(pool) => parallel(pool, a, b),
        Err(err) => {
            warn!(%err, "worker pool unavailable, transposing on the calling thread");
            transpose_with_geometry(a, b, geometry)
        }
    }
}

/// Transpose every band of `partition`, one band per parallel task.
fn run_bands<T: Copy + Send + Sync>(
    a: RowMajorMatrixView<'_, T>,
    b: RowMajorMatrixViewMut<'_, T>,
    partition: &BandPartition,
    geometry: &TileGeometry,
) -> TransposeResult<()> {
    let RowMajorMatrixViewMut { values, width } = b;
    values
        .par_chunks_mut(partition.band_rows * width)
        .enumerate()
        .try_for_each(|(index, band)| {
            let rows = partition.band(index);
            let _span = debug_span!("band", start = rows.start, end = rows.end).entered();
            let mut dst = RowMajorMatrixViewMut::new(band, width);
            let region = TileDescriptor::new(rows.start, 0, rows.len(), width);
            transpose_region(a, &mut dst, rows.start, region, geometry)
        })?;
    Ok(())
}

#[cfg(feature = "parallel")]
mod pool {
    use alloc::format;

    use rayon::{ThreadPool, ThreadPoolBuilder};
    use tiler_matrix::ResourceError;

    /// A dedicated pool of `worker_count` threads, or `None` when the global pool already has
    /// that many.
    pub(super) fn worker_pool(worker_count: usize) -> Result<Option<ThreadPool>, ResourceError> {
        if worker_count == rayon::current_num_threads() {
            return Ok(None);
        }
        ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|index| format!("tiler-worker-{index}"))
            .build()
            .map(Some)
            .map_err(ResourceError::worker_pool)
    }

}
