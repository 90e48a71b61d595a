use core::mem::size_of;

use serde::{Deserialize, Serialize};
use tiler_matrix::dense::{RowMajorMatrixView, RowMajorMatrixViewMut, check_transpose_shapes};
use tiler_matrix::{ConfigurationError, Matrix, TransposeResult};
use tracing::{debug, instrument};

use crate::bank::{BankModel, Phase, ScratchLayout, phase_conflict_degree};
use crate::kernel::{CooperativeKernel, StagedTranspose, run_block};
use crate::{ComputeDevice, CubeDim, DeviceProperties, EmulatedDevice, GridDim, SharedTile};

/// Tile edge matching a 32-wide warp.
pub const DEFAULT_TILE: usize = 32;

/// Rows of units per block. Each unit covers `tile / block_rows` scratch rows.
pub const DEFAULT_BLOCK_ROWS: usize = 8;

/// Launch parameters of the staged transpose.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaunchConfig {
    pub tile: usize,
    pub block_rows: usize,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TILE)
    }
}

impl LaunchConfig {
    #[must_use]
    pub const fn new(tile: usize) -> Self {
        let block_rows = if tile < DEFAULT_BLOCK_ROWS {
            tile
        } else {
            DEFAULT_BLOCK_ROWS
        };
        Self { tile, block_rows }
    }

    #[must_use]
    pub const fn with_block_rows(mut self, block_rows: usize) -> Self {
        self.block_rows = block_rows;
        self
    }

    #[must_use]
    pub const fn cube_dim(&self) -> CubeDim {
        CubeDim {
            x: self.tile,
            y: self.block_rows,
        }
    }

    #[must_use]
    pub const fn layout(&self) -> ScratchLayout {
        ScratchLayout::padded(self.tile)
    }

    /// One block per tile of an `height x width` input: `ceil(width / tile)` blocks along `x`
    /// and `ceil(height / tile)` along `y`.
    #[must_use]
    pub const fn grid(&self, height: usize, width: usize) -> GridDim {
        GridDim {
            x: width.div_ceil(self.tile),
            y: height.div_ceil(self.tile),
        }
    }

    /// Check the launch against the limits of `properties` for elements of type `T`.
    pub const fn validate<T>(&self, properties: &DeviceProperties) -> Result<(), ConfigurationError> {
        if self.tile == 0 {
            return Err(ConfigurationError::ZeroTileSize);
        }
        if self.block_rows == 0 || self.block_rows > self.tile {
            return Err(ConfigurationError::InvalidTileEdge {
                edge: self.block_rows,
                reason: "block rows must be between 1 and the tile edge",
            });
        }
        let requested = self.layout().bytes(size_of::<T>());
        if requested > properties.shared_memory_per_block {
            return Err(ConfigurationError::SharedMemoryExceeded {
                requested,
                available: properties.shared_memory_per_block,
            });
        }
        let threads = self.cube_dim().count();
        if threads > properties.max_threads_per_block {
            return Err(ConfigurationError::TooManyThreads {
                requested: threads,
                max: properties.max_threads_per_block,
            });
        }
        Ok(())
    }
}

/// Transpose `a` into `b` on `device` with the staged shared-memory kernel.
///
/// Every check runs before the first block is launched, so on error `b` is untouched.
#[instrument(level = "debug", skip_all, fields(dims = %a.dimensions(), tile = config.tile))]
pub fn launch<D, T>(
    device: &D,
    a: RowMajorMatrixView<'_, T>,
    b: RowMajorMatrixViewMut<'_, T>,
    config: &LaunchConfig,
) -> TransposeResult<()>
where
    D: ComputeDevice,
    T: Copy + Default + Send + Sync,
{
    let dims = check_transpose_shapes(&a, &b)?;
    let properties = device.properties();
    config.validate::<T>(properties)?;

    let grid = config.grid(dims.height, dims.width);
    debug!(
        grid_x = grid.x,
        grid_y = grid.y,
        store_conflicts = phase_conflict_degree(
            config.layout(),
            config.cube_dim(),
            properties.warp_size,
            BankModel::from_properties(properties),
            size_of::<T>(),
            Phase::Store,
        ),
        "launching staged transpose"
    );

    let kernel = StagedTranspose::new(a, b, config);
    let layout = kernel.layout();
    device.execute_grid(
        grid,
        || SharedTile::new(layout),
        |scratch, block| run_block(&kernel, block, scratch),
    );
    Ok(())
}

/// Transpose `a` into `b` on an [`EmulatedDevice`] with default properties, using square
/// tiles of edge `tile_size`.
pub fn transpose_gpu<T>(
    a: RowMajorMatrixView<'_, T>,
    b: RowMajorMatrixViewMut<'_, T>,
    tile_size: usize,
) -> TransposeResult<()>
where
    T: Copy + Default + Send + Sync,
{
    let device = EmulatedDevice::new(DeviceProperties::default())?;
    launch(&device, a, b, &LaunchConfig::new(tile_size))
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use tiler_matrix::TransposeError;
    use tiler_matrix::dense::RowMajorMatrix;

    use super::*;

    #[test]
    fn config_defaults() {
        let config = LaunchConfig::default();
        assert_eq!((config.tile, config.block_rows), (32, 8));
        assert_eq!(LaunchConfig::new(4).block_rows, 4);
        assert_eq!(config.grid(100, 33), GridDim { x: 2, y: 4 });
        assert_eq!(config.cube_dim().count(), 256);
    }

    #[test]
    fn validate_limits() {
        let props = DeviceProperties::default();
        assert!(LaunchConfig::default().validate::<f64>(&props).is_ok());
        assert_eq!(
            LaunchConfig::new(0).validate::<f32>(&props),
            Err(ConfigurationError::ZeroTileSize)
        );
        assert!(matches!(
            LaunchConfig::new(16).with_block_rows(17).validate::<f32>(&props),
            Err(ConfigurationError::InvalidTileEdge { edge: 17, .. })
        ));
        assert_eq!(
            LaunchConfig::new(128).validate::<f32>(&props),
            Err(ConfigurationError::SharedMemoryExceeded {
                requested: 128 * 129 * 4,
                available: 48 * 1024,
            })
        );
        assert_eq!(
            LaunchConfig::new(64).with_block_rows(32).validate::<f32>(&props),
            Err(ConfigurationError::TooManyThreads {
                requested: 2048,
                max: 1024,
            })
        );
    }

    #[test]
    fn transpose_4x3() {
        let a = RowMajorMatrix::new((0..12u32).collect(), 3);
        let mut b = RowMajorMatrix::new(vec![0; 12], 4);
        transpose_gpu(a.as_view(), b.as_view_mut(), DEFAULT_TILE).unwrap();
        assert_eq!(b.values, vec![0, 3, 6, 9, 1, 4, 7, 10, 2, 5, 8, 11]);
    }

    #[test]
    fn unit_tile() {
        let a = RowMajorMatrix::new((0..6u8).collect(), 2);
        let mut b = RowMajorMatrix::new(vec![0; 6], 3);
        transpose_gpu(a.as_view(), b.as_view_mut(), 1).unwrap();
        assert_eq!(b.values, vec![0, 2, 4, 1, 3, 5]);
    }

    #[test]
    fn errors_leave_output_untouched() {
        let a = RowMajorMatrix::new((0..12u32).collect(), 3);

        let mut wrong_shape = RowMajorMatrix::new(vec![7; 12], 3);
        let err = transpose_gpu(a.as_view(), wrong_shape.as_view_mut(), 4).unwrap_err();
        assert!(matches!(
            err,
            TransposeError::Configuration(ConfigurationError::ShapeMismatch { .. })
        ));
        assert!(wrong_shape.values.iter().all(|&v| v == 7));

        let mut b = RowMajorMatrix::new(vec![7; 12], 4);
        let err = transpose_gpu(a.as_view(), b.as_view_mut(), 0).unwrap_err();
        assert_eq!(
            err,
            TransposeError::Configuration(ConfigurationError::ZeroTileSize)
        );
        assert!(b.values.iter().all(|&v| v == 7));
    }

    #[test]
    fn launch_on_dedicated_device() {
        let device = EmulatedDevice::with_workers(DeviceProperties::default(), 3).unwrap();
        let (height, width) = (70, 45);
        let a = RowMajorMatrix::new((0..(height * width) as u64).collect(), width);
        let mut b = RowMajorMatrix::new(vec![0; height * width], height);
        launch(&device, a.as_view(), b.as_view_mut(), &LaunchConfig::new(16)).unwrap();
        for r in 0..height {
            for c in 0..width {
                assert_eq!(b.get(c, r), a.get(r, c));
            }
        }
    }
}
