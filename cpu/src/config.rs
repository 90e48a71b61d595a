use alloc::vec;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use tiler_matrix::ConfigurationError;
use tiler_maybe_rayon::current_num_threads;

use crate::planner::{TileGeometry, plan_geometry};

/// How many output columns the tile kernel moves per inner-loop iteration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unroll {
    #[default]
    Four,
    Eight,
}

impl Unroll {
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
        }
    }
}

impl TryFrom<usize> for Unroll {
    type Error = ConfigurationError;

    fn try_from(width: usize) -> Result<Self, Self::Error> {
        match width {
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            _ => Err(ConfigurationError::InvalidUnroll(width)),
        }
    }
}

/// Capacities of the data caches a tile should fit in, in bytes, outermost level first.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheHierarchy {
    levels: Vec<usize>,
}

impl CacheHierarchy {
    pub const DEFAULT_L1_BYTES: usize = 32 * 1024;
    pub const DEFAULT_L2_BYTES: usize = 1024 * 1024;

    #[must_use]
    pub const fn new(levels: Vec<usize>) -> Self {
        Self { levels }
    }

    #[must_use]
    pub fn levels(&self) -> &[usize] {
        &self.levels
    }
}

impl Default for CacheHierarchy {
    fn default() -> Self {
        Self::new(vec![Self::DEFAULT_L2_BYTES, Self::DEFAULT_L1_BYTES])
    }
}

/// Tunables for the CPU transposition paths.
///
/// Every field has a usable default; tile edges are planned from `caches` unless overridden.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransposeConfig {
    pub unroll: Unroll,
    /// Overrides the innermost planned edge.
    pub l1_edge: Option<usize>,
    /// Overrides the edge one level above the innermost.
    pub l2_edge: Option<usize>,
    pub caches: CacheHierarchy,
    /// Worker count for the parallel path. `None` uses every available thread.
    pub workers: Option<usize>,
}

impl TransposeConfig {
    #[must_use]
    pub fn with_unroll(mut self, unroll: Unroll) -> Self {
        self.unroll = unroll;
        self
    }

    #[must_use]
    pub fn with_l1_edge(mut self, edge: usize) -> Self {
        self.l1_edge = Some(edge);
        self
    }

    #[must_use]
    pub fn with_l2_edge(mut self, edge: usize) -> Self {
        self.l2_edge = Some(edge);
        self
    }

    #[must_use]
    pub fn with_caches(mut self, caches: CacheHierarchy) -> Self {
        self.caches = caches;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(current_num_threads)
    }

    /// Plan tile edges for an input of `height × width` elements and apply the overrides.
    ///
    /// A matrix smaller than the innermost tile gets the single-tile geometry instead of an
    /// error.
    pub fn resolve_geometry(
        &self,
        height: usize,
        width: usize,
        element_size: usize,
    ) -> Result<TileGeometry, ConfigurationError> {
        match plan_geometry(height, width, element_size, &self.caches, self.unroll) {
            Ok(geometry) => geometry.with_overrides(self.l1_edge, self.l2_edge),
            Err(ConfigurationError::BelowMinimumTile { .. }) => {
                Ok(TileGeometry::single_tile(self.unroll))
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unroll_widths() {
        assert_eq!(Unroll::default().width(), 4);
        assert_eq!(Unroll::try_from(8), Ok(Unroll::Eight));
        assert_eq!(
            Unroll::try_from(3),
            Err(ConfigurationError::InvalidUnroll(3))
        );
    }

    #[test]
    fn small_matrix_degenerates_to_single_tile() {
        let config = TransposeConfig::default();
        let geometry = config.resolve_geometry(4, 3, 4).unwrap();
        assert!(geometry.is_degenerate());
        let geometry = config.resolve_geometry(1, 1, 4).unwrap();
        assert!(geometry.is_degenerate());
    }

    #[test]
    fn overrides_replace_planned_edges() {
        let config = TransposeConfig::default()
            .with_l1_edge(16)
            .with_l2_edge(64);
        let geometry = config.resolve_geometry(1000, 1000, 4).unwrap();
        assert_eq!(geometry.edges(), &[64, 16]);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let config = TransposeConfig::default().with_l1_edge(6);
        assert!(matches!(
            config.resolve_geometry(1000, 1000, 4),
            Err(ConfigurationError::InvalidTileEdge { edge: 6, .. })
        ));
    }

    #[test]
    fn zero_dimension_is_not_degenerate() {
        let config = TransposeConfig::default();
        assert_eq!(
            config.resolve_geometry(0, 5, 4),
            Err(ConfigurationError::ZeroDimension {
                height: 0,
                width: 5
            })
        );
    }
}
