//! Tile geometry planning.
//!
//! For each cache level we pick the largest square tile whose working set fits in a fraction
//! of that level. The working set of one step of the driver is one tile of `A` plus one tile
//! of `B`:
//!
//! ```text
//!     2 · edge² · element_size  ≤  capacity / BUDGET_DIVISOR
//! ```
//!
//! The remaining capacity absorbs conflict misses and whatever else the caller keeps hot.
//!
//! Edges are then snapped so that the levels nest:
//! - the innermost edge is a multiple of the unroll width,
//! - every outer edge is a multiple of the edge directly inside it.
//!
//! ```text
//!     L2 tile (160×160)
//!     ┌───────┬───────┬───────┬───────┬───────┐
//!     │ L1 32 │ L1 32 │ L1 32 │ L1 32 │ L1 32 │
//!     ├───────┼───────┼───────┼───────┼───────┤
//!     │  ...  │       │       │       │       │
//!     └───────┴───────┴───────┴───────┴───────┘
//! ```

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use tiler_matrix::ConfigurationError;
use tracing::debug;

use crate::config::{CacheHierarchy, Unroll};

/// Fraction of a cache level a tile pair may occupy, as a divisor of its capacity.
pub const BUDGET_DIVISOR: usize = 4;

/// Number of tiles live at once in a cache level: the source tile and the destination tile.
pub const TILES_PER_WORKING_SET: usize = 2;

/// Square tile edges for every tiled cache level, outermost first.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileGeometry {
    edges: Vec<usize>,
    unroll: Unroll,
}

impl TileGeometry {
    /// The degenerate geometry: no tiling levels, the whole matrix is one leaf tile.
    #[must_use]
    pub const fn single_tile(unroll: Unroll) -> Self {
        Self {
            edges: Vec::new(),
            unroll,
        }
    }

    #[must_use]
    pub fn edges(&self) -> &[usize] {
        &self.edges
    }

    #[must_use]
    pub const fn unroll(&self) -> Unroll {
        self.unroll
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.edges.is_empty()
    }

    #[must_use]
    pub fn outermost(&self) -> Option<usize> {
        self.edges.first().copied()
    }

    #[must_use]
    pub fn innermost(&self) -> Option<usize> {
        self.edges.last().copied()
    }

    /// Replace the innermost (`l1`) and next-outer (`l2`) edges, then re-check nesting.
    ///
    /// The single-tile geometry has no edges to replace and is returned unchanged.
    pub fn with_overrides(
        mut self,
        l1: Option<usize>,
        l2: Option<usize>,
    ) -> Result<Self, ConfigurationError> {
        let levels = self.edges.len();
        if levels == 0 {
            return Ok(self);
        }
        if let Some(edge) = l1 {
            self.edges[levels - 1] = edge;
        }
        if let Some(edge) = l2 {
            if levels < 2 {
                return Err(ConfigurationError::InvalidTileEdge {
                    edge,
                    reason: "no cache level above the innermost one",
                });
            }
            self.edges[levels - 2] = edge;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let unroll = self.unroll.width();
        if let Some(edge) = self.innermost() {
            if edge == 0 || edge % unroll != 0 {
                return Err(ConfigurationError::InvalidTileEdge {
                    edge,
                    reason: "innermost edge must be a positive multiple of the unroll width",
                });
            }
        }
        for pair in self.edges.windows(2) {
            let (outer, inner) = (pair[0], pair[1]);
            if outer < inner || outer % inner != 0 {
                return Err(ConfigurationError::InvalidTileEdge {
                    edge: outer,
                    reason: "outer edge must be a multiple of the edge inside it",
                });
            }
        }
        Ok(())
    }
}

/// Largest square edge whose tile pair fits in the budgeted share of `capacity` bytes.
///
/// Saturates for absurd element sizes, which then yields an edge of 0.
const fn level_edge(capacity: usize, element_size: usize) -> usize {
    (capacity / (BUDGET_DIVISOR * TILES_PER_WORKING_SET).saturating_mul(element_size)).isqrt()
}

/// Plan square tile edges for transposing a `height × width` matrix of `element_size`-byte
/// elements through `caches`.
///
/// Fails with [`ConfigurationError::BelowMinimumTile`] when both dimensions are smaller than
/// the innermost edge; callers fall back to [`TileGeometry::single_tile`] in that case.
pub fn plan_geometry(
    height: usize,
    width: usize,
    element_size: usize,
    caches: &CacheHierarchy,
    unroll: Unroll,
) -> Result<TileGeometry, ConfigurationError> {
    if height == 0 || width == 0 {
        return Err(ConfigurationError::ZeroDimension { height, width });
    }
    if element_size == 0 {
        return Err(ConfigurationError::ZeroElementSize);
    }
    let levels = caches.levels();
    if levels.is_empty() {
        return Err(ConfigurationError::EmptyCacheHierarchy);
    }

    let unroll_width = unroll.width();
    let mut edges: Vec<usize> = Vec::with_capacity(levels.len());
    // Walk inner to outer so each level can snap to the one inside it.
    for (level, &capacity) in levels.iter().enumerate().rev() {
        let raw = level_edge(capacity, element_size);
        let edge = match edges.last() {
            None => raw - raw % unroll_width,
            Some(&inner) => (raw - raw % inner).max(inner),
        };
        if edge == 0 {
            return Err(ConfigurationError::CacheTooSmall {
                level,
                capacity,
                required: (BUDGET_DIVISOR * TILES_PER_WORKING_SET * unroll_width * unroll_width)
                    .saturating_mul(element_size),
            });
        }
        edges.push(edge);
    }
    edges.reverse();
    // A level no larger than the one inside it adds a loop without adding locality.
    edges.dedup();

    let min_edge = edges[edges.len() - 1];
    if height < min_edge && width < min_edge {
        return Err(ConfigurationError::BelowMinimumTile {
            height,
            width,
            min_edge,
        });
    }

    debug!(height, width, element_size, ?edges, "planned tile geometry");
    Ok(TileGeometry { edges, unroll })
}
