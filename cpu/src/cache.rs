use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use tiler_matrix::ConfigurationError;

use crate::config::TransposeConfig;
use crate::planner::TileGeometry;

/// Everything a planned geometry depends on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GeometryKey {
    pub height: usize,
    pub width: usize,
    pub element_size: usize,
    pub config: TransposeConfig,
}

/// Memoised tile geometries for repeated transpositions of same-shaped matrices.
///
/// Failed plans are not cached.
#[derive(Clone, Debug, Default)]
pub struct GeometryCache {
    entries: HashMap<GeometryKey, TileGeometry>,
}

impl GeometryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the geometry for an input of `height × width` elements of `element_size` bytes,
    /// planning it on first use.
    pub fn get_or_plan(
        &mut self,
        height: usize,
        width: usize,
        element_size: usize,
        config: &TransposeConfig,
    ) -> Result<&TileGeometry, ConfigurationError> {
        let key = GeometryKey {
            height,
            width,
            element_size,
            // Worker count does not influence the geometry.
            config: TransposeConfig {
                workers: None,
                ..config.clone()
            },
        };
        match self.entries.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let geometry = config.resolve_geometry(height, width, element_size)?;
                Ok(entry.insert(geometry))
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
