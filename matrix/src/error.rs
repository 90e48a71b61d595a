//! Error types for matrix transposition.
//!
//! Three families, matching how callers are expected to react:
//! - [`ConfigurationError`]: the request itself is invalid. Nothing has been written to the output.
//! - [`ResourceError`]: workers or a device context could not be created.
//! - [`BoundsError`]: a tile fell outside its matrix. This is a geometry bug, never user input.

use alloc::string::String;
use core::fmt;

use thiserror::Error;

use crate::Dimensions;
use crate::tile::TileDescriptor;

/// An invalid or inconsistent transposition request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("matrix dimensions must be positive, got {height}x{width}")]
    ZeroDimension { height: usize, width: usize },

    #[error("buffer holds {actual} elements, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The output buffer does not have the transposed shape of the input.
    #[error("output is {actual}, expected {expected}")]
    ShapeMismatch {
        expected: Dimensions,
        actual: Dimensions,
    },

    /// The element count or byte size of the matrix does not fit in `usize`.
    #[error("{height}x{width} matrix is too large to address")]
    SizeOverflow { height: usize, width: usize },

    #[error("input and output buffers overlap in memory")]
    Overlapping,

    #[error("element size must be positive")]
    ZeroElementSize,

    #[error("at least one cache level is required to plan tiles")]
    EmptyCacheHierarchy,

    #[error(
        "cache level {level} holds {capacity} bytes, but the smallest tile pair needs {required}"
    )]
    CacheTooSmall {
        level: usize,
        capacity: usize,
        required: usize,
    },

    /// Both dimensions are below the innermost tile edge, so there is nothing to tile.
    #[error("{height}x{width} matrix is smaller than the minimum tile edge {min_edge}")]
    BelowMinimumTile {
        height: usize,
        width: usize,
        min_edge: usize,
    },

    #[error("tile edge {edge} is invalid: {reason}")]
    InvalidTileEdge { edge: usize, reason: &'static str },

    #[error("unroll factor {0} is not supported")]
    InvalidUnroll(usize),

    #[error("worker count must be positive")]
    ZeroWorkers,

    #[error("tile size must be positive")]
    ZeroTileSize,

    #[error("tile needs {requested} bytes of shared memory, device offers {available}")]
    SharedMemoryExceeded { requested: usize, available: usize },

    #[error("block needs {requested} threads, device allows {max}")]
    TooManyThreads { requested: usize, max: usize },

    #[error("invalid device properties: {0}")]
    InvalidDeviceProperties(&'static str),
}

/// Failure to acquire execution resources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("failed to create worker pool: {0}")]
    WorkerPool(String),

    #[error("failed to create device context: {0}")]
    DeviceContext(String),
}

impl ResourceError {
    pub fn worker_pool(cause: impl fmt::Display) -> Self {
        Self::WorkerPool(alloc::format!("{cause}"))
    }

    pub fn device_context(cause: impl fmt::Display) -> Self {
        Self::DeviceContext(alloc::format!("{cause}"))
    }
}

/// A tile descriptor that reaches outside the matrix it indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("tile {tile} exceeds {height}x{width} region")]
pub struct BoundsError {
    pub tile: TileDescriptor,
    pub height: usize,
    pub width: usize,
}

/// Any failure of a transposition entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransposeError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Bounds(#[from] BoundsError),
}

/// Result type alias for transposition operations.
pub type TransposeResult<T> = core::result::Result<T, TransposeError>;
