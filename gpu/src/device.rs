use serde::{Deserialize, Serialize};
use tiler_matrix::ConfigurationError;
use tiler_maybe_rayon::prelude::*;

/// Hardware limits the dispatcher validates a launch against.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceProperties {
    /// Bytes of on-chip scratch memory one block may use.
    pub shared_memory_per_block: usize,
    pub max_threads_per_block: usize,
    /// Number of independently addressable scratch memory banks.
    pub bank_count: usize,
    pub bank_width_bytes: usize,
    /// Units that issue scratch accesses together.
    pub warp_size: usize,
}

impl Default for DeviceProperties {
    fn default() -> Self {
        Self {
            shared_memory_per_block: 48 * 1024,
            max_threads_per_block: 1024,
            bank_count: 32,
            bank_width_bytes: 4,
            warp_size: 32,
        }
    }
}

impl DeviceProperties {
    pub const fn validate(&self) -> Result<(), ConfigurationError> {
        if self.shared_memory_per_block == 0 {
            return Err(ConfigurationError::InvalidDeviceProperties(
                "shared memory per block must be positive",
            ));
        }
        if self.max_threads_per_block == 0 {
            return Err(ConfigurationError::InvalidDeviceProperties(
                "threads per block must be positive",
            ));
        }
        if self.bank_count == 0 || self.bank_width_bytes == 0 {
            return Err(ConfigurationError::InvalidDeviceProperties(
                "bank count and width must be positive",
            ));
        }
        if self.warp_size == 0 {
            return Err(ConfigurationError::InvalidDeviceProperties(
                "warp size must be positive",
            ));
        }
        Ok(())
    }
}

/// Position of a block in the launch grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockIdx {
    pub x: usize,
    pub y: usize,
}

/// Position of a unit (logical thread) inside its block.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct UnitPos {
    pub x: usize,
    pub y: usize,
}

/// Number of blocks along each axis of a launch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GridDim {
    pub x: usize,
    pub y: usize,
}

impl GridDim {
    #[must_use]
    pub const fn count(&self) -> usize {
        self.x * self.y
    }

    /// The block with linear index `index`, `x` varying fastest.
    #[must_use]
    pub const fn block(&self, index: usize) -> BlockIdx {
        BlockIdx {
            x: index % self.x,
            y: index / self.x,
        }
    }
}

/// Number of units along each axis of a block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CubeDim {
    pub x: usize,
    pub y: usize,
}

impl CubeDim {
    #[must_use]
    pub const fn count(&self) -> usize {
        self.x * self.y
    }

    /// Units in linear order, `x` varying fastest. Consecutive runs of `warp_size` units form
    /// a warp.
    pub fn units(&self) -> impl Iterator<Item = UnitPos> + use<> {
        let dim = *self;
        (0..dim.count()).map(move |index| UnitPos {
            x: index % dim.x,
            y: index / dim.x,
        })
    }
}

/// Something that can run a grid of independent blocks.
pub trait ComputeDevice {
    fn properties(&self) -> &DeviceProperties;

    /// Run `block` once per block of `grid` and return after all of them finished.
    ///
    /// Blocks run in no particular order, possibly concurrently. `init` creates per-worker
    /// state (such as a scratch tile) that consecutive blocks on the same worker reuse.
    fn execute_grid<S, I, F>(&self, grid: GridDim, init: I, block: F)
    where
        I: Fn() -> S + Sync + Send,
        F: Fn(&mut S, BlockIdx) + Sync + Send;
}

/// Executes blocks on host threads, one block at a time per worker.
///
/// Units inside a block run in lockstep order on one thread, which preserves the semantics of
/// a block-wide barrier between phases.
#[derive(Debug)]
pub struct EmulatedDevice {
    properties: DeviceProperties,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl EmulatedDevice {
    /// A device running on the ambient worker pool.
    pub fn new(properties: DeviceProperties) -> Result<Self, ConfigurationError> {
        properties.validate()?;
        Ok(Self {
            properties,
            #[cfg(feature = "parallel")]
            pool: None,
        })
    }

    /// A device with a dedicated pool of `workers` host threads.
    pub fn with_workers(
        properties: DeviceProperties,
        workers: usize,
    ) -> Result<Self, tiler_matrix::TransposeError> {
        if workers == 0 {
            return Err(ConfigurationError::ZeroWorkers.into());
        }
        #[allow(unused_mut)]
        let mut device = Self::new(properties)?;
        #[cfg(feature = "parallel")]
        {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|index| alloc::format!("tiler-device-{index}"))
                .build()
                .map_err(tiler_matrix::ResourceError::device_context)?;
            device.pool = Some(pool);
        }
        Ok(device)
    }
}

impl ComputeDevice for EmulatedDevice {
    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn execute_grid<S, I, F>(&self, grid: GridDim, init: I, block: F)
    where
        I: Fn() -> S + Sync + Send,
        F: Fn(&mut S, BlockIdx) + Sync + Send,
    {
        let run = || {
            (0..grid.count())
                .into_par_iter()
                .for_each_init(&init, |state, index| block(state, grid.block(index)));
        };

        #[cfg(feature = "parallel")]
        {
            if let Some(pool) = &self.pool {
                pool.install(run);
                return;
            }
        }
        run();
    }
}
