//! Transpose a few shapes on every CPU path and log the achieved bandwidth.
//!
//! Run with `RUST_LOG=debug` to see the planned geometry and band dispatch.

use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tiler_cpu::{TransposeConfig, TransposeError, transpose, transpose_parallel};
use tiler_matrix::Matrix;
use tiler_matrix::dense::RowMajorMatrix;
use tracing::info;
use tracing_forest::ForestLayer;
use tracing_forest::util::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

const SHAPES: [(usize, usize); 3] = [(1024, 1024), (3000, 1000), (4096, 4096)];

fn main() -> Result<(), TransposeError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    Registry::default()
        .with(env_filter)
        .with(ForestLayer::default())
        .init();

    let config = TransposeConfig::default();
    let workers = config.worker_count();
    let mut rng = SmallRng::seed_from_u64(7);

    for (height, width) in SHAPES {
        let a = RowMajorMatrix::<f32>::rand(&mut rng, height, width);
        let mut b = RowMajorMatrix::<f32>::default(height, width);
        let bytes = 2 * height * width * size_of::<f32>();

        let start = Instant::now();
        transpose(a.as_view(), b.as_view_mut(), &config)?;
        let serial = start.elapsed();

        let start = Instant::now();
        transpose_parallel(a.as_view(), b.as_view_mut(), workers, &config)?;
        let parallel = start.elapsed();

        info!(
            dims = %a.dimensions(),
            serial_gbps = bytes as f64 / serial.as_secs_f64() / 1e9,
            parallel_gbps = bytes as f64 / parallel.as_secs_f64() / 1e9,
            workers,
            "transposed"
        );
    }
    Ok(())
}
