//! Every transposition path must agree with the naive definition `B[i][j] = A[j][i]`.

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tiler_cpu::kernel::transpose_tile;
use tiler_cpu::{TransposeConfig, Unroll, transpose, transpose_parallel};
use tiler_gpu::{DeviceProperties, EmulatedDevice, LaunchConfig, launch, transpose_gpu};
use tiler_matrix::dense::RowMajorMatrix;
use tiler_matrix::{ConfigurationError, TileDescriptor, TransposeError};

fn naive(a: &RowMajorMatrix<u32>, height: usize, width: usize) -> Vec<u32> {
    let mut out = vec![0; height * width];
    for r in 0..height {
        for c in 0..width {
            out[c * height + r] = a.values[r * width + c];
        }
    }
    out
}

/// Runs every variant on `a` and returns their outputs.
fn all_variants(a: &RowMajorMatrix<u32>, height: usize, width: usize) -> Vec<Vec<u32>> {
    let config = TransposeConfig::default();
    let fresh = || RowMajorMatrix::new(vec![u32::MAX; height * width], height);

    let mut serial = fresh();
    transpose(a.as_view(), serial.as_view_mut(), &config).unwrap();

    let mut parallel = fresh();
    transpose_parallel(a.as_view(), parallel.as_view_mut(), 4, &config).unwrap();

    let mut single_tile = fresh();
    transpose_tile(
        a.as_view(),
        &mut single_tile.as_view_mut(),
        0,
        TileDescriptor::full(width, height),
        Unroll::Eight,
    )
    .unwrap();

    let mut staged = fresh();
    transpose_gpu(a.as_view(), staged.as_view_mut(), 8).unwrap();

    vec![serial.values, parallel.values, single_tile.values, staged.values]
}

#[test]
fn four_by_three() {
    let a = RowMajorMatrix::new((0..12).collect(), 3);
    for out in all_variants(&a, 4, 3) {
        assert_eq!(out, vec![0, 3, 6, 9, 1, 4, 7, 10, 2, 5, 8, 11]);
    }
}

#[test]
fn one_by_one() {
    let a = RowMajorMatrix::new(vec![42], 1);
    for out in all_variants(&a, 1, 1) {
        assert_eq!(out, vec![42]);
    }
}

#[test]
fn large_random_matrix() {
    let mut rng = SmallRng::seed_from_u64(7);
    let (height, width) = (300, 517);
    let a = RowMajorMatrix::<u32>::rand(&mut rng, height, width);
    let expected = naive(&a, height, width);
    for out in all_variants(&a, height, width) {
        assert_eq!(out, expected);
    }
}

#[test]
fn double_transpose_on_device() {
    let device = EmulatedDevice::with_workers(DeviceProperties::default(), 2).unwrap();
    let config = LaunchConfig::default();
    let (height, width) = (65, 33);
    let a = RowMajorMatrix::new((0..(height * width) as u32).collect(), width);
    let mut b = RowMajorMatrix::new(vec![0; height * width], height);
    let mut c = RowMajorMatrix::new(vec![0; height * width], width);
    launch(&device, a.as_view(), b.as_view_mut(), &config).unwrap();
    launch(&device, b.as_view(), c.as_view_mut(), &config).unwrap();
    assert_eq!(c.values, a.values);
}

#[test]
fn oversized_tile_is_rejected() {
    let a = RowMajorMatrix::new((0..12u32).collect(), 3);
    let mut b = RowMajorMatrix::new(vec![0; 12], 4);
    let err = transpose_gpu(a.as_view(), b.as_view_mut(), 256).unwrap_err();
    assert!(matches!(
        err,
        TransposeError::Configuration(ConfigurationError::SharedMemoryExceeded { .. })
    ));
}

proptest! {
    #[test]
    fn variants_agree(
        height in 1usize..70,
        width in 1usize..70,
        tile in 1usize..40,
        seed: u64,
    ) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let a = RowMajorMatrix::<u32>::rand(&mut rng, height, width);
        let expected = naive(&a, height, width);

        let mut staged = RowMajorMatrix::new(vec![0; height * width], height);
        transpose_gpu(a.as_view(), staged.as_view_mut(), tile).unwrap();
        prop_assert_eq!(&staged.values, &expected);

        for out in all_variants(&a, height, width) {
            prop_assert_eq!(&out, &expected);
        }
    }
}
