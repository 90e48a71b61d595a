use alloc::vec;
use alloc::vec::Vec;

use rand::Rng;
use rand::distr::{Distribution, StandardUniform};

use crate::error::ConfigurationError;
use crate::{Dimensions, Matrix};

/// A dense matrix stored in row-major form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowMajorMatrix<T> {
    /// All values, stored in row-major order.
    pub values: Vec<T>,
    pub width: usize,
}

impl<T> RowMajorMatrix<T> {
    #[must_use]
    pub fn new(values: Vec<T>, width: usize) -> Self {
        debug_assert!(width == 0 || values.len() % width == 0);
        Self { values, width }
    }

    #[must_use]
    pub fn new_row(values: Vec<T>) -> Self {
        let width = values.len();
        Self { values, width }
    }

    #[must_use]
    pub fn new_col(values: Vec<T>) -> Self {
        Self { values, width: 1 }
    }

    /// A `height × width` matrix filled with `T::default()`.
    #[must_use]
    pub fn default(width: usize, height: usize) -> Self
    where
        T: Default + Clone,
    {
        Self {
            values: vec![T::default(); width * height],
            width,
        }
    }

    pub fn rand<R: Rng>(rng: &mut R, rows: usize, cols: usize) -> Self
    where
        StandardUniform: Distribution<T>,
    {
        let values = rng.sample_iter(StandardUniform).take(rows * cols).collect();
        Self {
            values,
            width: cols,
        }
    }

    #[must_use]
    pub fn as_view(&self) -> RowMajorMatrixView<'_, T> {
        RowMajorMatrixView {
            values: &self.values,
            width: self.width,
        }
    }

    pub fn as_view_mut(&mut self) -> RowMajorMatrixViewMut<'_, T> {
        RowMajorMatrixViewMut {
            values: &mut self.values,
            width: self.width,
        }
    }

    #[must_use]
    pub fn row_slice(&self, r: usize) -> &[T] {
        debug_assert!(r < self.height());
        &self.values[r * self.width..(r + 1) * self.width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        self.values.chunks_exact(self.width.max(1))
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> T
    where
        T: Clone,
    {
        self.values[r * self.width + c].clone()
    }
}

impl<T> Matrix<T> for RowMajorMatrix<T> {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.values.len().checked_div(self.width).unwrap_or(0)
    }
}

/// Check that a flat buffer holds exactly `height * width` elements.
const fn check_len(len: usize, height: usize, width: usize) -> Result<(), ConfigurationError> {
    if len != height * width {
        return Err(ConfigurationError::LengthMismatch {
            expected: height * width,
            actual: len,
        });
    }
    Ok(())
}

/// A read-only row-major view: the input side of a transposition.
#[derive(Copy, Clone, Debug)]
pub struct RowMajorMatrixView<'a, T> {
    pub values: &'a [T],
    pub width: usize,
}

impl<'a, T> RowMajorMatrixView<'a, T> {
    #[must_use]
    pub fn new(values: &'a [T], width: usize) -> Self {
        debug_assert!(width == 0 || values.len() % width == 0);
        Self { values, width }
    }

    /// View a caller-supplied buffer as a `height × width` matrix.
    pub fn try_new(values: &'a [T], height: usize, width: usize) -> Result<Self, ConfigurationError> {
        check_len(values.len(), height, width)?;
        Ok(Self { values, width })
    }

    #[must_use]
    pub fn row_slice(&self, r: usize) -> &'a [T] {
        debug_assert!(r < self.height());
        &self.values[r * self.width..(r + 1) * self.width]
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> T
    where
        T: Clone,
    {
        self.values[r * self.width + c].clone()
    }
}

impl<T> Matrix<T> for RowMajorMatrixView<'_, T> {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.values.len().checked_div(self.width).unwrap_or(0)
    }
}

/// An exclusive row-major view: the output side of a transposition.
#[derive(Debug)]
pub struct RowMajorMatrixViewMut<'a, T> {
    pub values: &'a mut [T],
    pub width: usize,
}

impl<'a, T> RowMajorMatrixViewMut<'a, T> {
    #[must_use]
    pub fn new(values: &'a mut [T], width: usize) -> Self {
        debug_assert!(width == 0 || values.len() % width == 0);
        Self { values, width }
    }

    /// View a caller-supplied buffer as a `height × width` matrix.
    pub fn try_new(
        values: &'a mut [T],
        height: usize,
        width: usize,
    ) -> Result<Self, ConfigurationError> {
        check_len(values.len(), height, width)?;
        Ok(Self { values, width })
    }

    pub fn row_mut(&mut self, r: usize) -> &mut [T] {
        debug_assert!(r < self.height());
        &mut self.values[r * self.width..(r + 1) * self.width]
    }

    #[must_use]
    pub fn as_view(&self) -> RowMajorMatrixView<'_, T> {
        RowMajorMatrixView {
            values: self.values,
            width: self.width,
        }
    }

    /// Shorten the lifetime of this view so it can be passed on without giving it up.
    pub fn reborrow(&mut self) -> RowMajorMatrixViewMut<'_, T> {
        RowMajorMatrixViewMut {
            values: self.values,
            width: self.width,
        }
    }
}

impl<T> Matrix<T> for RowMajorMatrixViewMut<'_, T> {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.values.len().checked_div(self.width).unwrap_or(0)
    }
}

/// Check that `b` is shaped like the transpose of `a` and that neither is empty.
///
/// Returns the dimensions of `a`.
pub fn check_transpose_shapes<T>(
    a: &RowMajorMatrixView<'_, T>,
    b: &RowMajorMatrixViewMut<'_, T>,
) -> Result<Dimensions, ConfigurationError> {
    let dims = a.dimensions();
    if dims.len() != a.values.len() {
        return Err(ConfigurationError::LengthMismatch {
            expected: dims.len(),
            actual: a.values.len(),
        });
    }
    if dims.is_empty() {
        return Err(ConfigurationError::ZeroDimension {
            height: dims.height,
            width: dims.width,
        });
    }
    // The height of a zero-width view is 0, which the comparison below also catches.
    if b.width * b.height() != b.values.len() || b.dimensions() != dims.transposed() {
        return Err(ConfigurationError::ShapeMismatch {
            expected: dims.transposed(),
            actual: b.dimensions(),
        });
    }
    Ok(dims)
}
