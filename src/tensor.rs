//! Tensor Storage for Layer Buffers
//!
//! Every buffer the layer touches (inputs, parameters, output, bias
//! multiplier, gradients) is a [`Tensor`]: a flat `Vec<f32>` in row-major
//! order plus its shape. The numeric work happens in [`crate::math`] on the
//! flat slices; this type only carries data and shape between calls.
//!
//! ## Example
//!
//! ```rust
//! use affine_layer::Tensor;
//!
//! // A batch of two rows with three features each
//! let batch = Tensor::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
//! assert_eq!((batch.rows(), batch.cols()), (2, 3));
//! assert_eq!(batch.row(1), &[4.0, 5.0, 6.0]);
//! ```

use rayon::prelude::*;

/// Row-major `f32` buffer with a shape
///
/// For shape `[W, M]`, element `(i, j)` lives at `data[i * M + j]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    /// Flat storage, row-major
    pub data: Vec<f32>,
    /// Dimensions, outermost first
    pub shape: Vec<usize>,
}

impl Tensor {
    /// Wrap `data` with `shape`
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` differs from the product of `shape`.
    ///
    /// ```rust
    /// # use affine_layer::Tensor;
    /// let bias = Tensor::new(vec![10.0, 20.0], vec![1, 2]);
    /// assert_eq!(bias.numel(), 2);
    /// ```
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        let numel: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            numel,
            "Tensor of shape {:?} needs {} values, got {}",
            shape,
            numel,
            data.len()
        );
        Self { data, shape }
    }

    /// All-zero tensor
    pub fn zeros(shape: Vec<usize>) -> Self {
        Self::full(shape, 0.0)
    }

    /// Tensor with every element set to `value`
    pub fn full(shape: Vec<usize>, value: f32) -> Self {
        let numel: usize = shape.iter().product();
        Self {
            data: vec![value; numel],
            shape,
        }
    }

    /// Build a `[rows.len(), cols]` tensor from equal-length rows
    ///
    /// # Panics
    ///
    /// Panics if the rows have different lengths.
    pub fn from_rows(rows: &[Vec<f32>]) -> Self {
        let cols = rows.first().map_or(0, |r| r.len());
        assert!(
            rows.iter().all(|r| r.len() == cols),
            "All rows must have {} columns",
            cols
        );
        Self {
            data: rows.concat(),
            shape: vec![rows.len(), cols],
        }
    }

    /// Number of elements
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Size of the first dimension (0 for a scalar)
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Product of all dimensions after the first
    pub fn cols(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Borrow row `i`
    pub fn row(&self, i: usize) -> &[f32] {
        let cols = self.cols();
        &self.data[i * cols..(i + 1) * cols]
    }

    /// Re-allocate to `shape`, zero filled
    ///
    /// Reuses the existing allocation when it is large enough.
    pub fn resize(&mut self, shape: Vec<usize>) {
        let numel: usize = shape.iter().product();
        self.data.clear();
        self.data.resize(numel, 0.0);
        self.shape = shape;
    }

    /// Set every element to `value`
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Element-wise `self + other`
    pub fn add(&self, other: &Tensor) -> Tensor {
        self.zip_with(other, |a, b| a + b)
    }

    /// Element-wise `self - other`
    pub fn sub(&self, other: &Tensor) -> Tensor {
        self.zip_with(other, |a, b| a - b)
    }

    /// Largest `|self - other|` over all elements
    pub fn max_abs_diff(&self, other: &Tensor) -> f32 {
        self.zip_with(other, |a, b| (a - b).abs())
            .data
            .into_iter()
            .fold(0.0, f32::max)
    }

    fn zip_with(&self, other: &Tensor, op: impl Fn(f32, f32) -> f32 + Sync) -> Tensor {
        assert_eq!(
            self.shape, other.shape,
            "Element-wise op on mismatched shapes {:?} and {:?}",
            self.shape, other.shape
        );
        let data = self
            .data
            .par_iter()
            .zip(&other.data)
            .map(|(&a, &b)| op(a, b))
            .collect();
        Tensor::new(data, self.shape.clone())
    }
}
