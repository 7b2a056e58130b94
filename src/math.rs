//! Dense Matrix Kernels
//!
//! This module provides the general matrix-matrix multiply (GEMM) that the
//! affine layer is built on. It follows the BLAS contract:
//!
//! ```text
//! C = alpha * op(A) @ op(B) + beta * C
//!
//! op(A): [m, k]    (A stored as [k, m] when transposed)
//! op(B): [k, n]    (B stored as [n, k] when transposed)
//! C:     [m, n]
//! ```
//!
//! All buffers are flat row-major `f32` slices.
//!
//! ## beta
//!
//! - `beta == 0.0` overwrites `C` (existing contents are ignored, even NaN)
//! - `beta == 1.0` accumulates into `C`
//!
//! The affine forward pass uses both: one call to overwrite the output with
//! `x @ W^T`, a second call to accumulate the broadcast bias.
//!
//! ## Performance
//!
//! Small products run sequentially. Once `m * n * k` reaches
//! [`PARALLEL_THRESHOLD`] the output is split into row blocks that Rayon
//! processes in parallel. Each block only writes its own rows of `C`, so no
//! synchronization is needed.

use rayon::prelude::*;

/// Work size (m * n * k) at which the parallel path kicks in
pub const PARALLEL_THRESHOLD: usize = 1_000;

/// Output rows handed to each Rayon task
const BLOCK_ROWS: usize = 8;

/// Whether an operand is read as stored or transposed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transpose {
    NoTrans,
    Trans,
}

/// General matrix-matrix multiply: `C = alpha * op(A) @ op(B) + beta * C`
///
/// # Arguments
///
/// * `trans_a` / `trans_b` - Whether A / B are stored transposed
/// * `m` - Rows of op(A) and C
/// * `n` - Columns of op(B) and C
/// * `k` - Shared inner dimension
/// * `alpha` - Scale applied to the product
/// * `a`, `b` - Operand buffers
/// * `beta` - Scale applied to the existing contents of C
/// * `c` - Output buffer of at least `m * n` values
///
/// # Panics
///
/// Panics if any buffer is shorter than its dimensions require.
///
/// # Example
///
/// ```rust
/// use affine_layer::math::{gemm, Transpose};
///
/// // [1, 2] @ [[3], [4]] = [11]
/// let mut c = vec![0.0];
/// gemm(Transpose::NoTrans, Transpose::NoTrans, 1, 1, 2, 1.0, &[1.0, 2.0], &[3.0, 4.0], 0.0, &mut c);
/// assert_eq!(c, vec![11.0]);
/// ```
#[allow(clippy::too_many_arguments)]
pub fn gemm(
    trans_a: Transpose,
    trans_b: Transpose,
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    a: &[f32],
    b: &[f32],
    beta: f32,
    c: &mut [f32],
) {
    assert!(a.len() >= m * k, "gemm: A holds {} values, needs {}x{}", a.len(), m, k);
    assert!(b.len() >= k * n, "gemm: B holds {} values, needs {}x{}", b.len(), k, n);
    assert!(c.len() >= m * n, "gemm: C holds {} values, needs {}x{}", c.len(), m, n);

    if m == 0 || n == 0 {
        return;
    }
    let c = &mut c[..m * n];

    let compute_block = |block_idx: usize, rows: &mut [f32]| {
        let i_start = block_idx * BLOCK_ROWS;
        for (offset, row) in rows.chunks_mut(n).enumerate() {
            gemm_row(trans_a, trans_b, i_start + offset, m, n, k, alpha, a, b, beta, row);
        }
    };

    if m * n * k >= PARALLEL_THRESHOLD {
        c.par_chunks_mut(BLOCK_ROWS * n)
            .enumerate()
            .for_each(|(block_idx, rows)| compute_block(block_idx, rows));
    } else {
        c.chunks_mut(BLOCK_ROWS * n)
            .enumerate()
            .for_each(|(block_idx, rows)| compute_block(block_idx, rows));
    }
}

/// Compute one output row `i` of C
#[allow(clippy::too_many_arguments)]
#[inline]
fn gemm_row(
    trans_a: Transpose,
    trans_b: Transpose,
    i: usize,
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    a: &[f32],
    b: &[f32],
    beta: f32,
    row: &mut [f32],
) {
    if beta == 0.0 {
        row.fill(0.0);
    } else if beta != 1.0 {
        row.iter_mut().for_each(|v| *v *= beta);
    }

    if alpha == 0.0 {
        return;
    }

    for l in 0..k {
        let a_val = match trans_a {
            Transpose::NoTrans => a[i * k + l],
            Transpose::Trans => a[l * m + i],
        } * alpha;

        match trans_b {
            Transpose::NoTrans => axpy(a_val, &b[l * n..(l + 1) * n], row),
            Transpose::Trans => {
                for (j, r) in row.iter_mut().enumerate() {
                    *r += a_val * b[j * k + l];
                }
            }
        }
    }
}

/// `y += a * x`, written so LLVM auto-vectorizes it
#[inline(always)]
fn axpy(a: f32, x: &[f32], y: &mut [f32]) {
    for (y_val, &x_val) in y.iter_mut().zip(x.iter()) {
        *y_val += a * x_val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::Transpose::{NoTrans, Trans};

    #[test]
    fn test_gemm_no_transpose() {
        // [[1, 2], [3, 4]] @ [[5, 6], [7, 8]]
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let mut c = vec![0.0; 4];
        gemm(NoTrans, NoTrans, 2, 2, 2, 1.0, &a, &b, 0.0, &mut c);
        assert_eq!(c, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_gemm_transposed_b() {
        // A [1, 3], B stored [2, 3] -> A @ B^T is [1, 2]
        let a = [5.0, 6.0, 7.0];
        let b = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let mut c = vec![0.0; 2];
        gemm(NoTrans, Trans, 1, 2, 3, 1.0, &a, &b, 0.0, &mut c);
        assert_eq!(c, vec![5.0, 6.0]);
    }

    #[test]
    fn test_gemm_transposed_a() {
        // A stored [2, 1] = [[1], [2]] -> A^T is [1, 2]
        let a = [1.0, 2.0];
        let b = [3.0, 4.0];
        let mut c = vec![0.0; 1];
        gemm(Trans, NoTrans, 1, 1, 2, 1.0, &a, &b, 0.0, &mut c);
        assert_eq!(c, vec![11.0]);
    }

    #[test]
    fn test_gemm_beta_zero_overwrites_nan() {
        let mut c = vec![f32::NAN; 2];
        gemm(NoTrans, NoTrans, 1, 2, 1, 1.0, &[2.0], &[1.0, 3.0], 0.0, &mut c);
        assert_eq!(c, vec![2.0, 6.0]);
    }

    #[test]
    fn test_gemm_beta_one_accumulates() {
        let mut c = vec![10.0, 20.0];
        gemm(NoTrans, NoTrans, 1, 2, 1, 1.0, &[1.0], &[1.0, 2.0], 1.0, &mut c);
        assert_eq!(c, vec![11.0, 22.0]);
    }

    #[test]
    fn test_gemm_alpha_scales_product() {
        let mut c = vec![1.0];
        gemm(NoTrans, NoTrans, 1, 1, 1, 0.5, &[4.0], &[3.0], 2.0, &mut c);
        assert_eq!(c, vec![8.0]);
    }

    #[test]
    fn test_gemm_parallel_matches_sequential() {
        // 20 x 16 x 12 is above the parallel threshold
        let (m, n, k) = (20, 16, 12);
        let a: Vec<f32> = (0..m * k).map(|i| (i % 7) as f32 - 3.0).collect();
        let b: Vec<f32> = (0..n * k).map(|i| (i % 5) as f32 * 0.5).collect();

        let mut fast = vec![0.0; m * n];
        gemm(NoTrans, Trans, m, n, k, 1.0, &a, &b, 0.0, &mut fast);

        let mut expected = vec![0.0; m * n];
        for i in 0..m {
            for j in 0..n {
                expected[i * n + j] = (0..k).map(|l| a[i * k + l] * b[j * k + l]).sum();
            }
        }

        for (got, want) in fast.iter().zip(&expected) {
            assert!((got - want).abs() < 1e-4, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_gemm_empty_output_is_noop() {
        let mut c: Vec<f32> = vec![];
        gemm(NoTrans, NoTrans, 0, 3, 2, 1.0, &[], &[0.0; 6], 0.0, &mut c);
        assert!(c.is_empty());
    }

    #[test]
    #[should_panic(expected = "gemm: A holds")]
    fn test_gemm_short_buffer_panics() {
        let mut c = vec![0.0; 4];
        gemm(NoTrans, NoTrans, 2, 2, 2, 1.0, &[1.0], &[0.0; 4], 0.0, &mut c);
    }
}
