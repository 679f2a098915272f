use std::fmt::Debug;

use crate::error::Result;

/// Trait for pluggable compute backends (CPU today; a GPU backend could be
/// added later without touching the `Tensor` API above it).
///
/// All operations work on f32 slices. Data is passed in as slices and
/// returned as owned vectors; the backend performs the computation and the
/// caller (`Tensor`) is responsible for wrapping the result back up with its
/// shape.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g. "cpu").
    fn name(&self) -> &str;

    /// Matrix multiplication: C = A @ B.
    ///
    /// - `a`: row-major data of shape [m, k]
    /// - `b`: row-major data of shape [k, n]
    /// - Returns: row-major data of shape [m, n]
    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>>;

    /// Broadcasting element-wise addition. `a_shape`/`b_shape` must be
    /// identical, or one dimension of one operand must be 1 (row-vector or
    /// column-vector broadcast).
    fn add(
        &self,
        a: &[f32],
        a_shape: (usize, usize),
        b: &[f32],
        b_shape: (usize, usize),
    ) -> Result<Vec<f32>>;

    /// Broadcasting element-wise subtraction, same rules as `add`.
    fn sub(
        &self,
        a: &[f32],
        a_shape: (usize, usize),
        b: &[f32],
        b_shape: (usize, usize),
    ) -> Result<Vec<f32>>;

    /// Broadcasting element-wise division, same rules as `add`.
    fn div(
        &self,
        a: &[f32],
        a_shape: (usize, usize),
        b: &[f32],
        b_shape: (usize, usize),
    ) -> Result<Vec<f32>>;

    /// Element-wise exponential.
    fn exp(&self, a: &[f32]) -> Result<Vec<f32>>;

    /// Element-wise rectified linear unit: `max(0, x)`.
    fn relu(&self, a: &[f32]) -> Result<Vec<f32>>;

    /// Row-wise sum reduction over a [rows, cols] matrix, producing `rows`
    /// values (one per row). This is `dim = 1`.
    fn sum_rows(&self, a: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>>;

    /// Row-wise max reduction over a [rows, cols] matrix, producing `rows`
    /// values (one per row). This is `dim = 1`.
    fn max_rows(&self, a: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>>;

    /// Column-wise sum reduction over a [rows, cols] matrix, producing
    /// `cols` values (one per column). This is `dim = 0`.
    fn sum_cols(&self, a: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>>;

    /// Column-wise max reduction over a [rows, cols] matrix, producing
    /// `cols` values (one per column). This is `dim = 0`.
    fn max_cols(&self, a: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>>;

    /// Numerically stable row-wise softmax over a [rows, cols] matrix.
    ///
    /// For each row: `result[i] = exp(x[i] - max(x)) / sum(exp(x - max(x)))`.
    fn softmax_rows(&self, a: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>>;
}
