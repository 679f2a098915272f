use std::fmt;
use std::sync::Arc;

use crate::backend::ComputeBackend;
use crate::cpu::CpuBackend;
use crate::error::{Result, TensorError};
use crate::index_tensor::IndexTensor;
use crate::shape::Shape;

const TRANSPOSE_BLOCK: usize = 8;

/// A dense, row-major, 2-D tensor of `f32`.
///
/// Every `Tensor` carries its own backend so callers never need to thread one
/// through separately. The default backend is `CpuBackend`; a future GPU
/// backend can be swapped in via `Tensor::with_backend`.
#[derive(Clone)]
pub struct Tensor {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
    backend: Arc<dyn ComputeBackend>,
}

impl Tensor {
    /// Builds a tensor from row-major data. Both dimensions must be
    /// non-zero; use [`Tensor::empty`] for the one legitimate zero-row shape
    /// (the attention cache's starting state).
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(TensorError::InvalidArgument(
                "tensor dimensions must be non-zero".to_string(),
            ));
        }
        Tensor::new_allow_empty(rows, cols, data)
    }

    fn new_allow_empty(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if cols == 0 {
            return Err(TensorError::InvalidArgument(
                "tensor column count must be non-zero".to_string(),
            ));
        }
        if data.len() != rows * cols {
            return Err(TensorError::ShapeMismatch {
                expected: (rows, cols),
                got: (1, data.len()),
            });
        }
        Ok(Tensor { rows, cols, data, backend: Arc::new(CpuBackend::new()) })
    }

    /// Builds the zero-row, known-column-width shape `(0, cols)` used as the
    /// attention cache's initial, empty state. `cols` must still be
    /// non-zero: the cache always knows its embedding width.
    pub fn empty(cols: usize) -> Result<Self> {
        Tensor::new_allow_empty(0, cols, Vec::new())
    }

    pub fn with_backend(
        rows: usize,
        cols: usize,
        data: Vec<f32>,
        backend: Arc<dyn ComputeBackend>,
    ) -> Result<Self> {
        let mut t = Tensor::new_allow_empty(rows, cols, data)?;
        t.backend = backend;
        Ok(t)
    }

    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        Tensor::new(rows, cols, vec![0.0; rows * cols])
    }

    pub fn identity(n: usize) -> Result<Self> {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Tensor::new(n, n, data)
    }

    pub fn copy(&self) -> Tensor {
        self.clone()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> Shape {
        Shape::new(self.rows, self.cols)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f32> {
        if row >= self.rows || col >= self.cols {
            return Err(TensorError::IndexOutOfBounds { index: row, bound: self.rows });
        }
        Ok(self.data[row * self.cols + col])
    }

    /// Overwrites a single element in place.
    pub fn set(&mut self, row: usize, col: usize, value: f32) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            return Err(TensorError::IndexOutOfBounds { index: row, bound: self.rows });
        }
        self.data[row * self.cols + col] = value;
        Ok(())
    }

    /// Selects rows from this tensor by index, used to look up embedding
    /// vectors for a batch of token ids or positions.
    pub fn row_select(&self, idx: &IndexTensor) -> Result<Tensor> {
        let mut out = vec![0.0f32; idx.data().len() * self.cols];
        for (i, &row_idx) in idx.data().iter().enumerate() {
            let row_idx = row_idx as usize;
            if row_idx >= self.rows {
                return Err(TensorError::IndexOutOfBounds { index: row_idx, bound: self.rows });
            }
            let src = &self.data[row_idx * self.cols..(row_idx + 1) * self.cols];
            out[i * self.cols..(i + 1) * self.cols].copy_from_slice(src);
        }
        Tensor::with_backend(idx.data().len(), self.cols, out, self.backend.clone())
    }

    pub fn matmul(&self, other: &Tensor) -> Result<Tensor> {
        if self.cols != other.rows {
            return Err(TensorError::MatmulMismatch {
                m: self.rows,
                k: self.cols,
                k2: other.rows,
                n: other.cols,
            });
        }
        let data = self.backend.matmul(&self.data, &other.data, self.rows, self.cols, other.cols)?;
        Tensor::with_backend(self.rows, other.cols, data, self.backend.clone())
    }

    /// Validates that `other` is one of the three broadcast shapes this core
    /// supports against `self`: identical, a `[1, cols]` row to broadcast
    /// down every row, or a `[rows, 1]` column to broadcast across every
    /// column. Any other shape is a caller error.
    fn check_broadcast_rhs(&self, other: &Tensor) -> Result<()> {
        let same = other.rows == self.rows && other.cols == self.cols;
        let row_broadcast = other.rows == 1 && other.cols == self.cols;
        let col_broadcast = other.cols == 1 && other.rows == self.rows;
        if same || row_broadcast || col_broadcast {
            Ok(())
        } else {
            Err(TensorError::BroadcastError {
                a: (self.rows, self.cols),
                b: (other.rows, other.cols),
            })
        }
    }

    pub fn add(&self, other: &Tensor) -> Result<Tensor> {
        self.check_broadcast_rhs(other)?;
        let data = self.backend.add(
            &self.data,
            (self.rows, self.cols),
            &other.data,
            (other.rows, other.cols),
        )?;
        Tensor::with_backend(self.rows, self.cols, data, self.backend.clone())
    }

    pub fn sub(&self, other: &Tensor) -> Result<Tensor> {
        self.check_broadcast_rhs(other)?;
        let data = self.backend.sub(
            &self.data,
            (self.rows, self.cols),
            &other.data,
            (other.rows, other.cols),
        )?;
        Tensor::with_backend(self.rows, self.cols, data, self.backend.clone())
    }

    pub fn div(&self, other: &Tensor) -> Result<Tensor> {
        self.check_broadcast_rhs(other)?;
        let data = self.backend.div(
            &self.data,
            (self.rows, self.cols),
            &other.data,
            (other.rows, other.cols),
        )?;
        Tensor::with_backend(self.rows, self.cols, data, self.backend.clone())
    }

    pub fn exp(&self) -> Result<Tensor> {
        let data = self.backend.exp(&self.data)?;
        Tensor::with_backend(self.rows, self.cols, data, self.backend.clone())
    }

    pub fn relu(&self) -> Result<Tensor> {
        let data = self.backend.relu(&self.data)?;
        Tensor::with_backend(self.rows, self.cols, data, self.backend.clone())
    }

    pub fn sum_rows(&self) -> Result<Tensor> {
        let data = self.backend.sum_rows(&self.data, self.rows, self.cols)?;
        Tensor::with_backend(self.rows, 1, data, self.backend.clone())
    }

    pub fn max_rows(&self) -> Result<Tensor> {
        let data = self.backend.max_rows(&self.data, self.rows, self.cols)?;
        Tensor::with_backend(self.rows, 1, data, self.backend.clone())
    }

    fn sum_cols(&self) -> Result<Tensor> {
        let data = self.backend.sum_cols(&self.data, self.rows, self.cols)?;
        Tensor::with_backend(1, self.cols, data, self.backend.clone())
    }

    fn max_cols(&self) -> Result<Tensor> {
        let data = self.backend.max_cols(&self.data, self.rows, self.cols)?;
        Tensor::with_backend(1, self.cols, data, self.backend.clone())
    }

    /// Reduction over `dim ∈ {0, 1}`: `dim = 0` sums down each column,
    /// yielding `[1, cols]`; `dim = 1` sums across each row, yielding
    /// `[rows, 1]`. Any other `dim` is `InvalidInput`.
    pub fn sum(&self, dim: usize) -> Result<Tensor> {
        match dim {
            0 => self.sum_cols(),
            1 => self.sum_rows(),
            _ => Err(TensorError::InvalidArgument(format!(
                "sum: dim must be 0 or 1, got {dim}"
            ))),
        }
    }

    /// Reduction over `dim ∈ {0, 1}`: `dim = 0` takes the max down each
    /// column, yielding `[1, cols]`; `dim = 1` takes the max across each
    /// row, yielding `[rows, 1]`. Any other `dim` is `InvalidInput`.
    pub fn max(&self, dim: usize) -> Result<Tensor> {
        match dim {
            0 => self.max_cols(),
            1 => self.max_rows(),
            _ => Err(TensorError::InvalidArgument(format!(
                "max: dim must be 0 or 1, got {dim}"
            ))),
        }
    }

    pub fn softmax_rows(&self) -> Result<Tensor> {
        let data = self.backend.softmax_rows(&self.data, self.rows, self.cols)?;
        Tensor::with_backend(self.rows, self.cols, data, self.backend.clone())
    }

    /// Scales every element by `factor`, in place.
    pub fn scale(&mut self, factor: f32) {
        for v in self.data.iter_mut() {
            *v *= factor;
        }
    }

    /// Adds `amount` to every element, in place.
    pub fn shift(&mut self, amount: f32) {
        for v in self.data.iter_mut() {
            *v += amount;
        }
    }

    pub fn clamp(&mut self, min: f32, max: f32) -> Result<()> {
        if !(min < max) {
            return Err(TensorError::InvalidArgument(format!(
                "clamp requires lo < hi, got lo={min} hi={max}"
            )));
        }
        for v in self.data.iter_mut() {
            *v = v.clamp(min, max);
        }
        Ok(())
    }

    pub fn clamp_min(&mut self, min: f32) {
        for v in self.data.iter_mut() {
            *v = v.max(min);
        }
    }

    /// Sets every entry strictly above the diagonal (`j > i`) to `value`,
    /// in place; the diagonal itself is untouched. Requires a square
    /// tensor. Used to enforce causal attention masking during prefill,
    /// where the scores matrix is `[n, n]`.
    pub fn mask_upper_triangle(&mut self, value: f32) -> Result<()> {
        if self.rows != self.cols {
            return Err(TensorError::InvalidArgument(
                "mask_upper_triangle requires a square tensor".to_string(),
            ));
        }
        for i in 0..self.rows {
            for j in (i + 1)..self.cols {
                self.data[i * self.cols + j] = value;
            }
        }
        Ok(())
    }

    /// Returns a freshly-allocated transpose, computed in
    /// `TRANSPOSE_BLOCK`-sized tiles for cache locality.
    pub fn transpose(&self) -> Tensor {
        let mut out = vec![0.0f32; self.rows * self.cols];
        let (r, c) = (self.rows, self.cols);
        let mut bi = 0;
        while bi < r {
            let i_end = (bi + TRANSPOSE_BLOCK).min(r);
            let mut bj = 0;
            while bj < c {
                let j_end = (bj + TRANSPOSE_BLOCK).min(c);
                for i in bi..i_end {
                    for j in bj..j_end {
                        out[j * r + i] = self.data[i * c + j];
                    }
                }
                bj = j_end;
            }
            bi = i_end;
        }
        Tensor { rows: c, cols: r, data: out, backend: self.backend.clone() }
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tensor[{}, {}]", self.rows, self.cols)?;
        for i in 0..self.rows {
            let row = &self.data[i * self.cols..(i + 1) * self.cols];
            writeln!(f, "{:?}", row)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_new_rejects_zero_dim() {
        assert!(Tensor::new(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_zeros_and_get() {
        let t = Tensor::zeros(2, 2).unwrap();
        assert_eq!(t.get(0, 0).unwrap(), 0.0);
        assert_eq!(t.get(1, 1).unwrap(), 0.0);
    }

    #[test]
    fn test_identity() {
        let t = Tensor::identity(3).unwrap();
        assert_eq!(t.get(0, 0).unwrap(), 1.0);
        assert_eq!(t.get(0, 1).unwrap(), 0.0);
        assert_eq!(t.get(2, 2).unwrap(), 1.0);
    }

    #[test]
    fn test_matmul() {
        let a = Tensor::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Tensor::new(2, 2, vec![5.0, 6.0, 7.0, 8.0]).unwrap();
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matmul_mismatch() {
        let a = Tensor::new(2, 3, vec![0.0; 6]).unwrap();
        let b = Tensor::new(2, 2, vec![0.0; 4]).unwrap();
        assert!(a.matmul(&b).is_err());
    }

    #[test]
    fn test_row_select() {
        let t = Tensor::new(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let idx = IndexTensor::row(vec![2, 0]);
        let r = t.row_select(&idx).unwrap();
        assert_eq!(r.data(), &[5.0, 6.0, 1.0, 2.0]);
    }

    #[test]
    fn test_row_select_out_of_bounds() {
        let t = Tensor::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let idx = IndexTensor::scalar(5);
        assert!(t.row_select(&idx).is_err());
    }

    #[test]
    fn test_mask_upper_triangle() {
        let mut t = Tensor::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        t.mask_upper_triangle(f32::NEG_INFINITY).unwrap();
        assert_eq!(t.get(0, 0).unwrap(), 1.0);
        assert!(t.get(0, 1).unwrap().is_infinite());
        assert_eq!(t.get(1, 0).unwrap(), 3.0);
        assert_eq!(t.get(1, 1).unwrap(), 4.0);
    }

    #[test]
    fn test_mask_upper_triangle_requires_square() {
        let mut t = Tensor::new(2, 3, vec![0.0; 6]).unwrap();
        assert!(t.mask_upper_triangle(f32::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_empty_cache_shape() {
        let t = Tensor::empty(8).unwrap();
        assert_eq!(t.rows(), 0);
        assert_eq!(t.cols(), 8);
        assert!(Tensor::new(0, 8, vec![]).is_err());
    }

    #[test]
    fn test_sum_max_dim() {
        let t = Tensor::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(t.sum(1).unwrap().data(), &[6.0, 15.0]);
        assert_eq!(t.sum(0).unwrap().data(), &[5.0, 7.0, 9.0]);
        assert_eq!(t.max(1).unwrap().data(), &[3.0, 6.0]);
        assert_eq!(t.max(0).unwrap().data(), &[4.0, 5.0, 6.0]);
        assert!(t.sum(2).is_err());
        assert!(t.max(2).is_err());
    }

    #[test]
    fn test_add_rejects_bad_broadcast() {
        let a = Tensor::new(2, 3, vec![0.0; 6]).unwrap();
        let b = Tensor::new(2, 2, vec![0.0; 4]).unwrap();
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn test_clamp_requires_lo_lt_hi() {
        let mut t = Tensor::new(1, 2, vec![1.0, 2.0]).unwrap();
        assert!(t.clamp(1.0, 1.0).is_err());
        assert!(t.clamp(-1.0, 1.0).is_ok());
    }

    #[test]
    fn test_transpose() {
        let t = Tensor::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let tt = t.transpose();
        assert_eq!(tt.shape(), Shape::new(3, 2));
        assert_eq!(tt.data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_softmax_rows() {
        let t = Tensor::new(1, 3, vec![1.0, 2.0, 3.0]).unwrap();
        let s = t.softmax_rows().unwrap();
        let sum: f32 = s.data().iter().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_scale_and_shift() {
        let mut t = Tensor::new(1, 2, vec![1.0, 2.0]).unwrap();
        t.scale(2.0);
        assert_eq!(t.data(), &[2.0, 4.0]);
        t.shift(1.0);
        assert_eq!(t.data(), &[3.0, 5.0]);
    }

    #[test]
    fn test_matmul_kernel_scenario() {
        // Spec end-to-end scenario 1.
        let a = Tensor::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = Tensor::new(3, 2, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.data(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_copy_is_independent_of_original() {
        let t = Tensor::new(1, 2, vec![1.0, 2.0]).unwrap();
        let mut copy = t.copy();
        assert_eq!(copy.data(), t.data());
        copy.scale(10.0);
        assert_eq!(t.data(), &[1.0, 2.0]);
        assert_eq!(copy.data(), &[10.0, 20.0]);
    }

    #[test]
    fn test_double_transpose_is_identity() {
        let t = Tensor::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let tt = t.transpose().transpose();
        assert_eq!(tt.shape(), t.shape());
        assert_eq!(tt.data(), t.data());
    }

    #[test]
    fn test_softmax_uniform_input_is_uniform_output() {
        let t = Tensor::new(1, 4, vec![3.0, 3.0, 3.0, 3.0]).unwrap();
        let out = t.softmax_rows().unwrap();
        for &v in out.data() {
            assert_abs_diff_eq!(v, 0.25, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_1x1_relu_matmul_round_trip_preserves_identity() {
        let x = Tensor::new(1, 1, vec![7.0]).unwrap();
        let w = Tensor::identity(1).unwrap();
        let y = x.matmul(&w).unwrap();
        let r = y.relu().unwrap();
        assert_eq!(r.data(), &[7.0]);
    }
}
