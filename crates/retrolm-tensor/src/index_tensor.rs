use crate::error::{Result, TensorError};

/// A 2-D, row-major tensor of `u32` indices (token ids or positions).
///
/// Kept as a distinct type from `Tensor` rather than a `Tensor` of floats:
/// indices are never the target of arithmetic, only lookups, and keeping the
/// element type as `u32` avoids float/int round-trip bugs when converting
/// token ids back into row offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTensor {
    rows: usize,
    cols: usize,
    data: Vec<u32>,
}

impl IndexTensor {
    pub fn new(rows: usize, cols: usize, data: Vec<u32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(TensorError::ShapeMismatch {
                expected: (rows, cols),
                got: (1, data.len()),
            });
        }
        Ok(IndexTensor { rows, cols, data })
    }

    /// A single [1, 1] index, the shape used for one decode-step token id.
    pub fn scalar(value: u32) -> Self {
        IndexTensor { rows: 1, cols: 1, data: vec![value] }
    }

    /// A [1, n] row of indices, the shape used for a prompt's token ids.
    pub fn row(values: Vec<u32>) -> Self {
        IndexTensor { rows: 1, cols: values.len(), data: values }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn data(&self) -> &[u32] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Result<u32> {
        if row >= self.rows || col >= self.cols {
            return Err(TensorError::IndexOutOfBounds { index: row, bound: self.rows });
        }
        Ok(self.data[row * self.cols + col])
    }

    /// Overwrite this tensor's single value in place. Used to reuse the
    /// [1, 1] decode-step scratch tensor across calls instead of
    /// reallocating it every iteration.
    pub fn set_scalar(&mut self, value: u32) -> Result<()> {
        if self.rows != 1 || self.cols != 1 {
            return Err(TensorError::InvalidArgument(
                "set_scalar requires a [1, 1] index tensor".to_string(),
            ));
        }
        self.data[0] = value;
        Ok(())
    }
}
