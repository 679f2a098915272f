use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};

/// Pure-Rust CPU compute backend.
///
/// Implements all operations with straightforward loops optimized for
/// correctness rather than peak performance. Intended as a reference
/// implementation and fallback.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Broadcasts `(rows, cols)` against `(rows, cols)` per the three allowed
/// shapes: identical, row-vector ([1, cols]), or column-vector ([rows, 1]).
fn broadcast_out_shape(
    a: (usize, usize),
    b: (usize, usize),
) -> Result<(usize, usize)> {
    let rows = match (a.0, b.0) {
        (x, y) if x == y => x,
        (1, y) => y,
        (x, 1) => x,
        _ => return Err(TensorError::BroadcastError { a, b }),
    };
    let cols = match (a.1, b.1) {
        (x, y) if x == y => x,
        (1, y) => y,
        (x, 1) => x,
        _ => return Err(TensorError::BroadcastError { a, b }),
    };
    Ok((rows, cols))
}

fn broadcast_elementwise(
    a: &[f32],
    a_shape: (usize, usize),
    b: &[f32],
    b_shape: (usize, usize),
    op: impl Fn(f32, f32) -> f32,
) -> Result<Vec<f32>> {
    let (rows, cols) = broadcast_out_shape(a_shape, b_shape)?;
    let mut out = vec![0.0f32; rows * cols];
    for i in 0..rows {
        let ai = if a_shape.0 == 1 { 0 } else { i };
        let bi = if b_shape.0 == 1 { 0 } else { i };
        for j in 0..cols {
            let aj = if a_shape.1 == 1 { 0 } else { j };
            let bj = if b_shape.1 == 1 { 0 } else { j };
            out[i * cols + j] = op(
                a[ai * a_shape.1 + aj],
                b[bi * b_shape.1 + bj],
            );
        }
    }
    Ok(out)
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>> {
        if a.len() != m * k {
            return Err(TensorError::InvalidArgument(format!(
                "matmul: a.len()={} but expected m*k={}",
                a.len(),
                m * k
            )));
        }
        if b.len() != k * n {
            return Err(TensorError::InvalidArgument(format!(
                "matmul: b.len()={} but expected k*n={}",
                b.len(),
                k * n
            )));
        }

        let mut c = vec![0.0f32; m * n];
        for i in 0..m {
            for p in 0..k {
                let a_ip = a[i * k + p];
                if a_ip == 0.0 {
                    continue;
                }
                for j in 0..n {
                    c[i * n + j] += a_ip * b[p * n + j];
                }
            }
        }
        Ok(c)
    }

    fn add(
        &self,
        a: &[f32],
        a_shape: (usize, usize),
        b: &[f32],
        b_shape: (usize, usize),
    ) -> Result<Vec<f32>> {
        broadcast_elementwise(a, a_shape, b, b_shape, |x, y| x + y)
    }

    fn sub(
        &self,
        a: &[f32],
        a_shape: (usize, usize),
        b: &[f32],
        b_shape: (usize, usize),
    ) -> Result<Vec<f32>> {
        broadcast_elementwise(a, a_shape, b, b_shape, |x, y| x - y)
    }

    fn div(
        &self,
        a: &[f32],
        a_shape: (usize, usize),
        b: &[f32],
        b_shape: (usize, usize),
    ) -> Result<Vec<f32>> {
        broadcast_elementwise(a, a_shape, b, b_shape, |x, y| x / y)
    }

    fn exp(&self, a: &[f32]) -> Result<Vec<f32>> {
        Ok(a.iter().map(|v| v.exp()).collect())
    }

    fn relu(&self, a: &[f32]) -> Result<Vec<f32>> {
        Ok(a.iter().map(|&v| v.max(0.0)).collect())
    }

    fn sum_rows(&self, a: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>> {
        if a.len() != rows * cols {
            return Err(TensorError::InvalidArgument(format!(
                "sum_rows: a.len()={} but expected rows*cols={}",
                a.len(),
                rows * cols
            )));
        }
        let mut out = vec![0.0f32; rows];
        for i in 0..rows {
            out[i] = a[i * cols..(i + 1) * cols].iter().sum();
        }
        Ok(out)
    }

    fn max_rows(&self, a: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>> {
        if a.len() != rows * cols {
            return Err(TensorError::InvalidArgument(format!(
                "max_rows: a.len()={} but expected rows*cols={}",
                a.len(),
                rows * cols
            )));
        }
        let mut out = vec![f32::NEG_INFINITY; rows];
        for i in 0..rows {
            out[i] = a[i * cols..(i + 1) * cols]
                .iter()
                .copied()
                .fold(f32::NEG_INFINITY, f32::max);
        }
        Ok(out)
    }

    fn sum_cols(&self, a: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>> {
        if a.len() != rows * cols {
            return Err(TensorError::InvalidArgument(format!(
                "sum_cols: a.len()={} but expected rows*cols={}",
                a.len(),
                rows * cols
            )));
        }
        let mut out = vec![0.0f32; cols];
        for i in 0..rows {
            for (j, slot) in out.iter_mut().enumerate() {
                *slot += a[i * cols + j];
            }
        }
        Ok(out)
    }

    fn max_cols(&self, a: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>> {
        if a.len() != rows * cols {
            return Err(TensorError::InvalidArgument(format!(
                "max_cols: a.len()={} but expected rows*cols={}",
                a.len(),
                rows * cols
            )));
        }
        let mut out = vec![f32::NEG_INFINITY; cols];
        for i in 0..rows {
            for (j, slot) in out.iter_mut().enumerate() {
                *slot = slot.max(a[i * cols + j]);
            }
        }
        Ok(out)
    }

    fn softmax_rows(&self, a: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>> {
        if cols == 0 {
            return Err(TensorError::InvalidArgument(
                "softmax_rows: cols must be > 0".to_string(),
            ));
        }
        if a.len() != rows * cols {
            return Err(TensorError::InvalidArgument(format!(
                "softmax_rows: a.len()={} but expected rows*cols={}",
                a.len(),
                rows * cols
            )));
        }

        let mut out = vec![0.0f32; a.len()];
        for row in 0..rows {
            let offset = row * cols;
            let row_data = &a[offset..offset + cols];

            let max_val = row_data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if max_val == f32::NEG_INFINITY {
                // Every entry in the row is masked out; leave the row zeroed
                // rather than dividing zero by zero.
                continue;
            }

            let mut sum = 0.0f32;
            for i in 0..cols {
                let e = (row_data[i] - max_val).exp();
                out[offset + i] = e;
                sum += e;
            }
            for i in 0..cols {
                out[offset + i] /= sum;
            }
        }

        Ok(out)
    }
}
