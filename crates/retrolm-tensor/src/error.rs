use thiserror::Error;

/// The five-kind error taxonomy surfaced all the way up to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput = 1,
    IndexError = 2,
    MemoryError = 3,
}

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: (usize, usize), got: (usize, usize) },
    #[error("cannot broadcast shapes {a:?} and {b:?}")]
    BroadcastError { a: (usize, usize), b: (usize, usize) },
    #[error("matmul dimension mismatch: [{m}x{k}] @ [{k2}x{n}]")]
    MatmulMismatch { m: usize, k: usize, k2: usize, n: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("index {index} out of bounds for {bound} rows")]
    IndexOutOfBounds { index: usize, bound: usize },
    #[error("allocation failed: {0}")]
    AllocationFailed(String),
}

impl TensorError {
    /// Numeric exit-code tag for this error's kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TensorError::ShapeMismatch { .. }
            | TensorError::BroadcastError { .. }
            | TensorError::MatmulMismatch { .. }
            | TensorError::InvalidArgument(_) => ErrorKind::InvalidInput,
            TensorError::IndexOutOfBounds { .. } => ErrorKind::IndexError,
            TensorError::AllocationFailed(_) => ErrorKind::MemoryError,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind() as i32
    }
}

pub type Result<T> = std::result::Result<T, TensorError>;
