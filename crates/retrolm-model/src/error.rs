use thiserror::Error;

use retrolm_tensor::error::ErrorKind as TensorErrorKind;
use retrolm_tensor::TensorError;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed weight file: {0}")]
    FileFormat(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ModelError {
    /// Numeric exit-code tag realizing the five-kind error taxonomy.
    pub fn exit_code(&self) -> i32 {
        match self {
            ModelError::Tensor(e) => match e.kind() {
                TensorErrorKind::InvalidInput => 1,
                TensorErrorKind::IndexError => 2,
                TensorErrorKind::MemoryError => 3,
            },
            ModelError::InvalidInput(_) => 1,
            ModelError::Io(_) => 4,
            ModelError::FileFormat(_) => 4,
            ModelError::Config(_) => 5,
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
