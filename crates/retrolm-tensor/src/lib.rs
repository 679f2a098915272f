//! `retrolm-tensor` - Tensor library with pluggable compute backends for RetroLM.
//!
//! This crate provides:
//! - A `Tensor` type: a dense, row-major 2-D matrix of `f32`
//! - An `IndexTensor` type for token ids and positions
//! - A `ComputeBackend` trait for pluggable compute (CPU today)
//! - A reference `CpuBackend` implementation
//! - Shape utilities and restricted broadcasting

pub mod backend;
pub mod cpu;
pub mod error;
pub mod index_tensor;
pub mod shape;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use error::{ErrorKind, Result, TensorError};
pub use index_tensor::IndexTensor;
pub use shape::Shape;
pub use tensor::Tensor;
