//! Affine Layer: a dense transform layer with forward and backward passes
//!
//! Given a batch of input rows `x [W, M]`, the layer computes
//! `y = x @ A^T + b` with a learned weight `A [H, M]` and bias `b [1, H]`.
//! It is a leaf component meant to be driven by an external graph executor
//! and optimizer.
//!
//! # Modules
//!
//! - [`layers`] - The [`AffineTransformLayer`] itself
//! - [`tensor`] - Row-major tensor storage
//! - [`math`] - GEMM kernel
//! - [`filler`] - Parameter initializers
//! - [`param`] - Learned parameter blobs
//! - [`config`] - JSON layer configuration
//!
//! # Example
//!
//! ```rust
//! use affine_layer::{AffineTransformLayer, Tensor};
//! use affine_layer::filler::ConstantFiller;
//!
//! let mut layer = AffineTransformLayer::new();
//! let zero = ConstantFiller { value: 0.0 };
//! layer.configure(2, &[1, 3], &zero, &zero).unwrap();
//!
//! let y = layer.forward(&Tensor::new(vec![5.0, 6.0, 7.0], vec![1, 3])).unwrap();
//! assert_eq!(y.shape, vec![1, 2]);
//! ```

pub mod config;
pub mod error;
pub mod filler;
pub mod layers;
pub mod math;
pub mod param;
pub mod tensor;

// Re-export main types for convenience
pub use config::AffineConfig;
pub use error::{LayerError, Result};
pub use filler::{Filler, FillerConfig};
pub use layers::AffineTransformLayer;
pub use param::Param;
pub use tensor::Tensor;
