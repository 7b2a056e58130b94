//! Neural Network Layers
//!
//! ## Layers
//!
//! - **affine**: Dense affine transform `y = x @ A^T + b`
//!
//! ## Design Pattern
//!
//! A layer owns its parameters and its working buffers and is driven by the
//! host through a fixed sequence of calls:
//!
//! ```rust,ignore
//! layer.configure(output_height, &input_shape, &weight_filler, &bias_filler)?;
//! layer.reshape(&input_shape)?;              // whenever the batch size changes
//! let y = layer.forward(&x)?;                // caches x
//! let g = layer.backward(&grad_y, false, true)?;
//! ```
//!
//! Parameters are exposed as an ordered `[weight, bias]` list so an external
//! optimizer can update them in place.

pub mod affine;

// Re-export main types for convenience
pub use affine::{AffineCache, AffineTransformLayer, LayerState, BIAS, WEIGHT};
