//! Affine Transform Layer
//!
//! Maps a batch of input rows to a batch of output rows through a learned
//! weight matrix and bias:
//!
//! ```text
//! Input:  x [W, M]        (W = batch size, M = input features)
//! Weight: A [H, M]        (H = output features)
//! Bias:   b [1, H]
//! Output: y = x @ A^T + 1_W @ b   [W, H]
//! ```
//!
//! The bias is broadcast with a second GEMM against a length-W vector of
//! ones (the bias multiplier) that accumulates into the output, instead of
//! an explicit per-row loop.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ──configure()──▶ Configured ──reshape()/forward()/backward()
//! ```
//!
//! `configure` allocates and fills the parameters once. If parameters are
//! already present (an earlier `configure`, or pretrained values installed
//! with `load_params`) initialization is skipped and their values are left
//! untouched.
//!
//! ## Backward Pass
//!
//! The layer is meant to sit at the start of a pipeline, so it refuses to
//! propagate a gradient to its input. When a parameter gradient is requested
//! it produces an input-shaped buffer:
//!
//! ```text
//! input_grad [W, M] = grad_y [W, H] @ X [H, M]
//! ```
//!
//! where `X` is the first `H` rows of the cached input batch, standing where
//! the weight matrix would appear in a true `grad_x = grad_y @ A`. This is
//! kept for compatibility with existing behavior and is most likely a defect:
//! the weight and bias gradients (`diff`) are never written.
//!
//! ## Example
//!
//! ```rust
//! use affine_layer::{AffineConfig, AffineTransformLayer, Tensor};
//! use affine_layer::filler::FillerConfig;
//!
//! let config = AffineConfig::new(2)
//!     .with_weight_filler(FillerConfig::Constant { value: 1.0 })
//!     .with_bias_filler(FillerConfig::Constant { value: 0.5 });
//!
//! let mut layer = AffineTransformLayer::new();
//! layer.configure_from(&config, &[1, 3]).unwrap();
//!
//! let x = Tensor::new(vec![1.0, 2.0, 3.0], vec![1, 3]);
//! let y = layer.forward(&x).unwrap();
//! assert_eq!(y.data, vec![6.5, 6.5]);
//! ```

use crate::config::AffineConfig;
use crate::error::{LayerError, Result};
use crate::filler::Filler;
use crate::math::{gemm, Transpose};
use crate::param::Param;
use crate::tensor::Tensor;

/// Index of the weight matrix in the parameter list
pub const WEIGHT: usize = 0;
/// Index of the bias vector in the parameter list
pub const BIAS: usize = 1;

/// Setup state of a layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerState {
    Unconfigured,
    Configured,
}

/// Values kept from the last forward pass for backward
#[derive(Clone, Debug)]
pub struct AffineCache {
    pub input: Tensor,
}

/// Dense affine layer: y = x @ A^T + b
///
/// Owns its weight `[H, M]` and bias `[1, H]` plus the output, bias
/// multiplier and gradient buffers. All mutating calls take `&mut self`;
/// share an instance across threads only behind a lock.
#[derive(Clone, Debug)]
pub struct AffineTransformLayer {
    state: LayerState,
    output_features: usize,
    input_features: usize,
    batch_size: usize,
    params: Vec<Param>,
    bias_multiplier: Tensor,
    output: Tensor,
    cache: Option<AffineCache>,
    input_grad: Option<Tensor>,
}

impl Default for AffineTransformLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AffineTransformLayer {
    /// Create an unconfigured layer with no parameters
    pub fn new() -> Self {
        Self {
            state: LayerState::Unconfigured,
            output_features: 0,
            input_features: 0,
            batch_size: 0,
            params: Vec::new(),
            bias_multiplier: Tensor::zeros(vec![0]),
            output: Tensor::zeros(vec![0, 0]),
            cache: None,
            input_grad: None,
        }
    }

    /// Install existing `[weight, bias]` parameters
    ///
    /// A later `configure` keeps these values instead of running the fillers.
    /// The weight must be `[H, M]` and the bias `[1, H]`; on a configured
    /// layer both must also match the configured dimensions.
    pub fn load_params(&mut self, params: Vec<Param>) -> Result<()> {
        if params.len() != 2 {
            return Err(LayerError::Configuration(format!(
                "expected [weight, bias] parameters, got {}",
                params.len()
            )));
        }
        let weight_shape = params[WEIGHT].shape();
        if weight_shape.len() != 2 {
            return Err(LayerError::Configuration(format!(
                "weight must be 2D, got shape {:?}",
                weight_shape
            )));
        }
        let (h, m) = (weight_shape[0], weight_shape[1]);
        if params[BIAS].shape() != [1, h] {
            return Err(LayerError::ShapeMismatch {
                what: "bias",
                expected: vec![1, h],
                actual: params[BIAS].shape().to_vec(),
            });
        }
        if self.is_configured() && (h, m) != (self.output_features, self.input_features) {
            return Err(LayerError::ShapeMismatch {
                what: "weight",
                expected: vec![self.output_features, self.input_features],
                actual: vec![h, m],
            });
        }

        self.params = params;
        Ok(())
    }

    /// Set up the layer for inputs shaped like `input_shape`
    ///
    /// Derives the batch size and input features from `input_shape`
    /// (`[W, M]`), allocates weight `[H, M]` and bias `[1, H]` and fills them,
    /// then sizes the output and bias multiplier for the batch.
    ///
    /// Parameters that are already present are kept as they are; calling
    /// `configure` again is a no-op on their data.
    ///
    /// # Errors
    ///
    /// - `Configuration` if `output_height` is 0, `input_shape` is not a
    ///   non-empty 2D shape, or a buffer size overflows `usize`
    /// - `ShapeMismatch` if existing parameters disagree with `[H, M]`
    /// - whatever a filler returns
    pub fn configure(
        &mut self,
        output_height: usize,
        input_shape: &[usize],
        weight_filler: &dyn Filler,
        bias_filler: &dyn Filler,
    ) -> Result<()> {
        if output_height == 0 {
            return Err(LayerError::Configuration(
                "output_height must be positive".to_string(),
            ));
        }
        let (batch_size, input_features) = batch_dims(input_shape)?;
        checked_numel(&[output_height, input_features], "weight")?;

        if self.params.is_empty() {
            let mut weight = Param::zeros("weight", vec![output_height, input_features]);
            weight_filler.fill(&mut weight.data)?;
            let mut bias = Param::zeros("bias", vec![1, output_height]);
            bias_filler.fill(&mut bias.data)?;
            self.params = vec![weight, bias];
        } else {
            tracing::info!("Skipping parameter initialization");
            let expected = [output_height, input_features];
            if self.params[WEIGHT].shape() != expected {
                return Err(LayerError::ShapeMismatch {
                    what: "weight",
                    expected: expected.to_vec(),
                    actual: self.params[WEIGHT].shape().to_vec(),
                });
            }
        }

        self.output_features = output_height;
        self.input_features = input_features;
        self.batch_size = batch_size;
        self.state = LayerState::Configured;

        tracing::debug!(
            output_features = output_height,
            input_features,
            batch_size,
            "configured affine layer"
        );

        self.reshape(input_shape)
    }

    /// `configure` with fillers built from an [`AffineConfig`]
    pub fn configure_from(&mut self, config: &AffineConfig, input_shape: &[usize]) -> Result<()> {
        let (weight_filler, bias_filler) = config.build_fillers()?;
        self.configure(
            config.output_height,
            input_shape,
            weight_filler.as_ref(),
            bias_filler.as_ref(),
        )
    }

    /// Resize buffers for a batch shaped `[W, M]`
    ///
    /// Call before any forward pass whose batch size may have changed.
    /// Re-allocates the output to `[W, H]` and resets the bias multiplier to
    /// `W` ones. Drops the cached forward input and the gradient buffer.
    pub fn reshape(&mut self, input_shape: &[usize]) -> Result<()> {
        if !self.is_configured() {
            return Err(LayerError::NotConfigured);
        }
        let (batch_size, input_features) = batch_dims(input_shape)?;
        if input_features != self.input_features {
            return Err(LayerError::ShapeMismatch {
                what: "input features",
                expected: vec![batch_size, self.input_features],
                actual: input_shape.to_vec(),
            });
        }

        checked_numel(&[batch_size, self.output_features], "output")?;

        self.batch_size = batch_size;
        self.output.resize(vec![batch_size, self.output_features]);
        self.bias_multiplier.resize(vec![batch_size]);
        self.bias_multiplier.fill(1.0);
        self.cache = None;
        self.input_grad = None;

        tracing::debug!(batch_size, "reshaped affine layer");
        Ok(())
    }

    /// Forward pass: `output = input @ weight^T + bias_multiplier @ bias`
    ///
    /// `input` must be `[W, M]` as set by the last `reshape`. The input is
    /// cached for `backward`.
    pub fn forward(&mut self, input: &Tensor) -> Result<&Tensor> {
        if !self.is_configured() {
            return Err(LayerError::NotConfigured);
        }
        let (w, h, m) = (self.batch_size, self.output_features, self.input_features);
        if input.shape != [w, m] {
            return Err(LayerError::ShapeMismatch {
                what: "input batch",
                expected: vec![w, m],
                actual: input.shape.clone(),
            });
        }

        let weight = &self.params[WEIGHT].data;
        let bias = &self.params[BIAS].data;

        // output = x @ A^T (overwrite)
        gemm(
            Transpose::NoTrans,
            Transpose::Trans,
            w,
            h,
            m,
            1.0,
            &input.data,
            &weight.data,
            0.0,
            &mut self.output.data,
        );
        // output += 1_W @ b (accumulate)
        gemm(
            Transpose::NoTrans,
            Transpose::NoTrans,
            w,
            h,
            1,
            1.0,
            &self.bias_multiplier.data,
            &bias.data,
            1.0,
            &mut self.output.data,
        );

        self.cache = Some(AffineCache {
            input: input.clone(),
        });
        Ok(&self.output)
    }

    /// Backward pass
    ///
    /// # Arguments
    ///
    /// * `output_grad` - Gradient w.r.t. the output `[W, H]`
    /// * `propagate_to_input` - Must be `false`; this layer never feeds a
    ///   gradient to an upstream layer
    /// * `param_gradient_requested` - Whether to compute the gradient buffer
    ///
    /// # Returns
    ///
    /// `Some(input_grad)` of shape `[W, M]` when a gradient was requested,
    /// `None` otherwise. See the module docs: the buffer is
    /// `output_grad @ X` with `X` the first `H` rows of the cached input, not
    /// the weight matrix. Weight and bias `diff` buffers are not written.
    ///
    /// # Errors
    ///
    /// - `Configuration` whenever `propagate_to_input` is true, in any state
    /// - `NotConfigured` if no forward pass is cached
    /// - `ShapeMismatch` if `output_grad` is not `[W, H]`, or the cached
    ///   input has fewer than `H` rows to stand in for the weights
    pub fn backward(
        &mut self,
        output_grad: &Tensor,
        propagate_to_input: bool,
        param_gradient_requested: bool,
    ) -> Result<Option<&Tensor>> {
        if propagate_to_input {
            return Err(LayerError::Configuration(
                "this layer does not support propagating gradient to its input".to_string(),
            ));
        }
        if !param_gradient_requested {
            self.input_grad = None;
            return Ok(None);
        }

        let input = match (&self.state, &self.cache) {
            (LayerState::Configured, Some(cache)) => &cache.input,
            _ => return Err(LayerError::NotConfigured),
        };
        let (w, h, m) = (self.batch_size, self.output_features, self.input_features);
        if output_grad.shape != [w, h] {
            return Err(LayerError::ShapeMismatch {
                what: "output gradient",
                expected: vec![w, h],
                actual: output_grad.shape.clone(),
            });
        }
        if input.numel() < h * m {
            return Err(LayerError::ShapeMismatch {
                what: "input rows read in place of weights",
                expected: vec![h, m],
                actual: input.shape.clone(),
            });
        }

        let grad = self
            .input_grad
            .get_or_insert_with(|| Tensor::zeros(vec![w, m]));
        grad.resize(vec![w, m]);

        gemm(
            Transpose::NoTrans,
            Transpose::NoTrans,
            w,
            m,
            h,
            1.0,
            &output_grad.data,
            &input.data,
            0.0,
            &mut grad.data,
        );
        Ok(Some(&*grad))
    }

    pub fn state(&self) -> LayerState {
        self.state
    }

    pub fn is_configured(&self) -> bool {
        self.state == LayerState::Configured
    }

    /// Whether the external optimizer should receive a weight gradient
    pub fn param_gradient_requested(&self) -> bool {
        self.params.get(WEIGHT).is_some_and(|p| p.trainable)
    }

    /// Output features (H)
    pub fn output_features(&self) -> usize {
        self.output_features
    }

    /// Input features (M)
    pub fn input_features(&self) -> usize {
        self.input_features
    }

    /// Batch size (W) from the last reshape
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Ordered parameters: `[weight, bias]`
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Mutable parameters for an external optimizer
    pub fn params_mut(&mut self) -> &mut [Param] {
        &mut self.params
    }

    pub fn weight(&self) -> Option<&Param> {
        self.params.get(WEIGHT)
    }

    pub fn bias(&self) -> Option<&Param> {
        self.params.get(BIAS)
    }

    /// Output of the last forward pass `[W, H]`
    pub fn output(&self) -> &Tensor {
        &self.output
    }

    pub fn bias_multiplier(&self) -> &Tensor {
        &self.bias_multiplier
    }

    /// Buffer written by the last backward pass
    ///
    /// `None` after a backward pass that did not request a gradient, and
    /// after `reshape`.
    pub fn input_grad(&self) -> Option<&Tensor> {
        self.input_grad.as_ref()
    }
}

/// Element count of `shape`, or `Configuration` if it overflows
fn checked_numel(shape: &[usize], what: &str) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| {
            LayerError::Configuration(format!("{} shape {:?} overflows usize", what, shape))
        })
}

/// Split a `[W, M]` input shape, rejecting anything else
fn batch_dims(input_shape: &[usize]) -> Result<(usize, usize)> {
    match *input_shape {
        [batch, features] if batch > 0 && features > 0 => Ok((batch, features)),
        _ => Err(LayerError::Configuration(format!(
            "input shape must be [batch, features] with non-zero dims, got {:?}",
            input_shape
        ))),
    }
}
