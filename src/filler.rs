//! Parameter Fillers
//!
//! A filler populates a freshly allocated parameter tensor with initial
//! values. The layer treats fillers as opaque strategies: it allocates the
//! weight and bias, then hands each one to its own filler exactly once.
//!
//! ## Available Fillers
//!
//! | Filler     | Values                                             |
//! |------------|----------------------------------------------------|
//! | `constant` | every element = `value`                            |
//! | `uniform`  | U[min, max]                                        |
//! | `gaussian` | N(mean, std²)                                      |
//! | `xavier`   | U[-√(3/n), √(3/n)], n from fan in / fan out        |
//! | `msra`     | N(0, 2/n), n from fan in / fan out (He init)       |
//!
//! For a `[out, in]` weight matrix, fan in is `in` and fan out is `out`.
//!
//! ## Reproducibility
//!
//! Random fillers take an optional seed. With a seed, every call to
//! [`Filler::fill`] writes the same values; without one, the generator is
//! seeded from the OS.
//!
//! ## Example
//!
//! ```rust
//! use affine_layer::filler::{Filler, FillerConfig};
//! use affine_layer::Tensor;
//!
//! let filler = FillerConfig::Uniform { min: -0.1, max: 0.1 }.build(Some(7)).unwrap();
//! let mut weight = Tensor::zeros(vec![4, 3]);
//! filler.fill(&mut weight).unwrap();
//! assert!(weight.data.iter().all(|&w| (-0.1..=0.1).contains(&w)));
//! ```

use crate::error::{LayerError, Result};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

/// Strategy that writes initial values into a parameter tensor
pub trait Filler: Send + Sync {
    fn fill(&self, tensor: &mut Tensor) -> Result<()>;
}

/// Which fan count scales the Xavier and MSRA fillers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceNorm {
    #[default]
    FanIn,
    FanOut,
    Average,
}

impl VarianceNorm {
    /// Effective fan for a tensor of the given shape
    fn fan(self, tensor: &Tensor) -> f32 {
        let count = tensor.numel();
        let fan_in = count / tensor.rows().max(1);
        let fan_out = match tensor.shape.get(1) {
            Some(&cols) if cols > 0 => count / cols,
            _ => count,
        };
        match self {
            VarianceNorm::FanIn => fan_in as f32,
            VarianceNorm::FanOut => fan_out as f32,
            VarianceNorm::Average => (fan_in + fan_out) as f32 / 2.0,
        }
    }
}

/// Every element set to one value
#[derive(Clone, Debug)]
pub struct ConstantFiller {
    pub value: f32,
}

impl Filler for ConstantFiller {
    fn fill(&self, tensor: &mut Tensor) -> Result<()> {
        tensor.fill(self.value);
        Ok(())
    }
}

/// Uniform values in `[min, max]`
#[derive(Clone, Debug)]
pub struct UniformFiller {
    pub min: f32,
    pub max: f32,
    pub seed: Option<u64>,
}

impl Filler for UniformFiller {
    fn fill(&self, tensor: &mut Tensor) -> Result<()> {
        fill_uniform(tensor, self.min, self.max, self.seed)
    }
}

/// Normally distributed values
#[derive(Clone, Debug)]
pub struct GaussianFiller {
    pub mean: f32,
    pub std: f32,
    pub seed: Option<u64>,
}

impl Filler for GaussianFiller {
    fn fill(&self, tensor: &mut Tensor) -> Result<()> {
        fill_gaussian(tensor, self.mean, self.std, self.seed)
    }
}

/// Glorot/Xavier uniform initialization
#[derive(Clone, Debug)]
pub struct XavierFiller {
    pub variance_norm: VarianceNorm,
    pub seed: Option<u64>,
}

impl Filler for XavierFiller {
    fn fill(&self, tensor: &mut Tensor) -> Result<()> {
        if tensor.numel() == 0 {
            return Ok(());
        }
        let scale = (3.0 / self.variance_norm.fan(tensor)).sqrt();
        fill_uniform(tensor, -scale, scale, self.seed)
    }
}

/// He/MSRA Gaussian initialization: std = √(2/n)
#[derive(Clone, Debug)]
pub struct MsraFiller {
    pub variance_norm: VarianceNorm,
    pub seed: Option<u64>,
}

impl Filler for MsraFiller {
    fn fill(&self, tensor: &mut Tensor) -> Result<()> {
        if tensor.numel() == 0 {
            return Ok(());
        }
        let std = (2.0 / self.variance_norm.fan(tensor)).sqrt();
        fill_gaussian(tensor, 0.0, std, self.seed)
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn fill_uniform(tensor: &mut Tensor, min: f32, max: f32, seed: Option<u64>) -> Result<()> {
    let dist = Uniform::new_inclusive(min, max)
        .map_err(|e| LayerError::Filler(format!("uniform [{}, {}]: {}", min, max, e)))?;
    let mut rng = make_rng(seed);
    tensor
        .data
        .iter_mut()
        .for_each(|v| *v = dist.sample(&mut rng));
    Ok(())
}

fn fill_gaussian(tensor: &mut Tensor, mean: f32, std: f32, seed: Option<u64>) -> Result<()> {
    let dist = Normal::new(mean, std)
        .map_err(|e| LayerError::Filler(format!("gaussian N({}, {}): {}", mean, std, e)))?;
    let mut rng = make_rng(seed);
    tensor
        .data
        .iter_mut()
        .for_each(|v| *v = dist.sample(&mut rng));
    Ok(())
}

/// Serializable description of a filler
///
/// Omitted fields default to `value = 0`, `min = 0`, `max = 1`, `mean = 0`,
/// `std = 1`.
///
/// ```json
/// { "type": "gaussian", "mean": 0.0, "std": 0.01 }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FillerConfig {
    Constant {
        #[serde(default)]
        value: f32,
    },
    Uniform {
        #[serde(default)]
        min: f32,
        #[serde(default = "default_one")]
        max: f32,
    },
    Gaussian {
        #[serde(default)]
        mean: f32,
        #[serde(default = "default_one")]
        std: f32,
    },
    Xavier {
        #[serde(default)]
        variance_norm: VarianceNorm,
    },
    Msra {
        #[serde(default)]
        variance_norm: VarianceNorm,
    },
}

fn default_one() -> f32 {
    1.0
}

impl Default for FillerConfig {
    fn default() -> Self {
        FillerConfig::Constant { value: 0.0 }
    }
}

impl FillerConfig {
    /// Validate parameters and build the filler
    pub fn build(&self, seed: Option<u64>) -> Result<Box<dyn Filler>> {
        let filler: Box<dyn Filler> = match *self {
            FillerConfig::Constant { value } => Box::new(ConstantFiller { value }),
            FillerConfig::Uniform { min, max } => {
                if !(min <= max) {
                    return Err(LayerError::Filler(format!(
                        "uniform min ({}) must not exceed max ({})",
                        min, max
                    )));
                }
                Box::new(UniformFiller { min, max, seed })
            }
            FillerConfig::Gaussian { mean, std } => {
                if !(std >= 0.0) || !std.is_finite() {
                    return Err(LayerError::Filler(format!(
                        "gaussian std must be finite and non-negative, got {}",
                        std
                    )));
                }
                Box::new(GaussianFiller { mean, std, seed })
            }
            FillerConfig::Xavier { variance_norm } => {
                Box::new(XavierFiller { variance_norm, seed })
            }
            FillerConfig::Msra { variance_norm } => Box::new(MsraFiller { variance_norm, seed }),
        };
        Ok(filler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_fills_every_element() {
        let mut t = Tensor::zeros(vec![2, 3]);
        ConstantFiller { value: 0.5 }.fill(&mut t).unwrap();
        assert_eq!(t.data, vec![0.5; 6]);
    }

    #[test]
    fn test_uniform_stays_in_range() {
        let mut t = Tensor::zeros(vec![32, 8]);
        let filler = UniformFiller {
            min: -2.0,
            max: 3.0,
            seed: Some(1),
        };
        filler.fill(&mut t).unwrap();
        assert!(t.data.iter().all(|&v| (-2.0..=3.0).contains(&v)));
        assert!(t.data.iter().any(|&v| v != t.data[0]));
    }

    #[test]
    fn test_seeded_fill_is_reproducible() {
        let filler = GaussianFiller {
            mean: 0.0,
            std: 1.0,
            seed: Some(42),
        };
        let mut a = Tensor::zeros(vec![4, 4]);
        let mut b = Tensor::zeros(vec![4, 4]);
        filler.fill(&mut a).unwrap();
        filler.fill(&mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_gaussian_zero_std_is_constant() {
        let mut t = Tensor::zeros(vec![3, 3]);
        GaussianFiller {
            mean: 1.5,
            std: 0.0,
            seed: Some(3),
        }
        .fill(&mut t)
        .unwrap();
        assert!(t.data.iter().all(|&v| v == 1.5));
    }

    #[test]
    fn test_xavier_bound_uses_fan_in() {
        // [out=10, in=12] -> fan_in = 12, bound = sqrt(3/12) = 0.5
        let mut t = Tensor::zeros(vec![10, 12]);
        XavierFiller {
            variance_norm: VarianceNorm::FanIn,
            seed: Some(9),
        }
        .fill(&mut t)
        .unwrap();
        assert!(t.data.iter().all(|&v| v.abs() <= 0.5));
    }

    #[test]
    fn test_variance_norm_fans() {
        let t = Tensor::zeros(vec![4, 6]);
        assert_eq!(VarianceNorm::FanIn.fan(&t), 6.0);
        assert_eq!(VarianceNorm::FanOut.fan(&t), 4.0);
        assert_eq!(VarianceNorm::Average.fan(&t), 5.0);
    }

    #[test]
    fn test_msra_has_expected_spread() {
        // fan_in = 50 -> std = 0.2
        let mut t = Tensor::zeros(vec![200, 50]);
        MsraFiller {
            variance_norm: VarianceNorm::FanIn,
            seed: Some(11),
        }
        .fill(&mut t)
        .unwrap();
        let n = t.numel() as f32;
        let mean = t.data.iter().sum::<f32>() / n;
        let var = t.data.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
        assert!(mean.abs() < 0.02, "mean {}", mean);
        assert!((var.sqrt() - 0.2).abs() < 0.02, "std {}", var.sqrt());
    }

    #[test]
    fn test_build_rejects_inverted_uniform() {
        let err = FillerConfig::Uniform { min: 1.0, max: 0.0 }
            .build(None)
            .err()
            .unwrap();
        assert!(matches!(err, LayerError::Filler(_)));
    }

    #[test]
    fn test_build_rejects_negative_std() {
        let result = FillerConfig::Gaussian {
            mean: 0.0,
            std: -1.0,
        }
        .build(None);
        assert!(matches!(result, Err(LayerError::Filler(_))));
    }

    #[test]
    fn test_config_json_shape() {
        let cfg: FillerConfig =
            serde_json::from_str(r#"{"type": "xavier", "variance_norm": "average"}"#).unwrap();
        assert_eq!(
            cfg,
            FillerConfig::Xavier {
                variance_norm: VarianceNorm::Average
            }
        );

        let cfg: FillerConfig = serde_json::from_str(r#"{"type": "constant"}"#).unwrap();
        assert_eq!(cfg, FillerConfig::Constant { value: 0.0 });
    }

    #[test]
    fn test_config_omitted_fields_use_unit_defaults() {
        let cfg: FillerConfig = serde_json::from_str(r#"{"type": "gaussian"}"#).unwrap();
        assert_eq!(cfg, FillerConfig::Gaussian { mean: 0.0, std: 1.0 });

        let cfg: FillerConfig = serde_json::from_str(r#"{"type": "uniform"}"#).unwrap();
        assert_eq!(cfg, FillerConfig::Uniform { min: 0.0, max: 1.0 });

        let cfg: FillerConfig =
            serde_json::from_str(r#"{"type": "uniform", "min": -3.0}"#).unwrap();
        assert_eq!(cfg, FillerConfig::Uniform { min: -3.0, max: 1.0 });
    }
}
