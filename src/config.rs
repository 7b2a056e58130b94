//! Layer Configuration
//!
//! [`AffineConfig`] describes an affine layer the way a host network
//! definition would: the output width plus one filler per parameter.
//! It is plain serde data, so it loads from JSON:
//!
//! ```json
//! {
//!   "output_height": 128,
//!   "weight_filler": { "type": "xavier" },
//!   "bias_filler": { "type": "constant", "value": 0.1 },
//!   "seed": 1234
//! }
//! ```
//!
//! Missing fillers default to `constant 0`. Without a seed the random
//! fillers draw from OS entropy.

use crate::error::{LayerError, Result};
use crate::filler::{Filler, FillerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Affine layer hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineConfig {
    /// Number of output features per row (H)
    pub output_height: usize,
    #[serde(default)]
    pub weight_filler: FillerConfig,
    #[serde(default)]
    pub bias_filler: FillerConfig,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl AffineConfig {
    /// Config with zero-constant fillers
    pub fn new(output_height: usize) -> Self {
        Self {
            output_height,
            weight_filler: FillerConfig::default(),
            bias_filler: FillerConfig::default(),
            seed: None,
        }
    }

    pub fn with_weight_filler(mut self, filler: FillerConfig) -> Self {
        self.weight_filler = filler;
        self
    }

    pub fn with_bias_filler(mut self, filler: FillerConfig) -> Self {
        self.bias_filler = filler;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AffineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the output height and both filler descriptions
    pub fn validate(&self) -> Result<()> {
        if self.output_height == 0 {
            return Err(LayerError::Configuration(
                "output_height must be positive".to_string(),
            ));
        }
        self.build_fillers().map(|_| ())
    }

    /// Build the weight and bias fillers
    ///
    /// The bias filler gets `seed + 1` so seeded random fillers do not write
    /// identical sequences into both parameters.
    pub fn build_fillers(&self) -> Result<(Box<dyn Filler>, Box<dyn Filler>)> {
        let weight = self.weight_filler.build(self.seed)?;
        let bias = self
            .bias_filler
            .build(self.seed.map(|s| s.wrapping_add(1)))?;
        Ok((weight, bias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filler::VarianceNorm;

    #[test]
    fn test_from_json_full() {
        let config = AffineConfig::from_json(
            r#"{
                "output_height": 4,
                "weight_filler": {"type": "msra", "variance_norm": "fan_out"},
                "bias_filler": {"type": "constant", "value": 0.1},
                "seed": 5
            }"#,
        )
        .unwrap();

        assert_eq!(config.output_height, 4);
        assert_eq!(
            config.weight_filler,
            FillerConfig::Msra {
                variance_norm: VarianceNorm::FanOut
            }
        );
        assert_eq!(config.bias_filler, FillerConfig::Constant { value: 0.1 });
        assert_eq!(config.seed, Some(5));
    }

    #[test]
    fn test_from_json_defaults_fillers() {
        let config = AffineConfig::from_json(r#"{"output_height": 2}"#).unwrap();
        assert_eq!(config, AffineConfig::new(2));
    }

    #[test]
    fn test_zero_output_height_rejected() {
        let err = AffineConfig::from_json(r#"{"output_height": 0}"#).unwrap_err();
        assert!(matches!(err, LayerError::Configuration(_)));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = AffineConfig::from_json(r#"{"output_height": "wide"}"#).unwrap_err();
        assert!(matches!(err, LayerError::Config(_)));
    }

    #[test]
    fn test_invalid_filler_rejected() {
        let err = AffineConfig::from_json(
            r#"{"output_height": 3, "weight_filler": {"type": "uniform", "min": 2.0, "max": 1.0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, LayerError::Filler(_)));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AffineConfig::new(8)
            .with_weight_filler(FillerConfig::Gaussian {
                mean: 0.0,
                std: 0.01,
            })
            .with_seed(3);
        let parsed = AffineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = AffineConfig::load("/nonexistent/affine.json").unwrap_err();
        assert!(matches!(err, LayerError::Io(_)));
    }
}
