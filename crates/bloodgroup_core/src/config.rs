//! Tunables for the validity filter, preprocessing and model loading.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MODEL_PATH: &str = "fingerprint_blood_group_model.onnx";
pub const DEFAULT_INPUT_SIZE: u32 = 128;
pub const DEFAULT_CANNY_LOW: f32 = 100.0;
pub const DEFAULT_CANNY_HIGH: f32 = 200.0;
pub const DEFAULT_MIN_EDGE_PERCENT: f32 = 20.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("input size must be non-zero (got {width}x{height})")]
    ZeroInputSize { width: u32, height: u32 },
    #[error("{name} must be a finite number (got {value})")]
    NonFinite { name: &'static str, value: f32 },
    #[error("{name} must not be negative (got {value})")]
    NegativeThreshold { name: &'static str, value: f32 },
    #[error("canny_low ({low}) must not exceed canny_high ({high})")]
    CannyOrder { low: f32, high: f32 },
    #[error("min_edge_percent must lie in [0, 100] (got {0})")]
    EdgePercentOutOfRange(f32),
}

/// Configuration for the fingerprint check and the blood group model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub model_path: PathBuf,
    pub input_width: u32,
    pub input_height: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Images need strictly more edge pixels than this percentage.
    pub min_edge_percent: f32,
    /// Keep the loaded model around between predictions.
    pub cache_model: bool,
    /// Treat model output as logits and normalize it with softmax.
    pub apply_softmax: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            input_width: DEFAULT_INPUT_SIZE,
            input_height: DEFAULT_INPUT_SIZE,
            canny_low: DEFAULT_CANNY_LOW,
            canny_high: DEFAULT_CANNY_HIGH,
            min_edge_percent: DEFAULT_MIN_EDGE_PERCENT,
            cache_model: false,
            apply_softmax: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(ConfigError::ZeroInputSize {
                width: self.input_width,
                height: self.input_height,
            });
        }
        for (name, value) in [
            ("canny_low", self.canny_low),
            ("canny_high", self.canny_high),
            ("min_edge_percent", self.min_edge_percent),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
        }
        for (name, value) in [("canny_low", self.canny_low), ("canny_high", self.canny_high)] {
            if value < 0.0 {
                return Err(ConfigError::NegativeThreshold { name, value });
            }
        }
        if self.canny_low > self.canny_high {
            return Err(ConfigError::CannyOrder {
                low: self.canny_low,
                high: self.canny_high,
            });
        }
        if !(0.0..=100.0).contains(&self.min_edge_percent) {
            return Err(ConfigError::EdgePercentOutOfRange(self.min_edge_percent));
        }
        Ok(())
    }
}
