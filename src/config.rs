use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ForecastError, Result};

/// Parameters for data preparation and training.
///
/// Row-based quantities (`step`, `past`, `future`) are expressed in raw
/// 10-minute rows. Missing fields in a JSON file fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Fraction of rows assigned to the chronologically earlier training partition.
    pub split_fraction: f64,
    /// Stride between consecutive timesteps of a window.
    pub step: usize,
    /// Lookback span of one window before subsampling.
    pub past: usize,
    /// Lead time between the window origin offset and the predicted row.
    pub future: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    pub hidden_size: usize,
    /// Epochs without improvement before training stops.
    pub patience: usize,
    pub min_delta: f64,
    /// Seed for weight initialization.
    pub seed: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            split_fraction: 0.715,
            step: 6,
            past: 720,
            future: 72,
            batch_size: 256,
            learning_rate: 0.001,
            epochs: 10,
            hidden_size: 32,
            patience: 5,
            min_delta: 0.0,
            seed: 42,
        }
    }
}

impl ForecastConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: ForecastConfig = serde_json::from_str(&contents)
            .map_err(|e| ForecastError::invalid(format!("config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every parameter before any data is touched.
    pub fn validate(&self) -> Result<()> {
        if !(self.split_fraction > 0.0 && self.split_fraction < 1.0) {
            return Err(ForecastError::invalid(format!(
                "split_fraction must lie in (0, 1), got {}",
                self.split_fraction
            )));
        }
        if self.step == 0 {
            return Err(ForecastError::invalid("step (sampling rate) must be positive"));
        }
        if self.past == 0 {
            return Err(ForecastError::invalid("past must be positive"));
        }
        if self.past % self.step != 0 {
            return Err(ForecastError::invalid(format!(
                "past ({}) must be a multiple of step ({})",
                self.past, self.step
            )));
        }
        if self.batch_size == 0 {
            return Err(ForecastError::invalid("batch_size must be positive"));
        }
        if self.hidden_size == 0 {
            return Err(ForecastError::invalid("hidden_size must be positive"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(ForecastError::invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.min_delta < 0.0 {
            return Err(ForecastError::invalid("min_delta must not be negative"));
        }
        Ok(())
    }

    /// Number of sampled timesteps per window.
    pub fn sequence_length(&self) -> usize {
        self.past / self.step
    }

    /// Offset from a window's first raw row to its target row.
    pub fn target_offset(&self) -> usize {
        self.past.saturating_add(self.future)
    }

    /// Prediction lead time in sampled steps, used to place the forecast on a time axis.
    pub fn forecast_delta(&self) -> usize {
        self.future / self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ForecastConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sequence_length(), 120);
        assert_eq!(config.target_offset(), 792);
        assert_eq!(config.forecast_delta(), 12);
    }

    #[test]
    fn test_rejects_split_fraction_bounds() {
        for fraction in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
            let config = ForecastConfig { split_fraction: fraction, ..Default::default() };
            assert!(matches!(config.validate(), Err(ForecastError::InvalidConfiguration(_))));
        }
    }

    #[test]
    fn test_rejects_uneven_past() {
        let config = ForecastConfig { past: 721, ..Default::default() };
        assert!(matches!(config.validate(), Err(ForecastError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_rejects_zero_step() {
        let config = ForecastConfig { step: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ForecastError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ForecastConfig = serde_json::from_str(r#"{"epochs": 3, "batch_size": 64}"#).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.past, 720);
    }
}
