//! # Jena Forecast
//!
//! Timeseries preparation and LSTM temperature forecasting for the Jena
//! climate recordings (one row every 10 minutes, 14 physical channels).
//!
//! ## Core Components
//!
//! - **Loading**: CSV ingestion into a timestamped [`ClimateTable`]
//! - **Preparation**: feature selection, chronological split, z-score scaling
//!   fitted on the training prefix only
//! - **Windowing**: lazy `[batch, sequence_length, features]` batches paired
//!   with a temperature target `past + future` rows ahead
//! - **Model**: a single LSTM layer followed by a dense scalar head
//! - **Training**: Adam + MSE with MAE reporting, early stopping and checkpoints
//!
//! ## Quick Start
//!
//! ```no_run
//! use jena_forecast::{prepare, create_trainer, ClimateTable, ForecastConfig, LstmRegressor};
//!
//! # fn main() -> jena_forecast::Result<()> {
//! let config = ForecastConfig::default();
//! let table = ClimateTable::from_path("jena_climate_2009_2016.csv")?;
//! let data = prepare(&table, &config)?;
//!
//! let train = data.train_windows()?;
//! let validation = data.validation_windows()?;
//!
//! let model = LstmRegressor::new(data.num_features(), config.hidden_size, config.seed);
//! let mut trainer = create_trainer(model, &config).with_normalization(data.stats().clone());
//! trainer.fit(&train, Some(&validation))?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod config;
pub mod climate;
pub mod features;
pub mod normalize;
pub mod split;
pub mod window;
pub mod pipeline;
pub mod utils;
pub mod layers;
pub mod models;
pub mod loss;
pub mod optimizers;
pub mod training;
pub mod persistence;
pub mod forecast;

// Re-export commonly used items
pub use error::{ForecastError, Result};
pub use config::ForecastConfig;
pub use climate::{ClimateTable, TimeBucket, FEATURE_KEYS, FEATURE_TITLES};
pub use features::{select_features, NUM_FEATURES, SELECTED_FEATURES, TARGET_FEATURE};
pub use normalize::{normalize, NormalizationStats};
pub use split::{split, SplitIndices};
pub use window::{make_windows, WindowBatch, WindowedDataset};
pub use pipeline::{prepare, prepare_features, PreparedData};
pub use models::lstm_regressor::LstmRegressor;
pub use layers::lstm_cell::LSTMCell;
pub use training::{create_basic_trainer, create_trainer, EarlyStoppingConfig, Trainer, TrainingConfig};
pub use optimizers::{Adam, SGD};
pub use loss::{MAELoss, MSELoss};
pub use persistence::{ModelMetadata, ModelPersistence, PersistenceError, PersistentModel};
pub use forecast::{single_step_forecasts, Predictor, SingleStepForecast};

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_library_integration() {
        let config = ForecastConfig {
            split_fraction: 0.5,
            step: 2,
            past: 4,
            future: 2,
            batch_size: 8,
            hidden_size: 3,
            ..Default::default()
        };
        let features = Array2::from_shape_fn((60, NUM_FEATURES), |(r, c)| ((r * (c + 2)) % 11) as f64);
        let data = prepare_features(features, &config).unwrap();

        let train = data.train_windows().unwrap();
        let model = LstmRegressor::new(data.num_features(), config.hidden_size, config.seed);
        let batch = train.batch(0).unwrap();
        let output = model.forward(&batch.inputs);

        assert_eq!(batch.inputs.shape(), &[8, 2, NUM_FEATURES]);
        assert_eq!(output.shape(), &[8, 1]);
    }
}
