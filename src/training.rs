use ndarray::{Array2, Array3};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::ForecastConfig;
use crate::error::Result;
use crate::forecast::Predictor;
use crate::loss::{LossFunction, MAELoss, MSELoss};
use crate::models::lstm_regressor::LstmRegressor;
use crate::normalize::NormalizationStats;
use crate::optimizers::{Adam, Optimizer, SGD};
use crate::persistence::{ModelMetadata, PersistentModel};
use crate::utils::clip_by_norm;
use crate::window::{WindowBatch, WindowedDataset};

/// Which loss early stopping watches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyStoppingMetric {
    ValidationLoss,
    TrainLoss,
}

/// Configuration for early stopping
#[derive(Debug, Clone)]
pub struct EarlyStoppingConfig {
    /// Epochs without improvement before stopping
    pub patience: usize,
    /// Minimum decrease that counts as an improvement
    pub min_delta: f64,
    pub restore_best_weights: bool,
    pub monitor: EarlyStoppingMetric,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        EarlyStoppingConfig {
            patience: 5,
            min_delta: 0.0,
            restore_best_weights: false,
            monitor: EarlyStoppingMetric::ValidationLoss,
        }
    }
}

/// Tracks the monitored loss across epochs
#[derive(Debug, Clone)]
pub struct EarlyStopper {
    config: EarlyStoppingConfig,
    best_score: f64,
    best_epoch: Option<usize>,
    wait: usize,
    stopped_epoch: Option<usize>,
}

impl EarlyStopper {
    pub fn new(config: EarlyStoppingConfig) -> Self {
        EarlyStopper {
            config,
            best_score: f64::INFINITY,
            best_epoch: None,
            wait: 0,
            stopped_epoch: None,
        }
    }

    /// Record one epoch's score; returns true when the score is a new best.
    pub fn observe(&mut self, epoch: usize, score: f64) -> bool {
        if score + self.config.min_delta < self.best_score {
            self.best_score = score;
            self.best_epoch = Some(epoch);
            self.wait = 0;
            true
        } else {
            self.wait += 1;
            if self.wait >= self.config.patience {
                self.stopped_epoch = Some(epoch);
            }
            false
        }
    }

    pub fn should_stop(&self) -> bool {
        self.stopped_epoch.is_some()
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }

    pub fn config(&self) -> &EarlyStoppingConfig {
        &self.config
    }
}

/// Configuration for training hyperparameters
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub log_every: usize,
    pub clip_gradient: Option<f64>,
    pub early_stopping: Option<EarlyStoppingConfig>,
    /// Save the model here whenever the monitored loss improves
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 10,
            log_every: 1,
            clip_gradient: Some(5.0),
            early_stopping: Some(EarlyStoppingConfig::default()),
            checkpoint_path: None,
        }
    }
}

impl TrainingConfig {
    pub fn from_forecast_config(config: &ForecastConfig) -> Self {
        TrainingConfig {
            epochs: config.epochs,
            early_stopping: Some(EarlyStoppingConfig {
                patience: config.patience,
                min_delta: config.min_delta,
                ..EarlyStoppingConfig::default()
            }),
            ..TrainingConfig::default()
        }
    }
}

/// Training metrics tracked during training
#[derive(Debug, Clone)]
pub struct TrainingMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub validation_loss: Option<f64>,
    pub validation_mae: Option<f64>,
    pub time_elapsed: f64,
}

/// Loss and mean absolute error over a whole dataset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss: f64,
    pub mae: f64,
    pub windows: usize,
}

/// Mini-batch trainer for the LSTM regressor with configurable loss and optimizer
pub struct Trainer<L: LossFunction, O: Optimizer> {
    pub model: LstmRegressor,
    pub loss_function: L,
    pub optimizer: O,
    pub config: TrainingConfig,
    pub metrics_history: Vec<TrainingMetrics>,
    normalization: Option<NormalizationStats>,
    early_stopper: Option<EarlyStopper>,
}

impl<L: LossFunction, O: Optimizer> Trainer<L, O> {
    pub fn new(model: LstmRegressor, loss_function: L, optimizer: O) -> Self {
        Trainer {
            model,
            loss_function,
            optimizer,
            config: TrainingConfig::default(),
            metrics_history: Vec::new(),
            normalization: None,
            early_stopper: None,
        }
    }

    pub fn with_config(mut self, config: TrainingConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach the scaling statistics written into checkpoints
    pub fn with_normalization(mut self, stats: NormalizationStats) -> Self {
        self.normalization = Some(stats);
        self
    }

    /// One optimizer step on a single batch; returns the batch loss
    pub fn train_batch(&mut self, batch: &WindowBatch) -> Result<f64> {
        self.model.check_input(&batch.inputs)?;

        let (predictions, cache) = self.model.forward_with_cache(&batch.inputs);
        let loss = self.loss_function.compute_loss(&predictions, &batch.targets);
        let grad_output = self.loss_function.compute_gradient(&predictions, &batch.targets);

        let mut gradients = self.model.backward(&grad_output, &cache);
        if let Some(max_norm) = self.config.clip_gradient {
            for matrix in gradients.matrices_mut() {
                clip_by_norm(matrix, max_norm);
            }
        }
        self.model.update_parameters(&gradients, &mut self.optimizer);

        Ok(loss)
    }

    /// Train for up to `config.epochs` epochs with optional validation
    pub fn fit(
        &mut self,
        train: &WindowedDataset<'_>,
        validation: Option<&WindowedDataset<'_>>,
    ) -> Result<&[TrainingMetrics]> {
        info!(
            epochs = self.config.epochs,
            train_windows = train.num_windows(),
            validation_windows = validation.map(|v| v.num_windows()).unwrap_or(0),
            "starting training"
        );

        self.early_stopper = self.config.early_stopping.clone().map(EarlyStopper::new);
        let mut best_model: Option<LstmRegressor> = None;
        let mut best_checkpoint_loss = f64::INFINITY;
        let first_epoch = self.metrics_history.len();

        for epoch in first_epoch..first_epoch + self.config.epochs {
            let start_time = Instant::now();

            let mut loss_sum = 0.0;
            let mut seen = 0usize;
            for batch in train.iter() {
                let loss = self.train_batch(&batch)?;
                loss_sum += loss * batch.len() as f64;
                seen += batch.len();
                debug!(epoch, first_window = batch.first_window, loss, "batch done");
            }
            let train_loss = if seen > 0 { loss_sum / seen as f64 } else { 0.0 };

            let evaluation = match validation {
                Some(data) => Some(self.evaluate(data)?),
                None => None,
            };

            let metrics = TrainingMetrics {
                epoch,
                train_loss,
                validation_loss: evaluation.map(|e| e.loss),
                validation_mae: evaluation.map(|e| e.mae),
                time_elapsed: start_time.elapsed().as_secs_f64(),
            };
            self.metrics_history.push(metrics.clone());

            if self.config.log_every > 0 && (epoch - first_epoch) % self.config.log_every == 0 {
                info!(
                    epoch,
                    train_loss,
                    val_loss = ?metrics.validation_loss,
                    seconds = metrics.time_elapsed,
                    "epoch finished"
                );
            }

            let monitored = self.monitored_loss(&metrics);
            let improved = match self.early_stopper.as_mut() {
                Some(stopper) => stopper.observe(epoch, monitored),
                None => false,
            };
            if improved && self.restores_best_weights() {
                best_model = Some(self.model.clone());
            }

            // save-best-only, independent of the early stopping min_delta
            if monitored < best_checkpoint_loss {
                best_checkpoint_loss = monitored;
                self.save_checkpoint(epoch, monitored, train.sequence_length())?;
            }

            if self.early_stopper.as_ref().map_or(false, |s| s.should_stop()) {
                info!(epoch, "early stopping: no improvement for {} epochs", self.patience());
                break;
            }
        }

        if let Some(model) = best_model {
            if let Some(best_epoch) = self.early_stopper.as_ref().and_then(|s| s.best_epoch()) {
                info!(best_epoch, "restoring best weights");
            }
            self.model = model;
        }

        info!("training completed");
        Ok(self.metrics_history.as_slice())
    }

    /// Mean loss and MAE over every window of `data`
    pub fn evaluate(&self, data: &WindowedDataset<'_>) -> Result<Evaluation> {
        let mut loss_sum = 0.0;
        let mut mae_sum = 0.0;
        let mut windows = 0usize;

        for batch in data.iter() {
            self.model.check_input(&batch.inputs)?;
            let predictions = self.model.forward(&batch.inputs);
            let n = batch.len() as f64;
            loss_sum += self.loss_function.compute_loss(&predictions, &batch.targets) * n;
            mae_sum += MAELoss.compute_loss(&predictions, &batch.targets) * n;
            windows += batch.len();
        }

        if windows == 0 {
            return Ok(Evaluation { loss: 0.0, mae: 0.0, windows });
        }
        Ok(Evaluation {
            loss: loss_sum / windows as f64,
            mae: mae_sum / windows as f64,
            windows,
        })
    }

    /// Predictions for a `[batch, sequence_length, features]` block
    pub fn predict(&self, inputs: &Array3<f64>) -> Array2<f64> {
        self.model.forward(inputs)
    }

    /// Per-epoch (training loss, validation loss) pairs
    pub fn loss_history(&self) -> Vec<(f64, Option<f64>)> {
        self.metrics_history
            .iter()
            .map(|m| (m.train_loss, m.validation_loss))
            .collect()
    }

    pub fn get_latest_metrics(&self) -> Option<&TrainingMetrics> {
        self.metrics_history.last()
    }

    pub fn get_metrics_history(&self) -> &[TrainingMetrics] {
        &self.metrics_history
    }

    pub fn early_stopper(&self) -> Option<&EarlyStopper> {
        self.early_stopper.as_ref()
    }

    fn monitored_loss(&self, metrics: &TrainingMetrics) -> f64 {
        let monitor = self
            .config
            .early_stopping
            .as_ref()
            .map(|c| c.monitor)
            .unwrap_or(EarlyStoppingMetric::ValidationLoss);
        match (monitor, metrics.validation_loss) {
            (EarlyStoppingMetric::ValidationLoss, Some(val_loss)) => val_loss,
            // without validation data fall back to the training loss
            _ => metrics.train_loss,
        }
    }

    fn restores_best_weights(&self) -> bool {
        self.config
            .early_stopping
            .as_ref()
            .map_or(false, |c| c.restore_best_weights)
    }

    fn patience(&self) -> usize {
        self.config.early_stopping.as_ref().map_or(0, |c| c.patience)
    }

    fn save_checkpoint(&self, epoch: usize, loss: f64, sequence_length: usize) -> Result<()> {
        let Some(path) = self.config.checkpoint_path.as_ref() else {
            return Ok(());
        };

        let mut metadata = ModelMetadata::new("lstm_regressor", &self.model, sequence_length);
        metadata.epochs_trained = epoch + 1;
        metadata.best_loss = Some(loss);
        metadata.normalization = self.normalization.clone();

        self.model.save(path, metadata)?;
        info!(epoch, loss, path = %path.display(), "checkpoint saved");
        Ok(())
    }
}

impl<L: LossFunction, O: Optimizer> Predictor for Trainer<L, O> {
    fn predict(&self, inputs: &Array3<f64>) -> Array2<f64> {
        self.model.forward(inputs)
    }
}

/// Create a trainer with SGD and MSE loss
pub fn create_basic_trainer(model: LstmRegressor, learning_rate: f64) -> Trainer<MSELoss, SGD> {
    Trainer::new(model, MSELoss, SGD::new(learning_rate))
}

/// Adam + MSE trainer configured from a [`ForecastConfig`]
pub fn create_trainer(model: LstmRegressor, config: &ForecastConfig) -> Trainer<MSELoss, Adam> {
    Trainer::new(model, MSELoss, Adam::new(config.learning_rate))
        .with_config(TrainingConfig::from_forecast_config(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_early_stopper_patience() {
        let mut stopper = EarlyStopper::new(EarlyStoppingConfig {
            patience: 2,
            ..EarlyStoppingConfig::default()
        });

        assert!(stopper.observe(0, 1.0));
        assert!(stopper.observe(1, 0.5));
        assert!(!stopper.observe(2, 0.5));
        assert!(!stopper.should_stop());
        assert!(!stopper.observe(3, 0.7));
        assert!(stopper.should_stop());
        assert_eq!(stopper.stopped_epoch(), Some(3));
        assert_eq!(stopper.best_epoch(), Some(1));
        assert_eq!(stopper.best_score(), 0.5);
    }

    #[test]
    fn test_early_stopper_min_delta() {
        let mut stopper = EarlyStopper::new(EarlyStoppingConfig {
            patience: 1,
            min_delta: 0.1,
            ..EarlyStoppingConfig::default()
        });

        assert!(stopper.observe(0, 1.0));
        // improvement smaller than min_delta does not count
        assert!(!stopper.observe(1, 0.95));
        assert!(stopper.should_stop());
    }

    #[test]
    fn test_training_config_from_forecast_config() {
        let forecast = ForecastConfig { epochs: 3, patience: 2, ..Default::default() };
        let config = TrainingConfig::from_forecast_config(&forecast);
        assert_eq!(config.epochs, 3);
        let early = config.early_stopping.unwrap();
        assert_eq!(early.patience, 2);
        assert_eq!(early.monitor, EarlyStoppingMetric::ValidationLoss);
    }
}
