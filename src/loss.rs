//! Regression losses over `[batch, 1]` prediction and target blocks.

use ndarray::Array2;

/// Loss between the regressor's `[batch, 1]` output and the window targets.
///
/// Losses are averaged over the batch, so batches of different sizes
/// (including a short final batch) are comparable.
pub trait LossFunction {
    fn compute_loss(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> f64;

    /// Gradient with respect to each prediction, same shape as `predictions`.
    fn compute_gradient(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> Array2<f64>;
}

/// Mean squared error, the training objective.
#[derive(Debug, Clone, Copy, Default)]
pub struct MSELoss;

impl LossFunction for MSELoss {
    fn compute_loss(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> f64 {
        let diff = predictions - targets;
        let squared_diff = &diff * &diff;
        squared_diff.sum() / (predictions.len() as f64)
    }

    fn compute_gradient(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> Array2<f64> {
        let diff = predictions - targets;
        2.0 * diff / (predictions.len() as f64)
    }
}

/// Mean absolute error, reported alongside the training loss.
#[derive(Debug, Clone, Copy, Default)]
pub struct MAELoss;

impl LossFunction for MAELoss {
    fn compute_loss(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> f64 {
        let diff = predictions - targets;
        diff.map(|x| x.abs()).sum() / (predictions.len() as f64)
    }

    fn compute_gradient(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> Array2<f64> {
        let diff = predictions - targets;
        diff.map(|x| if *x > 0.0 { 1.0 } else if *x < 0.0 { -1.0 } else { 0.0 }) / (predictions.len() as f64)
    }
}
