//! Prediction records handed to a plotting front end.

use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::features::TARGET_FEATURE;
use crate::models::lstm_regressor::LstmRegressor;
use crate::window::WindowedDataset;

/// Anything that maps `[batch, sequence_length, features]` windows to `[batch, 1]` predictions.
pub trait Predictor {
    fn predict(&self, inputs: &Array3<f64>) -> Array2<f64>;
}

impl Predictor for LstmRegressor {
    fn predict(&self, inputs: &Array3<f64>) -> Array2<f64> {
        self.forward(inputs)
    }
}

/// One window's history together with the true and predicted future value.
///
/// `history` is the temperature channel of the window, oldest first, in
/// normalized units. The future point sits `delta` sampled steps after the
/// end of the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleStepForecast {
    pub history: Vec<f64>,
    pub true_future: f64,
    pub predicted: f64,
    pub delta: usize,
}

/// Forecasts for the first window of each of the first `count` batches.
///
/// Empty when the windows carry no temperature channel.
pub fn single_step_forecasts<P: Predictor>(
    predictor: &P,
    dataset: &WindowedDataset<'_>,
    count: usize,
    delta: usize,
) -> Vec<SingleStepForecast> {
    if dataset.num_features() <= TARGET_FEATURE {
        return Vec::new();
    }

    (0..count)
        .map_while(|k| k.checked_mul(dataset.batch_size()))
        .take_while(|&index| index < dataset.num_windows())
        .filter_map(|index| {
            let window = dataset.window(index)?;
            let true_future = dataset.target(index)?;

            let inputs = window.to_owned().insert_axis(Axis(0));
            let predicted = predictor.predict(&inputs)[[0, 0]];

            Some(SingleStepForecast {
                history: window.column(TARGET_FEATURE).to_vec(),
                true_future,
                predicted,
                delta,
            })
        })
        .collect()
}
