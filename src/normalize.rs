//! Z-score normalization with statistics taken from the training range only.

use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::features::{selected_keys, NUM_FEATURES};

/// Per-column mean and population standard deviation.
///
/// Computed once from rows `[0, train_split)` and reused for every row,
/// including validation rows. Stored with model checkpoints so predictions
/// can be mapped back to physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    /// Number of leading rows the statistics were computed from.
    pub train_rows: usize,
}

impl NormalizationStats {
    /// Compute statistics over rows `[0, train_split)` of `matrix`.
    pub fn fit(matrix: ArrayView2<'_, f64>, train_split: usize) -> Result<Self> {
        let rows = matrix.nrows();
        if train_split == 0 || train_split > rows {
            return Err(ForecastError::invalid(format!(
                "train_split {} outside 1..={} rows",
                train_split, rows
            )));
        }

        let training = matrix.slice(s![..train_split, ..]);
        let mean = training
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(matrix.ncols()));
        let std = training.std_axis(Axis(0), 0.0);

        if let Some(column) = std.iter().position(|&sd| sd == 0.0) {
            return Err(ForecastError::DegenerateColumn {
                column,
                name: column_name(column, matrix.ncols()),
            });
        }

        Ok(NormalizationStats {
            mean: mean.to_vec(),
            std: std.to_vec(),
            train_rows: train_split,
        })
    }

    pub fn num_columns(&self) -> usize {
        self.mean.len()
    }

    /// Apply `(value - mean) / std` to every row of `matrix`.
    pub fn apply(&self, matrix: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if matrix.ncols() != self.num_columns() {
            return Err(ForecastError::ShapeMismatch {
                expected: vec![matrix.nrows(), self.num_columns()],
                actual: matrix.shape().to_vec(),
            });
        }
        let mean = Array1::from(self.mean.clone());
        let std = Array1::from(self.std.clone());
        Ok((&matrix - &mean) / &std)
    }

    /// Map a normalized value of `column` back to physical units.
    pub fn denormalize(&self, column: usize, value: f64) -> f64 {
        value * self.std[column] + self.mean[column]
    }
}

fn column_name(column: usize, num_columns: usize) -> String {
    if num_columns == NUM_FEATURES {
        selected_keys()[column].to_string()
    } else {
        format!("column {}", column)
    }
}

/// Normalize every row of `matrix` using statistics from rows `[0, train_split)`.
pub fn normalize(matrix: ArrayView2<'_, f64>, train_split: usize) -> Result<(Array2<f64>, NormalizationStats)> {
    let stats = NormalizationStats::fit(matrix, train_split)?;
    let normalized = stats.apply(matrix)?;
    Ok((normalized, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_population_statistics() {
        let matrix = arr2(&[[1.0, 10.0], [3.0, 10.0], [5.0, 40.0], [100.0, -7.0]]);
        let stats = NormalizationStats::fit(matrix.view(), 3).unwrap();

        assert!((stats.mean[0] - 3.0).abs() < 1e-12);
        assert!((stats.std[0] - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((stats.mean[1] - 20.0).abs() < 1e-12);
        assert_eq!(stats.train_rows, 3);
    }

    #[test]
    fn test_validation_rows_scaled_with_training_stats() {
        let matrix = arr2(&[[1.0], [3.0], [5.0]]);
        let (normalized, stats) = normalize(matrix.view(), 2).unwrap();

        assert_eq!(stats.mean, vec![2.0]);
        assert_eq!(stats.std, vec![1.0]);
        assert_eq!(normalized.column(0).to_vec(), vec![-1.0, 1.0, 3.0]);
    }

    #[test]
    fn test_degenerate_column() {
        let matrix = arr2(&[[1.0, 2.0], [2.0, 2.0], [3.0, 9.0]]);
        let err = normalize(matrix.view(), 2).unwrap_err();
        assert!(matches!(err, ForecastError::DegenerateColumn { column: 1, .. }));
    }

    #[test]
    fn test_rejects_empty_training_range() {
        let matrix = arr2(&[[1.0], [2.0]]);
        assert!(matches!(normalize(matrix.view(), 0), Err(ForecastError::InvalidConfiguration(_))));
        assert!(matches!(normalize(matrix.view(), 3), Err(ForecastError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_denormalize_inverts_apply() {
        let matrix = arr2(&[[2.0, -1.0], [4.0, 1.0], [9.0, 0.5]]);
        let (normalized, stats) = normalize(matrix.view(), 2).unwrap();
        let restored = stats.denormalize(0, normalized[[2, 0]]);
        assert!((restored - 9.0).abs() < 1e-12);
    }
}
