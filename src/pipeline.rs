//! End-to-end data preparation: select, split, normalize, window.
//!
//! Target alignment: the window starting at raw row `k` of a partition is
//! labelled with the temperature `past + future` rows after the partition's
//! row `k`. For the training partition the labels are therefore the slice
//! `[past + future, past + future + train_split)` of the full matrix; for
//! validation the inputs stop `past + future` rows before the end so that
//! every window has a label.

use ndarray::{s, Array2, ArrayView1, ArrayView2};
use tracing::info;

use crate::climate::ClimateTable;
use crate::config::ForecastConfig;
use crate::error::{ForecastError, Result};
use crate::features::{select_features, NUM_FEATURES, TARGET_FEATURE};
use crate::normalize::{normalize, NormalizationStats};
use crate::split::SplitIndices;
use crate::window::{make_windows, window_span, WindowedDataset};

/// Normalized feature matrix with everything needed to build the datasets.
#[derive(Debug, Clone)]
pub struct PreparedData {
    normalized: Array2<f64>,
    stats: NormalizationStats,
    split: SplitIndices,
    config: ForecastConfig,
}

/// Select the model features from a raw table and prepare them.
pub fn prepare(table: &ClimateTable, config: &ForecastConfig) -> Result<PreparedData> {
    prepare_features(select_features(table), config)
}

/// Prepare an already selected `(rows, features)` matrix.
pub fn prepare_features(features: Array2<f64>, config: &ForecastConfig) -> Result<PreparedData> {
    config.validate()?;
    if features.ncols() <= TARGET_FEATURE {
        return Err(ForecastError::ShapeMismatch {
            expected: vec![features.nrows(), NUM_FEATURES],
            actual: features.shape().to_vec(),
        });
    }

    let split = SplitIndices::new(features.nrows(), config.split_fraction)?;
    check_sufficient(&split, config)?;

    let (normalized, stats) = normalize(features.view(), split.train_split)?;
    info!(
        rows = split.row_count,
        train_split = split.train_split,
        features = normalized.ncols(),
        "features normalized"
    );

    Ok(PreparedData {
        normalized,
        stats,
        split,
        config: config.clone(),
    })
}

/// Fail before any windowing when either partition cannot yield a window.
fn check_sufficient(split: &SplitIndices, config: &ForecastConfig) -> Result<()> {
    let offset = config.target_offset();
    let span = window_span(config.sequence_length(), config.step)
        .ok_or_else(|| ForecastError::invalid("window span exceeds the addressable range"))?;

    let train_rows = split.train_split;
    if train_rows < span {
        return Err(ForecastError::InsufficientData {
            partition: "training",
            rows: train_rows,
            required: span,
        });
    }
    if split.row_count <= offset {
        return Err(ForecastError::InsufficientData {
            partition: "training targets",
            rows: split.row_count,
            required: offset.saturating_add(1),
        });
    }

    let val_rows = split.row_count - split.train_split;
    let required = offset.saturating_add(span);
    if val_rows < required {
        return Err(ForecastError::InsufficientData {
            partition: "validation",
            rows: val_rows,
            required,
        });
    }
    Ok(())
}

impl PreparedData {
    pub fn normalized(&self) -> &Array2<f64> {
        &self.normalized
    }

    pub fn stats(&self) -> &NormalizationStats {
        &self.stats
    }

    pub fn split(&self) -> SplitIndices {
        self.split
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn num_features(&self) -> usize {
        self.normalized.ncols()
    }

    /// Normalized temperature column over the full table.
    pub fn target_column(&self) -> ArrayView1<'_, f64> {
        self.normalized.column(TARGET_FEATURE)
    }

    /// Training inputs: rows `[0, train_split)`.
    pub fn train_inputs(&self) -> ArrayView2<'_, f64> {
        self.normalized.slice(s![..self.split.train_split, ..])
    }

    /// Training labels: rows `[past + future, past + future + train_split)`, clipped to the table.
    pub fn train_targets(&self) -> ArrayView1<'_, f64> {
        let rows = self.split.row_count;
        let start = self.config.target_offset().min(rows);
        let end = start.saturating_add(self.split.train_split).min(rows);
        self.normalized.slice(s![start..end, TARGET_FEATURE])
    }

    /// Validation inputs: the validation partition minus its last `past + future` rows.
    pub fn validation_inputs(&self) -> ArrayView2<'_, f64> {
        let start = self.split.train_split;
        let len = (self.split.row_count - start).saturating_sub(self.config.target_offset());
        self.normalized.slice(s![start..start + len, ..])
    }

    /// Validation labels: rows from `train_split + past + future` to the end.
    pub fn validation_targets(&self) -> ArrayView1<'_, f64> {
        let rows = self.split.row_count;
        let start = self.split.train_split.saturating_add(self.config.target_offset()).min(rows);
        self.normalized.slice(s![start.., TARGET_FEATURE])
    }

    pub fn train_windows(&self) -> Result<WindowedDataset<'_>> {
        make_windows(
            self.train_inputs(),
            self.train_targets(),
            self.config.sequence_length(),
            self.config.step,
            self.config.batch_size,
        )
    }

    pub fn validation_windows(&self) -> Result<WindowedDataset<'_>> {
        make_windows(
            self.validation_inputs(),
            self.validation_targets(),
            self.config.sequence_length(),
            self.config.step,
            self.config.batch_size,
        )
    }

    /// Map a normalized temperature back to degrees Celsius.
    pub fn denormalize_target(&self, value: f64) -> f64 {
        self.stats.denormalize(TARGET_FEATURE, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ForecastConfig {
        ForecastConfig {
            split_fraction: 0.5,
            step: 2,
            past: 6,
            future: 2,
            batch_size: 4,
            ..Default::default()
        }
    }

    fn features(rows: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, NUM_FEATURES), |(r, c)| (r as f64) * (c + 1) as f64 + (r % 3) as f64)
    }

    #[test]
    fn test_partition_views() {
        // 40 rows, train_split 20, offset 8, span 5
        let data = prepare_features(features(40), &small_config()).unwrap();

        assert_eq!(data.train_inputs().nrows(), 20);
        assert_eq!(data.train_targets().len(), 20);
        assert_eq!(data.validation_inputs().nrows(), 12);
        assert_eq!(data.validation_targets().len(), 12);

        assert_eq!(data.train_targets()[0], data.normalized()[[8, TARGET_FEATURE]]);
        assert_eq!(data.validation_targets()[0], data.normalized()[[28, TARGET_FEATURE]]);
        assert_eq!(data.validation_inputs()[[0, 0]], data.normalized()[[20, 0]]);
    }

    #[test]
    fn test_window_counts() {
        let data = prepare_features(features(40), &small_config()).unwrap();
        // training: min(20 - 4, 20) = 16; validation: min(12 - 4, 12) = 8
        assert_eq!(data.train_windows().unwrap().num_windows(), 16);
        assert_eq!(data.validation_windows().unwrap().num_windows(), 8);
    }

    #[test]
    fn test_short_validation_is_insufficient() {
        // 24 rows -> 12 validation rows, need 8 + 5
        let err = prepare_features(features(24), &small_config()).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { partition: "validation", .. }));
    }

    #[test]
    fn test_rejects_missing_target_column() {
        let narrow = Array2::from_shape_fn((40, 1), |(r, _)| r as f64);
        assert!(matches!(
            prepare_features(narrow, &small_config()),
            Err(ForecastError::ShapeMismatch { .. })
        ));
    }
}
