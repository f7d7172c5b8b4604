//! Chronological train/validation partition.

use std::ops::Range;

use crate::error::{ForecastError, Result};

/// Boundary index of the training prefix: `floor(split_fraction * row_count)`.
pub fn split(row_count: usize, split_fraction: f64) -> Result<usize> {
    if !(split_fraction > 0.0 && split_fraction < 1.0) {
        return Err(ForecastError::invalid(format!(
            "split_fraction must lie in (0, 1), got {}",
            split_fraction
        )));
    }
    Ok((split_fraction * row_count as f64).floor() as usize)
}

/// Contiguous training prefix and validation suffix of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitIndices {
    pub train_split: usize,
    pub row_count: usize,
}

impl SplitIndices {
    pub fn new(row_count: usize, split_fraction: f64) -> Result<Self> {
        let train_split = split(row_count, split_fraction)?;
        Ok(SplitIndices { train_split, row_count })
    }

    pub fn train(&self) -> Range<usize> {
        0..self.train_split
    }

    pub fn validation(&self) -> Range<usize> {
        self.train_split..self.row_count
    }
}
