//! Lazy construction of strided input windows and their targets.
//!
//! Window `i` covers rows `i, i + r, ..., i + (L - 1) * r` of the input
//! matrix and is paired with `targets[i]`. Start indices advance one raw
//! row at a time, so neighbouring windows overlap. Batches are assembled on
//! demand from the borrowed matrices; nothing proportional to the number of
//! windows is ever allocated.

use ndarray::{s, Array2, Array3, ArrayView1, ArrayView2};

use crate::error::{ForecastError, Result};

/// One batch of windows.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowBatch {
    /// Shape `[batch, sequence_length, features]`.
    pub inputs: Array3<f64>,
    /// Shape `[batch, 1]`.
    pub targets: Array2<f64>,
    /// Index of the first window in this batch (equal to its first raw row).
    pub first_window: usize,
}

impl WindowBatch {
    pub fn len(&self) -> usize {
        self.inputs.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A finite, restartable sequence of window batches over borrowed data.
#[derive(Debug, Clone)]
pub struct WindowedDataset<'a> {
    inputs: ArrayView2<'a, f64>,
    targets: ArrayView1<'a, f64>,
    sequence_length: usize,
    sampling_rate: usize,
    batch_size: usize,
    span: usize,
    num_windows: usize,
}

/// Build a windowed dataset from per-row inputs and per-row targets.
///
/// Produces `min(rows - (sequence_length - 1) * sampling_rate, targets.len())`
/// windows. Fails with `InsufficientData` when that count is zero.
pub fn make_windows<'a>(
    inputs: ArrayView2<'a, f64>,
    targets: ArrayView1<'a, f64>,
    sequence_length: usize,
    sampling_rate: usize,
    batch_size: usize,
) -> Result<WindowedDataset<'a>> {
    if sequence_length == 0 {
        return Err(ForecastError::invalid("sequence_length must be positive"));
    }
    if sampling_rate == 0 {
        return Err(ForecastError::invalid("sampling_rate must be positive"));
    }
    if batch_size == 0 {
        return Err(ForecastError::invalid("batch_size must be positive"));
    }

    let span = window_span(sequence_length, sampling_rate).ok_or_else(|| {
        ForecastError::invalid(format!(
            "window of {} steps every {} rows exceeds the addressable range",
            sequence_length, sampling_rate
        ))
    })?;
    let rows = inputs.nrows();
    if rows < span {
        return Err(ForecastError::InsufficientData {
            partition: "window inputs",
            rows,
            required: span,
        });
    }
    if targets.is_empty() {
        return Err(ForecastError::InsufficientData {
            partition: "window targets",
            rows: 0,
            required: 1,
        });
    }

    let num_windows = (rows - span + 1).min(targets.len());

    Ok(WindowedDataset {
        inputs,
        targets,
        sequence_length,
        sampling_rate,
        batch_size,
        span,
        num_windows,
    })
}

/// Raw rows covered by one window, first through last sampled row inclusive.
///
/// `None` when the span does not fit in `usize`.
pub fn window_span(sequence_length: usize, sampling_rate: usize) -> Option<usize> {
    sequence_length
        .checked_sub(1)?
        .checked_mul(sampling_rate)?
        .checked_add(1)
}

impl<'a> WindowedDataset<'a> {
    pub fn num_windows(&self) -> usize {
        self.num_windows
    }

    pub fn num_batches(&self) -> usize {
        self.num_windows / self.batch_size + usize::from(self.num_windows % self.batch_size != 0)
    }

    pub fn num_features(&self) -> usize {
        self.inputs.ncols()
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn sampling_rate(&self) -> usize {
        self.sampling_rate
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Sampled rows of window `index`, shape `[sequence_length, features]`.
    pub fn window(&self, index: usize) -> Option<ArrayView2<'_, f64>> {
        if index >= self.num_windows {
            return None;
        }
        let end = index + self.span;
        Some(self.inputs.slice(s![index..end;self.sampling_rate, ..]))
    }

    pub fn target(&self, index: usize) -> Option<f64> {
        if index >= self.num_windows {
            return None;
        }
        Some(self.targets[index])
    }

    /// Assemble batch `index`; the final batch may hold fewer than `batch_size` windows.
    pub fn batch(&self, index: usize) -> Option<WindowBatch> {
        let first = index.checked_mul(self.batch_size)?;
        if first >= self.num_windows {
            return None;
        }
        let last = first.saturating_add(self.batch_size).min(self.num_windows);
        let len = last - first;

        let mut inputs = Array3::zeros((len, self.sequence_length, self.num_features()));
        let mut targets = Array2::zeros((len, 1));
        for (k, window_index) in (first..last).enumerate() {
            if let Some(window) = self.window(window_index) {
                inputs.slice_mut(s![k, .., ..]).assign(&window);
            }
            targets[[k, 0]] = self.targets[window_index];
        }

        Some(WindowBatch {
            inputs,
            targets,
            first_window: first,
        })
    }

    /// Iterate over all batches from the start.
    pub fn iter(&self) -> Batches<'a> {
        Batches {
            dataset: self.clone(),
            next_batch: 0,
        }
    }
}

impl<'a> IntoIterator for &WindowedDataset<'a> {
    type Item = WindowBatch;
    type IntoIter = Batches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the batches of a [`WindowedDataset`].
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    dataset: WindowedDataset<'a>,
    next_batch: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = WindowBatch;

    fn next(&mut self) -> Option<WindowBatch> {
        let batch = self.dataset.batch(self.next_batch)?;
        self.next_batch += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.dataset.num_batches().saturating_sub(self.next_batch);
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for Batches<'a> {}
