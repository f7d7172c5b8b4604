//! Loading and exploring the Jena climate table.
//!
//! The dataset has one row every 10 minutes with a `Date Time` column and
//! 14 numeric fields. [`ClimateTable`] keeps the numeric fields in the
//! canonical order of [`FEATURE_KEYS`], regardless of the column order in
//! the source file.

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use ndarray::{Array2, ArrayView1, Axis};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{ForecastError, Result};

pub const DATE_TIME_KEY: &str = "Date Time";

/// Timestamp layout used by the published CSV, e.g. `01.01.2009 00:10:00`.
pub const DATE_TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Expected spacing between consecutive rows.
pub const SAMPLING_INTERVAL_MINUTES: i64 = 10;

pub const FEATURE_KEYS: [&str; 14] = [
    "p (mbar)",
    "T (degC)",
    "Tpot (K)",
    "Tdew (degC)",
    "rh (%)",
    "VPmax (mbar)",
    "VPact (mbar)",
    "VPdef (mbar)",
    "sh (g/kg)",
    "H2OC (mmol/mol)",
    "rho (g/m**3)",
    "wv (m/s)",
    "max. wv (m/s)",
    "wd (deg)",
];

pub const FEATURE_TITLES: [&str; 14] = [
    "Pressure",
    "Temperature",
    "Temperature in Kelvin",
    "Temperature (dew point)",
    "Relative Humidity",
    "Saturation vapor pressure",
    "Vapor pressure",
    "Vapor pressure deficit",
    "Specific humidity",
    "Water vapor concentration",
    "Airtight",
    "Wind speed",
    "Maximum wind speed",
    "Wind direction in degrees",
];

/// Calendar bucket for [`ClimateTable::time_profile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBucket {
    HourOfDay,
    Month,
    Year,
}

/// Time-ordered raw table: one timestamp and 14 numeric fields per row.
#[derive(Debug, Clone)]
pub struct ClimateTable {
    timestamps: Vec<NaiveDateTime>,
    values: Array2<f64>,
}

impl ClimateTable {
    /// Build a table from already parsed rows.
    ///
    /// `values` must have one row per timestamp and one column per entry of
    /// [`FEATURE_KEYS`]; timestamps must be strictly increasing.
    pub fn from_parts(timestamps: Vec<NaiveDateTime>, values: Array2<f64>) -> Result<Self> {
        let expected = vec![timestamps.len(), FEATURE_KEYS.len()];
        if values.shape() != expected.as_slice() {
            return Err(ForecastError::ShapeMismatch {
                expected,
                actual: values.shape().to_vec(),
            });
        }

        let mut irregular = 0usize;
        for (i, pair) in timestamps.windows(2).enumerate() {
            let gap = pair[1] - pair[0];
            if gap <= Duration::zero() {
                return Err(ForecastError::UnorderedTimestamps {
                    // header is line 1, first data row is line 2
                    line: i + 3,
                    timestamp: pair[1].to_string(),
                });
            }
            if gap != Duration::minutes(SAMPLING_INTERVAL_MINUTES) {
                irregular += 1;
            }
        }
        if irregular > 0 {
            warn!(
                irregular,
                rows = timestamps.len(),
                "rows are not spaced {} minutes apart",
                SAMPLING_INTERVAL_MINUTES
            );
        }

        Ok(ClimateTable { timestamps, values })
    }

    /// Read the CSV file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "reading climate csv");
        Self::from_reader(file)
    }

    /// Read CSV data with a header row from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let position = |key: &str| {
            headers
                .iter()
                .position(|h| h == key)
                .ok_or_else(|| ForecastError::MissingColumn(key.to_string()))
        };
        let time_column = position(DATE_TIME_KEY)?;
        let feature_columns = FEATURE_KEYS
            .iter()
            .map(|key| position(key))
            .collect::<Result<Vec<_>>>()?;

        let mut timestamps = Vec::new();
        let mut data = Vec::new();

        for record in csv_reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line() as usize).unwrap_or(0);

            let raw_time = record.get(time_column).unwrap_or_default();
            let timestamp = NaiveDateTime::parse_from_str(raw_time, DATE_TIME_FORMAT).map_err(|_| {
                ForecastError::Parse {
                    line,
                    column: DATE_TIME_KEY.to_string(),
                    value: raw_time.to_string(),
                }
            })?;
            timestamps.push(timestamp);

            for (&column, key) in feature_columns.iter().zip(FEATURE_KEYS.iter()) {
                let raw = record.get(column).unwrap_or_default();
                let value: f64 = raw.parse().map_err(|_| ForecastError::Parse {
                    line,
                    column: key.to_string(),
                    value: raw.to_string(),
                })?;
                data.push(value);
            }
        }

        let rows = timestamps.len();
        let values = Array2::from_shape_vec((rows, FEATURE_KEYS.len()), data).map_err(|_| {
            ForecastError::ShapeMismatch {
                expected: vec![rows, FEATURE_KEYS.len()],
                actual: vec![rows],
            }
        })?;
        debug!(rows, "climate csv loaded");

        Self::from_parts(timestamps, values)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// Numeric fields, shape `(rows, 14)`.
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn column(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.column(index)
    }

    /// Pearson correlation between every pair of the 14 fields.
    ///
    /// Pairs involving a constant column are `NaN`.
    pub fn correlation_matrix(&self) -> Array2<f64> {
        let n = FEATURE_KEYS.len();
        let mut corr = Array2::from_elem((n, n), f64::NAN);
        if self.is_empty() {
            return corr;
        }

        let means = self.values.mean_axis(Axis(0)).unwrap_or_else(|| ndarray::Array1::zeros(n));
        let centered = &self.values - &means;

        for i in 0..n {
            for j in i..n {
                let a = centered.column(i);
                let b = centered.column(j);
                let denom = (a.dot(&a) * b.dot(&b)).sqrt();
                let value = if denom > 0.0 { a.dot(&b) / denom } else { f64::NAN };
                corr[[i, j]] = value;
                corr[[j, i]] = value;
            }
        }
        corr
    }

    /// Mean of one field per calendar bucket, ordered by bucket key.
    pub fn time_profile(&self, column: usize, bucket: TimeBucket) -> Vec<(i32, f64)> {
        let mut sums: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
        for (timestamp, &value) in self.timestamps.iter().zip(self.values.column(column).iter()) {
            let key = match bucket {
                TimeBucket::HourOfDay => timestamp.hour() as i32,
                TimeBucket::Month => timestamp.month() as i32,
                TimeBucket::Year => timestamp.year(),
            };
            let entry = sums.entry(key).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(key, (sum, count))| (key, sum / count as f64))
            .collect()
    }
}
