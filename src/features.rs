//! Selection of the model input columns.

use ndarray::{Array2, Axis};

use crate::climate::{ClimateTable, FEATURE_KEYS, FEATURE_TITLES};

/// Raw-table indices of the selected fields, in canonical order:
/// pressure, temperature, saturation vapor pressure, vapor pressure deficit,
/// specific humidity, airtight and wind speed.
pub const SELECTED_FEATURES: [usize; 7] = [0, 1, 5, 7, 8, 10, 11];

/// Position of the temperature field inside the selected columns.
pub const TARGET_FEATURE: usize = 1;

pub const NUM_FEATURES: usize = SELECTED_FEATURES.len();

/// Keys of the selected fields, in feature-matrix order.
pub fn selected_keys() -> Vec<&'static str> {
    SELECTED_FEATURES.iter().map(|&i| FEATURE_KEYS[i]).collect()
}

pub fn selected_titles() -> Vec<&'static str> {
    SELECTED_FEATURES.iter().map(|&i| FEATURE_TITLES[i]).collect()
}

/// Restrict the raw table to the selected fields, shape `(rows, 7)`.
pub fn select_features(table: &ClimateTable) -> Array2<f64> {
    table.values().select(Axis(1), &SELECTED_FEATURES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_selected_keys() {
        assert_eq!(
            selected_keys(),
            vec!["p (mbar)", "T (degC)", "VPmax (mbar)", "VPdef (mbar)", "sh (g/kg)", "rho (g/m**3)", "wv (m/s)"]
        );
        assert_eq!(selected_titles()[TARGET_FEATURE], "Temperature");
    }

    #[test]
    fn test_select_features_keeps_rows_and_order() {
        let start = NaiveDate::from_ymd_opt(2009, 1, 1).unwrap().and_hms_opt(0, 10, 0).unwrap();
        let timestamps = (0..3).map(|i| start + chrono::Duration::minutes(10 * i)).collect();
        let values = Array2::from_shape_fn((3, 14), |(r, c)| (r * 100 + c) as f64);
        let table = ClimateTable::from_parts(timestamps, values).unwrap();

        let matrix = select_features(&table);
        assert_eq!(matrix.shape(), &[3, NUM_FEATURES]);
        assert_eq!(matrix.row(2).to_vec(), vec![200.0, 201.0, 205.0, 207.0, 208.0, 210.0, 211.0]);
    }
}
