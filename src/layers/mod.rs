/// LSTM cell with batched column inputs.
pub mod lstm_cell;

/// Dense layer used as the regression head.
pub mod linear;
