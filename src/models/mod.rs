/// Single-layer LSTM followed by a dense head, for scalar regression.
pub mod lstm_regressor;
