//! Numeric helpers shared by the layers and the trainer.

use ndarray::Array2;

/// Sigmoid activation function: σ(x) = 1 / (1 + e^(-x))
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Rescale `matrix` in place so its Frobenius norm does not exceed `max_norm`.
pub fn clip_by_norm(matrix: &mut Array2<f64>, max_norm: f64) {
    let norm = matrix.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > max_norm {
        let scale = max_norm / norm;
        matrix.mapv_inplace(|x| x * scale);
    }
}
