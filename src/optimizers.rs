use ndarray::Array2;
use std::collections::HashMap;

/// Optimizer trait for parameter updates during training
pub trait Optimizer {
    fn update(&mut self, param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>);
    fn reset(&mut self);
}

/// Stochastic Gradient Descent: θ = θ - η∇θ
#[derive(Debug, Clone)]
pub struct SGD {
    learning_rate: f64,
}

impl SGD {
    pub fn new(learning_rate: f64) -> Self {
        SGD { learning_rate }
    }
}

impl Optimizer for SGD {
    fn update(&mut self, _param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>) {
        param.scaled_add(-self.learning_rate, gradient);
    }

    fn reset(&mut self) {
        // SGD has no state to reset
    }
}

/// Moment estimates and step count of one parameter
#[derive(Debug, Clone)]
struct AdamState {
    m: Array2<f64>,
    v: Array2<f64>,
    t: i32,
}

/// Adam optimizer with adaptive learning rates
///
/// Implements: m_t = β₁m_{t-1} + (1-β₁)g_t
///             v_t = β₂v_{t-1} + (1-β₂)g_t²
///             θ_t = θ_{t-1} - η * m̂_t / (√v̂_t + ε)
/// where m̂_t and v̂_t are bias-corrected with a step count kept per parameter.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    state: HashMap<String, AdamState>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Adam::with_params(learning_rate, 0.9, 0.999, 1e-7)
    }

    pub fn with_params(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            state: HashMap::new(),
        }
    }
}

impl Optimizer for Adam {
    fn update(&mut self, param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>) {
        let state = self.state.entry(param_id.to_string()).or_insert_with(|| AdamState {
            m: Array2::zeros(param.raw_dim()),
            v: Array2::zeros(param.raw_dim()),
            t: 0,
        });
        state.t += 1;

        state.m = self.beta1 * &state.m + (1.0 - self.beta1) * gradient;
        state.v = self.beta2 * &state.v + (1.0 - self.beta2) * (gradient * gradient);

        let m_correction = 1.0 - self.beta1.powi(state.t);
        let v_correction = 1.0 - self.beta2.powi(state.t);

        let lr = self.learning_rate;
        let eps = self.epsilon;
        ndarray::Zip::from(param)
            .and(&state.m)
            .and(&state.v)
            .for_each(|p, &m, &v| {
                *p -= lr * (m / m_correction) / ((v / v_correction).sqrt() + eps);
            });
    }

    fn reset(&mut self) {
        self.state.clear();
    }
}
