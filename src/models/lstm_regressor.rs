use ndarray::{s, Array2, Array3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{ForecastError, Result};
use crate::layers::linear::{LinearGradients, LinearLayer};
use crate::layers::lstm_cell::{LSTMCell, LSTMCellCache, LSTMCellGradients};
use crate::optimizers::Optimizer;

/// Per-timestep cell caches plus the final hidden state fed to the head
#[derive(Clone, Debug)]
pub struct RegressorCache {
    pub steps: Vec<LSTMCellCache>,
    pub last_hidden: Array2<f64>,
}

/// Gradients for every trainable parameter of the regressor
#[derive(Clone, Debug)]
pub struct RegressorGradients {
    pub cell: LSTMCellGradients,
    pub head: LinearGradients,
}

impl RegressorGradients {
    pub fn matrices_mut(&mut self) -> impl Iterator<Item = &mut Array2<f64>> {
        self.cell.matrices_mut().into_iter().chain(self.head.matrices_mut())
    }
}

/// Many-to-one LSTM regressor
///
/// Runs one LSTM layer over every timestep of a window and maps the last
/// hidden state to a single value through a dense head. Inputs are batches of
/// shape `[batch, sequence_length, features]`, outputs `[batch, 1]`.
#[derive(Clone, Debug)]
pub struct LstmRegressor {
    pub cell: LSTMCell,
    pub head: LinearLayer,
    pub input_size: usize,
    pub hidden_size: usize,
}

impl LstmRegressor {
    /// Creates a regressor whose weights are drawn from a generator seeded with `seed`
    pub fn new(input_size: usize, hidden_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let cell = LSTMCell::new(input_size, hidden_size, &mut rng);
        let head = LinearLayer::new(hidden_size, 1, &mut rng);

        LstmRegressor {
            cell,
            head,
            input_size,
            hidden_size,
        }
    }

    /// Rebuilds a regressor from existing layers (used for deserialization)
    pub fn from_layers(cell: LSTMCell, head: LinearLayer) -> Self {
        LstmRegressor {
            input_size: cell.input_size,
            hidden_size: cell.hidden_size,
            cell,
            head,
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.cell.num_parameters() + self.head.num_parameters()
    }

    /// Check that a batch carries `input_size` features per timestep
    pub fn check_input(&self, inputs: &Array3<f64>) -> Result<()> {
        let shape = inputs.shape();
        if shape[2] != self.input_size || shape[1] == 0 {
            return Err(ForecastError::ShapeMismatch {
                expected: vec![shape[0], shape[1].max(1), self.input_size],
                actual: shape.to_vec(),
            });
        }
        Ok(())
    }

    /// Inference without caching
    pub fn forward(&self, inputs: &Array3<f64>) -> Array2<f64> {
        self.forward_with_cache(inputs).0
    }

    /// Forward pass over all timesteps, keeping what backpropagation needs
    pub fn forward_with_cache(&self, inputs: &Array3<f64>) -> (Array2<f64>, RegressorCache) {
        let (batch, timesteps, _) = inputs.dim();
        let mut hx = Array2::zeros((self.hidden_size, batch));
        let mut cx = Array2::zeros((self.hidden_size, batch));
        let mut steps = Vec::with_capacity(timesteps);

        for t in 0..timesteps {
            // (batch, features) -> (features, batch)
            let x_t = inputs.slice(s![.., t, ..]).t().to_owned();
            let (hy, cy, cache) = self.cell.forward_with_cache(&x_t, &hx, &cx);
            steps.push(cache);
            hx = hy;
            cx = cy;
        }

        let output = self.head.forward(&hx);
        let cache = RegressorCache {
            steps,
            last_hidden: hx,
        };
        (output.t().to_owned(), cache)
    }

    /// Backpropagation through time from the gradient of the `[batch, 1]` output
    pub fn backward(&self, grad_output: &Array2<f64>, cache: &RegressorCache) -> RegressorGradients {
        let grad_head = grad_output.t().to_owned();
        let (head_gradients, mut dh) = self.head.backward(&cache.last_hidden, &grad_head);
        let mut dc = Array2::zeros(dh.raw_dim());
        let mut cell_gradients = self.cell.zero_gradients();

        for step in cache.steps.iter().rev() {
            let (step_gradients, _dx, dhx, dcx) = self.cell.backward(&dh, &dc, step);
            cell_gradients.accumulate(&step_gradients);
            dh = dhx;
            dc = dcx;
        }

        RegressorGradients {
            cell: cell_gradients,
            head: head_gradients,
        }
    }

    /// Update all parameters using computed gradients
    pub fn update_parameters<O: Optimizer>(&mut self, gradients: &RegressorGradients, optimizer: &mut O) {
        self.cell.update_parameters(&gradients.cell, optimizer, "lstm");
        self.head.update_parameters(&gradients.head, optimizer, "dense");
    }
}
