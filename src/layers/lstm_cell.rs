use ndarray::{s, Array2, Axis};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;

use crate::optimizers::Optimizer;
use crate::utils::sigmoid;

/// Holds gradients for all LSTM cell parameters during backpropagation
#[derive(Clone, Debug)]
pub struct LSTMCellGradients {
    pub w_ih: Array2<f64>,
    pub w_hh: Array2<f64>,
    pub b_ih: Array2<f64>,
    pub b_hh: Array2<f64>,
}

impl LSTMCellGradients {
    /// Element-wise accumulation, used when summing over timesteps
    pub fn accumulate(&mut self, other: &LSTMCellGradients) {
        self.w_ih += &other.w_ih;
        self.w_hh += &other.w_hh;
        self.b_ih += &other.b_ih;
        self.b_hh += &other.b_hh;
    }

    pub fn matrices_mut(&mut self) -> [&mut Array2<f64>; 4] {
        [&mut self.w_ih, &mut self.w_hh, &mut self.b_ih, &mut self.b_hh]
    }
}

/// Values from one forward step that the backward step needs
#[derive(Clone, Debug)]
pub struct LSTMCellCache {
    pub input: Array2<f64>,
    pub hx: Array2<f64>,
    pub cx: Array2<f64>,
    pub input_gate: Array2<f64>,
    pub forget_gate: Array2<f64>,
    pub cell_gate: Array2<f64>,
    pub output_gate: Array2<f64>,
    pub cy: Array2<f64>,
}

/// LSTM cell operating on column blocks of shape `(features, batch)`.
///
/// - i_t = σ(W_xi x_t + W_hi h_t-1 + b_i)
/// - f_t = σ(W_xf x_t + W_hf h_t-1 + b_f)
/// - g_t = tanh(W_xg x_t + W_hg h_t-1 + b_g)
/// - o_t = σ(W_xo x_t + W_ho h_t-1 + b_o)
/// - c_t = f_t ⊙ c_t-1 + i_t ⊙ g_t
/// - h_t = o_t ⊙ tanh(c_t)
#[derive(Clone, Debug)]
pub struct LSTMCell {
    pub w_ih: Array2<f64>,  // (4*hidden_size, input_size)
    pub w_hh: Array2<f64>,  // (4*hidden_size, hidden_size)
    pub b_ih: Array2<f64>,  // (4*hidden_size, 1)
    pub b_hh: Array2<f64>,  // (4*hidden_size, 1)
    pub input_size: usize,
    pub hidden_size: usize,
}

impl LSTMCell {
    /// Glorot-uniform weights, zero biases except a forget-gate bias of one.
    pub fn new<R: Rng + ?Sized>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        let gates = 4 * hidden_size;
        let input_bound = (6.0 / (input_size + gates) as f64).sqrt();
        let hidden_bound = (6.0 / (hidden_size + gates) as f64).sqrt();

        let w_ih = Array2::random_using((gates, input_size), Uniform::new(-input_bound, input_bound), rng);
        let w_hh = Array2::random_using((gates, hidden_size), Uniform::new(-hidden_bound, hidden_bound), rng);
        let mut b_ih = Array2::zeros((gates, 1));
        let b_hh = Array2::zeros((gates, 1));
        b_ih.slice_mut(s![hidden_size..2 * hidden_size, ..]).fill(1.0);

        LSTMCell {
            w_ih,
            w_hh,
            b_ih,
            b_hh,
            input_size,
            hidden_size,
        }
    }

    pub fn forward(&self, input: &Array2<f64>, hx: &Array2<f64>, cx: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let (hy, cy, _) = self.forward_with_cache(input, hx, cx);
        (hy, cy)
    }

    pub fn forward_with_cache(
        &self,
        input: &Array2<f64>,
        hx: &Array2<f64>,
        cx: &Array2<f64>,
    ) -> (Array2<f64>, Array2<f64>, LSTMCellCache) {
        let h = self.hidden_size;

        // All four gates at once: [input_gate, forget_gate, cell_gate, output_gate]
        let gates = &self.w_ih.dot(input) + &self.b_ih + &self.w_hh.dot(hx) + &self.b_hh;

        let input_gate = gates.slice(s![0..h, ..]).mapv(sigmoid);
        let forget_gate = gates.slice(s![h..2 * h, ..]).mapv(sigmoid);
        let cell_gate = gates.slice(s![2 * h..3 * h, ..]).mapv(f64::tanh);
        let output_gate = gates.slice(s![3 * h..4 * h, ..]).mapv(sigmoid);

        let cy = &forget_gate * cx + &input_gate * &cell_gate;
        let hy = &output_gate * &cy.mapv(f64::tanh);

        let cache = LSTMCellCache {
            input: input.clone(),
            hx: hx.clone(),
            cx: cx.clone(),
            input_gate,
            forget_gate,
            cell_gate,
            output_gate,
            cy: cy.clone(),
        };

        (hy, cy, cache)
    }

    /// Backward step for one timestep.
    ///
    /// Returns (parameter_gradients, input_gradient, hidden_gradient, cell_gradient).
    /// Parameter gradients are summed over the batch columns.
    pub fn backward(
        &self,
        dhy: &Array2<f64>,
        dcy: &Array2<f64>,
        cache: &LSTMCellCache,
    ) -> (LSTMCellGradients, Array2<f64>, Array2<f64>, Array2<f64>) {
        let h = self.hidden_size;
        let batch = dhy.ncols();

        let tanh_cy = cache.cy.mapv(f64::tanh);

        // ∂L/∂o_t = ∂L/∂h_t ⊙ tanh(c_t)
        let do_raw = dhy * &tanh_cy * &cache.output_gate * &cache.output_gate.mapv(|x| 1.0 - x);

        // Cell gradient from the tanh path plus the incoming one
        let dcy_total = dcy + &(dhy * &cache.output_gate * &tanh_cy.mapv(|x| 1.0 - x * x));

        let df_raw = &dcy_total * &cache.cx * &cache.forget_gate * &cache.forget_gate.mapv(|x| 1.0 - x);
        let di_raw = &dcy_total * &cache.cell_gate * &cache.input_gate * &cache.input_gate.mapv(|x| 1.0 - x);
        let dg_raw = &dcy_total * &cache.input_gate * &cache.cell_gate.mapv(|x| 1.0 - x * x);

        let mut dgates = Array2::zeros((4 * h, batch));
        dgates.slice_mut(s![0..h, ..]).assign(&di_raw);
        dgates.slice_mut(s![h..2 * h, ..]).assign(&df_raw);
        dgates.slice_mut(s![2 * h..3 * h, ..]).assign(&dg_raw);
        dgates.slice_mut(s![3 * h..4 * h, ..]).assign(&do_raw);

        let db = dgates.sum_axis(Axis(1)).insert_axis(Axis(1));
        let gradients = LSTMCellGradients {
            w_ih: dgates.dot(&cache.input.t()),
            w_hh: dgates.dot(&cache.hx.t()),
            b_ih: db.clone(),
            b_hh: db,
        };

        let dx = self.w_ih.t().dot(&dgates);
        let dhx = self.w_hh.t().dot(&dgates);
        let dcx = &dcy_total * &cache.forget_gate;

        (gradients, dx, dhx, dcx)
    }

    /// Initialize zero gradients for accumulation
    pub fn zero_gradients(&self) -> LSTMCellGradients {
        LSTMCellGradients {
            w_ih: Array2::zeros(self.w_ih.raw_dim()),
            w_hh: Array2::zeros(self.w_hh.raw_dim()),
            b_ih: Array2::zeros(self.b_ih.raw_dim()),
            b_hh: Array2::zeros(self.b_hh.raw_dim()),
        }
    }

    pub fn update_parameters<O: Optimizer>(&mut self, gradients: &LSTMCellGradients, optimizer: &mut O, prefix: &str) {
        optimizer.update(&format!("{}_w_ih", prefix), &mut self.w_ih, &gradients.w_ih);
        optimizer.update(&format!("{}_w_hh", prefix), &mut self.w_hh, &gradients.w_hh);
        optimizer.update(&format!("{}_b_ih", prefix), &mut self.b_ih, &gradients.b_ih);
        optimizer.update(&format!("{}_b_hh", prefix), &mut self.b_hh, &gradients.b_hh);
    }

    pub fn num_parameters(&self) -> usize {
        self.w_ih.len() + self.w_hh.len() + self.b_ih.len() + self.b_hh.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_lstm_cell_forward_batch() {
        let mut rng = StdRng::seed_from_u64(7);
        let cell = LSTMCell::new(3, 2, &mut rng);

        // three features, two batch columns
        let input = arr2(&[[0.5, -0.5], [0.1, 0.2], [-0.3, 0.0]]);
        let hx = Array2::zeros((2, 2));
        let cx = Array2::zeros((2, 2));

        let (hy, cy) = cell.forward(&input, &hx, &cx);

        assert_eq!(hy.shape(), &[2, 2]);
        assert_eq!(cy.shape(), &[2, 2]);
        assert!(hy.iter().all(|v| v.abs() < 1.0));
    }

    #[test]
    fn test_forget_bias_initialized_to_one() {
        let mut rng = StdRng::seed_from_u64(1);
        let cell = LSTMCell::new(2, 3, &mut rng);
        assert_eq!(cell.b_ih.slice(s![0..3, ..]).sum(), 0.0);
        assert_eq!(cell.b_ih.slice(s![3..6, ..]).sum(), 3.0);
    }

    #[test]
    fn test_backward_shapes_and_bias_sum() {
        let mut rng = StdRng::seed_from_u64(3);
        let cell = LSTMCell::new(2, 3, &mut rng);

        let input = arr2(&[[1.0, 0.2, -0.4, 0.0], [0.5, 0.1, 0.3, -1.0]]);
        let hx = Array2::from_elem((3, 4), 0.1);
        let cx = Array2::zeros((3, 4));
        let (_, _, cache) = cell.forward_with_cache(&input, &hx, &cx);

        let dhy = Array2::ones((3, 4));
        let dcy = Array2::zeros((3, 4));
        let (gradients, dx, dhx, dcx) = cell.backward(&dhy, &dcy, &cache);

        assert_eq!(gradients.w_ih.shape(), &[12, 2]);
        assert_eq!(gradients.w_hh.shape(), &[12, 3]);
        assert_eq!(gradients.b_ih.shape(), &[12, 1]);
        assert_eq!(dx.shape(), &[2, 4]);
        assert_eq!(dhx.shape(), &[3, 4]);
        assert_eq!(dcx.shape(), &[3, 4]);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut cell = LSTMCell::new(2, 2, &mut rng);
        let input = arr2(&[[0.3], [-0.7]]);
        let hx = arr2(&[[0.2], [-0.1]]);
        let cx = arr2(&[[0.05], [0.4]]);

        // loss = sum(h_t)
        let (_, _, cache) = cell.forward_with_cache(&input, &hx, &cx);
        let (gradients, _, _, _) = cell.backward(&Array2::ones((2, 1)), &Array2::zeros((2, 1)), &cache);

        let eps = 1e-6;
        let original = cell.w_ih[[5, 1]];
        cell.w_ih[[5, 1]] = original + eps;
        let plus = cell.forward(&input, &hx, &cx).0.sum();
        cell.w_ih[[5, 1]] = original - eps;
        let minus = cell.forward(&input, &hx, &cx).0.sum();
        let numeric = (plus - minus) / (2.0 * eps);

        assert!((numeric - gradients.w_ih[[5, 1]]).abs() < 1e-6);
    }
}
