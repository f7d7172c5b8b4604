use ndarray::{Array2, Axis};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;

use crate::optimizers::Optimizer;

/// Holds gradients for linear layer parameters during backpropagation
#[derive(Clone, Debug)]
pub struct LinearGradients {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
}

impl LinearGradients {
    pub fn matrices_mut(&mut self) -> [&mut Array2<f64>; 2] {
        [&mut self.weight, &mut self.bias]
    }
}

/// Fully connected layer: `output = weight · input + bias`
///
/// Inputs and outputs are column blocks of shape `(features, batch)`.
#[derive(Clone, Debug)]
pub struct LinearLayer {
    pub weight: Array2<f64>,     // (output_size, input_size)
    pub bias: Array2<f64>,       // (output_size, 1)
    pub input_size: usize,
    pub output_size: usize,
}

impl LinearLayer {
    /// Glorot-uniform weights and zero bias
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let bound = (6.0 / (input_size + output_size) as f64).sqrt();
        let weight = Array2::random_using((output_size, input_size), Uniform::new(-bound, bound), rng);
        let bias = Array2::zeros((output_size, 1));

        Self {
            weight,
            bias,
            input_size,
            output_size,
        }
    }

    /// Create a layer from explicit parameters
    pub fn from_weights(weight: Array2<f64>, bias: Array2<f64>) -> Self {
        let (output_size, input_size) = weight.dim();
        assert_eq!(bias.shape(), &[output_size, 1], "Bias shape must be (output_size, 1)");

        Self {
            weight,
            bias,
            input_size,
            output_size,
        }
    }

    pub fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        &self.weight.dot(input) + &self.bias
    }

    /// Backward pass given the input that produced `grad_output`.
    ///
    /// Returns (gradients, input_gradient); the bias gradient is summed over the batch.
    pub fn backward(&self, input: &Array2<f64>, grad_output: &Array2<f64>) -> (LinearGradients, Array2<f64>) {
        let gradients = LinearGradients {
            weight: grad_output.dot(&input.t()),
            bias: grad_output.sum_axis(Axis(1)).insert_axis(Axis(1)),
        };
        let input_grad = self.weight.t().dot(grad_output);

        (gradients, input_grad)
    }

    pub fn update_parameters<O: Optimizer>(&mut self, gradients: &LinearGradients, optimizer: &mut O, prefix: &str) {
        optimizer.update(&format!("{}_weight", prefix), &mut self.weight, &gradients.weight);
        optimizer.update(&format!("{}_bias", prefix), &mut self.bias, &gradients.bias);
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizers::SGD;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_linear_layer_creation() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = LinearLayer::new(32, 1, &mut rng);
        assert_eq!(layer.weight.shape(), &[1, 32]);
        assert_eq!(layer.bias.shape(), &[1, 1]);
        assert_eq!(layer.num_parameters(), 33);
    }

    #[test]
    fn test_linear_layer_forward() {
        let layer = LinearLayer::from_weights(arr2(&[[1.0, 2.0]]), arr2(&[[0.5]]));
        let input = arr2(&[[1.0, 0.0, 2.0], [1.0, 1.0, -1.0]]); // (2, 3)

        let output = layer.forward(&input);
        assert_eq!(output, arr2(&[[3.5, 2.5, 0.5]]));
    }

    #[test]
    fn test_linear_layer_backward() {
        let layer = LinearLayer::from_weights(arr2(&[[1.0, 2.0]]), arr2(&[[0.0]]));
        let input = arr2(&[[1.0, 3.0], [2.0, 4.0]]);
        let grad_output = arr2(&[[1.0, 0.5]]);

        let (gradients, input_grad) = layer.backward(&input, &grad_output);

        assert_eq!(gradients.weight, arr2(&[[2.5, 4.0]]));
        assert_eq!(gradients.bias, arr2(&[[1.5]]));
        assert_eq!(input_grad, arr2(&[[1.0, 0.5], [2.0, 1.0]]));
    }

    #[test]
    fn test_linear_layer_with_optimizer() {
        let mut layer = LinearLayer::from_weights(arr2(&[[0.0, 0.0]]), arr2(&[[0.0]]));
        let mut optimizer = SGD::new(0.1);

        let input = arr2(&[[1.0], [2.0]]);
        let target = arr2(&[[3.0]]);
        let grad_output = &layer.forward(&input) - &target;
        let (gradients, _) = layer.backward(&input, &grad_output);
        layer.update_parameters(&gradients, &mut optimizer, "head");

        assert!((&layer.weight - &arr2(&[[0.3, 0.6]])).iter().all(|d| d.abs() < 1e-12));
        assert!((layer.bias[[0, 0]] - 0.3).abs() < 1e-12);
    }
}
