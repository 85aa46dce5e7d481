use ndarray::{Array1, ArrayView1, ArrayViewMut1, Zip};

use super::{Optimizer, optimizer::check_sizes};
use crate::Result;

/// Gradient descent with classical momentum: `v = μv + g`, `p -= ηv`.
#[derive(Debug)]
pub struct GradientDescentWithMomentum {
    learning_rate: f32,
    momentum: f32,
    velocity: Array1<f32>,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters to keep a velocity for.
    /// * `learning_rate` - The size of a step.
    /// * `momentum` - How much of the previous velocity is kept on each step.
    pub fn new(len: usize, learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: Array1::zeros(len),
        }
    }
}

impl Optimizer for GradientDescentWithMomentum {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_sizes(grad.len(), params.len())?;
        check_sizes(grad.len(), self.velocity.len())?;

        let grad = ArrayView1::from(grad);
        self.velocity *= self.momentum;
        self.velocity += &grad;

        Zip::from(ArrayViewMut1::from(params))
            .and(&self.velocity)
            .for_each(|p, &v| *p -= self.learning_rate * v);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_accumulates() {
        let mut optimizer = GradientDescentWithMomentum::new(1, 1.0, 0.5);
        let mut params = [0.0];

        optimizer.update_params(&[1.0], &mut params).unwrap();
        assert_eq!(params, [-1.0]);

        optimizer.update_params(&[1.0], &mut params).unwrap();
        assert_eq!(params, [-2.5]);
    }

    #[test]
    fn state_size_mismatch() {
        let mut optimizer = GradientDescentWithMomentum::new(3, 1.0, 0.5);
        let mut params = [0.0];

        assert!(optimizer.update_params(&[1.0], &mut params).is_err());
    }
}
