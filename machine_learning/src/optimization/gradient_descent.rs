use ndarray::{ArrayView1, ArrayViewMut1};

use super::{Optimizer, optimizer::check_sizes};
use crate::Result;

/// Plain gradient descent: `p -= ηg`.
#[derive(Debug)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_sizes(grad.len(), params.len())?;

        ArrayViewMut1::from(params).scaled_add(-self.learning_rate, &ArrayView1::from(grad));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_against_the_gradient() {
        let mut optimizer = GradientDescent::new(0.5);
        let mut params = [1.0, 2.0];

        optimizer.update_params(&[2.0, -2.0], &mut params).unwrap();
        assert_eq!(params, [0.0, 3.0]);
    }

    #[test]
    fn size_mismatch() {
        let mut optimizer = GradientDescent::new(0.5);
        let mut params = [1.0, 2.0];

        assert!(optimizer.update_params(&[1.0], &mut params).is_err());
    }
}
