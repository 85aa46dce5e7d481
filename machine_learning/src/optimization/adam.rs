use ndarray::{Array1, ArrayView1, ArrayViewMut1, Zip};

use super::{Optimizer, optimizer::check_sizes};
use crate::Result;

/// Adam: each parameter moves by a running mean of its gradient, scaled down by a running mean
/// of its squared gradient. Both estimates are bias corrected for the first steps.
#[derive(Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    step: i32,
    m: Array1<f32>,
    v: Array1<f32>,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters to keep moment estimates for.
    /// * `learning_rate` - The size of a step.
    /// * `beta1` - Decay rate of the first moment estimate.
    /// * `beta2` - Decay rate of the second moment estimate.
    /// * `epsilon` - Keeps the step finite when the second moment is close to zero.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            step: 0,
            m: Array1::zeros(len),
            v: Array1::zeros(len),
        }
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_sizes(grad.len(), params.len())?;
        check_sizes(grad.len(), self.m.len())?;

        self.step = self.step.saturating_add(1);

        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        let m_correction = 1.0 - b1.powi(self.step);
        let v_correction = 1.0 - b2.powi(self.step);
        let alpha = self.learning_rate * v_correction.sqrt() / m_correction;

        Zip::from(ArrayViewMut1::from(params))
            .and(ArrayView1::from(grad))
            .and(&mut self.m)
            .and(&mut self.v)
            .for_each(|p, &g, m, v| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                *p -= alpha * *m / (v.sqrt() + eps);
            });

        Ok(())
    }
}
