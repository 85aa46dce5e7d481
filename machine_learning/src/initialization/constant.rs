use std::iter;

use super::{ParamGen, param_gen::Budget};

/// Yields the same value up to a fixed amount of times, the usual choice for biases.
pub struct ConstParamGen {
    value: f32,
    budget: Budget,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen`.
    ///
    /// # Arguments
    /// * `value` - The value to yield.
    /// * `limit` - How many times it can be yielded.
    pub fn new(value: f32, limit: usize) -> Self {
        Self {
            value,
            budget: Budget::new(limit),
        }
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let n = self.budget.take(n)?;
        Some(iter::repeat_n(self.value, n).collect())
    }
}
