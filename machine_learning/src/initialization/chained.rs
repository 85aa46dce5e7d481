use std::collections::VecDeque;

use super::ParamGen;

/// Pulls from a queue of generators, moving on to the next one as soon as the current one falls
/// short.
///
/// Used to lay out a layer's parameters: a random generator sized for the weights followed by a
/// constant one sized for the biases.
pub struct ChainedParamGen {
    queue: VecDeque<Box<dyn ParamGen>>,
}

impl ChainedParamGen {
    /// Creates a new `ChainedParamGen`.
    ///
    /// # Arguments
    /// * `param_gens` - The generators in the order they should be drained.
    pub fn new(param_gens: Vec<Box<dyn ParamGen>>) -> Self {
        Self {
            queue: param_gens.into(),
        }
    }
}

impl ParamGen for ChainedParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let mut params = Vec::with_capacity(n);

        while params.len() < n {
            let Some(current) = self.queue.front_mut() else {
                break;
            };

            let wanted = n - params.len();
            match current.sample(wanted) {
                Some(sample) if sample.len() == wanted => params.extend(sample),
                Some(sample) => {
                    params.extend(sample);
                    self.queue.pop_front();
                }
                None => {
                    self.queue.pop_front();
                }
            }
        }

        (!params.is_empty()).then_some(params)
    }
}
