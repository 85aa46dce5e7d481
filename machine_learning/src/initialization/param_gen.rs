/// A `ParamGen` generates values for the initial state of the model's parameters.
pub trait ParamGen {
    /// Should sample at most `n` parameters.
    ///
    /// # Arguments
    /// * `n` - The upper limit of samples to generate.
    ///
    /// # Returns
    /// `None` once the generator is exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;

    /// Samples exactly `n` parameters, pulling from the generator as many times as needed.
    ///
    /// # Returns
    /// `None` if the generator got exhausted before yielding `n` values.
    fn sample_exact(&mut self, n: usize) -> Option<Vec<f32>> {
        let mut params = Vec::with_capacity(n);

        while params.len() < n {
            match self.sample(n - params.len()) {
                Some(sample) if !sample.is_empty() => params.extend(sample),
                _ => return None,
            }
        }

        Some(params)
    }
}

/// How many values a bounded generator has left to yield.
#[derive(Debug, Clone, Copy)]
pub(super) struct Budget(usize);

impl Budget {
    pub(super) fn new(limit: usize) -> Self {
        Self(limit)
    }

    /// Reserves up to `n` values, `None` if nothing is left.
    pub(super) fn take(&mut self, n: usize) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }

        let n = n.min(self.0);
        self.0 -= n;
        Some(n)
    }
}
