use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::{ParamGen, Result, param_gen::Budget};

/// Draws a bounded amount of values from `distribution`.
///
/// The random number generator is shared so every layer of a model draws from the same seeded
/// stream, in layer order.
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: Rc<RefCell<R>>,
    distribution: D,
    budget: Budget,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    pub fn new(rng: Rc<RefCell<R>>, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            budget: Budget::new(limit),
        }
    }
}

impl<R: Rng> RandParamGen<R, Uniform<f32>> {
    /// Uniform in `[low, high)`.
    ///
    /// # Errors
    /// If `low >= high` or either bound isn't finite.
    pub fn uniform(rng: Rc<RefCell<R>>, limit: usize, low: f32, high: f32) -> Result<Self> {
        Ok(Self::new(rng, Uniform::new(low, high)?, limit))
    }

    /// Uniform in `[-r, r)` with `r = sqrt(6 / (fan_in + fan_out))`.
    pub fn xavier_uniform(
        rng: Rc<RefCell<R>>,
        limit: usize,
        fan_in: usize,
        fan_out: usize,
    ) -> Result<Self> {
        let r = (6.0 / (fan_in + fan_out) as f32).sqrt();
        Self::uniform(rng, limit, -r, r)
    }
}

impl<R: Rng> RandParamGen<R, Normal<f32>> {
    /// Normal with the given `mean` and `std_dev`.
    ///
    /// # Errors
    /// If `std_dev` isn't finite.
    pub fn normal(rng: Rc<RefCell<R>>, limit: usize, mean: f32, std_dev: f32) -> Result<Self> {
        Ok(Self::new(rng, Normal::new(mean, std_dev)?, limit))
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let n = self.budget.take(n)?;
        let mut rng = self.rng.borrow_mut();

        Some((&self.distribution).sample_iter(&mut *rng).take(n).collect())
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn seeded_rng() -> Rc<RefCell<StdRng>> {
        Rc::new(RefCell::new(StdRng::seed_from_u64(42)))
    }

    #[test]
    fn uniform_stays_in_range() {
        let mut param_gen = RandParamGen::uniform(seeded_rng(), 100, -0.07, 0.07).unwrap();
        let sample = param_gen.sample(100).unwrap();

        assert_eq!(sample.len(), 100);
        assert!(sample.iter().all(|p| (-0.07..=0.07).contains(p)));
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn xavier_range_shrinks_with_fan() {
        let mut param_gen = RandParamGen::xavier_uniform(seeded_rng(), 50, 4, 2).unwrap();
        let r = 1.0;

        assert!(param_gen.sample(50).unwrap().iter().all(|p| (-r..r).contains(p)));
    }

    #[test]
    fn shared_rng_continues_the_stream() {
        let rng = seeded_rng();
        let mut a = RandParamGen::normal(Rc::clone(&rng), 3, 0.0, 1.0).unwrap();
        let mut b = RandParamGen::normal(rng, 3, 0.0, 1.0).unwrap();

        let mut c = RandParamGen::normal(seeded_rng(), 6, 0.0, 1.0).unwrap();

        let mut chained = a.sample(3).unwrap();
        chained.extend(b.sample(3).unwrap());
        assert_eq!(chained, c.sample(6).unwrap());
    }

    #[test]
    fn invalid_range() {
        assert!(RandParamGen::uniform(seeded_rng(), 1, 1.0, -1.0).is_err());
        assert!(RandParamGen::normal(seeded_rng(), 1, 0.0, f32::NAN).is_err());
    }
}
