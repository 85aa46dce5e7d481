use std::fmt;

use log::info;
use machine_learning::arch::loss::{LossFn, Mse};

use crate::{
    Result, TutorialError,
    generator::{Batch, LinearLaw},
    module::Module,
};

/// The prediction for a single held-out sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub x: f32,
    pub y: f32,
    pub expected: f32,
    pub predicted: f32,
}

/// The outcome of running a trained module over held-out data.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub predictions: Vec<Prediction>,
    /// Mean squared error over every prediction.
    pub score: f32,
}

impl Evaluation {
    /// Mean absolute difference between the predictions of `self` and `other`, sample by sample.
    ///
    /// # Errors
    /// `ShapeMismatch` if both evaluations don't hold the same amount of predictions.
    pub fn mean_abs_diff(&self, other: &Evaluation) -> Result<f32> {
        let n = self.predictions.len();

        if other.predictions.len() != n {
            return Err(TutorialError::ShapeMismatch {
                what: "compared predictions",
                got: other.predictions.len(),
                expected: n,
            });
        }

        if n == 0 {
            return Ok(0.0);
        }

        let total: f32 = self
            .predictions
            .iter()
            .zip(&other.predictions)
            .map(|(a, b)| (a.predicted - b.predicted).abs())
            .sum();

        Ok(total / n as f32)
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.predictions {
            writeln!(
                f,
                "  ({:>6.3}, {:>6.3}) -> expected {:>7.3}, predicted {:>7.3}",
                p.x, p.y, p.expected, p.predicted
            )?;
        }

        write!(f, "  mse: {:.6}", self.score)
    }
}

/// The parameters of a trained `z = a*x + b*y + c` model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnedParams {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl LearnedParams {
    /// The largest absolute distance to the coefficients of `law`.
    pub fn max_abs_error(&self, law: &LinearLaw) -> f32 {
        [self.a - law.a, self.b - law.b, self.c - law.c]
            .into_iter()
            .map(f32::abs)
            .fold(0.0, f32::max)
    }
}

impl fmt::Display for LearnedParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a = {:.4}, b = {:.4}, c = {:.4}", self.a, self.b, self.c)
    }
}

/// Runs inference over `test_batch` and scores it against its labels.
///
/// # Errors
/// `NotInitialized` if the module was never given parameters, `ShapeMismatch` if the batch
/// doesn't have the bound number of features.
pub fn evaluate(module: &Module, test_batch: &Batch) -> Result<Evaluation> {
    let y_pred = module.predict(test_batch.inputs())?;
    let score = Mse::new().loss(y_pred.view(), test_batch.labels());

    let predictions = test_batch
        .samples()
        .zip(y_pred.column(0))
        .map(|(sample, &predicted)| Prediction {
            x: sample.x,
            y: sample.y,
            expected: sample.z,
            predicted,
        })
        .collect();

    info!("evaluated {} samples, mse {score}", test_batch.len());

    Ok(Evaluation { predictions, score })
}

/// Reads the learned coefficients of a single affine node over two inputs.
///
/// # Errors
/// `NotInitialized` if the module was never given parameters, `ShapeMismatch` if it doesn't
/// hold exactly two weights and one bias.
pub fn read_parameters(module: &Module) -> Result<LearnedParams> {
    match *module.params()? {
        [a, b, c] => Ok(LearnedParams { a, b, c }),
        ref params => Err(TutorialError::ShapeMismatch {
            what: "learned parameters",
            got: params.len(),
            expected: 3,
        }),
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{generator, graph::Graph};

    fn module(params: Vec<f32>) -> Module {
        let mut module = Module::bind(Graph::linear_regression(), (10, 2), (10, 1)).unwrap();
        module.set_params(params).unwrap();
        module
    }

    #[test]
    fn exact_params_score_zero() {
        let module = module(vec![2.0, 1.0, 0.0]);
        let test = generator::generate(&mut StdRng::seed_from_u64(0), 10, -3.0, 3.0).unwrap();

        let evaluation = evaluate(&module, &test).unwrap();

        assert_eq!(evaluation.predictions.len(), 10);
        assert!(evaluation.score < 1e-10);
        for p in &evaluation.predictions {
            assert!((p.expected - p.predicted).abs() < 1e-5);
        }
    }

    #[test]
    fn score_is_non_negative_and_matches_predictions() {
        let module = module(vec![0.0, 0.0, 1.0]);
        let test = generator::generate(&mut StdRng::seed_from_u64(1), 7, -3.0, 3.0).unwrap();

        let evaluation = evaluate(&module, &test).unwrap();
        let mse = evaluation
            .predictions
            .iter()
            .map(|p| (p.predicted - p.expected).powi(2))
            .sum::<f32>()
            / 7.0;

        assert!(evaluation.score >= 0.0);
        assert!((evaluation.score - mse).abs() < 1e-4);
    }

    #[test]
    fn parameters_are_read_in_order() {
        let params = read_parameters(&module(vec![1.5, -0.5, 0.25])).unwrap();

        assert_eq!(
            params,
            LearnedParams {
                a: 1.5,
                b: -0.5,
                c: 0.25
            }
        );
        assert_eq!(params.max_abs_error(&LinearLaw::TRUE), 1.5);
    }

    #[test]
    fn uninitialized_module_fails() {
        let module = Module::bind(Graph::linear_regression(), (10, 2), (10, 1)).unwrap();
        let test = generator::generate(&mut StdRng::seed_from_u64(0), 3, -3.0, 3.0).unwrap();

        assert!(matches!(
            evaluate(&module, &test),
            Err(TutorialError::NotInitialized(_))
        ));
        assert!(matches!(
            read_parameters(&module),
            Err(TutorialError::NotInitialized(_))
        ));
    }

    #[test]
    fn identical_evaluations_have_no_difference() {
        let module = module(vec![2.0, 1.0, 0.0]);
        let test = generator::generate(&mut StdRng::seed_from_u64(4), 5, -3.0, 3.0).unwrap();
        let evaluation = evaluate(&module, &test).unwrap();

        assert_eq!(evaluation.mean_abs_diff(&evaluation).unwrap(), 0.0);
    }

    #[test]
    fn comparing_different_sample_counts_fails() {
        let module = module(vec![2.0, 1.0, 0.0]);
        let mut rng = StdRng::seed_from_u64(4);
        let five = generator::generate(&mut rng, 5, -3.0, 3.0).unwrap();
        let three = generator::generate(&mut rng, 3, -3.0, 3.0).unwrap();

        let five = evaluate(&module, &five).unwrap();
        let three = evaluate(&module, &three).unwrap();

        assert!(matches!(
            five.mean_abs_diff(&three),
            Err(TutorialError::ShapeMismatch {
                what: "compared predictions",
                got: 3,
                expected: 5
            })
        ));
    }
}
