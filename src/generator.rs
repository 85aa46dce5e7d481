use machine_learning::dataset::Dataset;
use ndarray::{Array2, ArrayView2, Axis};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;

use crate::{Result, TutorialError};

/// Lower bound of the default sampling range.
pub const DEFAULT_LOW: f32 = -3.0;

/// Upper bound of the default sampling range.
pub const DEFAULT_HIGH: f32 = 3.0;

/// The law `z = a*x + b*y + c` the samples are labeled with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearLaw {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl LinearLaw {
    /// The ground truth every tutorial trains towards.
    pub const TRUE: Self = Self {
        a: 2.0,
        b: 1.0,
        c: 0.0,
    };

    pub fn eval(&self, x: f32, y: f32) -> f32 {
        self.a * x + self.b * y + self.c
    }
}

/// A single labeled sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// An ordered collection of samples, stored as an `(n, 2)` input matrix and an `(n, 1)` label
/// matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    inputs: Array2<f32>,
    labels: Array2<f32>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn inputs(&self) -> ArrayView2<'_, f32> {
        self.inputs.view()
    }

    pub fn labels(&self) -> ArrayView2<'_, f32> {
        self.labels.view()
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.inputs
            .rows()
            .into_iter()
            .zip(self.labels.iter())
            .map(|(row, &z)| Sample {
                x: row[0],
                y: row[1],
                z,
            })
    }

    /// Turns the batch into a backend dataset, ready to be wrapped in a `DataLoader`.
    pub fn to_dataset(&self) -> Result<Dataset> {
        Ok(Dataset::from_arrays(self.inputs(), self.labels())?)
    }
}

/// Draws `batch_size` samples labeled with `LinearLaw::TRUE`, see `generate_with`.
pub fn generate<R: Rng + ?Sized>(
    rng: &mut R,
    batch_size: usize,
    low: f32,
    high: f32,
) -> Result<Batch> {
    generate_with(rng, LinearLaw::TRUE, batch_size, low, high)
}

/// Draws `batch_size` independent `(x, y)` pairs uniformly from `[low, high]` and labels them
/// with `law`.
///
/// # Errors
/// `InvalidBatchSize` if `batch_size` is zero, `InvalidConfig` if the range is empty or not
/// finite.
pub fn generate_with<R: Rng + ?Sized>(
    rng: &mut R,
    law: LinearLaw,
    batch_size: usize,
    low: f32,
    high: f32,
) -> Result<Batch> {
    if batch_size == 0 {
        return Err(TutorialError::InvalidBatchSize { got: 0, min: 1 });
    }

    if !(low.is_finite() && high.is_finite() && low <= high) {
        return Err(TutorialError::InvalidConfig(format!(
            "sampling range [{low}, {high}] is invalid"
        )));
    }

    let distribution = Uniform::new_inclusive(low, high)
        .map_err(|e| TutorialError::InvalidConfig(e.to_string()))?;

    let inputs = Array2::random_using((batch_size, 2), distribution, rng);
    let labels = inputs
        .map_axis(Axis(1), |row| law.eval(row[0], row[1]))
        .insert_axis(Axis(1));

    Ok(Batch { inputs, labels })
}
