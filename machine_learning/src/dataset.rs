use std::{num::NonZeroUsize, ops::Range};

use ndarray::{Array2, ArrayView2, Axis, s};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// An in-memory supervised dataset.
///
/// Every row holds `x_size` input features followed by `y_size` expected outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    data: Array2<f32>,
    x_size: usize,
    y_size: usize,
}

impl Dataset {
    /// Creates a new `Dataset` from a flat, row-major buffer.
    ///
    /// # Arguments
    /// * `data` - The samples, one row of `x_size + y_size` values each.
    /// * `x_size` - The amount of input features per sample.
    /// * `y_size` - The amount of expected outputs per sample.
    ///
    /// # Returns
    /// A new `Dataset` or an error if `data` can't be split in whole rows.
    pub fn new(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        if x_size == 0 || y_size == 0 {
            return Err(MlErr::InvalidParam(
                "x_size and y_size must be greater than 0".into(),
            ));
        }

        let row_size = x_size + y_size;

        if data.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        if data.len() % row_size != 0 {
            return Err(MlErr::InvalidParam(format!(
                "dataset length ({}) is not divisible by x_size + y_size ({row_size})",
                data.len()
            )));
        }

        let data = Array2::from_shape_vec((data.len() / row_size, row_size), data)
            .map_err(|e| MlErr::InvalidParam(e.to_string()))?;

        Ok(Self {
            data,
            x_size,
            y_size,
        })
    }

    /// Creates a new `Dataset` out of an input matrix and an expected output matrix.
    ///
    /// # Arguments
    /// * `x` - The inputs, one sample per row.
    /// * `y` - The expected outputs, one sample per row.
    ///
    /// # Returns
    /// A new `Dataset` or an error if the amount of rows differ.
    pub fn from_arrays(x: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "dataset label rows",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        let mut data = Vec::with_capacity(x.len() + y.len());

        for (x_row, y_row) in x.rows().into_iter().zip(y.rows()) {
            data.extend(x_row.iter());
            data.extend(y_row.iter());
        }

        Self::new(data, x.ncols(), y.ncols())
    }

    /// Returns the amount of samples.
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn x_size(&self) -> usize {
        self.x_size
    }

    pub fn y_size(&self) -> usize {
        self.y_size
    }

    /// Returns the inputs and expected outputs of every sample.
    pub fn xy(&self) -> (ArrayView2<'_, f32>, ArrayView2<'_, f32>) {
        self.rows(0..self.len())
    }

    /// Returns the inputs and expected outputs for the samples in `range`.
    ///
    /// # Panics
    /// If `range` goes past the end of the dataset.
    pub fn rows(&self, range: Range<usize>) -> (ArrayView2<'_, f32>, ArrayView2<'_, f32>) {
        self.data
            .slice(s![range, ..])
            .split_at(Axis(1), self.x_size)
    }

    /// Shuffles the order of the samples.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut indices: Vec<_> = (0..self.len()).collect();
        indices.shuffle(rng);
        self.data = self.data.select(Axis(0), &indices);
    }

    /// Iterates over the dataset in order, `batch_size` samples at a time. The last batch holds
    /// the remaining samples and may be smaller.
    pub fn batches(&self, batch_size: NonZeroUsize) -> Batches<'_> {
        Batches {
            dataset: self,
            batch_size: batch_size.get(),
            cursor: 0,
        }
    }
}

/// An iterator over a dataset's batches, see `Dataset::batches`.
pub struct Batches<'a> {
    dataset: &'a Dataset,
    batch_size: usize,
    cursor: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.dataset.len() {
            return None;
        }

        let end = (self.cursor + self.batch_size).min(self.dataset.len());
        let batch = self.dataset.rows(self.cursor..end);
        self.cursor = end;
        Some(batch)
    }
}
