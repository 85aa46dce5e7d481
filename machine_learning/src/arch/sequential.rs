use ndarray::{Array2, ArrayView2};

use super::{Model, layers::Dense, loss::LossFn};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The parameters of every layer are laid out back to back in a single flat slice, in the same
/// order as the layers.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Dense>,
    output: Array2<f32>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Dense>,
    {
        Self {
            layers: layers.into_iter().collect(),
            output: Array2::zeros((0, 0)),
        }
    }

    /// Returns the layers of this model.
    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();

        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        self.check_len("model parameters", params.len())?;

        let mut out = x.to_owned();
        let mut offset = 0;

        for layer in self.layers.iter_mut() {
            let size = layer.size();
            out = layer
                .forward(&params[offset..offset + size], out.view())?
                .to_owned();
            offset += size;
        }

        self.output = out;
        Ok(self.output.view())
    }

    fn backward<L>(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        y: ArrayView2<f32>,
        loss_fn: &L,
    ) -> Result<f32>
    where
        L: LossFn,
    {
        self.check_len("model parameters", params.len())?;
        self.check_len("model gradient", grad.len())?;

        if y.dim() != self.output.dim() {
            return Err(MlErr::SizeMismatch {
                what: "expected output rows",
                got: y.nrows(),
                expected: self.output.nrows(),
            });
        }

        let loss = loss_fn.loss(self.output.view(), y);
        let mut d = loss_fn.loss_prime(self.output.view(), y);
        let mut end = params.len();

        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer
                .backward(&params[start..end], &mut grad[start..end], d.view())?
                .to_owned();
            end = start;
        }

        Ok(loss)
    }
}
