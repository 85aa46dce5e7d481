use ndarray::ArrayView2;

use super::loss::LossFn;
use crate::{Result, optimization::Optimizer};

/// A trainable model whose parameters live outside of it.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Makes a forward pass, caching whatever the backward pass needs.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data, one sample per row.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>>;

    /// Computes the gradient of the loss function with respect to the parameters of the model
    /// for the last forward pass.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - A buffer for writing the computed gradient, it gets overwritten.
    /// * `y` - The expected output of the last forward pass.
    /// * `loss_fn` - The loss function.
    ///
    /// # Returns
    /// The loss of the last forward pass.
    fn backward<L>(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        y: ArrayView2<f32>,
        loss_fn: &L,
    ) -> Result<f32>
    where
        L: LossFn;

    /// Runs a forward and backward pass over every batch, **updating `params`** after each one
    /// according to the optimization algorithm.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - A buffer for writing the computed gradient on each batch pass.
    /// * `loss_fn` - The loss function.
    /// * `optimizer` - The optimizer that dictates how to update the parameters.
    /// * `batches` - The batches of data.
    ///
    /// # Returns
    /// The epoch loss.
    fn backprop<'a, L, O, I>(
        &mut self,
        params: &mut [f32],
        grad: &mut [f32],
        loss_fn: &L,
        optimizer: &mut O,
        batches: I,
    ) -> Result<f32>
    where
        L: LossFn,
        O: Optimizer + ?Sized,
        I: Iterator<Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>)>,
    {
        // NOTE: the epoch loss is the mean of the batch losses, each one measured before its
        // own update.
        let mut total_loss = 0.0;
        let mut num_batches = 0;

        for (x, y) in batches {
            self.forward(params, x)?;
            total_loss += self.backward(params, grad, y, loss_fn)?;
            optimizer.update_params(grad, params)?;
            num_batches += 1;
        }

        Ok(total_loss / num_batches.max(1) as f32)
    }
}
