use ndarray::{linalg, prelude::*};

use crate::{MlErr, Result};

/// A fully connected (affine) layer: `z = x · w + b`.
///
/// The layer doesn't own its parameters, they're handed over on every pass as a flat slice laid
/// out as the `(n, m)` weight matrix in row-major order followed by the `m` biases.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,

    // Backward metadata
    d: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of input features and output units.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize)) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            x: zeros.clone(),
            z: zeros.clone(),
            d: zeros,
        }
    }

    /// Returns the amount of input features and output units of this layer.
    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Computes `x · w + b` for every row of `x`, caching `x` for the backward pass.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `x` - The input, one sample per row.
    ///
    /// # Returns
    /// The layer's output or an error if the shapes don't line up.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense layer input features",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let shape = (x.nrows(), self.dim.1);

        if self.z.dim() != shape {
            self.z = Array2::zeros(shape);
        }

        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut self.z);
        self.z += &b;

        self.x = x.to_owned();
        Ok(self.z.view())
    }

    /// Writes the gradient of this layer's parameters into `grad` and returns the delta for the
    /// previous layer.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `grad` - This layer's slice of the gradient buffer, it gets overwritten.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayView2<f32>,
    ) -> Result<ArrayView2<'_, f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "dense layer output delta rows",
                got: d.nrows(),
                expected: self.z.nrows(),
            });
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        let shape = (d.nrows(), self.dim.0);

        if self.d.dim() != shape {
            self.d = Array2::zeros(shape);
        }

        linalg::general_mat_mul(1.0, &d, &w.t(), 0.0, &mut self.d);
        Ok(self.d.view())
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense layer gradient", grad.len())?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw).map_err(|_| self.shape_err())?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw).map_err(|_| self.shape_err())?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense layer parameters", params.len())?;

        let w_size = self.size - self.dim.1;
        let weights =
            ArrayView2::from_shape(self.dim, &params[..w_size]).map_err(|_| self.shape_err())?;
        let biases =
            ArrayView1::from_shape(self.dim.1, &params[w_size..]).map_err(|_| self.shape_err())?;
        Ok((weights, biases))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }

    fn shape_err(&self) -> MlErr {
        MlErr::InvalidParam(format!("cannot view parameters as a {:?} layer", self.dim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_computes_affine_map() {
        let mut dense = Dense::new((2, 1));
        let params = [2.0, 1.0, 0.5];
        let x = array![[1.0, 1.0], [3.0, -2.0]];

        let z = dense.forward(&params, x.view()).unwrap();
        assert_eq!(z, array![[3.5], [4.5]]);
    }

    #[test]
    fn backward_computes_parameter_gradient() {
        let mut dense = Dense::new((2, 1));
        let params = [0.0, 0.0, 0.0];
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let mut grad = [0.0; 3];

        dense.forward(&params, x.view()).unwrap();
        let d = array![[1.0], [-1.0]];
        let dx = dense.backward(&params, &mut grad, d.view()).unwrap();

        assert_eq!(grad, [-2.0, -2.0, 0.0]);
        assert_eq!(dx, array![[0.0, 0.0], [0.0, 0.0]]);
    }

    #[test]
    fn wrong_input_width_fails() {
        let mut dense = Dense::new((2, 1));
        let x = array![[1.0, 2.0, 3.0]];

        let err = dense.forward(&[0.0; 3], x.view()).unwrap_err();
        assert_eq!(
            err,
            MlErr::SizeMismatch {
                what: "dense layer input features",
                got: 3,
                expected: 2
            }
        );
    }

    #[test]
    fn wrong_params_len_fails() {
        let mut dense = Dense::new((2, 1));
        let x = array![[1.0, 2.0]];

        assert!(dense.forward(&[0.0; 2], x.view()).is_err());
    }
}
