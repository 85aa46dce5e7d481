use std::{cell::RefCell, rc::Rc};

use log::{debug, info};
use machine_learning::{
    arch::{
        Model, Sequential,
        layers::Dense,
        loss::Mse,
    },
    dataloader::DataLoader,
    initialization::{ChainedParamGen, ConstParamGen, ParamGen},
    optimization::Optimizer,
};
use ndarray::{Array2, ArrayView2};
use rand::Rng;

use crate::{
    Result, TutorialError,
    config::{InitConfig, OptimizerConfig},
    graph::Graph,
};

/// A graph bound to concrete data and label shapes.
///
/// Binding turns the declared nodes into a `Sequential` of `Dense` layers and allocates the
/// training state: the flat parameter vector, the gradient buffer and the optimizer. Parameters
/// and optimizer start out missing, `init_params` and `init_optimizer` must be called before
/// any training step.
pub struct Module {
    graph: Graph,
    model: Sequential,
    data_shape: (usize, usize),
    label_shape: (usize, usize),
    params: Option<Vec<f32>>,
    grad: Vec<f32>,
    optimizer: Option<Box<dyn Optimizer>>,
    loss_fn: Mse,
}

impl Module {
    /// Binds `graph` to the shapes of the data it will be trained on.
    ///
    /// # Arguments
    /// * `graph` - The declared graph.
    /// * `data_shape` - The `(batch_size, features)` of every input batch.
    /// * `label_shape` - The `(batch_size, outputs)` of every label batch.
    ///
    /// # Errors
    /// `InvalidBatchSize` if the batch size is below 2, `ShapeMismatch` if the label shape
    /// disagrees with the data shape or the graph output, `InvalidConfig` for a malformed graph.
    pub fn bind(
        graph: Graph,
        data_shape: (usize, usize),
        label_shape: (usize, usize),
    ) -> Result<Self> {
        let (batch_size, features) = data_shape;

        if batch_size <= 1 {
            return Err(TutorialError::InvalidBatchSize {
                got: batch_size,
                min: 2,
            });
        }

        if features == 0 {
            return Err(TutorialError::InvalidConfig(format!(
                "input '{}' has no features",
                graph.input_name()
            )));
        }

        if label_shape.0 != batch_size {
            return Err(TutorialError::ShapeMismatch {
                what: "label rows",
                got: label_shape.0,
                expected: batch_size,
            });
        }

        let output_size = graph.output_size()?;
        if label_shape.1 != output_size {
            return Err(TutorialError::ShapeMismatch {
                what: "label width",
                got: label_shape.1,
                expected: output_size,
            });
        }

        let mut fan_in = features;
        let layers: Vec<_> = graph
            .layers()
            .map(|(_, num_hidden)| {
                let layer = Dense::new((fan_in, num_hidden));
                fan_in = num_hidden;
                layer
            })
            .collect();

        let model = Sequential::new(layers);
        let size = model.size();

        info!("bound {graph} to data {data_shape:?}, label {label_shape:?}, {size} parameters");

        Ok(Self {
            graph,
            model,
            data_shape,
            label_shape,
            params: None,
            grad: vec![0.0; size],
            optimizer: None,
            loss_fn: Mse::new(),
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn data_shape(&self) -> (usize, usize) {
        self.data_shape
    }

    pub fn label_shape(&self) -> (usize, usize) {
        self.label_shape
    }

    /// Returns the amount of learnable parameters.
    pub fn size(&self) -> usize {
        self.model.size()
    }

    /// Initializes the parameters of every layer: its weights from `init` and its biases set to
    /// `bias`.
    ///
    /// # Arguments
    /// * `init` - How to sample the weights.
    /// * `bias` - The value every bias starts at.
    /// * `rng` - The shared random number generator.
    pub fn init_params<R>(
        &mut self,
        init: &InitConfig,
        bias: f32,
        rng: &Rc<RefCell<R>>,
    ) -> Result<()>
    where
        R: Rng + 'static,
    {
        let mut params = Vec::with_capacity(self.size());

        for layer in self.model.layers() {
            let (fan_in, fan_out) = layer.dim();
            let weight_gen = init.weight_gen(rng, fan_in, fan_out)?;
            let bias_gen: Box<dyn ParamGen> = Box::new(ConstParamGen::new(bias, fan_out));

            let mut param_gen = ChainedParamGen::new(vec![weight_gen, bias_gen]);
            let layer_params = param_gen.sample_exact(layer.size()).ok_or_else(|| {
                TutorialError::InvalidConfig("parameter generator got exhausted".into())
            })?;

            params.extend(layer_params);
        }

        debug!(size = params.len(); "parameters initialized");
        self.params = Some(params);
        Ok(())
    }

    /// Overrides the parameters, laid out layer by layer as the weights in row-major order
    /// followed by the biases.
    pub fn set_params(&mut self, params: Vec<f32>) -> Result<()> {
        if params.len() != self.size() {
            return Err(TutorialError::ShapeMismatch {
                what: "parameters",
                got: params.len(),
                expected: self.size(),
            });
        }

        self.params = Some(params);
        Ok(())
    }

    /// Creates fresh optimizer state for this module's parameters.
    pub fn init_optimizer(&mut self, config: &OptimizerConfig) {
        self.optimizer = Some(config.build(self.size()));
    }

    /// Returns the current parameters.
    pub fn params(&self) -> Result<&[f32]> {
        self.params
            .as_deref()
            .ok_or(TutorialError::NotInitialized("parameters"))
    }

    /// Checks both the parameters and the optimizer are ready for training.
    pub fn check_initialized(&self) -> Result<()> {
        self.params()?;

        if self.optimizer.is_none() {
            return Err(TutorialError::NotInitialized("optimizer"));
        }

        Ok(())
    }

    /// Checks every batch `loader` yields has the bound shapes, the last one included.
    pub fn check_loader(&self, loader: &DataLoader) -> Result<()> {
        let dataset = loader.dataset();
        let batch_size = self.data_shape.0;
        let last_batch = match dataset.len() % batch_size {
            0 => batch_size,
            rows => rows,
        };

        let checks = [
            ("input features", dataset.x_size(), self.data_shape.1),
            ("label width", dataset.y_size(), self.label_shape.1),
            ("batch size", loader.batch_size(), batch_size),
            ("last batch rows", last_batch, batch_size),
        ];

        for (what, got, expected) in checks {
            if got != expected {
                return Err(TutorialError::ShapeMismatch {
                    what,
                    got,
                    expected,
                });
            }
        }

        Ok(())
    }

    /// Makes a forward pass over `x`, keeping what `backward` needs.
    pub fn forward(&mut self, x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        let params = self
            .params
            .as_deref()
            .ok_or(TutorialError::NotInitialized("parameters"))?;

        Ok(self.model.forward(params, x)?)
    }

    /// Computes the gradient of the loss of the last forward pass against `y`.
    ///
    /// # Returns
    /// The loss of the last forward pass.
    pub fn backward(&mut self, y: ArrayView2<f32>) -> Result<f32> {
        let params = self
            .params
            .as_deref()
            .ok_or(TutorialError::NotInitialized("parameters"))?;

        Ok(self.model.backward(params, &mut self.grad, y, &self.loss_fn)?)
    }

    /// Applies the last computed gradient to the parameters.
    pub fn update(&mut self) -> Result<()> {
        let params = self
            .params
            .as_deref_mut()
            .ok_or(TutorialError::NotInitialized("parameters"))?;
        let optimizer = self
            .optimizer
            .as_deref_mut()
            .ok_or(TutorialError::NotInitialized("optimizer"))?;

        Ok(optimizer.update_params(&self.grad, params)?)
    }

    /// Runs forward, backward and update over every batch.
    ///
    /// # Returns
    /// The mean of the batch losses.
    pub fn fit_epoch<'a, I>(&mut self, batches: I) -> Result<f32>
    where
        I: Iterator<Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>)>,
    {
        let params = self
            .params
            .as_deref_mut()
            .ok_or(TutorialError::NotInitialized("parameters"))?;
        let optimizer = self
            .optimizer
            .as_deref_mut()
            .ok_or(TutorialError::NotInitialized("optimizer"))?;

        Ok(self
            .model
            .backprop(params, &mut self.grad, &self.loss_fn, optimizer, batches)?)
    }

    /// Runs inference on `x` without touching the parameters or the cached training state.
    pub fn predict(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let params = self.params()?;

        if x.ncols() != self.data_shape.1 {
            return Err(TutorialError::ShapeMismatch {
                what: "input features",
                got: x.ncols(),
                expected: self.data_shape.1,
            });
        }

        let mut model = self.model.clone();
        let y_pred = model.forward(params, x)?.to_owned();
        Ok(y_pred)
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::arch::loss::LossFn;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn bound(batch_size: usize) -> Module {
        Module::bind(Graph::linear_regression(), (batch_size, 2), (batch_size, 1)).unwrap()
    }

    #[test]
    fn bind_allocates_one_weight_per_feature_and_a_bias() {
        let module = bound(4);

        assert_eq!(module.size(), 3);
        assert!(matches!(
            module.params(),
            Err(TutorialError::NotInitialized("parameters"))
        ));
    }

    #[test]
    fn bind_rejects_bad_shapes() {
        let graph = Graph::linear_regression;

        assert!(matches!(
            Module::bind(graph(), (1, 2), (1, 1)),
            Err(TutorialError::InvalidBatchSize { got: 1, min: 2 })
        ));
        assert!(matches!(
            Module::bind(graph(), (4, 2), (3, 1)),
            Err(TutorialError::ShapeMismatch {
                what: "label rows",
                ..
            })
        ));
        assert!(matches!(
            Module::bind(graph(), (4, 2), (4, 2)),
            Err(TutorialError::ShapeMismatch {
                what: "label width",
                ..
            })
        ));
    }

    #[test]
    fn init_params_follows_layout() {
        let mut module = bound(4);
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(0)));

        module
            .init_params(&InitConfig::Uniform { scale: 0.07 }, 0.5, &rng)
            .unwrap();

        let params = module.params().unwrap();
        assert_eq!(params.len(), 3);
        assert!(params[..2].iter().all(|w| (-0.07..=0.07).contains(w)));
        assert_eq!(params[2], 0.5);
    }

    #[test]
    fn training_step_needs_an_optimizer() {
        let mut module = bound(2);
        module.set_params(vec![0.0; 3]).unwrap();

        assert!(matches!(
            module.check_initialized(),
            Err(TutorialError::NotInitialized("optimizer"))
        ));
        assert!(module.update().is_err());
    }

    #[test]
    fn manual_step_moves_towards_the_label() {
        let mut module = bound(2);
        module.set_params(vec![0.0; 3]).unwrap();
        module.init_optimizer(&OptimizerConfig::Sgd {
            learning_rate: 0.1,
            momentum: 0.0,
        });

        let x = array![[1.0, 0.0], [0.0, 1.0]];
        let y = array![[2.0], [1.0]];

        module.forward(x.view()).unwrap();
        let before = module.backward(y.view()).unwrap();
        module.update().unwrap();

        assert_eq!(before, 2.5);
        let y_pred = module.predict(x.view()).unwrap();
        assert!(Mse.loss(y_pred.view(), y.view()) < before);
    }

    #[test]
    fn predict_leaves_params_untouched() {
        let mut module = bound(2);
        module.set_params(vec![2.0, 1.0, 0.0]).unwrap();

        let y_pred = module.predict(array![[1.0, 1.0], [2.0, -1.0], [0.0, 0.0]].view()).unwrap();

        assert_eq!(y_pred, array![[3.0], [3.0], [0.0]]);
        assert_eq!(module.params().unwrap(), [2.0, 1.0, 0.0]);
        assert!(module.predict(array![[1.0]].view()).is_err());
    }
}
