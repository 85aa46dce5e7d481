use log::{debug, info, warn};
use machine_learning::dataloader::DataLoader;
use rand::rngs::StdRng;

use crate::{Result, config::TrainingConfig, module::Module};

/// Drives a bound module through its epochs.
///
/// Both loops present the batches in the same order and apply the same update after each one,
/// so starting from the same parameters and data they end up at the same place.
pub struct Trainer {
    num_epoch: usize,
    shuffle: bool,
    rng: StdRng,
}

impl Trainer {
    /// Creates a new `Trainer`.
    ///
    /// # Arguments
    /// * `config` - Supplies the epoch count and whether to shuffle between epochs.
    /// * `rng` - Only consumed when shuffling.
    pub fn new(config: &TrainingConfig, rng: StdRng) -> Self {
        Self {
            num_epoch: config.num_epoch,
            shuffle: config.shuffle,
            rng,
        }
    }

    pub fn num_epoch(&self) -> usize {
        self.num_epoch
    }

    /// The high level loop: one call per epoch to `Module::fit_epoch`.
    ///
    /// # Returns
    /// The mean training loss of every epoch.
    ///
    /// # Errors
    /// Fails before the first step if the loader doesn't match the bound shapes or the module
    /// isn't initialized.
    pub fn fit(&mut self, module: &mut Module, loader: &mut DataLoader) -> Result<Vec<f32>> {
        self.check(module, loader)?;
        info!("fitting for {} epochs over {} batches", self.num_epoch, loader.num_batches());

        let mut losses = Vec::with_capacity(self.num_epoch);

        for epoch in 0..self.num_epoch {
            self.rewind(loader);

            let loss = module.fit_epoch(loader.batches())?;
            self.record(epoch, loss, &mut losses);
        }

        info!("fit finished, last epoch loss {:?}", losses.last());
        Ok(losses)
    }

    /// The low level loop: the batches are pulled from the loader's cursor and each one goes
    /// through an explicit forward, backward and update.
    ///
    /// # Returns
    /// The mean training loss of every epoch.
    pub fn fit_manual(&mut self, module: &mut Module, loader: &mut DataLoader) -> Result<Vec<f32>> {
        self.check(module, loader)?;
        info!(
            "manually fitting for {} epochs over {} batches",
            self.num_epoch,
            loader.num_batches()
        );

        let mut losses = Vec::with_capacity(self.num_epoch);

        for epoch in 0..self.num_epoch {
            self.rewind(loader);

            let mut total_loss = 0.0;
            let mut num_batches = 0;

            while let Some((x, y)) = loader.next_batch() {
                module.forward(x)?;
                total_loss += module.backward(y)?;
                module.update()?;
                num_batches += 1;
            }

            let loss = total_loss / num_batches.max(1) as f32;
            self.record(epoch, loss, &mut losses);
        }

        info!("manual fit finished, last epoch loss {:?}", losses.last());
        Ok(losses)
    }

    fn check(&self, module: &Module, loader: &DataLoader) -> Result<()> {
        module.check_loader(loader)?;
        module.check_initialized()
    }

    fn rewind(&mut self, loader: &mut DataLoader) {
        if self.shuffle {
            loader.shuffle(&mut self.rng);
        } else {
            loader.reset();
        }
    }

    fn record(&self, epoch: usize, loss: f32, losses: &mut Vec<f32>) {
        debug!(epoch = epoch, loss = loss; "epoch finished");

        if !loss.is_finite() {
            warn!(
                "epoch {epoch} finished with a non finite loss ({loss}), try a lower learning rate"
            );
        }

        losses.push(loss);
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, num::NonZeroUsize, rc::Rc};

    use rand::SeedableRng;

    use super::*;
    use crate::{TutorialError, generator, graph::Graph};

    fn setup(config: &TrainingConfig, seed: u64) -> (Module, DataLoader) {
        let mut rng = StdRng::seed_from_u64(seed);
        let batch =
            generator::generate(&mut rng, config.train_samples, config.low, config.high).unwrap();
        let batch_size = NonZeroUsize::new(config.batch_size).unwrap();
        let loader = DataLoader::new(batch.to_dataset().unwrap(), batch_size);

        let mut module = Module::bind(
            Graph::linear_regression(),
            (config.batch_size, 2),
            (config.batch_size, 1),
        )
        .unwrap();

        let rng = Rc::new(RefCell::new(rng));
        module.init_params(&config.init, config.bias_init, &rng).unwrap();
        module.init_optimizer(&config.optimizer);

        (module, loader)
    }

    #[test]
    fn fit_returns_one_loss_per_epoch() {
        let config = TrainingConfig::default();
        let (mut module, mut loader) = setup(&config, 0);
        let mut trainer = Trainer::new(&config, StdRng::seed_from_u64(0));

        let losses = trainer.fit(&mut module, &mut loader).unwrap();

        assert_eq!(losses.len(), config.num_epoch);
        assert!(losses.iter().all(|l| l.is_finite() && *l >= 0.0));
        assert!(losses[losses.len() - 1] < losses[0]);
    }

    #[test]
    fn both_loops_take_the_same_steps() {
        let config = TrainingConfig {
            num_epoch: 3,
            ..Default::default()
        };

        let (mut high, mut high_loader) = setup(&config, 5);
        let (mut low, mut low_loader) = setup(&config, 5);

        let high_losses = Trainer::new(&config, StdRng::seed_from_u64(1))
            .fit(&mut high, &mut high_loader)
            .unwrap();
        let low_losses = Trainer::new(&config, StdRng::seed_from_u64(1))
            .fit_manual(&mut low, &mut low_loader)
            .unwrap();

        assert_eq!(high_losses, low_losses);
        assert_eq!(high.params().unwrap(), low.params().unwrap());
    }

    #[test]
    fn loader_shape_is_checked_before_training() {
        let config = TrainingConfig::default();
        let (_, mut loader) = setup(&config, 0);
        let mut module = Module::bind(Graph::linear_regression(), (5, 2), (5, 1)).unwrap();
        module.set_params(vec![0.0; 3]).unwrap();
        module.init_optimizer(&config.optimizer);

        let result = Trainer::new(&config, StdRng::seed_from_u64(0)).fit(&mut module, &mut loader);

        assert!(matches!(
            result,
            Err(TutorialError::ShapeMismatch {
                what: "batch size",
                got: 10,
                expected: 5
            })
        ));
        assert_eq!(module.params().unwrap(), [0.0; 3]);
    }

    #[test]
    fn short_last_batch_fails_before_training() {
        let config = TrainingConfig {
            train_samples: 15,
            ..Default::default()
        };
        let (mut module, mut loader) = setup(&config, 0);
        let before = module.params().unwrap().to_vec();

        let result =
            Trainer::new(&config, StdRng::seed_from_u64(0)).fit_manual(&mut module, &mut loader);

        assert!(matches!(
            result,
            Err(TutorialError::ShapeMismatch {
                what: "last batch rows",
                got: 5,
                expected: 10
            })
        ));
        assert_eq!(module.params().unwrap(), before);
    }

    #[test]
    fn uninitialized_module_fails() {
        let config = TrainingConfig::default();
        let (_, mut loader) = setup(&config, 0);
        let mut module = Module::bind(Graph::linear_regression(), (10, 2), (10, 1)).unwrap();

        let result =
            Trainer::new(&config, StdRng::seed_from_u64(0)).fit_manual(&mut module, &mut loader);

        assert!(matches!(result, Err(TutorialError::NotInitialized(_))));
    }

    #[test]
    fn shuffling_still_converges() {
        let config = TrainingConfig {
            shuffle: true,
            ..Default::default()
        };
        let (mut module, mut loader) = setup(&config, 3);

        Trainer::new(&config, StdRng::seed_from_u64(3))
            .fit(&mut module, &mut loader)
            .unwrap();

        let params = module.params().unwrap();
        assert!((params[0] - 2.0).abs() < 0.5, "{params:?}");
        assert!((params[1] - 1.0).abs() < 0.5, "{params:?}");
        assert!(params[2].abs() < 0.5, "{params:?}");
    }
}
