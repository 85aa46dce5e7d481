use std::{cell::RefCell, fs, path::Path, rc::Rc};

use machine_learning::{
    initialization::{ParamGen, RandParamGen},
    optimization::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer},
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Result, TutorialError};

/// How to update the parameters after each batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerConfig {
    /// Adam, with `momentum` as the decay rate of the first moment estimate.
    Adam {
        learning_rate: f32,
        momentum: f32,
        beta2: f32,
        epsilon: f32,
    },
    /// Stochastic gradient descent, with classical momentum when `momentum > 0`.
    Sgd { learning_rate: f32, momentum: f32 },
}

impl OptimizerConfig {
    /// Builds the optimizer for a model with `len` parameters.
    pub fn build(&self, len: usize) -> Box<dyn Optimizer> {
        match *self {
            Self::Adam {
                learning_rate,
                momentum,
                beta2,
                epsilon,
            } => Box::new(Adam::new(len, learning_rate, momentum, beta2, epsilon)),
            Self::Sgd {
                learning_rate,
                momentum,
            } if momentum == 0.0 => Box::new(GradientDescent::new(learning_rate)),
            Self::Sgd {
                learning_rate,
                momentum,
            } => Box::new(GradientDescentWithMomentum::new(len, learning_rate, momentum)),
        }
    }

    pub fn learning_rate(&self) -> f32 {
        match *self {
            Self::Adam { learning_rate, .. } | Self::Sgd { learning_rate, .. } => learning_rate,
        }
    }

    pub fn momentum(&self) -> f32 {
        match *self {
            Self::Adam { momentum, .. } | Self::Sgd { momentum, .. } => momentum,
        }
    }

    fn validate(&self) -> Result<()> {
        let lr = self.learning_rate();
        if !(lr.is_finite() && lr > 0.0) {
            return Err(invalid(format!("learning_rate must be positive, got {lr}")));
        }

        let momentum = self.momentum();
        if !(0.0..1.0).contains(&momentum) {
            return Err(invalid(format!("momentum must be in [0, 1), got {momentum}")));
        }

        if let Self::Adam { beta2, epsilon, .. } = *self {
            if !(0.0..1.0).contains(&beta2) {
                return Err(invalid(format!("beta2 must be in [0, 1), got {beta2}")));
            }
            if !(epsilon.is_finite() && epsilon > 0.0) {
                return Err(invalid(format!("epsilon must be positive, got {epsilon}")));
            }
        }

        Ok(())
    }
}

/// How to initialize the weights of every fully connected node. Biases always start at a
/// constant, see `TrainingConfig::bias_init`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitConfig {
    /// Uniform in `[-scale, scale)`.
    Uniform { scale: f32 },
    /// Normal with zero mean.
    Normal { sigma: f32 },
    XavierUniform,
}

impl InitConfig {
    /// Builds the weight generator for a `(fan_in, fan_out)` node.
    pub fn weight_gen<R>(
        &self,
        rng: &Rc<RefCell<R>>,
        fan_in: usize,
        fan_out: usize,
    ) -> Result<Box<dyn ParamGen>>
    where
        R: Rng + 'static,
    {
        let rng = Rc::clone(rng);
        let limit = fan_in * fan_out;

        let param_gen: Box<dyn ParamGen> = match *self {
            Self::Uniform { scale } => Box::new(RandParamGen::uniform(rng, limit, -scale, scale)?),
            Self::Normal { sigma } => Box::new(RandParamGen::normal(rng, limit, 0.0, sigma)?),
            Self::XavierUniform => {
                Box::new(RandParamGen::xavier_uniform(rng, limit, fan_in, fan_out)?)
            }
        };

        Ok(param_gen)
    }

    fn validate(&self) -> Result<()> {
        match *self {
            Self::Uniform { scale } if !(scale.is_finite() && scale > 0.0) => {
                Err(invalid(format!("uniform scale must be positive, got {scale}")))
            }
            Self::Normal { sigma } if !(sigma.is_finite() && sigma > 0.0) => {
                Err(invalid(format!("normal sigma must be positive, got {sigma}")))
            }
            _ => Ok(()),
        }
    }
}

/// Everything a tutorial run needs: data generation, initialization, optimizer and loop
/// settings.
///
/// Missing fields in a JSON file fall back to the values of `TrainingConfig::default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub num_epoch: usize,
    pub batch_size: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    pub low: f32,
    pub high: f32,
    pub optimizer: OptimizerConfig,
    pub init: InitConfig,
    pub bias_init: f32,
    pub shuffle: bool,
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_epoch: 20,
            batch_size: 10,
            train_samples: 100,
            test_samples: 10,
            low: -3.0,
            high: 3.0,
            optimizer: OptimizerConfig::Adam {
                learning_rate: 0.1,
                momentum: 0.9,
                beta2: 0.999,
                epsilon: 1e-8,
            },
            init: InitConfig::Uniform { scale: 0.07 },
            bias_init: 0.0,
            shuffle: false,
            seed: None,
        }
    }
}

impl TrainingConfig {
    /// Loads and validates a `TrainingConfig` from a JSON file.
    ///
    /// # Errors
    /// Returns a `TutorialError` if the file can't be read, parsed, or holds invalid values.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parses and validates a `TrainingConfig` from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value before any data is generated.
    pub fn validate(&self) -> Result<()> {
        if self.num_epoch == 0 {
            return Err(invalid("num_epoch must be greater than 0"));
        }

        if self.batch_size <= 1 {
            return Err(TutorialError::InvalidBatchSize {
                got: self.batch_size,
                min: 2,
            });
        }

        if self.train_samples < self.batch_size {
            return Err(invalid(format!(
                "batch_size ({}) exceeds the training set size ({} samples)",
                self.batch_size, self.train_samples
            )));
        }

        if self.train_samples % self.batch_size != 0 {
            return Err(invalid(format!(
                "train_samples ({}) must be a multiple of batch_size ({}), every batch is bound \
                 to the same shape",
                self.train_samples, self.batch_size
            )));
        }

        if self.test_samples == 0 {
            return Err(invalid("test_samples must be greater than 0"));
        }

        if !(self.low.is_finite() && self.high.is_finite() && self.low < self.high) {
            return Err(invalid(format!(
                "sampling range [{}, {}] is invalid",
                self.low, self.high
            )));
        }

        if !self.bias_init.is_finite() {
            return Err(invalid("bias_init must be finite"));
        }

        self.optimizer.validate()?;
        self.init.validate()
    }

    /// Returns the seed of this run, drawing one from the OS when none was configured.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| rand::rng().random())
    }
}

fn invalid(msg: impl Into<String>) -> TutorialError {
    TutorialError::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        TrainingConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = TrainingConfig::from_json_str(r#"{ "num_epoch": 5, "seed": 3 }"#).unwrap();

        assert_eq!(config.num_epoch, 5);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.batch_size, TrainingConfig::default().batch_size);
    }

    #[test]
    fn optimizer_from_json() {
        let json = r#"{ "optimizer": { "sgd": { "learning_rate": 0.01, "momentum": 0.9 } } }"#;
        let config = TrainingConfig::from_json_str(json).unwrap();

        assert_eq!(
            config.optimizer,
            OptimizerConfig::Sgd {
                learning_rate: 0.01,
                momentum: 0.9
            }
        );
    }

    #[test]
    fn small_batch_size_is_rejected() {
        let config = TrainingConfig {
            batch_size: 1,
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(TutorialError::InvalidBatchSize { got: 1, min: 2 })
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let configs = [
            TrainingConfig {
                num_epoch: 0,
                ..Default::default()
            },
            TrainingConfig {
                low: 3.0,
                high: -3.0,
                ..Default::default()
            },
            TrainingConfig {
                train_samples: 5,
                ..Default::default()
            },
            TrainingConfig {
                train_samples: 15,
                ..Default::default()
            },
            TrainingConfig {
                optimizer: OptimizerConfig::Sgd {
                    learning_rate: 0.1,
                    momentum: 1.5,
                },
                ..Default::default()
            },
            TrainingConfig {
                init: InitConfig::Uniform { scale: 0.0 },
                ..Default::default()
            },
        ];

        for config in configs {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn training_set_must_split_into_whole_batches() {
        let config = TrainingConfig {
            train_samples: 15,
            batch_size: 10,
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(TutorialError::InvalidConfig(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        assert!(matches!(
            TrainingConfig::from_json_str("{ num_epoch: }"),
            Err(TutorialError::Json(_))
        ));
    }
}
