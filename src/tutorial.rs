use std::{cell::RefCell, fmt, num::NonZeroUsize, rc::Rc};

use log::info;
use machine_learning::dataloader::DataLoader;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    Result, TutorialError,
    config::TrainingConfig,
    evaluator::{self, Evaluation, LearnedParams},
    generator::{self, LinearLaw},
    graph::Graph,
    module::Module,
    trainer::Trainer,
};

/// Which of the two training loops drives a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingLoop {
    /// `Trainer::fit`.
    Fit,
    /// `Trainer::fit_manual`.
    Manual,
}

impl fmt::Display for TrainingLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fit => write!(f, "high level fit"),
            Self::Manual => write!(f, "low level loop"),
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub training_loop: TrainingLoop,
    pub seed: u64,
    /// Mean training loss of every epoch.
    pub losses: Vec<f32>,
    pub evaluation: Evaluation,
    pub params: LearnedParams,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let law = LinearLaw::TRUE;

        writeln!(f, "{} (seed {})", self.training_loop, self.seed)?;
        if let Some(loss) = self.losses.last() {
            writeln!(f, "  final training loss: {loss:.6}")?;
        }
        writeln!(f, "{}", self.evaluation)?;
        writeln!(f, "  learned: {}", self.params)?;
        write!(
            f,
            "  true:    a = {:.4}, b = {:.4}, c = {:.4}",
            law.a, law.b, law.c
        )
    }
}

/// Both loops trained from the same seed and data.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub fit: Report,
    pub manual: Report,
    /// Mean absolute difference of the held-out predictions of both runs.
    pub mean_abs_diff: f32,
}

/// Generates the data, binds and initializes the tutorial graph, trains it with
/// `training_loop` and evaluates it on fresh samples.
///
/// Every random draw comes from a single generator seeded by `config`, so two runs with the
/// same seed see the same data and start from the same parameters.
pub fn run(config: &TrainingConfig, training_loop: TrainingLoop) -> Result<Report> {
    config.validate()?;

    let seed = config.resolve_seed();
    let mut rng = StdRng::seed_from_u64(seed);
    info!("running the {training_loop} with seed {seed}");

    let train = generator::generate(&mut rng, config.train_samples, config.low, config.high)?;
    let test = generator::generate(&mut rng, config.test_samples, config.low, config.high)?;

    let batch_size = NonZeroUsize::new(config.batch_size).ok_or(TutorialError::InvalidBatchSize {
        got: config.batch_size,
        min: 2,
    })?;
    let mut loader = DataLoader::new(train.to_dataset()?, batch_size);

    let mut module = Module::bind(
        Graph::linear_regression(),
        (config.batch_size, 2),
        (config.batch_size, 1),
    )?;

    let mut trainer = Trainer::new(config, StdRng::seed_from_u64(rng.random()));

    let rng = Rc::new(RefCell::new(rng));
    module.init_params(&config.init, config.bias_init, &rng)?;
    module.init_optimizer(&config.optimizer);

    let losses = match training_loop {
        TrainingLoop::Fit => trainer.fit(&mut module, &mut loader)?,
        TrainingLoop::Manual => trainer.fit_manual(&mut module, &mut loader)?,
    };

    let evaluation = evaluator::evaluate(&module, &test)?;
    let params = evaluator::read_parameters(&module)?;

    Ok(Report {
        training_loop,
        seed,
        losses,
        evaluation,
        params,
    })
}

/// Trains with both loops from the same seed and compares their held-out predictions.
pub fn compare(config: &TrainingConfig) -> Result<Comparison> {
    let config = TrainingConfig {
        seed: Some(config.resolve_seed()),
        ..config.clone()
    };

    let fit = run(&config, TrainingLoop::Fit)?;
    let manual = run(&config, TrainingLoop::Manual)?;
    let mean_abs_diff = fit.evaluation.mean_abs_diff(&manual.evaluation)?;

    info!("both loops differ by {mean_abs_diff} on average");

    Ok(Comparison {
        fit,
        manual,
        mean_abs_diff,
    })
}

/// Trains with `Trainer::fit` and prints the predictions and learned parameters.
pub fn run_example_1(config: &TrainingConfig) -> Result<Report> {
    let report = run(config, TrainingLoop::Fit)?;
    println!("{report}");
    Ok(report)
}

/// Trains with the explicit forward, backward and update loop and prints the same report.
pub fn run_example_2(config: &TrainingConfig) -> Result<Report> {
    let report = run(config, TrainingLoop::Manual)?;
    println!("{report}");
    Ok(report)
}

/// Trains with both loops and prints both reports along with how far apart they ended up.
pub fn run_example_3(config: &TrainingConfig) -> Result<Comparison> {
    let comparison = compare(config)?;

    println!("{}", comparison.fit);
    println!();
    println!("{}", comparison.manual);
    println!();
    println!(
        "mean absolute difference between both loops: {:.6}",
        comparison.mean_abs_diff
    );

    Ok(comparison)
}
