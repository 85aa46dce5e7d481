use std::{env, process::ExitCode};

use anyhow::{Context, Result};
use linear_regression::{config::TrainingConfig, tutorial};
use log::info;

const USAGE: &str = "usage: linear-regression <run-example-1|run-example-2|run-example-3> [CONFIG.json]

  run-example-1   train with the high level fit and print the results
  run-example-2   train with the low level forward/backward/update loop
  run-example-3   train with both loops from the same seed and compare them

The SEED environment variable overrides the seed of the configuration.";

#[derive(Debug, Clone, Copy)]
enum Command {
    Example1,
    Example2,
    Example3,
}

impl Command {
    fn parse(arg: &str) -> Option<Self> {
        match arg {
            "run-example-1" => Some(Self::Example1),
            "run-example-2" => Some(Self::Example2),
            "run-example-3" => Some(Self::Example3),
            _ => None,
        }
    }
}

fn main() -> Result<ExitCode> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(command) = args.next().as_deref().and_then(Command::parse) else {
        eprintln!("{USAGE}");
        return Ok(ExitCode::from(2));
    };

    let mut config = match args.next() {
        Some(path) => TrainingConfig::from_json_file(&path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => TrainingConfig::default(),
    };

    if let Ok(seed) = env::var("SEED") {
        config.seed = Some(seed.parse().context("SEED must be an unsigned integer")?);
    }

    info!("running {command:?} with {config:?}");

    match command {
        Command::Example1 => {
            tutorial::run_example_1(&config)?;
        }
        Command::Example2 => {
            tutorial::run_example_2(&config)?;
        }
        Command::Example3 => {
            tutorial::run_example_3(&config)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
