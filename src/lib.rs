pub mod config;
pub mod error;
pub mod evaluator;
pub mod generator;
pub mod graph;
pub mod module;
pub mod trainer;
pub mod tutorial;

pub use error::{Result, TutorialError};
