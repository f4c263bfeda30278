//! classifier-trials: train, evaluate and tune a fixed set of binary classifiers.
//!
//! The crate provides a model registry (random forest, k-nearest neighbours,
//! multilayer perceptron) with matching hyperparameter grids, a trainer that
//! fits and scores each model on a held-out partition, and a tuner that runs
//! a cross-validated grid search per model. Metrics, ROC plotting and JSON
//! persistence round out a single-process experiment driver.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod io;
pub mod model_map;
pub mod models;
pub mod params;
pub mod registry;
pub mod report;
pub mod search;
pub mod stats;
pub mod trainer;
pub mod tuner;

pub use error::{Result, TrialError};
pub use model_map::ModelMap;
pub use registry::{define_models, define_param_grid};
pub use trainer::{train_and_evaluate, EvaluationResult};
pub use tuner::tune_models;
