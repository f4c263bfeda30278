use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrialError};

/// Split quality measure for the forest's trees.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Gini,
    Entropy,
}

/// Number of features examined at each split.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    /// Every feature (`None` in a grid).
    All,
    Fixed(usize),
    Fraction(f64),
}

impl MaxFeatures {
    /// Resolve against the number of input features; always at least one.
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fixed(k) => k,
            MaxFeatures::Fraction(f) => (f * n_features as f64) as usize,
        };
        n.clamp(1, n_features.max(1))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub random_state: Option<u64>,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            random_state: None,
        }
    }
}

/// Neighbour vote weighting.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Weights {
    Uniform,
    Distance,
}

/// Neighbour search structure.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Auto,
    BallTree,
    KdTree,
    Brute,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct KnnParams {
    pub n_neighbors: usize,
    pub weights: Weights,
    pub algorithm: Algorithm,
    pub leaf_size: usize,
    /// Power of the Minkowski metric (1 = Manhattan, 2 = Euclidean).
    pub p: f64,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: Weights::Uniform,
            algorithm: Algorithm::Auto,
            leaf_size: 30,
            p: 2.0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Identity,
    Logistic,
    Tanh,
    Relu,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Solver {
    Lbfgs,
    Sgd,
    Adam,
}

/// Step size schedule, only used by the `sgd` solver.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LearningRate {
    Constant,
    InvScaling,
    Adaptive,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MlpParams {
    pub hidden_layer_sizes: Vec<usize>,
    pub activation: Activation,
    pub solver: Solver,
    /// L2 penalty.
    pub alpha: f64,
    /// `None` means `min(200, n_samples)`.
    pub batch_size: Option<usize>,
    pub learning_rate: LearningRate,
    pub learning_rate_init: f64,
    pub power_t: f64,
    pub max_iter: usize,
    pub shuffle: bool,
    pub random_state: Option<u64>,
    pub tol: f64,
    pub momentum: f64,
    pub nesterovs_momentum: bool,
    pub n_iter_no_change: usize,
    pub beta_1: f64,
    pub beta_2: f64,
    pub epsilon: f64,
    /// Loss evaluations allowed to the `lbfgs` solver.
    pub max_fun: usize,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: vec![100],
            activation: Activation::Relu,
            solver: Solver::Adam,
            alpha: 0.0001,
            batch_size: None,
            learning_rate: LearningRate::Constant,
            learning_rate_init: 0.001,
            power_t: 0.5,
            max_iter: 200,
            shuffle: true,
            random_state: None,
            tol: 1e-4,
            momentum: 0.9,
            nesterovs_momentum: true,
            n_iter_no_change: 10,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-8,
            max_fun: 15000,
        }
    }
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelType {
    RandomForest(RandomForestParams),
    Knn(KnnParams),
    Mlp(MlpParams),
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::RandomForest(RandomForestParams::default())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "random_forest" | "rf" => Ok(ModelType::RandomForest(RandomForestParams::default())),
            "knn" => Ok(ModelType::Knn(KnnParams::default())),
            "mlp" => Ok(ModelType::Mlp(MlpParams::default())),
            _ => Err(format!(
                "Unknown model type: {}. Valid options are: random_forest, knn, mlp",
                s
            )),
        }
    }
}

/// Metric used to rank grid-search candidates.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    RocAuc,
    Accuracy,
}

/// Settings of the cross-validated grid search.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of stratified folds.
    pub cv: usize,
    pub scoring: Scoring,
    /// Worker threads; `None` uses every available core.
    pub n_jobs: Option<usize>,
    /// Refit the best candidate on the whole training set.
    pub refit: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cv: 3,
            scoring: Scoring::RocAuc,
            n_jobs: None,
            refit: true,
        }
    }
}

/// Top-level settings for an experiment run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Fraction of rows held out for evaluation.
    pub test_size: f64,
    pub random_state: u64,
    /// Run the grid search before evaluating.
    pub tune: bool,
    pub search: SearchConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            test_size: 0.25,
            random_state: 1234,
            tune: false,
            search: SearchConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Read a JSON config; missing fields fall back to their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config: ExperimentConfig = serde_json::from_str(&raw)?;
        if !(0.0..1.0).contains(&config.test_size) || config.test_size == 0.0 {
            return Err(TrialError::invalid_input(format!(
                "test_size must lie in (0, 1), got {}",
                config.test_size
            )));
        }
        if config.search.cv < 2 {
            return Err(TrialError::invalid_input(format!(
                "search.cv must be at least 2, got {}",
                config.search.cv
            )));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_from_str() {
        assert!(matches!(
            "Random Forest".parse::<ModelType>(),
            Ok(ModelType::RandomForest(_))
        ));
        assert!(matches!("knn".parse::<ModelType>(), Ok(ModelType::Knn(_))));
        assert!(matches!("MLP".parse::<ModelType>(), Ok(ModelType::Mlp(_))));
        assert!("svm".parse::<ModelType>().is_err());
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(16), 4);
        assert_eq!(MaxFeatures::Log2.resolve(16), 4);
        assert_eq!(MaxFeatures::All.resolve(16), 16);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::Fixed(40).resolve(16), 16);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(16), 1);
    }

    #[test]
    fn test_model_type_json_is_tagged() {
        let json = r#"{"model": "knn", "n_neighbors": 7}"#;
        let model: ModelType = serde_json::from_str(json).unwrap();
        match model {
            ModelType::Knn(params) => {
                assert_eq!(params.n_neighbors, 7);
                assert_eq!(params.leaf_size, 30);
            }
            other => panic!("expected knn, got {:?}", other),
        }
    }

    #[test]
    fn test_learning_rate_names() {
        let lr: LearningRate = serde_json::from_str("\"invscaling\"").unwrap();
        assert_eq!(lr, LearningRate::InvScaling);
    }
}
