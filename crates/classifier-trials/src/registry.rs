//! The fixed experiment line-up: three classifiers and their search spaces.
use std::collections::BTreeMap;

use crate::config::{KnnParams, MlpParams, ModelType, RandomForestParams};
use crate::model_map::ModelMap;
use crate::models::classifier::Classifier;
use crate::models::factory::build_model;
use crate::params::ParamGrid;

/// Seed shared by the stochastic learners.
pub const RANDOM_STATE: u64 = 1234;

/// Fresh, untrained instances of every model under study.
pub fn define_models() -> ModelMap<Classifier> {
    let mut models = ModelMap::new();
    models.insert(
        "Random Forest",
        build_model(ModelType::RandomForest(RandomForestParams {
            random_state: Some(RANDOM_STATE),
            ..Default::default()
        })),
    );
    models.insert("KNN", build_model(ModelType::Knn(KnnParams::default())));
    models.insert(
        "MLP",
        build_model(ModelType::Mlp(MlpParams {
            random_state: Some(RANDOM_STATE),
            ..Default::default()
        })),
    );
    models
}

/// Hyperparameter search space for each model, keyed like [`define_models`].
pub fn define_param_grid() -> BTreeMap<String, ParamGrid> {
    let mut grids = BTreeMap::new();

    grids.insert(
        "Random Forest".to_string(),
        ParamGrid::new()
            .with("n_estimators", [10i64, 50, 100, 200])
            .with("max_depth", [Some(5i64), Some(10), Some(20), None])
            .with("max_features", [Some("sqrt"), Some("log2"), None])
            .with("min_samples_split", [2i64, 5, 10])
            .with("min_samples_leaf", [1i64, 2, 4])
            .with("bootstrap", [true, false]),
    );

    grids.insert(
        "KNN".to_string(),
        ParamGrid::new()
            .with("n_neighbors", [3i64, 5, 10, 15, 20])
            .with("weights", ["uniform", "distance"])
            .with("algorithm", ["auto", "ball_tree", "kd_tree", "brute"])
            .with("leaf_size", [10i64, 30, 50])
            .with("p", [1i64, 2]),
    );

    grids.insert(
        "MLP".to_string(),
        ParamGrid::new()
            .with(
                "hidden_layer_sizes",
                [vec![50usize], vec![100], vec![100, 50], vec![150, 100, 50]],
            )
            .with("solver", ["adam", "sgd", "lbfgs"])
            .with("activation", ["relu", "tanh", "logistic"])
            .with("alpha", [0.0001f64, 0.001, 0.01, 0.1])
            .with("learning_rate", ["constant", "invscaling", "adaptive"])
            .with("max_iter", [500i64, 1000, 2000]),
    );

    grids
}
