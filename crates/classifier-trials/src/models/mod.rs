pub mod decision_tree;
pub mod knn;
pub mod mlp;
pub mod optim;
pub mod random_forest;
pub mod utils;

pub mod classifier;
pub mod classifier_trait;
pub mod factory;
