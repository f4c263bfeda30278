use crate::config::ModelType;
use crate::models::classifier::Classifier;
use crate::models::knn::KNeighborsClassifier;
use crate::models::mlp::MlpClassifier;
use crate::models::random_forest::RandomForestClassifier;

/// Build an unfitted classifier from its configuration.
pub fn build_model(model_type: ModelType) -> Classifier {
    match model_type {
        ModelType::RandomForest(params) => RandomForestClassifier::new(params).into(),
        ModelType::Knn(params) => KNeighborsClassifier::new(params).into(),
        ModelType::Mlp(params) => MlpClassifier::new(params).into(),
    }
}
