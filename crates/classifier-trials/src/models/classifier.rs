use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::classifier_trait::{ClassifierModel, Tunable};
use crate::models::knn::KNeighborsClassifier;
use crate::models::mlp::MlpClassifier;
use crate::models::random_forest::RandomForestClassifier;
use crate::params::ParamValue;

/// Any of the supported learners, as stored in the model registry.
///
/// Dispatches statically so the grid search can clone candidates freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum Classifier {
    RandomForest(RandomForestClassifier),
    Knn(KNeighborsClassifier),
    Mlp(MlpClassifier),
}

impl Classifier {
    pub fn is_fitted(&self) -> bool {
        match self {
            Classifier::RandomForest(m) => m.is_fitted(),
            Classifier::Knn(m) => m.is_fitted(),
            Classifier::Mlp(m) => m.is_fitted(),
        }
    }
}

impl ClassifierModel for Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i32>) -> Result<()> {
        match self {
            Classifier::RandomForest(m) => m.fit(x, y),
            Classifier::Knn(m) => m.fit(x, y),
            Classifier::Mlp(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        match self {
            Classifier::RandomForest(m) => m.predict(x),
            Classifier::Knn(m) => m.predict(x),
            Classifier::Mlp(m) => m.predict(x),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            Classifier::RandomForest(m) => m.predict_proba(x),
            Classifier::Knn(m) => m.predict_proba(x),
            Classifier::Mlp(m) => m.predict_proba(x),
        }
    }

    fn name(&self) -> &str {
        match self {
            Classifier::RandomForest(m) => m.name(),
            Classifier::Knn(m) => m.name(),
            Classifier::Mlp(m) => m.name(),
        }
    }
}

impl Tunable for Classifier {
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match self {
            Classifier::RandomForest(m) => m.set_param(name, value),
            Classifier::Knn(m) => m.set_param(name, value),
            Classifier::Mlp(m) => m.set_param(name, value),
        }
    }
}

impl From<RandomForestClassifier> for Classifier {
    fn from(model: RandomForestClassifier) -> Self {
        Classifier::RandomForest(model)
    }
}

impl From<KNeighborsClassifier> for Classifier {
    fn from(model: KNeighborsClassifier) -> Self {
        Classifier::Knn(model)
    }
}

impl From<MlpClassifier> for Classifier {
    fn from(model: MlpClassifier) -> Self {
        Classifier::Mlp(model)
    }
}
