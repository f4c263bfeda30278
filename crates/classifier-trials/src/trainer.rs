//! Fit (unless pre-loaded) and evaluate every model on a held-out partition.
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrialError};
use crate::model_map::ModelMap;
use crate::models::classifier_trait::ClassifierModel;
use crate::report::Reporter;
use crate::stats::{accuracy_score, classification_report, custom_roc_auc};

/// Test-set performance of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub accuracy: f64,
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub auc: f64,
}

fn check_partition(x: &Array2<f64>, y: &Array1<i32>, which: &str) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(TrialError::invalid_input(format!(
            "X_{} has {} rows but y_{} has {} labels",
            which,
            x.nrows(),
            which,
            y.len()
        )));
    }
    Ok(())
}

/// Train and evaluate each model in order.
///
/// With `from_loaded` the models are used as given, so previously fitted or
/// deserialised models can be scored without retraining; otherwise each one
/// is fitted on the training partition first. Every model's classification
/// report goes to `reporter`. Processing stops at the first error.
///
/// # Returns
///
/// Per-model results and the (possibly newly fitted) models, both keyed and
/// ordered like `models`.
pub fn train_and_evaluate<M: ClassifierModel>(
    models: ModelMap<M>,
    x_train: &Array2<f64>,
    x_test: &Array2<f64>,
    y_train: &Array1<i32>,
    y_test: &Array1<i32>,
    from_loaded: bool,
    reporter: &dyn Reporter,
) -> Result<(ModelMap<EvaluationResult>, ModelMap<M>)> {
    if !from_loaded {
        check_partition(x_train, y_train, "train")?;
    }
    check_partition(x_test, y_test, "test")?;

    let mut results = ModelMap::new();
    let mut trained_models = ModelMap::new();

    for (name, mut model) in models {
        if from_loaded {
            log::info!("Evaluating pre-loaded model {}", name);
        } else {
            log::info!("Training {} on {} samples", name, x_train.nrows());
            model.fit(x_train, y_train)?;
        }

        let y_pred = model.predict(x_test)?;
        let accuracy = accuracy_score(y_test, &y_pred)?;
        reporter.classification_report(&name, &classification_report(y_test, &y_pred)?);

        let proba = model.predict_proba(x_test)?;
        if proba.ncols() != 2 {
            return Err(TrialError::invalid_input(format!(
                "{}: expected 2 probability columns, got {}",
                name,
                proba.ncols()
            )));
        }
        let (fpr, tpr, auc) = custom_roc_auc(y_test, &proba.column(1).to_owned())?;
        log::info!("{}: accuracy = {:.4}, AUC = {:.4}", name, accuracy, auc);

        results.insert(
            name.clone(),
            EvaluationResult {
                accuracy,
                fpr,
                tpr,
                auc,
            },
        );
        trained_models.insert(name, model);
    }

    Ok((results, trained_models))
}
