mod common;

use std::sync::Mutex;

use classifier_trials::models::classifier_trait::ClassifierModel;
use classifier_trials::params::ParamSet;
use classifier_trials::report::{NullReporter, Reporter};
use classifier_trials::stats::ClassificationReport;
use classifier_trials::{define_models, train_and_evaluate, ModelMap, Result, TrialError};
use ndarray::{Array1, Array2};

#[derive(Default)]
struct Recorder {
    lines: Mutex<Vec<String>>,
}

impl Reporter for Recorder {
    fn classification_report(&self, model: &str, report: &ClassificationReport) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("report {} {:.3}", model, report.accuracy));
    }

    fn tuning_started(&self, model: &str) {
        self.lines.lock().unwrap().push(format!("tuning {}", model));
    }

    fn best_params(&self, model: &str, params: &ParamSet, _score: f64) {
        self.lines.lock().unwrap().push(format!("best {} {}", model, params));
    }
}

/// Predicts the majority training label and has no probability estimates.
#[derive(Debug, Clone, PartialEq)]
struct Majority {
    label: Option<i32>,
}

impl ClassifierModel for Majority {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i32>) -> Result<()> {
        let ones = y.iter().filter(|&&v| v == 1).count();
        self.label = Some(if 2 * ones >= y.len() { 1 } else { 0 });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let label = self.label.ok_or_else(|| TrialError::NotFitted {
            model: "Majority".to_string(),
        })?;
        Ok(Array1::from_elem(x.nrows(), label))
    }

    fn name(&self) -> &str {
        "Majority"
    }
}

#[test]
fn test_fit_and_evaluate_registry_models() {
    common::init_logger();
    let data = common::split(120, 7);
    let recorder = Recorder::default();

    let (results, trained) = train_and_evaluate(
        define_models(),
        &data.x_train,
        &data.x_test,
        &data.y_train,
        &data.y_test,
        false,
        &recorder,
    )
    .unwrap();

    assert_eq!(results.names().collect::<Vec<_>>(), vec!["Random Forest", "KNN", "MLP"]);
    assert_eq!(trained.names().collect::<Vec<_>>(), vec!["Random Forest", "KNN", "MLP"]);
    assert!(trained.iter().all(|(_, m)| m.is_fitted()));

    for (name, result) in results.iter() {
        assert!((0.0..=1.0).contains(&result.accuracy), "{}", name);
        assert!((0.0..=1.0).contains(&result.auc), "{}", name);
        assert_eq!(result.fpr.len(), result.tpr.len());
        assert_eq!((result.fpr[0], result.tpr[0]), (0.0, 0.0));
        assert_eq!(result.fpr.last(), Some(&1.0));
        assert_eq!(result.tpr.last(), Some(&1.0));
        // the first two features separate the classes well
        assert!(result.auc > 0.6, "{} auc {}", name, result.auc);
    }

    let lines = recorder.lines.lock().unwrap();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("report Random Forest"));
    assert!(lines[2].starts_with("report MLP"));
}

#[test]
fn test_from_loaded_keeps_models_unchanged() {
    common::init_logger();
    let data = common::split(80, 11);
    let (first_results, fitted) = train_and_evaluate(
        define_models(),
        &data.x_train,
        &data.x_test,
        &data.y_train,
        &data.y_test,
        false,
        &NullReporter,
    )
    .unwrap();

    let snapshot = fitted.clone();
    // the training partition is ignored when nothing is fitted
    let empty_x = Array2::<f64>::zeros((0, 4));
    let empty_y = Array1::<i32>::zeros(0);
    let (results, returned) = train_and_evaluate(
        fitted,
        &empty_x,
        &data.x_test,
        &empty_y,
        &data.y_test,
        true,
        &NullReporter,
    )
    .unwrap();

    assert_eq!(returned, snapshot);
    assert_eq!(results, first_results);
}

#[test]
fn test_model_without_probabilities_is_unsupported() {
    let data = common::split(40, 3);
    let mut models = ModelMap::new();
    models.insert("Majority", Majority { label: None });

    let err = train_and_evaluate(
        models,
        &data.x_train,
        &data.x_test,
        &data.y_train,
        &data.y_test,
        false,
        &NullReporter,
    )
    .unwrap_err();
    assert!(matches!(err, TrialError::UnsupportedCapability { ref model } if model == "Majority"));
}

#[test]
fn test_misaligned_partitions_are_invalid_input() {
    let data = common::split(40, 5);
    let short_y = data.y_train.slice(ndarray::s![1..]).to_owned();

    let err = train_and_evaluate(
        define_models(),
        &data.x_train,
        &data.x_test,
        &short_y,
        &data.y_test,
        false,
        &NullReporter,
    )
    .unwrap_err();
    assert!(matches!(err, TrialError::InvalidInput(_)));
}

#[test]
fn test_loaded_but_unfitted_model_reports_not_fitted() {
    let data = common::split(40, 5);
    let err = train_and_evaluate(
        define_models(),
        &data.x_train,
        &data.x_test,
        &data.y_train,
        &data.y_test,
        true,
        &NullReporter,
    )
    .unwrap_err();
    assert!(matches!(err, TrialError::NotFitted { .. }));
}
