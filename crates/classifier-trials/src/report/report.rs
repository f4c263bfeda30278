//! Sinks for the human-readable progress of training and tuning.
use crate::params::ParamSet;
use crate::stats::ClassificationReport;

/// Receives the per-model reports produced by the trainer and the tuner.
///
/// Keeping output behind this trait lets callers print, log or discard it.
pub trait Reporter: Sync {
    /// A model finished evaluation on the test partition.
    fn classification_report(&self, model: &str, report: &ClassificationReport);

    /// Grid search is about to run for a model.
    fn tuning_started(&self, model: &str);

    /// Grid search picked `params` with mean cross-validation `score`.
    fn best_params(&self, model: &str, params: &ParamSet, score: f64);
}

/// Line printed above a model's classification report.
pub fn report_header(model: &str) -> String {
    format!("--- {} ---", model)
}

/// Prints reports to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn classification_report(&self, model: &str, report: &ClassificationReport) {
        println!("{}", report_header(model));
        println!("{}", report);
    }

    fn tuning_started(&self, model: &str) {
        println!("Tuning {}...", model);
    }

    fn best_params(&self, model: &str, params: &ParamSet, _score: f64) {
        println!("Best parameters for {}: {}", model, params);
    }
}

/// Emits reports as `log` records at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn classification_report(&self, model: &str, report: &ClassificationReport) {
        log::info!("{}\n{}", report_header(model), report);
    }

    fn tuning_started(&self, model: &str) {
        log::info!("Tuning {}...", model);
    }

    fn best_params(&self, model: &str, params: &ParamSet, score: f64) {
        log::info!("Best parameters for {}: {} (mean CV score {:.4})", model, params, score);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn classification_report(&self, _model: &str, _report: &ClassificationReport) {}

    fn tuning_started(&self, _model: &str) {}

    fn best_params(&self, _model: &str, _params: &ParamSet, _score: f64) {}
}
