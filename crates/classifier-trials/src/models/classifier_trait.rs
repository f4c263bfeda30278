use ndarray::{Array1, Array2};

use crate::error::{Result, TrialError};
use crate::params::{ParamSet, ParamValue};

/// Capability set every classifier used by the trainer must provide.
///
/// Labels are binary `i32` values; column 1 of `predict_proba` refers to the
/// greater of the two classes seen during `fit`.
pub trait ClassifierModel {
    /// Fit the model in place, replacing any previous fit.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i32>) -> Result<()>;

    /// Predict class labels.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>>;

    /// Predict per-class probabilities, shape `(n_samples, 2)`.
    ///
    /// Models that cannot produce probabilities keep this default.
    fn predict_proba(&self, _x: &Array2<f64>) -> Result<Array2<f64>> {
        Err(TrialError::UnsupportedCapability {
            model: self.name().to_string(),
        })
    }

    /// Human readable model kind.
    fn name(&self) -> &str {
        "classifier"
    }
}

/// A classifier whose hyperparameters can be set by name, as grid search
/// requires. Setting a parameter discards nothing; the next `fit` uses it.
pub trait Tunable: ClassifierModel + Clone + Send + Sync {
    /// Apply one hyperparameter; unknown names or ill-typed values fail with
    /// `InvalidParameter`.
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;

    /// Apply every entry of a candidate configuration.
    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params.iter() {
            self.set_param(name, value)?;
        }
        Ok(())
    }
}
