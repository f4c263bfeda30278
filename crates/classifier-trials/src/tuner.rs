//! Grid-search tuning of every model that has a search space.
use std::collections::BTreeMap;

use ndarray::{Array1, Array2};

use crate::config::SearchConfig;
use crate::error::{Result, TrialError};
use crate::model_map::ModelMap;
use crate::models::classifier_trait::Tunable;
use crate::params::ParamGrid;
use crate::report::Reporter;
use crate::search::GridSearchCv;

/// Replace each model that has an entry in `param_grids` with the best
/// estimator found by cross-validated grid search; models without a grid are
/// passed through untouched. Every input model appears in the result, in
/// input order.
pub fn tune_models<M: Tunable>(
    models: ModelMap<M>,
    param_grids: &BTreeMap<String, ParamGrid>,
    x_train: &Array2<f64>,
    y_train: &Array1<i32>,
    config: &SearchConfig,
    reporter: &dyn Reporter,
) -> Result<ModelMap<M>> {
    let search = GridSearchCv::new(config.clone());
    let mut best_models = ModelMap::new();

    for (name, model) in models {
        let Some(grid) = param_grids.get(&name) else {
            log::info!("No parameter grid for {}, keeping it unchanged", name);
            best_models.insert(name, model);
            continue;
        };

        reporter.tuning_started(&name);
        let outcome = search
            .fit(&model, grid, x_train, y_train)
            .map_err(|e| match e {
                TrialError::SearchFailure { reason, .. } => TrialError::SearchFailure {
                    model: name.clone(),
                    reason,
                },
                other => other,
            })?;
        reporter.best_params(&name, &outcome.best_params, outcome.best_score);
        best_models.insert(name, outcome.best_estimator);
    }

    Ok(best_models)
}
