//! Exhaustive, cross-validated hyperparameter search.
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{Scoring, SearchConfig};
use crate::data_handling::stratified_k_fold;
use crate::error::{Result, TrialError};
use crate::models::classifier_trait::Tunable;
use crate::params::{ParamGrid, ParamSet};
use crate::stats::{accuracy_score, roc_auc_score};

/// Cross-validation summary of one candidate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub params: ParamSet,
    /// Test score on each fold; `NaN` where fitting or scoring failed.
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// 1 is best; tied means share a rank, failed candidates rank last.
    pub rank: usize,
}

/// Result of [`GridSearchCv::fit`].
#[derive(Debug, Clone)]
pub struct GridSearchOutcome<M> {
    /// The winning configuration, fitted on all data when `refit` is set.
    pub best_estimator: M,
    pub best_params: ParamSet,
    pub best_score: f64,
    pub best_index: usize,
    pub cv_results: Vec<CandidateResult>,
}

struct FoldData {
    x_train: Array2<f64>,
    y_train: Array1<i32>,
    x_test: Array2<f64>,
    y_test: Array1<i32>,
}

/// Grid search over every candidate of a [`ParamGrid`], scored by stratified
/// k-fold cross-validation.
#[derive(Debug, Clone, Default)]
pub struct GridSearchCv {
    config: SearchConfig,
}

impl GridSearchCv {
    pub fn new(config: SearchConfig) -> Self {
        GridSearchCv { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn fit<M: Tunable>(
        &self,
        base: &M,
        grid: &ParamGrid,
        x: &Array2<f64>,
        y: &Array1<i32>,
    ) -> Result<GridSearchOutcome<M>> {
        if x.nrows() != y.len() {
            return Err(TrialError::invalid_input(format!(
                "X has {} rows but y has {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if grid.is_empty() {
            return Err(TrialError::SearchFailure {
                model: base.name().to_string(),
                reason: "the parameter grid has an empty candidate list".to_string(),
            });
        }

        // Parameter errors are not a fold failure: surface them before fitting.
        let candidates: Vec<(ParamSet, M)> = grid
            .iter()
            .map(|params| -> Result<(ParamSet, M)> {
                let mut model = base.clone();
                model.set_params(&params)?;
                Ok((params, model))
            })
            .collect::<Result<_>>()?;

        let folds: Vec<FoldData> = stratified_k_fold(y, self.config.cv)?
            .into_iter()
            .map(|fold| FoldData {
                x_train: x.select(Axis(0), &fold.train_indices),
                y_train: y.select(Axis(0), &fold.train_indices),
                x_test: x.select(Axis(0), &fold.test_indices),
                y_test: y.select(Axis(0), &fold.test_indices),
            })
            .collect();

        let n_folds = folds.len();
        log::info!(
            "{}: fitting {} folds for each of {} candidates, totalling {} fits",
            base.name(),
            n_folds,
            candidates.len(),
            n_folds * candidates.len()
        );

        let scoring = self.config.scoring;
        let evaluate = || -> Vec<f64> {
            (0..candidates.len() * n_folds)
                .into_par_iter()
                .map(|job| {
                    let (c, f) = (job / n_folds, job % n_folds);
                    let (params, model) = &candidates[c];
                    match score_fold(model, &folds[f], scoring) {
                        Ok(score) => score,
                        Err(e) => {
                            log::warn!(
                                "{}: fold {} failed for {}: {}; score set to NaN",
                                model.name(),
                                f,
                                params,
                                e
                            );
                            f64::NAN
                        }
                    }
                })
                .collect()
        };
        let scores = match self.config.n_jobs {
            Some(n_jobs) => rayon::ThreadPoolBuilder::new()
                .num_threads(n_jobs)
                .build()
                .map_err(|e| TrialError::ThreadPool(e.to_string()))?
                .install(evaluate),
            None => evaluate(),
        };

        let mut cv_results: Vec<CandidateResult> = candidates
            .iter()
            .zip(scores.chunks(n_folds))
            .map(|((params, _), fold_scores)| {
                let n = fold_scores.len() as f64;
                let mean = fold_scores.iter().sum::<f64>() / n;
                let var = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
                CandidateResult {
                    params: params.clone(),
                    fold_scores: fold_scores.to_vec(),
                    mean_score: mean,
                    std_score: var.sqrt(),
                    rank: 0,
                }
            })
            .collect();
        assign_ranks(&mut cv_results);

        for (idx, result) in cv_results.iter().enumerate() {
            log::debug!(
                "{}: candidate {} {} mean={:.4} std={:.4} rank={}",
                base.name(),
                idx,
                result.params,
                result.mean_score,
                result.std_score,
                result.rank
            );
        }

        let best_index = cv_results
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.mean_score.is_nan())
            .fold(None, |best: Option<(usize, f64)>, (idx, r)| match best {
                Some((_, score)) if score >= r.mean_score => best,
                _ => Some((idx, r.mean_score)),
            })
            .map(|(idx, _)| idx)
            .ok_or_else(|| TrialError::SearchFailure {
                model: base.name().to_string(),
                reason: format!(
                    "all {} candidates failed on at least one of {} folds",
                    cv_results.len(),
                    n_folds
                ),
            })?;

        let mut best_estimator = candidates[best_index].1.clone();
        if self.config.refit {
            best_estimator.fit(x, y)?;
        }

        Ok(GridSearchOutcome {
            best_estimator,
            best_params: cv_results[best_index].params.clone(),
            best_score: cv_results[best_index].mean_score,
            best_index,
            cv_results,
        })
    }
}

fn score_fold<M: Tunable>(model: &M, fold: &FoldData, scoring: Scoring) -> Result<f64> {
    let mut model = model.clone();
    model.fit(&fold.x_train, &fold.y_train)?;
    match scoring {
        Scoring::RocAuc => {
            let proba = model.predict_proba(&fold.x_test)?;
            roc_auc_score(&fold.y_test, &proba.column(1).to_owned())
        }
        Scoring::Accuracy => accuracy_score(&fold.y_test, &model.predict(&fold.x_test)?),
    }
}

fn assign_ranks(results: &mut [CandidateResult]) {
    let means: Vec<f64> = results.iter().map(|r| r.mean_score).collect();
    let n_finite = means.iter().filter(|m| !m.is_nan()).count();
    for (result, &mean) in results.iter_mut().zip(&means) {
        result.rank = if mean.is_nan() {
            n_finite + 1
        } else {
            1 + means.iter().filter(|&&other| other > mean).count()
        };
    }
}
