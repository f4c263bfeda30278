use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{Criterion, MaxFeatures, RandomForestParams};
use crate::error::{Result, TrialError};
use crate::models::classifier_trait::{ClassifierModel, Tunable};
use crate::models::decision_tree::{DecisionTree, TreeBuilder, TreeSettings};
use crate::models::utils::{
    check_fit_input, check_predict_input, decode_labels, encode_labels, param_bool, param_choice,
    param_seed, param_usize,
};
use crate::params::ParamValue;

const NAME: &str = "RandomForestClassifier";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedForest {
    trees: Vec<DecisionTree>,
    classes: [i32; 2],
    n_features: usize,
}

/// Bagged ensemble of CART trees with per-split feature subsampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: RandomForestParams,
    fitted: Option<FittedForest>,
}

impl RandomForestClassifier {
    pub fn new(params: RandomForestParams) -> Self {
        RandomForestClassifier {
            params,
            fitted: None,
        }
    }

    pub fn params(&self) -> &RandomForestParams {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn n_trees(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.trees.len())
    }

    fn validate_params(&self) -> Result<()> {
        let p = &self.params;
        if p.n_estimators == 0 {
            return Err(TrialError::invalid_parameter(NAME, "n_estimators", 0, "must be >= 1"));
        }
        if p.min_samples_split < 2 {
            return Err(TrialError::invalid_parameter(
                NAME,
                "min_samples_split",
                p.min_samples_split,
                "must be >= 2",
            ));
        }
        if p.min_samples_leaf == 0 {
            return Err(TrialError::invalid_parameter(NAME, "min_samples_leaf", 0, "must be >= 1"));
        }
        if p.max_depth == Some(0) {
            return Err(TrialError::invalid_parameter(NAME, "max_depth", 0, "must be >= 1 or None"));
        }
        Ok(())
    }
}

impl Default for RandomForestClassifier {
    fn default() -> Self {
        Self::new(RandomForestParams::default())
    }
}

impl ClassifierModel for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i32>) -> Result<()> {
        self.validate_params()?;
        let classes = check_fit_input(NAME, x, y)?;
        let labels = encode_labels(y, &classes);
        let n_samples = x.nrows();

        let settings = TreeSettings {
            criterion: self.params.criterion,
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: self.params.max_features.resolve(x.ncols()),
        };

        // Seeds are drawn up front so the forest does not depend on scheduling.
        let mut master = match self.params.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let seeds: Vec<u64> = (0..self.params.n_estimators).map(|_| master.gen()).collect();
        let bootstrap = self.params.bootstrap;

        let builder = TreeBuilder::new(x, &labels, settings);
        let trees: Vec<DecisionTree> = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let indices: Vec<usize> = if bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                builder.build(indices, &mut rng)
            })
            .collect();

        log::debug!(
            "{}: fitted {} trees on {} samples x {} features",
            NAME,
            trees.len(),
            n_samples,
            x.ncols()
        );

        self.fitted = Some(FittedForest {
            trees,
            classes,
            n_features: x.ncols(),
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let proba = self.predict_proba(x)?;
        let fitted = self.fitted.as_ref().ok_or_else(|| TrialError::NotFitted {
            model: NAME.to_string(),
        })?;
        Ok(decode_labels(&proba, &fitted.classes))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| TrialError::NotFitted {
            model: NAME.to_string(),
        })?;
        check_predict_input(NAME, x, fitted.n_features)?;

        let n_trees = fitted.trees.len() as f64;
        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, row) in x.rows().into_iter().enumerate() {
            let p = fitted.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees;
            proba[[i, 0]] = 1.0 - p;
            proba[[i, 1]] = p;
        }
        Ok(proba)
    }

    fn name(&self) -> &str {
        NAME
    }
}

impl Tunable for RandomForestClassifier {
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let p = &mut self.params;
        match name {
            "n_estimators" => p.n_estimators = param_usize(NAME, name, value, 1)?,
            "criterion" => {
                p.criterion = match param_choice(NAME, name, value, &["gini", "entropy"])? {
                    "gini" => Criterion::Gini,
                    _ => Criterion::Entropy,
                }
            }
            "max_depth" => {
                p.max_depth = match value {
                    ParamValue::None => None,
                    v => Some(param_usize(NAME, name, v, 1)?),
                }
            }
            "min_samples_split" => p.min_samples_split = param_usize(NAME, name, value, 2)?,
            "min_samples_leaf" => p.min_samples_leaf = param_usize(NAME, name, value, 1)?,
            "max_features" => {
                p.max_features = match value {
                    ParamValue::None => MaxFeatures::All,
                    ParamValue::Int(_) => MaxFeatures::Fixed(param_usize(NAME, name, value, 1)?),
                    ParamValue::Float(f) if *f > 0.0 && *f <= 1.0 => MaxFeatures::Fraction(*f),
                    ParamValue::Float(_) => {
                        return Err(TrialError::invalid_parameter(
                            NAME,
                            name,
                            value,
                            "fraction must lie in (0, 1]",
                        ))
                    }
                    v => match param_choice(NAME, name, v, &["sqrt", "log2"])? {
                        "sqrt" => MaxFeatures::Sqrt,
                        _ => MaxFeatures::Log2,
                    },
                }
            }
            "bootstrap" => p.bootstrap = param_bool(NAME, name, value)?,
            "random_state" => p.random_state = param_seed(NAME, name, value)?,
            _ => return Err(TrialError::invalid_parameter(NAME, name, value, "unknown parameter")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (Array2<f64>, Array1<i32>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let offset = if i % 2 == 0 { 0.0 } else { 5.0 };
            data.push(offset + (i as f64) * 0.01);
            data.push(offset - (i as f64) * 0.02);
            labels.push(i % 2);
        }
        (Array2::from_shape_vec((20, 2), data).unwrap(), Array1::from_vec(labels))
    }

    #[test]
    fn test_forest_fits_and_predicts() {
        let (x, y) = blobs();
        let mut model = RandomForestClassifier::new(RandomForestParams {
            n_estimators: 10,
            random_state: Some(1234),
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 10);

        let pred = model.predict(&x).unwrap();
        assert_eq!(pred, y);

        let proba = model.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_forest_is_reproducible_with_seed() {
        let (x, y) = blobs();
        let params = RandomForestParams {
            n_estimators: 8,
            random_state: Some(7),
            ..Default::default()
        };
        let mut a = RandomForestClassifier::new(params.clone());
        let mut b = RandomForestClassifier::new(params);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_predict_before_fit_errors() {
        let (x, _) = blobs();
        let model = RandomForestClassifier::default();
        assert!(matches!(model.predict_proba(&x), Err(TrialError::NotFitted { .. })));
    }

    #[test]
    fn test_set_param_maps_grid_values() {
        let mut model = RandomForestClassifier::default();
        model.set_param("max_depth", &ParamValue::None).unwrap();
        model.set_param("max_features", &ParamValue::from("log2")).unwrap();
        model.set_param("bootstrap", &ParamValue::Bool(false)).unwrap();
        assert_eq!(model.params().max_depth, None);
        assert_eq!(model.params().max_features, MaxFeatures::Log2);
        assert!(!model.params().bootstrap);

        model.set_param("max_features", &ParamValue::None).unwrap();
        assert_eq!(model.params().max_features, MaxFeatures::All);

        assert!(model.set_param("n_estimators", &ParamValue::Int(0)).is_err());
        assert!(matches!(
            model.set_param("n_trees", &ParamValue::Int(3)),
            Err(TrialError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_fully_grown_deep_trees_fit_on_worker_threads() {
        let n = 4000;
        let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        let y: Array1<i32> = (0..n).map(|i| (i % 2) as i32).collect();
        let mut model = RandomForestClassifier::new(RandomForestParams {
            n_estimators: 2,
            bootstrap: false,
            random_state: Some(1234),
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }
}
