use linfa_nn::distance::LpDist;
use linfa_nn::{CommonNearestNeighbour, NearestNeighbour};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::config::{Algorithm, KnnParams, Weights};
use crate::error::{Result, TrialError};
use crate::models::classifier_trait::{ClassifierModel, Tunable};
use crate::models::utils::{
    check_fit_input, check_predict_input, decode_labels, encode_labels, param_choice, param_f64,
    param_usize,
};
use crate::params::ParamValue;

const NAME: &str = "KNeighborsClassifier";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedKnn {
    x: Array2<f64>,
    y: Vec<usize>,
    classes: [i32; 2],
}

/// Majority vote among the k nearest training samples.
///
/// Fitting stores the training partition; the search structure (ball tree,
/// kd tree or brute force) is built by `linfa-nn` when predicting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNeighborsClassifier {
    params: KnnParams,
    fitted: Option<FittedKnn>,
}

impl KNeighborsClassifier {
    pub fn new(params: KnnParams) -> Self {
        KNeighborsClassifier {
            params,
            fitted: None,
        }
    }

    pub fn params(&self) -> &KnnParams {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Resolve `auto` the usual way: brute force for wide data or large k,
    /// kd tree otherwise.
    fn search_structure(&self, n_samples: usize, n_features: usize) -> CommonNearestNeighbour {
        match self.params.algorithm {
            Algorithm::BallTree => CommonNearestNeighbour::BallTree,
            Algorithm::KdTree => CommonNearestNeighbour::KdTree,
            Algorithm::Brute => CommonNearestNeighbour::LinearSearch,
            Algorithm::Auto => {
                if n_features > 15 || self.params.n_neighbors >= n_samples / 2 {
                    CommonNearestNeighbour::LinearSearch
                } else {
                    CommonNearestNeighbour::KdTree
                }
            }
        }
    }

    fn validate_params(&self) -> Result<()> {
        let p = &self.params;
        if p.n_neighbors == 0 {
            return Err(TrialError::invalid_parameter(NAME, "n_neighbors", 0, "must be >= 1"));
        }
        if p.leaf_size == 0 {
            return Err(TrialError::invalid_parameter(NAME, "leaf_size", 0, "must be >= 1"));
        }
        if !(p.p >= 1.0) {
            return Err(TrialError::invalid_parameter(NAME, "p", p.p, "must be >= 1"));
        }
        Ok(())
    }
}

impl Default for KNeighborsClassifier {
    fn default() -> Self {
        Self::new(KnnParams::default())
    }
}

fn minkowski(a: ArrayView1<f64>, b: ArrayView1<f64>, p: f64) -> f64 {
    if p == 1.0 {
        a.iter().zip(b.iter()).map(|(u, v)| (u - v).abs()).sum()
    } else if p == 2.0 {
        a.iter().zip(b.iter()).map(|(u, v)| (u - v).powi(2)).sum::<f64>().sqrt()
    } else {
        a.iter()
            .zip(b.iter())
            .map(|(u, v)| (u - v).abs().powf(p))
            .sum::<f64>()
            .powf(1.0 / p)
    }
}

impl ClassifierModel for KNeighborsClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i32>) -> Result<()> {
        self.validate_params()?;
        let classes = check_fit_input(NAME, x, y)?;
        self.fitted = Some(FittedKnn {
            x: x.to_owned(),
            y: encode_labels(y, &classes),
            classes,
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
        check_predict_input(NAME, x, fitted.x.ncols())?;

        let k = self.params.n_neighbors;
        let n_fit = fitted.x.nrows();
        if k > n_fit {
            return Err(TrialError::invalid_input(format!(
                "{}: expected n_neighbors <= n_samples_fit, got n_neighbors = {} and n_samples_fit = {}",
                NAME, k, n_fit
            )));
        }

        let structure = self.search_structure(n_fit, fitted.x.ncols());
        let index = structure
            .from_batch_with_leaf_size(&fitted.x, self.params.leaf_size, LpDist::new(self.params.p))
            .map_err(|e| TrialError::invalid_input(format!("{}: cannot build {:?} index: {}", NAME, structure, e)))?;

        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, row) in x.rows().into_iter().enumerate() {
            let neighbours = index
                .k_nearest(row, k)
                .map_err(|e| TrialError::invalid_input(format!("{}: neighbour query failed: {}", NAME, e)))?;

            let mut votes = [0.0f64; 2];
            match self.params.weights {
                Weights::Uniform => {
                    for (_, idx) in &neighbours {
                        votes[fitted.y[*idx]] += 1.0;
                    }
                }
                Weights::Distance => {
                    let dists: Vec<(f64, usize)> = neighbours
                        .iter()
                        .map(|(_, idx)| (minkowski(row, fitted.x.row(*idx), self.params.p), *idx))
                        .collect();
                    // Exact matches take all the weight.
                    let exact = dists.iter().any(|(d, _)| *d == 0.0);
                    for (d, idx) in dists {
                        let w = match (exact, d == 0.0) {
                            (true, true) => 1.0,
                            (true, false) => 0.0,
                            _ => 1.0 / d,
                        };
                        votes[fitted.y[idx]] += w;
                    }
                }
            }

            let total = votes[0] + votes[1];
            proba[[i, 0]] = votes[0] / total;
            proba[[i, 1]] = votes[1] / total;
        }
        Ok(proba)
    }

    fn name(&self) -> &str {
        NAME
    }
}

impl Tunable for KNeighborsClassifier {
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let p = &mut self.params;
        match name {
            "n_neighbors" => p.n_neighbors = param_usize(NAME, name, value, 1)?,
            "weights" => {
                p.weights = match param_choice(NAME, name, value, &["uniform", "distance"])? {
                    "uniform" => Weights::Uniform,
                    _ => Weights::Distance,
                }
            }
            "algorithm" => {
                p.algorithm =
                    match param_choice(NAME, name, value, &["auto", "ball_tree", "kd_tree", "brute"])? {
                        "ball_tree" => Algorithm::BallTree,
                        "kd_tree" => Algorithm::KdTree,
                        "brute" => Algorithm::Brute,
                        _ => Algorithm::Auto,
                    }
            }
            "leaf_size" => p.leaf_size = param_usize(NAME, name, value, 1)?,
            "p" => {
                let power = param_f64(NAME, name, value, 0.0)?;
                if power < 1.0 {
                    return Err(TrialError::invalid_parameter(NAME, name, value, "must be >= 1"));
                }
                p.p = power;
            }
            _ => return Err(TrialError::invalid_parameter(NAME, name, value, "unknown parameter")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> (Array2<f64>, Array1<i32>) {
        let x = Array2::from_shape_vec((6, 1), vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]).unwrap();
        let y = Array1::from_vec(vec![0, 0, 0, 1, 1, 1]);
        (x, y)
    }

    #[test]
    fn test_uniform_vote_probabilities() {
        let (x, y) = line();
        let mut model = KNeighborsClassifier::new(KnnParams {
            n_neighbors: 3,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let query = Array2::from_shape_vec((2, 1), vec![1.0, 6.5]).unwrap();
        let proba = model.predict_proba(&query).unwrap();
        assert!((proba[[0, 0]] - 1.0).abs() < 1e-12);
        // 6.5 is nearest to 10, 2, 11 -> two positives out of three
        assert!((proba[[1, 1]] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(model.predict(&query).unwrap().to_vec(), vec![0, 1]);
    }

    #[test]
    fn test_all_search_structures_agree() {
        let (x, y) = line();
        let query = Array2::from_shape_vec((3, 1), vec![-1.0, 5.0, 13.0]).unwrap();
        let mut reference: Option<Array2<f64>> = None;
        for algorithm in ["auto", "ball_tree", "kd_tree", "brute"] {
            let mut model = KNeighborsClassifier::new(KnnParams {
                n_neighbors: 2,
                ..Default::default()
            });
            model.set_param("algorithm", &ParamValue::from(algorithm)).unwrap();
            model.fit(&x, &y).unwrap();
            let proba = model.predict_proba(&query).unwrap();
            match &reference {
                Some(r) => assert_eq!(r, &proba, "algorithm {} disagrees", algorithm),
                None => reference = Some(proba),
            }
        }
    }

    #[test]
    fn test_distance_weights_exact_match_dominates() {
        let (x, y) = line();
        let mut model = KNeighborsClassifier::new(KnnParams {
            n_neighbors: 5,
            weights: Weights::Distance,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let query = Array2::from_shape_vec((1, 1), vec![10.0]).unwrap();
        let proba = model.predict_proba(&query).unwrap();
        assert_eq!(proba[[0, 1]], 1.0);
    }

    #[test]
    fn test_too_many_neighbours_is_invalid_input() {
        let (x, y) = line();
        let mut model = KNeighborsClassifier::new(KnnParams {
            n_neighbors: 20,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(matches!(model.predict_proba(&x), Err(TrialError::InvalidInput(_))));
    }

    #[test]
    fn test_manhattan_distance() {
        let a = Array1::from_vec(vec![0.0, 0.0]);
        let b = Array1::from_vec(vec![3.0, 4.0]);
        assert_eq!(minkowski(a.view(), b.view(), 1.0), 7.0);
        assert_eq!(minkowski(a.view(), b.view(), 2.0), 5.0);
    }
}
