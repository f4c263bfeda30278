//! Dataset partitioning: stratified k-fold splits for cross-validation and a
//! seeded stratified train/test split.
use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Result, TrialError};

/// One cross-validation fold.
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

fn class_indices(y: &Array1<i32>) -> BTreeMap<i32, Vec<usize>> {
    let mut by_class: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in y.iter().enumerate() {
        by_class.entry(label).or_default().push(idx);
    }
    by_class
}

/// Stratified k-fold without shuffling.
///
/// Samples of each class (in sorted class order) are dealt round-robin over
/// the folds, continuing where the previous class stopped, so every fold
/// keeps roughly the class balance of `y`.
pub fn stratified_k_fold(y: &Array1<i32>, n_splits: usize) -> Result<Vec<Fold>> {
    if n_splits < 2 {
        return Err(TrialError::invalid_input(format!(
            "k-fold cross-validation requires at least 2 splits, got {}",
            n_splits
        )));
    }
    if y.len() < n_splits {
        return Err(TrialError::invalid_input(format!(
            "cannot have n_splits = {} greater than the number of samples: n_samples = {}",
            n_splits,
            y.len()
        )));
    }

    let by_class = class_indices(y);
    if let Some(smallest) = by_class.values().map(Vec::len).min() {
        if smallest < n_splits {
            log::warn!(
                "the least populated class in y has only {} members, which is less than n_splits = {}",
                smallest,
                n_splits
            );
        }
    }

    let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
    let mut offset = 0;
    for indices in by_class.values() {
        for (i, &idx) in indices.iter().enumerate() {
            folds[(offset + i) % n_splits].push(idx);
        }
        offset += indices.len();
    }
    for fold in folds.iter_mut() {
        fold.sort_unstable();
    }

    let splits = (0..n_splits)
        .map(|fold_idx| {
            let mut train_indices: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold_idx)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();
            train_indices.sort_unstable();
            Fold {
                train_indices,
                test_indices: folds[fold_idx].clone(),
                fold_idx,
            }
        })
        .collect();
    Ok(splits)
}

/// Train and test partitions of a dataset.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<i32>,
    pub y_test: Array1<i32>,
}

/// Shuffle each class with `random_state` and hold out `test_size` of it.
///
/// Every class with at least two samples contributes at least one sample to
/// each side.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<i32>,
    test_size: f64,
    random_state: u64,
) -> Result<TrainTestSplit> {
    if x.nrows() != y.len() {
        return Err(TrialError::invalid_input(format!(
            "X has {} rows but y has {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(TrialError::invalid_input(format!(
            "test_size must lie in (0, 1), got {}",
            test_size
        )));
    }

    let mut rng = StdRng::seed_from_u64(random_state);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for (_, mut indices) in class_indices(y) {
        indices.shuffle(&mut rng);
        let n = indices.len();
        let mut n_test = (test_size * n as f64).round() as usize;
        if n >= 2 {
            n_test = n_test.clamp(1, n - 1);
        }
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();

    log::debug!("train/test split: {} train rows, {} test rows", train.len(), test.len());

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train),
        x_test: x.select(Axis(0), &test),
        y_train: y.select(Axis(0), &train),
        y_test: y.select(Axis(0), &test),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stratified_folds_partition_and_balance() {
        let y = Array1::from_vec(vec![0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1]);
        let folds = stratified_k_fold(&y, 3).unwrap();
        assert_eq!(folds.len(), 3);

        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test_indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..12).collect::<Vec<_>>());

        for fold in &folds {
            assert_eq!(fold.test_indices.len(), 4);
            assert_eq!(fold.train_indices.len(), 8);
            let positives = fold.test_indices.iter().filter(|&&i| y[i] == 1).count();
            assert_eq!(positives, 2);
            assert!(fold.test_indices.iter().all(|i| !fold.train_indices.contains(i)));
        }
    }

    #[test]
    fn test_too_few_samples_for_folds() {
        let y = Array1::from_vec(vec![0, 1]);
        assert!(matches!(stratified_k_fold(&y, 3), Err(TrialError::InvalidInput(_))));
        assert!(stratified_k_fold(&y, 1).is_err());
    }

    #[test]
    fn test_train_test_split_is_seeded_and_stratified() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| (i * 2 + j) as f64);
        let y: Array1<i32> = (0..20).map(|i| i32::from(i % 4 == 0)).collect();

        let a = train_test_split(&x, &y, 0.25, 1234).unwrap();
        let b = train_test_split(&x, &y, 0.25, 1234).unwrap();
        assert_eq!(a.x_test, b.x_test);
        assert_eq!(a.y_train, b.y_train);

        assert_eq!(a.y_test.len() + a.y_train.len(), 20);
        // 5 positives -> round(1.25) = 1 held out; 15 negatives -> 4
        assert_eq!(a.y_test.iter().filter(|&&v| v == 1).count(), 1);
        assert_eq!(a.y_test.len(), 5);
        assert!(train_test_split(&x, &y, 1.0, 0).is_err());
    }
}
