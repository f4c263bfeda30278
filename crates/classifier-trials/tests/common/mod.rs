#![allow(dead_code)]

use classifier_trials::data_handling::{train_test_split, TrainTestSplit};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two overlapping classes in 4 features; only the first two carry signal.
pub fn make_classification(n_samples: usize, seed: u64) -> (Array2<f64>, Array1<i32>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let y: Array1<i32> = (0..n_samples).map(|i| (i % 2) as i32).collect();
    let mut x = Array2::zeros((n_samples, 4));
    for i in 0..n_samples {
        let shift = if y[i] == 1 { 1.0 } else { -1.0 };
        for j in 0..4 {
            let signal = if j < 2 { shift } else { 0.0 };
            x[[i, j]] = signal + rng.gen_range(-1.5..1.5);
        }
    }
    (x, y)
}

pub fn split(n_samples: usize, seed: u64) -> TrainTestSplit {
    let (x, y) = make_classification(n_samples, seed);
    train_test_split(&x, &y, 0.25, seed).expect("valid split")
}
