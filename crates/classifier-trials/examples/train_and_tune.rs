//! Run the full experiment: split, optionally tune, train, evaluate, save.
//!
//! Usage: `train_and_tune [features.csv labels.csv] [experiment.json]`
//!
//! Without data files a synthetic two-class dataset is generated.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use classifier_trials::config::ExperimentConfig;
use classifier_trials::data_handling::train_test_split;
use classifier_trials::io::{save_models, save_results};
use classifier_trials::report::plots::plot_roc_curves;
use classifier_trials::report::StdoutReporter;
use classifier_trials::{define_models, define_param_grid, train_and_evaluate, tune_models};

fn read_features_csv(path: &str) -> Result<Array2<f64>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("cannot open {}", path))?;

    let mut data = Vec::new();
    let mut n_features = 0;
    for record in reader.records() {
        let record = record?;
        n_features = record.len();
        for field in record.iter() {
            data.push(field.trim().parse::<f64>().with_context(|| format!("bad value {:?}", field))?);
        }
    }
    let n_samples = if n_features == 0 { 0 } else { data.len() / n_features };
    Ok(Array2::from_shape_vec((n_samples, n_features), data)?)
}

fn read_labels_csv(path: &str) -> Result<Array1<i32>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("cannot open {}", path))?;

    let labels = reader
        .records()
        .map(|record| -> Result<i32> {
            let record = record?;
            let value = record.get(0).context("empty row")?;
            Ok(value.trim().parse::<i32>()?)
        })
        .collect::<Result<Vec<i32>>>()?;
    Ok(Array1::from_vec(labels))
}

fn synthetic(n_samples: usize, seed: u64) -> (Array2<f64>, Array1<i32>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let y: Array1<i32> = (0..n_samples).map(|i| (i % 2) as i32).collect();
    let x = Array2::from_shape_fn((n_samples, 6), |(i, j)| {
        let signal = if j < 3 && y[i] == 1 { 1.0 } else { 0.0 };
        signal + rng.gen_range(-1.0..1.0)
    });
    (x, y)
}

fn main() -> Result<()> {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let config = match args.get(2) {
        Some(path) => ExperimentConfig::from_json_file(path)
            .with_context(|| format!("cannot load config {}", path))?,
        None => ExperimentConfig::default(),
    };

    let (x, y) = match (args.first(), args.get(1)) {
        (Some(features), Some(labels)) => (read_features_csv(features)?, read_labels_csv(labels)?),
        _ => {
            log::info!("No data files given, generating a synthetic dataset");
            synthetic(400, config.random_state)
        }
    };
    println!("Loaded features shape: {:?}", x.shape());
    println!("Loaded labels shape: {:?}", y.shape());

    let split = train_test_split(&x, &y, config.test_size, config.random_state)?;

    let mut models = define_models();
    if config.tune {
        models = tune_models(
            models,
            &define_param_grid(),
            &split.x_train,
            &split.y_train,
            &config.search,
            &StdoutReporter,
        )?;
    }

    let (results, trained) = train_and_evaluate(
        models,
        &split.x_train,
        &split.x_test,
        &split.y_train,
        &split.y_test,
        false,
        &StdoutReporter,
    )?;

    for (name, result) in results.iter() {
        println!("{}: accuracy = {:.4}, AUC = {:.4}", name, result.accuracy, result.auc);
    }

    let out_dir = Path::new("trial_output");
    fs::create_dir_all(out_dir)?;
    save_results(&results, out_dir.join("results.json"))?;
    save_models(&trained, out_dir.join("models.json"))?;
    let plot = plot_roc_curves(&results, "ROC curves");
    fs::write(out_dir.join("roc_curves.html"), plot.to_html())?;
    println!("Wrote results, models and ROC plot to {}", out_dir.display());

    Ok(())
}
