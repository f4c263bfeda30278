//! JSON persistence of fitted models and evaluation results.
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::model_map::ModelMap;
use crate::trainer::EvaluationResult;

fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path, pretty: bool) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a model map, fitted state included.
pub fn save_models<M: Serialize>(models: &ModelMap<M>, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    write_json(models, path, false)?;
    log::info!("Saved {} models to {}", models.len(), path.display());
    Ok(())
}

/// Read a model map written by [`save_models`], ready for
/// `train_and_evaluate(.., from_loaded = true, ..)`.
pub fn load_models<M: DeserializeOwned>(path: impl AsRef<Path>) -> Result<ModelMap<M>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let models: ModelMap<M> = serde_json::from_reader(reader)?;
    log::info!("Loaded {} models from {}", models.len(), path.display());
    Ok(models)
}

pub fn save_results(results: &ModelMap<EvaluationResult>, path: impl AsRef<Path>) -> Result<()> {
    write_json(results, path.as_ref(), true)
}
