use crate::scene::{MeasurementData, SceneObject};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SerializationError>;

/// Descriptor tree as handed to the web panels.
pub fn tree_to_json(tree: &[SceneObject]) -> Result<String> {
    Ok(serde_json::to_string_pretty(tree)?)
}

pub fn save_tree_to_file(tree: &[SceneObject], path: &Path) -> Result<()> {
    let json = tree_to_json(tree)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Measurement annotations survive as plain endpoint pairs; distance and
/// label are recomputed when they are recreated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementFile {
    pub measurements: Vec<MeasurementData>,
}

pub fn save_measurements_to_file(measurements: &[MeasurementData], path: &Path) -> Result<()> {
    let file = MeasurementFile {
        measurements: measurements.to_vec(),
    };
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_measurements_from_file(path: &Path) -> Result<Vec<MeasurementData>> {
    let json = std::fs::read_to_string(path)?;
    let file: MeasurementFile = serde_json::from_str(&json)?;
    Ok(file.measurements)
}
