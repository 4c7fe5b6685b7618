use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{CeilingError, Result};
use crate::model::config::CeilingConfig;
use crate::model::labeled::LabeledTensor;

pub fn load_assembly(path: &Path, config: &CeilingConfig) -> Result<LabeledTensor> {
    if !path.exists() {
        return Err(CeilingError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("assembly not found: {}", path.display()),
        )));
    }
    let reader = BufReader::new(File::open(path)?);
    let assembly: LabeledTensor = serde_json::from_reader(reader)?;

    let (axis, _) = assembly.coord(&config.subject_coord)?;
    let unit_axis = assembly.axis_index(&config.unit_dim)?;
    if axis != unit_axis {
        return Err(CeilingError::StructuralMismatch(format!(
            "coordinate `{}` must lie on the `{}` axis",
            config.subject_coord, config.unit_dim
        )));
    }
    info!(
        "loaded assembly {} with dims {:?} and shape {:?}",
        path.display(),
        assembly.dim_names(),
        assembly.shape()
    );
    Ok(assembly)
}

pub fn load_config(path: &Path) -> Result<CeilingConfig> {
    let text = fs::read_to_string(path)?;
    let config: CeilingConfig = serde_json::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

pub fn write_assembly(path: &Path, assembly: &LabeledTensor) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut w, assembly)?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/mod.rs"]
mod tests;
