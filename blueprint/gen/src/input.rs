//! Loading of the semantic API model and run inputs.
//!
//! An input directory holds `Configuration.json` next to the model, stored
//! as `CodeModel.yaml` (preferred) or `CodeModel.json`.

use std::path::{Path, PathBuf};

use blueprint_define::ApiModel;
use tracing::{debug, instrument};

use crate::config::Configuration;
use crate::errors::GeneratorError;

/// File name of the configuration document in an input directory.
pub const CONFIGURATION_FILE: &str = "Configuration.json";

/// Candidate file names of the model in an input directory, in lookup order.
pub const MODEL_FILES: &[&str] = &["CodeModel.yaml", "CodeModel.yml", "CodeModel.json"];

/// Parses a YAML model document.
///
/// ## Errors
///
/// Returns `GeneratorError::ParseError` on malformed YAML.
pub fn parse_model_yaml(yaml: &str) -> Result<ApiModel, GeneratorError> {
    serde_yaml::from_str(yaml).map_err(|e| GeneratorError::ParseError(e.to_string()))
}

/// Parses a JSON model document.
///
/// ## Errors
///
/// Returns `GeneratorError::ParseError` on malformed JSON.
pub fn parse_model_json(json: &str) -> Result<ApiModel, GeneratorError> {
    serde_json::from_str(json).map_err(|e| GeneratorError::ParseError(e.to_string()))
}

/// Reads a model file, choosing the parser by extension.
///
/// ## Errors
///
/// Returns `GeneratorError::ReadError` if the file cannot be read and
/// `GeneratorError::ParseError` if it cannot be parsed.
#[instrument(fields(path = %path.display()))]
pub fn load_model(path: &Path) -> Result<ApiModel, GeneratorError> {
    let text = std::fs::read_to_string(path).map_err(|e| GeneratorError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let model = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => parse_model_json(&text)?,
        _ => parse_model_yaml(&text)?,
    };
    debug!(
        schemas = model.schemas.len(),
        operations = model.operations.len(),
        "Loaded API model"
    );
    Ok(model)
}

/// Finds the model file inside an input directory.
pub fn find_model_file(dir: &Path) -> Option<PathBuf> {
    MODEL_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Reads the configuration and model of an input directory.
///
/// ## Errors
///
/// Returns an error if either file is missing or malformed.
pub fn load_input_dir(dir: &Path) -> Result<(Configuration, ApiModel), GeneratorError> {
    let config = Configuration::load(&dir.join(CONFIGURATION_FILE))?;
    let model_path = find_model_file(dir).ok_or_else(|| {
        GeneratorError::ParseError(format!(
            "no model file ({}) in '{}'",
            MODEL_FILES.join(", "),
            dir.display()
        ))
    })?;
    let model = load_model(&model_path)?;
    Ok((config, model))
}
