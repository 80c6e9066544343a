//! Settings file for the `signbox` binary (JSON).

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use signbox_core::{IntegratedConfig, SignboxError, StorageConfig};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub integrated: IntegratedConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Program used to run the entrypoint (e.g. "python3"); run directly when unset.
    #[serde(default)]
    pub interpreter: Option<String>,

    /// Initial secrets handed to the signing step as environment variables.
    #[serde(default)]
    pub secrets: HashMap<String, String>,
}

impl Settings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SignboxError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SignboxError::Config(format!("read settings {}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
            .map_err(|e| SignboxError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_json(contents: &str) -> Result<Self, SignboxError> {
        let settings: Settings = serde_json::from_str(contents)
            .map_err(|e| SignboxError::Config(format!("parse settings: {e}")))?;
        settings.integrated.validate()?;
        settings.storage.validate()?;
        Ok(settings)
    }
}
