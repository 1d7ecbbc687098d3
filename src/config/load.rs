//! Loading run specifications from YAML or JSON files

use super::schema::RunSpec;
use super::validate::validate_config;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format
    Json,

    /// YAML format
    Yaml,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(ConfigFormat::Json),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            _ => None,
        }
    }

    /// Detect format from a path, defaulting to YAML
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .unwrap_or(ConfigFormat::Yaml)
    }
}

/// Parse a run specification from text in the given format
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<RunSpec> {
    match format {
        ConfigFormat::Json => serde_json::from_str(content)
            .map_err(|e| Error::Serialization(format!("Failed to parse JSON config: {e}"))),
        ConfigFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| Error::Serialization(format!("Failed to parse YAML config: {e}"))),
    }
}

/// Load and validate a run specification
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<RunSpec> {
    let path = config_path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let spec = parse_config(&content, ConfigFormat::from_path(path))?;

    validate_config(&spec)?;

    tracing::debug!(path = %path.display(), "loaded run specification");
    Ok(spec)
}
