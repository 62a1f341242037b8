//! Configuration file loading.

use crate::error::ConfigError;
use crate::types::PlacerConfig;
use crate::validate::validate_config;
use std::path::Path;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "gpl.toml";

/// Loads and validates `gpl.toml` from a run directory.
///
/// A missing file is not an error: the stock configuration is returned.
pub fn load_config(run_dir: &Path) -> Result<PlacerConfig, ConfigError> {
    let config_path = run_dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(PlacerConfig::default());
    }
    load_config_file(&config_path)
}

/// Loads and validates a configuration from an explicit file path.
pub fn load_config_file(path: &Path) -> Result<PlacerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<PlacerConfig, ConfigError> {
    let config: PlacerConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}
