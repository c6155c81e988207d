//! Configuration loading from a JSON file

use crate::config::types::{DemoConfig, ProcError, Result};
use std::path::Path;

/// File looked up in the working directory when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "proclife.json";

impl DemoConfig {
    /// Load configuration from a JSON file. Missing sections take defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_content = std::fs::read_to_string(path).map_err(|e| {
            ProcError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: DemoConfig = serde_json::from_str(&config_content)
            .map_err(|e| ProcError::Config(format!("Failed to parse config JSON: {}", e)))?;

        Ok(config)
    }

    /// Load `./proclife.json` if present, otherwise built-in defaults
    pub fn load_default() -> Result<Self> {
        let config_path = std::env::current_dir()
            .map_err(|e| ProcError::Config(format!("Failed to get current directory: {}", e)))?
            .join(DEFAULT_CONFIG_FILE);

        if !config_path.exists() {
            log::debug!("{} not found, using built-in defaults", DEFAULT_CONFIG_FILE);
            return Ok(Self::default());
        }

        Self::load_from_file(config_path)
    }
}
