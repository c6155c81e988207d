/// Run layout: the fixed `log/` and `output/` directories under a root
use crate::config::types::{DemoConfig, ProcError, Result};
use crate::safety::safe_cleanup::{self, CleanupReport};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolved directories for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
    log_dir: PathBuf,
    output_dir: PathBuf,
    original_dir: PathBuf,
    obfuscated_dir: PathBuf,
}

impl RunLayout {
    pub fn from_config(config: &DemoConfig) -> Self {
        Self {
            root: config.root.clone(),
            log_dir: config.log_dir(),
            output_dir: config.output_dir(),
            original_dir: config.original_dir(),
            obfuscated_dir: config.obfuscated_dir(),
        }
    }

    /// Create every directory; existing ones are fine
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            &self.log_dir,
            &self.output_dir,
            &self.original_dir,
            &self.obfuscated_dir,
        ] {
            fs::create_dir_all(dir).map_err(|e| {
                ProcError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory {}: {}", dir.display(), e),
                ))
            })?;
        }
        log::debug!("layout ready under {}", self.root.display());
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn original_dir(&self) -> &Path {
        &self.original_dir
    }

    pub fn obfuscated_dir(&self) -> &Path {
        &self.obfuscated_dir
    }

    /// `output/obfuscated/<bucket>`
    pub fn bucket_dir(&self, bucket: u32) -> PathBuf {
        self.obfuscated_dir.join(bucket.to_string())
    }

    /// Reap the whole output tree. Logs are kept.
    pub fn teardown_output(&self) -> Result<CleanupReport> {
        safe_cleanup::cleanup_directory(&self.output_dir)
    }
}
