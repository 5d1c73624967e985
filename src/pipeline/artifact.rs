use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info};

/// Raw search payload of one subject on disk.
///
/// The file lives exactly as long as this handle: dropping it removes the
/// file, whatever path the subject took through the pipeline.
#[derive(Debug)]
pub struct RawArtifact {
    path: PathBuf,
}

impl RawArtifact {
    /// Persist `payload` as pretty JSON at `dir/file_name`
    pub fn create<T: Serialize>(dir: &Path, file_name: &str, payload: &T) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create artifact dir {}", dir.display()))?;

        let path = dir.join(file_name);
        let json = serde_json::to_string_pretty(payload)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write artifact {}", path.display()))?;

        info!("💾 Raw payload saved to {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<String> {
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read artifact {}", self.path.display()))
    }
}

impl Drop for RawArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!("Raw payload {} removed", self.path.display()),
            Err(e) => error!(error = %e, path = %self.path.display(), "failed to remove raw payload"),
        }
    }
}
