//! On-disk token pair for the CLI, one file per profile.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hearth_auth::TokenPair;

pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// `~/.hearth/session.<profile>.json`
    pub fn for_profile(profile: &str) -> Result<Self> {
        let dir = dirs::home_dir()
            .context("Cannot determine home directory")?
            .join(".hearth");
        Ok(Self::in_dir(dir, profile))
    }

    pub fn in_dir(dir: impl Into<PathBuf>, profile: &str) -> Self {
        Self {
            path: dir.into().join(format!("session.{profile}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<TokenPair>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let pair = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt session file {}", self.path.display()))?;
        Ok(Some(pair))
    }

    pub fn save(&self, pair: &TokenPair) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(pair)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Returns `true` if a file was removed.
    pub fn remove(&self) -> Result<bool> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
