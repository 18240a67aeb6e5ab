//! JSON-on-disk implementation of [`CredentialStorage`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::CredentialStorage;
use crate::models::AdminCredentialRecord;

/// Stores the credential record as pretty-printed JSON in a single file.
///
/// The parent directory is created with mode `0o700` and the file is written
/// with mode `0o600` on unix; both are no-ops on other platforms.
pub struct FileCredentialStorage {
    path: PathBuf,
}

impl FileCredentialStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        let Some(parent) = self.path.parent() else {
            return Ok(());
        };
        if !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            restrict_permissions(parent, 0o700)?;
        }
        Ok(())
    }
}

impl CredentialStorage for FileCredentialStorage {
    fn load(&self) -> Result<Option<AdminCredentialRecord>> {
        if !self.path.exists() {
            debug!("No credential file at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credential file: {}", self.path.display()))?;

        let record = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse credential file: {}", self.path.display())
        })?;

        Ok(Some(record))
    }

    fn save(&self, record: &AdminCredentialRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        let content = serde_json::to_string_pretty(record)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write credential file: {}", self.path.display()))?;
        restrict_permissions(&self.path, 0o600)?;

        info!("Credentials saved to: {}", self.path.display());
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to restrict permissions on: {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
