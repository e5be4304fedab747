//! Editor mirroring the template into a file on disk

use async_trait::async_trait;
use labelkit_core::{CodeEditor, LabelError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Template editor backed by a file
///
/// Writes go straight to disk and reads pick up changes made by other
/// programs in the meantime.
pub struct FileEditor {
    path: PathBuf,
}

impl FileEditor {
    /// Open the file, creating it and its parent directory when missing
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        if !fs::try_exists(&path).await? {
            fs::write(&path, "").await?;
            tracing::debug!("Created template file {}", path.display());
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CodeEditor for FileEditor {
    async fn set_code(&self, code: &str) -> Result<()> {
        fs::write(&self.path, code).await.map_err(|e| {
            LabelError::generic(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }

    async fn get_code(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(code) => Ok(Some(code)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
