//! Change notifications for the template file

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

/// Stream of modifications to one file
pub struct FileChanges {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<()>,
}

impl FileChanges {
    /// Start watching `path`
    ///
    /// The parent directory is watched rather than the file itself, since
    /// many editors save by writing a new file and renaming it into place.
    pub fn watch(path: &Path) -> anyhow::Result<Self> {
        let file_name: OsString = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("{} is not a file", path.display()))?
            .to_os_string();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let (tx, rx) = mpsc::channel(16);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify() || event.kind.is_create())
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if relevant {
                        // A full channel already holds a pending change
                        let _ = tx.try_send(());
                    }
                }
                Err(e) => tracing::warn!("File watch error: {}", e),
            },
            notify::Config::default(),
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::debug!("Watching {} for changes", path.display());

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Wait for the next change, folding bursts closer than `debounce`
    pub async fn next(&mut self, debounce: Duration) -> Option<()> {
        self.rx.recv().await?;
        loop {
            match tokio::time::timeout(debounce, self.rx.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) | Err(_) => return Some(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reports_writes_to_watched_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("label.html");
        std::fs::write(&path, "v1").unwrap();

        let mut changes = FileChanges::watch(&path).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(&path, "v2").unwrap();

        let change = tokio::time::timeout(
            Duration::from_secs(5),
            changes.next(Duration::from_millis(50)),
        )
        .await
        .unwrap();
        assert_eq!(change, Some(()));
    }

    #[test]
    fn test_rejects_path_without_file_name() {
        assert!(FileChanges::watch(Path::new("/")).is_err());
    }
}
