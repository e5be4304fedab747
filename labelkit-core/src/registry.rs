//! Registry of editor and preview tabs

use tokio::sync::RwLock;

use crate::editor::EditorDescriptor;
use crate::error::{LabelError, Result};
use crate::preview::PreviewDescriptor;

/// Ordered set of editor and preview descriptors, keyed uniquely
#[derive(Default)]
pub struct PanelRegistry {
    editors: RwLock<Vec<EditorDescriptor>>,
    previews: RwLock<Vec<PreviewDescriptor>>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_editor(&self, descriptor: EditorDescriptor) -> Result<()> {
        let mut editors = self.editors.write().await;
        if editors.iter().any(|e| e.key == descriptor.key) {
            return Err(LabelError::plugin(format!(
                "Editor '{}' is already registered",
                descriptor.key
            )));
        }
        tracing::info!("Registered editor: {} ({})", descriptor.name, descriptor.key);
        editors.push(descriptor);
        Ok(())
    }

    pub async fn register_preview(&self, descriptor: PreviewDescriptor) -> Result<()> {
        let mut previews = self.previews.write().await;
        if previews.iter().any(|p| p.key == descriptor.key) {
            return Err(LabelError::plugin(format!(
                "Preview '{}' is already registered",
                descriptor.key
            )));
        }
        tracing::info!("Registered preview: {} ({})", descriptor.name, descriptor.key);
        previews.push(descriptor);
        Ok(())
    }

    pub async fn editor(&self, key: &str) -> Option<EditorDescriptor> {
        self.editors
            .read()
            .await
            .iter()
            .find(|e| e.key == key)
            .cloned()
    }

    pub async fn preview(&self, key: &str) -> Option<PreviewDescriptor> {
        self.previews
            .read()
            .await
            .iter()
            .find(|p| p.key == key)
            .cloned()
    }

    pub async fn editors(&self) -> Vec<EditorDescriptor> {
        self.editors.read().await.clone()
    }

    pub async fn previews(&self) -> Vec<PreviewDescriptor> {
        self.previews.read().await.clone()
    }

    /// Drop every descriptor whose key is in `keys`
    pub async fn remove(&self, keys: &[String]) {
        self.editors.write().await.retain(|e| !keys.contains(&e.key));
        self.previews.write().await.retain(|p| !keys.contains(&p.key));
    }
}
