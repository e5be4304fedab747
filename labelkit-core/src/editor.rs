//! Code editor capability contract

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::plugin::PluginContext;

/// Live binding to whichever editor is mounted
#[async_trait]
pub trait CodeEditor: Send + Sync {
    /// Replace the editor content
    async fn set_code(&self, code: &str) -> Result<()>;

    /// Current editor content; `None` when the editor has nothing to offer
    async fn get_code(&self) -> Result<Option<String>>;

    /// Release resources before the editor is unmounted
    async fn unmount(&self) -> Result<()> {
        Ok(())
    }
}

/// Builds a fresh editor instance each time its tab is mounted
pub type EditorFactory = Arc<dyn Fn(&PluginContext) -> Result<Arc<dyn CodeEditor>> + Send + Sync>;

/// Registry entry for an editor tab
#[derive(Clone)]
pub struct EditorDescriptor {
    pub key: String,
    pub name: String,
    pub icon: Option<String>,
    pub factory: EditorFactory,
}

impl EditorDescriptor {
    pub fn new<F>(key: &str, name: &str, factory: F) -> Self
    where
        F: Fn(&PluginContext) -> Result<Arc<dyn CodeEditor>> + Send + Sync + 'static,
    {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            icon: None,
            factory: Arc::new(factory),
        }
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    /// Instantiate the editor
    pub fn mount(&self, context: &PluginContext) -> Result<Arc<dyn CodeEditor>> {
        tracing::debug!("Mounting editor {}", self.key);
        (self.factory)(context)
    }
}

impl std::fmt::Debug for EditorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorDescriptor")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("icon", &self.icon)
            .finish()
    }
}
