//! Preview area capability contract

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::plugin::PluginContext;
use crate::template::{PreviewTarget, TemplateContext};

/// What a preview area currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewSurface {
    Empty,
    /// URL loaded in the embedded viewer
    Document { url: String, content_type: String },
    /// Inline error panel replacing the surface
    ErrorPanel { message: String },
}

/// Renders the edited template against a target
#[async_trait]
pub trait PreviewArea: Send + Sync {
    async fn update_preview(
        &self,
        code: &str,
        target: &PreviewTarget,
        save_template: bool,
        context: &TemplateContext,
    ) -> Result<()>;

    /// Current content of the surface
    async fn surface(&self) -> PreviewSurface {
        PreviewSurface::Empty
    }

    async fn unmount(&self) -> Result<()> {
        Ok(())
    }
}

pub type PreviewFactory = Arc<dyn Fn(&PluginContext) -> Result<Arc<dyn PreviewArea>> + Send + Sync>;

/// Registry entry for a preview tab
#[derive(Clone)]
pub struct PreviewDescriptor {
    pub key: String,
    pub name: String,
    pub icon: Option<String>,
    pub factory: PreviewFactory,
}

impl PreviewDescriptor {
    pub fn new<F>(key: &str, name: &str, factory: F) -> Self
    where
        F: Fn(&PluginContext) -> Result<Arc<dyn PreviewArea>> + Send + Sync + 'static,
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

    pub fn mount(&self, context: &PluginContext) -> Result<Arc<dyn PreviewArea>> {
        tracing::debug!("Mounting preview {}", self.key);
        (self.factory)(context)
    }
}

impl std::fmt::Debug for PreviewDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewDescriptor")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("icon", &self.icon)
            .finish()
    }
}
