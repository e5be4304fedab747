//! Built-in PDF preview area for labelkit
//!
//! Each mounted preview owns a [`PreviewOrchestrator`]. Artifacts land in an
//! object URL store shared by every mount of this plugin, so the host can
//! read the rendered bytes back.

use async_trait::async_trait;
use labelkit_core::{
    ObjectUrlStore, Plugin, PluginContext, PluginStatus, PreviewArea, PreviewDescriptor,
    PreviewOrchestrator, PreviewSurface, PreviewTarget, Result, TemplateContext,
};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const PLUGIN_NAME: &str = "pdf-preview";
pub const PREVIEW_KEY: &str = "pdf-preview";

/// Preview area rendering the template server-side and showing the PDF
pub struct PdfPreview {
    orchestrator: PreviewOrchestrator,
    surface: RwLock<PreviewSurface>,
}

impl PdfPreview {
    pub fn new(orchestrator: PreviewOrchestrator) -> Self {
        Self {
            orchestrator,
            surface: RwLock::new(PreviewSurface::Empty),
        }
    }

    /// Build a preview using the context's services and polling settings
    pub fn from_context(context: &PluginContext, urls: Arc<ObjectUrlStore>) -> Self {
        let orchestrator = PreviewOrchestrator::new(
            context.api.clone(),
            context.poller.clone(),
            context.event_bus.clone(),
        )
        .with_inline_policy(context.config.inline_policy())
        .with_trigger_timeout(context.config.render.trigger_timeout())
        .with_object_urls(urls);
        Self::new(orchestrator)
    }

    pub fn orchestrator(&self) -> &PreviewOrchestrator {
        &self.orchestrator
    }
}

#[async_trait]
impl PreviewArea for PdfPreview {
    async fn update_preview(
        &self,
        code: &str,
        target: &PreviewTarget,
        save_template: bool,
        context: &TemplateContext,
    ) -> Result<()> {
        // Failures leave the previous document on screen
        let artifact = self
            .orchestrator
            .run(code, target, save_template, context)
            .await?;

        *self.surface.write().await = PreviewSurface::Document {
            url: artifact.display_url(),
            content_type: artifact.content_type,
        };
        Ok(())
    }

    async fn surface(&self) -> PreviewSurface {
        self.surface.read().await.clone()
    }

    async fn unmount(&self) -> Result<()> {
        if let Some(current) = self.orchestrator.current() {
            self.orchestrator.object_urls().revoke(&current.object_url)?;
        }
        *self.surface.write().await = PreviewSurface::Empty;
        Ok(())
    }
}

/// Plugin registering the PDF preview area
pub struct PdfPreviewPlugin {
    name: String,
    version: String,
    status: PluginStatus,
    urls: Arc<ObjectUrlStore>,
}

impl PdfPreviewPlugin {
    pub fn new() -> Self {
        Self {
            name: PLUGIN_NAME.to_string(),
            version: "0.1.0".to_string(),
            status: PluginStatus::Loading,
            urls: Arc::new(ObjectUrlStore::new()),
        }
    }

    /// Store holding the artifacts rendered by this plugin's previews
    pub fn object_urls(&self) -> Arc<ObjectUrlStore> {
        self.urls.clone()
    }
}

impl Default for PdfPreviewPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for PdfPreviewPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn initialize(&mut self, context: &PluginContext) -> Result<()> {
        tracing::info!("Initializing PDF preview plugin");

        let urls = self.urls.clone();
        context
            .panels
            .register_preview(
                PreviewDescriptor::new(PREVIEW_KEY, "PDF", move |ctx| {
                    Ok(Arc::new(PdfPreview::from_context(ctx, urls.clone())) as Arc<dyn PreviewArea>)
                })
                .with_icon("file-type-pdf"),
            )
            .await?;

        self.status = PluginStatus::Active;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!(
            "Shutting down PDF preview plugin ({} artifacts held)",
            self.urls.len()
        );
        self.status = PluginStatus::Stopped;
        Ok(())
    }

    fn status(&self) -> PluginStatus {
        self.status.clone()
    }

    fn provided_panels(&self) -> Vec<&str> {
        vec![PREVIEW_KEY]
    }
}
