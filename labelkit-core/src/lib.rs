//! Labelkit Core - engine for live label and report template previews
//!
//! This crate provides the REST client, the data output poller, the preview
//! orchestrator and the plugin architecture that editor and preview panels
//! are registered through.

pub mod api;
pub mod artifact;
pub mod bridge;
pub mod config;
pub mod editor;
pub mod error;
pub mod event;
pub mod http;
pub mod job;
pub mod notification;
pub mod orchestrator;
pub mod plugin;
pub mod poller;
pub mod preview;
pub mod registry;
pub mod shell;
pub mod state;
pub mod template;
pub mod visibility;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod event_test;

#[cfg(test)]
mod plugin_test;



#[cfg(test)]
mod bridge_test;


// Re-export commonly used types
pub use api::{extract_error_message, ApiClient, ArtifactBlob};
pub use artifact::{ObjectUrlStore, PreviewArtifact};
pub use bridge::{BridgeStatus, EditorBridge, EditorRegistration, PreviewBridge, PreviewRegistration};
pub use config::{Config, PluginConfig, PollingConfig, RenderConfig, ServerConfig, ValidationResult};
pub use editor::{CodeEditor, EditorDescriptor};
pub use error::{ErrorSeverity, LabelError, Result};
pub use event::{
    EventBus, EventFilter, EventTypeFilter, InMemoryEventBus, SubscriptionId, SystemEvent,
    SystemEventHandler,
};
pub use http::{ApiRequest, ApiResponse, ReqwestTransport, RequestBody, Transport};
pub use job::{DataOutput, JobState};
pub use notification::{Notification, NotificationCenter, NotificationKind};
pub use orchestrator::PreviewOrchestrator;
pub use plugin::{Plugin, PluginContext, PluginInfo, PluginRegistry, PluginStatus};
pub use poller::{JobOutcome, JobPoller, JobWatch, OutputOpener, PollPolicy};
pub use preview::{PreviewArea, PreviewDescriptor, PreviewSurface};
pub use registry::PanelRegistry;
pub use shell::{EditorShell, ReloadOutcome};
pub use state::{ShellState, StateManager};
pub use template::{
    PreviewTarget, PreviewTargetOption, RenderPayload, Template, TemplateContext, TemplateKind,
};
pub use visibility::Visibility;

use std::sync::Arc;
use std::time::Duration;

/// Core engine wiring the client services and the plugins together
pub struct LabelEngine {
    event_bus: Arc<dyn EventBus>,
    plugin_registry: PluginRegistry,
    state_manager: Arc<StateManager>,
    config: Arc<Config>,
    api: ApiClient,
    poller: Arc<JobPoller>,
    panels: Arc<PanelRegistry>,
    notifications: Arc<NotificationCenter>,
    visibility: Visibility,
}

impl LabelEngine {
    /// Create an engine talking to the configured server over HTTP
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(&config.server)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create an engine on top of an arbitrary transport
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        let event_bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new());
        let api = ApiClient::new(transport, config.server.api_prefix.clone());
        let notifications = Arc::new(NotificationCenter::new());
        let visibility = Visibility::new();
        let config = Arc::new(config);

        let poller = Arc::new(Self::build_poller(
            &config,
            &api,
            &event_bus,
            &notifications,
            &visibility,
            None,
        ));

        Self {
            event_bus,
            plugin_registry: PluginRegistry::new(),
            state_manager: Arc::new(StateManager::new()),
            config,
            api,
            poller,
            panels: Arc::new(PanelRegistry::new()),
            notifications,
            visibility,
        }
    }

    fn build_poller(
        config: &Config,
        api: &ApiClient,
        event_bus: &Arc<dyn EventBus>,
        notifications: &Arc<NotificationCenter>,
        visibility: &Visibility,
        opener: Option<Arc<dyn OutputOpener>>,
    ) -> JobPoller {
        let poller = JobPoller::new(
            api.clone(),
            event_bus.clone(),
            notifications.clone(),
            visibility.clone(),
        )
        .with_policy(config.watch_policy())
        .with_dismiss_delay(Duration::from_millis(config.polling.dismiss_delay_ms));

        match opener {
            Some(opener) => poller.with_opener(opener),
            None => poller,
        }
    }

    /// Open finished job outputs with `opener`; call before registering plugins
    pub fn set_output_opener(&mut self, opener: Arc<dyn OutputOpener>) {
        self.poller = Arc::new(Self::build_poller(
            &self.config,
            &self.api,
            &self.event_bus,
            &self.notifications,
            &self.visibility,
            Some(opener),
        ));
    }

    /// Get the plugin context for plugin registration
    pub fn create_plugin_context(&self) -> PluginContext {
        PluginContext::new(
            self.event_bus.clone(),
            self.config.clone(),
            self.state_manager.clone(),
            self.api.clone(),
            self.poller.clone(),
            self.panels.clone(),
        )
    }

    /// Register and initialize a plugin
    pub async fn register_plugin(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        let context = self.create_plugin_context();
        self.plugin_registry.register_plugin(plugin, &context).await
    }

    /// Fetch a template and its current source
    pub async fn load_template(
        &self,
        kind: TemplateKind,
        pk: u64,
    ) -> Result<(TemplateContext, String)> {
        let template = self.api.fetch_template(kind, pk).await?;
        let body = self.api.fetch_template_body(&template).await?;
        tracing::info!(
            "Loaded {} template {} ({} bytes)",
            kind,
            template.name,
            body.len()
        );
        Ok((
            TemplateContext::new(template, kind, self.api.api_prefix()),
            body,
        ))
    }

    /// Open an editor shell on a loaded template
    pub async fn open_shell(&self, template: TemplateContext, code: String) -> Result<EditorShell> {
        EditorShell::open(self.create_plugin_context(), template, code).await
    }

    /// Follow a job in the background with the standalone poller
    pub fn watch_job(&self, job_id: Option<u64>, title: &str) -> Option<JobWatch> {
        self.poller.watch(job_id, title)
    }

    /// Shutdown plugins in reverse load order
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down labelkit engine");

        let context = self.create_plugin_context();
        let shutdown_timeout = Duration::from_secs(30);

        match tokio::time::timeout(shutdown_timeout, self.plugin_registry.shutdown(&context)).await
        {
            Ok(Err(e)) => tracing::error!("Plugin registry shutdown failed: {}", e),
            Ok(Ok(())) => {}
            Err(_) => tracing::error!(
                "Plugin registry shutdown timed out after {:?}",
                shutdown_timeout
            ),
        }

        tracing::info!("Labelkit engine shutdown complete");
        Ok(())
    }

    pub fn event_bus(&self) -> Arc<dyn EventBus> {
        self.event_bus.clone()
    }

    pub fn plugin_registry(&self) -> &PluginRegistry {
        &self.plugin_registry
    }

    pub fn state_manager(&self) -> Arc<StateManager> {
        self.state_manager.clone()
    }

    pub fn config(&self) -> Arc<Config> {
        self.config.clone()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn poller(&self) -> Arc<JobPoller> {
        self.poller.clone()
    }

    pub fn panels(&self) -> Arc<PanelRegistry> {
        self.panels.clone()
    }

    pub fn notifications(&self) -> Arc<NotificationCenter> {
        self.notifications.clone()
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// Get all loaded plugins information
    pub fn get_loaded_plugins(&self) -> Vec<&PluginInfo> {
        self.plugin_registry.list_plugins()
    }
}
