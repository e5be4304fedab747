//! Plugin system for statically registered editors and previews

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::{LabelError, Result};
use crate::event::{EventBus, SystemEvent};
use crate::poller::JobPoller;
use crate::registry::PanelRegistry;
use crate::state::StateManager;

/// Core plugin trait that all plugins must implement
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Get the plugin name
    fn name(&self) -> &str;

    /// Get the plugin version
    fn version(&self) -> &str;

    /// Get plugin dependencies (other plugin names)
    fn dependencies(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Initialize the plugin and register its panels
    async fn initialize(&mut self, context: &PluginContext) -> Result<()>;

    /// Shutdown the plugin gracefully
    async fn shutdown(&mut self) -> Result<()>;

    /// Get plugin status
    fn status(&self) -> PluginStatus {
        PluginStatus::Active
    }

    /// Keys of the editor and preview panels this plugin registers
    fn provided_panels(&self) -> Vec<&str> {
        Vec::new()
    }
}

/// Services shared with plugins and the panels they create
#[derive(Clone)]
pub struct PluginContext {
    pub event_bus: Arc<dyn EventBus>,
    pub config: Arc<Config>,
    pub state_manager: Arc<StateManager>,
    pub api: ApiClient,
    pub poller: Arc<JobPoller>,
    pub panels: Arc<PanelRegistry>,
}

impl PluginContext {
    pub fn new(
        event_bus: Arc<dyn EventBus>,
        config: Arc<Config>,
        state_manager: Arc<StateManager>,
        api: ApiClient,
        poller: Arc<JobPoller>,
        panels: Arc<PanelRegistry>,
    ) -> Self {
        Self {
            event_bus,
            config,
            state_manager,
            api,
            poller,
            panels,
        }
    }

    /// Settings from the plugin's configuration entry
    pub fn plugin_setting<T>(&self, plugin: &str, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.config.get_plugin_config(plugin)?.get(key)
    }
}

/// Plugin registry for managing loaded plugins
pub struct PluginRegistry {
    plugins: HashMap<String, Box<dyn Plugin>>,
    plugin_info: HashMap<String, PluginInfo>,
    load_order: Vec<String>,
}

impl PluginRegistry {
    /// Create a new plugin registry
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
            plugin_info: HashMap::new(),
            load_order: Vec::new(),
        }
    }

    /// Register and initialize a plugin
    pub async fn register_plugin(
        &mut self,
        mut plugin: Box<dyn Plugin>,
        context: &PluginContext,
    ) -> Result<()> {
        let name = plugin.name().to_string();
        let version = plugin.version().to_string();

        if self.plugins.contains_key(&name) {
            return Err(LabelError::Plugin(format!(
                "Plugin {} is already registered",
                name
            )));
        }

        if !context.config.is_plugin_enabled(&name) {
            tracing::info!("Skipping disabled plugin: {}", name);
            return Ok(());
        }

        tracing::info!("Registering plugin: {} v{}", name, version);

        for dep in plugin.dependencies() {
            if !self.is_plugin_active(dep) {
                return Err(LabelError::Plugin(format!(
                    "Plugin {} depends on {}, which is not loaded",
                    name, dep
                )));
            }
        }

        if let Err(e) = plugin.initialize(context).await {
            tracing::error!("Plugin {} failed to initialize: {}", name, e);
            // Drop whatever it managed to register
            let keys: Vec<String> = plugin
                .provided_panels()
                .iter()
                .map(|s| s.to_string())
                .collect();
            context.panels.remove(&keys).await;
            return Err(e);
        }

        let info = PluginInfo {
            name: name.clone(),
            version: version.clone(),
            status: plugin.status(),
            load_time: SystemTime::now(),
            dependencies: plugin
                .dependencies()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            provided_panels: plugin
                .provided_panels()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        self.plugin_info.insert(name.clone(), info);
        self.plugins.insert(name.clone(), plugin);
        self.load_order.push(name.clone());

        if let Err(e) = context
            .event_bus
            .publish_system_event(SystemEvent::plugin_loaded(name, version))
            .await
        {
            tracing::warn!("Failed to publish plugin event: {}", e);
        }

        Ok(())
    }

    /// Shutdown all plugins in reverse load order
    pub async fn shutdown(&mut self, context: &PluginContext) -> Result<()> {
        tracing::info!("Shutting down plugins");

        for plugin_name in self.load_order.iter().rev() {
            if let Some(plugin) = self.plugins.get_mut(plugin_name) {
                if let Err(e) = plugin.shutdown().await {
                    tracing::error!("Failed to shutdown plugin {}: {}", plugin_name, e);
                }
            }
            if let Some(info) = self.plugin_info.get(plugin_name) {
                context.panels.remove(&info.provided_panels).await;
            }
            if let Err(e) = context
                .event_bus
                .publish_system_event(SystemEvent::plugin_unloaded(plugin_name.clone()))
                .await
            {
                tracing::warn!("Failed to publish plugin event: {}", e);
            }
        }

        self.plugins.clear();
        self.plugin_info.clear();
        self.load_order.clear();

        Ok(())
    }

    /// Get plugin information
    pub fn get_plugin_info(&self, name: &str) -> Option<&PluginInfo> {
        self.plugin_info.get(name)
    }

    /// List loaded plugins in load order
    pub fn list_plugins(&self) -> Vec<&PluginInfo> {
        self.load_order
            .iter()
            .filter_map(|name| self.plugin_info.get(name))
            .collect()
    }

    pub fn is_plugin_loaded(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn is_plugin_active(&self, name: &str) -> bool {
        self.plugins
            .get(name)
            .map(|p| matches!(p.status(), PluginStatus::Active))
            .unwrap_or(false)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a loaded plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub status: PluginStatus,
    pub load_time: SystemTime,
    pub dependencies: Vec<String>,
    pub provided_panels: Vec<String>,
}

/// Plugin status enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginStatus {
    Loading,
    Active,
    Error(String),
    Disabled,
    Stopped,
}
