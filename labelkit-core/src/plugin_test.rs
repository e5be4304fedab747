//! Tests for the plugin system

#[cfg(test)]
mod tests {
    use crate::config::{Config, PluginConfig};
    use crate::editor::{CodeEditor, EditorDescriptor};
    use crate::error::{LabelError, Result};
    use crate::plugin::*;
    use crate::registry::PanelRegistry;
    use crate::state::StateManager;
    use crate::test_support::Harness;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NullEditor;

    #[async_trait]
    impl CodeEditor for NullEditor {
        async fn set_code(&self, _code: &str) -> Result<()> {
            Ok(())
        }

        async fn get_code(&self) -> Result<Option<String>> {
            Ok(None)
        }
    }

    /// Mock plugin registering one editor under its own name
    struct MockPlugin {
        name: String,
        dependencies: Vec<String>,
        fail_after_register: bool,
        status: PluginStatus,
    }

    impl MockPlugin {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                dependencies: Vec::new(),
                fail_after_register: false,
                status: PluginStatus::Loading,
            }
        }

        fn with_dependencies(mut self, deps: Vec<&str>) -> Self {
            self.dependencies = deps.iter().map(|s| s.to_string()).collect();
            self
        }

        fn failing(mut self) -> Self {
            self.fail_after_register = true;
            self
        }
    }

    #[async_trait]
    impl Plugin for MockPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn dependencies(&self) -> Vec<&str> {
            self.dependencies.iter().map(|s| s.as_str()).collect()
        }

        async fn initialize(&mut self, context: &PluginContext) -> Result<()> {
            context
                .panels
                .register_editor(EditorDescriptor::new(&self.name, &self.name, |_ctx| {
                    Ok(Arc::new(NullEditor) as Arc<dyn CodeEditor>)
                }))
                .await?;
            if self.fail_after_register {
                return Err(LabelError::plugin("editor assets missing"));
            }
            self.status = PluginStatus::Active;
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<()> {
            self.status = PluginStatus::Stopped;
            Ok(())
        }

        fn status(&self) -> PluginStatus {
            self.status.clone()
        }

        fn provided_panels(&self) -> Vec<&str> {
            vec![self.name.as_str()]
        }
    }

    async fn create_test_context(config: Config) -> (PluginContext, Harness) {
        let harness = Harness::new().await;
        let context = PluginContext::new(
            harness.event_bus.clone(),
            Arc::new(config),
            Arc::new(StateManager::new()),
            harness.api.clone(),
            Arc::new(harness.poller()),
            Arc::new(PanelRegistry::new()),
        );
        (context, harness)
    }

    #[tokio::test]
    async fn test_plugin_registration() {
        let (context, harness) = create_test_context(Config::new()).await;
        let mut registry = PluginRegistry::new();

        registry
            .register_plugin(Box::new(MockPlugin::new("alpha")), &context)
            .await
            .unwrap();

        assert!(registry.is_plugin_loaded("alpha"));
        assert!(registry.is_plugin_active("alpha"));
        assert!(context.panels.editor("alpha").await.is_some());

        let info = registry.get_plugin_info("alpha").unwrap();
        assert_eq!(info.version, "1.0.0");
        assert_eq!(info.provided_panels, vec!["alpha"]);
        assert_eq!(harness.recorder.event_types().await, vec!["plugin_loaded"]);
    }

    #[tokio::test]
    async fn test_duplicate_plugin_rejected() {
        let (context, _harness) = create_test_context(Config::new()).await;
        let mut registry = PluginRegistry::new();

        registry
            .register_plugin(Box::new(MockPlugin::new("alpha")), &context)
            .await
            .unwrap();
        let err = registry
            .register_plugin(Box::new(MockPlugin::new("alpha")), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, LabelError::Plugin(_)));
    }

    #[tokio::test]
    async fn test_missing_dependency() {
        let (context, _harness) = create_test_context(Config::new()).await;
        let mut registry = PluginRegistry::new();

        let result = registry
            .register_plugin(
                Box::new(MockPlugin::new("beta").with_dependencies(vec!["alpha"])),
                &context,
            )
            .await;
        assert!(result.is_err());
        assert!(!registry.is_plugin_loaded("beta"));

        registry
            .register_plugin(Box::new(MockPlugin::new("alpha")), &context)
            .await
            .unwrap();
        registry
            .register_plugin(
                Box::new(MockPlugin::new("beta").with_dependencies(vec!["alpha"])),
                &context,
            )
            .await
            .unwrap();

        let order: Vec<_> = registry
            .list_plugins()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        assert_eq!(order, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_disabled_plugin_skipped() {
        let mut config = Config::new();
        let mut entry = PluginConfig::new("alpha".to_string());
        entry.enabled = false;
        config.plugins.push(entry);

        let (context, _harness) = create_test_context(config).await;
        let mut registry = PluginRegistry::new();
        registry
            .register_plugin(Box::new(MockPlugin::new("alpha")), &context)
            .await
            .unwrap();

        assert!(!registry.is_plugin_loaded("alpha"));
        assert!(context.panels.editors().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_initialisation_removes_panels() {
        let (context, _harness) = create_test_context(Config::new()).await;
        let mut registry = PluginRegistry::new();

        let err = registry
            .register_plugin(Box::new(MockPlugin::new("alpha").failing()), &context)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("editor assets missing"));
        assert!(!registry.is_plugin_loaded("alpha"));
        assert!(context.panels.editor("alpha").await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_unregisters_panels() {
        let (context, harness) = create_test_context(Config::new()).await;
        let mut registry = PluginRegistry::new();
        registry
            .register_plugin(Box::new(MockPlugin::new("alpha")), &context)
            .await
            .unwrap();
        registry
            .register_plugin(Box::new(MockPlugin::new("beta")), &context)
            .await
            .unwrap();

        registry.shutdown(&context).await.unwrap();

        assert!(registry.list_plugins().is_empty());
        assert!(context.panels.editors().await.is_empty());

        let unloaded: Vec<String> = harness
            .recorder
            .events()
            .await
            .into_iter()
            .filter_map(|e| match e {
                crate::event::SystemEvent::PluginUnloaded { plugin_name, .. } => Some(plugin_name),
                _ => None,
            })
            .collect();
        assert_eq!(unloaded, vec!["beta", "alpha"]);
    }

    /// Event bus rejecting every publish
    struct ClosedBus;

    #[async_trait]
    impl crate::event::EventBus for ClosedBus {
        async fn publish_system_event(&self, _event: crate::event::SystemEvent) -> Result<()> {
            Err(LabelError::EventBus("bus closed".to_string()))
        }

        async fn subscribe_system_events(
            &self,
            _handler: Arc<dyn crate::event::SystemEventHandler>,
            _filter: Option<Box<dyn crate::event::EventFilter>>,
        ) -> Result<crate::event::SubscriptionId> {
            Err(LabelError::EventBus("bus closed".to_string()))
        }

        async fn unsubscribe(&self, _id: crate::event::SubscriptionId) -> Result<()> {
            Ok(())
        }

        async fn subscription_count(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn test_event_failures_do_not_block_lifecycle() {
        let harness = Harness::new().await;
        let context = PluginContext::new(
            Arc::new(ClosedBus),
            Arc::new(Config::new()),
            Arc::new(StateManager::new()),
            harness.api.clone(),
            Arc::new(harness.poller()),
            Arc::new(PanelRegistry::new()),
        );
        let mut registry = PluginRegistry::new();

        registry
            .register_plugin(Box::new(MockPlugin::new("alpha")), &context)
            .await
            .unwrap();
        assert!(registry.is_plugin_active("alpha"));

        registry.shutdown(&context).await.unwrap();
        assert!(registry.list_plugins().is_empty());
        assert!(context.panels.editors().await.is_empty());
    }
}
