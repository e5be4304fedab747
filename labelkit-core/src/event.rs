//! Event system for decoupled communication between the pipeline and its hosts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ErrorSeverity, Result};

/// Event bus for publishing and subscribing to system events
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a system event to all subscribers
    async fn publish_system_event(&self, event: SystemEvent) -> Result<()>;

    /// Subscribe to system events, optionally filtered
    async fn subscribe_system_events(
        &self,
        handler: Arc<dyn SystemEventHandler>,
        filter: Option<Box<dyn EventFilter>>,
    ) -> Result<SubscriptionId>;

    /// Unsubscribe from events
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;

    /// Get the number of active subscriptions
    async fn subscription_count(&self) -> usize;
}

/// Handler for system events
#[async_trait]
pub trait SystemEventHandler: Send + Sync {
    /// Handle a system event
    async fn handle_system_event(&self, event: &SystemEvent) -> Result<()>;

    /// Get handler name for debugging
    fn handler_name(&self) -> &str {
        "UnnamedSystemEventHandler"
    }
}

/// Filter deciding whether an event reaches a handler
pub trait EventFilter: Send + Sync {
    fn should_handle(&self, event: &SystemEvent) -> bool;
}

/// Filter matching a fixed set of event types
pub struct EventTypeFilter {
    types: Vec<&'static str>,
}

impl EventTypeFilter {
    pub fn new(types: Vec<&'static str>) -> Self {
        Self { types }
    }
}

impl EventFilter for EventTypeFilter {
    fn should_handle(&self, event: &SystemEvent) -> bool {
        self.types.contains(&event.event_type())
    }
}

/// Unique identifier for event subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Events emitted by the preview pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SystemEvent {
    /// Polling started for a data output job
    JobStarted {
        job_id: u64,
        title: String,
        timestamp: SystemTime,
    },
    /// Job reported intermediate progress
    JobProgress {
        job_id: u64,
        progress: Option<u64>,
        total: Option<u64>,
        timestamp: SystemTime,
    },
    /// Job finished successfully
    JobCompleted {
        job_id: u64,
        output: Option<String>,
        timestamp: SystemTime,
    },
    /// Job failed or polling gave up
    JobFailed {
        job_id: u64,
        message: String,
        timestamp: SystemTime,
    },
    /// Template body was uploaded
    TemplateSaved {
        template_pk: u64,
        filename: String,
        timestamp: SystemTime,
    },
    /// A preview surface shows a new artifact
    PreviewUpdated {
        url: String,
        content_type: String,
        timestamp: SystemTime,
    },
    /// A preview run failed
    PreviewFailed {
        message: String,
        timestamp: SystemTime,
    },
    /// Active editor tab changed
    EditorSwitched {
        from: Option<String>,
        to: String,
        timestamp: SystemTime,
    },
    /// Plugin was loaded
    PluginLoaded {
        plugin_name: String,
        version: String,
        timestamp: SystemTime,
    },
    /// Plugin was unloaded
    PluginUnloaded {
        plugin_name: String,
        timestamp: SystemTime,
    },
    /// Error reported by a component
    Error {
        source: String,
        message: String,
        severity: ErrorSeverity,
        timestamp: SystemTime,
    },
}

impl SystemEvent {
    pub fn job_started(job_id: u64, title: String) -> Self {
        Self::JobStarted {
            job_id,
            title,
            timestamp: SystemTime::now(),
        }
    }

    pub fn job_progress(job_id: u64, progress: Option<u64>, total: Option<u64>) -> Self {
        Self::JobProgress {
            job_id,
            progress,
            total,
            timestamp: SystemTime::now(),
        }
    }

    pub fn job_completed(job_id: u64, output: Option<String>) -> Self {
        Self::JobCompleted {
            job_id,
            output,
            timestamp: SystemTime::now(),
        }
    }

    pub fn job_failed(job_id: u64, message: String) -> Self {
        Self::JobFailed {
            job_id,
            message,
            timestamp: SystemTime::now(),
        }
    }

    pub fn template_saved(template_pk: u64, filename: String) -> Self {
        Self::TemplateSaved {
            template_pk,
            filename,
            timestamp: SystemTime::now(),
        }
    }

    pub fn preview_updated(url: String, content_type: String) -> Self {
        Self::PreviewUpdated {
            url,
            content_type,
            timestamp: SystemTime::now(),
        }
    }

    pub fn preview_failed(message: String) -> Self {
        Self::PreviewFailed {
            message,
            timestamp: SystemTime::now(),
        }
    }

    pub fn editor_switched(from: Option<String>, to: String) -> Self {
        Self::EditorSwitched {
            from,
            to,
            timestamp: SystemTime::now(),
        }
    }

    pub fn plugin_loaded(plugin_name: String, version: String) -> Self {
        Self::PluginLoaded {
            plugin_name,
            version,
            timestamp: SystemTime::now(),
        }
    }

    pub fn plugin_unloaded(plugin_name: String) -> Self {
        Self::PluginUnloaded {
            plugin_name,
            timestamp: SystemTime::now(),
        }
    }

    pub fn error(source: String, message: String, severity: ErrorSeverity) -> Self {
        Self::Error {
            source,
            message,
            severity,
            timestamp: SystemTime::now(),
        }
    }

    /// Stable identifier of the event kind
    pub fn event_type(&self) -> &'static str {
        match self {
            SystemEvent::JobStarted { .. } => "job_started",
            SystemEvent::JobProgress { .. } => "job_progress",
            SystemEvent::JobCompleted { .. } => "job_completed",
            SystemEvent::JobFailed { .. } => "job_failed",
            SystemEvent::TemplateSaved { .. } => "template_saved",
            SystemEvent::PreviewUpdated { .. } => "preview_updated",
            SystemEvent::PreviewFailed { .. } => "preview_failed",
            SystemEvent::EditorSwitched { .. } => "editor_switched",
            SystemEvent::PluginLoaded { .. } => "plugin_loaded",
            SystemEvent::PluginUnloaded { .. } => "plugin_unloaded",
            SystemEvent::Error { .. } => "error",
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        match self {
            SystemEvent::JobStarted { timestamp, .. }
            | SystemEvent::JobProgress { timestamp, .. }
            | SystemEvent::JobCompleted { timestamp, .. }
            | SystemEvent::JobFailed { timestamp, .. }
            | SystemEvent::TemplateSaved { timestamp, .. }
            | SystemEvent::PreviewUpdated { timestamp, .. }
            | SystemEvent::PreviewFailed { timestamp, .. }
            | SystemEvent::EditorSwitched { timestamp, .. }
            | SystemEvent::PluginLoaded { timestamp, .. }
            | SystemEvent::PluginUnloaded { timestamp, .. }
            | SystemEvent::Error { timestamp, .. } => *timestamp,
        }
    }

    /// Job id carried by job lifecycle events
    pub fn job_id(&self) -> Option<u64> {
        match self {
            SystemEvent::JobStarted { job_id, .. }
            | SystemEvent::JobProgress { job_id, .. }
            | SystemEvent::JobCompleted { job_id, .. }
            | SystemEvent::JobFailed { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }

    /// Human readable one-line description
    pub fn description(&self) -> String {
        match self {
            SystemEvent::JobStarted { job_id, title, .. } => {
                format!("{} started (job {})", title, job_id)
            }
            SystemEvent::JobProgress {
                job_id,
                progress,
                total,
                ..
            } => match (progress, total) {
                (Some(p), Some(t)) => format!("Job {} progress {}/{}", job_id, p, t),
                _ => format!("Job {} in progress", job_id),
            },
            SystemEvent::JobCompleted { job_id, output, .. } => match output {
                Some(output) => format!("Job {} complete: {}", job_id, output),
                None => format!("Job {} complete", job_id),
            },
            SystemEvent::JobFailed {
                job_id, message, ..
            } => format!("Job {} failed: {}", job_id, message),
            SystemEvent::TemplateSaved {
                template_pk,
                filename,
                ..
            } => format!("Template {} saved as {}", template_pk, filename),
            SystemEvent::PreviewUpdated { url, .. } => format!("Preview updated: {}", url),
            SystemEvent::PreviewFailed { message, .. } => {
                format!("Preview failed: {}", message)
            }
            SystemEvent::EditorSwitched { from, to, .. } => match from {
                Some(from) => format!("Editor switched from {} to {}", from, to),
                None => format!("Editor {} mounted", to),
            },
            SystemEvent::PluginLoaded {
                plugin_name,
                version,
                ..
            } => format!("Plugin {} v{} loaded", plugin_name, version),
            SystemEvent::PluginUnloaded { plugin_name, .. } => {
                format!("Plugin {} unloaded", plugin_name)
            }
            SystemEvent::Error {
                source,
                message,
                severity,
                ..
            } => format!("[{}] {}: {}", severity, source, message),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            SystemEvent::Error { .. } | SystemEvent::JobFailed { .. } | SystemEvent::PreviewFailed { .. }
        )
    }

    pub fn is_job_event(&self) -> bool {
        self.job_id().is_some()
    }
}

struct Subscription {
    handler: Arc<dyn SystemEventHandler>,
    filter: Option<Box<dyn EventFilter>>,
}

/// In-memory implementation of the event bus
pub struct InMemoryEventBus {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    order: RwLock<Vec<SubscriptionId>>,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish_system_event(&self, event: SystemEvent) -> Result<()> {
        tracing::debug!("Publishing event: {}", event.event_type());

        let order = self.order.read().await.clone();
        let subscriptions = self.subscriptions.read().await;
        let mut handlers_called = 0;

        for id in order {
            let Some(subscription) = subscriptions.get(&id) else {
                continue;
            };

            if let Some(filter) = &subscription.filter {
                if !filter.should_handle(&event) {
                    continue;
                }
            }

            match subscription.handler.handle_system_event(&event).await {
                Ok(()) => handlers_called += 1,
                Err(e) => tracing::error!(
                    "Handler {} failed to process event {}: {}",
                    subscription.handler.handler_name(),
                    event.event_type(),
                    e
                ),
            }
        }

        tracing::trace!(
            "Routed event {} to {} handlers",
            event.event_type(),
            handlers_called
        );
        Ok(())
    }

    async fn subscribe_system_events(
        &self,
        handler: Arc<dyn SystemEventHandler>,
        filter: Option<Box<dyn EventFilter>>,
    ) -> Result<SubscriptionId> {
        let id = SubscriptionId::new();
        tracing::debug!(
            "Created subscription {:?} for handler {}",
            id,
            handler.handler_name()
        );

        self.subscriptions
            .write()
            .await
            .insert(id, Subscription { handler, filter });
        self.order.write().await.push(id);
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let removed = self.subscriptions.write().await.remove(&id);
        if removed.is_some() {
            self.order.write().await.retain(|sub| *sub != id);
            tracing::debug!("Removed subscription: {:?}", id);
        } else {
            tracing::warn!("Attempted to remove non-existent subscription: {:?}", id);
        }
        Ok(())
    }

    async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

/// Handler that records every event it receives
#[derive(Default)]
pub struct RecordingHandler {
    events: tokio::sync::Mutex<Vec<SystemEvent>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<SystemEvent> {
        self.events.lock().await.clone()
    }

    /// Event types received so far, in order
    pub async fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .await
            .iter()
            .map(|e| e.event_type())
            .collect()
    }
}

#[async_trait]
impl SystemEventHandler for RecordingHandler {
    async fn handle_system_event(&self, event: &SystemEvent) -> Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "RecordingHandler"
    }
}
