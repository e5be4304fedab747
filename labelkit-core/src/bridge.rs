//! Adapters for plugin panels with asynchronous initialisation
//!
//! A plugin initialiser receives a registration handle and calls back with
//! its real handlers once it is ready. Until then the bridge buffers editor
//! content. When the initialiser fails or panics, the bridge turns into an
//! inline error panel instead of taking the host down.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

use crate::editor::CodeEditor;
use crate::error::{LabelError, Result};
use crate::preview::{PreviewArea, PreviewSurface};
use crate::template::{PreviewTarget, TemplateContext};

/// Time an initialiser gets to register before the panel is marked failed
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle of a bridged plugin panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeStatus {
    Loading,
    Ready,
    Error(String),
}

enum BridgeState<H> {
    Pending { buffered_code: Option<String> },
    Ready(H),
    Failed {
        message: String,
        buffered_code: Option<String>,
    },
}

struct Slot<H> {
    state: Mutex<BridgeState<H>>,
    settled: watch::Sender<bool>,
}

impl<H: Clone + Send + Sync + 'static> Slot<H> {
    fn new() -> Arc<Self> {
        let (settled, _rx) = watch::channel(false);
        Arc::new(Self {
            state: Mutex::new(BridgeState::Pending {
                buffered_code: None,
            }),
            settled,
        })
    }

    async fn status(&self) -> BridgeStatus {
        match &*self.state.lock().await {
            BridgeState::Pending { .. } => BridgeStatus::Loading,
            BridgeState::Ready(_) => BridgeStatus::Ready,
            BridgeState::Failed { message, .. } => BridgeStatus::Error(message.clone()),
        }
    }

    async fn wait_settled(&self) {
        let mut rx = self.settled.subscribe();
        let _ = rx.wait_for(|settled| *settled).await;
    }

    fn mark_settled(&self) {
        self.settled.send_replace(true);
    }

    async fn fail(&self, message: String) {
        let mut state = self.state.lock().await;
        let buffered_code = match &mut *state {
            BridgeState::Pending { buffered_code } => buffered_code.take(),
            BridgeState::Ready(_) => None,
            BridgeState::Failed { .. } => return,
        };
        tracing::error!("Plugin panel failed: {}", message);
        *state = BridgeState::Failed {
            message,
            buffered_code,
        };
        drop(state);
        self.mark_settled();
    }

    /// Run the initialiser in its own task and record failures
    ///
    /// An initialiser still pending after `init_timeout` is aborted.
    fn supervise<Fut>(self: &Arc<Self>, plugin: String, init_timeout: Duration, init: Fut)
    where
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let slot = Arc::clone(self);
        tokio::spawn(async move {
            let mut task = tokio::spawn(init);
            let joined = match tokio::time::timeout(init_timeout, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    if matches!(&*slot.state.lock().await, BridgeState::Pending { .. }) {
                        task.abort();
                        slot.fail(format!(
                            "Plugin {} did not finish initialisation within {:?}",
                            plugin, init_timeout
                        ))
                        .await;
                        return;
                    }
                    // Registered already; let the initialiser run on
                    task.await
                }
            };

            let message = match joined {
                Ok(Ok(())) => {
                    if matches!(&*slot.state.lock().await, BridgeState::Pending { .. }) {
                        Some(format!(
                            "Plugin {} finished initialisation without registering handlers",
                            plugin
                        ))
                    } else {
                        None
                    }
                }
                Ok(Err(e)) => Some(format!("Plugin {} failed to initialise: {:#}", plugin, e)),
                Err(e) if e.is_panic() => {
                    Some(format!("Plugin {} panicked during initialisation", plugin))
                }
                Err(e) => Some(format!("Plugin {} initialisation aborted: {}", plugin, e)),
            };

            if let Some(message) = message {
                slot.fail(message).await;
            }
        });
    }
}

/// Handle a plugin uses to hand over its editor handlers
pub struct EditorRegistration {
    slot: Arc<Slot<Arc<dyn CodeEditor>>>,
}

impl EditorRegistration {
    /// Install the real handlers and replay any buffered content
    pub async fn register(&self, handlers: Arc<dyn CodeEditor>) -> Result<()> {
        let mut state = self.slot.state.lock().await;
        let buffered = match &mut *state {
            BridgeState::Pending { buffered_code } => buffered_code.take(),
            BridgeState::Ready(_) => {
                return Err(LabelError::plugin("Editor handlers already registered"));
            }
            BridgeState::Failed { message, .. } => {
                return Err(LabelError::plugin(message.clone()));
            }
        };

        // Still holding the lock so no newer set_code can slip in between
        if let Some(code) = buffered {
            handlers.set_code(&code).await?;
        }
        *state = BridgeState::Ready(handlers);
        drop(state);

        self.slot.mark_settled();
        Ok(())
    }
}

/// [`CodeEditor`] backed by an asynchronously initialised plugin
pub struct EditorBridge {
    slot: Arc<Slot<Arc<dyn CodeEditor>>>,
}

impl EditorBridge {
    /// Start the plugin initialiser and return the bridge immediately
    pub fn spawn<F, Fut>(plugin: &str, init: F) -> Arc<Self>
    where
        F: FnOnce(EditorRegistration) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::spawn_with_timeout(plugin, DEFAULT_INIT_TIMEOUT, init)
    }

    pub fn spawn_with_timeout<F, Fut>(plugin: &str, init_timeout: Duration, init: F) -> Arc<Self>
    where
        F: FnOnce(EditorRegistration) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let slot = Slot::new();
        let registration = EditorRegistration {
            slot: Arc::clone(&slot),
        };
        slot.supervise(plugin.to_string(), init_timeout, async move {
            init(registration).await
        });
        Arc::new(Self { slot })
    }

    pub async fn status(&self) -> BridgeStatus {
        self.slot.status().await
    }

    /// Wait until the plugin registered or failed
    pub async fn settled(&self) -> BridgeStatus {
        self.slot.wait_settled().await;
        self.status().await
    }
}

#[async_trait]
impl CodeEditor for EditorBridge {
    async fn set_code(&self, code: &str) -> Result<()> {
        let mut state = self.slot.state.lock().await;
        match &mut *state {
            BridgeState::Pending { buffered_code } | BridgeState::Failed { buffered_code, .. } => {
                *buffered_code = Some(code.to_string());
                Ok(())
            }
            BridgeState::Ready(handlers) => handlers.set_code(code).await,
        }
    }

    async fn get_code(&self) -> Result<Option<String>> {
        let state = self.slot.state.lock().await;
        match &*state {
            BridgeState::Pending { buffered_code } | BridgeState::Failed { buffered_code, .. } => {
                Ok(buffered_code.clone())
            }
            BridgeState::Ready(handlers) => handlers.get_code().await,
        }
    }

    async fn unmount(&self) -> Result<()> {
        let handlers = match &*self.slot.state.lock().await {
            BridgeState::Ready(handlers) => Some(Arc::clone(handlers)),
            _ => None,
        };
        match handlers {
            Some(handlers) => handlers.unmount().await,
            None => Ok(()),
        }
    }
}

/// Handle a plugin uses to hand over its preview handler
pub struct PreviewRegistration {
    slot: Arc<Slot<Arc<dyn PreviewArea>>>,
}

impl PreviewRegistration {
    pub async fn register(&self, handler: Arc<dyn PreviewArea>) -> Result<()> {
        let mut state = self.slot.state.lock().await;
        match &*state {
            BridgeState::Pending { .. } => {}
            BridgeState::Ready(_) => {
                return Err(LabelError::plugin("Preview handler already registered"));
            }
            BridgeState::Failed { message, .. } => {
                return Err(LabelError::plugin(message.clone()));
            }
        }
        *state = BridgeState::Ready(handler);
        drop(state);

        self.slot.mark_settled();
        Ok(())
    }
}

/// [`PreviewArea`] backed by an asynchronously initialised plugin
pub struct PreviewBridge {
    slot: Arc<Slot<Arc<dyn PreviewArea>>>,
}

impl PreviewBridge {
    pub fn spawn<F, Fut>(plugin: &str, init: F) -> Arc<Self>
    where
        F: FnOnce(PreviewRegistration) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::spawn_with_timeout(plugin, DEFAULT_INIT_TIMEOUT, init)
    }

    pub fn spawn_with_timeout<F, Fut>(plugin: &str, init_timeout: Duration, init: F) -> Arc<Self>
    where
        F: FnOnce(PreviewRegistration) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let slot = Slot::new();
        let registration = PreviewRegistration {
            slot: Arc::clone(&slot),
        };
        slot.supervise(plugin.to_string(), init_timeout, async move {
            init(registration).await
        });
        Arc::new(Self { slot })
    }

    pub async fn status(&self) -> BridgeStatus {
        self.slot.status().await
    }

    pub async fn settled(&self) -> BridgeStatus {
        self.slot.wait_settled().await;
        self.status().await
    }

    async fn handler(&self) -> Option<Arc<dyn PreviewArea>> {
        match &*self.slot.state.lock().await {
            BridgeState::Ready(handler) => Some(Arc::clone(handler)),
            _ => None,
        }
    }
}

#[async_trait]
impl PreviewArea for PreviewBridge {
    async fn update_preview(
        &self,
        code: &str,
        target: &PreviewTarget,
        save_template: bool,
        context: &TemplateContext,
    ) -> Result<()> {
        // Requests made during initialisation wait for the plugin, at most
        // until the initialiser times out
        self.slot.wait_settled().await;

        match self.handler().await {
            Some(handler) => {
                handler
                    .update_preview(code, target, save_template, context)
                    .await
            }
            None => {
                tracing::warn!("Preview plugin unavailable, showing error panel");
                Ok(())
            }
        }
    }

    async fn surface(&self) -> PreviewSurface {
        let handler = {
            let state = self.slot.state.lock().await;
            match &*state {
                BridgeState::Pending { .. } => return PreviewSurface::Empty,
                BridgeState::Failed { message, .. } => {
                    return PreviewSurface::ErrorPanel {
                        message: message.clone(),
                    }
                }
                BridgeState::Ready(handler) => Arc::clone(handler),
            }
        };
        handler.surface().await
    }

    async fn unmount(&self) -> Result<()> {
        match self.handler().await {
            Some(handler) => handler.unmount().await,
            None => Ok(()),
        }
    }
}
