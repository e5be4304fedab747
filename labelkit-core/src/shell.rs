//! Editor shell hosting one editor and one preview side by side

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::editor::CodeEditor;
use crate::error::{LabelError, Result};
use crate::event::SystemEvent;
use crate::plugin::PluginContext;
use crate::preview::{PreviewArea, PreviewSurface};
use crate::state::ShellState;
use crate::template::{PreviewTarget, TemplateContext};

struct Mounted<T: ?Sized> {
    key: String,
    handle: Arc<T>,
}

/// Result of a reload as seen by the shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The preview now shows this URL
    Updated(Option<String>),
    /// The render failed; the message is in the error overlay and the
    /// previous preview stays in place
    Failed(String),
    /// The preview plugin is unavailable and shows an error panel
    Unavailable(String),
    /// A newer reload started before this one finished
    Superseded,
}

/// Editor/preview pair for one template
pub struct EditorShell {
    context: PluginContext,
    template: TemplateContext,
    editor: Mutex<Option<Mounted<dyn CodeEditor>>>,
    preview: Mutex<Option<Mounted<dyn PreviewArea>>>,
    /// Last code read from or written to the editor
    code: RwLock<String>,
}

impl EditorShell {
    /// Mount the configured default editor and preview
    pub async fn open(
        context: PluginContext,
        template: TemplateContext,
        initial_code: String,
    ) -> Result<Self> {
        let shell = Self {
            context,
            template,
            editor: Mutex::new(None),
            preview: Mutex::new(None),
            code: RwLock::new(initial_code),
        };

        let editor_key = shell.default_editor_key().await?;
        shell.switch_editor(&editor_key).await?;

        let preview_key = shell.default_preview_key().await?;
        shell.switch_preview(&preview_key).await?;

        Ok(shell)
    }

    pub fn template(&self) -> &TemplateContext {
        &self.template
    }

    pub async fn state(&self) -> ShellState {
        self.context.state_manager.get_state().await
    }

    pub async fn active_editor(&self) -> Option<String> {
        self.editor.lock().await.as_ref().map(|m| m.key.clone())
    }

    pub async fn active_preview(&self) -> Option<String> {
        self.preview.lock().await.as_ref().map(|m| m.key.clone())
    }

    /// Current template code, read from the active editor when it has any
    pub async fn code(&self) -> Result<String> {
        let editor = self.editor.lock().await;
        if let Some(mounted) = editor.as_ref() {
            if let Some(code) = mounted.handle.get_code().await? {
                *self.code.write().await = code.clone();
                return Ok(code);
            }
        }
        Ok(self.code.read().await.clone())
    }

    /// Replace the code in the active editor
    pub async fn set_code(&self, code: &str) -> Result<()> {
        *self.code.write().await = code.to_string();
        if let Some(mounted) = self.editor.lock().await.as_ref() {
            mounted.handle.set_code(code).await?;
        }
        Ok(())
    }

    /// Swap the active editor, carrying the current code across
    pub async fn switch_editor(&self, key: &str) -> Result<()> {
        let descriptor = self
            .context
            .panels
            .editor(key)
            .await
            .ok_or_else(|| LabelError::plugin(format!("Unknown editor: {}", key)))?;

        let mut editor = self.editor.lock().await;
        if editor.as_ref().is_some_and(|m| m.key == key) {
            return Ok(());
        }

        let mut code = self.code.read().await.clone();
        if let Some(outgoing) = editor.as_ref() {
            if let Some(current) = outgoing.handle.get_code().await? {
                code = current;
            }
        }

        let handle = descriptor.mount(&self.context)?;
        handle.set_code(&code).await?;

        let previous = editor.replace(Mounted {
            key: key.to_string(),
            handle,
        });
        let from = match previous {
            Some(outgoing) => {
                if let Err(e) = outgoing.handle.unmount().await {
                    tracing::warn!("Failed to unmount editor {}: {}", outgoing.key, e);
                }
                Some(outgoing.key)
            }
            None => None,
        };
        drop(editor);

        *self.code.write().await = code;
        self.context
            .state_manager
            .set_active_editor(Some(key.to_string()))
            .await;

        tracing::info!("Active editor: {}", key);
        if let Err(e) = self
            .context
            .event_bus
            .publish_system_event(SystemEvent::editor_switched(from, key.to_string()))
            .await
        {
            tracing::warn!("Failed to publish editor event: {}", e);
        }
        Ok(())
    }

    /// Swap the active preview area
    pub async fn switch_preview(&self, key: &str) -> Result<()> {
        let descriptor = self
            .context
            .panels
            .preview(key)
            .await
            .ok_or_else(|| LabelError::plugin(format!("Unknown preview: {}", key)))?;

        let mut preview = self.preview.lock().await;
        if preview.as_ref().is_some_and(|m| m.key == key) {
            return Ok(());
        }

        let handle = descriptor.mount(&self.context)?;
        if let Some(outgoing) = preview.replace(Mounted {
            key: key.to_string(),
            handle,
        }) {
            if let Err(e) = outgoing.handle.unmount().await {
                tracing::warn!("Failed to unmount preview {}: {}", outgoing.key, e);
            }
        }
        drop(preview);

        self.context
            .state_manager
            .set_active_preview(Some(key.to_string()))
            .await;
        tracing::info!("Active preview: {}", key);
        Ok(())
    }

    pub async fn set_target(&self, target: Option<PreviewTarget>) {
        self.context.state_manager.set_target(target).await;
    }

    /// Render the current code against the selected target
    ///
    /// Render failures land in the error overlay, keep the previous preview
    /// and come back as [`ReloadOutcome::Failed`]. A reload overtaken by a
    /// newer one leaves the state untouched. Only a missing target or
    /// preview area, or an unreadable editor, is returned as an error.
    pub async fn reload(&self, save_template: bool) -> Result<ReloadOutcome> {
        let target = self
            .state()
            .await
            .target
            .ok_or_else(|| LabelError::state("Select a preview target first"))?;

        let preview = self
            .preview
            .lock()
            .await
            .as_ref()
            .map(|m| Arc::clone(&m.handle))
            .ok_or_else(|| LabelError::state("No preview area mounted"))?;

        let state = &self.context.state_manager;
        let generation = state.begin_reload().await;
        let code = self.code().await?;

        let result = preview
            .update_preview(&code, &target, save_template, &self.template)
            .await;

        match result {
            Ok(()) => match preview.surface().await {
                PreviewSurface::ErrorPanel { message } => {
                    if !state.finish_reload_err(generation, message.clone()).await {
                        return Ok(ReloadOutcome::Superseded);
                    }
                    Ok(ReloadOutcome::Unavailable(message))
                }
                surface => {
                    let url = match surface {
                        PreviewSurface::Document { url, .. } => Some(url),
                        _ => None,
                    };
                    if !state.finish_reload_ok(generation, url.clone()).await {
                        return Ok(ReloadOutcome::Superseded);
                    }
                    Ok(ReloadOutcome::Updated(url))
                }
            },
            Err(e) if e.is_superseded() => Ok(ReloadOutcome::Superseded),
            Err(e) => {
                let message = e.to_string();
                if !state.finish_reload_err(generation, message.clone()).await {
                    return Ok(ReloadOutcome::Superseded);
                }
                tracing::warn!("Preview reload failed: {}", message);
                Ok(ReloadOutcome::Failed(message))
            }
        }
    }

    pub async fn dismiss_error(&self) {
        self.context.state_manager.dismiss_error().await;
    }

    /// Unmount both panels
    pub async fn close(&self) -> Result<()> {
        if let Some(mounted) = self.editor.lock().await.take() {
            if let Some(code) = mounted.handle.get_code().await? {
                *self.code.write().await = code;
            }
            mounted.handle.unmount().await?;
        }
        if let Some(mounted) = self.preview.lock().await.take() {
            mounted.handle.unmount().await?;
        }
        self.context.state_manager.set_active_editor(None).await;
        self.context.state_manager.set_active_preview(None).await;
        Ok(())
    }

    async fn default_editor_key(&self) -> Result<String> {
        let preferred = &self.context.config.render.default_editor;
        if self.context.panels.editor(preferred).await.is_some() {
            return Ok(preferred.clone());
        }
        self.context
            .panels
            .editors()
            .await
            .first()
            .map(|d| d.key.clone())
            .ok_or_else(|| LabelError::plugin("No editor registered"))
    }

    async fn default_preview_key(&self) -> Result<String> {
        let preferred = &self.context.config.render.default_preview;
        if self.context.panels.preview(preferred).await.is_some() {
            return Ok(preferred.clone());
        }
        self.context
            .panels
            .previews()
            .await
            .first()
            .map(|d| d.key.clone())
            .ok_or_else(|| LabelError::plugin("No preview registered"))
    }
}
