//! Built-in template editors for labelkit
//!
//! `code` keeps the template in memory. `file` mirrors it into a file on
//! disk so it can be edited with any external editor; the file is opened
//! asynchronously and the editor goes through an [`EditorBridge`] until it
//! is ready.

use async_trait::async_trait;
use labelkit_core::{
    CodeEditor, EditorBridge, EditorDescriptor, Plugin, PluginContext, PluginStatus, Result,
};
use std::path::PathBuf;
use std::sync::Arc;

mod file_editor;

pub use file_editor::FileEditor;

pub const PLUGIN_NAME: &str = "code-editor";
pub const CODE_EDITOR_KEY: &str = "code";
pub const FILE_EDITOR_KEY: &str = "file";

/// Editor holding the template in memory
#[derive(Default)]
pub struct BufferEditor {
    code: tokio::sync::RwLock<Option<String>>,
}

impl BufferEditor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CodeEditor for BufferEditor {
    async fn set_code(&self, code: &str) -> Result<()> {
        *self.code.write().await = Some(code.to_string());
        Ok(())
    }

    async fn get_code(&self) -> Result<Option<String>> {
        Ok(self.code.read().await.clone())
    }
}

/// Plugin registering the built-in editors
pub struct CodeEditorPlugin {
    name: String,
    version: String,
    status: PluginStatus,
}

impl CodeEditorPlugin {
    pub fn new() -> Self {
        Self {
            name: PLUGIN_NAME.to_string(),
            version: "0.1.0".to_string(),
            status: PluginStatus::Loading,
        }
    }

    /// Location of the mirrored template file
    fn file_path(context: &PluginContext) -> PathBuf {
        context
            .plugin_setting::<String>(PLUGIN_NAME, "file_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("labelkit").join("template.html"))
    }
}

impl Default for CodeEditorPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for CodeEditorPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn initialize(&mut self, context: &PluginContext) -> Result<()> {
        tracing::info!("Initializing code editor plugin");

        context
            .panels
            .register_editor(
                EditorDescriptor::new(CODE_EDITOR_KEY, "Code", |_ctx| {
                    Ok(Arc::new(BufferEditor::new()) as Arc<dyn CodeEditor>)
                })
                .with_icon("code"),
            )
            .await?;

        let path = Self::file_path(context);
        tracing::debug!("File editor mirrors {}", path.display());
        context
            .panels
            .register_editor(
                EditorDescriptor::new(FILE_EDITOR_KEY, "File", move |ctx| {
                    let path = path.clone();
                    let bridge = EditorBridge::spawn_with_timeout(
                        PLUGIN_NAME,
                        ctx.config.render.plugin_init_timeout(),
                        move |registration| async move {
                            let editor = FileEditor::open(path).await?;
                            registration.register(Arc::new(editor)).await?;
                            Ok(())
                        },
                    );
                    Ok(bridge as Arc<dyn CodeEditor>)
                })
                .with_icon("file"),
            )
            .await?;

        self.status = PluginStatus::Active;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down code editor plugin");
        self.status = PluginStatus::Stopped;
        Ok(())
    }

    fn status(&self) -> PluginStatus {
        self.status.clone()
    }

    fn provided_panels(&self) -> Vec<&str> {
        vec![CODE_EDITOR_KEY, FILE_EDITOR_KEY]
    }
}
