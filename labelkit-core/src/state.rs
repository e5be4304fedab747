//! State management for the editor shell

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::template::PreviewTarget;

/// Snapshot of what the editor shell shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellState {
    pub active_editor: Option<String>,
    pub active_preview: Option<String>,
    pub target: Option<PreviewTarget>,
    /// Last successfully rendered preview; kept when later runs fail
    pub preview_url: Option<String>,
    /// Error overlay shown above the preview
    pub error_overlay: Option<String>,
    /// Reload controls are disabled while true
    pub is_loading: bool,
    /// Latest reload request
    pub generation: u64,
}

/// Shell state manager
pub struct StateManager {
    state: Arc<RwLock<ShellState>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ShellState::default())),
        }
    }

    /// Get the current state (read-only copy)
    pub async fn get_state(&self) -> ShellState {
        self.state.read().await.clone()
    }

    pub async fn set_active_editor(&self, key: Option<String>) {
        self.state.write().await.active_editor = key;
    }

    pub async fn set_active_preview(&self, key: Option<String>) {
        self.state.write().await.active_preview = key;
    }

    pub async fn set_target(&self, target: Option<PreviewTarget>) {
        self.state.write().await.target = target;
    }

    /// Start a reload and return its generation
    pub async fn begin_reload(&self) -> u64 {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.is_loading = true;
        state.generation
    }

    /// Record a successful reload; stale generations are ignored
    pub async fn finish_reload_ok(&self, generation: u64, preview_url: Option<String>) -> bool {
        let mut state = self.state.write().await;
        if state.generation != generation {
            return false;
        }
        state.is_loading = false;
        state.error_overlay = None;
        if preview_url.is_some() {
            state.preview_url = preview_url;
        }
        true
    }

    /// Record a failed reload; the previous preview stays visible
    pub async fn finish_reload_err(&self, generation: u64, message: String) -> bool {
        let mut state = self.state.write().await;
        if state.generation != generation {
            return false;
        }
        state.is_loading = false;
        state.error_overlay = Some(message);
        true
    }

    pub async fn dismiss_error(&self) {
        self.state.write().await.error_overlay = None;
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
