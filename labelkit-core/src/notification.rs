//! Transient status indicators keyed by id

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Visual tone of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

/// A single status indicator
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    /// Spinner shown while work is in progress
    pub loading: bool,
    /// Percent complete; `None` renders an indeterminate indicator
    pub progress: Option<u8>,
    pub dismiss_at: Option<Instant>,
}

impl Notification {
    pub fn new(id: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            message: message.into(),
            kind: NotificationKind::Info,
            loading: false,
            progress: None,
            dismiss_at: None,
        }
    }

    pub fn kind(mut self, kind: NotificationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn loading(mut self, progress: Option<u8>) -> Self {
        self.loading = true;
        self.progress = progress;
        self
    }

    pub fn auto_close(mut self, after: Duration) -> Self {
        self.dismiss_at = Some(Instant::now() + after);
        self
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.dismiss_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Indicator id for a job title; jobs sharing a title share an indicator
pub fn indicator_id(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("data-output-{}", slug)
}

/// Store of visible notifications
#[derive(Debug, Default)]
pub struct NotificationCenter {
    entries: RwLock<HashMap<String, Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a notification, replacing any with the same id
    pub async fn show(&self, notification: Notification) {
        tracing::trace!(
            "Notification {}: {} ({:?})",
            notification.id,
            notification.message,
            notification.kind
        );
        self.entries
            .write()
            .await
            .insert(notification.id.clone(), notification);
    }

    pub async fn hide(&self, id: &str) {
        self.entries.write().await.remove(id);
    }

    /// Current notification for an id, unless it has been dismissed
    pub async fn get(&self, id: &str) -> Option<Notification> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(id)
            .filter(|n| !n.is_expired(now))
            .cloned()
    }

    /// All visible notifications; expired ones are dropped
    pub async fn active(&self) -> Vec<Notification> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, n| !n.is_expired(now));
        let mut visible: Vec<_> = entries.values().cloned().collect();
        visible.sort_by(|a, b| a.id.cmp(&b.id));
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_same_id_overwrites() {
        let center = NotificationCenter::new();
        let id = indicator_id("Print Labels");
        center
            .show(Notification::new(&id, "Print Labels", "Working").loading(None))
            .await;
        center
            .show(Notification::new(&id, "Print Labels", "Half way").loading(Some(50)))
            .await;

        let active = center.active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].progress, Some(50));
        assert_eq!(id, "data-output-print-labels");
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_close_dismisses() {
        let center = NotificationCenter::new();
        center
            .show(
                Notification::new("a", "t", "done")
                    .kind(NotificationKind::Success)
                    .auto_close(Duration::from_secs(2)),
            )
            .await;
        assert!(center.get("a").await.is_some());

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(center.get("a").await.is_none());
        assert!(center.active().await.is_empty());
    }
}
