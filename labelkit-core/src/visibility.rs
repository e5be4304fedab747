//! Host document visibility used to pause polling

use tokio::sync::watch;

/// Shared visibility flag; clones observe the same state
#[derive(Clone, Debug)]
pub struct Visibility {
    tx: watch::Sender<bool>,
}

impl Visibility {
    /// Start out visible
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx }
    }

    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn set_visible(&self, visible: bool) {
        self.tx.send_if_modified(|current| {
            if *current == visible {
                false
            } else {
                tracing::debug!("Host visibility changed: visible={}", visible);
                *current = visible;
                true
            }
        });
    }

    /// Resolve once the host is visible
    pub async fn wait_visible(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|visible| *visible).await;
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::new()
    }
}
