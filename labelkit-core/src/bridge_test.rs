//! Tests for the plugin panel bridges

#[cfg(test)]
mod tests {
    use crate::bridge::*;
    use crate::editor::CodeEditor;
    use crate::error::Result;
    use crate::preview::{PreviewArea, PreviewSurface};
    use crate::template::{PreviewTarget, TemplateContext};
    use crate::test_support::label_context;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct MemoryEditor {
        code: Mutex<Option<String>>,
        writes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CodeEditor for MemoryEditor {
        async fn set_code(&self, code: &str) -> Result<()> {
            *self.code.lock().unwrap() = Some(code.to_string());
            self.writes.lock().unwrap().push(code.to_string());
            Ok(())
        }

        async fn get_code(&self) -> Result<Option<String>> {
            Ok(self.code.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct RecordingPreview {
        calls: Mutex<Vec<(String, PreviewTarget, bool)>>,
    }

    #[async_trait]
    impl PreviewArea for RecordingPreview {
        async fn update_preview(
            &self,
            code: &str,
            target: &PreviewTarget,
            save_template: bool,
            _context: &TemplateContext,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((code.to_string(), *target, save_template));
            Ok(())
        }

        async fn surface(&self) -> PreviewSurface {
            PreviewSurface::Document {
                url: "blob:labelkit/test#view=fitH".to_string(),
                content_type: "application/pdf".to_string(),
            }
        }
    }

    #[tokio::test]
    async fn test_set_code_buffered_until_ready() {
        let (release, gate) = oneshot::channel::<()>();
        let inner = Arc::new(MemoryEditor::default());
        let handlers = inner.clone();

        let bridge = EditorBridge::spawn("slow-editor", move |registration| async move {
            gate.await?;
            registration.register(handlers).await?;
            Ok(())
        });

        bridge.set_code("first").await.unwrap();
        bridge.set_code("second").await.unwrap();
        assert_eq!(bridge.status().await, BridgeStatus::Loading);
        assert_eq!(bridge.get_code().await.unwrap().as_deref(), Some("second"));
        assert!(inner.writes.lock().unwrap().is_empty());

        release.send(()).unwrap();
        assert_eq!(bridge.settled().await, BridgeStatus::Ready);

        // Only the latest buffered value is replayed
        assert_eq!(*inner.writes.lock().unwrap(), vec!["second"]);

        bridge.set_code("third").await.unwrap();
        assert_eq!(bridge.get_code().await.unwrap().as_deref(), Some("third"));
    }

    #[tokio::test]
    async fn test_failed_initialisation_shows_error_panel() {
        let bridge = PreviewBridge::spawn("broken-preview", |_registration| async move {
            anyhow::bail!("viewer assets missing")
        });

        let status = bridge.settled().await;
        match status {
            BridgeStatus::Error(message) => assert!(message.contains("viewer assets missing")),
            other => panic!("unexpected status {:?}", other),
        }

        // The host keeps working
        bridge
            .update_preview("body", &PreviewTarget::Instance(1), false, &label_context())
            .await
            .unwrap();
        assert!(matches!(
            bridge.surface().await,
            PreviewSurface::ErrorPanel { .. }
        ));
    }

    #[tokio::test]
    async fn test_panicking_plugin_is_contained() {
        let bridge = EditorBridge::spawn("panicky", |_registration| async move {
            if true {
                panic!("boom");
            }
            Ok(())
        });

        match bridge.settled().await {
            BridgeStatus::Error(message) => assert!(message.contains("panicked")),
            other => panic!("unexpected status {:?}", other),
        }

        // Buffered content survives for the next editor
        bridge.set_code("kept").await.unwrap();
        assert_eq!(bridge.get_code().await.unwrap().as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_plugin_that_never_registers() {
        let bridge = EditorBridge::spawn("lazy", |_registration| async move { Ok(()) });
        assert!(matches!(bridge.settled().await, BridgeStatus::Error(_)));
    }

    #[tokio::test]
    async fn test_preview_waits_for_plugin() {
        let (release, gate) = oneshot::channel::<()>();
        let inner = Arc::new(RecordingPreview::default());
        let handler = inner.clone();

        let bridge = PreviewBridge::spawn("slow-preview", move |registration| async move {
            gate.await?;
            registration.register(handler).await?;
            Ok(())
        });
        assert_eq!(bridge.surface().await, PreviewSurface::Empty);

        let pending = {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                bridge
                    .update_preview("body", &PreviewTarget::Aggregate, true, &label_context())
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(inner.calls.lock().unwrap().is_empty());

        release.send(()).unwrap();
        pending.await.unwrap().unwrap();

        assert_eq!(
            *inner.calls.lock().unwrap(),
            vec![("body".to_string(), PreviewTarget::Aggregate, true)]
        );
        assert!(matches!(
            bridge.surface().await,
            PreviewSurface::Document { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_initialiser_times_out() {
        let bridge = PreviewBridge::spawn("stalled-preview", |_registration| async move {
            std::future::pending::<anyhow::Result<()>>().await
        });

        let update = tokio::time::timeout(
            Duration::from_secs(3600),
            bridge.update_preview("body", &PreviewTarget::Instance(1), false, &label_context()),
        )
        .await;
        update.unwrap().unwrap();

        match bridge.surface().await {
            PreviewSurface::ErrorPanel { message } => {
                assert!(message.contains("did not finish initialisation"))
            }
            other => panic!("unexpected surface {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_editor_init_timeout_keeps_buffer() {
        let bridge = EditorBridge::spawn_with_timeout(
            "stalled-editor",
            Duration::from_millis(50),
            |_registration| async move { std::future::pending::<anyhow::Result<()>>().await },
        );
        bridge.set_code("draft").await.unwrap();

        assert!(matches!(bridge.settled().await, BridgeStatus::Error(_)));
        assert_eq!(bridge.get_code().await.unwrap().as_deref(), Some("draft"));
    }
}
