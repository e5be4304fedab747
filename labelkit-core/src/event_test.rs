#[cfg(test)]
mod tests {
    use crate::error::{ErrorSeverity, LabelError, Result};
    use crate::event::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FailingHandler;

    #[async_trait]
    impl SystemEventHandler for FailingHandler {
        async fn handle_system_event(&self, _event: &SystemEvent) -> Result<()> {
            Err(LabelError::event_bus("handler exploded"))
        }

        fn handler_name(&self) -> &str {
            "FailingHandler"
        }
    }

    #[test]
    fn test_event_creation_helpers() {
        let started = SystemEvent::job_started(99, "Print labels".to_string());
        assert_eq!(started.event_type(), "job_started");
        assert_eq!(started.job_id(), Some(99));
        assert!(started.is_job_event());
        assert!(!started.is_error());

        let failed = SystemEvent::job_failed(99, "Printer offline".to_string());
        assert!(failed.is_error());
        assert_eq!(failed.description(), "Job 99 failed: Printer offline");

        let progress = SystemEvent::job_progress(99, Some(1), Some(4));
        assert_eq!(progress.description(), "Job 99 progress 1/4");

        let switched = SystemEvent::editor_switched(Some("code".to_string()), "file".to_string());
        assert_eq!(switched.event_type(), "editor_switched");
        assert!(!switched.is_job_event());

        let error = SystemEvent::error(
            "preview".to_string(),
            "Render failed".to_string(),
            ErrorSeverity::High,
        );
        assert_eq!(error.description(), "[HIGH] preview: Render failed");
        assert!(error.is_error());
    }

    #[test]
    fn test_event_serialization() {
        let event = SystemEvent::preview_updated(
            "blob:labelkit/1#view=fitH".to_string(),
            "application/pdf".to_string(),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: SystemEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type(), "preview_updated");
        assert_eq!(back.description(), event.description());
    }

    #[tokio::test]
    async fn test_filtered_subscription() {
        let bus = InMemoryEventBus::new();
        let jobs = Arc::new(RecordingHandler::new());
        let all = Arc::new(RecordingHandler::new());

        bus.subscribe_system_events(
            jobs.clone(),
            Some(Box::new(EventTypeFilter::new(vec![
                "job_completed",
                "job_failed",
            ]))),
        )
        .await
        .unwrap();
        bus.subscribe_system_events(all.clone(), None).await.unwrap();

        bus.publish_system_event(SystemEvent::job_started(1, "Print".to_string()))
            .await
            .unwrap();
        bus.publish_system_event(SystemEvent::job_completed(1, None))
            .await
            .unwrap();

        assert_eq!(jobs.event_types().await, vec!["job_completed"]);
        assert_eq!(all.event_types().await, vec!["job_started", "job_completed"]);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_others() {
        let bus = InMemoryEventBus::new();
        let recorder = Arc::new(RecordingHandler::new());

        bus.subscribe_system_events(Arc::new(FailingHandler), None)
            .await
            .unwrap();
        bus.subscribe_system_events(recorder.clone(), None)
            .await
            .unwrap();

        bus.publish_system_event(SystemEvent::preview_failed("boom".to_string()))
            .await
            .unwrap();
        assert_eq!(recorder.event_types().await, vec!["preview_failed"]);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = InMemoryEventBus::new();
        let recorder = Arc::new(RecordingHandler::new());
        let id = bus
            .subscribe_system_events(recorder.clone(), None)
            .await
            .unwrap();
        assert_eq!(bus.subscription_count().await, 1);

        bus.unsubscribe(id).await.unwrap();
        assert_eq!(bus.subscription_count().await, 0);

        bus.publish_system_event(SystemEvent::plugin_unloaded("code-editor".to_string()))
            .await
            .unwrap();
        assert!(recorder.events().await.is_empty());
    }
}
