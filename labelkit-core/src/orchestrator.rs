//! Template preview orchestration
//!
//! A preview run saves the edited body (optionally), triggers a render,
//! waits for the render job when the server answers asynchronously,
//! downloads the artifact and registers it under an object URL. Steps run
//! strictly in sequence. Starting a run cancels the one in flight, and a
//! superseded run never replaces the current artifact.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::artifact::{ObjectUrlStore, PreviewArtifact};
use crate::error::{LabelError, Result};
use crate::event::{EventBus, SystemEvent};
use crate::job::JobState;
use crate::poller::{JobOutcome, JobPoller, PollPolicy};
use crate::template::{PreviewTarget, RenderPayload, TemplateContext};

#[derive(Default)]
struct RunState {
    generation: u64,
    cancel: Option<CancellationToken>,
    current: Option<PreviewArtifact>,
}

/// Drives save → render → wait → fetch for one preview surface
pub struct PreviewOrchestrator {
    api: ApiClient,
    poller: Arc<JobPoller>,
    event_bus: Arc<dyn EventBus>,
    urls: Arc<ObjectUrlStore>,
    inline_policy: PollPolicy,
    trigger_timeout: Duration,
    runs: Mutex<RunState>,
}

impl PreviewOrchestrator {
    pub fn new(api: ApiClient, poller: Arc<JobPoller>, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            api,
            poller,
            event_bus,
            urls: Arc::new(ObjectUrlStore::new()),
            inline_policy: PollPolicy::capped(PollPolicy::DEFAULT_INTERVAL, 120),
            trigger_timeout: Duration::from_secs(30),
            runs: Mutex::new(RunState::default()),
        }
    }

    pub fn with_inline_policy(mut self, policy: PollPolicy) -> Self {
        self.inline_policy = policy;
        self
    }

    pub fn with_trigger_timeout(mut self, timeout: Duration) -> Self {
        self.trigger_timeout = timeout;
        self
    }

    pub fn with_object_urls(mut self, urls: Arc<ObjectUrlStore>) -> Self {
        self.urls = urls;
        self
    }

    pub fn object_urls(&self) -> &Arc<ObjectUrlStore> {
        &self.urls
    }

    /// Artifact of the latest successful run
    pub fn current(&self) -> Option<PreviewArtifact> {
        self.runs.lock().ok().and_then(|runs| runs.current.clone())
    }

    /// Run the full preview sequence
    pub async fn run(
        &self,
        code: &str,
        target: &PreviewTarget,
        save_template: bool,
        context: &TemplateContext,
    ) -> Result<PreviewArtifact> {
        let (generation, cancel) = self.begin_run()?;
        tracing::info!(
            "Preview run {} for template {} (target {}, save={})",
            generation,
            context.template.pk,
            target,
            save_template
        );

        let result = self
            .execute(generation, &cancel, code, target, save_template, context)
            .await;
        self.end_run(generation);

        match &result {
            Ok(artifact) => {
                self.publish(SystemEvent::preview_updated(
                    artifact.display_url(),
                    artifact.content_type.clone(),
                ))
                .await;
            }
            Err(e) if e.is_superseded() => {
                tracing::debug!("Preview run {} superseded", generation);
            }
            Err(e) => {
                tracing::warn!("Preview run {} failed: {}", generation, e);
                self.publish(SystemEvent::preview_failed(e.to_string()))
                    .await;
            }
        }

        result
    }

    async fn execute(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        code: &str,
        target: &PreviewTarget,
        save_template: bool,
        context: &TemplateContext,
    ) -> Result<PreviewArtifact> {
        if save_template {
            let filename = context.template.upload_filename();
            guard(
                generation,
                cancel,
                self.api
                    .upload_template(&context.template_url, filename, code),
            )
            .await?;
            tracing::info!("Saved template {} as {}", context.template.pk, filename);
            self.publish(SystemEvent::template_saved(
                context.template.pk,
                filename.to_string(),
            ))
            .await;
        }

        let payload = RenderPayload::for_target(target, &context.template);
        let status = guard(
            generation,
            cancel,
            self.api
                .trigger_render(&context.printing_url, &payload, self.trigger_timeout),
        )
        .await?;

        let location = match status.state() {
            JobState::Failed { message } => return Err(LabelError::trigger(message)),
            JobState::Complete { output } => output,
            JobState::Loading { .. } | JobState::Idle => {
                let job_id = status.pk.ok_or_else(|| {
                    LabelError::trigger("Render request did not return a job id")
                })?;
                match self
                    .poller
                    .wait_for_output(job_id, self.inline_policy, cancel)
                    .await
                {
                    JobOutcome::Complete { output } => output,
                    JobOutcome::Failed { message } => return Err(LabelError::poll(message)),
                    JobOutcome::Cancelled => return Err(LabelError::Superseded(generation)),
                }
            }
        };

        let location =
            location.ok_or_else(|| LabelError::poll("Render finished without an output file"))?;

        let blob = guard(generation, cancel, self.api.fetch_artifact(&location)).await?;
        self.commit(generation, blob.bytes, &blob.content_type)
    }

    fn begin_run(&self) -> Result<(u64, CancellationToken)> {
        let mut runs = self.lock()?;
        if let Some(previous) = runs.cancel.take() {
            previous.cancel();
        }
        runs.generation += 1;
        let cancel = CancellationToken::new();
        runs.cancel = Some(cancel.clone());
        Ok((runs.generation, cancel))
    }

    fn end_run(&self, generation: u64) {
        if let Ok(mut runs) = self.runs.lock() {
            if runs.generation == generation {
                runs.cancel = None;
            }
        }
    }

    /// Register the artifact if this run is still the latest
    fn commit(&self, generation: u64, bytes: Vec<u8>, content_type: &str) -> Result<PreviewArtifact> {
        let mut runs = self.lock()?;
        if runs.generation != generation {
            return Err(LabelError::Superseded(generation));
        }

        let artifact = self.urls.create(bytes, content_type)?;
        if let Some(previous) = runs.current.replace(artifact.clone()) {
            self.urls.revoke(&previous.object_url)?;
        }
        Ok(artifact)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RunState>> {
        self.runs
            .lock()
            .map_err(|_| LabelError::state("Preview run state lock poisoned"))
    }

    async fn publish(&self, event: SystemEvent) {
        if let Err(e) = self.event_bus.publish_system_event(event).await {
            tracing::error!("Failed to publish preview event: {}", e);
        }
    }
}

/// Await `fut` unless the run is cancelled first
async fn guard<T>(
    generation: u64,
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(LabelError::Superseded(generation)),
        result = fut => result,
    }
}
