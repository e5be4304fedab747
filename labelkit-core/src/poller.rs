//! Data output job poller
//!
//! Follows a server-side job by querying its status endpoint at a fixed
//! interval until the job completes, fails, or the attempt budget runs out.
//! Polling pauses while the host is not visible and every job reports its
//! terminal state exactly once.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::error::{LabelError, Result};
use crate::event::{EventBus, SystemEvent};
use crate::job::{JobState, GENERIC_FAILURE, SUCCESS_MESSAGE};
use crate::notification::{indicator_id, Notification, NotificationCenter, NotificationKind};
use crate::visibility::Visibility;

/// Message used when the attempt budget is exhausted
pub const TIMEOUT_MESSAGE: &str = "Timed out waiting for the server to finish rendering";

/// How often to poll and for how long
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until the server reports a terminal state
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

    pub fn uncapped(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    pub fn capped(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::uncapped(Self::DEFAULT_INTERVAL)
    }
}

/// Opens a finished job's output for viewing
#[async_trait]
pub trait OutputOpener: Send + Sync {
    async fn open(&self, location: &str) -> Result<()>;
}

/// Terminal result of polling one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Complete { output: Option<String> },
    Failed { message: String },
    Cancelled,
}

/// Whether the poll drives the user-facing indicator and opener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollMode {
    Standalone,
    Inline,
}

/// Polls data output jobs
pub struct JobPoller {
    api: ApiClient,
    event_bus: Arc<dyn EventBus>,
    notifications: Arc<NotificationCenter>,
    visibility: Visibility,
    opener: Option<Arc<dyn OutputOpener>>,
    policy: PollPolicy,
    dismiss_delay: Duration,
}

impl JobPoller {
    pub fn new(
        api: ApiClient,
        event_bus: Arc<dyn EventBus>,
        notifications: Arc<NotificationCenter>,
        visibility: Visibility,
    ) -> Self {
        Self {
            api,
            event_bus,
            notifications,
            visibility,
            opener: None,
            policy: PollPolicy::default(),
            dismiss_delay: Duration::from_secs(2),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn OutputOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn with_dismiss_delay(mut self, delay: Duration) -> Self {
        self.dismiss_delay = delay;
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    /// Start following a job in the background; `None` is inactive
    pub fn watch(self: &Arc<Self>, job_id: Option<u64>, title: &str) -> Option<JobWatch> {
        let job_id = job_id?;
        let cancel = CancellationToken::new();
        let poller = Arc::clone(self);
        let title = title.to_string();
        let token = cancel.clone();

        let handle = tokio::spawn(async move { poller.poll(job_id, &title, &token).await });

        Some(JobWatch {
            job_id,
            cancel,
            handle: Some(handle),
        })
    }

    /// Poll a job with the configured policy, driving the status indicator
    pub async fn poll(&self, job_id: u64, title: &str, cancel: &CancellationToken) -> JobOutcome {
        self.run(job_id, title, self.policy, cancel, PollMode::Standalone)
            .await
    }

    /// Wait for a job's output without touching the status indicator
    pub async fn wait_for_output(
        &self,
        job_id: u64,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        self.run(job_id, "Rendering preview", policy, cancel, PollMode::Inline)
            .await
    }

    async fn run(
        &self,
        job_id: u64,
        title: &str,
        policy: PollPolicy,
        cancel: &CancellationToken,
        mode: PollMode,
    ) -> JobOutcome {
        tracing::info!("Polling data output {} ({})", job_id, title);
        let indicator = indicator_id(title);

        self.publish(SystemEvent::job_started(job_id, title.to_string()))
            .await;
        if mode == PollMode::Standalone {
            self.notifications
                .show(Notification::new(&indicator, title, "Processing").loading(None))
                .await;
        }

        let mut ticker = tokio::time::interval(policy.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempts: u32 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Polling of data output {} cancelled", job_id);
                    return JobOutcome::Cancelled;
                }
                _ = ticker.tick() => {}
            }

            if !self.visibility.is_visible() {
                tracing::trace!("Host hidden, pausing poll of data output {}", job_id);
                tokio::select! {
                    _ = cancel.cancelled() => return JobOutcome::Cancelled,
                    _ = self.visibility.wait_visible() => {}
                }
                continue;
            }

            if policy.max_attempts.is_some_and(|max| attempts >= max) {
                tracing::warn!(
                    "Data output {} not complete after {} attempts",
                    job_id,
                    attempts
                );
                return self
                    .fail(job_id, title, &indicator, TIMEOUT_MESSAGE.to_string(), mode)
                    .await;
            }
            attempts += 1;

            let status = tokio::select! {
                _ = cancel.cancelled() => return JobOutcome::Cancelled,
                status = self.api.job_status(job_id) => status,
            };

            let output = match status {
                Ok(output) => output,
                Err(LabelError::Poll(message)) => {
                    return self.fail(job_id, title, &indicator, message, mode).await;
                }
                Err(e) => {
                    tracing::warn!("Status request for data output {} failed: {}", job_id, e);
                    return self
                        .fail(job_id, title, &indicator, GENERIC_FAILURE.to_string(), mode)
                        .await;
                }
            };

            let state = output.state();
            let percent = state.percent();
            match state {
                JobState::Failed { message } => {
                    return self.fail(job_id, title, &indicator, message, mode).await;
                }
                JobState::Complete { output } => {
                    return self.complete(job_id, title, &indicator, output, mode).await;
                }
                JobState::Loading { progress, total } => {
                    tracing::debug!(
                        "Data output {} in progress ({:?}/{:?})",
                        job_id,
                        progress,
                        total
                    );
                    if mode == PollMode::Standalone {
                        self.notifications
                            .show(
                                Notification::new(&indicator, title, "Processing")
                                    .loading(percent),
                            )
                            .await;
                    }
                    self.publish(SystemEvent::job_progress(job_id, progress, total))
                        .await;
                }
                JobState::Idle => {}
            }
        }
    }

    async fn complete(
        &self,
        job_id: u64,
        title: &str,
        indicator: &str,
        output: Option<String>,
        mode: PollMode,
    ) -> JobOutcome {
        tracing::info!("Data output {} complete", job_id);

        if mode == PollMode::Standalone {
            self.notifications
                .show(
                    Notification::new(indicator, title, SUCCESS_MESSAGE)
                        .kind(NotificationKind::Success)
                        .auto_close(self.dismiss_delay),
                )
                .await;

            if let (Some(opener), Some(location)) = (&self.opener, output.as_deref()) {
                if let Err(e) = opener.open(location).await {
                    tracing::warn!("Failed to open output {}: {}", location, e);
                }
            }
        }

        self.publish(SystemEvent::job_completed(job_id, output.clone()))
            .await;
        JobOutcome::Complete { output }
    }

    async fn fail(
        &self,
        job_id: u64,
        title: &str,
        indicator: &str,
        message: String,
        mode: PollMode,
    ) -> JobOutcome {
        tracing::warn!("Data output {} failed: {}", job_id, message);

        if mode == PollMode::Standalone {
            self.notifications
                .show(
                    Notification::new(indicator, title, message.clone())
                        .kind(NotificationKind::Error)
                        .auto_close(self.dismiss_delay),
                )
                .await;
        }

        self.publish(SystemEvent::job_failed(job_id, message.clone()))
            .await;
        JobOutcome::Failed { message }
    }

    async fn publish(&self, event: SystemEvent) {
        if let Err(e) = self.event_bus.publish_system_event(event).await {
            tracing::error!("Failed to publish job event: {}", e);
        }
    }
}

/// Handle to a job followed in the background
pub struct JobWatch {
    job_id: u64,
    cancel: CancellationToken,
    handle: Option<JoinHandle<JobOutcome>>,
}

impl JobWatch {
    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    /// Stop polling; the outcome becomes [`JobOutcome::Cancelled`]
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// Wait for the terminal outcome
    ///
    /// Dropping the returned future before it resolves cancels the poll.
    pub async fn outcome(mut self) -> JobOutcome {
        let Some(handle) = self.handle.as_mut() else {
            return JobOutcome::Cancelled;
        };
        let joined = handle.await;
        self.handle = None;
        match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Poll task for data output {} aborted: {}", self.job_id, e);
                JobOutcome::Failed {
                    message: GENERIC_FAILURE.to_string(),
                }
            }
        }
    }
}

impl Drop for JobWatch {
    fn drop(&mut self) {
        if self.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            self.cancel.cancel();
        }
    }
}
