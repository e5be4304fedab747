//! Scripted transport and fixtures shared by the unit tests

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::ApiClient;
use crate::error::{LabelError, Result};
use crate::event::{EventBus, InMemoryEventBus, RecordingHandler};
use crate::http::{ApiRequest, ApiResponse, Transport};
use crate::notification::NotificationCenter;
use crate::poller::JobPoller;
use crate::template::{Template, TemplateContext, TemplateKind};
use crate::visibility::Visibility;

pub const PREFIX: &str = "/api";

#[derive(Clone)]
enum Reply {
    Respond(ApiResponse),
    Delayed(Duration, ApiResponse),
    Fail(String),
}

/// Transport answering from per-route scripts
///
/// Each route replays its queue in order and repeats the last reply once
/// the queue is down to one entry. Unscripted routes answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, method: Method, url: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, url.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub fn on(&self, method: Method, url: &str, response: ApiResponse) {
        self.push(method, url, Reply::Respond(response));
    }

    pub fn on_json(&self, method: Method, url: &str, status: u16, body: serde_json::Value) {
        self.on(method, url, ApiResponse::new(status).with_json(&body));
    }

    pub fn on_delayed(&self, method: Method, url: &str, delay: Duration, response: ApiResponse) {
        self.push(method, url, Reply::Delayed(delay, response));
    }

    pub fn on_error(&self, method: Method, url: &str, message: &str) {
        self.push(method, url, Reply::Fail(message.to_string()));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }

    fn next_reply(&self, method: &Method, url: &str) -> Option<Reply> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(&(method.clone(), url.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let reply = self.next_reply(&request.method, &request.url);
        self.requests.lock().unwrap().push(request);

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Delayed(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(Reply::Fail(message)) => Err(LabelError::transport(message)),
            None => Ok(ApiResponse::new(404).with_json(&json!({"detail": "Not found."}))),
        }
    }
}

pub fn status_url(job_id: u64) -> String {
    format!("{}/data-output/{}/", PREFIX, job_id)
}

/// Label template 7 for stock items with a stored body
pub fn label_template() -> Template {
    Template {
        pk: 7,
        name: "Stock label".to_string(),
        description: String::new(),
        template: Some("/media/label/template/stock_label.html".to_string()),
        model_type: "stockitem".to_string(),
        filters: String::new(),
        enabled: true,
    }
}

pub fn label_context() -> TemplateContext {
    TemplateContext::new(label_template(), TemplateKind::Label, PREFIX)
}

pub fn pdf_response(bytes: &[u8]) -> ApiResponse {
    ApiResponse::new(200)
        .with_header("Content-Type", "application/pdf")
        .with_body(bytes.to_vec())
}

/// Services wired around a mock transport
pub struct Harness {
    pub transport: Arc<MockTransport>,
    pub api: ApiClient,
    pub event_bus: Arc<dyn EventBus>,
    pub recorder: Arc<RecordingHandler>,
    pub notifications: Arc<NotificationCenter>,
    pub visibility: Visibility,
}

impl Harness {
    pub async fn new() -> Self {
        let transport = MockTransport::new();
        let api = ApiClient::new(transport.clone(), PREFIX);
        let event_bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new());
        let recorder = Arc::new(RecordingHandler::new());
        event_bus
            .subscribe_system_events(recorder.clone(), None)
            .await
            .unwrap();

        Self {
            transport,
            api,
            event_bus,
            recorder,
            notifications: Arc::new(NotificationCenter::new()),
            visibility: Visibility::new(),
        }
    }

    pub fn poller(&self) -> JobPoller {
        JobPoller::new(
            self.api.clone(),
            self.event_bus.clone(),
            self.notifications.clone(),
            self.visibility.clone(),
        )
    }
}
