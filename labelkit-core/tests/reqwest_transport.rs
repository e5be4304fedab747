//! Drives the HTTP transport against a local axum server

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use labelkit_core::{
    ApiClient, Config, InMemoryEventBus, JobPoller, NotificationCenter, PollPolicy,
    PreviewOrchestrator, PreviewTarget, ReqwestTransport, Template, TemplateContext, TemplateKind,
    Visibility,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct ServerState {
    polls: AtomicUsize,
    upload: Mutex<Option<String>>,
    print_body: Mutex<Option<Value>>,
}

async fn job_status(State(state): State<Arc<ServerState>>, Path(id): Path<u64>) -> Json<Value> {
    if state.polls.fetch_add(1, Ordering::SeqCst) == 0 {
        Json(json!({"pk": id, "complete": false, "progress": 1, "total": 2}))
    } else {
        Json(json!({"pk": id, "complete": true, "output": "/media/out.pdf"}))
    }
}

async fn upload_template(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if token != Some("Token secret") {
        return StatusCode::UNAUTHORIZED;
    }
    *state.upload.lock().unwrap() = Some(String::from_utf8_lossy(&body).into_owned());
    StatusCode::OK
}

async fn print(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    *state.print_body.lock().unwrap() = Some(body.clone());
    let has_items = body
        .get("items")
        .and_then(|v| v.as_array())
        .is_some_and(|items| !items.is_empty());
    if !has_items && body.get("model_type").is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"non_field_errors": ["No items provided to print"]})),
        );
    }
    (StatusCode::CREATED, Json(json!({"complete": false, "pk": 3})))
}

async fn artifact() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/pdf")], b"%PDF-1.7".to_vec())
}

async fn spawn_server() -> (String, Arc<ServerState>) {
    let state = Arc::new(ServerState::default());
    let app = Router::new()
        .route("/api/data-output/:id/", get(job_status))
        .route("/api/label/template/:pk/", patch(upload_template))
        .route("/api/label/print/", post(print))
        .route("/media/out.pdf", get(artifact))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

fn client(base_url: &str, token: Option<&str>) -> ApiClient {
    let mut config = Config::new();
    config.server.base_url = base_url.to_string();
    config.server.token = token.map(str::to_string);
    let transport = ReqwestTransport::new(&config.server).unwrap();
    ApiClient::new(Arc::new(transport), config.server.api_prefix.clone())
}

fn context() -> TemplateContext {
    let template = Template {
        pk: 42,
        name: "Part label".to_string(),
        description: String::new(),
        template: None,
        model_type: "part".to_string(),
        filters: String::new(),
        enabled: true,
    };
    TemplateContext::new(template, TemplateKind::Label, "/api")
}

#[tokio::test]
async fn test_preview_over_http() {
    let (base_url, state) = spawn_server().await;
    let api = client(&base_url, Some("secret"));
    let event_bus = Arc::new(InMemoryEventBus::new());
    let poller = Arc::new(JobPoller::new(
        api.clone(),
        event_bus.clone(),
        Arc::new(NotificationCenter::new()),
        Visibility::new(),
    ));
    let orchestrator = PreviewOrchestrator::new(api, poller, event_bus)
        .with_inline_policy(PollPolicy::capped(Duration::from_millis(20), 50));

    let artifact = orchestrator
        .run("<p>{{ part.name }}</p>", &PreviewTarget::Instance(7), true, &context())
        .await
        .unwrap();

    assert!(artifact.display_url().ends_with("#view=fitH"));
    let (bytes, _) = orchestrator
        .object_urls()
        .read(&artifact.object_url)
        .unwrap()
        .unwrap();
    assert_eq!(bytes, b"%PDF-1.7");

    let upload = state.upload.lock().unwrap().clone().unwrap();
    assert!(upload.contains("filename=\"template.html\""));
    assert!(upload.contains("<p>{{ part.name }}</p>"));
    assert_eq!(
        state.print_body.lock().unwrap().clone(),
        Some(json!({"items": [7], "template": 42}))
    );
    assert_eq!(state.polls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_error_statuses_are_returned_not_raised() {
    let (base_url, _state) = spawn_server().await;
    let api = client(&base_url, None);
    let event_bus = Arc::new(InMemoryEventBus::new());
    let poller = Arc::new(JobPoller::new(
        api.clone(),
        event_bus.clone(),
        Arc::new(NotificationCenter::new()),
        Visibility::new(),
    ));
    let orchestrator = PreviewOrchestrator::new(api, poller, event_bus);

    // Missing token: the upload is rejected before any render
    let err = orchestrator
        .run("body", &PreviewTarget::Instance(7), true, &context())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_connection_failure_is_transport_error() {
    let api = client("http://127.0.0.1:1", None);
    let err = api.job_status(1).await.unwrap_err();
    assert!(matches!(
        err,
        labelkit_core::LabelError::Transport(_) | labelkit_core::LabelError::Timeout(_)
    ));
}
