//! REST API client for the template, print and data output endpoints
//!
//! Wraps a [`Transport`] and turns raw responses into typed results and
//! the error taxonomy used by the preview pipeline.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{LabelError, Result};
use crate::http::{ApiRequest, ApiResponse, Transport};
use crate::job::DataOutput;
use crate::template::{
    model_list_path, PreviewTargetOption, RenderPayload, Template, TemplateKind,
};

/// Multipart field carrying the template body
pub const TEMPLATE_UPLOAD_FIELD: &str = "template";

/// Downloaded render artifact
#[derive(Debug, Clone)]
pub struct ArtifactBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Typed client over a [`Transport`]
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    api_prefix: String,
}

impl ApiClient {
    /// Create a client for endpoints under `api_prefix` (e.g. `/api`)
    pub fn new(transport: Arc<dyn Transport>, api_prefix: impl Into<String>) -> Self {
        let api_prefix = api_prefix.into().trim_end_matches('/').to_string();
        Self {
            transport,
            api_prefix,
        }
    }

    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    /// Build a URL for an endpoint path under the API prefix
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_prefix, path)
    }

    /// Data output status endpoint for a job
    pub fn job_status_url(&self, job_id: u64) -> String {
        self.endpoint(&format!("/data-output/{}/", job_id))
    }

    /// Fetch the current status of a data output job
    pub async fn job_status(&self, job_id: u64) -> Result<DataOutput> {
        let response = self
            .transport
            .execute(ApiRequest::get(self.job_status_url(job_id)))
            .await?;

        if !response.is_success() {
            return Err(LabelError::poll(extract_error_message(&response)));
        }
        response.json()
    }

    /// Fetch template metadata
    pub async fn fetch_template(&self, kind: TemplateKind, pk: u64) -> Result<Template> {
        let url = self.endpoint(&kind.template_path(pk));
        let response = self.transport.execute(ApiRequest::get(url)).await?;

        if !response.is_success() {
            return Err(LabelError::generic(format!(
                "Could not load {} template {}: {}",
                kind,
                pk,
                extract_error_message(&response)
            )));
        }
        response.json()
    }

    /// Fetch the raw template source
    pub async fn fetch_template_body(&self, template: &Template) -> Result<String> {
        let Some(location) = template.template.as_deref() else {
            return Ok(String::new());
        };

        let response = self.transport.execute(ApiRequest::get(location)).await?;
        if !response.is_success() {
            return Err(LabelError::generic(format!(
                "Could not load template body: {}",
                extract_error_message(&response)
            )));
        }
        Ok(response.text())
    }

    /// Upload an edited template body as a multipart `PATCH`
    pub async fn upload_template(&self, template_url: &str, filename: &str, code: &str) -> Result<()> {
        let request = ApiRequest::patch(template_url).with_file(
            TEMPLATE_UPLOAD_FIELD,
            filename,
            code.as_bytes().to_vec(),
        );
        let response = self.transport.execute(request).await?;

        if !response.is_success() {
            return Err(LabelError::save(format!(
                "Failed to save template ({}): {}",
                response.status,
                extract_error_message(&response)
            )));
        }
        Ok(())
    }

    /// Trigger a render and return the immediate job status
    pub async fn trigger_render(
        &self,
        printing_url: &str,
        payload: &RenderPayload,
        timeout: Duration,
    ) -> Result<DataOutput> {
        let request = ApiRequest::post(printing_url)
            .with_json(payload.to_json())
            .with_timeout(timeout);
        let response = self.transport.execute(request).await?;

        if !response.is_success() {
            return Err(LabelError::trigger(extract_error_message(&response)));
        }
        response.json()
    }

    /// Download a render artifact
    pub async fn fetch_artifact(&self, location: &str) -> Result<ArtifactBlob> {
        let response = self.transport.execute(ApiRequest::get(location)).await?;

        if !response.is_success() {
            return Err(LabelError::generic(format!(
                "Could not download output: {}",
                extract_error_message(&response)
            )));
        }

        let content_type = response
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok(ArtifactBlob {
            bytes: response.body,
            content_type,
        })
    }

    /// List instances a template can be previewed against
    pub async fn list_preview_targets(
        &self,
        template: &Template,
        search: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PreviewTargetOption>> {
        let path = model_list_path(&template.model_type).ok_or_else(|| {
            LabelError::generic(format!(
                "No list endpoint known for model type '{}'",
                template.model_type
            ))
        })?;

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("limit", &limit.to_string());
        for (key, value) in template.filter_pairs() {
            query.append_pair(&key, &value);
        }
        if let Some(search) = search.filter(|s| !s.is_empty()) {
            query.append_pair("search", search);
        }

        let url = format!("{}?{}", self.endpoint(path), query.finish());
        let response = self.transport.execute(ApiRequest::get(url)).await?;
        if !response.is_success() {
            return Err(LabelError::generic(extract_error_message(&response)));
        }

        let body: serde_json::Value = response.json()?;
        // Paginated responses wrap rows in `results`
        let rows = body
            .get("results")
            .and_then(|v| v.as_array())
            .or_else(|| body.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(rows.iter().filter_map(PreviewTargetOption::from_row).collect())
    }
}

/// Structured fields checked for a readable error, in priority order
const ERROR_FIELDS: [&str; 3] = ["non_field_errors", "detail", "error"];

/// Extract a human readable message from an error response
///
/// Starts from the raw body text; the first present of `non_field_errors`,
/// `detail` and `error` replaces it, with list values joined by `", "`.
pub fn extract_error_message(response: &ApiResponse) -> String {
    let mut message = response.text().trim().to_string();

    if let Ok(body) = serde_json::from_slice::<serde_json::Value>(&response.body) {
        if let Some(structured) = ERROR_FIELDS
            .iter()
            .find_map(|field| body.get(*field).and_then(field_text))
        {
            message = structured;
        }
    }

    if message.is_empty() {
        format!("Request failed with status {}", response.status)
    } else {
        message
    }
}

fn field_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
