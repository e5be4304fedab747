//! HTTP transport abstraction and its reqwest-backed implementation
//!
//! The pipeline talks to the server through [`Transport`] so that every
//! response, including non-2xx ones, comes back as an [`ApiResponse`] the
//! caller can inspect. Only network failures and timeouts become errors.

use async_trait::async_trait;
use reqwest::Method;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::config::ServerConfig;
use crate::error::Result;

/// Body of an outgoing request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// Single-file multipart form
    Multipart {
        field: String,
        filename: String,
        content: Vec<u8>,
    },
}

/// Outgoing request description
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: RequestBody,
    pub timeout: Option<Duration>,
    pub headers: HashMap<String, String>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: RequestBody::Empty,
            timeout: None,
            headers: HashMap::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_file(
        mut self,
        field: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        self.body = RequestBody::Multipart {
            field: field.into(),
            filename: filename.into(),
            content: content.into(),
        };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }
}

/// Response as received, regardless of status code
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub status: u16,
    /// Header names are lower-cased
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json(self, value: &serde_json::Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(value.to_string())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Sends requests to the server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request; non-2xx responses are returned, not raised
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// [`Transport`] backed by a shared [`reqwest::Client`]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl ReqwestTransport {
    /// Build a transport for the configured server
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Self::with_client(client, config)
    }

    /// Reuse an existing [`reqwest::Client`]
    pub fn with_client(client: reqwest::Client, config: &ServerConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// Resolve absolute or server-relative URLs
    pub fn resolve(&self, url: &str) -> Result<Url> {
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(Url::parse(url)?)
        } else {
            Ok(self.base_url.join(url)?)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.resolve(&request.url)?;
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), url);

        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Token {}", token));
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart {
                field,
                filename,
                content,
            } => {
                let part = reqwest::multipart::Part::bytes(content).file_name(filename);
                builder.multipart(reqwest::multipart::Form::new().part(field, part))
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        if !(200..300).contains(&status) {
            tracing::debug!("Server answered {} for {}", status, request.url);
        }

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}
