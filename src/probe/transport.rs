//! HTTP transport seam
//!
//! `HttpTransport` performs one request and reports either the raw response
//! or a classified transport failure. `ReqwestTransport` is the production
//! implementation; tests substitute canned transports.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::core::traits::ErrorKind;
use crate::probe::endpoint::{EndpointSpec, HttpMethod, RequestBody};

/// Response as received from the wire
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: body.to_string(),
        }
    }

    /// Whether the content type announces JSON
    pub fn is_json(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
    }
}

/// Failure before a response was received
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportFailure {
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Other(String),
}

impl TransportFailure {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionRefused(_) => ErrorKind::ConnectionRefused,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Other(_) => ErrorKind::TransportError,
        }
    }
}

/// Performs exactly one HTTP request per call
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, spec: &EndpointSpec) -> Result<HttpResponse, TransportFailure>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, spec: &EndpointSpec) -> Result<HttpResponse, TransportFailure> {
        let mut request = match spec.method {
            HttpMethod::Get => self.client.get(&spec.url),
            HttpMethod::Post => self.client.post(&spec.url),
        }
        .timeout(spec.timeout);

        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        request = match &spec.body {
            Some(RequestBody::Json(value)) => request.json(value),
            Some(RequestBody::Form(fields)) => request.form(fields),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| classify(e, spec.timeout))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| classify(e, spec.timeout))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Map a reqwest error onto the transport failure taxonomy
///
/// Priority: refused connection, then timeout, then any other failure to
/// connect (DNS, TLS), then everything else.
fn classify(error: reqwest::Error, timeout: Duration) -> TransportFailure {
    if has_io_kind(&error, io::ErrorKind::ConnectionRefused) {
        return TransportFailure::ConnectionRefused(error.to_string());
    }
    if error.is_timeout() || has_io_kind(&error, io::ErrorKind::TimedOut) {
        return TransportFailure::Timeout(timeout);
    }
    if error.is_connect() {
        return TransportFailure::ConnectionRefused(error.to_string());
    }
    TransportFailure::Other(error_chain(&error))
}

fn has_io_kind(error: &(dyn StdError + 'static), kind: io::ErrorKind) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = source {
        if err.downcast_ref::<io::Error>().is_some_and(|e| e.kind() == kind) {
            return true;
        }
        source = err.source();
    }
    false
}

fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}
