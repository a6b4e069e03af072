//! EndpointProbe - one bounded-time HTTP call with a classified outcome

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::core::traits::{ErrorKind, StageResult};
use crate::probe::endpoint::EndpointSpec;
use crate::probe::transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportFailure};

/// Issues single HTTP requests and classifies what came back
///
/// The target's timeout bounds the whole call, whatever the transport does.
#[derive(Clone)]
pub struct EndpointProbe {
    transport: Arc<dyn HttpTransport>,
}

impl Default for EndpointProbe {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestTransport::new()))
    }
}

impl EndpointProbe {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Send the request and return the raw response or a classified failure
    ///
    /// Used by stages that map status codes themselves.
    pub async fn execute(&self, spec: &EndpointSpec) -> Result<HttpResponse, TransportFailure> {
        debug!(name = %spec.name, method = %spec.method, url = %spec.url, "probing endpoint");
        let started = Instant::now();

        let outcome = match tokio::time::timeout(spec.timeout, self.transport.send(spec)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportFailure::Timeout(spec.timeout)),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(response) => {
                debug!(name = %spec.name, status = response.status, elapsed_ms, "response received")
            }
            Err(failure) => warn!(name = %spec.name, elapsed_ms, "probe failed: {}", failure),
        }

        outcome
    }

    /// Probe an endpoint; success iff the response status is 200
    pub async fn probe(&self, spec: &EndpointSpec) -> StageResult {
        let result = match self.execute(spec).await {
            Err(failure) => {
                let kind = failure.kind();
                StageResult::failed(&spec.name, kind, failure.to_string())
                    .with_hints(kind.suggested_actions())
            }
            Ok(response) if response.status == 200 => StageResult::passed(&spec.name)
                .with_detail("status_code", response.status)
                .with_detail("data", response_data(&response)),
            Ok(response) => StageResult::failed(
                &spec.name,
                ErrorKind::HttpError {
                    status: response.status,
                },
                response.body.clone(),
            )
            .with_detail("status_code", response.status),
        };

        result
            .with_detail("url", spec.url.as_str())
            .with_detail("method", spec.method.as_str())
    }
}

/// Parsed body for JSON responses, raw text otherwise
///
/// A body labelled JSON that does not parse is kept as text.
pub fn response_data(response: &HttpResponse) -> Value {
    if response.is_json()
        && let Ok(value) = serde_json::from_str::<Value>(&response.body)
    {
        return value;
    }
    Value::String(response.body.clone())
}
