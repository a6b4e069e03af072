//! Analysis request trigger
//!
//! Forwards a natural-language report query to the deployment's analysis
//! backend. What the backend does with it is opaque here.

use anyhow::{Context, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

use crate::core::config::AnalysisConfig;
use crate::probe::{EndpointProbe, EndpointSpec};
use crate::stages::service_health::CHAT_MODEL;

/// Timeout of an analysis request when none is configured
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 300;

/// Query sent by `report --days N`
pub fn report_query(days: u32) -> String {
    format!(
        "Get sales data for the last {} days and provide detailed insights",
        days
    )
}

/// Process a request and return its result
#[async_trait]
pub trait RequestProcessor: Send + Sync {
    async fn process(&self, query: &str) -> anyhow::Result<String>;
}

/// Sends queries to an OpenAI-style chat-completion endpoint
pub struct ChatCompletionProcessor {
    probe: EndpointProbe,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl ChatCompletionProcessor {
    pub fn new(probe: EndpointProbe, config: &AnalysisConfig) -> Self {
        Self {
            probe,
            endpoint: config.endpoint.clone(),
            model: config.model.clone().unwrap_or_else(|| CHAT_MODEL.to_string()),
            timeout: Duration::from_secs(
                config.timeout_secs.unwrap_or(DEFAULT_ANALYSIS_TIMEOUT_SECS),
            ),
        }
    }
}

#[async_trait]
impl RequestProcessor for ChatCompletionProcessor {
    async fn process(&self, query: &str) -> anyhow::Result<String> {
        let spec = EndpointSpec::post("analysis request", &self.endpoint)
            .with_timeout(self.timeout)
            .with_json(json!({
                "messages": [{"role": "user", "content": query}],
                "model": self.model,
            }));
        info!(endpoint = %self.endpoint, model = %self.model, "sending analysis request");

        let response = self
            .probe
            .execute(&spec)
            .await
            .with_context(|| format!("analysis request to {} failed", self.endpoint))?;

        if response.status != 200 {
            bail!(
                "analysis backend returned HTTP {}: {}",
                response.status,
                response.body
            );
        }

        let body: Value =
            serde_json::from_str(&response.body).context("analysis response is not valid JSON")?;
        match body["choices"][0]["message"]["content"].as_str() {
            Some(content) => Ok(content.to_string()),
            None => bail!("analysis response has no choices[0].message.content"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::testing::{StubReply, StubTransport};
    use crate::probe::{HttpResponse, RequestBody, TransportFailure};
    use std::sync::Arc;

    const ENDPOINT: &str = "http://localhost:5000/v1/chat/completions";

    fn processor(transport: StubTransport) -> (ChatCompletionProcessor, Arc<StubTransport>) {
        let transport = Arc::new(transport);
        let processor =
            ChatCompletionProcessor::new(EndpointProbe::new(transport.clone()), &AnalysisConfig::default());
        (processor, transport)
    }

    #[test]
    fn test_report_query() {
        assert_eq!(
            report_query(7),
            "Get sales data for the last 7 days and provide detailed insights"
        );
    }

    #[tokio::test]
    async fn test_returns_first_choice_content() {
        let (processor, transport) = processor(StubTransport::new().json(
            ENDPOINT,
            200,
            json!({"choices": [{"message": {"role": "assistant", "content": "Sales were up 12%"}}]}),
        ));

        let output = processor.process(&report_query(30)).await.unwrap();

        assert_eq!(output, "Sales were up 12%");
        let calls = transport.calls();
        assert_eq!(calls[0].timeout, Duration::from_secs(300));
        match &calls[0].body {
            Some(RequestBody::Json(body)) => {
                assert_eq!(body["model"], "sp-api-crewai");
                assert_eq!(body["messages"][0]["content"], report_query(30));
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_200_is_error() {
        let (processor, _) = processor(StubTransport::new().route(
            ENDPOINT,
            StubReply::Response(HttpResponse::new(502, "bad gateway")),
        ));

        let err = processor.process("q").await.unwrap_err();
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[tokio::test]
    async fn test_missing_content_is_error() {
        let (processor, _) = processor(StubTransport::new().json(ENDPOINT, 200, json!({"choices": []})));

        assert!(processor.process("q").await.is_err());
    }

    #[tokio::test]
    async fn test_transport_failure_is_error() {
        let (processor, _) = processor(StubTransport::new().route(
            ENDPOINT,
            StubReply::Failure(TransportFailure::ConnectionRefused("refused".into())),
        ));

        let err = processor.process("q").await.unwrap_err();
        assert!(format!("{:#}", err).contains("connection refused"));
    }
}
