//! End-to-end properties of the credential pipeline and health stage,
//! driven through the public API with a canned transport.

use async_trait::async_trait;
use serde_json::{Value, json};
use sp_preflight::core::{Credentials, ErrorKind, Region, RunContext, Stage, ValidationReport};
use sp_preflight::orchestration::{PipelineRunner, ReportPresenter};
use sp_preflight::probe::{EndpointProbe, EndpointSpec, HttpResponse, HttpTransport, TransportFailure};
use sp_preflight::security::CredentialFormatChecker;
use sp_preflight::stages::token_exchange::LWA_TOKEN_URL;
use sp_preflight::stages::{ResourceAccessStage, ServiceHealthStage, TokenExchangeStage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const NA_PARTICIPATIONS: &str =
    "https://sellingpartnerapi-na.amazon.com/sellers/v1/marketplaceParticipations";

#[derive(Default)]
struct CannedTransport {
    replies: HashMap<String, (Duration, u16, Value)>,
    seen: Mutex<Vec<String>>,
}

impl CannedTransport {
    fn reply(mut self, url: &str, status: u16, body: Value) -> Self {
        self.replies.insert(url.to_string(), (Duration::ZERO, status, body));
        self
    }

    fn delayed(mut self, url: &str, delay: Duration, body: Value) -> Self {
        self.replies.insert(url.to_string(), (delay, 200, body));
        self
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for CannedTransport {
    async fn send(&self, spec: &EndpointSpec) -> Result<HttpResponse, TransportFailure> {
        self.seen.lock().unwrap().push(spec.url.clone());
        match self.replies.get(&spec.url) {
            Some((delay, status, body)) => {
                tokio::time::sleep(*delay).await;
                Ok(HttpResponse::json(*status, body))
            }
            None => Err(TransportFailure::ConnectionRefused(spec.url.clone())),
        }
    }
}

fn credentials() -> Credentials {
    Credentials::new(
        "amzn1.application-oa2-client.0123456789",
        "amzn1.oa2-cs.v1.abcdef0123456789",
        "Atzr|IwEBIrefresh0123456789",
        Region::NorthAmerica,
    )
}

fn token_ok() -> Value {
    json!({"access_token": "Atza|IwEBIaccess0123456789", "token_type": "bearer", "expires_in": 3600})
}

fn two_marketplaces() -> Value {
    json!({
        "payload": [
            {
                "marketplace": {"id": "ATVPDKIKX0DER", "name": "Amazon.com"},
                "participation": {"isParticipating": true}
            },
            {
                "marketplace": {"id": "A1AM78C64UM0Y8", "name": "Amazon.com.mx"},
                "participation": {"isParticipating": true}
            }
        ]
    })
}

async fn run_credential_pipeline(transport: Arc<CannedTransport>) -> ValidationReport {
    let probe = EndpointProbe::new(transport);
    let stages: Vec<Box<dyn Stage>> = vec![
        Box::new(CredentialFormatChecker::new()),
        Box::new(TokenExchangeStage::new(probe.clone())),
        Box::new(ResourceAccessStage::new(probe)),
    ];
    let mut ctx = RunContext::with_credentials(Arc::new(credentials()));
    PipelineRunner::new().run(&stages, &mut ctx).await
}

#[tokio::test]
async fn full_pipeline_passes_with_marketplace_summary() {
    let transport = Arc::new(
        CannedTransport::default()
            .reply(LWA_TOKEN_URL, 200, token_ok())
            .reply(NA_PARTICIPATIONS, 200, two_marketplaces()),
    );

    let report = run_credential_pipeline(transport).await;

    assert!(report.overall_success);
    let access = report.get("api_access").unwrap();
    assert_eq!(access.detail["count"], 2);
    assert_eq!(access.detail["marketplaces"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_token_exchange_skips_resource_access() {
    let transport = Arc::new(CannedTransport::default().reply(
        LWA_TOKEN_URL,
        400,
        json!({"error": "invalid_grant", "error_description": "The refresh token is invalid"}),
    ));

    let report = run_credential_pipeline(transport.clone()).await;

    assert!(!report.overall_success);
    assert!(report.get("credential_format").unwrap().success);
    assert_eq!(
        report.get("token_exchange").unwrap().error_kind,
        Some(ErrorKind::HttpError { status: 400 })
    );
    assert!(report.get("api_access").unwrap().is_skipped());
    assert_eq!(transport.seen(), vec![LWA_TOKEN_URL.to_string()]);
}

#[tokio::test]
async fn forbidden_and_unauthorized_are_distinct() {
    let forbidden = Arc::new(
        CannedTransport::default()
            .reply(LWA_TOKEN_URL, 200, token_ok())
            .reply(NA_PARTICIPATIONS, 403, json!({"errors": [{"code": "Unauthorized"}]})),
    );
    let unauthorized = Arc::new(
        CannedTransport::default()
            .reply(LWA_TOKEN_URL, 200, token_ok())
            .reply(NA_PARTICIPATIONS, 401, json!({"errors": []})),
    );

    let forbidden = run_credential_pipeline(forbidden).await;
    let unauthorized = run_credential_pipeline(unauthorized).await;

    assert_eq!(
        forbidden.get("api_access").unwrap().error_kind,
        Some(ErrorKind::Forbidden)
    );
    assert_eq!(
        unauthorized.get("api_access").unwrap().error_kind,
        Some(ErrorKind::Unauthorized)
    );
}

#[tokio::test]
async fn identical_inputs_give_identical_reports() {
    let transport = || {
        Arc::new(
            CannedTransport::default()
                .reply(LWA_TOKEN_URL, 200, token_ok())
                .reply(NA_PARTICIPATIONS, 200, two_marketplaces()),
        )
    };

    let first = run_credential_pipeline(transport()).await;
    let second = run_credential_pipeline(transport()).await;

    assert_eq!(first, second);
    assert_eq!(
        ReportPresenter::render_json(&first).unwrap(),
        ReportPresenter::render_json(&second).unwrap()
    );
}

#[tokio::test]
async fn report_never_contains_secrets() {
    let transport = Arc::new(
        CannedTransport::default()
            .reply(LWA_TOKEN_URL, 200, token_ok())
            .reply(NA_PARTICIPATIONS, 200, two_marketplaces()),
    );

    let report = run_credential_pipeline(transport).await;
    let json = ReportPresenter::render_json(&report).unwrap();
    let text = ReportPresenter::render(&report);

    for output in [json, text] {
        assert!(!output.contains("amzn1.oa2-cs.v1.abcdef0123456789"));
        assert!(!output.contains("Atzr|IwEBIrefresh0123456789"));
        assert!(!output.contains("Atza|IwEBIaccess0123456789"));
    }
}

#[tokio::test]
async fn concurrent_health_checks_keep_declared_order() {
    let urls: Vec<String> = (0..6).map(|i| format!("http://svc-{i}.test/health")).collect();
    let mut transport = CannedTransport::default();
    for (i, url) in urls.iter().enumerate() {
        transport = transport.delayed(
            url,
            Duration::from_millis(120 - 20 * i as u64),
            json!({"service": i}),
        );
    }
    let specs: Vec<EndpointSpec> = urls
        .iter()
        .enumerate()
        .map(|(i, url)| EndpointSpec::get(format!("svc-{i}"), url))
        .collect();

    let results = ServiceHealthStage::new(EndpointProbe::new(Arc::new(transport)))
        .with_max_concurrency(3)
        .check_all(&specs)
        .await;

    assert_eq!(results.len(), 6);
    for (i, result) in results.iter().enumerate() {
        assert!(result.success);
        assert_eq!(result.stage_name, format!("svc-{i}"));
        assert_eq!(result.detail["data"]["service"], i);
    }
}
