//! One representative protected API call with the exchanged token

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

use crate::core::config::{DEFAULT_TIMEOUT_SECS, Region};
use crate::core::traits::{ErrorKind, RunContext, Stage, StageResult};
use crate::probe::{EndpointProbe, EndpointSpec, HttpResponse};
use crate::stages::token_exchange::{self, AccessToken};

pub const MARKETPLACE_PARTICIPATIONS_PATH: &str = "/sellers/v1/marketplaceParticipations";

/// Stage name recorded in reports
pub const STAGE_NAME: &str = "api_access";

pub const ACCESS_TOKEN_HEADER: &str = "x-amz-access-token";

pub struct ResourceAccessStage {
    probe: EndpointProbe,
}

impl ResourceAccessStage {
    pub fn new(probe: EndpointProbe) -> Self {
        Self { probe }
    }

    /// Call the marketplace participations endpoint of `region`
    ///
    /// Fails fast without a network call when no token is available.
    pub async fn check_access(&self, token: Option<&AccessToken>, region: Region) -> StageResult {
        let Some(token) = token else {
            return StageResult::failed(
                STAGE_NAME,
                ErrorKind::MissingPrerequisite,
                "no access token available",
            );
        };

        let url = format!("{}{}", region.base_url(), MARKETPLACE_PARTICIPATIONS_PATH);
        let spec = EndpointSpec::get("marketplace participations", &url)
            .with_header(ACCESS_TOKEN_HEADER, token.value.expose_secret())
            .with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        info!(region = %region, "calling protected resource");

        let result = match self.probe.execute(&spec).await {
            Err(failure) => {
                let kind = failure.kind();
                StageResult::failed(STAGE_NAME, kind, failure.to_string())
                    .with_hints(kind.suggested_actions())
            }
            Ok(response) => Self::classify(&response),
        };

        result
            .with_detail("endpoint", url)
            .with_detail("region", region.as_str())
    }

    fn classify(response: &HttpResponse) -> StageResult {
        let result = match response.status {
            200 => Self::summarize(response),
            401 => StageResult::failed(STAGE_NAME, ErrorKind::Unauthorized, response.body.clone())
                .with_hint("Access token is invalid or expired"),
            403 => StageResult::failed(STAGE_NAME, ErrorKind::Forbidden, response.body.clone())
                .with_hints([
                    "The application may lack the required API permissions",
                    "The seller may not have authorized the application",
                    "The IAM role may be misconfigured",
                ]),
            status => StageResult::failed(
                STAGE_NAME,
                ErrorKind::HttpError { status },
                response.body.clone(),
            ),
        };
        result.with_detail("status_code", response.status)
    }

    fn summarize(response: &HttpResponse) -> StageResult {
        let result = StageResult::passed(STAGE_NAME);

        let Ok(body) = serde_json::from_str::<Value>(&response.body) else {
            return result
                .with_detail("count", 0)
                .with_detail("note", "response body was not valid JSON");
        };

        match body.get("payload").and_then(Value::as_array) {
            Some(entries) => {
                let lines: Vec<Value> = entries
                    .iter()
                    .map(|entry| Value::String(participation_line(entry)))
                    .collect();
                result
                    .with_detail("count", entries.len())
                    .with_detail("marketplaces", lines)
            }
            None => result,
        }
    }
}

/// `<name> (<id>) participating=<bool>`
fn participation_line(entry: &Value) -> String {
    let marketplace = &entry["marketplace"];
    let name = marketplace["name"].as_str().unwrap_or("unknown");
    let id = marketplace["id"].as_str().unwrap_or("unknown");
    let participating = entry["participation"]["isParticipating"]
        .as_bool()
        .unwrap_or(false);
    format!("{} ({}) participating={}", name, id, participating)
}

#[async_trait]
impl Stage for ResourceAccessStage {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    fn depends_on(&self) -> Option<&str> {
        Some(token_exchange::STAGE_NAME)
    }

    async fn run(&self, ctx: &mut RunContext) -> anyhow::Result<StageResult> {
        let Some(region) = ctx.credentials.as_ref().map(|c| c.region) else {
            return Ok(StageResult::failed(
                STAGE_NAME,
                ErrorKind::MissingPrerequisite,
                "no credentials loaded",
            ));
        };
        Ok(self.check_access(ctx.access_token.as_ref(), region).await)
    }
}
