//! Refresh-token exchange against the LWA authorization server
//!
//! The only stage that produces an `AccessToken`. The token is stored in the
//! run's `RunContext` and dropped with it.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use crate::core::config::{Credentials, DEFAULT_TIMEOUT_SECS};
use crate::core::traits::{ErrorKind, RunContext, Stage, StageResult};
use crate::probe::{EndpointProbe, EndpointSpec, HttpResponse};
use crate::security::token_manager::{SecureTokenManager, truncate_secret};

pub const LWA_TOKEN_URL: &str = "https://api.amazon.com/auth/o2/token";

/// Stage name recorded in reports
pub const STAGE_NAME: &str = "token_exchange";

/// Lifetime assumed when the server omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Characters of the access token shown in the report
const TOKEN_PREFIX_LEN: usize = 20;

/// Short-lived access token
#[derive(Debug)]
pub struct AccessToken {
    pub value: SecretString,
    pub token_type: String,
    pub expires_in_seconds: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

pub struct TokenExchangeStage {
    probe: EndpointProbe,
}

impl TokenExchangeStage {
    pub fn new(probe: EndpointProbe) -> Self {
        Self { probe }
    }

    fn request(credentials: &Credentials) -> EndpointSpec {
        EndpointSpec::post("LWA token exchange", LWA_TOKEN_URL)
            .with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .with_form([
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token.expose_secret()),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.expose_secret()),
            ])
    }

    /// Exchange the refresh token for an access token
    ///
    /// Returns the token only when the result is successful. Messages that
    /// echo server output are scrubbed of the credentials sent.
    pub async fn exchange(&self, credentials: &Credentials) -> (Option<AccessToken>, StageResult) {
        let scrubber = SecureTokenManager::for_credentials(credentials);
        info!(region = %credentials.region, "exchanging refresh token");

        let (token, result) = match self.probe.execute(&Self::request(credentials)).await {
            Err(failure) => {
                let kind = failure.kind();
                let result = StageResult::failed(
                    STAGE_NAME,
                    kind,
                    scrubber.mask_tokens_in_string(&failure.to_string()),
                )
                .with_hints(kind.suggested_actions());
                (None, result)
            }
            Ok(response) if response.status == 200 => Self::accept(&response),
            Ok(response) => (None, Self::reject(&response, &scrubber)),
        };

        (token, result.with_detail("endpoint", LWA_TOKEN_URL))
    }

    fn accept(response: &HttpResponse) -> (Option<AccessToken>, StageResult) {
        let parsed = serde_json::from_str::<TokenResponse>(&response.body).ok();
        let Some((value, parsed)) = parsed.and_then(|p| {
            p.access_token
                .clone()
                .filter(|t| !t.is_empty())
                .map(|t| (t, p))
        }) else {
            return (
                None,
                StageResult::failed(
                    STAGE_NAME,
                    ErrorKind::TransportError,
                    "malformed token response: no access_token in body",
                )
                .with_detail("status_code", response.status),
            );
        };

        let token = AccessToken {
            token_type: parsed.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_in_seconds: parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            value: SecretString::from(value),
        };

        let result = StageResult::passed(STAGE_NAME)
            .with_detail("status_code", response.status)
            .with_detail("token_type", token.token_type.as_str())
            .with_detail("expires_in", token.expires_in_seconds)
            .with_detail("expires_in_minutes", token.expires_in_seconds / 60)
            .with_detail(
                "access_token_prefix",
                truncate_secret(token.value.expose_secret(), TOKEN_PREFIX_LEN),
            );

        (Some(token), result)
    }

    fn reject(response: &HttpResponse, scrubber: &SecureTokenManager) -> StageResult {
        let parsed = serde_json::from_str::<TokenErrorResponse>(&response.body).ok();
        let error_code = parsed.as_ref().and_then(|p| p.error.clone());
        let message = parsed
            .and_then(|p| p.error_description.or(p.error))
            .unwrap_or_else(|| response.body.clone());

        let mut result = StageResult::failed(
            STAGE_NAME,
            ErrorKind::HttpError {
                status: response.status,
            },
            scrubber.mask_tokens_in_string(&message),
        )
        .with_detail("status_code", response.status)
        .with_hints([
            "Client ID or Client Secret may be invalid",
            "Refresh token may be expired or revoked",
            "Credentials may belong to a different application",
        ]);

        if let Some(code) = error_code {
            result = result.with_detail("error", scrubber.mask_tokens_in_string(&code));
        }
        result
    }
}

#[async_trait]
impl Stage for TokenExchangeStage {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn run(&self, ctx: &mut RunContext) -> anyhow::Result<StageResult> {
        let Some(credentials) = ctx.credentials.clone() else {
            return Ok(StageResult::failed(
                STAGE_NAME,
                ErrorKind::MissingPrerequisite,
                "no credentials loaded",
            ));
        };

        let (token, result) = self.exchange(&credentials).await;
        ctx.access_token = token;
        Ok(result)
    }
}
