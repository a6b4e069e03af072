//! Credential Validator - static format checks for LWA application credentials
//!
//! Validates the shape of the client id, client secret and refresh token
//! without touching the network:
//! - Client id starts with `amzn1.application-oa2-client.`
//! - Client secret starts with `amzn1.oa2-cs.v1.`
//! - Refresh token starts with `Atzr|`
//! - None of the three is empty
//!
//! # Example
//!
//! ```
//! use sp_preflight::core::config::{Credentials, Region};
//! use sp_preflight::security::CredentialFormatChecker;
//!
//! let creds = Credentials::new(
//!     "amzn1.application-oa2-client.X",
//!     "amzn1.oa2-cs.v1.Y",
//!     "Atzr|Z",
//!     Region::NorthAmerica,
//! );
//!
//! let result = CredentialFormatChecker::new().check_format(&creds);
//! assert!(result.success);
//! ```

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;

use crate::core::config::Credentials;
use crate::core::traits::{ErrorKind, RunContext, Stage, StageResult};
use crate::security::token_manager::truncate_secret;

pub const CLIENT_ID_PREFIX: &str = "amzn1.application-oa2-client.";
pub const CLIENT_SECRET_PREFIX: &str = "amzn1.oa2-cs.v1.";
pub const REFRESH_TOKEN_PREFIX: &str = "Atzr|";

/// Stage name recorded in reports
pub const STAGE_NAME: &str = "credential_format";

/// Characters of an offending value echoed back in the report
const ECHO_PREFIX_LEN: usize = 12;

/// Pure, deterministic credential shape checker
#[derive(Debug, Default, Clone, Copy)]
pub struct CredentialFormatChecker;

impl CredentialFormatChecker {
    pub fn new() -> Self {
        Self
    }

    /// Check all credential fields
    ///
    /// Each sub-check is recorded by name in the result detail. A failed
    /// prefix check echoes only a short prefix of the offending value.
    pub fn check_format(&self, credentials: &Credentials) -> StageResult {
        let fields = [
            ("client_id_format", "Client ID", credentials.client_id.as_str(), CLIENT_ID_PREFIX),
            (
                "client_secret_format",
                "Client Secret",
                credentials.client_secret.expose_secret(),
                CLIENT_SECRET_PREFIX,
            ),
            (
                "refresh_token_format",
                "Refresh Token",
                credentials.refresh_token.expose_secret(),
                REFRESH_TOKEN_PREFIX,
            ),
        ];

        let mut detail = serde_json::Map::new();
        let mut hints = Vec::new();
        let mut failed = Vec::new();

        for (check, label, value, prefix) in fields {
            let ok = value.starts_with(prefix);
            detail.insert(check.to_string(), ok.into());
            if !ok {
                failed.push(label);
                detail.insert(
                    format!("{}_mismatch", check),
                    json!({
                        "expected": format!("{}xxxxxxxx", prefix),
                        "got": truncate_secret(value, ECHO_PREFIX_LEN),
                    }),
                );
                hints.push(format!("{} should look like {}xxxxxxxx", label, prefix));
            }
        }

        let non_empty = fields.iter().all(|(_, _, value, _)| !value.is_empty());
        detail.insert("non_empty".to_string(), non_empty.into());
        if !non_empty {
            failed.push("non-empty");
            hints.push("One or more credentials are empty".to_string());
        }

        let mut result = if failed.is_empty() {
            StageResult::passed(STAGE_NAME)
        } else {
            StageResult::failed(
                STAGE_NAME,
                ErrorKind::FormatError,
                format!("format check failed: {}", failed.join(", ")),
            )
            .with_hints(hints)
        };
        result.detail = detail;
        result
    }
}

#[async_trait]
impl Stage for CredentialFormatChecker {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn run(&self, ctx: &mut RunContext) -> anyhow::Result<StageResult> {
        Ok(match &ctx.credentials {
            Some(credentials) => self.check_format(credentials),
            None => StageResult::failed(
                STAGE_NAME,
                ErrorKind::MissingPrerequisite,
                "no credentials loaded",
            ),
        })
    }
}
