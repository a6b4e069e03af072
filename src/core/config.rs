//! Configuration structures and types for sp-preflight
//!
//! This module provides the configuration file model (serde) and the
//! validated runtime types built from it.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::core::error::PreflightError;
use crate::probe::{EndpointSpec, HttpMethod};
use crate::security::token_manager::{
    CLIENT_ID_VAR, CLIENT_SECRET_VAR, REFRESH_TOKEN_VAR, REGION_VAR,
};
use crate::stages::service_health::{CHAT_TIMEOUT_SECS, chat_probe_payload};

/// Timeout applied to targets that do not set one
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Region
// ============================================================================

/// Selling Partner API region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "us-east-1")]
    NorthAmerica,
    #[serde(rename = "eu-west-1")]
    Europe,
    #[serde(rename = "us-west-2")]
    FarEast,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::NorthAmerica, Region::Europe, Region::FarEast];

    /// Region identifier as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "us-east-1",
            Region::Europe => "eu-west-1",
            Region::FarEast => "us-west-2",
        }
    }

    /// API base URL for this region
    pub fn base_url(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "https://sellingpartnerapi-na.amazon.com",
            Region::Europe => "https://sellingpartnerapi-eu.amazon.com",
            Region::FarEast => "https://sellingpartnerapi-fe.amazon.com",
        }
    }
}

impl FromStr for Region {
    type Err = PreflightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| PreflightError::UnknownRegion {
                region: s.to_string(),
            })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Validated application credentials
///
/// The client secret and refresh token are held as `SecretString`, so the
/// `Debug` output of this struct never shows them.
#[derive(Debug)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
    pub region: Region,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
        region: Region,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            refresh_token: SecretString::from(refresh_token.into()),
            region,
        }
    }
}

// ============================================================================
// Configuration file model
// ============================================================================

/// Root configuration object
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PreflightConfig {
    /// Application credentials (optional in the file, required to run)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialsConfig>,

    /// Deployment health check topology
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthConfig>,

    /// Analysis backend used by the report command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisConfig>,
}

/// Raw credential values as read from file or environment
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CredentialsConfig {
    #[serde(skip_serializing_if = "Option::is_none", rename = "clientId")]
    pub client_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "clientSecret")]
    pub client_secret: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "refreshToken")]
    pub refresh_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("CredentialsConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("region", &self.region)
            .finish()
    }
}

impl CredentialsConfig {
    /// Build validated credentials
    ///
    /// Every value is mandatory; an unset or empty value is reported under
    /// the environment variable name that supplies it.
    pub fn resolve(&self) -> Result<Credentials, PreflightError> {
        let client_id = required(&self.client_id, CLIENT_ID_VAR)?;
        let client_secret = required(&self.client_secret, CLIENT_SECRET_VAR)?;
        let refresh_token = required(&self.refresh_token, REFRESH_TOKEN_VAR)?;
        let region: Region = required(&self.region, REGION_VAR)?.parse()?;

        Ok(Credentials::new(client_id, client_secret, refresh_token, region))
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, PreflightError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(PreflightError::MissingConfig {
            key: key.to_string(),
        }),
    }
}

/// Health check configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthConfig {
    /// Ordered probe targets
    pub targets: Vec<HealthTarget>,

    /// Logical components mapped to their designated check
    #[serde(default)]
    pub components: Vec<ComponentConfig>,

    /// Probes in flight at once (1 = sequential)
    #[serde(skip_serializing_if = "Option::is_none", rename = "maxConcurrency")]
    pub max_concurrency: Option<usize>,
}

impl HealthConfig {
    /// Probe specs for every target, in declared order
    pub fn endpoint_specs(&self) -> Result<Vec<EndpointSpec>, PreflightError> {
        self.targets.iter().map(HealthTarget::to_endpoint_spec).collect()
    }
}

/// One health probe target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthTarget {
    pub name: String,

    pub url: String,

    /// HTTP method (default: GET)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// JSON request body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Timeout in seconds (default: 10, chat: 30)
    #[serde(skip_serializing_if = "Option::is_none", rename = "timeoutSecs")]
    pub timeout_secs: Option<u64>,

    /// Marks the chat-completion round trip check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<bool>,
}

impl HealthTarget {
    pub fn get(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            method: None,
            payload: None,
            timeout_secs: None,
            chat: None,
        }
    }

    pub fn post(name: &str, url: &str) -> Self {
        Self {
            method: Some("POST".to_string()),
            ..Self::get(name, url)
        }
    }

    pub fn chat(name: &str, url: &str) -> Self {
        Self {
            chat: Some(true),
            ..Self::post(name, url)
        }
    }

    pub fn is_chat(&self) -> bool {
        self.chat.unwrap_or(false)
    }

    /// Build the probe spec for this target
    pub fn to_endpoint_spec(&self) -> Result<EndpointSpec, PreflightError> {
        if self.url.trim().is_empty() {
            return Err(PreflightError::InvalidTarget {
                name: self.name.clone(),
                reason: "url is empty".to_string(),
            });
        }

        let method = match self.method.as_deref() {
            None => HttpMethod::Get,
            Some(m) => m.parse().map_err(|_| PreflightError::InvalidTarget {
                name: self.name.clone(),
                reason: format!("unsupported method {}", m),
            })?,
        };

        let default_timeout = if self.is_chat() {
            CHAT_TIMEOUT_SECS
        } else {
            DEFAULT_TIMEOUT_SECS
        };
        let timeout = Duration::from_secs(self.timeout_secs.unwrap_or(default_timeout));

        let mut spec = EndpointSpec::new(&self.name, &self.url, method).with_timeout(timeout);
        match (&self.payload, self.is_chat()) {
            (Some(payload), _) => spec = spec.with_json(payload.clone()),
            (None, true) => spec = spec.with_json(chat_probe_payload()),
            (None, false) => {}
        }

        Ok(spec)
    }
}

/// Logical component whose state follows one designated check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentConfig {
    pub name: String,

    /// Name of the health target that decides this component
    pub check: String,

    /// Counts toward the core architecture verdict (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// How to start the component when it is down
    #[serde(skip_serializing_if = "Option::is_none", rename = "startHint")]
    pub start_hint: Option<String>,
}

impl ComponentConfig {
    fn new(name: &str, check: &str, required: bool, start_hint: &str) -> Self {
        Self {
            name: name.to_string(),
            check: check.to_string(),
            required: Some(required),
            start_hint: Some(start_hint.to_string()),
        }
    }
}

/// Deployment topology of the chatbot stack
impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            targets: vec![
                HealthTarget::get("MCP Server Health", "http://localhost:7000/health"),
                HealthTarget::get("SP-API Agent Health", "http://localhost:5001/health"),
                HealthTarget::get("SP-API Agent Models", "http://localhost:5001/v1/models"),
                HealthTarget::post("SP-API Agent Session", "http://localhost:5001/v1/sessions"),
                HealthTarget::get("Backend Health", "http://localhost:5000/health"),
                HealthTarget::get(
                    "Backend SP-Analytics Health",
                    "http://localhost:5000/api/sp-analytics/health",
                ),
                HealthTarget::post("Backend Session", "http://localhost:5000/v1/sessions"),
                HealthTarget::get("Frontend", "http://localhost:3000"),
                HealthTarget::chat("Chat Completion", "http://localhost:5000/v1/chat/completions"),
            ],
            components: vec![
                ComponentConfig::new(
                    "MCP Server (port 7000)",
                    "MCP Server Health",
                    true,
                    "cd sp-api-mcp-server && npm start",
                ),
                ComponentConfig::new(
                    "SP-API Agent System (port 5001)",
                    "SP-API Agent Health",
                    true,
                    "cd sp-api-agent-system && python sp_api_agent_system.py",
                ),
                ComponentConfig::new(
                    "Backend (port 5000)",
                    "Backend Health",
                    true,
                    "cd backend && python web_interface.py",
                ),
                ComponentConfig::new(
                    "Frontend (port 3000)",
                    "Frontend",
                    false,
                    "cd frontend && npm start",
                ),
            ],
            max_concurrency: None,
        }
    }
}

/// Analysis backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    /// Chat-completion endpoint that runs report queries
    pub endpoint: String,

    /// Model name sent with each query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Timeout in seconds (default: 300)
    #[serde(skip_serializing_if = "Option::is_none", rename = "timeoutSecs")]
    pub timeout_secs: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000/v1/chat/completions".to_string(),
            model: None,
            timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn full_credentials() -> CredentialsConfig {
        CredentialsConfig {
            client_id: Some("amzn1.application-oa2-client.abc".to_string()),
            client_secret: Some("amzn1.oa2-cs.v1.def".to_string()),
            refresh_token: Some("Atzr|ghi".to_string()),
            region: Some("eu-west-1".to_string()),
        }
    }

    #[test]
    fn test_region_parse_and_base_url() {
        let region: Region = "us-east-1".parse().unwrap();
        assert_eq!(region, Region::NorthAmerica);
        assert_eq!(region.base_url(), "https://sellingpartnerapi-na.amazon.com");
        assert_eq!(
            Region::FarEast.base_url(),
            "https://sellingpartnerapi-fe.amazon.com"
        );
    }

    #[test]
    fn test_unknown_region_fails_fast() {
        let err = "ap-south-1".parse::<Region>().unwrap_err();
        assert!(matches!(err, PreflightError::UnknownRegion { .. }));
    }

    #[test]
    fn test_region_serialization() {
        let yaml = serde_yaml::to_string(&Region::Europe).unwrap();
        assert!(yaml.contains("eu-west-1"));
    }

    #[test]
    fn test_resolve_credentials() {
        let creds = full_credentials().resolve().unwrap();
        assert_eq!(creds.client_id, "amzn1.application-oa2-client.abc");
        assert_eq!(creds.refresh_token.expose_secret(), "Atzr|ghi");
        assert_eq!(creds.region, Region::Europe);
    }

    #[test]
    fn test_resolve_missing_value_is_startup_error() {
        let mut config = full_credentials();
        config.client_secret = None;

        match config.resolve().unwrap_err() {
            PreflightError::MissingConfig { key } => assert_eq!(key, "SP_API_CLIENT_SECRET"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_empty_value_is_startup_error() {
        let mut config = full_credentials();
        config.refresh_token = Some("   ".to_string());

        assert!(matches!(
            config.resolve(),
            Err(PreflightError::MissingConfig { .. })
        ));
    }

    #[test]
    fn test_resolve_missing_region_has_no_default() {
        let mut config = full_credentials();
        config.region = None;

        match config.resolve().unwrap_err() {
            PreflightError::MissingConfig { key } => assert_eq!(key, "SP_API_REGION"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let config = full_credentials();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("amzn1.oa2-cs.v1.def"));
        assert!(!debug.contains("Atzr|ghi"));

        let creds = config.resolve().unwrap();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("amzn1.oa2-cs.v1.def"));
        assert!(!debug.contains("Atzr|ghi"));
    }

    #[test]
    fn test_default_topology() {
        let health = HealthConfig::default();
        assert_eq!(health.targets.len(), 9);
        assert_eq!(health.components.len(), 4);

        let chat: Vec<_> = health.targets.iter().filter(|t| t.is_chat()).collect();
        assert_eq!(chat.len(), 1);

        for component in &health.components {
            assert!(health.targets.iter().any(|t| t.name == component.check));
        }
    }

    #[test]
    fn test_target_to_spec_defaults() {
        let spec = HealthTarget::get("Backend Health", "http://localhost:5000/health")
            .to_endpoint_spec()
            .unwrap();

        assert_eq!(spec.method, HttpMethod::Get);
        assert_eq!(spec.timeout, Duration::from_secs(10));
        assert!(spec.body.is_none());
    }

    #[test]
    fn test_chat_target_gets_long_timeout_and_payload() {
        let spec = HealthTarget::chat("Chat Completion", "http://localhost:5000/v1/chat/completions")
            .to_endpoint_spec()
            .unwrap();

        assert_eq!(spec.method, HttpMethod::Post);
        assert_eq!(spec.timeout, Duration::from_secs(30));
        assert!(spec.body.is_some());
    }

    #[test]
    fn test_target_with_unsupported_method() {
        let mut target = HealthTarget::get("Backend", "http://localhost:5000");
        target.method = Some("PUT".to_string());

        assert!(matches!(
            target.to_endpoint_spec(),
            Err(PreflightError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn test_deserialize_health_config() {
        let yaml = r#"
targets:
  - name: API
    url: http://localhost:8080/health
  - name: Chat
    url: http://localhost:8080/v1/chat/completions
    chat: true
    timeoutSecs: 45
components:
  - name: API server
    check: API
maxConcurrency: 4
"#;
        let config: HealthConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.targets.len(), 2);
        assert!(config.targets[1].is_chat());
        assert_eq!(config.targets[1].timeout_secs, Some(45));
        assert_eq!(config.components[0].required, None);
        assert_eq!(config.max_concurrency, Some(4));
    }
}
