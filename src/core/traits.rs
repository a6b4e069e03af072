//! Core traits and types for staged validation
//!
//! This module defines the outcome model shared by every check (`StageResult`,
//! `ErrorKind`, `ValidationReport`) and the `Stage` abstraction driven by the
//! pipeline runner.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::core::config::Credentials;
use crate::stages::token_exchange::AccessToken;

// ============================================================================
// Error kinds
// ============================================================================

/// Classified reason a stage did not pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    FormatError,
    ConnectionRefused,
    Timeout,
    TransportError,
    HttpError { status: u16 },
    Unauthorized,
    Forbidden,
    MissingPrerequisite,
    Skipped,
    InternalError,
}

impl ErrorKind {
    /// Stable code for reports and automation
    pub fn code(&self) -> &'static str {
        match self {
            Self::FormatError => "FORMAT_ERROR",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::Timeout => "TIMEOUT",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::HttpError { .. } => "HTTP_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::MissingPrerequisite => "MISSING_PREREQUISITE",
            Self::Skipped => "SKIPPED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// HTTP status associated with this kind, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status } => Some(*status),
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            _ => None,
        }
    }

    /// Generic remediation for this kind. Stages add more specific hints.
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::FormatError => vec!["Re-copy the value from the developer console"],
            Self::ConnectionRefused => vec![
                "Check that the service is running",
                "Check host and port in the configuration",
            ],
            Self::Timeout => vec!["Check network connectivity and service load"],
            Self::TransportError => vec!["Inspect the error message for the underlying cause"],
            Self::HttpError { .. } => vec!["Inspect the response body for details"],
            Self::Unauthorized => vec!["The access token may be invalid or expired"],
            Self::Forbidden => vec!["Check application permissions and seller authorization"],
            Self::MissingPrerequisite => vec!["Run the stage this check depends on first"],
            Self::Skipped => vec!["Fix the failed dependency and run again"],
            Self::InternalError => vec!["This is a bug in the checker; please report it"],
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status() {
            Some(status) => write!(f, "{} ({})", self.code(), status),
            None => f.write_str(self.code()),
        }
    }
}

// ============================================================================
// Stage results
// ============================================================================

/// Outcome of one executed (or skipped) stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage_name: String,
    pub success: bool,
    #[serde(default)]
    pub detail: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

impl StageResult {
    pub fn passed(stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: true,
            detail: Map::new(),
            error_kind: None,
            error_message: None,
            hints: Vec::new(),
        }
    }

    pub fn failed(
        stage_name: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: false,
            detail: Map::new(),
            error_kind: Some(kind),
            error_message: Some(message.into()),
            hints: Vec::new(),
        }
    }

    /// Result recorded in place of a stage whose dependency did not pass
    pub fn skipped(stage_name: impl Into<String>, dependency: &str) -> Self {
        Self::failed(
            stage_name,
            ErrorKind::Skipped,
            format!("dependency '{}' did not succeed", dependency),
        )
        .with_detail("dependency", dependency)
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.detail.insert(key.to_string(), value.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hints.extend(hints.into_iter().map(Into::into));
        self
    }

    pub fn is_skipped(&self) -> bool {
        self.error_kind == Some(ErrorKind::Skipped)
    }
}

// ============================================================================
// Validation report
// ============================================================================

/// Ordered results of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub results: Vec<StageResult>,
    pub overall_success: bool,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            overall_success: true,
        }
    }

    pub fn from_results(results: Vec<StageResult>) -> Self {
        let mut report = Self::new();
        report.extend(results);
        report
    }

    pub fn push(&mut self, result: StageResult) {
        self.overall_success &= result.success;
        self.results.push(result);
    }

    pub fn extend<I: IntoIterator<Item = StageResult>>(&mut self, results: I) {
        for result in results {
            self.push(result);
        }
    }

    /// Look up the recorded result of a stage by name
    pub fn get(&self, stage_name: &str) -> Option<&StageResult> {
        self.results.iter().find(|r| r.stage_name == stage_name)
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| !r.success && !r.is_skipped())
            .count()
    }
}

// ============================================================================
// Stage trait
// ============================================================================

/// Per-run state handed from stage to stage
///
/// Holds the run's inputs and the access token produced by the token
/// exchange. Dropped when the run ends.
#[derive(Debug, Default)]
pub struct RunContext {
    pub credentials: Option<Arc<Credentials>>,
    pub access_token: Option<AccessToken>,
}

impl RunContext {
    pub fn with_credentials(credentials: Arc<Credentials>) -> Self {
        Self {
            credentials: Some(credentials),
            access_token: None,
        }
    }
}

/// One named step of a validation pipeline
///
/// A stage may name another stage it depends on; the runner skips it when
/// that stage has not been recorded as successful.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name recorded in the report and used for dependency lookup
    fn name(&self) -> &str;

    /// Name of the stage that must succeed first
    fn depends_on(&self) -> Option<&str> {
        None
    }

    /// Execute the stage
    ///
    /// Expected failures are returned as an unsuccessful `StageResult`. An
    /// `Err` is reserved for bugs and is recorded as `InternalError`.
    async fn run(&self, ctx: &mut RunContext) -> anyhow::Result<StageResult>;
}
