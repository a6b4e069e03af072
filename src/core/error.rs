//! Startup error handling
//!
//! Stage failures are data (`StageResult`); the errors here are the ones that
//! stop the tool before any stage runs, with recovery guidance for the
//! operator.

use thiserror::Error;

use crate::security::token_manager::REQUIRED_ENV_VARS;

/// Errors raised while loading configuration or building a run
#[derive(Error, Debug)]
pub enum PreflightError {
    #[error("required configuration value '{key}' is not set")]
    MissingConfig { key: String },

    #[error("unknown region '{region}'")]
    UnknownRegion { region: String },

    #[error("invalid health target '{name}': {reason}")]
    InvalidTarget { name: String, reason: String },

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl PreflightError {
    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<String> {
        match self {
            Self::MissingConfig { key } => vec![
                format!("Set the {} environment variable", key),
                "Or add it to the credentials section of .preflight.yaml".to_string(),
                format!("Required: {}", REQUIRED_ENV_VARS.join(", ")),
            ],
            Self::UnknownRegion { .. } => vec![format!(
                "Use one of: {}",
                crate::core::config::Region::ALL
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )],
            Self::InvalidTarget { .. } => vec![
                "Check url and method of the target in health.targets".to_string(),
            ],
            Self::ConfigError(_) => vec!["Check the configuration file syntax".to_string()],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingConfig { .. } => "MISSING_CONFIG",
            Self::UnknownRegion { .. } => "UNKNOWN_REGION",
            Self::InvalidTarget { .. } => "INVALID_TARGET",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }
}
