//! Configuration file loader for sp-preflight
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::PreflightError;
use crate::security::token_manager::{
    CLIENT_ID_VAR, CLIENT_SECRET_VAR, REFRESH_TOKEN_VAR, REGION_VAR,
};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Configuration file name
const CONFIG_FILENAME: &str = ".preflight.yaml";

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Directory searched for .preflight.yaml
    pub project_path: PathBuf,

    /// Explicit config file (must exist when given)
    pub config_path: Option<PathBuf>,

    /// Environment variables
    pub env: HashMap<String, String>,

    /// Region given on the command line (highest priority)
    pub region_override: Option<String>,
}

impl ConfigLoadOptions {
    /// Options for the current directory and process environment
    pub fn from_process_env(config_path: Option<PathBuf>) -> Self {
        Self {
            project_path: PathBuf::from("."),
            config_path,
            env: std::env::vars().collect(),
            region_override: None,
        }
    }
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "health.targets[2].url")
    pub field: String,

    /// Error message
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

impl ConfigValidationWarning {
    /// Message with the suggestion appended, if any
    pub fn describe(&self) -> String {
        match &self.suggestion {
            Some(suggestion) => format!("{} ({})", self.message, suggestion),
            None => self.message.clone(),
        }
    }
}

impl ConfigValidationResult {
    /// All errors joined into one line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Config file (--config or ./.preflight.yaml)
    /// 4. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PreflightConfig, PreflightError> {
        let mut configs: Vec<PreflightConfig> = Vec::new();

        // 4. Default values (lowest priority)
        configs.push(PreflightConfig::default());

        // 3. Config file
        let file_config = match &options.config_path {
            Some(path) => Some(
                Self::load_config_file(path, &options.env)
                    .await?
                    .ok_or_else(|| {
                        PreflightError::ConfigError(format!(
                            "config file not found: {}",
                            path.display()
                        ))
                    })?,
            ),
            None => {
                let path = options.project_path.join(CONFIG_FILENAME);
                Self::load_config_file(&path, &options.env).await?
            }
        };
        if let Some(file_config) = file_config {
            configs.push(file_config);
        }

        // 2. Environment variables
        if let Some(env_config) = Self::load_env_config(&options.env) {
            configs.push(env_config);
        }

        // 1. CLI arguments (highest priority)
        if let Some(region) = options.region_override {
            configs.push(PreflightConfig {
                credentials: Some(CredentialsConfig {
                    region: Some(region),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }

        let merged = Self::merge_configs(configs);

        let report = Self::validate(&merged);
        for warning in &report.warnings {
            warn!(field = %warning.field, "{}", warning.describe());
        }
        if !report.valid {
            return Err(PreflightError::ConfigError(report.error_summary()));
        }

        Ok(merged)
    }

    /// Load configuration from a YAML file, expanding ${VAR} references
    async fn load_config_file(
        file_path: &Path,
        env: &HashMap<String, String>,
    ) -> Result<Option<PreflightConfig>, PreflightError> {
        // Check if file exists
        if !file_path.exists() {
            return Ok(None);
        }

        debug!(path = %file_path.display(), "loading config file");

        let content = fs::read_to_string(file_path).await.map_err(|e| {
            PreflightError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let expanded = Self::expand_string(&content, env)?;

        let config = serde_yaml::from_str(&expanded).map_err(|e| {
            PreflightError::ConfigError(format!("Failed to parse YAML config: {}", e))
        })?;

        Ok(Some(config))
    }

    /// Load credential values from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<PreflightConfig> {
        let get = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

        let credentials = CredentialsConfig {
            client_id: get(CLIENT_ID_VAR),
            client_secret: get(CLIENT_SECRET_VAR),
            refresh_token: get(REFRESH_TOKEN_VAR),
            region: get(REGION_VAR),
        };

        if credentials == CredentialsConfig::default() {
            return None;
        }

        Some(PreflightConfig {
            credentials: Some(credentials),
            ..Default::default()
        })
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<PreflightConfig>) -> PreflightConfig {
        let mut result = PreflightConfig::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target
    fn merge_into(target: &mut PreflightConfig, source: PreflightConfig) {
        // Credentials merge per field so env can fill gaps in the file
        if let Some(source_creds) = source.credentials {
            let target_creds = target.credentials.get_or_insert_with(Default::default);

            if source_creds.client_id.is_some() {
                target_creds.client_id = source_creds.client_id;
            }
            if source_creds.client_secret.is_some() {
                target_creds.client_secret = source_creds.client_secret;
            }
            if source_creds.refresh_token.is_some() {
                target_creds.refresh_token = source_creds.refresh_token;
            }
            if source_creds.region.is_some() {
                target_creds.region = source_creds.region;
            }
        }

        // Health topology is replaced as a whole
        if source.health.is_some() {
            target.health = source.health;
        }

        if source.analysis.is_some() {
            target.analysis = source.analysis;
        }
    }

    /// Expand environment variables in a single string
    ///
    /// Unknown variables are left in place so the later validation reports
    /// the value that was actually seen.
    fn expand_string(input: &str, env: &HashMap<String, String>) -> Result<String, PreflightError> {
        let env_var_regex = Regex::new(ENV_VAR_PATTERN)
            .map_err(|e| PreflightError::ConfigError(format!("invalid env pattern: {}", e)))?;

        let mut result = input.to_string();
        for cap in env_var_regex.captures_iter(input) {
            let var_name = &cap[1];

            if let Some(value) = env.get(var_name) {
                result = result.replace(&format!("${{{}}}", var_name), value);
            } else {
                warn!("environment variable {} not found", var_name);
            }
        }

        Ok(result)
    }

    /// Validate configuration
    pub fn validate(config: &PreflightConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Some(health) = &config.health {
            Self::validate_health(health, &mut errors, &mut warnings);
        }

        if let Some(analysis) = &config.analysis
            && analysis.endpoint.trim().is_empty()
        {
            errors.push(ConfigValidationError {
                field: "analysis.endpoint".to_string(),
                message: "endpoint is required".to_string(),
            });
        }

        if let Some(creds) = &config.credentials {
            let unexpanded = [
                ("credentials.clientId", &creds.client_id),
                ("credentials.clientSecret", &creds.client_secret),
                ("credentials.refreshToken", &creds.refresh_token),
                ("credentials.region", &creds.region),
            ];
            for (field, value) in unexpanded {
                if value.as_deref().is_some_and(|v| v.contains("${")) {
                    warnings.push(ConfigValidationWarning {
                        field: field.to_string(),
                        message: "value still contains an unexpanded ${...} reference".to_string(),
                        suggestion: Some("Export the referenced environment variable".to_string()),
                    });
                }
            }
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Validate health check topology
    fn validate_health(
        health: &HealthConfig,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        if health.max_concurrency == Some(0) {
            errors.push(ConfigValidationError {
                field: "health.maxConcurrency".to_string(),
                message: "maxConcurrency must be at least 1".to_string(),
            });
        }

        let mut names = HashSet::new();
        for (i, target) in health.targets.iter().enumerate() {
            if !names.insert(target.name.as_str()) {
                errors.push(ConfigValidationError {
                    field: format!("health.targets[{}].name", i),
                    message: format!("duplicate target name '{}'", target.name),
                });
            }

            if let Err(e) = target.to_endpoint_spec() {
                errors.push(ConfigValidationError {
                    field: format!("health.targets[{}]", i),
                    message: e.to_string(),
                });
            } else if !target.url.starts_with("http://") && !target.url.starts_with("https://") {
                warnings.push(ConfigValidationWarning {
                    field: format!("health.targets[{}].url", i),
                    message: format!("url '{}' has no http(s) scheme", target.url),
                    suggestion: Some("Use a full URL such as http://localhost:5000/health".to_string()),
                });
            }
        }

        for (i, component) in health.components.iter().enumerate() {
            if !names.contains(component.check.as_str()) {
                errors.push(ConfigValidationError {
                    field: format!("health.components[{}].check", i),
                    message: format!("no target named '{}'", component.check),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILENAME);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    fn options(dir: &TempDir, env: &[(&str, &str)]) -> ConfigLoadOptions {
        ConfigLoadOptions {
            project_path: dir.path().to_path_buf(),
            config_path: None,
            env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            region_override: None,
        }
    }

    #[tokio::test]
    async fn test_load_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::load(options(&dir, &[])).await.unwrap();

        assert!(config.credentials.is_none());
        assert!(config.health.is_none());
    }

    #[tokio::test]
    async fn test_load_credentials_from_env() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::load(options(
            &dir,
            &[
                ("SP_API_CLIENT_ID", "amzn1.application-oa2-client.a"),
                ("SP_API_CLIENT_SECRET", "amzn1.oa2-cs.v1.b"),
                ("SP_API_REFRESH_TOKEN", "Atzr|c"),
                ("SP_API_REGION", "us-east-1"),
            ],
        ))
        .await
        .unwrap();

        let creds = config.credentials.unwrap().resolve().unwrap();
        assert_eq!(creds.client_id, "amzn1.application-oa2-client.a");
        assert_eq!(creds.region, Region::NorthAmerica);
    }

    #[tokio::test]
    async fn test_env_overrides_file_per_field() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
credentials:
  clientId: amzn1.application-oa2-client.file
  region: eu-west-1
"#,
        );

        let config = ConfigLoader::load(options(
            &dir,
            &[("SP_API_CLIENT_ID", "amzn1.application-oa2-client.env")],
        ))
        .await
        .unwrap();

        let creds = config.credentials.unwrap();
        assert_eq!(
            creds.client_id.as_deref(),
            Some("amzn1.application-oa2-client.env")
        );
        assert_eq!(creds.region.as_deref(), Some("eu-west-1"));
    }

    #[tokio::test]
    async fn test_region_override_has_highest_priority() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(&dir, &[("SP_API_REGION", "us-east-1")]);
        opts.region_override = Some("us-west-2".to_string());

        let config = ConfigLoader::load(opts).await.unwrap();
        assert_eq!(
            config.credentials.unwrap().region.as_deref(),
            Some("us-west-2")
        );
    }

    #[tokio::test]
    async fn test_expand_env_vars_in_file() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
credentials:
  refreshToken: ${MY_REFRESH_TOKEN}
health:
  targets:
    - name: API
      url: http://${API_HOST}/health
"#,
        );

        let config = ConfigLoader::load(options(
            &dir,
            &[("MY_REFRESH_TOKEN", "Atzr|xyz"), ("API_HOST", "10.0.0.5:8080")],
        ))
        .await
        .unwrap();

        assert_eq!(
            config.credentials.unwrap().refresh_token.as_deref(),
            Some("Atzr|xyz")
        );
        assert_eq!(
            config.health.unwrap().targets[0].url,
            "http://10.0.0.5:8080/health"
        );
    }

    #[tokio::test]
    async fn test_explicit_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(&dir, &[]);
        opts.config_path = Some(dir.path().join("missing.yaml"));

        let err = ConfigLoader::load(opts).await.unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_error() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "health: [not: valid");

        let err = ConfigLoader::load(options(&dir, &[])).await.unwrap_err();
        assert!(err.to_string().contains("YAML"));
    }

    #[tokio::test]
    async fn test_component_with_unknown_check_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
health:
  targets:
    - name: API
      url: http://localhost:8080/health
  components:
    - name: Worker
      check: Worker Health
"#,
        );

        let err = ConfigLoader::load(options(&dir, &[])).await.unwrap_err();
        assert!(err.to_string().contains("Worker Health"));
    }

    #[test]
    fn test_validate_duplicate_target_names() {
        let config = PreflightConfig {
            health: Some(HealthConfig {
                targets: vec![
                    HealthTarget::get("API", "http://localhost:1/health"),
                    HealthTarget::get("API", "http://localhost:2/health"),
                ],
                components: vec![],
                max_concurrency: Some(0),
            }),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_validate_default_topology() {
        let config = PreflightConfig {
            health: Some(HealthConfig::default()),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);
        assert!(result.valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_warning_describe_includes_suggestion() {
        let config = PreflightConfig {
            health: Some(HealthConfig {
                targets: vec![HealthTarget::get("API", "localhost:8080/health")],
                components: vec![],
                max_concurrency: None,
            }),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);

        assert!(result.valid);
        let described = result.warnings[0].describe();
        assert!(described.contains("no http(s) scheme"));
        assert!(described.contains("http://localhost:5000/health"));
    }

    #[tokio::test]
    async fn test_all_validation_errors_are_reported() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
health:
  maxConcurrency: 0
  targets:
    - name: API
      url: http://localhost:8080/health
  components:
    - name: Worker
      check: Worker Health
"#,
        );

        let err = ConfigLoader::load(options(&dir, &[])).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("health.maxConcurrency"));
        assert!(message.contains("Worker Health"));
    }

    #[test]
    fn test_expand_string_leaves_unknown_vars() {
        let env = HashMap::from([("KNOWN".to_string(), "value".to_string())]);
        let expanded = ConfigLoader::expand_string("${KNOWN}-${UNKNOWN}", &env).unwrap();
        assert_eq!(expanded, "value-${UNKNOWN}");
    }
}
