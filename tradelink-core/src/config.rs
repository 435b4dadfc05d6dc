//! Client configuration
//!
//! Static base URL, endpoint paths, retry policy and route table consumed by
//! the request executor and the session manager, plus the `[logging]` section
//! read by the CLI.

use crate::async_utils::RetryPolicy;
use crate::error::{ErrorContext, TradelinkError, TradelinkResult};
use crate::logging::LoggingConfig;
use crate::types::RedirectTarget;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every relative endpoint is joined onto
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

/// Endpoint paths relative to `api.base_url`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub role_status: String,
    pub refresh: String,
    pub otp_request: String,
    pub otp_verify: String,
}

/// Client-side routes used for redirects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub login: String,
    pub role_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Token file location; defaults to the per-user data directory
    pub token_file: Option<String>,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub endpoints: EndpointConfig,
    pub retry: RetryPolicy,
    pub routes: RouteConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_seconds: 30,
            user_agent: "tradelink/0.1".to_string(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            role_status: "/accounts/role-status/".to_string(),
            refresh: "/accounts/token/refresh/".to_string(),
            otp_request: "/accounts/otp/request/".to_string(),
            otp_verify: "/accounts/otp/verify/".to_string(),
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            role_status: "/role-status".to_string(),
        }
    }
}

impl ClientConfig {
    /// Default config file location (`<config dir>/tradelink/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tradelink").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> TradelinkResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TradelinkError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: ClientConfig = toml::from_str(&content).map_err(|e| TradelinkError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> TradelinkResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| TradelinkError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content).map_err(|e| TradelinkError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Override selected fields from `TRADELINK_*` environment variables
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(base_url) = std::env::var("TRADELINK_BASE_URL") {
            self.api.base_url = base_url;
        }
        if let Ok(token_file) = std::env::var("TRADELINK_TOKEN_FILE") {
            self.storage.token_file = Some(token_file);
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> TradelinkResult<()> {
        url::Url::parse(&self.api.base_url).map_err(|e| TradelinkError::Config {
            message: format!("Invalid base URL '{}': {}", self.api.base_url, e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("validate")
                .with_suggestion("Set api.base_url to an absolute http(s) URL"),
        })?;

        if self.api.timeout_seconds == 0 {
            return Err(TradelinkError::Config {
                message: "api.timeout_seconds must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set api.timeout_seconds to a positive value"),
            });
        }

        let endpoints = [
            ("endpoints.role_status", &self.endpoints.role_status),
            ("endpoints.refresh", &self.endpoints.refresh),
            ("endpoints.otp_request", &self.endpoints.otp_request),
            ("endpoints.otp_verify", &self.endpoints.otp_verify),
        ];
        for (field, value) in endpoints {
            if value.trim().is_empty() {
                return Err(TradelinkError::Config {
                    message: format!("{} must not be empty", field),
                    source: None,
                    context: ErrorContext::new("config")
                        .with_operation("validate")
                        .with_metadata("field", field),
                });
            }
        }

        Ok(())
    }

    /// Absolute URL for an endpoint; absolute endpoints are returned verbatim
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }

        format!(
            "{}/{}",
            self.api.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Client route for a redirect target
    pub fn route_for(&self, target: RedirectTarget) -> &str {
        match target {
            RedirectTarget::Login => &self.routes.login,
            RedirectTarget::RoleStatus => &self.routes.role_status,
        }
    }

    /// Resolved token file path
    pub fn token_file_path(&self) -> TradelinkResult<PathBuf> {
        if let Some(path) = &self.storage.token_file {
            return Ok(PathBuf::from(path));
        }

        dirs::data_dir()
            .map(|dir| dir.join("tradelink").join("session.json"))
            .ok_or_else(|| TradelinkError::Config {
                message: "Could not determine a data directory for the token file".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("token_file_path")
                    .with_suggestion("Set storage.token_file or TRADELINK_TOKEN_FILE"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn test_endpoint_url_joins_slashes() {
        let mut config = ClientConfig::default();
        config.api.base_url = "https://api.example.com/v1/".to_string();

        assert_eq!(
            config.endpoint_url("/accounts/role-status/"),
            "https://api.example.com/v1/accounts/role-status/"
        );
        assert_eq!(
            config.endpoint_url("products"),
            "https://api.example.com/v1/products"
        );
        assert_eq!(
            config.endpoint_url("https://cdn.example.com/upload"),
            "https://cdn.example.com/upload"
        );
    }

    #[test]
    fn test_validate_rejects_relative_base_url() {
        let mut config = ClientConfig::default();
        assert!(config.validate().is_ok());

        config.api.base_url = "api/v1".to_string();
        let error = config.validate().unwrap_err();
        assert!(matches!(error, TradelinkError::Config { .. }));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://market.example.com/api"

            [retry]
            max_retries = 1
            retry_delay_ms = 250

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://market.example.com/api");
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.endpoints, EndpointConfig::default());
        assert_eq!(config.route_for(RedirectTarget::Login), "/login");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_explicit_token_file_wins() {
        let mut config = ClientConfig::default();
        config.storage.token_file = Some("/tmp/tradelink-test/session.json".to_string());

        assert_eq!(
            config.token_file_path().unwrap(),
            PathBuf::from("/tmp/tradelink-test/session.json")
        );
    }
}
