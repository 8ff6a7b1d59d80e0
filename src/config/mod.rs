//! Configuration management for token-gate
//!
//! This module handles loading, parsing, and validating the gate configuration
//! from YAML files and environment variables. The result is a plain value; the
//! gate turns it into an immutable snapshot at startup or reload.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::auth::ratelimit::StoreFailurePolicy;

/// Environment variable holding the fallback token
pub const FALLBACK_TOKEN_VAR: &str = "API_TOKEN";

/// Prefix of environment variables holding service-scoped tokens
pub const SERVICE_TOKEN_VAR_PREFIX: &str = "API_TOKEN_";

/// Longest accepted `rate_limiting.lockout_duration_secs` (one year)
pub const MAX_LOCKOUT_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Service-scoped tokens keyed by service name
    ///
    /// A service whose value is missing or empty is "not configured".
    #[serde(default)]
    pub tokens: BTreeMap<String, Option<String>>,

    /// Token accepted when no service scope is requested
    #[serde(default)]
    pub fallback_token: Option<String>,

    /// Failed-attempt rate limiting
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Whether failed attempts are written to the audit log
    #[serde(default = "default_log_failed_attempts")]
    pub log_failed_attempts: bool,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            tokens: BTreeMap::new(),
            fallback_token: None,
            rate_limiting: RateLimitingConfig::default(),
            log_failed_attempts: default_log_failed_attempts(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file if given, otherwise from the environment,
    /// and validate it
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Build configuration from a set of environment-style variables
    ///
    /// `API_TOKEN` is the fallback token and every `API_TOKEN_<NAME>` becomes
    /// the token of service `<name>` (lower-cased, `_` mapped to `-`).
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Config::default();

        for (name, value) in vars {
            match name.as_str() {
                FALLBACK_TOKEN_VAR => config.fallback_token = Some(value),
                "API_RATE_LIMITING_ENABLED" => {
                    config.rate_limiting.enabled = parse_bool(&name, &value)?;
                }
                "API_RATE_LIMITING_MAX_ATTEMPTS" => {
                    config.rate_limiting.max_attempts = value.parse().map_err(|_| {
                        ConfigError::Parse(format!("Invalid number in {}", name))
                    })?;
                }
                "API_RATE_LIMITING_LOCKOUT_DURATION" => {
                    config.rate_limiting.lockout_duration_secs = value.parse().map_err(|_| {
                        ConfigError::Parse(format!("Invalid number in {}", name))
                    })?;
                }
                "API_LOG_FAILED_ATTEMPTS" => {
                    config.log_failed_attempts = parse_bool(&name, &value)?;
                }
                "TOKEN_GATE_SERVER_HOST" => config.server.host = value,
                "TOKEN_GATE_SERVER_PORT" => {
                    config.server.port = value
                        .parse()
                        .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
                }
                "TOKEN_GATE_LOG_LEVEL" => config.logging.level = value,
                _ => {
                    if let Some(service) = name.strip_prefix(SERVICE_TOKEN_VAR_PREFIX) {
                        if !service.is_empty() {
                            config.tokens.insert(service_name_from_var(service), Some(value));
                        }
                    }
                }
            }
        }

        Ok(config)
    }

    /// Check value ranges the rest of the crate relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limiting.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limiting.max_attempts must be positive".to_string(),
            ));
        }
        if self.rate_limiting.lockout_duration_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limiting.lockout_duration_secs must be positive".to_string(),
            ));
        }
        if self.rate_limiting.lockout_duration_secs > MAX_LOCKOUT_DURATION_SECS {
            return Err(ConfigError::InvalidValue(format!(
                "rate_limiting.lockout_duration_secs must be at most {}",
                MAX_LOCKOUT_DURATION_SECS
            )));
        }
        if let Some(name) = self.tokens.keys().find(|n| !is_valid_service_name(n)) {
            return Err(ConfigError::InvalidValue(format!(
                "service name {:?} may only contain letters, digits, '-' and '_'",
                name
            )));
        }
        match self.logging.format.as_str() {
            "json" | "pretty" => Ok(()),
            other => Err(ConfigError::InvalidValue(format!(
                "logging.format must be json or pretty, got {}",
                other
            ))),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Rate limiting configuration for failed authentication attempts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitingConfig {
    /// Whether failed attempts are counted and enforced
    #[serde(default = "default_rate_limiting_enabled")]
    pub enabled: bool,

    /// Number of failures after which a client is locked out
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lockout duration (in seconds)
    #[serde(default = "default_lockout_duration")]
    pub lockout_duration_secs: u64,

    /// Behaviour of the lockout check when the counter store fails
    #[serde(default)]
    pub on_store_error: StoreFailurePolicy,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limiting_enabled(),
            max_attempts: default_max_attempts(),
            lockout_duration_secs: default_lockout_duration(),
            on_store_error: StoreFailurePolicy::default(),
        }
    }
}

fn default_rate_limiting_enabled() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    60
}

fn default_lockout_duration() -> u64 {
    60
}

fn default_log_failed_attempts() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (`json` or `pretty`)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Map the `<NAME>` part of `API_TOKEN_<NAME>` to a service name
pub fn service_name_from_var(suffix: &str) -> String {
    suffix.to_ascii_lowercase().replace('_', "-")
}

/// Whether `name` can be used as a service name and route segment
///
/// Accepts non-empty ASCII letters, digits, `-` and `_`.
pub fn is_valid_service_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Environment variable name that holds the token for `service`
///
/// The inverse of [`service_name_from_var`]; `None` names the fallback token.
pub fn token_var_name(service: Option<&str>) -> String {
    match service {
        Some(service) => format!(
            "{}{}",
            SERVICE_TOKEN_VAR_PREFIX,
            service.to_ascii_uppercase().replace('-', "_")
        ),
        None => FALLBACK_TOKEN_VAR.to_string(),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Parse(format!("Invalid boolean in {}", name))),
    }
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax. Unset variables expand to the empty string,
/// which leaves the corresponding token unconfigured.
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .into_owned()
}
