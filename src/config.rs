//! Configuration parsing and validation for nanobanana-relay.
//!
//! Values come from built-in defaults, an optional TOML file, and the
//! `PORT` / `API_MASTER_KEY` / `UPSTREAM_URL` environment variables, in
//! increasing order of precedence. The result is immutable once the server
//! starts.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding the listen port.
pub const ENV_PORT: &str = "PORT";
/// Environment variable overriding the master key.
pub const ENV_API_MASTER_KEY: &str = "API_MASTER_KEY";
/// Environment variable overriding the upstream URL.
pub const ENV_UPSTREAM_URL: &str = "UPSTREAM_URL";

/// Master key value that disables authentication entirely.
pub const DEBUG_MASTER_KEY: &str = "1";

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Model identifiers advertised by `GET /v1/models`
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            upstream: UpstreamConfig::default(),
            models: default_models(),
            streaming: StreamingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_models() -> Vec<String> {
    vec![
        "openai/gpt-oss-20b:free".to_string(),
        "gpt-4o-mini".to_string(),
        "gpt-3.5-turbo".to_string(),
    ]
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:3000")
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Master key wrapper that redacts in Debug/Display and zeroizes on drop.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value. Every call site is auditable via `grep expose_secret`.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(ApiKey::from)
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// Client authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Key expected in `Authorization: Bearer <key>`; `"1"` disables auth
    #[serde(default = "default_master_key")]
    pub master_key: ApiKey,
}

fn default_master_key() -> ApiKey {
    ApiKey::from(DEBUG_MASTER_KEY)
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            master_key: default_master_key(),
        }
    }
}

impl AuthConfig {
    /// Whether every request is let through without a bearer token.
    pub fn is_open(&self) -> bool {
        self.master_key.expose_secret() == DEBUG_MASTER_KEY
    }
}

/// Upstream chat service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Full URL of the upstream chat endpoint
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// Model identifier sent upstream regardless of what the caller asked for
    #[serde(default = "default_upstream_model")]
    pub model: String,
    /// Site domain reported in the upstream payload
    #[serde(default = "default_upstream_domain")]
    pub domain: String,
}

fn default_upstream_url() -> String {
    "https://assets.chooat.com/api/openrouter-notlogin".to_string()
}

fn default_upstream_model() -> String {
    "openai/gpt-oss-20b:free".to_string()
}

fn default_upstream_domain() -> String {
    "nanobananaprompt.org".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            model: default_upstream_model(),
            domain: default_upstream_domain(),
        }
    }
}

/// Pseudo-streaming configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamingConfig {
    /// Characters per emitted chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pause after each content chunk, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_chunk_size() -> usize {
    5
}

fn default_delay_ms() -> u64 {
    10
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl StreamingConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level for the relay's own targets
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the startup configuration: defaults, then the optional file,
    /// then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PORT`, `API_MASTER_KEY` and `UPSTREAM_URL` overrides using a
    /// custom lookup function, so tests never touch the real environment.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_PORT) {
            let port: u16 = port.trim().parse().map_err(|_| {
                ConfigError::Validation(format!(
                    "Environment variable '{}' is not a valid port: '{}'",
                    ENV_PORT, port
                ))
            })?;
            self.server.listen.set_port(port);
        }

        if let Some(key) = lookup(ENV_API_MASTER_KEY) {
            self.auth.master_key = ApiKey::from(key);
        }

        if let Some(url) = lookup(ENV_UPSTREAM_URL) {
            self.upstream.url = url;
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.upstream.url).map_err(|e| {
            ConfigError::Validation(format!(
                "Upstream URL '{}' is invalid: {}",
                self.upstream.url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "Upstream URL '{}' must use http or https",
                self.upstream.url
            )));
        }

        if self.streaming.chunk_size == 0 {
            return Err(ConfigError::Validation(
                "streaming.chunk_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Non-fatal problems worth logging once tracing is initialized.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.models.is_empty() {
            warnings.push(
                "No models configured - /v1/models will return an empty list".to_string(),
            );
        }
        warnings
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.listen.port(), 3000);
        assert!(config.auth.is_open());
        assert_eq!(
            config.upstream.url,
            "https://assets.chooat.com/api/openrouter-notlogin"
        );
        assert_eq!(config.upstream.model, "openai/gpt-oss-20b:free");
        assert_eq!(config.upstream.domain, "nanobananaprompt.org");
        assert_eq!(config.models.len(), 3);
        assert_eq!(config.streaming.chunk_size, 5);
        assert_eq!(config.streaming.delay(), Duration::from_millis(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = Config::parse_str("").unwrap();
        assert_eq!(config.server.listen, default_listen());
        assert_eq!(config.models, default_models());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            models = ["only-model"]

            [server]
            listen = "127.0.0.1:9000"

            [auth]
            master_key = "sk-test"

            [upstream]
            url = "http://localhost:1234/chat"
            model = "other/model"
            domain = "example.org"

            [streaming]
            chunk_size = 8
            delay_ms = 0

            [logging]
            level = "debug"
        "#;

        let config = Config::parse_str(toml).unwrap();
        assert_eq!(config.server.listen.to_string(), "127.0.0.1:9000");
        assert_eq!(config.auth.master_key.expose_secret(), "sk-test");
        assert!(!config.auth.is_open());
        assert_eq!(config.upstream.url, "http://localhost:1234/chat");
        assert_eq!(config.upstream.model, "other/model");
        assert_eq!(config.upstream.domain, "example.org");
        assert_eq!(config.models, vec!["only-model".to_string()]);
        assert_eq!(config.streaming.chunk_size, 8);
        assert_eq!(config.streaming.delay_ms, 0);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = Config::parse_str("[server\nlisten = 1");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_upstream_url_rejected() {
        let toml = r#"
            [upstream]
            url = "not a url"
        "#;
        let err = Config::parse_str(toml).unwrap_err().to_string();
        assert!(err.contains("not a url"), "got: {}", err);
    }

    #[test]
    fn test_non_http_upstream_rejected() {
        let toml = r#"
            [upstream]
            url = "ftp://example.com/chat"
        "#;
        assert!(matches!(
            Config::parse_str(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let toml = r#"
            [streaming]
            chunk_size = 0
        "#;
        let err = Config::parse_str(toml).unwrap_err().to_string();
        assert!(err.contains("chunk_size"));
    }

    #[test]
    fn test_env_overrides_applied() {
        let mut config = Config::default();
        config
            .apply_env_with(env_from(&[
                ("PORT", "8123"),
                ("API_MASTER_KEY", "secret"),
                ("UPSTREAM_URL", "http://127.0.0.1:9/x"),
            ]))
            .unwrap();

        assert_eq!(config.server.listen.port(), 8123);
        assert_eq!(config.auth.master_key.expose_secret(), "secret");
        assert!(!config.auth.is_open());
        assert_eq!(config.upstream.url, "http://127.0.0.1:9/x");
    }

    #[test]
    fn test_env_port_keeps_configured_host() {
        let mut config = Config::parse_str(
            r#"
            [server]
            listen = "127.0.0.1:9000"
        "#,
        )
        .unwrap();
        config.apply_env_with(env_from(&[("PORT", "4000")])).unwrap();
        assert_eq!(config.server.listen.to_string(), "127.0.0.1:4000");
    }

    #[test]
    fn test_env_absent_keeps_values() {
        let mut config = Config::default();
        config.apply_env_with(|_| None).unwrap();
        assert_eq!(config.server.listen, default_listen());
        assert!(config.auth.is_open());
    }

    #[test]
    fn test_env_invalid_port_fails() {
        let mut config = Config::default();
        let err = config
            .apply_env_with(env_from(&[("PORT", "http")]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("PORT"), "Error should name the variable: {}", err);
    }

    #[test]
    fn test_empty_models_is_warning_not_error() {
        let config = Config::parse_str("models = []").unwrap();
        assert_eq!(config.warnings().len(), 1);
        assert!(config.warnings()[0].contains("/v1/models"));
        assert!(Config::default().warnings().is_empty());
    }

    #[test]
    fn test_api_key_debug_redaction() {
        let key = ApiKey::from("super-secret-master-key");
        let debug_output = format!("{:?}", key);
        assert_eq!(debug_output, "[REDACTED]");
        assert_eq!(format!("{}", key), "[REDACTED]");
    }

    #[test]
    fn test_config_debug_does_not_leak_master_key() {
        let mut config = Config::default();
        config.auth.master_key = ApiKey::from("hunter2-master");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2-master"));
        assert!(debug.contains("[REDACTED]"));
    }
}
