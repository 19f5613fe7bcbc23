//! Configuration loading, validation, and management for TentaCool.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides. Secrets (model API key, database URL, OAuth client
//! credentials, session signing secret) are read once at process start;
//! their absence is a startup-time failure, never a per-request one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Agent session configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// OAuth sign-in and session tokens
    #[serde(default)]
    pub auth: AuthConfig,

    /// Image reverse-proxy configuration
    #[serde(default)]
    pub image_proxy: ImageProxyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key for the model provider. Overridable via `OPENAI_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4.1".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model invocations per turn. This is the sole bound against
    /// runaway tool loops — there is no wall-clock timeout on top of it.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

fn default_max_steps() -> u32 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite path or connection string. Overridable via `DATABASE_URL`.
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "tentacool.db".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Google OAuth client ID. Overridable via `GOOGLE_CLIENT_ID`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_client_id: Option<String>,

    /// Google OAuth client secret. Overridable via `GOOGLE_CLIENT_SECRET`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_client_secret: Option<String>,

    /// Redirect URL registered with the OAuth provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,

    /// HMAC key for session tokens. Overridable via `SESSION_SECRET`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageProxyConfig {
    /// Exact hostnames the proxy may fetch from. Deny by default:
    /// anything not listed is rejected with 403.
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,
}

fn default_allowed_hosts() -> Vec<String> {
    vec![
        "lh3.googleusercontent.com".into(),
        "lh4.googleusercontent.com".into(),
        "lh5.googleusercontent.com".into(),
        "lh6.googleusercontent.com".into(),
        "avatars.googleapis.com".into(),
    ]
}

impl Default for ImageProxyConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: default_allowed_hosts(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("server", &self.server)
            .field("model", &self.model)
            .field("agent", &self.agent)
            .field("database", &"[connection string hidden]")
            .field("auth", &self.auth)
            .field("image_proxy", &self.image_proxy)
            .finish()
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("google_client_id", &self.google_client_id)
            .field("google_client_secret", &redact(&self.google_client_secret))
            .field("redirect_url", &self.redirect_url)
            .field("session_secret", &redact(&self.session_secret))
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            model: ModelConfig::default(),
            agent: AgentConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            image_proxy: ImageProxyConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path with env-var overrides.
    ///
    /// Env overrides checked: `OPENAI_API_KEY`, `DATABASE_URL`,
    /// `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `SESSION_SECRET`,
    /// `TENTACOOL_MODEL`.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("TENTACOOL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("tentacool.toml"));

        let mut config = Self::load_from(&config_path)?;

        if config.model.api_key.is_none() {
            config.model.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
        if config.auth.google_client_id.is_none() {
            config.auth.google_client_id = std::env::var("GOOGLE_CLIENT_ID").ok();
        }
        if config.auth.google_client_secret.is_none() {
            config.auth.google_client_secret = std::env::var("GOOGLE_CLIENT_SECRET").ok();
        }
        if config.auth.session_secret.is_none() {
            config.auth.session_secret = std::env::var("SESSION_SECRET").ok();
        }
        if let Ok(model) = std::env::var("TENTACOOL_MODEL") {
            config.model.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate non-secret settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.temperature < 0.0 || self.model.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Verify that every secret the server needs is present.
    ///
    /// Called once at startup; a missing secret aborts the process before
    /// the listener binds.
    pub fn require_secrets(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();

        if self.model.api_key.is_none() {
            missing.push("model.api_key (OPENAI_API_KEY)");
        }
        if self.auth.google_client_id.is_none() {
            missing.push("auth.google_client_id (GOOGLE_CLIENT_ID)");
        }
        if self.auth.google_client_secret.is_none() {
            missing.push("auth.google_client_secret (GOOGLE_CLIENT_SECRET)");
        }
        if self.auth.session_secret.is_none() {
            missing.push("auth.session_secret (SESSION_SECRET)");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingSecrets(missing.join(", ")))
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required secrets: {0}")]
    MissingSecrets(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.agent.max_steps, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.model.model, config.model.model);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            model: ModelConfig {
                temperature: 5.0,
                ..ModelConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_steps_rejected() {
        let config = AppConfig {
            agent: AgentConfig { max_steps: 0 },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/tentacool.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().server.port, 8080);
    }

    #[test]
    fn require_secrets_reports_all_missing() {
        let config = AppConfig::default();
        let err = config.require_secrets().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("OPENAI_API_KEY"));
        assert!(msg.contains("SESSION_SECRET"));
    }

    #[test]
    fn require_secrets_passes_when_present() {
        let config = AppConfig {
            model: ModelConfig {
                api_key: Some("sk-test".into()),
                ..ModelConfig::default()
            },
            auth: AuthConfig {
                google_client_id: Some("id".into()),
                google_client_secret: Some("secret".into()),
                redirect_url: None,
                session_secret: Some("hmac-key".into()),
            },
            ..AppConfig::default()
        };
        assert!(config.require_secrets().is_ok());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            model: ModelConfig {
                api_key: Some("sk-very-secret".into()),
                ..ModelConfig::default()
            },
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
