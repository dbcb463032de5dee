//! Configuration loading, layering, and validation for inferlog.
//!
//! Settings come from four layers, highest priority first:
//! 1. command-line flags
//! 2. environment variables (both supplied through [`ConfigOverrides`])
//! 3. `~/.inferlog/config.toml` (or an explicit `--config` path)
//! 4. built-in defaults
//!
//! [`AppConfig::resolve`] turns the merged settings into a [`RunConfig`],
//! failing fast when a required credential is missing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.inferlog/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat-completion model
    #[serde(default = "default_model")]
    pub model: String,

    /// File whose contents replace the built-in context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_file: Option<PathBuf>,

    /// Audit log service settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Completion provider settings
    #[serde(default)]
    pub openai: OpenAiConfig,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_domain() -> String {
    "aws.us.pangea.cloud".into()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            context_file: None,
            audit: AuditConfig::default(),
            openai: OpenAiConfig::default(),
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
            .field("model", &self.model)
            .field("context_file", &self.context_file)
            .field("audit", &self.audit)
            .field("openai", &self.openai)
            .finish()
    }
}

/// Where the audit service lives relative to the configured domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEnvironment {
    /// `audit.<domain>`
    #[default]
    Production,
    /// `<domain>` used as-is, e.g. a local emulator
    Local,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Secure Audit Log API token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Audit configuration id, for projects with several audit schemas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,

    /// Service domain
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Use plain http instead of https
    #[serde(default)]
    pub insecure: bool,

    #[serde(default)]
    pub environment: AuditEnvironment,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            token: None,
            config_id: None,
            domain: default_domain(),
            insecure: false,
            environment: AuditEnvironment::default(),
        }
    }
}

impl std::fmt::Debug for AuditConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditConfig")
            .field("token", &redact(&self.token))
            .field("config_id", &self.config_id)
            .field("domain", &self.domain)
            .field("insecure", &self.insecure)
            .field("environment", &self.environment)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Any OpenAI-compatible `/v1` endpoint
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Values supplied on the command line or through environment variables.
///
/// `None` means "not given", so the config file or default applies.
#[derive(Clone, Default)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub audit_token: Option<String>,
    pub audit_config_id: Option<String>,
    pub pangea_domain: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub context_file: Option<PathBuf>,
}

/// Fully resolved settings for one run.
///
/// Every required credential is present; components receive this by
/// reference and never look at the environment themselves.
#[derive(Clone)]
pub struct RunConfig {
    pub model: String,
    pub context_file: Option<PathBuf>,
    pub audit_token: String,
    pub audit_config_id: Option<String>,
    pub audit_domain: String,
    pub audit_insecure: bool,
    pub audit_environment: AuditEnvironment,
    pub openai_api_key: String,
    pub openai_base_url: String,
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("model", &self.model)
            .field("context_file", &self.context_file)
            .field("audit_token", &"[REDACTED]")
            .field("audit_config_id", &self.audit_config_id)
            .field("audit_domain", &self.audit_domain)
            .field("audit_insecure", &self.audit_insecure)
            .field("audit_environment", &self.audit_environment)
            .field("openai_api_key", &"[REDACTED]")
            .field("openai_base_url", &self.openai_base_url)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// tried and a missing file falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if !path.exists() => Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: "file does not exist".into(),
            }),
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::config_dir().join("config.toml")),
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file found at {}, using defaults", path.display());
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

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".inferlog")
    }

    /// Layer flag/environment values over this config.
    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(model) = overrides.model {
            self.model = model;
        }
        if let Some(path) = overrides.context_file {
            self.context_file = Some(path);
        }
        if let Some(token) = overrides.audit_token {
            self.audit.token = Some(token);
        }
        if let Some(config_id) = overrides.audit_config_id {
            self.audit.config_id = Some(config_id);
        }
        if let Some(domain) = overrides.pangea_domain {
            self.audit.domain = domain;
        }
        if let Some(key) = overrides.openai_api_key {
            self.openai.api_key = Some(key);
        }
        if let Some(url) = overrides.openai_base_url {
            self.openai.base_url = url;
        }
        self
    }

    /// Validate and produce the settings for a run.
    pub fn resolve(self) -> Result<RunConfig, ConfigError> {
        let audit_token = required(self.audit.token, "--audit-token", "PANGEA_AUDIT_TOKEN")?;
        let openai_api_key = required(self.openai.api_key, "--openai-api-key", "OPENAI_API_KEY")?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model must not be empty".into()));
        }
        if self.audit.domain.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "audit service domain must not be empty".into(),
            ));
        }
        if !(self.openai.base_url.starts_with("https://") || self.openai.base_url.starts_with("http://")) {
            return Err(ConfigError::ValidationError(format!(
                "openai base_url must be an http(s) URL, got '{}'",
                self.openai.base_url
            )));
        }

        Ok(RunConfig {
            model: self.model,
            context_file: self.context_file,
            audit_token,
            audit_config_id: self.audit.config_id.filter(|id| !id.trim().is_empty()),
            audit_domain: self.audit.domain,
            audit_insecure: self.audit.insecure,
            audit_environment: self.audit.environment,
            openai_api_key,
            openai_base_url: self.openai.base_url,
        })
    }
}

/// A credential is missing when unset or blank.
fn required(value: Option<String>, option: &'static str, env: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingCredential { option, env })
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Missing required option '{option}' (or set the {env} environment variable)")]
    MissingCredential {
        option: &'static str,
        env: &'static str,
    },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
