//! Configuration loading, validation, and management for NEXUS.
//!
//! Loads configuration from `~/.nexus/config.toml` (or an explicit path),
//! then applies environment variable overrides. A `.env` file in the
//! working directory is read first, so deployments can keep the provider
//! credential next to the binary. Read once at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.nexus/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default model used when a chat request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sandbox directory served by the workspace endpoints
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,

    /// Completion provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Knowledge mirror settings
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Persona settings
    #[serde(default)]
    pub persona: PersonaConfig,
}

fn default_model() -> String {
    "glm-4-plus".into()
}
fn default_workspace_dir() -> PathBuf {
    PathBuf::from("./workspace")
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_model", &self.default_model)
            .field("workspace_dir", &self.workspace_dir)
            .field("provider", &self.provider)
            .field("knowledge", &self.knowledge)
            .field("gateway", &self.gateway)
            .field("persona", &self.persona)
            .finish()
    }
}

/// Remote completion provider (OpenAI-compatible chat completions).
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name used in logs
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Base URL; `/chat/completions` is appended
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API credential. Empty or missing disables the chat path only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Overall budget for one provider call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_name() -> String {
    "glm".into()
}
fn default_api_url() -> String {
    "https://open.bigmodel.cn/api/paas/v4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    120
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_url: default_api_url(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Local mirror of the external knowledge repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_repo_url")]
    pub repo_url: String,

    /// Local checkout directory
    #[serde(default = "default_knowledge_dir")]
    pub dir: PathBuf,

    /// Branch to track. `None` follows the remote's default branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// File, relative to the mirror root, injected as system context
    #[serde(default = "default_context_file")]
    pub context_file: String,

    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Periodic refresh interval; 0 disables the refresh task
    #[serde(default)]
    pub sync_interval_secs: u64,

    /// Upper bound for a single git invocation
    #[serde(default = "default_git_timeout_secs")]
    pub git_timeout_secs: u64,
}

fn default_repo_url() -> String {
    "https://github.com/vudovn/antigravity-kit.git".into()
}
fn default_knowledge_dir() -> PathBuf {
    PathBuf::from("./antigravity-kit")
}
fn default_context_file() -> String {
    "AGENTS.md".into()
}
fn default_max_context_chars() -> usize {
    2000
}
fn default_git_timeout_secs() -> u64 {
    300
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            repo_url: default_repo_url(),
            dir: default_knowledge_dir(),
            branch: None,
            context_file: default_context_file(),
            max_context_chars: default_max_context_chars(),
            sync_interval_secs: 0,
            git_timeout_secs: default_git_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Browser origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Optional replacement for the built-in persona preamble.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preamble_override: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.nexus/config.toml).
    ///
    /// Environment variables (including those from `.env`) win over the file:
    /// - `NEXUS_API_KEY` / `GLM_API_KEY`: provider credential
    /// - `NEXUS_MODEL`: default model
    /// - `WORKSPACE_DIR`: workspace sandbox
    /// - `KIT_DIR` / `KIT_REPO_URL`: knowledge mirror location and remote
    /// - `NEXUS_PORT`: gateway port
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(&Self::config_dir().join("config.toml"))
    }

    /// Same as [`AppConfig::load`] but reads the TOML file from `path`.
    pub fn load_with(path: &Path) -> Result<Self, ConfigError> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!(path = %env_file.display(), "Loaded .env file");
        }

        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
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

    /// Apply overrides from an environment lookup.
    ///
    /// Variables that are set but blank count as unset, so an empty
    /// `NEXUS_API_KEY` neither hides `GLM_API_KEY` nor clears a file key.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = lookup("NEXUS_API_KEY").or_else(|| lookup("GLM_API_KEY")) {
            self.provider.api_key = Some(key);
        }
        if let Some(model) = lookup("NEXUS_MODEL") {
            self.default_model = model;
        }
        if let Some(dir) = lookup("WORKSPACE_DIR") {
            self.workspace_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("KIT_DIR") {
            self.knowledge.dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("KIT_REPO_URL") {
            self.knowledge.repo_url = url;
        }
        if let Some(port) = lookup("NEXUS_PORT") {
            match port.parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid NEXUS_PORT"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".nexus")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.temperature < 0.0 || self.provider.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.knowledge.max_context_chars == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.max_context_chars must be > 0".into(),
            ));
        }

        if self.knowledge.repo_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "knowledge.repo_url must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// The provider credential, if one is set and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.provider
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Check if a usable API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            workspace_dir: default_workspace_dir(),
            provider: ProviderConfig::default(),
            knowledge: KnowledgeConfig::default(),
            gateway: GatewayConfig::default(),
            persona: PersonaConfig::default(),
        }
    }
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
    #[error("Failed to read config file at {}: {reason}", path.display())]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {}: {reason}", path.display())]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
