use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct QuillConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub model: ModelConfig,
    pub agent: AgentConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

/// Connection settings for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub endpoint: String,
    pub api_path: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    /// Upper bound on model rounds per orchestration call.
    pub max_steps: usize,
    /// Maximum number of entries rendered into the context block.
    pub max_context_entries: usize,
    /// Deadline for a whole orchestration call. `0` disables it.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenConfig>,
}

/// A bearer token and the owner identity it authenticates.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    pub token: String,
    pub owner: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_quill_dir()
            .join("journal.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".into(),
            api_path: "/v1/chat/completions".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            max_context_entries: 200,
            request_timeout_secs: 30,
        }
    }
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// Returns `~/.quill/`
pub fn default_quill_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".quill")
}

/// Returns the default config file path: `~/.quill/config.toml`
pub fn default_config_path() -> PathBuf {
    default_quill_dir().join("config.toml")
}

impl QuillConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            QuillConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (QUILL_DB, QUILL_LOG_LEVEL, QUILL_MODEL, QUILL_ENDPOINT, QUILL_API_KEY).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("QUILL_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("QUILL_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("QUILL_MODEL") {
            self.model.model = val;
        }
        if let Ok(val) = std::env::var("QUILL_ENDPOINT") {
            self.model.endpoint = val;
        }
        if let Ok(val) = std::env::var("QUILL_API_KEY") {
            self.model.api_key = Some(val);
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = QuillConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.model.api_path, "/v1/chat/completions");
        assert!(config.auth.tokens.is_empty());
        assert!(config.storage.db_path.ends_with("journal.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[agent]
max_steps = 3

[[auth.tokens]]
token = "secret"
owner = "alice"
"#;
        let config: QuillConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.agent.max_steps, 3);
        assert_eq!(config.auth.tokens.len(), 1);
        assert_eq!(config.auth.tokens[0].owner, "alice");
        // defaults still apply for unset fields
        assert_eq!(config.agent.max_context_entries, 200);
        assert_eq!(config.model.model, "gpt-4o-mini");
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let mut agent = AgentConfig::default();
        assert_eq!(agent.request_timeout(), Some(Duration::from_secs(30)));
        agent.request_timeout_secs = 0;
        assert_eq!(agent.request_timeout(), None);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = QuillConfig::default();
        std::env::set_var("QUILL_DB", "/tmp/override.db");
        std::env::set_var("QUILL_MODEL", "gemini-2.0-flash");
        std::env::set_var("QUILL_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.model.model, "gemini-2.0-flash");
        assert_eq!(config.server.log_level, "trace");

        // Clean up
        std::env::remove_var("QUILL_DB");
        std::env::remove_var("QUILL_MODEL");
        std::env::remove_var("QUILL_LOG_LEVEL");
    }
}
