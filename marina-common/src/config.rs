//! Configuration management for the Marina assistant services.
//!
//! The relay bot and the CLI share a configuration file at `~/.marina/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `TELEGRAM_TOKEN` → telegram.bot_token
//! - `API_URL` → backend.base_url
//! - `ANTHROPIC_API_KEY` → anthropic.api_key
//! - `MARINA_SESSION_CAPACITY` → sessions.capacity
//! - `MARINA_SESSION_TTL_SECS` → sessions.ttl_secs
//! - `MARINA_LOG_LEVEL` → observability.log_level
//! - `MARINA_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".marina"),
        |dirs| dirs.home_dir().join(".marina"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Telegram
// ============================================================================

/// Telegram bot credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by `@BotFather`.
    #[serde(default)]
    pub bot_token: String,
}

// ============================================================================
// Conversational backend
// ============================================================================

/// Hosted conversational backend reached by the relay bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend. The relay POSTs to `{base_url}/chat`.
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per message. 1 means no retries.
    #[serde(default = "default_backend_attempts")]
    pub max_attempts: u32,

    /// Base backoff between attempts, in milliseconds. Grows linearly.
    #[serde(default = "default_backend_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            timeout_secs: default_backend_timeout_secs(),
            max_attempts: default_backend_attempts(),
            backoff_ms: default_backend_backoff_ms(),
        }
    }
}

fn default_backend_url() -> String {
    "https://web-production-d6515.up.railway.app".to_string()
}

fn default_backend_timeout_secs() -> u64 {
    30
}

fn default_backend_attempts() -> u32 {
    1
}

fn default_backend_backoff_ms() -> u64 {
    1000
}

// ============================================================================
// Anthropic
// ============================================================================

/// Anthropic API access for the terminal chat and the doctor check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key. Empty means not configured.
    #[serde(default)]
    pub api_key: String,

    /// API base URL. Only overridden in tests.
    #[serde(default = "default_anthropic_url")]
    pub base_url: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_anthropic_model")]
    pub model: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_anthropic_url(),
            model: default_anthropic_model(),
        }
    }
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

// ============================================================================
// Sessions
// ============================================================================

/// Bounds for the relay's in-memory session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Maximum number of tracked users before least-recently-used eviction.
    #[serde(default = "default_session_capacity")]
    pub capacity: usize,

    /// Seconds after which a session entry expires, counted from creation.
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            capacity: default_session_capacity(),
            ttl_secs: default_session_ttl_secs(),
        }
    }
}

fn default_session_capacity() -> usize {
    1024
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (json or pretty)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Root config
// ============================================================================

/// Unified configuration shared by the relay bot and the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub anthropic: AnthropicConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration, writing a default file on first run.
    pub fn load_or_init() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            let config = Self::default();
            config.save()?;
            tracing::info!("Wrote default config to {}", path.display());
            return Ok(config);
        }

        Self::load_from(&path)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Ok(url) = std::env::var("API_URL") {
            self.backend.base_url = url;
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            self.anthropic.api_key = key;
        }
        if let Ok(capacity) = std::env::var("MARINA_SESSION_CAPACITY") {
            if let Ok(c) = capacity.parse() {
                self.sessions.capacity = c;
            }
        }
        if let Ok(ttl) = std::env::var("MARINA_SESSION_TTL_SECS") {
            if let Ok(t) = ttl.parse() {
                self.sessions.ttl_secs = t;
            }
        }
        if let Ok(level) = std::env::var("MARINA_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("MARINA_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let path = config_path();
        let dir = config_dir();

        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}
