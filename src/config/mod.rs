//! Configuration management for Zeolith
//!
//! Configuration is loaded from `~/.zeolith/config.json` with environment
//! variable overrides following the pattern `ZEOLITH_SECTION_KEY`. A `.env`
//! file in the working directory is honored before the environment is read.
//!
//! There is no process-global config instance: the composition root loads a
//! `Config` once and hands the relevant pieces to each component.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZeolithError};
use crate::session::DEFAULT_TTL_SECS;

/// Main configuration struct for Zeolith.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub provider: ProviderConfig,
    /// Upstream computation service endpoints
    pub endpoints: EndpointsConfig,
    /// Orchestrator loop settings
    pub agent: AgentConfig,
    /// Session persistence settings
    pub session: SessionConfig,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key for the OpenAI-compatible backend
    pub api_key: Option<String>,
    /// Base URL override (default OpenAI endpoint when unset)
    pub api_base: Option<String>,
    /// Model identifier override (provider default when unset)
    pub model: Option<String>,
}

/// Base URLs for the external computation services the tools call into.
///
/// Each service that a configured tool needs must have its URL set; this is
/// checked by [`Config::validate`] at startup rather than discovered on first
/// tool invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Zeo++ analysis service base URL
    pub zeopp_api_base_url: Option<String>,
    /// MACE geometry optimization service base URL
    pub maceopt_api_base_url: Option<String>,
    /// xTB geometry optimization service base URL
    pub xtbopt_api_base_url: Option<String>,
    /// Tavily web search API key
    pub tavily_api_key: Option<String>,
}

/// Orchestrator loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum reasoning turns per user input before giving up
    pub max_turns: u32,
    /// Maximum tokens per completion request
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Parse `Action: name(args)` from assistant text in addition to
    /// structured tool calls (for backends without native tool support)
    pub text_actions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            max_tokens: None,
            temperature: Some(0.0),
            text_actions: false,
        }
    }
}

/// Session persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds of inactivity after which a stored session expires
    pub ttl_secs: i64,
    /// Directory for session files (`~/.zeolith/sessions` when unset)
    pub storage_dir: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            storage_dir: None,
        }
    }
}

impl Config {
    /// Returns the Zeolith configuration directory path (~/.zeolith)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".zeolith")
    }

    /// Returns the path to the config file (~/.zeolith/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables follow the pattern: ZEOLITH_SECTION_KEY
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ZEOLITH_PROVIDER_API_KEY") {
            self.provider.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("ZEOLITH_PROVIDER_API_BASE") {
            self.provider.api_base = Some(val);
        }
        if let Ok(val) = std::env::var("ZEOLITH_PROVIDER_MODEL") {
            self.provider.model = Some(val);
        }

        if let Ok(val) = std::env::var("ZEOLITH_ZEOPP_API_BASE_URL") {
            self.endpoints.zeopp_api_base_url = Some(val);
        }
        if let Ok(val) = std::env::var("ZEOLITH_MACEOPT_API_BASE_URL") {
            self.endpoints.maceopt_api_base_url = Some(val);
        }
        if let Ok(val) = std::env::var("ZEOLITH_XTBOPT_API_BASE_URL") {
            self.endpoints.xtbopt_api_base_url = Some(val);
        }
        if let Ok(val) = std::env::var("ZEOLITH_TAVILY_API_KEY") {
            self.endpoints.tavily_api_key = Some(val);
        }

        if let Ok(val) = std::env::var("ZEOLITH_AGENT_MAX_TURNS") {
            if let Ok(v) = val.parse() {
                self.agent.max_turns = v;
            }
        }
        if let Ok(val) = std::env::var("ZEOLITH_AGENT_MAX_TOKENS") {
            if let Ok(v) = val.parse() {
                self.agent.max_tokens = Some(v);
            }
        }
        if let Ok(val) = std::env::var("ZEOLITH_AGENT_TEMPERATURE") {
            if let Ok(v) = val.parse() {
                self.agent.temperature = Some(v);
            }
        }
        if let Ok(val) = std::env::var("ZEOLITH_AGENT_TEXT_ACTIONS") {
            if let Ok(v) = val.parse() {
                self.agent.text_actions = v;
            }
        }

        if let Ok(val) = std::env::var("ZEOLITH_SESSION_TTL_SECS") {
            if let Ok(v) = val.parse() {
                self.session.ttl_secs = v;
            }
        }
        if let Ok(val) = std::env::var("ZEOLITH_SESSION_STORAGE_DIR") {
            self.session.storage_dir = Some(val);
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to_path(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that everything the full tool set needs is present.
    ///
    /// Called once at startup so a missing endpoint fails the process instead
    /// of surfacing as a cryptic tool observation mid-conversation.
    pub fn validate(&self) -> Result<()> {
        if self
            .provider
            .api_key
            .as_deref()
            .map(str::is_empty)
            .unwrap_or(true)
        {
            return Err(ZeolithError::Config(
                "provider.api_key is not set (ZEOLITH_PROVIDER_API_KEY)".to_string(),
            ));
        }
        if self.endpoints.zeopp_api_base_url.is_none() {
            return Err(ZeolithError::Config(
                "endpoints.zeopp_api_base_url is not set (ZEOLITH_ZEOPP_API_BASE_URL)".to_string(),
            ));
        }
        if self.endpoints.maceopt_api_base_url.is_none() {
            return Err(ZeolithError::Config(
                "endpoints.maceopt_api_base_url is not set (ZEOLITH_MACEOPT_API_BASE_URL)"
                    .to_string(),
            ));
        }
        if self.endpoints.xtbopt_api_base_url.is_none() {
            return Err(ZeolithError::Config(
                "endpoints.xtbopt_api_base_url is not set (ZEOLITH_XTBOPT_API_BASE_URL)"
                    .to_string(),
            ));
        }
        if self.agent.max_turns == 0 {
            return Err(ZeolithError::Config(
                "agent.max_turns must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved session storage directory.
    pub fn session_storage_dir(&self) -> PathBuf {
        self.session
            .storage_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::dir().join("sessions"))
    }
}
