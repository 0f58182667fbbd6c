//! Service configuration: TOML file, environment overrides, pacing policy.

use crate::engine::PacingPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Bot token (or env var reference like ${JOINWARDEN_BOT_TOKEN})
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Delay between successful approvals, in milliseconds.
    /// The platform's rate budget was never published; tune as needed.
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// Emit a progress snapshot every this many processed requests
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,

    /// Approval limit applied when a trigger names none
    #[serde(default)]
    pub default_limit: Option<u64>,

    /// HTTP trigger port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Chats allowed to issue /accept (empty = allow all)
    #[serde(default)]
    pub allowed_chats: Vec<i64>,
}

fn default_pacing_delay_ms() -> u64 {
    750
}

fn default_progress_every() -> u64 {
    10
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            pacing_delay_ms: default_pacing_delay_ms(),
            progress_every: default_progress_every(),
            default_limit: None,
            port: default_port(),
            allowed_chats: Vec::new(),
        }
    }
}

impl Config {
    /// Default config file location (~/.joinwarden/config.toml)
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".joinwarden")
            .join("config.toml")
    }

    /// Load from the given path, or the default location, with environment
    /// overrides applied on top
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::load_from(&default)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(config.apply_env())
    }

    /// Parse a config file without environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    fn apply_env(mut self) -> Self {
        if let Ok(token) = std::env::var("JOINWARDEN_BOT_TOKEN") {
            self.bot_token = Some(token);
        }
        if let Ok(port) = std::env::var("JOINWARDEN_PORT") {
            if let Ok(p) = port.parse() {
                self.port = p;
            }
        }
        if let Ok(delay) = std::env::var("JOINWARDEN_PACING_DELAY_MS") {
            if let Ok(d) = delay.parse() {
                self.pacing_delay_ms = d;
            }
        }
        if let Ok(every) = std::env::var("JOINWARDEN_PROGRESS_EVERY") {
            if let Ok(n) = every.parse() {
                self.progress_every = n;
            }
        }
        if let Ok(limit) = std::env::var("JOINWARDEN_DEFAULT_LIMIT") {
            if let Ok(l) = limit.parse() {
                self.default_limit = Some(l);
            }
        }
        self
    }

    /// Resolve the bot token, following ${ENV_VAR} indirection
    pub fn resolve_bot_token(&self) -> Option<String> {
        self.bot_token.as_ref().and_then(|token| {
            if token.starts_with("${") && token.ends_with('}') {
                let env_var = &token[2..token.len() - 1];
                std::env::var(env_var).ok()
            } else {
                Some(token.clone())
            }
        })
    }

    /// Pacing policy for the approval loop
    pub fn pacing_policy(&self) -> PacingPolicy {
        PacingPolicy {
            pacing_delay: Duration::from_millis(self.pacing_delay_ms),
            progress_every: self.progress_every,
        }
    }

    /// Whether a chat may issue trigger commands
    pub fn chat_allowed(&self, chat_id: i64) -> bool {
        self.allowed_chats.is_empty() || self.allowed_chats.contains(&chat_id)
    }
}
