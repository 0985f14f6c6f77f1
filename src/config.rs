use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the Telegram bot token.
pub const BOT_TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable holding the Gemini API key.
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    /// Only ever read from the environment.
    #[serde(skip)]
    pub bot_token: String,
    /// Bot API server to talk to instead of api.telegram.org
    #[serde(default)]
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    /// Only ever read from the environment.
    #[serde(skip)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }
}

impl GeminiConfig {
    /// Per-request timeout. `None` (the default) waits for the upstream indefinitely.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

impl Config {
    /// Load settings from an optional TOML file, then overlay the process environment.
    ///
    /// With no explicit path, `config.toml` is used when present. Fails when
    /// either credential is missing from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };

        file_config.with_env(|key| std::env::var(key).ok())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Fill in credentials and apply overrides from `lookup`.
    ///
    /// The bot token is checked before the API key.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        self.telegram.bot_token = match var(BOT_TOKEN_VAR) {
            Some(token) => token,
            None => bail!("{} is missing. Set it in the environment!", BOT_TOKEN_VAR),
        };
        self.gemini.api_key = match var(API_KEY_VAR) {
            Some(key) => key,
            None => bail!("{} is missing. Set it in the environment!", API_KEY_VAR),
        };

        if let Some(model) = var("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(base_url) = var("GEMINI_BASE_URL") {
            self.gemini.base_url = base_url;
        }
        if let Some(secs) = var("GEMINI_TIMEOUT_SECS") {
            let secs = secs
                .parse::<u64>()
                .with_context(|| format!("GEMINI_TIMEOUT_SECS is not a number: {}", secs))?;
            self.gemini.timeout_secs = Some(secs);
        }
        if let Some(api_url) = var("TELEGRAM_API_URL") {
            self.telegram.api_url = Some(api_url);
        }

        Ok(self)
    }
}
