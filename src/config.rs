//! Runtime configuration, read once at startup from the environment
//! (after `.env` has been loaded).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a whole number of seconds greater than zero, got {value:?}")]
    InvalidTimeout { name: &'static str, value: String },
}

#[derive(Clone)]
pub struct ChatConfig {
    /// OpenAI API key. Only needed once a live client is built.
    pub api_key: Option<String>,
    /// Base URL of the chat completions API.
    pub base_url: String,
    pub request_timeout: Duration,
    /// Content of the System message every session starts with.
    pub system_prompt: String,
    /// Where the line editor keeps its input history.
    pub history_file: Option<PathBuf>,
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("system_prompt", &self.system_prompt)
            .field("history_file", &self.history_file)
            .finish()
    }
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let request_timeout = match non_empty("NAZENAZE_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        name: "NAZENAZE_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let history_file = non_empty("NAZENAZE_HISTORY_FILE")
            .map(PathBuf::from)
            .or_else(|| dirs::data_dir().map(|dir| dir.join("nazenaze-chat").join("history.txt")));

        Ok(Self {
            api_key: non_empty("OPENAI_API_KEY"),
            base_url: non_empty("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            request_timeout,
            system_prompt: non_empty("NAZENAZE_SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            history_file,
        })
    }
}
