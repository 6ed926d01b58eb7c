use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::error::{ConfigError, Result};
use crate::selector::SelectionPolicy;

pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";
pub const RESOLVER_KEY_ENV: &str = "XAPIVERSE_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BotConfig {
    pub telegram: TelegramSection,
    pub resolver: ResolverSection,
    pub channels: ChannelsSection,
    pub player: PlayerSection,
    #[serde(default)]
    pub selection: SelectionSection,
    #[serde(default)]
    pub run_loop: RunLoopSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSection {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl TelegramSection {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverSection {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    #[serde(default = "default_resolver_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_domain_markers")]
    pub domain_markers: Vec<String>,
}

impl ResolverSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelsSection {
    /// Monitored group or channel whose links are republished.
    pub source: String,
    /// Publication target for the monitored path.
    pub target: String,
    /// Channel a private user must belong to.
    pub auth_channel: String,
    pub join_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSection {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionSection {
    #[serde(default)]
    pub policy: SelectionPolicy,
    #[serde(default = "default_streaming_marker")]
    pub streaming_marker: String,
}

impl Default for SelectionSection {
    fn default() -> Self {
        Self {
            policy: SelectionPolicy::default(),
            streaming_marker: default_streaming_marker(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunLoopSection {
    #[serde(default = "default_settle")]
    pub settle_seconds: u64,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: u64,
}

impl Default for RunLoopSection {
    fn default() -> Self {
        Self {
            settle_seconds: default_settle(),
            cooldown_seconds: default_cooldown(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    20
}

fn default_api_key_header() -> String {
    "xAPIverse-Key".to_string()
}

fn default_resolver_timeout() -> u64 {
    40
}

fn default_domain_markers() -> Vec<String> {
    vec!["terabox".to_string(), "1024tera".to_string()]
}

fn default_streaming_marker() -> String {
    ".m3u8".to_string()
}

fn default_settle() -> u64 {
    2
}

fn default_cooldown() -> u64 {
    10
}

impl BotConfig {
    /// Replaces secrets with values from `lookup` when it yields a non-empty string.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(BOT_TOKEN_ENV).filter(|value| !value.trim().is_empty()) {
            self.telegram.bot_token = token;
        }
        if let Some(key) = lookup(RESOLVER_KEY_ENV).filter(|value| !value.trim().is_empty()) {
            self.resolver.api_key = key;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let required: [(&'static str, &str); 8] = [
            ("telegram.bot_token", &self.telegram.bot_token),
            ("resolver.endpoint", &self.resolver.endpoint),
            ("resolver.api_key", &self.resolver.api_key),
            ("channels.source", &self.channels.source),
            ("channels.target", &self.channels.target),
            ("channels.auth_channel", &self.channels.auth_channel),
            ("channels.join_url", &self.channels.join_url),
            ("player.base_url", &self.player.base_url),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing { field });
            }
        }

        for (field, value) in [
            ("telegram.api_base", &self.telegram.api_base),
            ("resolver.endpoint", &self.resolver.endpoint),
            ("channels.join_url", &self.channels.join_url),
            ("player.base_url", &self.player.base_url),
        ] {
            Url::parse(value).map_err(|err| ConfigError::Invalid {
                field,
                reason: err.to_string(),
            })?;
        }

        if self.telegram.poll_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "telegram.poll_timeout_seconds",
                reason: "must be > 0".into(),
            });
        }
        if self.resolver.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "resolver.timeout_seconds",
                reason: "must be > 0".into(),
            });
        }
        if self
            .resolver
            .domain_markers
            .iter()
            .all(|marker| marker.trim().is_empty())
        {
            return Err(ConfigError::Missing {
                field: "resolver.domain_markers",
            });
        }
        if self.selection.streaming_marker.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "selection.streaming_marker",
            });
        }
        Ok(())
    }
}

/// Loads the config file, applies `BOT_TOKEN` / `XAPIVERSE_KEY` from the
/// environment and validates the result.
pub fn load_bot_config<P: AsRef<Path>>(path: P) -> Result<BotConfig> {
    load_bot_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_bot_config`] with the override source supplied by the caller.
pub fn load_bot_config_with<P, F>(path: P, lookup: F) -> Result<BotConfig>
where
    P: AsRef<Path>,
    F: Fn(&str) -> Option<String>,
{
    let config: BotConfig = load_toml(path)?;
    let config = config.apply_overrides(lookup);
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
