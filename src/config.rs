//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::reveal::driver::RevealTiming;

/// Environment variable holding the backend base URL.
pub const BASE_URL_ENV: &str = "HAIN_BASE_URL";
/// Environment variable holding the request timeout in seconds.
pub const REQUEST_TIMEOUT_ENV: &str = "HAIN_REQUEST_TIMEOUT_SECS";
/// Environment variable holding the reveal tick in milliseconds.
pub const REVEAL_TICK_ENV: &str = "HAIN_REVEAL_TICK_MS";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// An environment variable could not be parsed.
    #[error("invalid value for {name}: {value}")]
    Env {
        /// Variable name.
        name: &'static str,
        /// Raw value found.
        value: String,
    },
    /// The base URL does not parse.
    #[error("invalid base url: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result alias for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings of the typewriter reveal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevealConfig {
    /// When false every message is shown whole.
    pub enabled: bool,
    /// Timer delays.
    pub timing: RevealTiming,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timing: RevealTiming::default(),
        }
    }
}

/// Configuration of the chat client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatClientConfig {
    /// Backend base URL; every endpoint is resolved against it.
    pub base_url: String,
    /// Timeout for non-streamed requests.
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
    /// Connection timeout, streamed requests included.
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Store sent messages through the history endpoint.
    pub persist_messages: bool,
    /// How long a copy acknowledgement stays visible.
    #[serde(with = "duration_ms")]
    pub copy_feedback: Duration,
    /// Interval between web-search loading phases.
    #[serde(with = "duration_ms")]
    pub search_phase_interval: Duration,
    /// Typewriter reveal.
    pub reveal: RevealConfig,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("hain-chat/{}", env!("CARGO_PKG_VERSION")),
            persist_messages: false,
            copy_feedback: Duration::from_secs(2),
            search_phase_interval: Duration::from_secs(2),
            reveal: RevealConfig::default(),
        }
    }
}

impl ChatClientConfig {
    /// Create a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default settings overridden by `HAIN_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable is set but does not parse.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup(BASE_URL_ENV) {
            config.base_url = url;
        }
        if let Some(raw) = lookup(REQUEST_TIMEOUT_ENV) {
            let secs = parse_env(REQUEST_TIMEOUT_ENV, &raw)?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup(REVEAL_TICK_ENV) {
            let millis = parse_env(REVEAL_TICK_ENV, &raw)?;
            config.reveal.timing.tick = Duration::from_millis(millis);
        }
        config.validate()?;
        Ok(config)
    }

    /// Set the backend base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable message persistence.
    #[must_use]
    pub const fn with_persist_messages(mut self, persist: bool) -> Self {
        self.persist_messages = persist;
        self
    }

    /// Replace the reveal settings.
    #[must_use]
    pub const fn with_reveal(mut self, reveal: RevealConfig) -> Self {
        self.reveal = reveal;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is unusable or a timeout is zero.
    pub fn validate(&self) -> ConfigResult<()> {
        let url = self.base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base_url must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request_timeout must be > 0".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "connect_timeout must be > 0".to_string(),
            ));
        }
        if self.reveal.enabled && self.reveal.timing.tick.is_zero() {
            return Err(ConfigError::Invalid(
                "reveal.timing.tick must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL with a trailing slash, ready for `Url::join`.
    ///
    /// # Errors
    /// Returns an error if the URL does not parse.
    pub fn base_url(&self) -> ConfigResult<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Ok(Url::parse(&raw)?)
    }
}

fn parse_env(name: &'static str, raw: &str) -> ConfigResult<u64> {
    raw.trim().parse().map_err(|_| ConfigError::Env {
        name,
        value: raw.to_string(),
    })
}

/// Serde module for `Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ChatClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reveal.timing.tick, Duration::from_millis(2));
        assert_eq!(config.copy_feedback, Duration::from_secs(2));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = ChatClientConfig::new().with_base_url("https://api.example.com/v1");
        let url = config.base_url().unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/");
        assert_eq!(
            url.join("ask-question").unwrap().as_str(),
            "https://api.example.com/v1/ask-question"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ChatClientConfig::new().with_base_url("not a url").validate().is_err());
        assert!(ChatClientConfig::new().with_base_url("ftp://x").validate().is_err());
        assert!(ChatClientConfig::new()
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = ChatClientConfig::from_lookup(lookup(&[
            (BASE_URL_ENV, "http://127.0.0.1:9000"),
            (REQUEST_TIMEOUT_ENV, "5"),
            (REVEAL_TICK_ENV, "7"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.reveal.timing.tick, Duration::from_millis(7));
    }

    #[test]
    fn test_env_parse_error_names_variable() {
        let err = ChatClientConfig::from_lookup(lookup(&[(REQUEST_TIMEOUT_ENV, "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains(REQUEST_TIMEOUT_ENV));
    }

    #[test]
    fn test_serde_durations_in_millis() {
        let json = serde_json::to_value(ChatClientConfig::default()).unwrap();
        assert_eq!(json["request_timeout"], 60_000);
        assert_eq!(json["reveal"]["timing"]["tick"], 2);
        let back: ChatClientConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.request_timeout, Duration::from_secs(60));
    }
}
