// src/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP client and retry behavior
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Content normalization settings
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Notification policy
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Mail transport settings
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Input/output file locations
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.fetcher.max_concurrent == 0 {
            return Err(AppError::validation("fetcher.max_concurrent must be > 0"));
        }
        if self.fetcher.retry.backoff_multiplier < 1.0 {
            return Err(AppError::validation(
                "fetcher.retry.backoff_multiplier must be >= 1.0",
            ));
        }
        if self.normalize.max_chars == 0 {
            return Err(AppError::validation("normalize.max_chars must be > 0"));
        }
        if self.notify.mode == NotifyMode::Broadcast && self.notify.recipient().is_none() {
            return Err(AppError::validation(
                "notify.operator_email (or notify.override_recipient) is required in broadcast mode",
            ));
        }
        Ok(())
    }
}

/// HTTP client and retry behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept-Language header (locale preference)
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent fetches
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            accept_language: defaults::accept_language(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            retry: RetryConfig::default(),
        }
    }
}

/// Bounded retry policy for one fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retries after the initial attempt
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "defaults::initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Growth factor applied to the delay after each retry
    #[serde(default = "defaults::backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            initial_backoff_ms: defaults::initial_backoff_ms(),
            backoff_multiplier: defaults::backoff_multiplier(),
        }
    }
}

/// Content normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Upper bound on normalized output length, in characters
    #[serde(default = "defaults::max_chars")]
    pub max_chars: usize,

    /// Minimum anchor text length (in graphemes) for a link to count
    #[serde(default = "defaults::min_link_text")]
    pub min_link_text: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_chars: defaults::max_chars(),
            min_link_text: defaults::min_link_text(),
        }
    }
}

/// Notification addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NotifyMode {
    /// One operator summary per run
    Broadcast,
    /// One email per matched subscriber
    #[default]
    PerSubscriber,
}

/// Notification policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Addressing mode
    #[serde(default)]
    pub mode: NotifyMode,

    /// Operator address for summary mail
    #[serde(default)]
    pub operator_email: Option<String>,

    /// Send the operator summary even when nothing changed
    #[serde(default)]
    pub always_send: bool,

    /// Redirect every outgoing message to this address
    #[serde(default)]
    pub override_recipient: Option<String>,

    /// Prefix applied to every subject line
    #[serde(default = "defaults::subject_prefix")]
    pub subject_prefix: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            mode: NotifyMode::default(),
            operator_email: None,
            always_send: false,
            override_recipient: None,
            subject_prefix: defaults::subject_prefix(),
        }
    }
}

impl NotifyConfig {
    /// The effective operator recipient, honoring the override.
    pub fn recipient(&self) -> Option<&str> {
        self.override_recipient
            .as_deref()
            .or(self.operator_email.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

/// Mail transport settings. Credentials come from the
/// `SMTP_USER` / `SMTP_PASS` environment variables, never from this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// SMTP relay hostname
    #[serde(default)]
    pub host: String,

    /// SMTP port; 465 means implicit TLS, anything else opportunistic STARTTLS
    #[serde(default = "defaults::smtp_port")]
    pub port: u16,

    /// From address; defaults to the SMTP username
    #[serde(default)]
    pub from: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: defaults::smtp_port(),
            from: None,
        }
    }
}

/// Input/output file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Line-oriented source list
    #[serde(default = "defaults::sources_file")]
    pub sources_file: String,

    /// Persisted fingerprint state
    #[serde(default = "defaults::state_file")]
    pub state_file: String,

    /// Subscriber rows (per-subscriber mode only)
    #[serde(default = "defaults::subscriptions_file")]
    pub subscriptions_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sources_file: defaults::sources_file(),
            state_file: defaults::state_file(),
            subscriptions_file: defaults::subscriptions_file(),
        }
    }
}

mod defaults {
    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; pagewatch/1.0)".into()
    }
    pub fn accept_language() -> String {
        "zh-CN,zh;q=0.9,en;q=0.8".into()
    }
    pub fn timeout() -> u64 {
        25
    }
    pub fn max_concurrent() -> usize {
        6
    }

    // Retry defaults
    pub fn max_retries() -> u32 {
        3
    }
    pub fn initial_backoff_ms() -> u64 {
        1200
    }
    pub fn backoff_multiplier() -> f64 {
        2.0
    }

    // Normalizer defaults
    pub fn max_chars() -> usize {
        12_000
    }
    pub fn min_link_text() -> usize {
        4
    }

    // Notify defaults
    pub fn subject_prefix() -> String {
        "[pagewatch]".into()
    }

    // SMTP defaults
    pub fn smtp_port() -> u16 {
        465
    }

    // Path defaults
    pub fn sources_file() -> String {
        "data/sources.txt".into()
    }
    pub fn state_file() -> String {
        "data/state.json".into()
    }
    pub fn subscriptions_file() -> String {
        "data/subscriptions.toml".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.fetcher.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.fetcher.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_broadcast_without_recipient() {
        let mut config = Config::default();
        config.notify.mode = NotifyMode::Broadcast;
        assert!(config.validate().is_err());

        config.notify.operator_email = Some("ops@example.com".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn override_recipient_wins_over_operator() {
        let notify = NotifyConfig {
            operator_email: Some("ops@example.com".into()),
            override_recipient: Some("test@example.com".into()),
            ..NotifyConfig::default()
        };
        assert_eq!(notify.recipient(), Some("test@example.com"));
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [fetcher]
            max_concurrent = 3

            [notify]
            mode = "broadcast"
            operator_email = "ops@example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.fetcher.max_concurrent, 3);
        assert_eq!(config.fetcher.retry.max_retries, 3);
        assert_eq!(config.notify.mode, NotifyMode::Broadcast);
        assert_eq!(config.normalize.max_chars, 12_000);
    }
}
