//! WeCom robot notifier configuration.
//!
//! Loaded from a TOML file or from `WECOM_ROBOT_*` environment variables.
//! Immutable once a notifier is built from it.

use std::fmt;
use std::path::Path;

use alertwire_core::config::{env_bool, env_opt, env_parse, env_parse_opt};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::HttpClientConfig;
use crate::templating::DEFAULT_MESSAGE_TEMPLATE;
use crate::traits::NotifyError;

/// WeCom caps text message content at 2048 bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 2048;

/// Webhook URL whose path and query (the robot key) are hidden in
/// `Debug` and `Display` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretUrl(Url);

impl SecretUrl {
    pub fn parse(input: &str) -> Result<Self, NotifyError> {
        Url::parse(input)
            .map(Self)
            .map_err(|e| NotifyError::Config(format!("invalid webhook_url: {e}")))
    }

    /// The full URL, key included.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for SecretUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/<redacted>",
            self.0.scheme(),
            self.0.host_str().unwrap_or("")
        )
    }
}

impl fmt::Debug for SecretUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretUrl({self})")
    }
}

impl From<Url> for SecretUrl {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Robot webhook, e.g. `https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=...`.
    pub webhook_url: SecretUrl,

    /// Message template (minijinja).
    #[serde(default = "default_message")]
    pub message: String,

    /// Upper bound on the rendered content, in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    #[serde(default = "default_send_resolved")]
    pub send_resolved: bool,

    #[serde(default)]
    pub http: HttpClientConfig,
}

fn default_message() -> String {
    DEFAULT_MESSAGE_TEMPLATE.to_string()
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

fn default_send_resolved() -> bool {
    true
}

impl NotifierConfig {
    /// Config with defaults for everything but the webhook URL.
    pub fn new(webhook_url: impl Into<SecretUrl>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            message: default_message(),
            max_message_size: default_max_message_size(),
            send_resolved: default_send_resolved(),
            http: HttpClientConfig::default(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, NotifyError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| NotifyError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, NotifyError> {
        tracing::debug!(path = %path.display(), "Loading notifier config");
        let content = std::fs::read_to_string(path).map_err(|e| {
            NotifyError::Config(format!("failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Build config from `WECOM_ROBOT_*` environment variables
    /// (call `alertwire_core::config::load_dotenv()` first to honour `.env`).
    pub fn from_env() -> Result<Self, NotifyError> {
        let raw_url = env_opt("WECOM_ROBOT_WEBHOOK_URL").ok_or_else(|| {
            NotifyError::Config("WECOM_ROBOT_WEBHOOK_URL is not set".to_string())
        })?;

        let mut config = Self::new(SecretUrl::parse(&raw_url)?);
        if let Some(message) = env_opt("WECOM_ROBOT_MESSAGE") {
            config.message = message;
        }
        config.max_message_size = env_parse("WECOM_ROBOT_MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE);
        config.send_resolved = env_bool("WECOM_ROBOT_SEND_RESOLVED", true);
        config.http.timeout_secs = env_parse_opt("WECOM_ROBOT_TIMEOUT_SECS");
        config.http.proxy_url = env_opt("WECOM_ROBOT_PROXY_URL");

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), NotifyError> {
        match self.webhook_url.url().scheme() {
            "http" | "https" => {}
            other => {
                return Err(NotifyError::Config(format!(
                    "webhook_url must use http or https, got {other}"
                )))
            }
        }
        if self.webhook_url.url().host_str().is_none() {
            return Err(NotifyError::Config("webhook_url has no host".to_string()));
        }
        if self.max_message_size == 0 {
            return Err(NotifyError::Config(
                "max_message_size must be greater than zero".to_string(),
            ));
        }
        if self.message.trim().is_empty() {
            return Err(NotifyError::Config("message template is empty".to_string()));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        tracing::info!(
            webhook = %self.webhook_url,
            max_message_size = self.max_message_size,
            send_resolved = self.send_resolved,
            "WeCom robot notifier configured"
        );
    }
}
