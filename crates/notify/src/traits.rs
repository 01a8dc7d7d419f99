//! Notifier trait definition and shared error types.

use std::collections::BTreeMap;
use std::time::Duration;

use alertwire_core::Alert;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Errors that can occur while building or running a notifier.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("templating error: {0}")]
    Template(String),

    #[error("failed to encode message: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request cancelled")]
    Cancelled,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to decode webhook response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The endpoint answered with a non-zero application code. The message
    /// is the endpoint's own error text, unchanged.
    #[error("{message}")]
    Rejected { code: i64, message: String },
}

/// Outcome of a failed delivery attempt, tagged with whether the caller
/// should try again.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryFailure {
    /// Transient: network trouble, cancellation, or a garbled response.
    #[error(transparent)]
    Retryable(NotifyError),

    /// Retrying the same input will fail the same way.
    #[error(transparent)]
    Permanent(NotifyError),
}

impl DeliveryFailure {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryFailure::Retryable(_))
    }

    pub fn error(&self) -> &NotifyError {
        match self {
            DeliveryFailure::Retryable(e) | DeliveryFailure::Permanent(e) => e,
        }
    }

    pub fn into_inner(self) -> NotifyError {
        match self {
            DeliveryFailure::Retryable(e) | DeliveryFailure::Permanent(e) => e,
        }
    }
}

/// Per-attempt context supplied by the caller.
///
/// Cancelling `cancel` or passing `deadline` aborts the in-flight request;
/// both surface as retryable failures.
#[derive(Debug, Clone)]
pub struct NotifyContext {
    /// Receiver name, exposed to templates.
    pub receiver: String,
    /// Labels the batch was grouped by.
    pub group_labels: BTreeMap<String, String>,
    /// Link back to the alerting system, exposed to templates.
    pub external_url: String,
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
}

impl NotifyContext {
    pub fn new(receiver: impl Into<String>) -> Self {
        Self {
            receiver: receiver.into(),
            group_labels: BTreeMap::new(),
            external_url: String::new(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_group_labels(mut self, group_labels: BTreeMap<String, String>) -> Self {
        self.group_labels = group_labels;
        self
    }

    pub fn with_external_url(mut self, external_url: impl Into<String>) -> Self {
        self.external_url = external_url.into();
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set the deadline to `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification for `alerts`. Implementations hold no state
    /// between calls and never retry on their own.
    async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<(), DeliveryFailure>;

    /// Human-readable name for this channel (e.g., "wecom_robot").
    fn channel_name(&self) -> &str;

    /// Whether resolved alerts should be delivered to this channel.
    fn send_resolved(&self) -> bool {
        true
    }
}

/// Result of dispatching a notification to a single channel.
#[derive(Debug)]
pub struct DispatchResult {
    pub channel: String,
    pub receiver: String,
    pub success: bool,
    pub retryable: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
