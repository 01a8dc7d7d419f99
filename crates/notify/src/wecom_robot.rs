//! WeCom (WeChat Work) group robot notifier.
//!
//! Renders the configured template into a plain-text robot message, posts
//! it to the robot webhook, and maps the `errcode`/`errmsg` reply onto a
//! retryable or permanent outcome.
//!
//! Retry policy: transport trouble, cancellation and undecodable replies
//! are retryable; template errors and non-zero `errcode` are permanent.

use std::sync::Arc;

use alertwire_core::{Alert, TemplateData};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::NotifierConfig;
use crate::http::HttpTransport;
use crate::templating::TemplateRenderer;
use crate::traits::{DeliveryFailure, NotifyContext, Notifier, NotifyError};
use crate::truncate::truncate_in_bytes;

const CHANNEL: &str = "wecom_robot";

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    content: &'a str,
}

/// Robot request body: `{"msgtype":"text","text":{"content":"..."}}`.
#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    msgtype: &'static str,
    text: TextBody<'a>,
}

impl<'a> OutboundMessage<'a> {
    fn text(content: &'a str) -> Self {
        Self {
            msgtype: "text",
            text: TextBody { content },
        }
    }
}

/// Robot reply. Missing fields default, so `{}` reads as success.
#[derive(Debug, Deserialize)]
struct WebhookResponse {
    #[serde(default, rename = "errcode")]
    code: i64,
    #[serde(default, rename = "errmsg")]
    error: String,
}

/// Delivers alert batches to a WeCom group robot.
///
/// Holds only immutable configuration and shared handles, so one instance
/// can serve concurrent `notify` calls.
#[derive(Debug)]
pub struct WeComRobotNotifier {
    config: NotifierConfig,
    renderer: Arc<TemplateRenderer>,
    transport: HttpTransport,
}

impl WeComRobotNotifier {
    /// Build a notifier, constructing the HTTP client from `config.http`.
    ///
    /// # Errors
    ///
    /// [`NotifyError::Config`] if the config is invalid, the message template
    /// does not parse, or the HTTP client cannot be built.
    pub fn new(config: NotifierConfig, renderer: Arc<TemplateRenderer>) -> Result<Self, NotifyError> {
        let transport = HttpTransport::from_config(&config.http)?;
        Self::with_transport(config, renderer, transport)
    }

    /// Build a notifier on top of a caller-supplied HTTP client.
    pub fn with_client(
        config: NotifierConfig,
        renderer: Arc<TemplateRenderer>,
        client: reqwest::Client,
    ) -> Result<Self, NotifyError> {
        let transport = HttpTransport::with_client(client, &config.http)?;
        Self::with_transport(config, renderer, transport)
    }

    fn with_transport(
        config: NotifierConfig,
        renderer: Arc<TemplateRenderer>,
        transport: HttpTransport,
    ) -> Result<Self, NotifyError> {
        config.validate()?;
        renderer
            .validate(&config.message)
            .map_err(|e| NotifyError::Config(format!("invalid message template: {e}")))?;

        Ok(Self {
            config,
            renderer,
            transport,
        })
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Render, truncate and encode the request body for `alerts`.
    ///
    /// Everything here is deterministic, so every failure is permanent.
    pub fn build_payload(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<Vec<u8>, DeliveryFailure> {
        let data = TemplateData::new(&ctx.receiver, alerts, &ctx.group_labels, &ctx.external_url);
        let message = self
            .renderer
            .render(&self.config.message, &data)
            .map_err(DeliveryFailure::Permanent)?;

        let (content, truncated) = truncate_in_bytes(&message, self.config.max_message_size);
        if truncated {
            tracing::debug!(
                channel = CHANNEL,
                receiver = %ctx.receiver,
                truncated_message = %content,
                "message truncated due to exceeding maximum allowed length by wecom robot"
            );
        }

        serde_json::to_vec(&OutboundMessage::text(&content))
            .map_err(|e| DeliveryFailure::Permanent(NotifyError::Serialize(e)))
    }

    /// POST `body` and read the reply to the end, racing the caller's
    /// cancellation token and deadline.
    async fn exchange(&self, ctx: &NotifyContext, body: Vec<u8>) -> Result<(reqwest::StatusCode, Bytes), NotifyError> {
        let started = Instant::now();

        let request = async {
            let response = self
                .transport
                .post_json(self.config.webhook_url.as_str(), body)
                .send()
                .await?;
            let status = response.status();
            // `bytes()` consumes the response: the body is drained before we
            // look at it, and the response is released on every exit path.
            let body = response.bytes().await?;
            Ok::<_, NotifyError>((status, body))
        };

        let deadline = async {
            match ctx.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(NotifyError::Cancelled),
            _ = deadline => Err(NotifyError::Timeout(started.elapsed())),
            result = request => result,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WeComRobotNotifier {
    async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<(), DeliveryFailure> {
        let body = self.build_payload(ctx, alerts)?;

        let (status, body) = self
            .exchange(ctx, body)
            .await
            .map_err(DeliveryFailure::Retryable)?;

        tracing::debug!(
            channel = CHANNEL,
            receiver = %ctx.receiver,
            %status,
            response = %String::from_utf8_lossy(&body),
            "wecom robot response"
        );

        let reply: WebhookResponse = serde_json::from_slice(&body)
            .map_err(|e| DeliveryFailure::Retryable(NotifyError::Decode(e)))?;

        // https://developer.work.weixin.qq.com/document/path/90313
        if reply.code == 0 {
            return Ok(());
        }

        Err(DeliveryFailure::Permanent(NotifyError::Rejected {
            code: reply.code,
            message: reply.error,
        }))
    }

    fn channel_name(&self) -> &str {
        CHANNEL
    }

    fn send_resolved(&self) -> bool {
        self.config.send_resolved
    }
}
