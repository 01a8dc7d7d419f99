//! notify-once — deliver a single alert batch to a WeCom group robot.
//!
//! Reads an Alertmanager webhook payload (or a bare JSON array of alerts)
//! from a file or stdin and makes exactly one delivery attempt.
//!
//! Exit codes:
//! - `0` — delivered
//! - `1` — permanent failure (bad template, rejected by the robot)
//! - `75` — retryable failure (network, timeout, garbled reply)

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use alertwire_core::Alert;
use alertwire_notify::{
    Notifier, NotifierConfig, NotifyContext, TemplateRenderer, WeComRobotNotifier,
};

const EXIT_PERMANENT: u8 = 1;
const EXIT_RETRYABLE: u8 = 75;

// ── CLI ─────────────────────────────────────────────────────────────

/// Send one alert batch to a WeCom group robot.
#[derive(Parser, Debug)]
#[command(name = "notify-once", version, about)]
struct Cli {
    /// Path to a notifier TOML config. Falls back to WECOM_ROBOT_* env vars.
    #[arg(long, env = "WECOM_ROBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Alert payload file, or `-` for stdin.
    #[arg(long, default_value = "-")]
    alerts: String,

    /// Receiver name exposed to templates (overrides the payload's).
    #[arg(long)]
    receiver: Option<String>,

    /// Give up on the request after this many seconds.
    #[arg(long, env = "WECOM_ROBOT_ATTEMPT_TIMEOUT", default_value_t = 30)]
    timeout_secs: u64,

    /// Print the request body instead of sending it.
    #[arg(long)]
    dry_run: bool,
}

// ── Input ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload {
    #[serde(default)]
    receiver: Option<String>,
    alerts: Vec<Alert>,
    #[serde(default)]
    group_labels: BTreeMap<String, String>,
    #[serde(default, rename = "externalURL")]
    external_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AlertInput {
    Webhook(WebhookPayload),
    Bare(Vec<Alert>),
}

impl AlertInput {
    fn into_payload(self) -> WebhookPayload {
        match self {
            AlertInput::Webhook(payload) => payload,
            AlertInput::Bare(alerts) => WebhookPayload {
                receiver: None,
                alerts,
                group_labels: BTreeMap::new(),
                external_url: String::new(),
            },
        }
    }
}

fn read_alerts(source: &str) -> anyhow::Result<WebhookPayload> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read alerts from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("failed to read alerts from {source}"))?
    };

    let input: AlertInput = serde_json::from_str(&raw).context("failed to parse alert payload")?;
    Ok(input.into_payload())
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    alertwire_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => NotifierConfig::load(path)?,
        None => NotifierConfig::from_env()?,
    };
    config.log_summary();

    let notifier = WeComRobotNotifier::new(config, Arc::new(TemplateRenderer::new()))
        .context("failed to build notifier")?;

    let payload = read_alerts(&cli.alerts)?;
    if payload.alerts.is_empty() {
        anyhow::bail!("alert payload contains no alerts");
    }

    let receiver = cli
        .receiver
        .or(payload.receiver)
        .unwrap_or_else(|| "default".to_string());

    let cancel = CancellationToken::new();
    let ctx = NotifyContext::new(receiver)
        .with_group_labels(payload.group_labels)
        .with_external_url(payload.external_url)
        .with_cancellation(cancel.clone())
        .with_timeout(Duration::from_secs(cli.timeout_secs));

    if cli.dry_run {
        let body = notifier.build_payload(&ctx, &payload.alerts)?;
        println!("{}", String::from_utf8_lossy(&body));
        return Ok(ExitCode::SUCCESS);
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    info!(receiver = %ctx.receiver, alerts = payload.alerts.len(), "sending notification");
    match notifier.notify(&ctx, &payload.alerts).await {
        Ok(()) => {
            info!("notification delivered");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_retryable() => {
            eprintln!("retryable failure: {e}");
            Ok(ExitCode::from(EXIT_RETRYABLE))
        }
        Err(e) => {
            eprintln!("permanent failure: {e}");
            Ok(ExitCode::from(EXIT_PERMANENT))
        }
    }
}
