//! Routes alert batches to the channels configured for a receiver.
//!
//! The dispatcher makes exactly one attempt per channel and reports the
//! outcome, retryability included; scheduling retries is left to its
//! caller. Individual channel failures don't block other channels.

use std::collections::HashMap;

use alertwire_core::{Alert, AlertStatus};

use crate::traits::{DispatchResult, NotifyContext, Notifier};

/// Dispatches alert batches to notifier channels, organized per receiver.
#[derive(Default)]
pub struct Dispatcher {
    /// Receiver name → channels for that receiver.
    receivers: HashMap<String, Vec<Box<dyn Notifier>>>,
}

impl Dispatcher {
    pub fn new(receivers: HashMap<String, Vec<Box<dyn Notifier>>>) -> Self {
        Self { receivers }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace all channels for a receiver.
    pub fn set_receiver(&mut self, receiver: String, channels: Vec<Box<dyn Notifier>>) {
        self.receivers.insert(receiver, channels);
    }

    pub fn remove_receiver(&mut self, receiver: &str) {
        self.receivers.remove(receiver);
    }

    /// Deliver `alerts` to every channel of `ctx.receiver`.
    ///
    /// Channels that opted out of resolved notifications only see the
    /// firing alerts, and are skipped when none are left.
    pub async fn dispatch(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Vec<DispatchResult> {
        let Some(channels) = self.receivers.get(&ctx.receiver) else {
            tracing::debug!(receiver = %ctx.receiver, "No notification channels configured");
            return Vec::new();
        };

        let firing: Vec<Alert> = alerts
            .iter()
            .filter(|a| a.status() == AlertStatus::Firing)
            .cloned()
            .collect();

        let mut results = Vec::with_capacity(channels.len());

        for channel in channels {
            let batch: &[Alert] = if channel.send_resolved() { alerts } else { &firing };
            if batch.is_empty() {
                tracing::debug!(
                    receiver = %ctx.receiver,
                    channel = channel.channel_name(),
                    "Nothing to send after filtering resolved alerts"
                );
                continue;
            }

            let start = std::time::Instant::now();
            let result = channel.notify(ctx, batch).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, retryable, error) = match result {
                Ok(()) => {
                    tracing::info!(
                        receiver = %ctx.receiver,
                        channel = channel.channel_name(),
                        alerts = batch.len(),
                        duration_ms,
                        "Notification delivered"
                    );
                    (true, false, None)
                }
                Err(e) => {
                    tracing::warn!(
                        receiver = %ctx.receiver,
                        channel = channel.channel_name(),
                        error = %e,
                        retryable = e.is_retryable(),
                        duration_ms,
                        "Notification delivery failed"
                    );
                    (false, e.is_retryable(), Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                receiver: ctx.receiver.clone(),
                success,
                retryable,
                error,
                duration_ms,
            });
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{DeliveryFailure, NotifyError};
    use chrono::{Duration, Utc};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Outcome {
        Ok,
        Retryable,
        Permanent,
    }

    struct MockNotifier {
        name: String,
        seen_alerts: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
        outcome: Outcome,
        send_resolved: bool,
    }

    impl MockNotifier {
        fn boxed(name: &str, outcome: Outcome, send_resolved: bool) -> (Box<dyn Notifier>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let seen = Arc::new(AtomicUsize::new(0));
            let calls = Arc::new(AtomicUsize::new(0));
            let notifier = Box::new(MockNotifier {
                name: name.to_string(),
                seen_alerts: seen.clone(),
                calls: calls.clone(),
                outcome,
                send_resolved,
            });
            (notifier, seen, calls)
        }
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn notify(&self, _ctx: &NotifyContext, alerts: &[Alert]) -> Result<(), DeliveryFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_alerts.fetch_add(alerts.len(), Ordering::SeqCst);
            match self.outcome {
                Outcome::Ok => Ok(()),
                Outcome::Retryable => Err(DeliveryFailure::Retryable(NotifyError::Cancelled)),
                Outcome::Permanent => Err(DeliveryFailure::Permanent(NotifyError::Rejected {
                    code: 93000,
                    message: "invalid webhook url".to_string(),
                })),
            }
        }

        fn channel_name(&self) -> &str {
            &self.name
        }

        fn send_resolved(&self) -> bool {
            self.send_resolved
        }
    }

    fn alert(name: &str, resolved: bool) -> Alert {
        let labels = BTreeMap::from([("alertname".to_string(), name.to_string())]);
        let alert = Alert::new(labels, Utc::now() - Duration::minutes(10));
        if resolved {
            alert.resolved_at(Utc::now() - Duration::minutes(1))
        } else {
            alert
        }
    }

    #[tokio::test]
    async fn dispatch_to_all_channels() {
        let (a, seen_a, _) = MockNotifier::boxed("a", Outcome::Ok, true);
        let (b, seen_b, _) = MockNotifier::boxed("b", Outcome::Ok, true);

        let mut dispatcher = Dispatcher::empty();
        dispatcher.set_receiver("ops".to_string(), vec![a, b]);

        let results = dispatcher
            .dispatch(&NotifyContext::new("ops"), &[alert("HighCpu", false)])
            .await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success && r.receiver == "ops"));
        assert_eq!(seen_a.load(Ordering::SeqCst), 1);
        assert_eq!(seen_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_failure_doesnt_block() {
        let (failing, _, _) = MockNotifier::boxed("fail", Outcome::Permanent, true);
        let (flaky, _, _) = MockNotifier::boxed("flaky", Outcome::Retryable, true);
        let (ok, _, ok_calls) = MockNotifier::boxed("ok", Outcome::Ok, true);

        let dispatcher = Dispatcher::new(HashMap::from([(
            "ops".to_string(),
            vec![failing, flaky, ok],
        )]));

        let results = dispatcher
            .dispatch(&NotifyContext::new("ops"), &[alert("HighCpu", false)])
            .await;
        assert_eq!(results.len(), 3);

        assert!(!results[0].success);
        assert!(!results[0].retryable);
        assert_eq!(results[0].error.as_deref(), Some("invalid webhook url"));

        assert!(!results[1].success);
        assert!(results[1].retryable);

        assert!(results[2].success);
        assert_eq!(ok_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolved_alerts_filtered_for_opted_out_channels() {
        let (all, seen_all, _) = MockNotifier::boxed("all", Outcome::Ok, true);
        let (firing_only, seen_firing, _) = MockNotifier::boxed("firing-only", Outcome::Ok, false);

        let mut dispatcher = Dispatcher::empty();
        dispatcher.set_receiver("ops".to_string(), vec![all, firing_only]);

        let alerts = [alert("HighCpu", false), alert("DiskFull", true)];
        let results = dispatcher.dispatch(&NotifyContext::new("ops"), &alerts).await;

        assert_eq!(results.len(), 2);
        assert_eq!(seen_all.load(Ordering::SeqCst), 2);
        assert_eq!(seen_firing.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_resolved_skips_opted_out_channel() {
        let (firing_only, _, calls) = MockNotifier::boxed("firing-only", Outcome::Ok, false);

        let mut dispatcher = Dispatcher::empty();
        dispatcher.set_receiver("ops".to_string(), vec![firing_only]);

        let results = dispatcher
            .dispatch(&NotifyContext::new("ops"), &[alert("DiskFull", true)])
            .await;
        assert!(results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_receiver_returns_empty() {
        let mut dispatcher = Dispatcher::empty();
        let (a, _, _) = MockNotifier::boxed("a", Outcome::Ok, true);
        dispatcher.set_receiver("ops".to_string(), vec![a]);
        dispatcher.remove_receiver("ops");

        let results = dispatcher
            .dispatch(&NotifyContext::new("ops"), &[alert("HighCpu", false)])
            .await;
        assert!(results.is_empty());
    }
}
