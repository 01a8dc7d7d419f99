//! The view of an alert batch that message templates render against.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alert::{Alert, AlertStatus};

/// Per-alert data exposed to templates.
#[derive(Debug, Clone, Serialize)]
pub struct AlertData {
    pub status: AlertStatus,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// RFC 3339.
    pub starts_at: String,
    /// RFC 3339, `None` while open-ended.
    pub ends_at: Option<String>,
    pub generator_url: Option<String>,
    pub fingerprint: String,
}

/// Top-level template context for one notification.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateData {
    /// Name of the receiver the batch is routed to.
    pub receiver: String,
    /// `firing` if at least one alert is firing, otherwise `resolved`.
    pub status: AlertStatus,
    pub alerts: Vec<AlertData>,
    pub firing: Vec<AlertData>,
    pub resolved: Vec<AlertData>,
    /// Labels the upstream dispatcher grouped the batch by.
    pub group_labels: BTreeMap<String, String>,
    /// Label pairs present with the same value on every alert.
    pub common_labels: BTreeMap<String, String>,
    /// Annotation pairs present with the same value on every alert.
    pub common_annotations: BTreeMap<String, String>,
    pub external_url: String,
}

impl TemplateData {
    pub fn new(
        receiver: &str,
        alerts: &[Alert],
        group_labels: &BTreeMap<String, String>,
        external_url: &str,
    ) -> Self {
        Self::at(Utc::now(), receiver, alerts, group_labels, external_url)
    }

    /// Build the context with alert statuses evaluated at `now`.
    pub fn at(
        now: DateTime<Utc>,
        receiver: &str,
        alerts: &[Alert],
        group_labels: &BTreeMap<String, String>,
        external_url: &str,
    ) -> Self {
        let alerts: Vec<AlertData> = alerts
            .iter()
            .map(|a| AlertData {
                status: a.status_at(now),
                labels: a.labels.clone(),
                annotations: a.annotations.clone(),
                starts_at: a.starts_at.to_rfc3339(),
                ends_at: a.ends_at.map(|t| t.to_rfc3339()),
                generator_url: a.generator_url.clone(),
                fingerprint: a.fingerprint(),
            })
            .collect();

        let (firing, resolved): (Vec<_>, Vec<_>) = alerts
            .iter()
            .cloned()
            .partition(|a| a.status == AlertStatus::Firing);

        let status = if firing.is_empty() {
            AlertStatus::Resolved
        } else {
            AlertStatus::Firing
        };

        let common_labels = common_pairs(alerts.iter().map(|a| &a.labels));
        let common_annotations = common_pairs(alerts.iter().map(|a| &a.annotations));

        Self {
            receiver: receiver.to_string(),
            status,
            alerts,
            firing,
            resolved,
            group_labels: group_labels.clone(),
            common_labels,
            common_annotations,
            external_url: external_url.to_string(),
        }
    }
}

/// Intersection of key/value pairs across all maps; empty for no maps.
fn common_pairs<'a, I>(mut maps: I) -> BTreeMap<String, String>
where
    I: Iterator<Item = &'a BTreeMap<String, String>>,
{
    let Some(first) = maps.next() else {
        return BTreeMap::new();
    };
    let mut common = first.clone();
    for map in maps {
        common.retain(|k, v| map.get(k) == Some(v));
        if common.is_empty() {
            break;
        }
    }
    common
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn sample_alerts() -> Vec<Alert> {
        vec![
            Alert::new(
                labels(&[("alertname", "Disk"), ("instance", "db-1"), ("severity", "page")]),
                ts(100),
            )
            .with_annotation("summary", "disk full"),
            Alert::new(
                labels(&[("alertname", "Disk"), ("instance", "db-2"), ("severity", "page")]),
                ts(100),
            )
            .with_annotation("summary", "disk full")
            .resolved_at(ts(150)),
        ]
    }

    #[test]
    fn splits_firing_and_resolved() {
        let data = TemplateData::at(ts(200), "ops", &sample_alerts(), &BTreeMap::new(), "");
        assert_eq!(data.status, AlertStatus::Firing);
        assert_eq!(data.alerts.len(), 2);
        assert_eq!(data.firing.len(), 1);
        assert_eq!(data.resolved.len(), 1);
        assert_eq!(data.resolved[0].labels["instance"], "db-2");
        assert!(data.resolved[0].ends_at.is_some());
    }

    #[test]
    fn all_resolved_batch_is_resolved() {
        let alerts: Vec<Alert> = sample_alerts()
            .into_iter()
            .map(|a| a.resolved_at(ts(150)))
            .collect();
        let data = TemplateData::at(ts(200), "ops", &alerts, &BTreeMap::new(), "");
        assert_eq!(data.status, AlertStatus::Resolved);
        assert!(data.firing.is_empty());
    }

    #[test]
    fn common_labels_are_intersection() {
        let group = labels(&[("alertname", "Disk")]);
        let data = TemplateData::at(ts(200), "ops", &sample_alerts(), &group, "http://am");
        assert_eq!(
            data.common_labels,
            labels(&[("alertname", "Disk"), ("severity", "page")])
        );
        assert_eq!(data.common_annotations, labels(&[("summary", "disk full")]));
        assert_eq!(data.group_labels, group);
        assert_eq!(data.external_url, "http://am");
    }

    #[test]
    fn empty_batch_has_no_common_labels() {
        let data = TemplateData::at(ts(0), "ops", &[], &BTreeMap::new(), "");
        assert!(data.common_labels.is_empty());
        assert_eq!(data.status, AlertStatus::Resolved);
    }

    #[test]
    fn serializes_status_lowercase() {
        let data = TemplateData::at(ts(200), "ops", &sample_alerts(), &BTreeMap::new(), "");
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["status"], "firing");
        assert_eq!(json["alerts"][1]["status"], "resolved");
    }
}
