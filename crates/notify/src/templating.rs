//! Minijinja template rendering for notification messages.
//!
//! Templates are arbitrary strings from configuration (not pre-registered),
//! so a fresh [`minijinja::Environment`] is created per render call.

use alertwire_core::TemplateData;

use crate::traits::NotifyError;

/// Message template used when the configuration does not provide one.
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "\
[{{ status | upper }}{% if status == \"firing\" %}:{{ firing | length }}{% endif %}] \
{{ group_labels | join_labels }}
{%- for alert in alerts %}
- {{ alert.labels.alertname }}{% if alert.annotations.summary %}: {{ alert.annotations.summary }}{% endif %}
{%- if alert.labels | length > 1 %}
  {{ alert.labels | join_labels }}
{%- endif %}
{%- endfor %}
{%- if external_url %}
{{ external_url }}
{%- endif %}";

/// Renders notification templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Build a configured minijinja environment with custom filters and globals.
    fn build_env<'source>() -> minijinja::Environment<'source> {
        let mut env = minijinja::Environment::new();

        env.add_filter("join_labels", join_labels_filter);
        env.add_filter("lower", lower_filter);
        env.add_filter("upper", upper_filter);

        env.add_function("env", env_function);

        env
    }

    /// Render a template string against an alert batch.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render(&self, template_str: &str, data: &TemplateData) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, data)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Validate that a template string parses without errors.
    ///
    /// This does not evaluate the template, it only checks syntax.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom filter: render a label map as `k=v, k=v` in key order.
fn join_labels_filter(value: minijinja::Value) -> Result<String, minijinja::Error> {
    let mut pairs = Vec::new();
    for key in value.try_iter()? {
        let v = value.get_item(&key)?;
        pairs.push(format!("{key}={v}"));
    }
    Ok(pairs.join(", "))
}

fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

/// Global function: read an environment variable by name.
///
/// Returns an empty string if the variable is not set.
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::debug!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use alertwire_core::Alert;
    use chrono::{TimeZone, Utc};

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample_data() -> TemplateData {
        let start = Utc.timestamp_opt(1_000, 0).unwrap();
        let alerts = vec![
            Alert::new(labels(&[("alertname", "HighCpu"), ("instance", "web-1")]), start)
                .with_annotation("summary", "cpu above 90%"),
            Alert::new(labels(&[("alertname", "HighCpu"), ("instance", "web-2")]), start)
                .resolved_at(Utc.timestamp_opt(1_500, 0).unwrap()),
        ];
        TemplateData::at(
            Utc.timestamp_opt(2_000, 0).unwrap(),
            "ops-robot",
            &alerts,
            &labels(&[("alertname", "HighCpu")]),
            "http://alertmanager:9093",
        )
    }

    #[test]
    fn render_basic_template() {
        let renderer = TemplateRenderer::new();
        let template = "{{ receiver }}: {{ status }} ({{ alerts | length }} alerts)";
        let result = renderer.render(template, &sample_data()).unwrap();
        assert_eq!(result, "ops-robot: firing (2 alerts)");
    }

    #[test]
    fn render_join_labels_filter() {
        let renderer = TemplateRenderer::new();
        let template = "{{ alerts[0].labels | join_labels }}";
        let result = renderer.render(template, &sample_data()).unwrap();
        assert_eq!(result, "alertname=HighCpu, instance=web-1");
    }

    #[test]
    fn render_firing_and_resolved_subsets() {
        let renderer = TemplateRenderer::new();
        let template = "{% for a in firing %}F:{{ a.labels.instance }} {% endfor %}\
                        {% for a in resolved %}R:{{ a.labels.instance }}{% endfor %}";
        let result = renderer.render(template, &sample_data()).unwrap();
        assert_eq!(result, "F:web-1 R:web-2");
    }

    #[test]
    fn render_upper_lower_filters() {
        let renderer = TemplateRenderer::new();
        let data = sample_data();
        assert_eq!(renderer.render("{{ status | upper }}", &data).unwrap(), "FIRING");
        assert_eq!(
            renderer.render("{{ common_labels.alertname | lower }}", &data).unwrap(),
            "highcpu"
        );
    }

    #[test]
    fn render_env_function() {
        std::env::set_var("ALERTWIRE_NOTIFY_TEST_VAR", "hello_notify");
        let renderer = TemplateRenderer::new();
        let result = renderer
            .render("Env: {{ env('ALERTWIRE_NOTIFY_TEST_VAR') }}", &sample_data())
            .unwrap();
        assert_eq!(result, "Env: hello_notify");
        std::env::remove_var("ALERTWIRE_NOTIFY_TEST_VAR");
    }

    #[test]
    fn render_default_template() {
        let renderer = TemplateRenderer::new();
        let result = renderer
            .render(DEFAULT_MESSAGE_TEMPLATE, &sample_data())
            .unwrap();
        assert!(result.starts_with("[FIRING:1] alertname=HighCpu"), "got: {result}");
        assert!(result.contains("- HighCpu: cpu above 90%"));
        assert!(result.contains("alertname=HighCpu, instance=web-2"));
        assert!(result.trim_end().ends_with("http://alertmanager:9093"));
    }

    #[test]
    fn invalid_template_produces_error() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render("{{ unclosed", &sample_data());
        match result.unwrap_err() {
            NotifyError::Template(msg) => assert!(!msg.is_empty()),
            other => panic!("Expected Template error, got: {:?}", other),
        }
    }

    #[test]
    fn runtime_error_produces_template_error() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render("{{ receiver | no_such_filter }}", &sample_data());
        assert!(matches!(result, Err(NotifyError::Template(_))));
    }

    #[test]
    fn validate_templates() {
        let renderer = TemplateRenderer::new();
        assert!(renderer.validate(DEFAULT_MESSAGE_TEMPLATE).is_ok());
        assert!(renderer.validate("{{ unclosed").is_err());
    }
}
