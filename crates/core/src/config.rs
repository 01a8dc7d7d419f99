//! Environment-variable helpers shared by config loaders.

use std::env;
use std::str::FromStr;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

pub fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

/// Read a variable, treating empty values as unset.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Parse a variable, falling back to `default` when unset.
///
/// Unparseable values are logged and ignored rather than aborting startup.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env_opt(key) {
        Some(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring unparseable env var");
                default
            }
        },
        None => default,
    }
}

/// Parse an optional variable; `None` when unset or unparseable.
pub fn env_parse_opt<T: FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|raw| raw.parse().ok())
}

/// Boolean flag: accepts `1/0`, `true/false`, `yes/no`, `on/off`.
pub fn env_bool(key: &str, default: bool) -> bool {
    match env_opt(key).map(|v| v.to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
