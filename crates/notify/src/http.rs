//! HTTP transport construction for webhook notifiers.
//!
//! Turns [`HttpClientConfig`] (timeouts, proxy, TLS material, auth) into a
//! shared [`reqwest::Client`] plus the per-request auth it needs.
//! `reqwest::Client` pools connections internally and is cheap to clone,
//! so one transport can serve concurrent notifications.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::traits::NotifyError;

const USER_AGENT: &str = concat!("alertwire/", env!("CARGO_PKG_VERSION"));

/// A string that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// PEM bundle of extra root certificates.
    pub ca_file: Option<PathBuf>,
    /// PEM client certificate for mutual TLS. Requires `key_file`.
    pub cert_file: Option<PathBuf>,
    /// PEM private key matching `cert_file`.
    pub key_file: Option<PathBuf>,
    pub insecure_skip_verify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    #[serde(default)]
    pub password: Option<SecretString>,
}

/// Transport options for outbound webhook requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Whole-request timeout. The caller's deadline applies on top.
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub proxy_url: Option<String>,
    pub tls: TlsConfig,
    pub basic_auth: Option<BasicAuth>,
    pub bearer_token: Option<SecretString>,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            connect_timeout_secs: None,
            proxy_url: None,
            tls: TlsConfig::default(),
            basic_auth: None,
            bearer_token: None,
            follow_redirects: true,
        }
    }
}

#[derive(Debug, Clone)]
enum Auth {
    Basic {
        username: String,
        password: Option<SecretString>,
    },
    Bearer(SecretString),
}

/// Shared HTTP client plus the auth applied to every request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    auth: Option<Auth>,
}

impl HttpTransport {
    /// Build a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Config`] for unreadable TLS material, an
    /// invalid proxy URL, conflicting auth settings, or any failure of the
    /// underlying client builder.
    pub fn from_config(config: &HttpClientConfig) -> Result<Self, NotifyError> {
        let client = build_client(config)?;
        Self::with_client(client, config)
    }

    /// Use a caller-supplied client; only the auth settings of `config` apply.
    pub fn with_client(client: reqwest::Client, config: &HttpClientConfig) -> Result<Self, NotifyError> {
        let auth = match (&config.basic_auth, &config.bearer_token) {
            (Some(_), Some(_)) => {
                return Err(NotifyError::Config(
                    "basic_auth and bearer_token are mutually exclusive".to_string(),
                ))
            }
            (Some(basic), None) => Some(Auth::Basic {
                username: basic.username.clone(),
                password: basic.password.clone(),
            }),
            (None, Some(token)) => Some(Auth::Bearer(token.clone())),
            (None, None) => None,
        };
        Ok(Self { client, auth })
    }

    /// Start a JSON POST to `url` carrying `body`.
    pub fn post_json(&self, url: &str, body: Vec<u8>) -> reqwest::RequestBuilder {
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        match &self.auth {
            Some(Auth::Basic { username, password }) => {
                request.basic_auth(username, password.as_ref().map(SecretString::expose))
            }
            Some(Auth::Bearer(token)) => request.bearer_auth(token.expose()),
            None => request,
        }
    }
}

fn build_client(config: &HttpClientConfig) -> Result<reqwest::Client, NotifyError> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .user_agent(USER_AGENT);

    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = config.connect_timeout_secs {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }

    if let Some(proxy_url) = &config.proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url.as_str())
            .map_err(|e| NotifyError::Config(format!("invalid proxy URL {proxy_url}: {e}")))?;
        builder = builder.proxy(proxy);
    }

    if !config.follow_redirects {
        builder = builder.redirect(reqwest::redirect::Policy::none());
    }

    if let Some(ca_file) = &config.tls.ca_file {
        let pem = read_pem(ca_file)?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
            NotifyError::Config(format!("invalid CA certificate {}: {e}", ca_file.display()))
        })?;
        builder = builder.add_root_certificate(cert);
    }

    match (&config.tls.cert_file, &config.tls.key_file) {
        (Some(cert_file), Some(key_file)) => {
            let mut pem = read_pem(cert_file)?;
            pem.extend_from_slice(b"\n");
            pem.extend(read_pem(key_file)?);
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| NotifyError::Config(format!("invalid client certificate: {e}")))?;
            builder = builder.identity(identity);
        }
        (None, None) => {}
        _ => {
            return Err(NotifyError::Config(
                "tls.cert_file and tls.key_file must be set together".to_string(),
            ))
        }
    }

    if config.tls.insecure_skip_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|e| NotifyError::Config(format!("failed to build HTTP client: {e}")))
}

fn read_pem(path: &Path) -> Result<Vec<u8>, NotifyError> {
    std::fs::read(path)
        .map_err(|e| NotifyError::Config(format!("failed to read {}: {e}", path.display())))
}
