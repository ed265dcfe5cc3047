//! Provider subsystem: the contract every supported AI service satisfies.
//!
//! Each provider carries its compiled detection patterns, its liveness probe
//! endpoint, and pure functions for building the probe request and
//! classifying the probe response. Providers are immutable singletons held by
//! the [`registry::ProviderRegistry`]; adding one requires no changes to the
//! scanner or validator.

pub mod catalog;
pub mod registry;

pub use registry::ProviderRegistry;

use crate::models::ValidationStatus;
use regex::Regex;

/// A named, compiled detection pattern.
///
/// Capture group 1 is the secret substring; the full match may span extra
/// context (e.g. a preceding variable assignment for prefixless providers).
pub struct SecretPattern {
    /// Stable pattern name, used in rule IDs and finding output.
    pub name: &'static str,
    pub regex: Regex,
}

impl SecretPattern {
    /// Compile a pattern. Panics on an invalid expression or a missing
    /// capture group: both are programmer errors caught by the registry
    /// construction tests.
    pub fn new(name: &'static str, pattern: &str) -> Self {
        let regex = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("invalid detection pattern '{name}': {e}"));
        assert!(
            regex.captures_len() > 1,
            "detection pattern '{name}' must have a capture group for the secret"
        );
        Self { name, regex }
    }
}

/// How a provider expects the API key to be attached to the probe.
#[derive(Debug, Clone)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// A provider-specific header carrying the raw key (e.g. `x-api-key`).
    Header(&'static str),
    /// No auth header; the key is appended as a URL query parameter.
    QueryParam(&'static str),
}

/// A fully-built liveness probe, ready for the transport layer.
///
/// Construction is pure: no I/O happens here. Bodies are fixed minimal
/// payloads that can never trigger billable generation beyond a
/// `max_tokens=1`-equivalent.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<serde_json::Value>,
}

impl ProbeRequest {
    /// Build a request with the key attached according to `auth`.
    pub fn with_auth(method: reqwest::Method, endpoint: &str, auth: &AuthStyle, key: &str) -> Self {
        match auth {
            AuthStyle::Bearer => Self {
                method,
                url: endpoint.to_string(),
                headers: vec![("Authorization", format!("Bearer {key}"))],
                body: None,
            },
            AuthStyle::Header(header) => Self {
                method,
                url: endpoint.to_string(),
                headers: vec![(*header, key.to_string())],
                body: None,
            },
            AuthStyle::QueryParam(param) => {
                let separator = if endpoint.contains('?') { '&' } else { '?' };
                Self {
                    method,
                    url: format!("{endpoint}{separator}{param}={key}"),
                    headers: Vec::new(),
                    body: None,
                }
            }
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// The capability set every supported provider satisfies.
pub trait Provider: Send + Sync {
    /// Stable registry key (e.g. `"openai"`).
    fn name(&self) -> &'static str;

    /// Human-readable display name (e.g. `"OpenAI"`).
    fn display_name(&self) -> &'static str;

    /// Ordered, non-empty set of compiled detection patterns.
    fn patterns(&self) -> &[SecretPattern];

    /// The URL probed for liveness.
    fn validation_endpoint(&self) -> &'static str;

    /// Build the single outbound probe for `key`. Pure.
    fn build_probe_request(&self, key: &str) -> ProbeRequest;

    /// Classify a probe response. Total: every `(status, body)` combination
    /// maps to a terminal [`ValidationStatus`]; this function never fails.
    fn classify_response(&self, status: u16, body: Option<&serde_json::Value>) -> ValidationStatus;
}

/// Shared fallback classification for status codes a provider has no special
/// rule for: auth failures are `Invalid`, throttling is `RateLimited`, and
/// everything else (5xx, redirects, unexpected 2xx) is `ProbeError`.
pub(crate) fn classify_default(provider: &str, status: u16) -> ValidationStatus {
    match status {
        401 | 403 => ValidationStatus::invalid(Some(status), format!("{provider} rejected the key")),
        429 => ValidationStatus::rate_limited(
            Some(status),
            format!("{provider} throttled the probe; liveness undetermined"),
        ),
        _ => ValidationStatus::probe_error(
            Some(status),
            format!("unexpected response from {provider}"),
        ),
    }
}

/// Pull a string field out of a JSON body, if present.
pub(crate) fn body_str<'a>(body: Option<&'a serde_json::Value>, path: &[&str]) -> Option<&'a str> {
    let mut value = body?;
    for key in path {
        value = value.get(key)?;
    }
    value.as_str()
}
