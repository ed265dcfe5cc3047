//! Concurrent liveness validation of scanner candidates.
//!
//! Each candidate gets at most one HTTP probe, built and classified by its
//! provider. Probes run under a bounded semaphore and per-provider token
//! buckets; transport failures classify as `ProbeError` and never propagate.
//! The transport itself sits behind [`ProbeTransport`] so classification
//! paths are testable without sockets.

use crate::limiter::TokenBucket;
use crate::models::{Candidate, ValidationStatus};
use crate::providers::{ProbeRequest, ProviderRegistry};
use crate::redact::redact;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Default cap on probes in flight across all providers.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default hard per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// Conservative per-provider pacing; providers run abuse-detection heuristics
// against exactly this kind of traffic.
const PROBE_RATE_PER_SECOND: f64 = 2.0;
const PROBE_BURST: u32 = 4;

/// Cooperative cancellation signal shared by a session.
///
/// Once cancelled, no new probes start; probes already in flight may finish.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("probe timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

/// Raw outcome of one probe: the HTTP status plus the JSON-decoded body when
/// the body parsed. A non-JSON body is passed through as `None`.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

/// Transport seam between probe construction and the network.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    async fn execute(
        &self,
        request: ProbeRequest,
        timeout: Duration,
    ) -> Result<ProbeResponse, TransportError>;
}

/// reqwest-backed transport with a pooled client shared across a batch.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeTransport for HttpTransport {
    async fn execute(
        &self,
        request: ProbeRequest,
        timeout: Duration,
    ) -> Result<ProbeResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                // without_url: the URL may carry the key as a query parameter.
                TransportError::Network(e.without_url().to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response.json::<serde_json::Value>().await.ok();
        Ok(ProbeResponse { status, body })
    }
}

/// Probes candidates against their providers' endpoints.
///
/// Cheap to clone: all state is shared. One `Validator` serves a session.
#[derive(Clone)]
pub struct Validator {
    registry: &'static ProviderRegistry,
    transport: Arc<dyn ProbeTransport>,
    gate: Arc<Semaphore>,
    buckets: Arc<HashMap<&'static str, TokenBucket>>,
    timeout: Duration,
    cancel: CancelFlag,
}

impl Validator {
    /// Validator over the live HTTP transport with default limits.
    pub fn new() -> Self {
        Self::with_transport(Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(transport: Arc<dyn ProbeTransport>) -> Self {
        let registry = ProviderRegistry::global();
        let buckets = registry
            .iter()
            .map(|p| (p.name(), TokenBucket::new(PROBE_RATE_PER_SECOND, PROBE_BURST)))
            .collect();
        Self {
            registry,
            transport,
            gate: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT)),
            buckets: Arc::new(buckets),
            timeout: DEFAULT_TIMEOUT,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.gate = Arc::new(Semaphore::new(max_concurrent.max(1)));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace every provider bucket with the given parameters.
    pub fn with_rate_limit(mut self, rate: f64, burst: u32) -> Self {
        let buckets = self
            .registry
            .iter()
            .map(|p| (p.name(), TokenBucket::new(rate, burst)))
            .collect();
        self.buckets = Arc::new(buckets);
        self
    }

    /// Probe one candidate and record the outcome on it.
    ///
    /// Already-classified candidates are returned untouched without
    /// consuming a probe slot, so re-validation is idempotent.
    pub async fn validate_one(&self, mut candidate: Candidate) -> Candidate {
        if candidate.validation.is_attempted() || self.cancel.is_cancelled() {
            return candidate;
        }

        let Some(provider) = self.registry.get(&candidate.provider) else {
            candidate.record_validation(ValidationStatus::skipped(format!(
                "provider {} is not registered",
                candidate.provider
            )));
            return candidate;
        };

        let Ok(_permit) = self.gate.acquire().await else {
            // The gate is never closed while a validator exists.
            return candidate;
        };
        if self.cancel.is_cancelled() {
            return candidate;
        }

        if let Some(bucket) = self.buckets.get(provider.name()) {
            if bucket.acquire(1).await.is_err() {
                candidate.record_validation(ValidationStatus::probe_error(
                    None,
                    "rate limit bucket misconfigured",
                ));
                return candidate;
            }
        }
        if self.cancel.is_cancelled() {
            return candidate;
        }

        let request = provider.build_probe_request(&candidate.secret_value);
        debug!(
            provider = provider.name(),
            secret = %redact(&candidate.secret_value),
            "issuing liveness probe"
        );

        match self.transport.execute(request, self.timeout).await {
            Ok(response) => {
                let status = provider.classify_response(response.status, response.body.as_ref());
                debug!(
                    provider = provider.name(),
                    http_status = response.status,
                    outcome = status.label(),
                    "probe classified"
                );
                candidate.record_validation(status);
            }
            Err(e) => {
                debug!(provider = provider.name(), error = %e, "probe transport failed");
                candidate.record_validation(ValidationStatus::probe_error(None, e.to_string()));
            }
        }

        candidate
    }

    /// Probe a batch with at most `max_concurrent` probes in flight.
    ///
    /// The output has the same length and per-position identity as the
    /// input; only classification fields change. Probes complete in any
    /// order internally.
    pub async fn validate_batch(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        if candidates.is_empty() {
            return candidates;
        }

        // Fallback copies so a lost task can never shrink the output.
        let fallback = candidates.clone();
        let mut slots: Vec<Option<Candidate>> = candidates.iter().map(|_| None).collect();

        let mut tasks = tokio::task::JoinSet::new();
        for (index, candidate) in candidates.into_iter().enumerate() {
            let validator = self.clone();
            tasks.spawn(async move { (index, validator.validate_one(candidate).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, candidate)) => slots[index] = Some(candidate),
                Err(e) => warn!(error = %e, "validation task failed"),
            }
        }

        slots
            .into_iter()
            .zip(fallback)
            .map(|(slot, original)| slot.unwrap_or(original))
            .collect()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProbeDetail;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    struct MockTransport {
        status: u16,
        body: Option<serde_json::Value>,
        latency: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        cancel_after: Option<(usize, CancelFlag)>,
    }

    impl MockTransport {
        fn new(status: u16, body: Option<serde_json::Value>) -> Self {
            Self {
                status,
                body,
                latency: Duration::ZERO,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                cancel_after: None,
            }
        }

        fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        fn with_cancel_after(mut self, calls: usize, flag: CancelFlag) -> Self {
            self.cancel_after = Some((calls, flag));
            self
        }
    }

    #[async_trait]
    impl ProbeTransport for MockTransport {
        async fn execute(
            &self,
            _request: ProbeRequest,
            _timeout: Duration,
        ) -> Result<ProbeResponse, TransportError> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((threshold, flag)) = &self.cancel_after {
                if calls >= *threshold {
                    flag.cancel();
                }
            }

            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            Ok(ProbeResponse {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    fn candidate(provider: &str, secret: &str) -> Candidate {
        Candidate {
            id: uuid::Uuid::new_v4().to_string(),
            provider: provider.to_string(),
            pattern: "test-pattern".to_string(),
            file_path: "config.py".to_string(),
            line_number: 1,
            column_start: 1,
            column_end: 1 + secret.chars().count(),
            secret_value: secret.to_string(),
            context: String::new(),
            variable_name: None,
            entropy: 4.0,
            validation: ValidationStatus::NotAttempted,
            validated_at: None,
        }
    }

    fn validator(transport: MockTransport) -> Validator {
        Validator::with_transport(Arc::new(transport)).with_rate_limit(1000.0, 1000)
    }

    #[tokio::test]
    async fn openai_unauthorized_classifies_invalid() {
        let v = validator(MockTransport::new(401, None));
        let out = v.validate_one(candidate("openai", "sk-test")).await;

        assert_eq!(out.validation.label(), "invalid");
        assert_eq!(out.validation.detail().unwrap().http_status, Some(401));
        assert!(out.validated_at.is_some());
    }

    #[tokio::test]
    async fn anthropic_credit_balance_classifies_quota_exceeded() {
        let body = json!({"error": {"message": "Your credit balance is too low"}});
        let v = validator(MockTransport::new(400, Some(body)));
        let out = v.validate_one(candidate("anthropic", "sk-ant-test")).await;

        assert_eq!(out.validation.label(), "quota_exceeded");
        assert_eq!(out.validation.detail().unwrap().http_status, Some(400));
    }

    #[tokio::test]
    async fn unknown_provider_is_skipped_without_a_probe() {
        let transport = MockTransport::new(200, None);
        let v = Validator::with_transport(Arc::new(transport));
        let out = v.validate_one(candidate("mystery", "secret")).await;

        assert_eq!(out.validation.label(), "skipped");
    }

    #[tokio::test]
    async fn already_classified_candidates_are_not_reprobed() {
        let v = validator(MockTransport::new(200, None));
        let mut c = candidate("openai", "sk-test");
        c.record_validation(ValidationStatus::Invalid(ProbeDetail::new(
            Some(401),
            "rejected",
        )));
        let before = c.validation.clone();

        let out = v.validate_one(c).await;
        assert_eq!(out.validation, before);
    }

    #[tokio::test]
    async fn batch_preserves_length_order_and_identity() {
        let v = validator(MockTransport::new(200, None));
        let input: Vec<Candidate> = (0..8)
            .map(|i| candidate("openai", &format!("sk-test-{i}")))
            .collect();
        let ids: Vec<String> = input.iter().map(|c| c.id.clone()).collect();

        let output = v.validate_batch(input).await;

        assert_eq!(output.len(), 8);
        for (candidate, id) in output.iter().zip(ids) {
            assert_eq!(candidate.id, id);
            assert!(candidate.validation.is_live());
        }
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_output() {
        let v = validator(MockTransport::new(200, None));
        assert!(v.validate_batch(Vec::new()).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_probes_never_exceed_max_concurrent() {
        let transport = Arc::new(
            MockTransport::new(200, None).with_latency(Duration::from_millis(100)),
        );
        let v = Validator::with_transport(Arc::clone(&transport) as Arc<dyn ProbeTransport>)
            .with_rate_limit(10_000.0, 10_000)
            .with_max_concurrent(5);

        let input: Vec<Candidate> = (0..50)
            .map(|i| candidate("openai", &format!("sk-test-{i}")))
            .collect();
        let output = v.validate_batch(input).await;

        assert_eq!(output.len(), 50);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 50);
        assert_eq!(transport.peak.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn cancelled_flag_prevents_any_probe() {
        let transport = Arc::new(MockTransport::new(200, None));
        let cancel = CancelFlag::new();
        cancel.cancel();
        let v = Validator::with_transport(Arc::clone(&transport) as Arc<dyn ProbeTransport>)
            .with_cancel_flag(cancel);

        let output = v
            .validate_batch(vec![candidate("openai", "sk-a"), candidate("groq", "gsk_b")])
            .await;

        assert_eq!(output.len(), 2);
        assert!(output.iter().all(|c| !c.validation.is_attempted()));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_mid_batch_keeps_partial_results() {
        let cancel = CancelFlag::new();
        let transport = Arc::new(
            MockTransport::new(200, None).with_cancel_after(3, cancel.clone()),
        );
        let v = Validator::with_transport(Arc::clone(&transport) as Arc<dyn ProbeTransport>)
            .with_rate_limit(1000.0, 1000)
            .with_max_concurrent(1)
            .with_cancel_flag(cancel);

        let input: Vec<Candidate> = (0..20)
            .map(|i| candidate("openai", &format!("sk-test-{i}")))
            .collect();
        let output = v.validate_batch(input).await;

        assert_eq!(output.len(), 20);
        let attempted = output.iter().filter(|c| c.validation.is_attempted()).count();
        assert!(attempted >= 3, "probes before cancellation are kept");
        assert!(attempted < 20, "cancellation stopped the remainder");
    }

    #[tokio::test]
    async fn transport_failure_classifies_probe_error() {
        struct FailingTransport;

        #[async_trait]
        impl ProbeTransport for FailingTransport {
            async fn execute(
                &self,
                _request: ProbeRequest,
                _timeout: Duration,
            ) -> Result<ProbeResponse, TransportError> {
                Err(TransportError::Network("connection refused".to_string()))
            }
        }

        let v = Validator::with_transport(Arc::new(FailingTransport))
            .with_rate_limit(1000.0, 1000);
        let out = v.validate_one(candidate("replicate", "r8_test")).await;

        assert_eq!(out.validation.label(), "probe_error");
        let detail = out.validation.detail().unwrap();
        assert!(detail.http_status.is_none());
        assert!(detail.message.contains("connection refused"));
    }

    // ── HttpTransport against a local mock server ────────────

    #[tokio::test]
    async fn http_transport_sends_headers_and_decodes_json() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .and(header("Authorization", "Bearer sk-live"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let transport = HttpTransport::new();
        let request = ProbeRequest {
            method: reqwest::Method::GET,
            url: format!("{}/v1/models", server.uri()),
            headers: vec![("Authorization", "Bearer sk-live".to_string())],
            body: None,
        };

        let response = transport
            .execute(request, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.unwrap()["data"], json!([]));
    }

    #[tokio::test]
    async fn http_transport_passes_non_json_body_as_none() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new();
        let request = ProbeRequest {
            method: reqwest::Method::GET,
            url: format!("{}/health", server.uri()),
            headers: Vec::new(),
            body: None,
        };

        let response = transport
            .execute(request, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert!(response.body.is_none());
    }

    #[tokio::test]
    async fn http_transport_posts_json_probe_bodies() {
        use wiremock::matchers::{body_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-live"))
            .and(body_json(json!({
                "model": "claude-3-haiku-20240307",
                "max_tokens": 1,
                "messages": [{"role": "user", "content": "Hi"}],
            })))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"type": "authentication_error", "message": "invalid x-api-key"}
            })))
            .mount(&server)
            .await;

        let provider_request = ProviderRegistry::global()
            .get("anthropic")
            .unwrap()
            .build_probe_request("sk-ant-live");
        let request = ProbeRequest {
            url: format!("{}/v1/messages", server.uri()),
            ..provider_request
        };

        let transport = HttpTransport::new();
        let response = transport
            .execute(request, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.status, 401);
    }

    #[tokio::test]
    async fn http_transport_reports_connection_failures() {
        // Nothing listens on this port.
        let transport = HttpTransport::new();
        let request = ProbeRequest {
            method: reqwest::Method::GET,
            url: "http://127.0.0.1:9/".to_string(),
            headers: Vec::new(),
            body: None,
        };

        let err = transport
            .execute(request, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Network(_) | TransportError::Timeout));
    }
}
