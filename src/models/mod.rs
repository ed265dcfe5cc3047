//! Shared data model: findings, per-target results, and scan sessions.
//!
//! Everything here is plain serializable data. The scanner produces
//! [`Candidate`]s, the validator fills in their [`ValidationStatus`], and the
//! orchestrator aggregates them into a [`ScanResult`] per target and a single
//! [`ScanSession`] per invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Detail payload attached to every attempted validation outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProbeDetail {
    /// HTTP status returned by the probe, when one was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Human-readable explanation. Never contains a raw secret.
    pub message: String,
    /// Provider-specific extras (e.g. the Hugging Face account name).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ProbeDetail {
    pub fn new(http_status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            http_status,
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Liveness classification of a candidate secret.
///
/// `NotAttempted` is the initial state; every other variant is terminal and
/// carries the probe detail that produced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ValidationStatus {
    /// No probe has been issued for this candidate.
    #[default]
    NotAttempted,
    /// The provider accepted the key.
    Valid(ProbeDetail),
    /// The provider rejected the key as unknown or revoked.
    Invalid(ProbeDetail),
    /// The key authenticated but the account is out of credit or quota.
    QuotaExceeded(ProbeDetail),
    /// The provider throttled the probe; liveness is undetermined.
    RateLimited(ProbeDetail),
    /// The probe failed at the transport or protocol layer.
    ProbeError(ProbeDetail),
    /// The candidate was never probed (unknown provider, cancelled batch).
    Skipped(ProbeDetail),
}

impl ValidationStatus {
    pub fn valid(http_status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Valid(ProbeDetail::new(http_status, message))
    }

    pub fn invalid(http_status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Invalid(ProbeDetail::new(http_status, message))
    }

    pub fn quota_exceeded(http_status: Option<u16>, message: impl Into<String>) -> Self {
        Self::QuotaExceeded(ProbeDetail::new(http_status, message))
    }

    pub fn rate_limited(http_status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RateLimited(ProbeDetail::new(http_status, message))
    }

    pub fn probe_error(http_status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ProbeError(ProbeDetail::new(http_status, message))
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self::Skipped(ProbeDetail::new(None, message))
    }

    /// True once a probe outcome (or skip) has been recorded.
    pub fn is_attempted(&self) -> bool {
        !matches!(self, Self::NotAttempted)
    }

    /// The key is confirmed live (includes scoped-but-accepted keys).
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn detail(&self) -> Option<&ProbeDetail> {
        match self {
            Self::NotAttempted => None,
            Self::Valid(d)
            | Self::Invalid(d)
            | Self::QuotaExceeded(d)
            | Self::RateLimited(d)
            | Self::ProbeError(d)
            | Self::Skipped(d) => Some(d),
        }
    }

    /// Stable lowercase label used in tables and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotAttempted => "not_attempted",
            Self::Valid(_) => "valid",
            Self::Invalid(_) => "invalid",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::RateLimited(_) => "rate_limited",
            Self::ProbeError(_) => "probe_error",
            Self::Skipped(_) => "skipped",
        }
    }
}

/// One positioned potential-secret finding emitted by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Fresh opaque ID.
    pub id: String,
    /// Name of the provider whose pattern matched (registry key).
    pub provider: String,
    /// Name of the specific pattern that matched.
    pub pattern: String,
    /// Opaque file label supplied by the caller.
    pub file_path: String,
    /// 1-based line of the start of the secret.
    pub line_number: usize,
    /// 1-based character column of the first character of the secret.
    pub column_start: usize,
    /// Exclusive end column of the secret.
    pub column_end: usize,
    /// The raw matched secret. Redact before display or logging.
    pub secret_value: String,
    /// Surrounding source lines for human triage.
    pub context: String,
    /// Identifier heuristically extracted from preceding assignment syntax.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,
    /// Shannon entropy of the secret, in bits per character.
    pub entropy: f64,
    pub validation: ValidationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<DateTime<Utc>>,
}

impl Candidate {
    /// Record a probe outcome. The classification is monotonic: once a
    /// terminal state is set it is never overwritten, so re-validating an
    /// already-classified candidate is a no-op.
    pub fn record_validation(&mut self, status: ValidationStatus) {
        if self.validation.is_attempted() {
            return;
        }
        self.validation = status;
        self.validated_at = Some(Utc::now());
    }
}

/// Aggregated outcome of scanning one target (a path or a URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// The target as given by the user.
    pub target: String,
    /// Resolved HEAD commit when the target is a git repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub scan_started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_completed_at: Option<DateTime<Utc>>,
    /// Number of files whose contents were actually scanned.
    pub files_scanned: usize,
    pub candidates: Vec<Candidate>,
    /// Brief per-target error strings (skipped files, clone failures, ...).
    pub errors: Vec<String>,
}

impl ScanResult {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            commit: None,
            scan_started_at: Utc::now(),
            scan_completed_at: None,
            files_scanned: 0,
            candidates: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn complete(&mut self) {
        self.scan_completed_at = Some(Utc::now());
    }

    /// Wall-clock duration of the scan, once completed.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.scan_completed_at.map(|end| end - self.scan_started_at)
    }
}

/// The outermost aggregate: one invocation from targets in to results out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub targets: Vec<String>,
    pub results: Vec<ScanResult>,
    pub validation_enabled: bool,
}

impl ScanSession {
    pub fn new(targets: Vec<String>, validation_enabled: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            completed_at: None,
            targets,
            results: Vec::new(),
            validation_enabled,
        }
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn total_candidates(&self) -> usize {
        self.results.iter().map(|r| r.candidates.len()).sum()
    }

    pub fn has_findings(&self) -> bool {
        self.total_candidates() > 0
    }
}
