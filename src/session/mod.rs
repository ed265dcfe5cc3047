//! Session orchestration: fetch → walk → scan → validate → aggregate.
//!
//! Per-target failures (bad path, failed clone) are recorded on that
//! target's [`ScanResult`] and never abort the session. Cancellation is
//! observed between files while scanning and at every suspension point while
//! validating; partial results are always returned.

use crate::config::Config;
use crate::fetch::{self, ScanTarget};
use crate::models::{ScanResult, ScanSession};
use crate::providers::ProviderRegistry;
use crate::scanner::Scanner;
use crate::validator::{CancelFlag, Validator};
use crate::walker;
use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

/// Effective per-session options, resolved from config and CLI flags.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub validate: bool,
    /// Provider names to scan for; empty means all registered providers.
    pub provider_filter: Vec<String>,
    pub context_lines: usize,
    pub max_file_size: u64,
    pub timeout: Duration,
    pub max_concurrent: usize,
    /// Explicit opt-in entropy floor: candidates scoring below it are
    /// dropped from results. `None` keeps everything the scanner emits.
    pub min_entropy: Option<f64>,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            validate: config.validator.enabled,
            provider_filter: config.scanner.provider_filter.clone(),
            context_lines: config.scanner.context_lines,
            max_file_size: config.scanner.max_file_size,
            timeout: Duration::from_secs(config.validator.timeout_seconds),
            max_concurrent: config.validator.max_concurrent,
            min_entropy: None,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Run a full session over `targets` with a validator built from the
/// options' transport defaults.
pub async fn run(targets: &[String], options: &SessionOptions, cancel: CancelFlag) -> ScanSession {
    let validator = Validator::new()
        .with_max_concurrent(options.max_concurrent)
        .with_timeout(options.timeout)
        .with_cancel_flag(cancel.clone());
    run_with_validator(targets, options, cancel, &validator).await
}

/// Run a full session with an explicit validator (transport seam for tests).
pub async fn run_with_validator(
    targets: &[String],
    options: &SessionOptions,
    cancel: CancelFlag,
    validator: &Validator,
) -> ScanSession {
    let mut session = ScanSession::new(targets.to_vec(), options.validate);

    for target in targets {
        if cancel.is_cancelled() {
            break;
        }

        let mut result = ScanResult::new(target.as_str());
        if let Err(e) = scan_target(target, options, &cancel, &mut result).await {
            warn!(target = %target, error = %e, "target failed");
            result.errors.push(e.to_string());
        }

        if options.validate && !cancel.is_cancelled() && !result.candidates.is_empty() {
            let candidates = std::mem::take(&mut result.candidates);
            result.candidates = validator.validate_batch(candidates).await;
        }

        result.complete();
        session.results.push(result);
    }

    session.complete();
    info!(
        session = %session.id,
        candidates = session.total_candidates(),
        "scan session complete"
    );
    session
}

async fn scan_target(
    target: &str,
    options: &SessionOptions,
    cancel: &CancelFlag,
    result: &mut ScanResult,
) -> Result<()> {
    let parsed = ScanTarget::parse(target)?;
    let repo = fetch::fetch(&parsed).await?;
    result.commit = repo.commit.clone();

    let mut scanner = Scanner::new(ProviderRegistry::global())
        .with_context_lines(options.context_lines);
    if !options.provider_filter.is_empty() {
        scanner = scanner.with_provider_filter(options.provider_filter.iter().cloned());
    }

    for path in walker::collect_files(&repo.root, options.max_file_size) {
        if cancel.is_cancelled() {
            break;
        }

        let text = match walker::read_text(&path) {
            Ok(text) => text,
            Err(skip) => {
                warn!(path = %path.display(), reason = %skip, "skipping file");
                continue;
            }
        };

        let label = walker::relative_label(&repo.root, &path);
        let mut candidates = scanner.scan_buffer(&text, &label);
        if let Some(floor) = options.min_entropy {
            candidates.retain(|c| c.entropy >= floor);
        }
        result.candidates.extend(candidates);
        result.files_scanned += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidationStatus;
    use crate::providers::ProbeRequest;
    use crate::validator::{ProbeResponse, ProbeTransport, TransportError};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Arc;

    struct FixedStatusTransport(u16);

    #[async_trait]
    impl ProbeTransport for FixedStatusTransport {
        async fn execute(
            &self,
            _request: ProbeRequest,
            _timeout: Duration,
        ) -> Result<ProbeResponse, TransportError> {
            Ok(ProbeResponse {
                status: self.0,
                body: None,
            })
        }
    }

    fn seeded_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("settings.py"),
            format!("API_KEY = \"sk-proj-{}\"\n", "A".repeat(60)),
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "no secrets here\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn session_scans_local_target() {
        let repo = seeded_repo();
        let targets = vec![repo.path().display().to_string()];
        let session = run(&targets, &SessionOptions::default(), CancelFlag::new()).await;

        assert_eq!(session.results.len(), 1);
        let result = &session.results[0];
        assert_eq!(result.files_scanned, 2);
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].provider, "openai");
        assert_eq!(result.candidates[0].file_path, "settings.py");
        assert!(result.errors.is_empty());
        assert!(result.scan_completed_at.is_some());
        assert!(session.completed_at.is_some());
    }

    #[tokio::test]
    async fn bad_target_fails_alone_without_aborting_session() {
        let repo = seeded_repo();
        let targets = vec![
            "/no/such/target".to_string(),
            repo.path().display().to_string(),
        ];
        let session = run(&targets, &SessionOptions::default(), CancelFlag::new()).await;

        assert_eq!(session.results.len(), 2);
        assert!(!session.results[0].errors.is_empty());
        assert!(session.results[0].candidates.is_empty());
        assert_eq!(session.results[1].candidates.len(), 1);
    }

    #[tokio::test]
    async fn validation_classifies_found_candidates() {
        let repo = seeded_repo();
        let targets = vec![repo.path().display().to_string()];
        let options = SessionOptions {
            validate: true,
            ..SessionOptions::default()
        };

        let validator = Validator::with_transport(Arc::new(FixedStatusTransport(401)))
            .with_rate_limit(1000.0, 1000);
        let session =
            run_with_validator(&targets, &options, CancelFlag::new(), &validator).await;

        let candidate = &session.results[0].candidates[0];
        assert_eq!(candidate.validation.label(), "invalid");
        assert!(session.validation_enabled);
    }

    #[tokio::test]
    async fn disabled_validation_leaves_candidates_unattempted() {
        let repo = seeded_repo();
        let targets = vec![repo.path().display().to_string()];
        let session = run(&targets, &SessionOptions::default(), CancelFlag::new()).await;

        assert_eq!(
            session.results[0].candidates[0].validation,
            ValidationStatus::NotAttempted
        );
    }

    #[tokio::test]
    async fn cancelled_session_returns_partial_results() {
        let repo = seeded_repo();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let targets = vec![repo.path().display().to_string()];
        let session = run(&targets, &SessionOptions::default(), cancel).await;

        assert!(session.results.is_empty());
        assert!(session.completed_at.is_some());
    }

    #[tokio::test]
    async fn entropy_floor_filters_uniform_secrets() {
        let repo = seeded_repo();
        let targets = vec![repo.path().display().to_string()];
        let options = SessionOptions {
            min_entropy: Some(3.5),
            ..SessionOptions::default()
        };
        let session = run(&targets, &options, CancelFlag::new()).await;

        // The seeded key is all-As; it scores far below the floor.
        assert_eq!(session.total_candidates(), 0);
    }

    #[tokio::test]
    async fn provider_filter_narrows_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("keys.env"),
            format!(
                "OPENAI=sk-proj-{}\nHF=hf_{}\n",
                "B".repeat(40),
                "h".repeat(34)
            ),
        )
        .unwrap();

        let options = SessionOptions {
            provider_filter: vec!["huggingface".to_string()],
            ..SessionOptions::default()
        };
        let targets = vec![dir.path().display().to_string()];
        let session = run(&targets, &options, CancelFlag::new()).await;

        assert_eq!(session.total_candidates(), 1);
        assert_eq!(session.results[0].candidates[0].provider, "huggingface");
    }
}
