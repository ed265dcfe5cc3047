//! Rendering of scan sessions for humans and machines.
//!
//! Three formats: a terminal table for triage, JSON mirroring the
//! [`ScanSession`] shape, and SARIF 2.1.0 for static-analysis interchange.
//! Table and SARIF output always redact secret material.

pub mod sarif;

pub use sarif::render_sarif;

use crate::config::RedactionConfig;
use crate::models::{Candidate, ScanSession};
use crate::redact::redact_with;
use anyhow::Result;
use clap::ValueEnum;
use console::style;

/// Output format selected on the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ReportFormat {
    #[value(name = "table")]
    Table,
    #[value(name = "json")]
    Json,
    #[value(name = "sarif")]
    Sarif,
}

/// Render `session` in the requested format.
pub fn render(session: &ScanSession, format: ReportFormat, redaction: &RedactionConfig) -> Result<String> {
    match format {
        ReportFormat::Table => Ok(render_table(session, redaction)),
        ReportFormat::Json => render_json(session),
        ReportFormat::Sarif => render_sarif(session, redaction),
    }
}

/// JSON document matching the session data model. Raw secret values are
/// carried here: machine consumers need the exact match for triage tooling.
pub fn render_json(session: &ScanSession) -> Result<String> {
    Ok(serde_json::to_string_pretty(session)?)
}

fn redacted(candidate: &Candidate, redaction: &RedactionConfig) -> String {
    redact_with(
        &candidate.secret_value,
        redaction.prefix_chars,
        redaction.suffix_chars,
        redaction.min_length,
    )
}

fn status_cell(candidate: &Candidate) -> String {
    let label = candidate.validation.label();
    match label {
        "valid" | "quota_exceeded" => style(label).red().bold().to_string(),
        "invalid" => style(label).green().to_string(),
        "not_attempted" | "skipped" => style(label).dim().to_string(),
        _ => style(label).yellow().to_string(),
    }
}

/// Human-readable table, one section per target.
pub fn render_table(session: &ScanSession, redaction: &RedactionConfig) -> String {
    let mut out = String::new();

    for result in &session.results {
        out.push_str(&format!("{}\n", style(&result.target).bold()));
        if let Some(commit) = &result.commit {
            out.push_str(&format!("  commit {commit}\n"));
        }
        out.push_str(&format!(
            "  {} files scanned, {} candidate(s)\n",
            result.files_scanned,
            result.candidates.len()
        ));

        for error in &result.errors {
            out.push_str(&format!("  {} {error}\n", style("error:").red()));
        }

        for candidate in &result.candidates {
            out.push_str(&format!(
                "  {}:{}:{}\n",
                candidate.file_path, candidate.line_number, candidate.column_start
            ));
            out.push_str(&format!(
                "    {:<12} {:<24} {}\n",
                candidate.provider,
                candidate.pattern,
                redacted(candidate, redaction)
            ));
            let variable = candidate.variable_name.as_deref().unwrap_or("-");
            out.push_str(&format!(
                "    var {:<20} entropy {:.2}  {}\n",
                variable,
                candidate.entropy,
                status_cell(candidate)
            ));
            if let Some(detail) = candidate.validation.detail() {
                if !detail.message.is_empty() {
                    out.push_str(&format!("    {}\n", style(&detail.message).dim()));
                }
            }
        }
        out.push('\n');
    }

    let total = session.total_candidates();
    if total == 0 {
        out.push_str(&format!("{}\n", style("No credentials found.").green()));
    } else {
        let live = session
            .results
            .iter()
            .flat_map(|r| &r.candidates)
            .filter(|c| c.validation.is_live())
            .count();
        let summary = if session.validation_enabled {
            format!("{total} candidate(s) found, {live} confirmed live.")
        } else {
            format!("{total} candidate(s) found (validation disabled).")
        };
        out.push_str(&format!("{}\n", style(summary).bold()));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScanResult, ValidationStatus};

    fn session_with_candidate() -> ScanSession {
        let secret = format!("sk-proj-{}", "A".repeat(40));
        let mut candidate = Candidate {
            id: "finding-1".to_string(),
            provider: "openai".to_string(),
            pattern: "openai-api-key".to_string(),
            file_path: "app/settings.py".to_string(),
            line_number: 14,
            column_start: 12,
            column_end: 12 + secret.chars().count(),
            secret_value: secret,
            context: "API_KEY = ...".to_string(),
            variable_name: Some("API_KEY".to_string()),
            entropy: 1.2,
            validation: ValidationStatus::NotAttempted,
            validated_at: None,
        };
        candidate.record_validation(ValidationStatus::valid(Some(200), "key accepted by OpenAI"));

        let mut result = ScanResult::new("app");
        result.files_scanned = 3;
        result.candidates.push(candidate);
        result.complete();

        let mut session = ScanSession::new(vec!["app".to_string()], true);
        session.results.push(result);
        session.complete();
        session
    }

    #[test]
    fn table_redacts_secret_material() {
        let session = session_with_candidate();
        let table = render_table(&session, &RedactionConfig::default());

        assert!(table.contains("app/settings.py:14:12"));
        assert!(table.contains("openai"));
        assert!(!table.contains(&"A".repeat(40)), "raw secret leaked into table");
        assert!(table.contains("sk-proj-"));
    }

    #[test]
    fn table_reports_empty_sessions() {
        let mut session = ScanSession::new(vec!["clean".to_string()], false);
        let mut result = ScanResult::new("clean");
        result.complete();
        session.results.push(result);
        session.complete();

        let table = render_table(&session, &RedactionConfig::default());
        assert!(table.contains("No credentials found."));
    }

    #[test]
    fn json_round_trips_the_session_shape() {
        let session = session_with_candidate();
        let json = render_json(&session).unwrap();
        let back: ScanSession = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, session.id);
        assert_eq!(back.total_candidates(), 1);
        assert_eq!(back.results[0].candidates[0].provider, "openai");
        assert!(back.results[0].candidates[0].validation.is_live());
    }

    #[test]
    fn render_dispatches_on_format() {
        let session = session_with_candidate();
        let redaction = RedactionConfig::default();

        assert!(render(&session, ReportFormat::Json, &redaction)
            .unwrap()
            .starts_with('{'));
        assert!(render(&session, ReportFormat::Sarif, &redaction)
            .unwrap()
            .contains("2.1.0"));
        assert!(!render(&session, ReportFormat::Table, &redaction)
            .unwrap()
            .is_empty());
    }
}
