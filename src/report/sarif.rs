//! SARIF 2.1.0 emission.
//!
//! One run per session. Rule IDs are `"{provider}/{pattern}"`; every result
//! carries the finding's file, line, and column range. Snippets are
//! redacted: SARIF files get committed to code review tools.

use crate::config::RedactionConfig;
use crate::models::ScanSession;
use crate::providers::ProviderRegistry;
use crate::redact::redact_with;
use anyhow::Result;
use serde_json::{json, Value};

const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";

fn rules() -> Vec<Value> {
    ProviderRegistry::global()
        .iter()
        .flat_map(|provider| {
            provider.patterns().iter().map(move |pattern| {
                json!({
                    "id": format!("{}/{}", provider.name(), pattern.name),
                    "name": pattern.name,
                    "shortDescription": {
                        "text": format!("{} credential detected", provider.display_name())
                    },
                    "defaultConfiguration": { "level": "error" },
                })
            })
        })
        .collect()
}

/// Render `session` as a SARIF 2.1.0 document.
pub fn render_sarif(session: &ScanSession, redaction: &RedactionConfig) -> Result<String> {
    let results: Vec<Value> = session
        .results
        .iter()
        .flat_map(|result| result.candidates.iter().map(move |c| (result, c)))
        .map(|(result, candidate)| {
            let redacted = redact_with(
                &candidate.secret_value,
                redaction.prefix_chars,
                redaction.suffix_chars,
                redaction.min_length,
            );
            json!({
                "ruleId": format!("{}/{}", candidate.provider, candidate.pattern),
                "level": "error",
                "message": {
                    "text": format!(
                        "{} credential {} ({})",
                        candidate.provider, redacted, candidate.validation.label()
                    )
                },
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": { "uri": candidate.file_path },
                        "region": {
                            "startLine": candidate.line_number,
                            "startColumn": candidate.column_start,
                            "endColumn": candidate.column_end,
                            "snippet": { "text": redacted },
                        }
                    }
                }],
                "properties": {
                    "target": result.target,
                    "entropy": candidate.entropy,
                    "validation": candidate.validation.label(),
                },
            })
        })
        .collect();

    let document = json!({
        "$schema": SARIF_SCHEMA,
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "keyclaw",
                    "version": env!("CARGO_PKG_VERSION"),
                    "informationUri": "https://github.com/keyclaw-labs/keyclaw",
                    "rules": rules(),
                }
            },
            "results": results,
        }]
    });

    Ok(serde_json::to_string_pretty(&document)?)
}
