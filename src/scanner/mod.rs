//! Pattern scanner: applies every registered provider pattern to a text
//! buffer and emits positioned, context-annotated candidates.
//!
//! The scanner is synchronous and pure with respect to its inputs: the same
//! buffer always produces the same candidate sequence (modulo generated IDs).
//! It applies no entropy filtering of its own; entropy is recorded on each
//! candidate for consumers to filter on.

use crate::models::{Candidate, ValidationStatus};
use crate::providers::ProviderRegistry;
use crate::redact;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Maximum number of characters inspected before a secret when looking for an
/// assignment-style variable name.
const VARIABLE_WINDOW_CHARS: usize = 100;

/// Default number of context lines captured before and after a match.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

fn assignment_regex() -> &'static Regex {
    static ASSIGNMENT: OnceLock<Regex> = OnceLock::new();
    ASSIGNMENT.get_or_init(|| {
        // IDENT = "...", IDENT: "...", "key": "..." — anchored to the end of
        // the window so only the assignment immediately before the secret is
        // recognized.
        Regex::new(r#"(?:["']([A-Za-z_][A-Za-z0-9_]*)["']|([A-Za-z_][A-Za-z0-9_]*))\s*[:=]\s*["']?\s*$"#)
            .expect("assignment regex must compile")
    })
}

/// Configurable scanner over a fixed provider registry.
pub struct Scanner<'r> {
    registry: &'r ProviderRegistry,
    provider_filter: Option<HashSet<String>>,
    context_lines: usize,
}

impl<'r> Scanner<'r> {
    pub fn new(registry: &'r ProviderRegistry) -> Self {
        Self {
            registry,
            provider_filter: None,
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }

    /// Restrict scanning to the named providers. Unknown names are ignored.
    pub fn with_provider_filter<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provider_filter = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_context_lines(mut self, context_lines: usize) -> Self {
        self.context_lines = context_lines;
        self
    }

    /// Scan `text`, labeling every candidate with `file_path`.
    ///
    /// Candidates are emitted in ascending `(line, column_start)` order, then
    /// by provider registration order, then by pattern order, with exact
    /// `(file_path, line, column_start, secret)` repeats removed.
    pub fn scan_buffer(&self, text: &str, file_path: &str) -> Vec<Candidate> {
        if text.is_empty() {
            return Vec::new();
        }

        let line_starts = line_start_offsets(text);
        let lines: Vec<&str> = text.lines().collect();

        // (line, column_start, provider_index, pattern_index, candidate)
        let mut raw: Vec<(usize, usize, usize, usize, Candidate)> = Vec::new();

        for (provider_index, provider) in self.registry.iter().enumerate() {
            if let Some(filter) = &self.provider_filter {
                if !filter.contains(provider.name()) {
                    continue;
                }
            }

            for (pattern_index, pattern) in provider.patterns().iter().enumerate() {
                for captures in pattern.regex.captures_iter(text) {
                    let Some(secret) = captures.get(1) else {
                        continue;
                    };

                    let (line_number, column_start, column_end) =
                        locate(text, &line_starts, secret.start(), secret.as_str());
                    let line_index = line_number - 1;

                    let candidate = Candidate {
                        id: uuid::Uuid::new_v4().to_string(),
                        provider: provider.name().to_string(),
                        pattern: pattern.name.to_string(),
                        file_path: file_path.to_string(),
                        line_number,
                        column_start,
                        column_end,
                        secret_value: secret.as_str().to_string(),
                        context: context_window(&lines, line_index, self.context_lines),
                        variable_name: extract_variable_name(text, secret.start()),
                        entropy: redact::entropy(secret.as_str()),
                        validation: ValidationStatus::NotAttempted,
                        validated_at: None,
                    };

                    raw.push((
                        line_number,
                        column_start,
                        provider_index,
                        pattern_index,
                        candidate,
                    ));
                }
            }
        }

        raw.sort_by(|a, b| (a.0, a.1, a.2, a.3).cmp(&(b.0, b.1, b.2, b.3)));

        let mut seen: HashSet<(usize, usize, String)> = HashSet::new();
        let mut out = Vec::with_capacity(raw.len());
        for (line, column, _, _, candidate) in raw {
            if seen.insert((line, column, candidate.secret_value.clone())) {
                out.push(candidate);
            }
        }
        out
    }
}

/// Byte offset of the start of every line in `text`.
fn line_start_offsets(text: &str) -> Vec<usize> {
    let mut starts = vec![0usize];
    for (offset, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(offset + 1);
        }
    }
    starts
}

/// Convert a secret's byte offset into 1-based `(line, column_start,
/// column_end)`. Columns are character counts from the start of the line the
/// secret begins on, so a match that crosses `\n` is attributed to its first
/// line.
fn locate(
    text: &str,
    line_starts: &[usize],
    secret_offset: usize,
    secret: &str,
) -> (usize, usize, usize) {
    let line_index = line_starts.partition_point(|&start| start <= secret_offset) - 1;
    let line_start = line_starts[line_index];
    let column_start = text[line_start..secret_offset].chars().count() + 1;
    let column_end = column_start + secret.chars().count();
    (line_index + 1, column_start, column_end)
}

/// Join up to `context_lines` lines on either side of `line_index`, stripped
/// of surrounding whitespace.
fn context_window(lines: &[&str], line_index: usize, context_lines: usize) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let first = line_index.saturating_sub(context_lines);
    let last = (line_index + context_lines).min(lines.len() - 1);
    lines[first..=last].join("\n").trim().to_string()
}

/// Recognize an assignment immediately preceding the secret and capture the
/// identifier being assigned. Looks back at most [`VARIABLE_WINDOW_CHARS`].
fn extract_variable_name(text: &str, secret_offset: usize) -> Option<String> {
    let mut window_start = secret_offset.saturating_sub(VARIABLE_WINDOW_CHARS);
    while window_start > 0 && !text.is_char_boundary(window_start) {
        window_start -= 1;
    }
    let window = &text[window_start..secret_offset];

    assignment_regex().captures(window).and_then(|captures| {
        captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|m| m.as_str().to_string())
    })
}
