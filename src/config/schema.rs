//! Configuration schema, loaded from `config.toml`.
//!
//! Resolution order: explicit `--config` path → `~/.keyclaw/config.toml` →
//! built-in defaults. CLI flags override file values at the orchestration
//! layer; nothing in the core reads the environment directly.

use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Top-level config ──────────────────────────────────────────────

/// Top-level keyclaw configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Scanner behavior (`[scanner]`).
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Liveness validation behavior (`[validator]`).
    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Secret display redaction (`[redaction]`).
    #[serde(default)]
    pub redaction: RedactionConfig,
}

/// Scanner configuration (`[scanner]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScannerConfig {
    /// Lines of context captured before and after each match. Default: `3`.
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    /// Entropy score above which a finding is flagged as high-entropy in
    /// reports. Consumer-side only; the scanner never filters on it.
    /// Default: `4.5`.
    #[serde(default = "default_entropy_threshold")]
    pub entropy_threshold: f64,
    /// Provider names to scan for. Empty means all registered providers.
    #[serde(default)]
    pub provider_filter: Vec<String>,
    /// Files larger than this many bytes are skipped. Default: 1 MiB.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

/// Validator configuration (`[validator]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Probe candidate keys against provider endpoints. Default: `false`.
    #[serde(default)]
    pub enabled: bool,
    /// Hard per-probe timeout in seconds. Default: `10`.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Maximum probes in flight across all providers. Default: `5`.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

/// Redaction parameters (`[redaction]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedactionConfig {
    /// Leading characters preserved in redacted output. Default: `8`.
    #[serde(default = "default_prefix_chars")]
    pub prefix_chars: usize,
    /// Trailing characters preserved in redacted output. Default: `4`.
    #[serde(default = "default_suffix_chars")]
    pub suffix_chars: usize,
    /// Secrets shorter than this are masked entirely. Default: `12`.
    #[serde(default = "default_min_length")]
    pub min_length: usize,
}

fn default_context_lines() -> usize {
    crate::scanner::DEFAULT_CONTEXT_LINES
}

fn default_entropy_threshold() -> f64 {
    crate::redact::DEFAULT_ENTROPY_THRESHOLD
}

fn default_max_file_size() -> u64 {
    1024 * 1024
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_concurrent() -> usize {
    crate::validator::DEFAULT_MAX_CONCURRENT
}

fn default_prefix_chars() -> usize {
    crate::redact::DEFAULT_PREFIX_CHARS
}

fn default_suffix_chars() -> usize {
    crate::redact::DEFAULT_SUFFIX_CHARS
}

fn default_min_length() -> usize {
    crate::redact::DEFAULT_MIN_LENGTH
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            context_lines: default_context_lines(),
            entropy_threshold: default_entropy_threshold(),
            provider_filter: Vec::new(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_seconds: default_timeout_seconds(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            prefix_chars: default_prefix_chars(),
            suffix_chars: default_suffix_chars(),
            min_length: default_min_length(),
        }
    }
}

impl Config {
    /// Default config file location: `~/.keyclaw/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        UserDirs::new().map(|dirs| dirs.home_dir().join(".keyclaw").join("config.toml"))
    }

    /// Load from `path` when given, otherwise from the default location.
    /// A missing file yields the built-in defaults; a malformed file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !resolved.exists() {
            if path.is_some() {
                anyhow::bail!("config file not found: {}", resolved.display());
            }
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&resolved)
            .with_context(|| format!("failed to read {}", resolved.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", resolved.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();

        assert_eq!(config.scanner.context_lines, 3);
        assert_eq!(config.scanner.entropy_threshold, 4.5);
        assert!(config.scanner.provider_filter.is_empty());
        assert_eq!(config.scanner.max_file_size, 1024 * 1024);

        assert!(!config.validator.enabled);
        assert_eq!(config.validator.timeout_seconds, 10);
        assert_eq!(config.validator.max_concurrent, 5);

        assert_eq!(config.redaction.prefix_chars, 8);
        assert_eq!(config.redaction.suffix_chars, 4);
        assert_eq!(config.redaction.min_length, 12);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [validator]
            enabled = true
            max_concurrent = 2

            [scanner]
            provider_filter = ["openai", "anthropic"]
            "#,
        )
        .unwrap();

        assert!(config.validator.enabled);
        assert_eq!(config.validator.max_concurrent, 2);
        assert_eq!(config.validator.timeout_seconds, 10);
        assert_eq!(
            config.scanner.provider_filter,
            vec!["openai".to_string(), "anthropic".to_string()]
        );
        assert_eq!(config.scanner.context_lines, 3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str(
            r#"
            [scanner]
            contextlines = 5
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn load_with_missing_explicit_path_errors() {
        let result = Config::load(Some(Path::new("/nonexistent/keyclaw.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = Config::default();
        config.validator.enabled = true;
        config.scanner.provider_filter = vec!["groq".to_string()];

        let raw = toml::to_string(&config).unwrap();
        let back: Config = toml::from_str(&raw).unwrap();
        assert!(back.validator.enabled);
        assert_eq!(back.scanner.provider_filter, vec!["groq".to_string()]);
    }
}
