//! The fixed catalog of supported AI service providers.
//!
//! Pattern notes:
//! - Capture group 1 is always the secret. Contextual patterns (Cohere) match
//!   surrounding text but capture only the key.
//! - Patterns are single-line by convention; none of them can cross `\n`.
//! - The OpenAI character class deliberately excludes `-` so Anthropic keys
//!   (`sk-ant-...`) never collide with the shared `sk-` prefix.

use super::{body_str, classify_default, AuthStyle, ProbeRequest, Provider, SecretPattern};
use crate::models::ValidationStatus;
use reqwest::Method;
use serde_json::json;
use std::collections::BTreeMap;

// ── OpenAI ────────────────────────────────────────────────

pub struct OpenAi {
    patterns: Vec<SecretPattern>,
}

impl OpenAi {
    const ENDPOINT: &'static str = "https://api.openai.com/v1/models";

    pub fn new() -> Self {
        Self {
            patterns: vec![SecretPattern::new(
                "openai-api-key",
                r"\b(sk-(?:proj-|org-|admin-|svcacct-)?[A-Za-z0-9]{20,150})\b",
            )],
        }
    }
}

impl Provider for OpenAi {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn display_name(&self) -> &'static str {
        "OpenAI"
    }

    fn patterns(&self) -> &[SecretPattern] {
        &self.patterns
    }

    fn validation_endpoint(&self) -> &'static str {
        Self::ENDPOINT
    }

    fn build_probe_request(&self, key: &str) -> ProbeRequest {
        ProbeRequest::with_auth(Method::GET, Self::ENDPOINT, &AuthStyle::Bearer, key)
    }

    fn classify_response(&self, status: u16, _body: Option<&serde_json::Value>) -> ValidationStatus {
        match status {
            200 => ValidationStatus::valid(Some(status), "key accepted by OpenAI"),
            401 => ValidationStatus::invalid(Some(status), "OpenAI rejected the key"),
            403 => ValidationStatus::valid(
                Some(status),
                "key is live but scoped away from the models endpoint",
            ),
            429 => ValidationStatus::quota_exceeded(
                Some(status),
                "key is live but the account is over quota",
            ),
            _ => classify_default("OpenAI", status),
        }
    }
}

// ── Anthropic ─────────────────────────────────────────────

pub struct Anthropic {
    patterns: Vec<SecretPattern>,
}

impl Anthropic {
    const ENDPOINT: &'static str = "https://api.anthropic.com/v1/messages";

    pub fn new() -> Self {
        Self {
            patterns: vec![
                SecretPattern::new(
                    "anthropic-api-key",
                    r"\b(sk-ant-api[0-9]{2}-[A-Za-z0-9_-]{80,120})",
                ),
                SecretPattern::new(
                    "anthropic-admin-key",
                    r"\b(sk-ant-admin-[A-Za-z0-9_-]{20,})",
                ),
            ],
        }
    }
}

impl Provider for Anthropic {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn display_name(&self) -> &'static str {
        "Anthropic"
    }

    fn patterns(&self) -> &[SecretPattern] {
        &self.patterns
    }

    fn validation_endpoint(&self) -> &'static str {
        Self::ENDPOINT
    }

    fn build_probe_request(&self, key: &str) -> ProbeRequest {
        ProbeRequest::with_auth(Method::POST, Self::ENDPOINT, &AuthStyle::Header("x-api-key"), key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json_body(json!({
                "model": "claude-3-haiku-20240307",
                "max_tokens": 1,
                "messages": [{"role": "user", "content": "Hi"}],
            }))
    }

    fn classify_response(&self, status: u16, body: Option<&serde_json::Value>) -> ValidationStatus {
        match status {
            200 => ValidationStatus::valid(Some(status), "key accepted by Anthropic"),
            401 => ValidationStatus::invalid(Some(status), "Anthropic rejected the key"),
            429 => ValidationStatus::rate_limited(
                Some(status),
                "Anthropic throttled the probe; liveness undetermined",
            ),
            400 => {
                let message = body_str(body, &["error", "message"]).unwrap_or_default();
                let lowered = message.to_lowercase();
                if lowered.contains("credit") || lowered.contains("balance") {
                    ValidationStatus::quota_exceeded(
                        Some(status),
                        "key is live but the account has no credit balance",
                    )
                } else {
                    ValidationStatus::probe_error(
                        Some(status),
                        "Anthropic rejected the probe request shape",
                    )
                }
            }
            _ => classify_default("Anthropic", status),
        }
    }
}

// ── Hugging Face ──────────────────────────────────────────

pub struct HuggingFace {
    patterns: Vec<SecretPattern>,
}

impl HuggingFace {
    const ENDPOINT: &'static str = "https://huggingface.co/api/whoami-v2";

    pub fn new() -> Self {
        Self {
            patterns: vec![SecretPattern::new(
                "huggingface-access-token",
                r"\b(hf_[A-Za-z0-9]{34})\b",
            )],
        }
    }
}

impl Provider for HuggingFace {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    fn display_name(&self) -> &'static str {
        "Hugging Face"
    }

    fn patterns(&self) -> &[SecretPattern] {
        &self.patterns
    }

    fn validation_endpoint(&self) -> &'static str {
        Self::ENDPOINT
    }

    fn build_probe_request(&self, key: &str) -> ProbeRequest {
        ProbeRequest::with_auth(Method::GET, Self::ENDPOINT, &AuthStyle::Bearer, key)
    }

    fn classify_response(&self, status: u16, body: Option<&serde_json::Value>) -> ValidationStatus {
        match status {
            200 => {
                let mut metadata = BTreeMap::new();
                if let Some(username) = body_str(body, &["name"]) {
                    metadata.insert("username".to_string(), username.to_string());
                }
                if let Some(role) = body_str(body, &["auth", "accessToken", "role"]) {
                    metadata.insert("scopes".to_string(), role.to_string());
                }
                ValidationStatus::Valid(
                    crate::models::ProbeDetail::new(Some(status), "token accepted by Hugging Face")
                        .with_metadata(metadata),
                )
            }
            401 => ValidationStatus::invalid(Some(status), "Hugging Face rejected the token"),
            _ => classify_default("Hugging Face", status),
        }
    }
}

// ── Cohere ────────────────────────────────────────────────

pub struct Cohere {
    patterns: Vec<SecretPattern>,
}

impl Cohere {
    const ENDPOINT: &'static str = "https://api.cohere.ai/v1/check-api-key";

    pub fn new() -> Self {
        Self {
            // Cohere keys carry no prefix, so the pattern demands context:
            // the word "cohere" within 30 characters, or an explicit
            // COHERE_API_KEY assignment.
            patterns: vec![
                SecretPattern::new(
                    "cohere-context-key",
                    r"(?i)cohere[^\n]{0,30}?[^A-Za-z0-9\n]([A-Za-z0-9]{40})\b",
                ),
                SecretPattern::new(
                    "cohere-env-assignment",
                    r#"COHERE_API_KEY\s*[:=]\s*["']?([A-Za-z0-9]{40})\b"#,
                ),
            ],
        }
    }
}

impl Provider for Cohere {
    fn name(&self) -> &'static str {
        "cohere"
    }

    fn display_name(&self) -> &'static str {
        "Cohere"
    }

    fn patterns(&self) -> &[SecretPattern] {
        &self.patterns
    }

    fn validation_endpoint(&self) -> &'static str {
        Self::ENDPOINT
    }

    fn build_probe_request(&self, key: &str) -> ProbeRequest {
        ProbeRequest::with_auth(Method::POST, Self::ENDPOINT, &AuthStyle::Bearer, key)
            .header("content-type", "application/json")
            .json_body(json!({}))
    }

    fn classify_response(&self, status: u16, body: Option<&serde_json::Value>) -> ValidationStatus {
        match status {
            200 => match body.and_then(|b| b.get("valid")).and_then(|v| v.as_bool()) {
                Some(true) => ValidationStatus::valid(Some(status), "key accepted by Cohere"),
                Some(false) => ValidationStatus::invalid(Some(status), "Cohere rejected the key"),
                None => ValidationStatus::probe_error(
                    Some(status),
                    "Cohere check-api-key response had no valid field",
                ),
            },
            401 => ValidationStatus::invalid(Some(status), "Cohere rejected the key"),
            _ => classify_default("Cohere", status),
        }
    }
}

// ── Replicate ─────────────────────────────────────────────

pub struct Replicate {
    patterns: Vec<SecretPattern>,
}

impl Replicate {
    const ENDPOINT: &'static str = "https://api.replicate.com/v1/account";

    pub fn new() -> Self {
        Self {
            patterns: vec![SecretPattern::new(
                "replicate-api-token",
                r"\b(r8_[A-Za-z0-9]{37})\b",
            )],
        }
    }
}

impl Provider for Replicate {
    fn name(&self) -> &'static str {
        "replicate"
    }

    fn display_name(&self) -> &'static str {
        "Replicate"
    }

    fn patterns(&self) -> &[SecretPattern] {
        &self.patterns
    }

    fn validation_endpoint(&self) -> &'static str {
        Self::ENDPOINT
    }

    fn build_probe_request(&self, key: &str) -> ProbeRequest {
        ProbeRequest::with_auth(Method::GET, Self::ENDPOINT, &AuthStyle::Bearer, key)
    }

    fn classify_response(&self, status: u16, _body: Option<&serde_json::Value>) -> ValidationStatus {
        match status {
            200 => ValidationStatus::valid(Some(status), "token accepted by Replicate"),
            401 => ValidationStatus::invalid(Some(status), "Replicate rejected the token"),
            _ => classify_default("Replicate", status),
        }
    }
}

// ── Google Gemini ─────────────────────────────────────────

pub struct GoogleGemini {
    patterns: Vec<SecretPattern>,
}

impl GoogleGemini {
    const ENDPOINT: &'static str = "https://generativelanguage.googleapis.com/v1beta/models";

    pub fn new() -> Self {
        Self {
            patterns: vec![SecretPattern::new(
                "google-gemini-api-key",
                r"\b(AIza[A-Za-z0-9_-]{35})",
            )],
        }
    }
}

impl Provider for GoogleGemini {
    fn name(&self) -> &'static str {
        "google_gemini"
    }

    fn display_name(&self) -> &'static str {
        "Google Gemini"
    }

    fn patterns(&self) -> &[SecretPattern] {
        &self.patterns
    }

    fn validation_endpoint(&self) -> &'static str {
        Self::ENDPOINT
    }

    fn build_probe_request(&self, key: &str) -> ProbeRequest {
        ProbeRequest::with_auth(Method::GET, Self::ENDPOINT, &AuthStyle::QueryParam("key"), key)
    }

    fn classify_response(&self, status: u16, _body: Option<&serde_json::Value>) -> ValidationStatus {
        match status {
            200 => ValidationStatus::valid(Some(status), "key accepted by Generative Language API"),
            // AIza keys are shared across Google Cloud; a rejection here only
            // establishes the key is dead for Gemini specifically.
            400 | 403 => ValidationStatus::invalid(
                Some(status),
                "key rejected for Gemini (may still be live for other Google APIs)",
            ),
            _ => classify_default("Google Gemini", status),
        }
    }
}

// ── Groq ──────────────────────────────────────────────────

pub struct Groq {
    patterns: Vec<SecretPattern>,
}

impl Groq {
    const ENDPOINT: &'static str = "https://api.groq.com/openai/v1/models";

    pub fn new() -> Self {
        Self {
            patterns: vec![SecretPattern::new(
                "groq-api-key",
                r"\b(gsk_[A-Za-z0-9]{50,})\b",
            )],
        }
    }
}

impl Provider for Groq {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn display_name(&self) -> &'static str {
        "Groq"
    }

    fn patterns(&self) -> &[SecretPattern] {
        &self.patterns
    }

    fn validation_endpoint(&self) -> &'static str {
        Self::ENDPOINT
    }

    fn build_probe_request(&self, key: &str) -> ProbeRequest {
        ProbeRequest::with_auth(Method::GET, Self::ENDPOINT, &AuthStyle::Bearer, key)
    }

    fn classify_response(&self, status: u16, _body: Option<&serde_json::Value>) -> ValidationStatus {
        match status {
            200 => ValidationStatus::valid(Some(status), "key accepted by Groq"),
            401 => ValidationStatus::invalid(Some(status), "Groq rejected the key"),
            _ => classify_default("Groq", status),
        }
    }
}

// ── LangSmith ─────────────────────────────────────────────

pub struct LangSmith {
    patterns: Vec<SecretPattern>,
}

impl LangSmith {
    const ENDPOINT: &'static str = "https://api.smith.langchain.com/api/v1/sessions";

    pub fn new() -> Self {
        Self {
            patterns: vec![SecretPattern::new(
                "langsmith-api-key",
                r"\b(lsv2_(?:sk|pt)_[A-Za-z0-9]{32,})\b",
            )],
        }
    }
}

impl Provider for LangSmith {
    fn name(&self) -> &'static str {
        "langsmith"
    }

    fn display_name(&self) -> &'static str {
        "LangSmith"
    }

    fn patterns(&self) -> &[SecretPattern] {
        &self.patterns
    }

    fn validation_endpoint(&self) -> &'static str {
        Self::ENDPOINT
    }

    fn build_probe_request(&self, key: &str) -> ProbeRequest {
        ProbeRequest::with_auth(Method::GET, Self::ENDPOINT, &AuthStyle::Header("x-api-key"), key)
    }

    fn classify_response(&self, status: u16, _body: Option<&serde_json::Value>) -> ValidationStatus {
        match status {
            200 => ValidationStatus::valid(Some(status), "key accepted by LangSmith"),
            401 => ValidationStatus::invalid(Some(status), "LangSmith rejected the key"),
            403 => ValidationStatus::valid(
                Some(status),
                "key is live but scoped away from the sessions endpoint",
            ),
            _ => classify_default("LangSmith", status),
        }
    }
}
