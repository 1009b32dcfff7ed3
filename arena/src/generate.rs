//! Generation collaborator boundary.
//!
//! The orchestrator treats text generation as an opaque capability:
//! `generate(system, prompt) -> text`. Callers expecting structured JSON
//! parse it through [`parse_json_payload`]; any non-parseable response is a
//! failure and the caller applies its documented fallback.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Error from a generation call.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("malformed structured response: {0}")]
    Malformed(String),
}

/// The opaque text-generation collaborator.
#[async_trait]
pub trait Generate: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerateError>;
}

/// Session metadata produced during setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaPayload {
    pub name: String,
    pub description: String,
}

/// Closing synthesis: a free-text summary plus one declared winner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub summary: String,
    pub winner: String,
}

/// Fabricated corroboration for an injected claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePayload {
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default, alias = "classifiedSummary")]
    pub summary: String,
}

/// Strip Markdown code fences the model may wrap JSON in.
pub fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Parse a structured generation response, fences tolerated.
pub fn parse_json_payload<T: DeserializeOwned>(raw: &str) -> Result<T, GenerateError> {
    serde_json::from_str(strip_fences(raw)).map_err(|e| GenerateError::Malformed(e.to_string()))
}
