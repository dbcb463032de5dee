//! Audit domain types: what gets recorded before a completion starts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::canonicalize_json;
use crate::error::AuditError;

/// Event type tag for "user prompt sent to an inference system".
pub const USER_PROMPT_EVENT_TYPE: &str = "inference:user_prompt";

/// The `{context, prompt}` pair for one run.
///
/// Both the audit event and the completion request are built from the same
/// value, so the logged content is exactly the requested content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Background knowledge injected into the system message
    pub context: String,

    /// The invoker's prompt, sent verbatim as the user message
    pub prompt: String,
}

impl PromptRequest {
    pub fn new(context: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            prompt: prompt.into(),
        }
    }

    /// Canonical JSON of `{"context": ..., "prompt": ...}`.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        canonicalize_json(self)
    }
}

/// A single audit record as submitted to the audit service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// What kind of event this is
    pub event_type: String,

    /// Client type of the completion provider that will serve the request
    pub event_tools: String,

    /// Canonical JSON of the audited input
    pub event_input: String,
}

impl AuditEvent {
    /// Build the user-prompt event for `request`, tagged with the provider name.
    pub fn user_prompt(request: &PromptRequest, tools: impl Into<String>) -> Result<Self, AuditError> {
        let event_input = request
            .canonical_json()
            .map_err(|e| AuditError::Serialization(e.to_string()))?;

        Ok(Self {
            event_type: USER_PROMPT_EVENT_TYPE.into(),
            event_tools: tools.into(),
            event_input,
        })
    }
}

/// What the audit service acknowledged for a bulk submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReceipt {
    /// Service-assigned request id
    pub request_id: String,

    /// Service status, e.g. "Success" or "Accepted"
    pub status: String,

    /// Human-readable summary from the service
    #[serde(default)]
    pub summary: String,

    /// When the service produced the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<DateTime<Utc>>,

    /// Per-event hashes, when the service returns them synchronously
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashes: Vec<String>,
}

/// A durable, write-only audit log.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Submit `events` as one bulk request.
    async fn log_bulk(&self, events: &[AuditEvent]) -> Result<AuditReceipt, AuditError>;
}
