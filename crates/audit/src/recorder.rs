//! The audit recorder: one canonical event per prompt, submitted once.

use std::sync::Arc;

use inferlog_core::audit::{AuditEvent, AuditLog, AuditReceipt, PromptRequest};
use inferlog_core::error::AuditError;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Records prompt requests to an [`AuditLog`].
///
/// The recorder never retries: a failed submission is returned to the caller
/// as-is. Only a digest of the audited input reaches the local logs.
pub struct AuditRecorder {
    log: Arc<dyn AuditLog>,
    tools: String,
}

impl AuditRecorder {
    /// `tools` names the completion provider client the prompt is destined for.
    pub fn new(log: Arc<dyn AuditLog>, tools: impl Into<String>) -> Self {
        Self {
            log,
            tools: tools.into(),
        }
    }

    /// Build the audit event for `request` without sending it.
    pub fn event_for(&self, request: &PromptRequest) -> Result<AuditEvent, AuditError> {
        AuditEvent::user_prompt(request, &self.tools)
    }

    /// Submit the audit event for `request`.
    pub async fn record(&self, request: &PromptRequest) -> Result<AuditReceipt, AuditError> {
        let event = self.event_for(request)?;
        let digest = hex::encode(Sha256::digest(event.event_input.as_bytes()));

        debug!(
            event_type = %event.event_type,
            event_tools = %event.event_tools,
            input_sha256 = %digest,
            "Recording prompt"
        );

        let receipt = self.log.log_bulk(std::slice::from_ref(&event)).await?;

        info!(
            request_id = %receipt.request_id,
            status = %receipt.status,
            input_sha256 = %digest,
            "Prompt audited"
        );

        Ok(receipt)
    }
}
