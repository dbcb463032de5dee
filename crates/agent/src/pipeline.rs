//! Audit first, then stream.

use std::io::Write;
use std::sync::Arc;

use inferlog_audit::AuditRecorder;
use inferlog_core::audit::{AuditLog, AuditReceipt, PromptRequest};
use inferlog_core::error::Result;
use inferlog_core::provider::Provider;
use tracing::info;

use crate::streamer::{CompletionStreamer, StreamSummary};

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub receipt: AuditReceipt,
    pub summary: StreamSummary,
}

/// Records a prompt to the audit log and only then streams its completion.
///
/// An audit failure ends the run before the provider is contacted, so no
/// completion is ever requested for a prompt that was not logged.
pub struct AuditedCompletion {
    recorder: AuditRecorder,
    streamer: CompletionStreamer,
}

impl AuditedCompletion {
    /// The audit event's `event_tools` is the provider's name.
    pub fn new(audit_log: Arc<dyn AuditLog>, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let recorder = AuditRecorder::new(audit_log, provider.name());
        Self {
            recorder,
            streamer: CompletionStreamer::new(provider, model),
        }
    }

    pub async fn run<W: Write>(&self, request: &PromptRequest, out: W) -> Result<RunOutcome> {
        let receipt = self.recorder.record(request).await?;
        let summary = self.streamer.stream(request, out).await?;

        info!(
            provider = %self.streamer.provider_name(),
            audit_request_id = %receipt.request_id,
            fragments = summary.fragments,
            "Run complete"
        );

        Ok(RunOutcome { receipt, summary })
    }
}
