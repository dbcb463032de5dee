//! The single command: audit the prompt, then stream its completion.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use inferlog_agent::{AuditedCompletion, load_context};
use inferlog_audit::PangeaAuditLog;
use inferlog_config::{AppConfig, ConfigError, ConfigOverrides, RunConfig};
use inferlog_core::PromptRequest;
use inferlog_providers::{OPENAI_CLIENT_NAME, OpenAiCompatProvider};

/// Layer flag/environment values over the config file and validate.
pub fn resolve_config(path: Option<&Path>, overrides: ConfigOverrides) -> Result<RunConfig, ConfigError> {
    AppConfig::load(path)?.apply(overrides).resolve()
}

/// Run against stdout.
pub async fn run(config: &RunConfig, prompt: String) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    run_with_output(config, prompt, stdout.lock()).await
}

/// The stderr line for a failed run. Wrapped errors already render their
/// cause, so the chain is not printed again.
pub fn error_line(err: &anyhow::Error) -> String {
    format!("error: {err}")
}

pub async fn run_with_output<W: Write>(config: &RunConfig, prompt: String, out: W) -> anyhow::Result<()> {
    let context = load_context(config.context_file.as_deref())?;
    let request = PromptRequest::new(context, prompt);

    let audit_log = PangeaAuditLog::from_config(config);
    tracing::debug!(audit = %audit_log.base_url(), model = %config.model, "Starting run");

    let provider = OpenAiCompatProvider::new(
        OPENAI_CLIENT_NAME,
        config.openai_base_url.as_str(),
        config.openai_api_key.as_str(),
    );
    let pipeline = AuditedCompletion::new(Arc::new(audit_log), Arc::new(provider), config.model.as_str());

    let outcome = pipeline.run(&request, out).await?;

    tracing::debug!(
        audit_request_id = %outcome.receipt.request_id,
        bytes = outcome.summary.bytes,
        "Run finished"
    );
    Ok(())
}
