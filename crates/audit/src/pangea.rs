//! Pangea Secure Audit Log client.
//!
//! Only the write path is implemented: one `POST /v2/log` per bulk
//! submission, authenticated with a bearer token. Events are sent unsigned;
//! tamper-proofing is the service's job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inferlog_config::{AuditEnvironment, RunConfig};
use inferlog_core::audit::{AuditEvent, AuditLog, AuditReceipt};
use inferlog_core::error::AuditError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("inferlog/", env!("CARGO_PKG_VERSION"));

/// Base URL of the audit service for a domain.
///
/// Production services live at `audit.<domain>`; the local environment
/// addresses `<domain>` directly.
pub fn service_base_url(domain: &str, insecure: bool, environment: AuditEnvironment) -> String {
    let scheme = if insecure { "http://" } else { "https://" };
    let domain = domain.trim().trim_end_matches('/');
    match environment {
        AuditEnvironment::Production => format!("{scheme}audit.{domain}"),
        AuditEnvironment::Local => format!("{scheme}{domain}"),
    }
}

/// An `AuditLog` that submits to the Pangea Secure Audit Log service.
pub struct PangeaAuditLog {
    base_url: String,
    token: String,
    config_id: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for PangeaAuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PangeaAuditLog")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("config_id", &self.config_id)
            .finish()
    }
}

impl PangeaAuditLog {
    /// Create a client for an explicit service base URL.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, config_id: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            config_id,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from resolved run settings.
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(
            service_base_url(&config.audit_domain, config.audit_insecure, config.audit_environment),
            config.audit_token.clone(),
            config.audit_config_id.clone(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl AuditLog for PangeaAuditLog {
    async fn log_bulk(&self, events: &[AuditEvent]) -> Result<AuditReceipt, AuditError> {
        let url = format!("{}/v2/log", self.base_url);
        let body = LogBulkRequest {
            events: events.iter().map(|event| LogEvent { event }).collect(),
            verbose: false,
            config_id: self.config_id.as_deref(),
        };

        debug!(count = events.len(), url = %url, "Submitting audit events");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuditError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AuditError::Network(e.to_string()))?;
        let envelope = serde_json::from_str::<ResponseEnvelope>(&text);

        if status == 401 || status == 403 {
            let summary = envelope
                .map(|e| e.summary)
                .unwrap_or_else(|_| text.trim().to_string());
            return Err(AuditError::AuthenticationFailed(summary));
        }

        if !(200..300).contains(&status) {
            warn!(status, body = %text, "Audit service returned error");
            return Err(match envelope {
                Ok(e) => AuditError::ApiError {
                    status_code: status,
                    status: e.status,
                    summary: e.summary,
                },
                Err(_) => AuditError::ApiError {
                    status_code: status,
                    status: format!("HTTP {status}"),
                    summary: text.trim().to_string(),
                },
            });
        }

        let envelope = envelope.map_err(|e| AuditError::InvalidResponse(e.to_string()))?;
        if envelope.status != "Success" && envelope.status != "Accepted" {
            return Err(AuditError::ApiError {
                status_code: status,
                status: envelope.status,
                summary: envelope.summary,
            });
        }

        Ok(envelope.into_receipt())
    }
}

// --- Pangea API types (internal) ---

#[derive(Debug, Serialize)]
struct LogBulkRequest<'a> {
    events: Vec<LogEvent<'a>>,
    verbose: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct LogEvent<'a> {
    event: &'a AuditEvent,
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    #[serde(default)]
    request_id: String,
    status: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    response_time: Option<String>,
    #[serde(default)]
    result: Option<LogBulkResult>,
}

#[derive(Debug, Default, Deserialize)]
struct LogBulkResult {
    #[serde(default)]
    results: Vec<LogResult>,
}

#[derive(Debug, Deserialize)]
struct LogResult {
    #[serde(default)]
    hash: Option<String>,
}

impl ResponseEnvelope {
    fn into_receipt(self) -> AuditReceipt {
        let response_time = self
            .response_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc));

        AuditReceipt {
            request_id: self.request_id,
            status: self.status,
            summary: self.summary,
            response_time,
            hashes: self
                .result
                .unwrap_or_default()
                .results
                .into_iter()
                .filter_map(|r| r.hash)
                .collect(),
        }
    }
}
