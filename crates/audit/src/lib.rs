//! Audit logging for inferlog: every prompt is recorded before it is sent.
//!
//! Provides:
//! - **Pangea client**: [`PangeaAuditLog`], the `AuditLog` backed by the
//!   Secure Audit Log bulk endpoint
//! - **Recorder**: [`AuditRecorder`], which turns a prompt request into its
//!   canonical audit event and submits it exactly once

pub mod pangea;
pub mod recorder;

pub use pangea::{PangeaAuditLog, service_base_url};
pub use recorder::AuditRecorder;
