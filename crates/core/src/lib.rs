//! # inferlog core
//!
//! Domain types, traits, and error definitions shared by every inferlog crate.
//! Nothing here talks to the network; the provider and audit-log traits are
//! implemented in their own crates.
//!
//! ## Design
//!
//! The two external collaborators, the completion provider and the audit
//! log, are each a trait defined here:
//! - [`Provider`] produces an ordered stream of response chunks
//! - [`AuditLog`] durably accepts a batch of audit events
//!
//! Tests swap in scripted implementations of both.

pub mod audit;
pub mod canonical;
pub mod error;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use audit::{AuditEvent, AuditLog, AuditReceipt, PromptRequest, USER_PROMPT_EVENT_TYPE};
pub use canonical::canonicalize_json;
pub use error::{AuditError, Error, ProviderError, Result};
pub use message::{Message, Role};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk};
