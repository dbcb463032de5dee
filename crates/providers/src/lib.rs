//! Chat-completion provider implementations for inferlog.
//!
//! All providers implement the `inferlog_core::Provider` trait.

pub mod openai_compat;
pub mod sse;

pub use openai_compat::{OPENAI_CLIENT_NAME, OpenAiCompatProvider};
