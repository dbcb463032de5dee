//! Provider trait: the abstraction over chat-completion backends.
//!
//! A Provider knows how to send a message list to an LLM and hand back the
//! response as an ordered stream of chunks. Transport details (HTTP, SSE
//! framing, auth headers) stay behind the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Receiver;

use crate::error::ProviderError;
use crate::message::Message;

/// A streaming chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// The conversation messages, in order
    pub messages: Vec<Message>,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,
}

impl StreamChunk {
    /// A chunk carrying one text fragment.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            done: false,
        }
    }

    /// The end-of-stream marker.
    pub fn done() -> Self {
        Self {
            content: None,
            done: true,
        }
    }
}

/// Receiving half of a provider stream.
///
/// Chunks arrive in provider order. An `Err` item means the stream broke
/// mid-sequence; nothing follows it.
pub type ChunkReceiver = Receiver<std::result::Result<StreamChunk, ProviderError>>;

/// The core Provider trait.
///
/// The completion streamer calls `stream()` without knowing which backend
/// answers it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The client name recorded in audit events (e.g., "OpenAI").
    fn name(&self) -> &str;

    /// Open a streaming completion.
    ///
    /// Errors raised before the first chunk (authentication, quota, transport)
    /// are returned directly; errors after that arrive through the receiver.
    async fn stream(&self, request: ProviderRequest) -> std::result::Result<ChunkReceiver, ProviderError>;
}
