//! The audit-then-stream completion pipeline.
//!
//! One run is strictly sequential:
//!
//! 1. **Audit** the `{context, prompt}` pair (one bulk event)
//! 2. **Request** a streaming completion with the context in the system message
//! 3. **Relay** every fragment to the output as it arrives, then a newline
//!
//! A failed audit stops the run before the completion request is made.

pub mod context;
pub mod pipeline;
pub mod streamer;

pub use context::{DEFAULT_CONTEXT, load_context, system_prompt};
pub use pipeline::{AuditedCompletion, RunOutcome};
pub use streamer::{CompletionStreamer, FragmentSink, StreamState, StreamSummary, fragments, relay};
