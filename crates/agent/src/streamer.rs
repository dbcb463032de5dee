//! Completion streamer: relay provider fragments to an output sink.
//!
//! The relay only needs "an ordered stream of text fragments that ends and
//! may fail part-way". [`fragments`] adapts a provider's chunk receiver into
//! that shape; [`relay`] drives it into a [`FragmentSink`].

use std::io::Write;
use std::sync::Arc;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use inferlog_core::audit::PromptRequest;
use inferlog_core::error::{ProviderError, Result};
use inferlog_core::message::Message;
use inferlog_core::provider::{ChunkReceiver, Provider, ProviderRequest};
use tracing::debug;

use crate::context::system_prompt;

/// Lifecycle of a sink. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Writing fragments
    Streaming,
    /// Stream exhausted, trailing newline written
    Done,
}

/// Totals for a finished stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub fragments: usize,
    pub bytes: usize,
}

/// Writes fragments unbuffered: every fragment is flushed as soon as it is written.
pub struct FragmentSink<W: Write> {
    out: W,
    state: StreamState,
    summary: StreamSummary,
}

impl<W: Write> FragmentSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: StreamState::Streaming,
            summary: StreamSummary::default(),
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn summary(&self) -> StreamSummary {
        self.summary
    }

    /// Write one fragment and flush it.
    pub fn write_fragment(&mut self, fragment: &str) -> std::io::Result<()> {
        if self.state == StreamState::Done {
            return Err(std::io::Error::other("fragment written after end of stream"));
        }
        self.out.write_all(fragment.as_bytes())?;
        self.out.flush()?;
        self.summary.fragments += 1;
        self.summary.bytes += fragment.len();
        Ok(())
    }

    /// Write the trailing newline and move to `Done`. A second call is a no-op.
    pub fn finish(&mut self) -> std::io::Result<()> {
        if self.state == StreamState::Done {
            return Ok(());
        }
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.state = StreamState::Done;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Adapt a provider chunk receiver into a stream of non-empty text fragments.
///
/// The stream ends at the provider's final chunk or when the sender goes
/// away; an error is yielded once and ends it too.
pub fn fragments(rx: ChunkReceiver) -> BoxStream<'static, std::result::Result<String, ProviderError>> {
    stream::unfold(Some(rx), |rx| async move {
        let mut rx = rx?;
        loop {
            match rx.recv().await? {
                Err(e) => return Some((Err(e), None)),
                Ok(chunk) => {
                    let text = chunk.content.filter(|c| !c.is_empty());
                    match (text, chunk.done) {
                        (Some(text), false) => return Some((Ok(text), Some(rx))),
                        (Some(text), true) => return Some((Ok(text), None)),
                        (None, true) => return None,
                        (None, false) => continue,
                    }
                }
            }
        }
    })
    .boxed()
}

/// Write every fragment of `fragments` to `out`, then a single newline.
///
/// On error, fragments already written stay written and no newline follows.
pub async fn relay<S, W>(mut fragments: S, out: W) -> Result<StreamSummary>
where
    S: Stream<Item = std::result::Result<String, ProviderError>> + Unpin,
    W: Write,
{
    let mut sink = FragmentSink::new(out);
    while let Some(fragment) = fragments.next().await {
        sink.write_fragment(&fragment?)?;
    }
    sink.finish()?;
    Ok(sink.summary())
}

/// Requests a streaming completion and relays it.
pub struct CompletionStreamer {
    provider: Arc<dyn Provider>,
    model: String,
}

impl CompletionStreamer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// The system message (context template) followed by the user prompt.
    pub fn messages(request: &PromptRequest) -> Vec<Message> {
        vec![
            Message::system(system_prompt(&request.context)),
            Message::user(request.prompt.clone()),
        ]
    }

    /// Stream the completion for `request` into `out`.
    pub async fn stream<W: Write>(&self, request: &PromptRequest, out: W) -> Result<StreamSummary> {
        let provider_request = ProviderRequest {
            model: self.model.clone(),
            messages: Self::messages(request),
        };

        debug!(provider = %self.provider.name(), model = %self.model, "Opening completion stream");
        let rx = self.provider.stream(provider_request).await?;
        let summary = relay(fragments(rx), out).await?;
        debug!(
            fragments = summary.fragments,
            bytes = summary.bytes,
            "Completion stream finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inferlog_core::error::Error;
    use inferlog_core::provider::StreamChunk;

    /// A writer that records every flush boundary.
    #[derive(Default)]
    struct FlushRecorder {
        buffer: Vec<u8>,
        flushed: Vec<String>,
    }

    impl Write for FlushRecorder {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.buffer.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.push(String::from_utf8_lossy(&self.buffer).into_owned());
            Ok(())
        }
    }

    fn fragment_stream(
        items: Vec<std::result::Result<&'static str, ProviderError>>,
    ) -> impl Stream<Item = std::result::Result<String, ProviderError>> + Unpin {
        stream::iter(items.into_iter().map(|i| i.map(String::from)))
    }

    #[tokio::test]
    async fn relays_fragments_then_newline() {
        let mut out = Vec::new();
        let summary = relay(fragment_stream(vec![Ok("Hello"), Ok(", "), Ok("world")]), &mut out)
            .await
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Hello, world\n");
        assert_eq!(summary.fragments, 3);
        assert_eq!(summary.bytes, 12);
    }

    #[tokio::test]
    async fn flushes_after_every_fragment() {
        let mut out = FlushRecorder::default();
        relay(fragment_stream(vec![Ok("a"), Ok("b")]), &mut out)
            .await
            .unwrap();
        assert_eq!(out.flushed, vec!["a", "ab", "ab\n"]);
    }

    #[tokio::test]
    async fn empty_stream_writes_only_newline() {
        let mut out = Vec::new();
        relay(fragment_stream(vec![]), &mut out).await.unwrap();
        assert_eq!(out, b"\n");
    }

    #[tokio::test]
    async fn mid_stream_error_keeps_written_fragments() {
        let mut out = Vec::new();
        let err = relay(
            fragment_stream(vec![
                Ok("partial"),
                Err(ProviderError::StreamInterrupted("reset".into())),
                Ok("never"),
            ]),
            &mut out,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Provider(ProviderError::StreamInterrupted(_))));
        assert_eq!(out, b"partial");
    }

    #[test]
    fn sink_moves_forward_only() {
        let mut sink = FragmentSink::new(Vec::new());
        assert_eq!(sink.state(), StreamState::Streaming);
        sink.write_fragment("x").unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.state(), StreamState::Done);

        sink.finish().unwrap();
        assert!(sink.write_fragment("y").is_err());
        assert_eq!(sink.into_inner(), b"x\n");
    }

    #[tokio::test]
    async fn fragments_stop_at_done_chunk() {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tx.send(Ok(StreamChunk::text("one"))).await.unwrap();
        tx.send(Ok(StreamChunk::text(""))).await.unwrap();
        tx.send(Ok(StreamChunk::default())).await.unwrap();
        tx.send(Ok(StreamChunk::text("two"))).await.unwrap();
        tx.send(Ok(StreamChunk::done())).await.unwrap();
        tx.send(Ok(StreamChunk::text("after done"))).await.unwrap();

        let collected: Vec<_> = fragments(rx).collect().await;
        let texts: Vec<String> = collected.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn fragments_end_when_sender_drops() {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tx.send(Ok(StreamChunk::text("only"))).await.unwrap();
        drop(tx);

        let collected: Vec<_> = fragments(rx).collect().await;
        assert_eq!(collected.len(), 1);
    }

    #[tokio::test]
    async fn fragments_end_after_error() {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tx.send(Err(ProviderError::Network("gone".into()))).await.unwrap();
        tx.send(Ok(StreamChunk::text("ignored"))).await.unwrap();

        let collected: Vec<_> = fragments(rx).collect().await;
        assert_eq!(collected.len(), 1);
        assert!(collected[0].is_err());
    }

    #[test]
    fn messages_are_system_then_user() {
        let request = PromptRequest::new("facts", "question?");
        let messages = CompletionStreamer::messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::system(system_prompt("facts")));
        assert_eq!(messages[1], Message::user("question?"));
    }
}
