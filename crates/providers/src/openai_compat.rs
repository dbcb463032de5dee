//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI and any endpoint exposing an OpenAI-compatible
//! `/chat/completions` route with SSE streaming (OpenRouter, vLLM, Ollama,
//! Together AI, ...).

use async_trait::async_trait;
use futures::StreamExt;
use inferlog_core::error::ProviderError;
use inferlog_core::provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk};
use serde::Deserialize;
use tokio::sync::mpsc::Sender;
use tracing::{debug, warn};

use crate::sse::{LineBuffer, data_payload};

/// Client name recorded as `event_tools` in audit events.
pub const OPENAI_CLIENT_NAME: &str = "OpenAI";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// An OpenAI-compatible streaming chat-completion provider.
///
/// No request timeout is set; a stalled stream waits on the transport.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a provider for the OpenAI API (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new(OPENAI_CLIENT_NAME, OPENAI_BASE_URL, api_key)
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "stream": true,
        })
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let error_body = response.text().await.unwrap_or_default();
            let mut message = api_error_message(&error_body);
            if let Some(secs) = retry_after {
                message = format!("{message} (retry after {secs}s)");
            }
            return Err(ProviderError::RateLimited { message });
        }

        if status == 401 || status == 403 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::AuthenticationFailed(api_error_message(&error_body)));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: api_error_message(&error_body),
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream and forward fragments in arrival order
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(ProviderError::StreamInterrupted(e.to_string()))).await;
                        return;
                    }
                };

                for line in lines.push(&bytes) {
                    if forward_line(&line, &tx, &provider_name).await == Flow::Stop {
                        return;
                    }
                }
            }

            if let Some(line) = lines.finish() {
                if forward_line(&line, &tx, &provider_name).await == Flow::Stop {
                    return;
                }
            }

            // Stream ended without [DONE]
            let _ = tx.send(Ok(StreamChunk::done())).await;
        });

        Ok(rx)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Handle one SSE line. `Stop` once the stream is finished or the receiver is gone.
async fn forward_line(
    line: &str,
    tx: &Sender<Result<StreamChunk, ProviderError>>,
    provider_name: &str,
) -> Flow {
    let Some(data) = data_payload(line) else {
        return Flow::Continue;
    };

    // "[DONE]" signals end of stream
    if data == "[DONE]" {
        let _ = tx.send(Ok(StreamChunk::done())).await;
        return Flow::Stop;
    }

    let parsed = match serde_json::from_str::<StreamResponse>(data) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(provider = %provider_name, data = %data, "Malformed SSE chunk");
            let _ = tx
                .send(Err(ProviderError::StreamInterrupted(format!("invalid stream chunk: {e}"))))
                .await;
            return Flow::Stop;
        }
    };

    if let Some(error) = parsed.error {
        let _ = tx.send(Err(ProviderError::StreamInterrupted(error.message))).await;
        return Flow::Stop;
    }

    for fragment in parsed.fragments() {
        if tx.send(Ok(StreamChunk::text(fragment))).await.is_err() {
            return Flow::Stop; // receiver dropped
        }
    }

    Flow::Continue
}

/// Pull `error.message` out of an OpenAI error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

impl StreamResponse {
    /// Non-empty content deltas of every choice, in order.
    fn fragments(self) -> impl Iterator<Item = String> {
        self.choices
            .into_iter()
            .filter_map(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use inferlog_core::message::Message;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Message::system("ctx"), Message::user("hi")],
        }
    }

    fn sse_body(fragments: &[&str]) -> String {
        let mut body = String::new();
        for f in fragments {
            let chunk = serde_json::json!({
                "choices": [{"index": 0, "delta": {"content": f}, "finish_reason": null}]
            });
            body.push_str(&format!("data: {chunk}\n\n"));
        }
        body.push_str("data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n");
        body.push_str("data: [DONE]\n\n");
        body
    }

    async fn collect(mut rx: ChunkReceiver) -> (Vec<String>, Option<ProviderError>) {
        let mut fragments = Vec::new();
        while let Some(item) = rx.recv().await {
            match item {
                Ok(chunk) if chunk.done => break,
                Ok(chunk) => fragments.extend(chunk.content),
                Err(e) => return (fragments, Some(e)),
            }
        }
        (fragments, None)
    }

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test");
        assert_eq!(provider.name(), "OpenAI");
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn strips_trailing_slash() {
        let provider = OpenAiCompatProvider::new("local", "http://localhost:8000/v1/", "k");
        assert_eq!(provider.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn request_body_shape() {
        let body = OpenAiCompatProvider::request_body(&request());
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_stream_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.fragments().collect::<Vec<_>>(), vec!["Hello"]);
    }

    #[test]
    fn parse_stream_finish_chunk() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.fragments().count(), 0);
    }

    #[test]
    fn parse_stream_usage_only_chunk() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.fragments().count(), 0);
    }

    #[test]
    fn multiple_choices_emit_in_order() {
        let data = r#"{"choices":[{"index":0,"delta":{"content":"a"}},{"index":1,"delta":{"content":"b"}}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.fragments().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn error_message_extraction() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(api_error_message(body), "Incorrect API key provided");
        assert_eq!(api_error_message("  plain text  "), "plain text");
    }

    // --- HTTP tests ---

    #[tokio::test]
    async fn streams_fragments_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o-mini", "stream": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(&["Hello", ", ", "world"]), "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new("OpenAI", server.uri(), "sk-test");
        let rx = provider.stream(request()).await.unwrap();
        let (fragments, err) = collect(rx).await;

        assert!(err.is_none());
        assert_eq!(fragments, vec!["Hello", ", ", "world"]);
    }

    #[tokio::test]
    async fn stream_without_done_still_terminates() {
        let server = MockServer::start().await;
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new("OpenAI", server.uri(), "k");
        let mut rx = provider.stream(request()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().unwrap(), StreamChunk::text("partial"));
        assert!(rx.recv().await.unwrap().unwrap().done);
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string(
                r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
            ))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new("OpenAI", server.uri(), "bad");
        let err = provider.stream(request()).await.unwrap_err();
        match err {
            ProviderError::AuthenticationFailed(msg) => assert!(msg.contains("Incorrect API key")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn quota_exhaustion_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "20")
                    .set_body_string(r#"{"error":{"message":"You exceeded your current quota"}}"#),
            )
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new("OpenAI", server.uri(), "k");
        let err = provider.stream(request()).await.unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
        assert!(text.contains("exceeded your current quota"));
        assert!(text.contains("retry after 20s"));
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new("OpenAI", server.uri(), "k");
        match provider.stream(request()).await.unwrap_err() {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn in_band_error_interrupts_stream() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"server overloaded\"}}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new("OpenAI", server.uri(), "k");
        let rx = provider.stream(request()).await.unwrap();
        let (fragments, err) = collect(rx).await;

        assert_eq!(fragments, vec!["Hel"]);
        assert!(matches!(err, Some(ProviderError::StreamInterrupted(m)) if m == "server overloaded"));
    }

    #[tokio::test]
    async fn malformed_chunk_interrupts_stream() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\", wor\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ld\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new("OpenAI", server.uri(), "k");
        let mut rx = provider.stream(request()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().unwrap(), StreamChunk::text("Hello"));
        match rx.recv().await.unwrap() {
            Err(ProviderError::StreamInterrupted(m)) => assert!(m.starts_with("invalid stream chunk")),
            other => panic!("unexpected item: {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        // Nothing listens on port 9 (discard) in the test environment
        let provider = OpenAiCompatProvider::new("OpenAI", "http://127.0.0.1:9/v1", "k");
        let err = provider.stream(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
    }
}
