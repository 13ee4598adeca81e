use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::models::{ModelSpec, Provider};

/// Events emitted during a streaming completion.
#[derive(Debug, Clone)]
pub enum LlmEvent {
    /// Text fragment from the streaming response.
    TextDelta(String),
    /// Stream ran to its end-of-stream signal.
    StreamComplete,
    /// Remote call failed; fatal to the current turn only.
    Error(String),
}

/// Role/content pair on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

/// Outbound streaming completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub spec: ModelSpec,
    pub messages: Vec<WireMessage>,
    pub max_tokens: u32,
}

/// Streaming client for the hosted completion providers.
#[derive(Clone)]
pub struct LlmClient {
    config: Config,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { config, http })
    }

    /// Start a streaming completion. Fragments arrive on the returned
    /// channel; the stream ends with either `StreamComplete` or `Error`.
    pub async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<mpsc::Receiver<LlmEvent>> {
        let api_key = self.config.require_api_key(request.spec.provider)?;
        let (tx, rx) = mpsc::channel(256);

        debug!(
            provider = request.spec.provider.as_str(),
            model = request.spec.model,
            messages = request.messages.len(),
            "starting streaming completion"
        );

        let http = self.http.clone();
        let tx_err = tx.clone();
        tokio::spawn(async move {
            let result = match request.spec.provider {
                Provider::OpenAi => stream_openai(http, api_key, request, tx).await,
                Provider::Anthropic => stream_anthropic(http, api_key, request, tx).await,
            };
            if let Err(e) = result {
                let _ = tx_err.send(LlmEvent::Error(format!("{e:#}"))).await;
            }
        });

        Ok(rx)
    }
}

/// Stream from the OpenAI chat-completions API.
async fn stream_openai(
    http: reqwest::Client,
    api_key: String,
    request: CompletionRequest,
    tx: mpsc::Sender<LlmEvent>,
) -> Result<()> {
    let payload = serde_json::json!({
        "model": request.spec.model,
        "messages": request.messages,
        "stream": true,
        "max_tokens": request.max_tokens,
    });

    let response = http
        .post("https://api.openai.com/v1/chat/completions")
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&payload)
        .send()
        .await
        .context("OpenAI request failed")?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(anyhow!("OpenAI API error: HTTP {status}: {error_text}"));
    }

    process_sse_stream(response, tx, parse_openai_data).await
}

/// Stream from the Anthropic messages API. The system-role entry is lifted
/// out of the message list into the top-level `system` field.
async fn stream_anthropic(
    http: reqwest::Client,
    api_key: String,
    request: CompletionRequest,
    tx: mpsc::Sender<LlmEvent>,
) -> Result<()> {
    let mut system = String::new();
    let mut messages = Vec::new();
    for msg in request.messages {
        if msg.role == "system" {
            system = msg.content;
        } else {
            messages.push(serde_json::json!({
                "role": msg.role,
                "content": msg.content,
            }));
        }
    }

    let payload = serde_json::json!({
        "model": request.spec.model,
        "messages": messages,
        "system": system,
        "stream": true,
        "max_tokens": request.max_tokens,
    });

    let response = http
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", api_key)
        .header("Content-Type", "application/json")
        .header("anthropic-version", "2023-06-01")
        .json(&payload)
        .send()
        .await
        .context("Anthropic request failed")?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(anyhow!("Anthropic API error: HTTP {status}: {error_text}"));
    }

    process_sse_stream(response, tx, parse_anthropic_data).await
}

/// What a single SSE `data:` payload contributed to the response.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SsePayload {
    Delta(String),
    Done,
    Ignore,
}

/// Forward SSE data payloads as `TextDelta` events until the provider's
/// end-of-stream marker, then emit `StreamComplete` exactly once.
async fn process_sse_stream(
    response: reqwest::Response,
    tx: mpsc::Sender<LlmEvent>,
    parse: fn(&str) -> SsePayload,
) -> Result<()> {
    let mut stream = response.bytes_stream();
    let mut buffer = SseLineBuffer::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("network error mid-stream")?;
        for data in buffer.push(&String::from_utf8_lossy(&chunk)) {
            match parse(&data) {
                SsePayload::Delta(text) => {
                    let _ = tx.send(LlmEvent::TextDelta(text)).await;
                }
                SsePayload::Done => {
                    let _ = tx.send(LlmEvent::StreamComplete).await;
                    return Ok(());
                }
                SsePayload::Ignore => {}
            }
        }
    }

    // Flush a final line that arrived without a trailing newline.
    if let Some(data) = buffer.flush() {
        if let SsePayload::Delta(text) = parse(&data) {
            let _ = tx.send(LlmEvent::TextDelta(text)).await;
        }
    }

    let _ = tx.send(LlmEvent::StreamComplete).await;
    Ok(())
}

/// Accumulates raw stream chunks and yields complete `data:` payloads.
/// Chunk boundaries fall anywhere, including inside a line.
struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut out = Vec::new();

        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim().to_string();
            self.buffer = self.buffer[newline_pos + 1..].to_string();
            if let Some(data) = Self::data_payload(&line) {
                out.push(data);
            }
        }

        out
    }

    fn flush(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        Self::data_payload(line.trim())
    }

    fn data_payload(line: &str) -> Option<String> {
        let rest = line.strip_prefix("data:")?;
        Some(rest.strip_prefix(' ').unwrap_or(rest).to_string())
    }
}

/// OpenAI SSE data: `choices[0].delta.content` fragments, terminated by a
/// literal `[DONE]` payload.
fn parse_openai_data(data: &str) -> SsePayload {
    if data == "[DONE]" {
        return SsePayload::Done;
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(data) else {
        return SsePayload::Ignore;
    };
    let delta = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str());

    match delta {
        Some(text) => SsePayload::Delta(text.to_string()),
        None => SsePayload::Ignore,
    }
}

/// Anthropic SSE data: typed events; `content_block_delta` carries text,
/// `message_stop` ends the stream.
fn parse_anthropic_data(data: &str) -> SsePayload {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(data) else {
        return SsePayload::Ignore;
    };

    match value.get("type").and_then(|t| t.as_str()) {
        Some("message_stop") => SsePayload::Done,
        Some("content_block_delta") => {
            let text = value
                .get("delta")
                .and_then(|delta| delta.get("text"))
                .and_then(|text| text.as_str());
            match text {
                Some(text) => SsePayload::Delta(text.to_string()),
                None => SsePayload::Ignore,
            }
        }
        _ => SsePayload::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_handles_split_chunks() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push("data: {\"a\":").is_empty());
        let lines = buffer.push("1}\ndata: [DONE]\n");
        assert_eq!(lines, vec!["{\"a\":1}".to_string(), "[DONE]".to_string()]);
    }

    #[test]
    fn line_buffer_ignores_non_data_lines() {
        let mut buffer = SseLineBuffer::new();
        let lines = buffer.push("event: message_start\n\ndata: {}\n");
        assert_eq!(lines, vec!["{}".to_string()]);
    }

    #[test]
    fn line_buffer_flushes_trailing_line() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push("data: tail").is_empty());
        assert_eq!(buffer.flush(), Some("tail".to_string()));
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn openai_delta_and_done() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_openai_data(data), SsePayload::Delta("Hel".to_string()));
        assert_eq!(parse_openai_data("[DONE]"), SsePayload::Done);
        assert_eq!(
            parse_openai_data(r#"{"choices":[{"delta":{}}]}"#),
            SsePayload::Ignore
        );
    }

    #[test]
    fn anthropic_delta_and_stop() {
        let data = r#"{"type":"content_block_delta","delta":{"type":"text_delta","text":"lo"}}"#;
        assert_eq!(parse_anthropic_data(data), SsePayload::Delta("lo".to_string()));
        assert_eq!(
            parse_anthropic_data(r#"{"type":"message_stop"}"#),
            SsePayload::Done
        );
        assert_eq!(
            parse_anthropic_data(r#"{"type":"ping"}"#),
            SsePayload::Ignore
        );
    }

    #[test]
    fn malformed_json_is_ignored() {
        assert_eq!(parse_openai_data("{not json"), SsePayload::Ignore);
        assert_eq!(parse_anthropic_data("{not json"), SsePayload::Ignore);
    }
}
