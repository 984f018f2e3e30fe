use anyhow::{Context, Result};
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

use crate::config::LlmConfig;

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Narrow view of a provider chunk: the text it contributes, if any.
///
/// Each provider's wire type implements this once; nothing past the line
/// parsers needs to know which provider produced a chunk.
pub trait ChunkText {
    fn chunk_text(&self) -> Option<&str>;
}

/// Open a streaming completion for a single user prompt.
/// Returns a stream of content delta strings (one per token/chunk).
pub async fn stream_completion(
    client: &reqwest::Client,
    config: &LlmConfig,
    prompt: &str,
) -> Result<ChunkStream> {
    let messages = vec![StreamMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
    }];
    match config.provider.as_str() {
        "ollama" => stream_ollama(client, config, messages).await,
        "openai" => stream_openai(client, config, messages).await,
        other => anyhow::bail!("Unsupported LLM provider for completion: {other}"),
    }
}

fn text_of(chunk: &impl ChunkText) -> Option<Result<String>> {
    chunk
        .chunk_text()
        .filter(|text| !text.is_empty())
        .map(|text| Ok(text.to_string()))
}

// ─── Ollama streaming ────────────────────────────────────

#[derive(Serialize)]
struct OllamaStreamRequest {
    model: String,
    messages: Vec<StreamMessage>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct StreamMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OllamaStreamChunk {
    message: StreamMessage,
    done: bool,
}

impl ChunkText for OllamaStreamChunk {
    fn chunk_text(&self) -> Option<&str> {
        if self.done {
            return None;
        }
        Some(self.message.content.as_str())
    }
}

async fn stream_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: Vec<StreamMessage>,
) -> Result<ChunkStream> {
    let url = format!("{}/api/chat", config.base_url);

    let req = OllamaStreamRequest {
        model: config.chat_model.clone(),
        messages,
        stream: true,
    };

    let resp = client
        .post(&url)
        .timeout(Duration::from_secs(300))
        .json(&req)
        .send()
        .await
        .context("Failed to connect to Ollama for completion streaming")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama chat API returned {status}: {body}");
    }

    let stream = stream_lines(resp.bytes_stream()).filter_map(|line_result| async move {
        match line_result {
            Ok(line) => parse_ollama_line(&line),
            Err(e) => Some(Err(e)),
        }
    });

    Ok(Box::pin(stream))
}

/// Parse a single Ollama streaming line. Returns:
/// - Some(Ok(content)) for content deltas
/// - Some(Err(e)) for parse errors
/// - None to skip (empty content or done signal)
fn parse_ollama_line(line: &str) -> Option<Result<String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<OllamaStreamChunk>(line) {
        Ok(chunk) => text_of(&chunk),
        Err(e) => Some(Err(anyhow::anyhow!("Failed to parse Ollama chunk: {e}"))),
    }
}

// ─── OpenAI streaming ────────────────────────────────────

#[derive(Serialize)]
struct OpenAiStreamRequest {
    model: String,
    messages: Vec<StreamMessage>,
    stream: bool,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

impl ChunkText for OpenAiStreamChunk {
    fn chunk_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
    }
}

async fn stream_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: Vec<StreamMessage>,
) -> Result<ChunkStream> {
    let url = format!("{}/v1/chat/completions", config.base_url);

    let req = OpenAiStreamRequest {
        model: config.chat_model.clone(),
        messages,
        stream: true,
        temperature: 0.2,
    };

    let resp = client
        .post(&url)
        .timeout(Duration::from_secs(300))
        .header(
            "Authorization",
            format!("Bearer {}", config.api_key.as_deref().unwrap_or("")),
        )
        .json(&req)
        .send()
        .await
        .context("Failed to connect to OpenAI for completion streaming")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI chat API returned {status}: {body}");
    }

    let stream = stream_lines(resp.bytes_stream()).filter_map(|line_result| async move {
        match line_result {
            Ok(line) => parse_openai_line(&line),
            Err(e) => Some(Err(e)),
        }
    });

    Ok(Box::pin(stream))
}

/// Parse a single OpenAI SSE line. Returns:
/// - Some(Ok(content)) for content deltas
/// - Some(Err(e)) for parse errors
/// - None to skip (empty lines, [DONE], role-only chunks)
fn parse_openai_line(line: &str) -> Option<Result<String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let data = line.strip_prefix("data:")?.trim();

    if data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(chunk) => text_of(&chunk),
        Err(e) => Some(Err(anyhow::anyhow!("Failed to parse OpenAI chunk: {e}"))),
    }
}

// ─── Line buffering ──────────────────────────────────────

/// Convert a byte stream into a stream of complete lines.
///
/// Bytes are buffered until a newline arrives so multi-byte characters
/// split across network reads are decoded intact.
pub(crate) fn stream_lines<E>(
    byte_stream: impl Stream<Item = std::result::Result<bytes::Bytes, E>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send
where
    E: std::fmt::Display + Send + 'static,
{
    futures_util::stream::unfold(
        (Box::pin(byte_stream.fuse()), Vec::<u8>::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                if let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line_bytes: Vec<u8> = buffer.drain(..=newline_pos).collect();
                    let line = String::from_utf8_lossy(&line_bytes).trim_end().to_string();
                    if !line.trim().is_empty() {
                        return Some((Ok(line), (stream, buffer)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        return Some((
                            Err(anyhow::anyhow!("Stream read error: {e}")),
                            (stream, buffer),
                        ));
                    }
                    None => {
                        // Stream ended: emit remaining buffer if non-empty
                        let remaining = String::from_utf8_lossy(&buffer).to_string();
                        buffer.clear();
                        if !remaining.trim().is_empty() {
                            return Some((Ok(remaining), (stream, buffer)));
                        }
                        return None;
                    }
                }
            }
        },
    )
}
