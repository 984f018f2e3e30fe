use std::time::Duration;

use async_trait::async_trait;

use crate::config::{LlmConfig, SearchConfig};
use crate::error::PipelineError;
use crate::llm::chat_stream::{stream_completion, ChunkStream};
use crate::models::SearchOutcome;
use crate::search::gateway;

/// Source of raw search hits.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchOutcome, PipelineError>;
}

/// Source of streamed completion text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn open_stream(&self, prompt: &str) -> Result<ChunkStream, PipelineError>;

    /// Longest tolerated gap between chunks; `None` leaves it to the transport.
    fn idle_timeout(&self) -> Option<Duration> {
        None
    }
}

/// [`SearchBackend`] over the remote `/search` endpoint.
#[derive(Clone)]
pub struct HttpSearchBackend {
    client: reqwest::Client,
    config: SearchConfig,
}

impl HttpSearchBackend {
    pub fn new(client: reqwest::Client, config: SearchConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, query: &str) -> Result<SearchOutcome, PipelineError> {
        gateway::search(&self.client, &self.config, query).await
    }
}

/// [`CompletionBackend`] over Ollama or an OpenAI-compatible API.
#[derive(Clone)]
pub struct HttpCompletionBackend {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpCompletionBackend {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    async fn open_stream(&self, prompt: &str) -> Result<ChunkStream, PipelineError> {
        stream_completion(&self.client, &self.config, prompt)
            .await
            .map_err(|e| PipelineError::Stream(format!("{e:#}")))
    }

    fn idle_timeout(&self) -> Option<Duration> {
        match self.config.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
