use serde::Serialize;
use thiserror::Error;

/// Failure modes of a single query. None of them outlive the query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Query is required")]
    InvalidQuery,

    #[error("Search request failed: {0}")]
    Network(String),

    #[error("No documents found")]
    EmptyResult,

    #[error("Query was cancelled")]
    Cancelled,

    #[error("Completion stream failed: {0}")]
    Stream(String),

    #[error("Model response is not a valid result list: {message}")]
    Parse { message: String, raw_text: String },
}

impl PipelineError {
    /// Stable identifier used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidQuery => "invalid_query",
            Self::Network(_) => "network",
            Self::EmptyResult => "empty_result",
            Self::Cancelled => "cancelled",
            Self::Stream(_) => "stream",
            Self::Parse { .. } => "parse",
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let raw_text = match self {
            Self::Parse { raw_text, .. } => Some(raw_text.clone()),
            _ => None,
        };
        ErrorPayload {
            kind: self.kind(),
            message: self.to_string(),
            raw_text,
        }
    }
}

/// Body of the SSE `error` event
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}
