//! # search-digest
//!
//! A Rust service that runs a query against a remote document-search
//! endpoint, asks an LLM to summarize the hits as a JSON array, and streams
//! the structured results back while the model is still writing.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────┐
//!                  │  User Query  │
//!                  └──────┬───────┘
//!                         │  ActiveRequestHandle::begin
//!                         │  (cancels the session's previous query)
//!                         ▼
//!              ┌─────────────────────┐
//!              │   Search Gateway    │── zero hits ──▶ "No documents found"
//!              │ GET /search?q=&k=   │── failure ────▶ NetworkError
//!              └──────────┬──────────┘
//!                         │ raw hits
//!                         ▼
//!              ┌─────────────────────┐
//!              │   Prompt Builder    │
//!              │ strict JSON-array   │
//!              └──────────┬──────────┘
//!                         │ prompt
//!                         ▼
//!              ┌─────────────────────┐
//!              │ Completion Consumer │
//!              │ Ollama / OpenAI SSE │
//!              └──────────┬──────────┘
//!                         │ accumulated text, per chunk
//!                         ▼
//!              ┌─────────────────────┐
//!              │     Reconciler      │
//!              │ fences → probe →    │
//!              │ parse → validate    │
//!              └──────────┬──────────┘
//!                         │ Results / NoResults / ParseError
//!                         ▼
//!              ┌─────────────────────┐
//!              │  Publication sink   │
//!              │  (SSE to client)    │
//!              └─────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, search backend and LLM
//! - [`models`] - Shared data types: `SearchHit`, `ResultRecord`, `StreamState`
//! - [`error`] - Per-query error taxonomy
//! - [`search::gateway`] - HTTP client for the remote search endpoint
//! - [`llm::prompt`] - Summarization prompt template
//! - [`llm::chat_stream`] - Streaming completions from Ollama or OpenAI-compatible APIs
//! - [`llm::consumer`] - Drives a completion stream through the reconciler
//! - [`reconcile`] - Incremental reconciliation of streamed JSON
//! - [`session`] - Per-session cancellation handles
//! - [`pipeline`] - One query end to end, emitting publications
//! - [`export`] - Dated JSON export of result lists
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod reconcile;
pub mod search;
pub mod session;
pub mod state;
