//! One query, end to end: search, prompt, stream, reconcile, publish.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::{CompletionBackend, SearchBackend};
use crate::error::PipelineError;
use crate::llm::consumer::consume_stream;
use crate::llm::prompt::build_summary_prompt;
use crate::models::{ResultRecord, SearchOutcome};
use crate::reconcile::Reconciled;
use crate::session::{ActiveRequestHandle, RequestTicket};

/// Message shown when the search returns nothing.
pub const NO_DOCUMENTS_MESSAGE: &str = "No documents found";

/// A state update for the presentation surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Publication {
    /// Previous results are void; a new query has started.
    Cleared,
    /// Replace the visible result list.
    Results(Vec<ResultRecord>),
    /// The search found nothing; the model was not called.
    NoDocuments(String),
    /// The model answered but summarized no document.
    NoResults,
    Failed(PipelineError),
    /// No further publications follow for this query.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Receiver side of publications.
pub trait PublicationSink {
    fn publish(&mut self, publication: Publication) -> Result<(), SinkClosed>;
}

impl PublicationSink for Vec<Publication> {
    fn publish(&mut self, publication: Publication) -> Result<(), SinkClosed> {
        self.push(publication);
        Ok(())
    }
}

impl PublicationSink for mpsc::UnboundedSender<Publication> {
    fn publish(&mut self, publication: Publication) -> Result<(), SinkClosed> {
        self.send(publication).map_err(|_| SinkClosed)
    }
}

/// Publish only while `ticket` is current. A closed sink cancels the ticket.
///
/// A cancel from another thread can land between the check and the send,
/// letting one publication through on this query's own sink. The ticket is
/// checked again after sending so the caller stops there; the superseding
/// query publishes to a different sink and never sees it.
fn emit(ticket: &RequestTicket, sink: &mut impl PublicationSink, publication: Publication) -> bool {
    if !ticket.is_current() {
        return false;
    }
    if sink.publish(publication).is_err() {
        tracing::info!(query_id = %ticket.query_id(), "Publication sink closed, cancelling query");
        ticket.cancel();
        return false;
    }
    ticket.is_current()
}

/// Search and completion backends shared by all queries.
#[derive(Clone)]
pub struct QueryPipeline {
    search: Arc<dyn SearchBackend>,
    completion: Arc<dyn CompletionBackend>,
}

impl QueryPipeline {
    pub fn new(search: Arc<dyn SearchBackend>, completion: Arc<dyn CompletionBackend>) -> Self {
        Self { search, completion }
    }

    /// Run one query on `handle`, superseding whatever was in flight there.
    ///
    /// Publishes `Cleared` first and `Finished` last unless the query is
    /// cancelled, in which case it goes quiet immediately. The returned
    /// error mirrors the terminal publication; `EmptyResult` is benign.
    pub async fn submit_query(
        &self,
        handle: &ActiveRequestHandle,
        query: &str,
        sink: &mut impl PublicationSink,
    ) -> Result<(), PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::InvalidQuery);
        }

        let ticket = handle.begin();
        tracing::info!(query_id = %ticket.query_id(), "Query started: {query}");

        let result = self.run(&ticket, query, sink).await;

        match &result {
            Err(PipelineError::Cancelled) => {
                tracing::info!(query_id = %ticket.query_id(), "Query cancelled");
            }
            Err(PipelineError::EmptyResult) | Ok(()) => {
                emit(&ticket, sink, Publication::Finished);
                tracing::info!(query_id = %ticket.query_id(), "Query finished");
            }
            Err(e) => {
                emit(&ticket, sink, Publication::Failed(e.clone()));
                emit(&ticket, sink, Publication::Finished);
                tracing::warn!(query_id = %ticket.query_id(), "Query failed: {e}");
            }
        }

        handle.release(&ticket);
        result
    }

    async fn run(
        &self,
        ticket: &RequestTicket,
        query: &str,
        sink: &mut impl PublicationSink,
    ) -> Result<(), PipelineError> {
        if !emit(ticket, sink, Publication::Cleared) {
            return Err(PipelineError::Cancelled);
        }

        // ── Step 1: Search ───────────────────────────────────
        let outcome = tokio::select! {
            biased;
            _ = ticket.token().cancelled() => return Err(PipelineError::Cancelled),
            outcome = self.search.search(query) => outcome?,
        };

        let hits = match outcome {
            SearchOutcome::Empty => {
                tracing::info!(query_id = %ticket.query_id(), "Search returned no documents");
                emit(
                    ticket,
                    sink,
                    Publication::NoDocuments(NO_DOCUMENTS_MESSAGE.to_string()),
                );
                return Err(PipelineError::EmptyResult);
            }
            SearchOutcome::Hits(hits) => hits,
        };
        tracing::info!(query_id = %ticket.query_id(), "Search returned {} hits", hits.len());

        // ── Step 2: Prompt and open the stream ───────────────
        let prompt = build_summary_prompt(query, &hits);
        let chunks = tokio::select! {
            biased;
            _ = ticket.token().cancelled() => return Err(PipelineError::Cancelled),
            chunks = self.completion.open_stream(&prompt) => chunks?,
        };

        // ── Step 3: Reconcile as chunks arrive ───────────────
        let mut terminal = None;
        consume_stream(
            chunks,
            ticket.token(),
            self.completion.idle_timeout(),
            |outcome| {
                let publication = match outcome {
                    Reconciled::Unchanged => return,
                    Reconciled::Results(records) => Publication::Results(records),
                    Reconciled::NoResults => Publication::NoResults,
                    Reconciled::Failed(e) => {
                        terminal = Some(e);
                        return;
                    }
                };
                emit(ticket, sink, publication);
            },
        )
        .await?;

        match terminal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
