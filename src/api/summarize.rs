use std::convert::Infallible;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::Stream;
use serde_json::json;
use tokio::sync::mpsc;

use crate::error::PipelineError;
use crate::models::SummarizeRequest;
use crate::pipeline::Publication;
use crate::session::DEFAULT_SESSION;
use crate::state::AppState;

const MAX_QUERY_LEN: usize = 500;

/// POST /api/summarize - Run a query and stream its publications as SSE.
///
/// A new request on the same session supersedes the previous one; the
/// superseded event stream simply ends.
pub async fn summarize(
    State(state): State<AppState>,
    Json(req): Json<SummarizeRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let query = req.query.trim().to_string();
    if query.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            PipelineError::InvalidQuery.to_string(),
        ));
    }
    if query.len() > MAX_QUERY_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Query exceeds {MAX_QUERY_LEN} bytes"),
        ));
    }

    let session_id = req
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());
    let handle = state.sessions.handle_for(&session_id);

    let (mut tx, rx) = mpsc::unbounded_channel::<Publication>();
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        if let Err(e) = pipeline.submit_query(&handle, &query, &mut tx).await {
            tracing::debug!("Query on session {session_id} ended with: {e}");
        }
    });

    // Ends when the pipeline task drops its sender
    let events = futures_util::stream::unfold(rx, |mut rx| async move {
        let publication = rx.recv().await?;
        let event: Result<Event, Infallible> = Ok(publication_event(&publication));
        Some((event, rx))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Render a publication as an SSE event.
pub fn publication_event(publication: &Publication) -> Event {
    let (name, payload) = publication_payload(publication);
    Event::default().event(name).data(payload.to_string())
}

/// SSE event name and JSON body for a publication.
pub fn publication_payload(publication: &Publication) -> (&'static str, serde_json::Value) {
    match publication {
        Publication::Cleared => ("cleared", json!({})),
        Publication::Results(records) => ("results", json!({ "results": records })),
        Publication::NoDocuments(message) => ("no_documents", json!({ "message": message })),
        Publication::NoResults => ("no_results", json!({})),
        Publication::Failed(e) => ("error", json!(e.to_payload())),
        Publication::Finished => ("done", json!({})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Party, ProductRef, RecordType, ResultRecord};

    #[test]
    fn test_results_payload_carries_records() {
        let record = ResultRecord {
            record_type: Some(RecordType::Product),
            id: "p1".into(),
            date: String::new(),
            advisor: Party::default(),
            client: Party::default(),
            product: ProductRef::default(),
            summary: "x".into(),
            topics: vec![],
            actions: vec![],
            raw_text: None,
        };
        let (name, payload) = publication_payload(&Publication::Results(vec![record]));
        assert_eq!(name, "results");
        assert_eq!(payload["results"][0]["id"], "p1");
        assert_eq!(payload["results"][0]["type"], "product");
    }

    #[test]
    fn test_parse_failure_payload_carries_raw_text() {
        let (name, payload) = publication_payload(&Publication::Failed(PipelineError::Parse {
            message: "bad".into(),
            raw_text: "[{oops".into(),
        }));
        assert_eq!(name, "error");
        assert_eq!(payload["kind"], "parse");
        assert_eq!(payload["raw_text"], "[{oops");
    }

    #[test]
    fn test_no_documents_payload_message() {
        let (name, payload) =
            publication_payload(&Publication::NoDocuments("No documents found".into()));
        assert_eq!(name, "no_documents");
        assert_eq!(payload["message"], "No documents found");
    }

    #[test]
    fn test_lifecycle_event_names() {
        assert_eq!(publication_payload(&Publication::Cleared).0, "cleared");
        assert_eq!(publication_payload(&Publication::NoResults).0, "no_results");
        assert_eq!(publication_payload(&Publication::Finished).0, "done");
    }
}
