use std::time::Duration;

use futures_util::stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::models::StreamState;
use crate::reconcile::{Reconciled, Reconciler};

/// Drain a completion stream through a fresh [`Reconciler`].
///
/// Every chunk is appended to the accumulator and reconciled with
/// `finished = false`; outcomes other than `Unchanged` go to `on_update`.
/// When the stream ends normally one final pass runs with `finished = true`.
///
/// Cancellation wins over any chunk that is ready at the same time, and a
/// cancelled run never reaches the finished pass. A transport error or an
/// idle gap longer than `idle_timeout` ends the run with
/// `PipelineError::Stream`.
pub async fn consume_stream<S, F>(
    mut chunks: S,
    cancel: &CancellationToken,
    idle_timeout: Option<Duration>,
    mut on_update: F,
) -> Result<StreamState, PipelineError>
where
    S: Stream<Item = anyhow::Result<String>> + Unpin,
    F: FnMut(Reconciled),
{
    let mut state = StreamState::default();
    let mut reconciler = Reconciler::new();

    loop {
        let next = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),

            next = next_chunk(&mut chunks, idle_timeout) => next,
        };

        // A chunk can land in the same wakeup as the cancellation
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        match next? {
            Some(chunk) => {
                state.push_chunk(&chunk);
                match reconciler.reconcile(&state) {
                    Reconciled::Unchanged => {}
                    outcome => on_update(outcome),
                }
            }
            None => break,
        }
    }

    state.finish();
    match reconciler.reconcile(&state) {
        Reconciled::Unchanged => {}
        outcome => on_update(outcome),
    }
    Ok(state)
}

async fn next_chunk<S>(
    chunks: &mut S,
    idle_timeout: Option<Duration>,
) -> Result<Option<String>, PipelineError>
where
    S: Stream<Item = anyhow::Result<String>> + Unpin,
{
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, chunks.next())
            .await
            .map_err(|_| PipelineError::Stream("LLM response timed out (idle)".to_string()))?,
        None => chunks.next().await,
    };

    match next {
        Some(Ok(chunk)) => Ok(Some(chunk)),
        Some(Err(e)) => Err(PipelineError::Stream(format!("{e:#}"))),
        None => Ok(None),
    }
}
