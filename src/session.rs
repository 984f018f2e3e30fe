use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Session id used when a client does not send one.
pub const DEFAULT_SESSION: &str = "default";

/// Idle sessions are pruned once the registry grows past this many entries.
/// A handle still held outside the registry is never idle, even before its
/// first `begin()`.
const PRUNE_THRESHOLD: usize = 256;

/// One query's claim on an [`ActiveRequestHandle`].
///
/// A ticket stays current until it is cancelled, either explicitly or by a
/// newer ticket taking its place.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    query_id: Uuid,
    token: CancellationToken,
}

impl RequestTicket {
    fn new() -> Self {
        Self {
            query_id: Uuid::new_v4(),
            token: CancellationToken::new(),
        }
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Holds the single in-flight query of a session.
#[derive(Debug, Default)]
pub struct ActiveRequestHandle {
    current: Mutex<Option<RequestTicket>>,
}

impl ActiveRequestHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new query, cancelling whichever one was in flight.
    pub fn begin(&self) -> RequestTicket {
        let ticket = RequestTicket::new();
        let previous = self.current.lock().replace(ticket.clone());
        if let Some(previous) = previous {
            if previous.is_current() {
                tracing::info!(
                    superseded = %previous.query_id(),
                    by = %ticket.query_id(),
                    "Cancelling superseded query"
                );
            }
            previous.cancel();
        }
        ticket
    }

    /// Clear the slot once `ticket` has completed. A newer ticket is left alone.
    pub fn release(&self, ticket: &RequestTicket) {
        let mut current = self.current.lock();
        if current
            .as_ref()
            .is_some_and(|t| t.query_id() == ticket.query_id())
        {
            *current = None;
        }
    }

    pub fn is_busy(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(RequestTicket::is_current)
    }
}

/// Maps client session ids to their request handles.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<ActiveRequestHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_for(&self, session_id: &str) -> Arc<ActiveRequestHandle> {
        if let Some(handle) = self.sessions.read().get(session_id) {
            return handle.clone();
        }

        let mut sessions = self.sessions.write();
        if sessions.len() >= PRUNE_THRESHOLD {
            sessions.retain(|_, handle| handle.is_busy() || Arc::strong_count(handle) > 1);
        }
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(ActiveRequestHandle::new()))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
