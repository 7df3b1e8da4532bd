//! Event correlation: bounded waits for a specific upstream event kind.
//!
//! The event dispatcher is the only reader of the upstream stream. When the
//! tool-call coordinator needs to block until, say, the next
//! `response.function_call_arguments.done`, it registers a one-shot waiter
//! here; the dispatcher offers every event it reads to the waiter table
//! before running its own dispatch arm, so a correlated event is seen by
//! both sides and nothing is lost to whichever reader polled first.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::upstream::{EventKind, ServerEvent};

/// Default deadline for a correlation wait.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(10);

/// Deadline used when waiting for an MCP output item.
pub const MCP_OUTPUT_WAIT: Duration = Duration::from_secs(15);

/// Errors from a correlation wait.
#[derive(Debug, Error)]
pub enum CorrelationError {
    /// The matching event never arrived within the deadline
    #[error("Timed out after {0:?} waiting for {1:?}")]
    Timeout(Duration, EventKind),

    /// The waiter was replaced or the session shut down before the event
    #[error("Wait for {0:?} abandoned")]
    Abandoned(EventKind),
}

/// Registry of one-shot waiters keyed by event kind.
///
/// At most one waiter per kind: subscribing a kind that already has a
/// waiter replaces it, and the replaced wait resolves as abandoned. That
/// matches the session invariant of one in-flight tool call per wait.
#[derive(Debug, Clone, Default)]
pub struct EventWaiters {
    inner: Arc<Mutex<HashMap<EventKind, oneshot::Sender<ServerEvent>>>>,
}

impl EventWaiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for the next event of `kind`.
    ///
    /// Must be called before the triggering command is sent upstream, so
    /// the reply cannot slip past unobserved.
    pub fn subscribe(&self, kind: EventKind) -> EventWaiter {
        let (tx, rx) = oneshot::channel();
        if self.inner.lock().insert(kind, tx).is_some() {
            tracing::warn!(?kind, "Replacing stale correlation waiter");
        }
        EventWaiter { kind, rx }
    }

    /// Offer an event to a registered waiter, if any.
    ///
    /// Returns true when a waiter claimed the event. The caller still
    /// dispatches the event through its own handling afterwards.
    pub fn offer(&self, event: &ServerEvent) -> bool {
        let Some(tx) = self.inner.lock().remove(&event.kind()) else {
            return false;
        };
        tx.send(event.clone()).is_ok()
    }

}

/// A pending one-shot wait produced by [`EventWaiters::subscribe`].
#[derive(Debug)]
pub struct EventWaiter {
    kind: EventKind,
    rx: oneshot::Receiver<ServerEvent>,
}

impl EventWaiter {
    /// Block until the event arrives or the deadline passes.
    pub async fn wait(self, deadline: Duration) -> Result<ServerEvent, CorrelationError> {
        match tokio::time::timeout(deadline, self.rx).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => Err(CorrelationError::Abandoned(self.kind)),
            Err(_) => Err(CorrelationError::Timeout(deadline, self.kind)),
        }
    }
}
