//! Per-document presence component.
//!
//! [`DocPresence`] owns the [`PresenceState`] of one open document and the
//! FIFO of work deferred to the next scheduling turn. The owning document
//! forwards three event sources into it:
//!
//! ```text
//!  local submit ───────► submit()          ─┐
//!  inbound envelope ───► receive()          ├─► PresenceState ──► deferred FIFO
//!  op applied/committed ► on_op_applied()   │                        │
//!                        on_op_committed() ─┘                        ▼
//!                                                     run_deferred(): flush → transport
//!                                                                     events → event_rx
//! ```
//!
//! All handlers run synchronously against `&mut self`; a multi-threaded
//! host keeps one `tokio::sync::Mutex` around each document's presence.

use tokio::sync::mpsc;

use crate::config::PresenceConfig;
use crate::doc::{PresenceDocument, PresenceTransport};
use crate::error::PresenceError;
use crate::events::{Deferred, DeferredQueue, PresenceEvent};
use crate::protocol::SourceId;
use crate::state::PresenceState;

/// Presence for one open document.
pub struct DocPresence<P, O> {
    pub(crate) state: PresenceState<P, O>,
    pub(crate) config: PresenceConfig,
    pub(crate) deferred: DeferredQueue,
    event_tx: mpsc::UnboundedSender<PresenceEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<PresenceEvent>>,
}

impl<P, O> DocPresence<P, O> {
    pub fn new(config: PresenceConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            state: PresenceState::new(config.cached_ops_timeout),
            config,
            deferred: DeferredQueue::default(),
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::UnboundedReceiver<PresenceEvent>> {
        self.event_rx.take()
    }

    pub fn state(&self) -> &PresenceState<P, O> {
        &self.state
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    /// Number of tasks waiting for the next `run_deferred`.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Run deferred work in FIFO order until the queue is empty.
    ///
    /// Work queued while draining runs in the same call, after the work
    /// queued before it.
    pub fn run_deferred(
        &mut self,
        doc: &dyn PresenceDocument<P, O>,
        transport: &mut dyn PresenceTransport<P>,
    ) {
        while let Some(task) = self.deferred.pop() {
            match task {
                Deferred::Flush => self.flush(doc, transport),
                Deferred::Emit(event) => {
                    // Receiver dropped: nobody is listening any more.
                    let _ = self.event_tx.send(event);
                }
                Deferred::Complete(completion, result) => completion.complete(result),
            }
        }
    }

    /// Queue a change notification; nothing is queued for an empty list.
    pub(crate) fn emit_change(&mut self, sources: Vec<SourceId>, submitted: bool) {
        if sources.is_empty() {
            return;
        }
        self.deferred
            .push(Deferred::Emit(PresenceEvent::Changed { sources, submitted }));
    }

    /// Queue a standalone error signal.
    pub(crate) fn emit_error(&mut self, error: PresenceError) {
        log::warn!("Presence error: {error}");
        self.deferred.push(Deferred::Emit(PresenceEvent::Error(error)));
    }

    pub(crate) fn emit_nothing_pending(&mut self, doc: &dyn PresenceDocument<P, O>) {
        if self.state.has_pending_work() || doc.has_write_pending() {
            return;
        }
        self.deferred.push(Deferred::Emit(PresenceEvent::NothingPending));
    }
}

impl<P, O> Default for DocPresence<P, O> {
    fn default() -> Self {
        Self::new(PresenceConfig::default())
    }
}

impl<P: std::fmt::Debug, O: std::fmt::Debug> std::fmt::Debug for DocPresence<P, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocPresence")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("deferred", &self.deferred.len())
            .finish()
    }
}
