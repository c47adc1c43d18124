//! Pause, teardown and hard rollback.
//!
//! | Operation       | received | cached ops | pending/inflight      | current            |
//! |-----------------|----------|------------|-----------------------|--------------------|
//! | `pause`         | cleared  | kept       | inflight → front of pending | remote cleared |
//! | `destroy`       | cleared  | cleared    | kept                  | kept               |
//! | `hard_rollback` | cleared  | cleared    | drained and returned  | all cleared        |

use crate::presence::DocPresence;
use crate::protocol::{SourceId, LOCAL_SOURCE};
use crate::state::{Batch, Completion};

impl<P, O> DocPresence<P, O> {
    /// The connection dropped. Outstanding submissions are re-queued so the
    /// next flush re-announces local presence and asks peers to reply.
    pub fn pause(&mut self) {
        let inflight = self.state.inflight.take().map(|inflight| inflight.batch);
        let pending = self.state.pending.take();
        self.state.pending = match (inflight, pending) {
            (Some(mut front), Some(back)) => {
                front.append(back);
                Some(front)
            }
            (Some(batch), None) | (None, Some(batch)) => Some(batch),
            (None, None) => self
                .state
                .current
                .contains_key(LOCAL_SOURCE)
                .then(Batch::default),
        };

        self.state.received.clear();
        self.state.request_reply = true;

        let cleared = self.clear_remote_presence();
        log::info!(
            "Presence paused: {} remote sources cleared, {} completions re-queued",
            cleared.len(),
            self.state.pending.as_ref().map_or(0, Batch::len)
        );
        self.emit_change(cleared, false);
    }

    /// Drop transient reconciliation data. Current presence is left intact.
    pub fn destroy(&mut self) {
        self.state.received.clear();
        self.state.cached_ops.clear();
    }

    /// Reset everything after a severe desync with the server.
    ///
    /// Returns the outstanding completions, inflight first, for the owner to
    /// fail with [`PresenceError::Rollback`](crate::PresenceError::Rollback).
    /// None of them are resolved here.
    pub fn hard_rollback(&mut self) -> Vec<Completion> {
        let mut completions: Vec<Completion> = self
            .state
            .inflight
            .take()
            .map(|inflight| inflight.batch.into_completions().collect())
            .unwrap_or_default();
        if let Some(pending) = self.state.pending.take() {
            completions.extend(pending.into_completions());
        }

        self.state.cached_ops.clear();
        self.state.received.clear();
        self.state.request_reply = true;

        let cleared: Vec<SourceId> = std::mem::take(&mut self.state.current)
            .into_keys()
            .collect();
        log::info!(
            "Presence hard rollback: {} sources cleared, {} completions returned",
            cleared.len(),
            completions.len()
        );
        self.emit_change(cleared, false);
        completions
    }

    fn clear_remote_presence(&mut self) -> Vec<SourceId> {
        let remote: Vec<SourceId> = self
            .state
            .current
            .keys()
            .filter(|src| src.as_str() != LOCAL_SOURCE)
            .cloned()
            .collect();
        for src in &remote {
            self.state.current.remove(src);
        }
        remote
    }
}
