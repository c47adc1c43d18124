//! Per-document presence state.
//!
//! Pure data plus the set-presence primitive. Only the submission,
//! reception and lifecycle paths of [`DocPresence`](crate::DocPresence)
//! mutate it:
//!
//! - `current[""]` is written by local submissions only.
//! - Every other `current` key is written by reconciliation only.
//! - `received[src]` is only ever replaced by a newer announcement.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::doc::PresenceCapability;
use crate::error::PresenceError;
use crate::op_cache::OpCache;
use crate::protocol::{PresenceEnvelope, SourceId};

/// Outcome delivered to a submission's completion handle.
pub type CompletionResult = Result<(), PresenceError>;

// ───────────────────────────────────────────────────────────────────
// Completion handles and batches
// ───────────────────────────────────────────────────────────────────

/// Opaque completion handle for one presence submission.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<CompletionResult>,
}

impl Completion {
    /// Create a handle and the receiver its outcome arrives on.
    pub fn channel() -> (Self, oneshot::Receiver<CompletionResult>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Resolve the submission. A dropped receiver is not an error.
    pub fn complete(self, result: CompletionResult) {
        let _ = self.tx.send(result);
    }
}

/// Ordered completions for one pending or inflight submission.
///
/// An empty batch is meaningful: it still forces the next flush to send
/// the local presence.
#[derive(Debug, Default)]
pub struct Batch {
    completions: VecDeque<Completion>,
}

impl Batch {
    pub fn push(&mut self, completion: Completion) {
        self.completions.push_back(completion);
    }

    /// Append `later` behind this batch's completions.
    pub fn append(&mut self, mut later: Batch) {
        self.completions.append(&mut later.completions);
    }

    pub fn len(&self) -> usize {
        self.completions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completions.is_empty()
    }

    /// Resolve every completion with `result`. Returns whether any existed.
    pub fn complete_all(self, result: CompletionResult) -> bool {
        let called = !self.is_empty();
        for completion in self.completions {
            completion.complete(result.clone());
        }
        called
    }

    pub fn into_completions(self) -> impl Iterator<Item = Completion> {
        self.completions.into_iter()
    }
}

/// The batch awaiting acknowledgment, tagged with the sequence it was sent with.
#[derive(Debug)]
pub struct Inflight {
    pub seq: u64,
    pub batch: Batch,
}

// ───────────────────────────────────────────────────────────────────
// Received announcements
// ───────────────────────────────────────────────────────────────────

/// A remote announcement awaiting or past reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedEnvelope<P> {
    pub src: SourceId,
    pub seq: u64,
    /// Version the presence was captured at; `None` is a server withdrawal.
    pub v: Option<u64>,
    /// Payload; `None` means the peer withdrew its presence.
    pub p: Option<P>,
    pub r: bool,
    /// Set once the announcement has been fully reconciled.
    pub processed_at: Option<Instant>,
}

impl<P> ReceivedEnvelope<P> {
    pub fn new(src: SourceId, envelope: PresenceEnvelope<P>) -> Self {
        Self {
            src,
            seq: envelope.seq,
            v: envelope.v,
            p: envelope.p,
            r: envelope.r,
            processed_at: None,
        }
    }

    /// Whether an incoming announcement with `seq`/`v` must be discarded
    /// in favour of this one.
    ///
    /// Equal sequences are only accepted for a null-version withdrawal,
    /// which the server sends after a versioned announcement at the same seq.
    pub fn supersedes(&self, seq: u64, v: Option<u64>) -> bool {
        self.seq > seq || (self.seq == seq && v.is_some())
    }

    /// Whether a processed entry has outlived the retention window.
    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        self.processed_at
            .is_some_and(|at| now.saturating_duration_since(at) >= timeout)
    }
}

// ───────────────────────────────────────────────────────────────────
// PresenceState
// ───────────────────────────────────────────────────────────────────

/// Presence state for one open document.
#[derive(Debug)]
pub struct PresenceState<P, O> {
    pub(crate) current: BTreeMap<SourceId, Arc<P>>,
    pub(crate) received: BTreeMap<SourceId, ReceivedEnvelope<P>>,
    pub(crate) cached_ops: OpCache<O>,
    pub(crate) pending: Option<Batch>,
    pub(crate) inflight: Option<Inflight>,
    pub(crate) request_reply: bool,
}

impl<P, O> PresenceState<P, O> {
    pub fn new(cached_ops_timeout: Duration) -> Self {
        Self {
            current: BTreeMap::new(),
            received: BTreeMap::new(),
            cached_ops: OpCache::new(cached_ops_timeout),
            pending: None,
            inflight: None,
            // The first announcement asks peers for theirs.
            request_reply: true,
        }
    }

    /// Install or clear presence for `src`. Returns whether it changed.
    ///
    /// Values equal by identity, or by the type's compare capability when it
    /// has one, leave the map untouched.
    pub(crate) fn set_presence(
        &mut self,
        capability: Option<&dyn PresenceCapability<P, O>>,
        src: &str,
        data: Option<Arc<P>>,
    ) -> bool {
        let Some(data) = data else {
            return self.current.remove(src).is_some();
        };
        if let Some(existing) = self.current.get(src) {
            if Arc::ptr_eq(existing, &data) {
                return false;
            }
            let equal = capability.and_then(|cap| cap.compare_presence(existing, &data));
            if equal == Some(true) {
                return false;
            }
        }
        self.current.insert(src.to_owned(), data);
        true
    }

    /// Current presence for a source (`""` is the local client).
    pub fn get(&self, src: &str) -> Option<&Arc<P>> {
        self.current.get(src)
    }

    /// Sources with known presence, in order.
    pub fn sources(&self) -> impl Iterator<Item = &SourceId> {
        self.current.keys()
    }

    pub fn received(&self, src: &str) -> Option<&ReceivedEnvelope<P>> {
        self.received.get(src)
    }

    pub fn received_count(&self) -> usize {
        self.received.len()
    }

    pub fn cached_ops(&self) -> &OpCache<O> {
        &self.cached_ops
    }

    pub fn pending(&self) -> Option<&Batch> {
        self.pending.as_ref()
    }

    pub fn inflight(&self) -> Option<&Inflight> {
        self.inflight.as_ref()
    }

    /// Sequence of the inflight submission, `0` when nothing is inflight.
    pub fn inflight_seq(&self) -> u64 {
        self.inflight.as_ref().map_or(0, |inflight| inflight.seq)
    }

    pub fn request_reply(&self) -> bool {
        self.request_reply
    }

    /// Whether a submission is queued or awaiting acknowledgment.
    pub fn has_pending_work(&self) -> bool {
        self.pending.is_some() || self.inflight.is_some()
    }
}
