//! Remote presence ingestion and reconciliation.
//!
//! ```text
//!  envelope ──► ack? ───────────────────────────────► handle_ack
//!     │
//!     ├─ r == true and nothing pending ──► empty pending batch, flush (deferred)
//!     ├─ older than received[src] ───────► dropped
//!     ▼
//!  received[src] = envelope
//!     ├─ v == None ──► clear presence (server withdrawal)
//!     ├─ local version < v ──► fetch; wait for the version to catch up
//!     ▼
//!  reconcile(src): create → cached ops window → inflight → pending → current[src]
//! ```
//!
//! Reconciliation never surfaces errors. Presence that cannot be soundly
//! transformed (structural ops in the way, cache window too short) is
//! cleared instead.

use std::sync::Arc;
use std::time::Instant;

use crate::doc::{is_behind, is_own_op, PresenceDocument, PresenceTransport};
use crate::error::PresenceError;
use crate::events::Deferred;
use crate::presence::DocPresence;
use crate::protocol::{PresenceEnvelope, SourceId, LOCAL_SOURCE};
use crate::state::{Batch, ReceivedEnvelope};
use crate::transform::TransformEngine;

impl<P: Clone, O> DocPresence<P, O> {
    /// Handle an inbound presence envelope (peer announcement or ack).
    pub fn receive(
        &mut self,
        doc: &dyn PresenceDocument<P, O>,
        transport: &mut dyn PresenceTransport<P>,
        envelope: PresenceEnvelope<P>,
    ) {
        if envelope.is_ack() {
            self.handle_ack(doc, transport, envelope.seq, envelope.error);
            return;
        }
        let src = envelope.src.clone().unwrap_or_default();

        if let Some(error) = envelope.error {
            self.emit_error(PresenceError::Protocol(error));
            return;
        }

        if envelope.r && self.state.pending.is_none() {
            // A peer asked everyone to re-announce.
            self.state.pending = Some(Batch::default());
            self.deferred.push(Deferred::Flush);
        }

        if let Some(existing) = self.state.received.get(&src) {
            if existing.supersedes(envelope.seq, envelope.v) {
                log::debug!(
                    "Dropping stale presence from {src}: seq={} v={:?}, have seq={}",
                    envelope.seq,
                    envelope.v,
                    existing.seq
                );
                return;
            }
        }

        let version = envelope.v;
        self.state
            .received
            .insert(src.clone(), ReceivedEnvelope::new(src.clone(), envelope));

        let Some(v) = version else {
            if let Some(entry) = self.state.received.get_mut(&src) {
                entry.processed_at = Some(Instant::now());
            }
            if self.state.set_presence(None, &src, None) {
                self.emit_change(vec![src], false);
            }
            return;
        };

        if is_behind(doc.version(), v) {
            log::debug!(
                "Presence from {src} is at v{v}, local is {:?}; fetching",
                doc.version()
            );
            transport.fetch();
            return;
        }

        if self.reconcile(doc, &src) {
            self.emit_change(vec![src], false);
        }
    }

    /// Reconcile the received announcement for `src` into current presence.
    ///
    /// Returns whether current presence changed. The caller decides how to
    /// notify.
    pub fn reconcile(&mut self, doc: &dyn PresenceDocument<P, O>, src: &str) -> bool {
        self.reconcile_at(doc, src, Instant::now())
    }

    pub(crate) fn reconcile_at(
        &mut self,
        doc: &dyn PresenceDocument<P, O>,
        src: &str,
        now: Instant,
    ) -> bool {
        if src == LOCAL_SOURCE {
            return false;
        }
        let received_timeout = self.config.received_timeout;
        let Some(entry) = self.state.received.get_mut(src) else {
            return false;
        };

        if entry.processed_at.is_some() {
            if entry.is_expired(now, received_timeout) {
                self.state.received.remove(src);
            }
            return false;
        }

        // Withdrawals are settled on receipt.
        let Some(v) = entry.v else {
            return false;
        };
        let local = match doc.version() {
            Some(local) if !is_behind(Some(local), v) => local,
            _ => return false,
        };

        entry.processed_at = Some(now);
        let raw = entry.p.clone();
        let next = self.transform_received(doc, src, raw, v, local);
        self.state
            .set_presence(doc.presence_capability(), src, next.map(Arc::new))
    }

    fn transform_received(
        &self,
        doc: &dyn PresenceDocument<P, O>,
        src: &str,
        raw: Option<P>,
        v: u64,
        local: u64,
    ) -> Option<P> {
        let Some(raw) = raw else {
            log::trace!("Presence from {src} withdrawn");
            return None;
        };
        let Some(capability) = doc.presence_capability() else {
            log::debug!("Clearing presence from {src}: type does not support presence");
            return None;
        };
        if doc.inflight_op().is_some_and(|op| op.is_structural())
            || doc.pending_ops().iter().any(|op| op.is_structural())
        {
            log::debug!("Clearing presence from {src}: structural local op outstanding");
            return None;
        }
        let gap = usize::try_from(local - v).unwrap_or(usize::MAX);
        let Some(window) = self.state.cached_ops.window(gap) else {
            log::debug!(
                "Clearing presence from {src}: {gap} ops since v{v}, {} cached",
                self.state.cached_ops.len()
            );
            return None;
        };

        TransformEngine::new(capability).compose(
            raw,
            src,
            window,
            doc.inflight_op(),
            doc.pending_ops(),
        )
    }

    /// Reconcile every received announcement and emit one change
    /// notification for the sources that changed.
    pub fn reconcile_all(&mut self, doc: &dyn PresenceDocument<P, O>) {
        let now = Instant::now();
        let sources: Vec<SourceId> = self.state.received.keys().cloned().collect();
        let changed: Vec<SourceId> = sources
            .into_iter()
            .filter(|src| self.reconcile_at(doc, src, now))
            .collect();
        self.emit_change(changed, false);
    }

    /// Transform current presence through an operation just applied to the
    /// local snapshot. `src` is the operation's originating source.
    ///
    /// The local entry is left alone: local presence is authoritative and
    /// re-submitted by its owner. A structural op clears every remote entry.
    pub fn on_op_applied(&mut self, doc: &dyn PresenceDocument<P, O>, op: Option<&O>, src: &str) {
        let capability = doc.presence_capability();
        let sources: Vec<SourceId> = self
            .state
            .current
            .keys()
            .filter(|s| s.as_str() != LOCAL_SOURCE)
            .cloned()
            .collect();

        let mut changed = Vec::new();
        for source in sources {
            let next = match (capability, self.state.current.get(&source)) {
                (Some(capability), Some(presence)) => TransformEngine::new(capability)
                    .step(presence, op, is_own_op(&source, src)),
                _ => None,
            };
            if self.state.set_presence(capability, &source, next.map(Arc::new)) {
                changed.push(source);
            }
        }
        self.emit_change(changed, false);
    }

    /// Record an operation that advanced the document version (a remote op,
    /// or our own op once acknowledged), then reconcile announcements that
    /// were waiting for it.
    ///
    /// The owner must advance its version before calling this.
    pub fn on_op_committed(
        &mut self,
        doc: &dyn PresenceDocument<P, O>,
        op: Option<O>,
        src: impl Into<SourceId>,
    ) {
        self.state.cached_ops.push(op, src.into());
        self.reconcile_all(doc);
    }
}
