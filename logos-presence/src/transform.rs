//! Presence transformation through sequences of operations.
//!
//! Remote presence is composed, in order, through:
//!
//! ```text
//!   raw payload
//!       │ create_presence
//!       ▼
//!   cached ops since the payload's version   (own-op flag: op.src == presence src)
//!       │
//!       ▼
//!   inflight local op                        (never own)
//!       │
//!       ▼
//!   pending local ops, in order              (never own)
//!       │
//!       ▼
//!   presence valid against the local snapshot
//! ```
//!
//! A structural op (no transformable payload) anywhere in the chain yields
//! `None`: the presence cannot follow it and must be cleared.

use crate::doc::{is_own_op, PendingOp, PresenceCapability};
use crate::op_cache::CachedOp;

/// Composes presence payloads through operations using a type's capability.
pub struct TransformEngine<'a, P, O> {
    capability: &'a dyn PresenceCapability<P, O>,
}

impl<'a, P, O> TransformEngine<'a, P, O> {
    pub fn new(capability: &'a dyn PresenceCapability<P, O>) -> Self {
        Self { capability }
    }

    /// Transform through a single operation.
    pub fn step(&self, presence: &P, op: Option<&O>, is_own_op: bool) -> Option<P> {
        op.map(|op| self.capability.transform_presence(presence, op, is_own_op))
    }

    /// Normalize a received payload, then transform it through the cached
    /// window and the local inflight and pending operations.
    pub fn compose<'o>(
        &self,
        raw: P,
        src: &str,
        cached: impl IntoIterator<Item = &'o CachedOp<O>>,
        inflight: Option<&PendingOp<O>>,
        pending: &[PendingOp<O>],
    ) -> Option<P>
    where
        O: 'o,
    {
        let mut presence = self.capability.create_presence(raw);
        for cached_op in cached {
            presence = self.step(&presence, cached_op.op.as_ref(), is_own_op(src, &cached_op.src))?;
        }
        for local in inflight.into_iter().chain(pending) {
            presence = self.step(&presence, local.op.as_ref(), false)?;
        }
        Some(presence)
    }
}
