//! Boundary between the presence subsystem and its collaborators.
//!
//! ```text
//!            PresenceDocument ───► DocType ───► PresenceCapability
//!   (version, inflight/pending ops,    (optional per type: create,
//!    subscribed, write pending)         transform, compare)
//!
//!            PresenceTransport  (outgoing seq, send, fetch)
//! ```
//!
//! Presence support is optional per document type. It is exposed as a
//! single descriptor, [`DocType::presence`], checked once at validation
//! time instead of probing for individual capabilities.

use crate::protocol::SourceId;

/// Presence capabilities of a document type.
pub trait PresenceCapability<P, O> {
    /// Normalize/validate arbitrary presence input.
    fn create_presence(&self, raw: P) -> P;

    /// Adjust `presence` so it stays valid after `op` is applied.
    ///
    /// `is_own_op` is set when the presence and the operation share a source.
    fn transform_presence(&self, presence: &P, op: &O, is_own_op: bool) -> P;

    /// Compare two presence values. `None` means the type has no compare
    /// capability, in which case values are only equal by identity.
    fn compare_presence(&self, _a: &P, _b: &P) -> Option<bool> {
        None
    }
}

/// The operational-transform type of a document.
pub trait DocType<P, O> {
    fn name(&self) -> &str;

    /// Presence support, or `None` when the type cannot carry presence.
    fn presence(&self) -> Option<&dyn PresenceCapability<P, O>>;
}

/// A local operation that has not been acknowledged yet.
///
/// `op == None` marks a structural change (create/delete) that presence
/// cannot be transformed across.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOp<O> {
    pub op: Option<O>,
}

impl<O> PendingOp<O> {
    pub fn edit(op: O) -> Self {
        Self { op: Some(op) }
    }

    pub fn structural() -> Self {
        Self { op: None }
    }

    pub fn is_structural(&self) -> bool {
        self.op.is_none()
    }
}

/// The document that owns a [`DocPresence`](crate::DocPresence).
pub trait PresenceDocument<P, O> {
    /// The document's type, or `None` while the document is not created.
    fn doc_type(&self) -> Option<&dyn DocType<P, O>>;

    /// Current known version, `None` if unset.
    fn version(&self) -> Option<u64>;

    /// The local operation currently awaiting acknowledgment.
    fn inflight_op(&self) -> Option<&PendingOp<O>>;

    /// Local operations not sent yet, in submission order.
    fn pending_ops(&self) -> &[PendingOp<O>];

    /// Whether local operations are inflight or pending.
    fn has_write_pending(&self) -> bool;

    fn is_subscribed(&self) -> bool;

    /// Presence support of the document's type, if created and supported.
    fn presence_capability(&self) -> Option<&dyn PresenceCapability<P, O>> {
        self.doc_type().and_then(|doc_type| doc_type.presence())
    }
}

/// Outbound side of the connection carrying presence.
pub trait PresenceTransport<P> {
    /// Sequence number the next outbound message will carry. Starts at 1
    /// and increases with every message sent.
    fn seq(&self) -> u64;

    /// Send the local presence (`None` withdraws it) to the relay.
    fn send_presence(&mut self, presence: Option<&P>, request_reply: bool);

    /// Ask for a document refresh so the local version catches up.
    fn fetch(&mut self);
}

/// Source ownership test used by every transform step.
pub(crate) fn is_own_op(presence_src: &str, op_src: &str) -> bool {
    presence_src == op_src
}

/// `true` while the local version has not reached `v`.
pub(crate) fn is_behind(local: Option<u64>, v: u64) -> bool {
    local.map_or(true, |local| local < v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_op_kinds() {
        assert!(PendingOp::<u32>::structural().is_structural());
        assert!(!PendingOp::edit(3u32).is_structural());
    }

    #[test]
    fn test_is_behind() {
        assert!(is_behind(None, 0));
        assert!(is_behind(Some(4), 5));
        assert!(!is_behind(Some(5), 5));
        assert!(!is_behind(Some(6), 5));
    }

    #[test]
    fn test_is_own_op() {
        assert!(is_own_op("a", "a"));
        assert!(!is_own_op("a", "b"));
        assert!(!is_own_op("", "a"));
    }
}
