//! Local presence submission, flush and acknowledgment.
//!
//! ```text
//!  submit(data) ──► validate ──► current[""] ──► pending batch
//!                                                    │ flush (deferred)
//!                                                    ▼
//!                            inflight { seq, batch } ──► transport.send_presence
//!                                                    │
//!  ack(seq) ◄────────────────────────────────────────┘
//!      │ seq == inflight.seq
//!      ▼
//!  complete batch, flush again, NothingPending
//! ```

use std::sync::Arc;

use crate::doc::{PresenceDocument, PresenceTransport};
use crate::error::PresenceError;
use crate::events::Deferred;
use crate::presence::DocPresence;
use crate::protocol::LOCAL_SOURCE;
use crate::state::{Batch, Completion, Inflight};

impl<P, O> DocPresence<P, O> {
    /// Submit local presence. `None` withdraws it.
    ///
    /// Validation failures never resolve synchronously: they are delivered
    /// on the next `run_deferred`, to `completion` if given, otherwise as a
    /// `PresenceEvent::Error`. A flush is always scheduled on success.
    pub fn submit(
        &mut self,
        doc: &dyn PresenceDocument<P, O>,
        data: Option<P>,
        completion: Option<Completion>,
    ) {
        let data = match data {
            Some(raw) => {
                let Some(doc_type) = doc.doc_type() else {
                    self.fail_submission(completion, PresenceError::NotCreated);
                    return;
                };
                let Some(capability) = doc_type.presence() else {
                    self.fail_submission(completion, PresenceError::UnsupportedType);
                    return;
                };
                Some(Arc::new(capability.create_presence(raw)))
            }
            None => None,
        };

        let changed = self
            .state
            .set_presence(doc.presence_capability(), LOCAL_SOURCE, data);
        if changed {
            self.emit_change(vec![LOCAL_SOURCE.to_owned()], true);
        }

        if changed || self.state.has_pending_work() {
            let pending = self.state.pending.get_or_insert_with(Batch::default);
            if let Some(completion) = completion {
                pending.push(completion);
            }
        } else if let Some(completion) = completion {
            self.deferred.push(Deferred::Complete(completion, Ok(())));
        }

        self.deferred.push(Deferred::Flush);
    }

    fn fail_submission(&mut self, completion: Option<Completion>, error: PresenceError) {
        log::debug!("Presence submission rejected: {error}");
        match completion {
            Some(completion) => self.deferred.push(Deferred::Complete(completion, Err(error))),
            None => self.emit_error(error),
        }
    }

    /// Send the pending batch if the document is subscribed, nothing is
    /// inflight and no document write is pending. No-op otherwise.
    pub fn flush(
        &mut self,
        doc: &dyn PresenceDocument<P, O>,
        transport: &mut dyn PresenceTransport<P>,
    ) {
        if !doc.is_subscribed() || self.state.inflight.is_some() || doc.has_write_pending() {
            return;
        }
        let Some(batch) = self.state.pending.take() else {
            return;
        };

        let seq = transport.seq();
        self.state.inflight = Some(Inflight { seq, batch });
        let request_reply = std::mem::take(&mut self.state.request_reply);
        log::trace!("Sending presence seq={seq} request_reply={request_reply}");
        transport.send_presence(
            self.state.current.get(LOCAL_SOURCE).map(Arc::as_ref),
            request_reply,
        );
    }

    /// Handle the server's acknowledgment of our submission `seq`.
    ///
    /// Acks for anything but the inflight sequence are stale (a hard
    /// rollback raced the ack) and ignored.
    pub(crate) fn handle_ack(
        &mut self,
        doc: &dyn PresenceDocument<P, O>,
        transport: &mut dyn PresenceTransport<P>,
        seq: u64,
        error: Option<String>,
    ) {
        if self.state.inflight.as_ref().map(|inflight| inflight.seq) != Some(seq) {
            log::debug!("Ignoring presence ack seq={seq}, inflight seq={}", self.state.inflight_seq());
            return;
        }
        let Some(inflight) = self.state.inflight.take() else {
            return;
        };

        let error = error.map(PresenceError::Ack);
        let result = match &error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        };
        let called = inflight.batch.complete_all(result);
        if let Some(error) = error {
            if !called {
                self.emit_error(error);
            }
        }

        self.flush(doc, transport);
        self.emit_nothing_pending(doc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PresenceEvent;
    use crate::protocol::PresenceEnvelope;
    use crate::testing::{changed, drain, text_presence, RecordingTransport};
    use crate::text::{PlainText, TextDocument, TextOp, TextSelection};

    #[tokio::test]
    async fn test_submit_before_create_fails_async() {
        let (mut presence, mut events) = text_presence();
        let doc = TextDocument::new();
        let mut transport = RecordingTransport::new();
        let (completion, mut rx) = Completion::channel();

        presence.submit(&doc, Some(TextSelection::cursor(1)), Some(completion));

        // Nothing resolved synchronously, nothing mutated.
        assert!(rx.try_recv().is_err());
        assert!(presence.state().get(LOCAL_SOURCE).is_none());
        assert!(!presence.state().has_pending_work());

        presence.run_deferred(&doc, &mut transport);
        assert_eq!(rx.await.unwrap(), Err(PresenceError::NotCreated));
        assert!(drain(&mut events).is_empty());
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_submit_before_create_without_completion_emits_error() {
        let (mut presence, mut events) = text_presence();
        let doc = TextDocument::new();
        let mut transport = RecordingTransport::new();

        presence.submit(&doc, Some(TextSelection::cursor(1)), None);
        assert!(drain(&mut events).is_empty());

        presence.run_deferred(&doc, &mut transport);
        assert_eq!(drain(&mut events), vec![PresenceEvent::Error(PresenceError::NotCreated)]);
    }

    #[tokio::test]
    async fn test_submit_unsupported_type() {
        let (mut presence, _events) = text_presence();
        let doc = TextDocument::created(PlainText::without_presence(), "abc", 1);
        let mut transport = RecordingTransport::new();
        let (completion, rx) = Completion::channel();

        presence.submit(&doc, Some(TextSelection::cursor(1)), Some(completion));
        presence.run_deferred(&doc, &mut transport);

        assert_eq!(rx.await.unwrap(), Err(PresenceError::UnsupportedType));
        assert!(presence.state().get(LOCAL_SOURCE).is_none());
    }

    #[tokio::test]
    async fn test_submit_flush_ack_roundtrip() {
        let (mut presence, mut events) = text_presence();
        let doc = TextDocument::created(PlainText::new(), "abc", 1);
        let mut transport = RecordingTransport::new();
        let (completion, mut rx) = Completion::channel();

        presence.submit(&doc, Some(TextSelection::cursor(2)), Some(completion));
        assert_eq!(presence.state().get(LOCAL_SOURCE).map(|p| **p), Some(TextSelection::cursor(2)));
        assert!(presence.state().pending().is_some());
        assert!(transport.sent.is_empty());

        presence.run_deferred(&doc, &mut transport);
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(transport.sent[0].presence, Some(TextSelection::cursor(2)));
        assert!(transport.sent[0].request_reply);
        assert_eq!(presence.state().inflight_seq(), 1);
        assert!(presence.state().pending().is_none());
        assert!(!presence.state().request_reply());
        assert_eq!(drain(&mut events), vec![changed(&[""], true)]);
        assert!(rx.try_recv().is_err());

        presence.receive(&doc, &mut transport, PresenceEnvelope::ack(1));
        assert_eq!(presence.state().inflight_seq(), 0);
        assert_eq!(rx.await.unwrap(), Ok(()));

        presence.run_deferred(&doc, &mut transport);
        assert_eq!(drain(&mut events), vec![PresenceEvent::NothingPending]);
    }

    #[test]
    fn test_submissions_coalesce_into_one_send() {
        let (mut presence, _events) = text_presence();
        let doc = TextDocument::created(PlainText::new(), "abcdef", 1);
        let mut transport = RecordingTransport::new();

        let (c1, _rx1) = Completion::channel();
        let (c2, _rx2) = Completion::channel();
        presence.submit(&doc, Some(TextSelection::cursor(1)), Some(c1));
        presence.submit(&doc, Some(TextSelection::cursor(4)), Some(c2));
        presence.run_deferred(&doc, &mut transport);

        assert_eq!(transport.sent.len(), 1);
        assert_eq!(transport.sent[0].presence, Some(TextSelection::cursor(4)));
        assert_eq!(presence.state().inflight().map(|i| i.batch.len()), Some(2));
    }

    #[tokio::test]
    async fn test_unchanged_submit_completes_immediately() {
        let (mut presence, _events) = text_presence();
        let doc = TextDocument::created(PlainText::new(), "abc", 1);
        let mut transport = RecordingTransport::new();

        presence.submit(&doc, Some(TextSelection::cursor(1)), None);
        presence.run_deferred(&doc, &mut transport);
        presence.receive(&doc, &mut transport, PresenceEnvelope::ack(1));

        let (completion, mut rx) = Completion::channel();
        presence.submit(&doc, Some(TextSelection::cursor(1)), Some(completion));
        assert!(presence.state().pending().is_none());
        assert!(rx.try_recv().is_err());

        presence.run_deferred(&doc, &mut transport);
        assert_eq!(rx.await.unwrap(), Ok(()));
        assert_eq!(transport.sent.len(), 1);
    }

    #[test]
    fn test_flush_waits_for_subscription_and_writes() {
        let (mut presence, _events) = text_presence();
        let mut doc = TextDocument::created(PlainText::new(), "abc", 1);
        let mut transport = RecordingTransport::new();

        doc.set_subscribed(false);
        presence.submit(&doc, Some(TextSelection::cursor(1)), None);
        presence.run_deferred(&doc, &mut transport);
        assert!(transport.sent.is_empty());
        assert!(presence.state().pending().is_some());

        doc.set_subscribed(true);
        doc.submit_op(TextOp::insert(0, "x"));
        presence.flush(&doc, &mut transport);
        assert!(transport.sent.is_empty());

        doc.send_next();
        doc.ack_inflight();
        presence.flush(&doc, &mut transport);
        assert_eq!(transport.sent.len(), 1);

        // Idempotent while inflight.
        presence.flush(&doc, &mut transport);
        assert_eq!(transport.sent.len(), 1);
    }

    #[tokio::test]
    async fn test_ack_error_reaches_completions() {
        let (mut presence, mut events) = text_presence();
        let doc = TextDocument::created(PlainText::new(), "abc", 1);
        let mut transport = RecordingTransport::new();
        let (completion, rx) = Completion::channel();

        presence.submit(&doc, Some(TextSelection::cursor(1)), Some(completion));
        presence.run_deferred(&doc, &mut transport);
        drain(&mut events);

        presence.receive(&doc, &mut transport, PresenceEnvelope::ack_error(1, "denied"));
        assert_eq!(rx.await.unwrap(), Err(PresenceError::Ack("denied".into())));

        presence.run_deferred(&doc, &mut transport);
        assert_eq!(drain(&mut events), vec![PresenceEvent::NothingPending]);
    }

    #[test]
    fn test_ack_error_without_completions_is_signalled() {
        let (mut presence, mut events) = text_presence();
        let doc = TextDocument::created(PlainText::new(), "abc", 1);
        let mut transport = RecordingTransport::new();

        presence.submit(&doc, Some(TextSelection::cursor(1)), None);
        presence.run_deferred(&doc, &mut transport);
        drain(&mut events);

        presence.receive(&doc, &mut transport, PresenceEnvelope::ack_error(1, "denied"));
        presence.run_deferred(&doc, &mut transport);
        assert_eq!(
            drain(&mut events),
            vec![
                PresenceEvent::Error(PresenceError::Ack("denied".into())),
                PresenceEvent::NothingPending,
            ]
        );
    }

    #[test]
    fn test_mismatched_ack_ignored() {
        let (mut presence, _events) = text_presence();
        let doc = TextDocument::created(PlainText::new(), "abc", 1);
        let mut transport = RecordingTransport::new();

        presence.submit(&doc, Some(TextSelection::cursor(1)), None);
        presence.run_deferred(&doc, &mut transport);

        presence.receive(&doc, &mut transport, PresenceEnvelope::ack(7));
        assert_eq!(presence.state().inflight_seq(), 1);
    }

    #[test]
    fn test_ack_flushes_next_pending_batch() {
        let (mut presence, _events) = text_presence();
        let doc = TextDocument::created(PlainText::new(), "abcdef", 1);
        let mut transport = RecordingTransport::new();

        presence.submit(&doc, Some(TextSelection::cursor(1)), None);
        presence.run_deferred(&doc, &mut transport);
        presence.submit(&doc, Some(TextSelection::cursor(3)), None);
        presence.run_deferred(&doc, &mut transport);
        assert_eq!(transport.sent.len(), 1);

        presence.receive(&doc, &mut transport, PresenceEnvelope::ack(1));
        assert_eq!(transport.sent.len(), 2);
        assert_eq!(transport.sent[1].presence, Some(TextSelection::cursor(3)));
        assert!(!transport.sent[1].request_reply);
        assert_eq!(presence.state().inflight_seq(), 2);
    }

    #[test]
    fn test_withdraw_local_presence() {
        let (mut presence, mut events) = text_presence();
        let doc = TextDocument::created(PlainText::new(), "abc", 1);
        let mut transport = RecordingTransport::new();

        presence.submit(&doc, Some(TextSelection::cursor(1)), None);
        presence.run_deferred(&doc, &mut transport);
        presence.receive(&doc, &mut transport, PresenceEnvelope::ack(1));
        presence.run_deferred(&doc, &mut transport);
        drain(&mut events);

        presence.submit(&doc, None, None);
        presence.run_deferred(&doc, &mut transport);
        assert!(presence.state().get(LOCAL_SOURCE).is_none());
        assert_eq!(transport.sent.last().map(|s| s.presence), Some(None));
        assert_eq!(drain(&mut events), vec![changed(&[""], true)]);
    }
}
