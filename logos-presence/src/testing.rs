//! Shared fixtures for unit tests.

use tokio::sync::mpsc;

use crate::config::PresenceConfig;
use crate::doc::PresenceTransport;
use crate::events::PresenceEvent;
use crate::presence::DocPresence;
use crate::text::{TextOp, TextSelection};

/// A presence send recorded by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Sent {
    pub seq: u64,
    pub presence: Option<TextSelection>,
    pub request_reply: bool,
}

/// Transport that records sends and fetches.
#[derive(Debug)]
pub(crate) struct RecordingTransport {
    pub next_seq: u64,
    pub sent: Vec<Sent>,
    pub fetches: usize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            next_seq: 1,
            sent: Vec::new(),
            fetches: 0,
        }
    }
}

impl PresenceTransport<TextSelection> for RecordingTransport {
    fn seq(&self) -> u64 {
        self.next_seq
    }

    fn send_presence(&mut self, presence: Option<&TextSelection>, request_reply: bool) {
        self.sent.push(Sent {
            seq: self.next_seq,
            presence: presence.copied(),
            request_reply,
        });
        self.next_seq += 1;
    }

    fn fetch(&mut self) {
        self.fetches += 1;
    }
}

pub(crate) type TextPresence = DocPresence<TextSelection, TextOp>;

/// A presence component plus its event receiver.
pub(crate) fn text_presence() -> (TextPresence, mpsc::UnboundedReceiver<PresenceEvent>) {
    let mut presence = DocPresence::new(PresenceConfig::default());
    let events = presence.take_event_rx().expect("fresh event receiver");
    (presence, events)
}

/// Drain every event currently buffered.
pub(crate) fn drain(events: &mut mpsc::UnboundedReceiver<PresenceEvent>) -> Vec<PresenceEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub(crate) fn changed(sources: &[&str], submitted: bool) -> PresenceEvent {
    PresenceEvent::Changed {
        sources: sources.iter().map(|s| s.to_string()).collect(),
        submitted,
    }
}
