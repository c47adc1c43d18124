//! Outbound notifications and the deferred task queue.
//!
//! Nothing is emitted synchronously from inside a handler. Notifications,
//! completions and the post-submit flush are queued here and run, in FIFO
//! order, when the owner calls [`DocPresence::run_deferred`] on its next
//! scheduling turn.
//!
//! [`DocPresence::run_deferred`]: crate::DocPresence::run_deferred

use std::collections::VecDeque;

use crate::error::PresenceError;
use crate::protocol::SourceId;
use crate::state::{Completion, CompletionResult};

/// Events delivered to the document/UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    /// Presence changed for these sources.
    Changed {
        sources: Vec<SourceId>,
        /// The change came from a local submission.
        submitted: bool,
    },
    /// No presence submission and no document write is outstanding.
    NothingPending,
    /// An error with no completion handle to deliver it to.
    Error(PresenceError),
}

/// Work deferred to the next scheduling turn.
#[derive(Debug)]
pub(crate) enum Deferred {
    Flush,
    Emit(PresenceEvent),
    Complete(Completion, CompletionResult),
}

/// FIFO queue of deferred work.
#[derive(Debug, Default)]
pub(crate) struct DeferredQueue {
    tasks: VecDeque<Deferred>,
}

impl DeferredQueue {
    pub(crate) fn push(&mut self, task: Deferred) {
        self.tasks.push_back(task);
    }

    pub(crate) fn pop(&mut self) -> Option<Deferred> {
        self.tasks.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_fifo() {
        let mut queue = DeferredQueue::default();
        queue.push(Deferred::Emit(PresenceEvent::NothingPending));
        queue.push(Deferred::Flush);
        assert_eq!(queue.len(), 2);

        assert!(matches!(queue.pop(), Some(Deferred::Emit(PresenceEvent::NothingPending))));
        assert!(matches!(queue.pop(), Some(Deferred::Flush)));
        assert!(queue.pop().is_none());
    }
}
