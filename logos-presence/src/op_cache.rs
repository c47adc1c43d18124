//! Time-bounded window of recently committed operations.
//!
//! Remote presence is captured at the sender's document version. To show it
//! locally it must be transformed through every operation committed since
//! that version, so the last N committed operations are kept here:
//!
//! ```text
//!   oldest ◄──────────────────────────────────────► newest
//!   ┌──────┬──────┬──────┬──────┬──────┐
//!   │ v-4  │ v-3  │ v-2  │ v-1  │ v    │   window(2) = [v-1, v]
//!   └──────┴──────┴──────┴──────┴──────┘
//!   pruned on insert when older than now − cached_ops_timeout
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::protocol::SourceId;

/// A committed operation with its originating source.
///
/// `op == None` marks a structural change (create/delete).
#[derive(Debug, Clone)]
pub struct CachedOp<O> {
    pub op: Option<O>,
    pub src: SourceId,
    pub time: Instant,
}

/// Sliding window of committed operations, ordered by application time.
#[derive(Debug)]
pub struct OpCache<O> {
    ops: VecDeque<CachedOp<O>>,
    timeout: Duration,
}

impl<O> OpCache<O> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            ops: VecDeque::new(),
            timeout,
        }
    }

    /// Cache a committed operation, applied now.
    pub fn push(&mut self, op: Option<O>, src: SourceId) {
        self.push_at(op, src, Instant::now());
    }

    /// Prune expired entries relative to `now`, then append the operation.
    pub fn push_at(&mut self, op: Option<O>, src: SourceId, now: Instant) {
        self.prune(now);
        self.ops.push_back(CachedOp { op, src, time: now });
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.ops.front() {
            if now.saturating_duration_since(front.time) <= self.timeout {
                break;
            }
            self.ops.pop_front();
        }
    }

    /// The newest `n` operations, oldest first.
    ///
    /// `None` when fewer than `n` operations are cached: the version gap
    /// cannot be bridged.
    pub fn window(&self, n: usize) -> Option<impl Iterator<Item = &CachedOp<O>>> {
        let len = self.ops.len();
        if n > len {
            return None;
        }
        Some(self.ops.range(len - n..))
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &CachedOp<O>> {
        self.ops.iter()
    }
}
