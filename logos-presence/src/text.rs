//! Plain-text document type with cursor/selection presence.
//!
//! A small reference type for hosts that edit flat text. Operations are
//! single inserts or deletes addressed by char offset, and presence is a
//! selection whose endpoints follow the edits:
//!
//! ```text
//!   "hello world"      selection 6..11 ("world")
//!   Insert { pos: 0, text: ">> " }
//!   ">> hello world"   selection 9..14
//! ```

use serde::{Deserialize, Serialize};

use crate::doc::{DocType, PendingOp, PresenceCapability, PresenceDocument};

// ───────────────────────────────────────────────────────────────────
// Operations and presence
// ───────────────────────────────────────────────────────────────────

/// A text edit addressed by char offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextOp {
    Insert { pos: usize, text: String },
    Delete { pos: usize, len: usize },
}

impl TextOp {
    pub fn insert(pos: usize, text: impl Into<String>) -> Self {
        TextOp::Insert { pos, text: text.into() }
    }

    pub fn delete(pos: usize, len: usize) -> Self {
        TextOp::Delete { pos, len }
    }

    /// Apply to `content`. Offsets past the end are clamped.
    pub fn apply(&self, content: &mut String) {
        match self {
            TextOp::Insert { pos, text } => {
                let at = byte_offset(content, *pos);
                content.insert_str(at, text);
            }
            TextOp::Delete { pos, len } => {
                let start = byte_offset(content, *pos);
                let end = byte_offset(content, pos.saturating_add(*len));
                content.replace_range(start..end, "");
            }
        }
    }

    /// Move a char offset so it addresses the same place after this op.
    ///
    /// An offset exactly at an insert point only moves past the insert when
    /// the op is the offset owner's own edit.
    pub fn transform_index(&self, index: usize, is_own_op: bool) -> usize {
        match self {
            TextOp::Insert { pos, text } => {
                if index > *pos || (index == *pos && is_own_op) {
                    index.saturating_add(text.chars().count())
                } else {
                    index
                }
            }
            TextOp::Delete { pos, len } => {
                let end = pos.saturating_add(*len);
                if index <= *pos {
                    index
                } else if index >= end {
                    index - (end - pos)
                } else {
                    *pos
                }
            }
        }
    }
}

fn byte_offset(content: &str, char_index: usize) -> usize {
    content
        .char_indices()
        .nth(char_index)
        .map_or(content.len(), |(at, _)| at)
}

/// A selection; a collapsed selection is a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSelection {
    pub anchor: usize,
    pub head: usize,
}

impl TextSelection {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    pub fn cursor(at: usize) -> Self {
        Self { anchor: at, head: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }
}

// ───────────────────────────────────────────────────────────────────
// Document type
// ───────────────────────────────────────────────────────────────────

/// The plain-text document type.
#[derive(Debug, Clone, Copy)]
pub struct PlainText {
    presence: bool,
}

impl PlainText {
    pub fn new() -> Self {
        Self { presence: true }
    }

    /// A variant of the type that cannot carry presence.
    pub fn without_presence() -> Self {
        Self { presence: false }
    }
}

impl Default for PlainText {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceCapability<TextSelection, TextOp> for PlainText {
    fn create_presence(&self, raw: TextSelection) -> TextSelection {
        raw
    }

    fn transform_presence(&self, presence: &TextSelection, op: &TextOp, is_own_op: bool) -> TextSelection {
        TextSelection {
            anchor: op.transform_index(presence.anchor, is_own_op),
            head: op.transform_index(presence.head, is_own_op),
        }
    }

    fn compare_presence(&self, a: &TextSelection, b: &TextSelection) -> Option<bool> {
        Some(a == b)
    }
}

impl DocType<TextSelection, TextOp> for PlainText {
    fn name(&self) -> &str {
        "plain-text"
    }

    fn presence(&self) -> Option<&dyn PresenceCapability<TextSelection, TextOp>> {
        self.presence
            .then_some(self as &dyn PresenceCapability<TextSelection, TextOp>)
    }
}

// ───────────────────────────────────────────────────────────────────
// In-memory host document
// ───────────────────────────────────────────────────────────────────

/// Minimal text document tracking the state presence depends on.
///
/// Local edits apply immediately and queue as pending ops; `send_next`
/// moves one to inflight and `ack_inflight` commits it. Remote ops are
/// applied as-is without transforming against pending local ops.
#[derive(Debug, Default)]
pub struct TextDocument {
    doc_type: Option<PlainText>,
    content: String,
    version: Option<u64>,
    inflight: Option<PendingOp<TextOp>>,
    pending: Vec<PendingOp<TextOp>>,
    subscribed: bool,
}

impl TextDocument {
    /// A document that has not been created yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A created, subscribed document at `version`.
    pub fn created(doc_type: PlainText, content: impl Into<String>, version: u64) -> Self {
        Self {
            doc_type: Some(doc_type),
            content: content.into(),
            version: Some(version),
            inflight: None,
            pending: Vec::new(),
            subscribed: true,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_subscribed(&mut self, subscribed: bool) {
        self.subscribed = subscribed;
    }

    pub fn set_version(&mut self, version: u64) {
        self.version = Some(version);
    }

    /// Apply a local edit and queue it for sending.
    pub fn submit_op(&mut self, op: TextOp) {
        op.apply(&mut self.content);
        self.pending.push(PendingOp::edit(op));
    }

    /// Queue a local structural change (e.g. delete-and-recreate).
    pub fn submit_structural(&mut self) {
        self.pending.push(PendingOp::structural());
    }

    /// Move the oldest pending op to inflight.
    pub fn send_next(&mut self) -> Option<&PendingOp<TextOp>> {
        if self.inflight.is_some() || self.pending.is_empty() {
            return None;
        }
        self.inflight = Some(self.pending.remove(0));
        self.inflight.as_ref()
    }

    /// The server accepted the inflight op: the version advances.
    pub fn ack_inflight(&mut self) -> Option<PendingOp<TextOp>> {
        let op = self.inflight.take()?;
        self.version = Some(self.version.map_or(1, |v| v + 1));
        Some(op)
    }

    /// Apply an op committed by another client.
    pub fn apply_remote(&mut self, op: &TextOp) {
        op.apply(&mut self.content);
        self.version = Some(self.version.map_or(1, |v| v + 1));
    }
}

impl PresenceDocument<TextSelection, TextOp> for TextDocument {
    fn doc_type(&self) -> Option<&dyn DocType<TextSelection, TextOp>> {
        self.doc_type
            .as_ref()
            .map(|t| t as &dyn DocType<TextSelection, TextOp>)
    }

    fn version(&self) -> Option<u64> {
        self.version
    }

    fn inflight_op(&self) -> Option<&PendingOp<TextOp>> {
        self.inflight.as_ref()
    }

    fn pending_ops(&self) -> &[PendingOp<TextOp>] {
        &self.pending
    }

    fn has_write_pending(&self) -> bool {
        self.inflight.is_some() || !self.pending.is_empty()
    }

    fn is_subscribed(&self) -> bool {
        self.subscribed
    }
}
