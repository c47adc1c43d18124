//! # logos-presence — Ephemeral presence for collaboratively edited documents
//!
//! Tracks where every participant's cursor or selection is in a shared
//! document and keeps those positions valid while operations are applied
//! concurrently. Presence is not persisted and delivery is best effort.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────────┐  submit   ┌─────────────────────────────┐  send_presence  ┌───────────┐
//!  │ host / UI    │ ────────► │ DocPresence                 │ ──────────────► │ transport │
//!  │              │ ◄──────── │  ├ PresenceState            │ ◄────────────── │ (relay)   │
//!  └──────────────┘  events   │  │  current / received      │   envelopes     └───────────┘
//!         │                   │  │  pending / inflight      │
//!         │ op applied /      │  │  OpCache (rolling window)│
//!         └─ committed ─────► │  └ deferred FIFO            │
//!                             └──────────────┬──────────────┘
//!                                            │ TransformEngine
//!                                            ▼
//!                                   PresenceCapability (per type)
//! ```
//!
//! ## Modules
//!
//! - [`presence`] — the per-document component and its deferred queue driver
//! - [`state`] — presence state, completion batches, received envelopes
//! - [`op_cache`] — time-bounded window of committed operations
//! - [`transform`] — composition of presence through operation sequences
//! - [`doc`] — host boundary traits and type capability descriptors
//! - [`protocol`] — bincode-encoded presence envelope
//! - [`text`] — plain-text reference type with selection presence
//!
//! Submission, reception and lifecycle handling live in private modules as
//! `impl DocPresence` blocks.

pub mod config;
pub mod doc;
pub mod error;
pub mod events;
pub mod op_cache;
pub mod presence;
pub mod protocol;
pub mod state;
pub mod text;
pub mod transform;

mod lifecycle;
mod receive;
mod submit;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use config::PresenceConfig;
pub use doc::{DocType, PendingOp, PresenceCapability, PresenceDocument, PresenceTransport};
pub use error::PresenceError;
pub use events::PresenceEvent;
pub use op_cache::{CachedOp, OpCache};
pub use presence::DocPresence;
pub use protocol::{PresenceEnvelope, ProtocolError, SourceId, LOCAL_SOURCE};
pub use state::{Batch, Completion, CompletionResult, Inflight, PresenceState, ReceivedEnvelope};
pub use text::{PlainText, TextDocument, TextOp, TextSelection};
pub use transform::TransformEngine;
