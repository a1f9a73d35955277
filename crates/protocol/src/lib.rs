//! Typed wire shapes for the ComfyUI execution API.
//!
//! Two independent delivery paths feed the queue mirror and both are
//! modelled here:
//!
//! - [`messages`] — incremental WebSocket event notifications
//!   (`{"type": ..., "data": ...}` frames), one fact per frame.
//! - [`snapshots`] — authoritative full-state REST responses
//!   (`/queue`, `/history`) applied by wholesale replacement.
//!
//! This crate only describes and decodes the shapes; interpreting them
//! is the queue engine's job.

pub mod messages;
pub mod snapshots;

pub use messages::{parse_message, ComfyMessage};
pub use snapshots::{
    parse_history_snapshot, parse_queue_snapshot, HistoryEntry, HistorySnapshot, MaybeEntry,
    PromptSubmission, QueueSnapshot,
};
