//! Routing from parsed backend messages to store mutations.
//!
//! The transport (whatever delivers WebSocket frames — out of scope
//! here) hands each frame to [`apply_text`] or, already parsed, to
//! [`apply_message`]. Delivery must preserve per-prompt causal order:
//! submitted, then outputs/progress, then exactly one terminal event.
//! A single ordered channel per connection gives this for free; after
//! any suspected gap, resync with the snapshot ingestor instead of
//! replaying.

use comfymirror_protocol::{parse_message, ComfyMessage};

use crate::reconcile::QueueEvent;
use crate::store::QueueStore;

/// Apply one parsed backend message to the store.
pub fn apply_message(store: &QueueStore, message: ComfyMessage) {
    match message {
        ComfyMessage::Status(payload) => {
            store.apply_status(payload.status.exec_info.queue_remaining);
        }
        ComfyMessage::ExecutionStart(payload) => {
            // Informational only; the executing marker is derived from
            // the `executing` message that follows.
            tracing::debug!(prompt_id = %payload.prompt_id, "Prompt started executing");
        }
        ComfyMessage::Executing(payload) => match payload.node {
            Some(node) => store.apply_event(QueueEvent::NodeStarted { node }),
            // A null node means the prompt finished.
            None => store.apply_event(QueueEvent::Finished {
                prompt_id: payload.prompt_id,
            }),
        },
        ComfyMessage::Progress(progress) => {
            store.apply_event(QueueEvent::Progress(progress));
        }
        ComfyMessage::Executed(payload) => {
            store.apply_event(QueueEvent::Output {
                prompt_id: payload.prompt_id,
                node: payload.node,
                output: payload.output,
            });
        }
        ComfyMessage::ExecutionCached(payload) => {
            store.apply_event(QueueEvent::Cached {
                prompt_id: payload.prompt_id,
                nodes: payload.nodes,
            });
        }
        ComfyMessage::ExecutionError(payload) => {
            if let Some(node_id) = &payload.node_id {
                tracing::debug!(
                    prompt_id = %payload.prompt_id,
                    node_id = %node_id,
                    exception_type = payload.exception_type.as_deref().unwrap_or("unknown"),
                    "Execution error detail",
                );
            }
            store.apply_event(QueueEvent::Failed {
                prompt_id: payload.prompt_id,
                message: payload.exception_message,
            });
        }
    }
}

/// Parse a raw text frame and apply it.
///
/// Malformed frames and unknown message kinds are logged and skipped;
/// the mirror keeps running on whatever arrives next.
pub fn apply_text(store: &QueueStore, text: &str) {
    match parse_message(text) {
        Ok(message) => apply_message(store, message),
        Err(error) => {
            tracing::warn!(%error, raw_message = %text, "Failed to parse backend message");
        }
    }
}
