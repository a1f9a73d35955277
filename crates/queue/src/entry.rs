//! Queue entry data model.
//!
//! A [`QueueEntry`] tracks one accepted prompt from submission until a
//! terminal transition turns it into a [`CompletedEntry`]. Entries are
//! plain data; all state transitions live on the store.

use std::collections::HashMap;

use comfymirror_core::{NodeId, PromptId, Timestamp};
use comfymirror_protocol::PromptSubmission;
use serde::{Deserialize, Serialize};

/// A prompt that has been accepted by the backend and not yet finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Submission ordinal. Queue order follows this.
    pub number: i64,
    pub prompt_id: PromptId,
    /// The node graph, opaque to the mirror.
    pub inputs: serde_json::Value,
    /// Client metadata echoed back by the backend.
    pub extra_data: serde_json::Value,
    /// Nodes expected to produce user-visible output.
    pub output_nodes: Vec<NodeId>,

    /// When this client queued the prompt. `None` for prompts
    /// discovered via snapshot — the backend does not transmit it.
    pub queued_at: Option<Timestamp>,
    /// Set exactly once, by the terminal transition.
    pub finished_at: Option<Timestamp>,

    /// Outputs collected while the prompt is still executing,
    /// keyed by the node that produced them.
    pub outputs: HashMap<NodeId, serde_json::Value>,
}

impl QueueEntry {
    /// Entry for a prompt discovered in a backend snapshot.
    pub fn from_snapshot(submission: &PromptSubmission) -> Self {
        Self {
            number: submission.number,
            prompt_id: submission.prompt_id.clone(),
            inputs: submission.inputs.clone(),
            extra_data: submission.extra_data.clone(),
            output_nodes: submission.output_nodes.clone(),
            queued_at: None,
            finished_at: None,
            outputs: HashMap::new(),
        }
    }
}

/// Terminal disposition of a finished prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    /// Finished and produced at least one output.
    Success,
    /// Failed; see [`CompletedEntry::error`].
    Error,
    /// Every expected output was served from the backend cache.
    AllCached,
    /// Disposition could not be determined.
    Unknown,
}

/// Terminal snapshot of a prompt: the entry plus its disposition.
///
/// Append-only within a session; status and error never change once
/// set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedEntry {
    pub entry: QueueEntry,
    pub status: CompletionStatus,
    /// Present only when `status` is [`CompletionStatus::Error`].
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(id: &str, number: i64) -> PromptSubmission {
        serde_json::from_value(serde_json::json!([number, id, {}, {}, ["9"]])).unwrap()
    }

    #[test]
    fn snapshot_entry_has_no_timestamps() {
        let entry = QueueEntry::from_snapshot(&submission("p", 3));
        assert_eq!(entry.number, 3);
        assert!(entry.queued_at.is_none());
        assert!(entry.finished_at.is_none());
        assert!(entry.outputs.is_empty());
    }

    #[test]
    fn status_serializes_snake_case() {
        let s = serde_json::to_string(&CompletionStatus::AllCached).unwrap();
        assert_eq!(s, r#""all_cached""#);
    }
}
