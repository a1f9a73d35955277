//! REST snapshot responses.
//!
//! `/queue` and `/history` return the backend's complete view of the
//! execution queue and the finished-prompt history. Snapshots are
//! authoritative: the queue engine applies them by wholesale
//! replacement, so a single bad row must never sink the whole response.
//! Each row therefore decodes through [`MaybeEntry`], which falls back
//! to keeping the raw JSON when a row does not match the expected
//! shape.

use std::collections::HashMap;

use comfymirror_core::{NodeId, PromptId};
use serde::Deserialize;

/// One accepted prompt, as the backend transmits it.
///
/// On the wire this is a 5-element array:
/// `[number, prompt_id, inputs, extra_data, output_nodes]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawSubmission")]
pub struct PromptSubmission {
    /// Monotonically increasing submission ordinal. Negative values
    /// occur when a prompt was pushed to the front of the queue.
    pub number: i64,
    pub prompt_id: PromptId,
    /// The node graph to execute, keyed by node id. Opaque here.
    pub inputs: serde_json::Value,
    /// Client-supplied metadata echoed back verbatim.
    pub extra_data: serde_json::Value,
    /// Nodes expected to produce user-visible output.
    pub output_nodes: Vec<NodeId>,
}

#[derive(Deserialize)]
struct RawSubmission(
    i64,
    PromptId,
    serde_json::Value,
    serde_json::Value,
    Vec<NodeId>,
);

impl From<RawSubmission> for PromptSubmission {
    fn from(raw: RawSubmission) -> Self {
        Self {
            number: raw.0,
            prompt_id: raw.1,
            inputs: raw.2,
            extra_data: raw.3,
            output_nodes: raw.4,
        }
    }
}

/// A row that either matched the expected shape or is preserved raw.
///
/// Untagged: deserialization first tries `T`, then falls back to the
/// raw JSON value. The fallback never fails, so snapshot decoding as a
/// whole is total as long as the outer response is valid JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MaybeEntry<T> {
    Valid(T),
    Malformed(serde_json::Value),
}

impl<T> MaybeEntry<T> {
    /// The decoded row, or `None` for a malformed one.
    pub fn valid(&self) -> Option<&T> {
        match self {
            MaybeEntry::Valid(v) => Some(v),
            MaybeEntry::Malformed(_) => None,
        }
    }

    /// Consuming variant of [`valid`](Self::valid).
    pub fn into_valid(self) -> Option<T> {
        match self {
            MaybeEntry::Valid(v) => Some(v),
            MaybeEntry::Malformed(_) => None,
        }
    }
}

/// `GET /queue` response: currently running and still pending prompts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueSnapshot {
    #[serde(rename = "queue_running", default)]
    pub running: Vec<MaybeEntry<PromptSubmission>>,
    #[serde(rename = "queue_pending", default)]
    pub pending: Vec<MaybeEntry<PromptSubmission>>,
}

/// `GET /history` response: finished prompts keyed by prompt id.
pub type HistorySnapshot = HashMap<PromptId, MaybeEntry<HistoryEntry>>;

/// One finished prompt in the history.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    /// The original submission tuple.
    pub prompt: PromptSubmission,
    /// Outputs produced per node. Empty when every node was served
    /// from cache.
    #[serde(default)]
    pub outputs: HashMap<NodeId, serde_json::Value>,
}

/// Parse a `/queue` response body.
pub fn parse_queue_snapshot(body: &str) -> Result<QueueSnapshot, serde_json::Error> {
    serde_json::from_str(body)
}

/// Parse a `/history` response body.
pub fn parse_history_snapshot(body: &str) -> Result<HistorySnapshot, serde_json::Error> {
    serde_json::from_str(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_snapshot_decodes_both_lists() {
        let body = r#"{
            "queue_running": [[4, "run-1", {"3": {"class_type": "KSampler"}}, {}, ["9"]]],
            "queue_pending": [
                [5, "pend-1", {}, {"client_id": "ui"}, ["9", "10"]],
                [6, "pend-2", {}, {}, []]
            ]
        }"#;
        let snap = parse_queue_snapshot(body).unwrap();

        let running: Vec<_> = snap.running.iter().filter_map(MaybeEntry::valid).collect();
        let pending: Vec<_> = snap.pending.iter().filter_map(MaybeEntry::valid).collect();

        assert_eq!(running.len(), 1);
        assert_eq!(running[0].prompt_id, "run-1");
        assert_eq!(running[0].number, 4);
        assert_eq!(running[0].output_nodes, vec!["9".to_string()]);

        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].prompt_id, "pend-2");
        assert!(pending[1].output_nodes.is_empty());
    }

    #[test]
    fn empty_queue_response_defaults_to_empty_lists() {
        let snap = parse_queue_snapshot("{}").unwrap();
        assert!(snap.running.is_empty());
        assert!(snap.pending.is_empty());
    }

    #[test]
    fn malformed_row_is_preserved_without_sinking_the_rest() {
        // Second row has the ordinal as a string — wrong shape.
        let body = r#"{
            "queue_pending": [
                [7, "ok-1", {}, {}, []],
                ["seven", "bad-1", {}, {}, []],
                [8, "ok-2", {}, {}, []]
            ]
        }"#;
        let snap = parse_queue_snapshot(body).unwrap();

        assert_eq!(snap.pending.len(), 3);
        let valid: Vec<_> = snap.pending.iter().filter_map(MaybeEntry::valid).collect();
        assert_eq!(valid.len(), 2);
        assert_eq!(valid[0].prompt_id, "ok-1");
        assert_eq!(valid[1].prompt_id, "ok-2");
        assert!(snap.pending[1].valid().is_none());
    }

    #[test]
    fn history_snapshot_decodes_prompt_and_outputs() {
        let body = r#"{
            "done-1": {
                "prompt": [2, "done-1", {}, {}, ["9"]],
                "outputs": {"9": {"images": [{"filename": "a.png"}]}}
            },
            "done-2": {
                "prompt": [3, "done-2", {}, {}, ["9"]]
            }
        }"#;
        let hist = parse_history_snapshot(body).unwrap();

        let e1 = hist["done-1"].valid().unwrap();
        assert_eq!(e1.prompt.number, 2);
        assert!(e1.outputs.contains_key("9"));

        // Missing outputs field defaults to an empty map.
        let e2 = hist["done-2"].valid().unwrap();
        assert!(e2.outputs.is_empty());
    }

    #[test]
    fn history_entry_with_wrong_shape_is_malformed() {
        let body = r#"{
            "weird": {"prompt": "not a tuple"},
            "fine": {"prompt": [1, "fine", {}, {}, []]}
        }"#;
        let hist = parse_history_snapshot(body).unwrap();
        assert!(hist["weird"].valid().is_none());
        assert!(hist["fine"].valid().is_some());
    }

    #[test]
    fn negative_ordinal_from_front_of_queue_insertion() {
        let body = r#"{"queue_pending": [[-1, "front", {}, {}, []]]}"#;
        let snap = parse_queue_snapshot(body).unwrap();
        assert_eq!(snap.pending[0].valid().unwrap().number, -1);
    }
}
