//! The shared queue state store.
//!
//! One [`QueueStore`] holds the mirror's entire view: the queued and
//! completed collections plus the transient execution scalars. Both
//! update sources (snapshot ingestion and event reconciliation, in
//! sibling modules) mutate it through `&self` methods that take the
//! internal lock for the full duration of a mutation, so readers never
//! observe a half-applied step. Consumers read via cloning accessors
//! and follow changes through [`QueueStore::subscribe`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use comfymirror_core::{NodeId, Progress, PromptId};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::entry::{CompletedEntry, CompletionStatus, QueueEntry};
use crate::locate::locate;

/// Default buffer capacity for the change broadcast channel.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Construction-time tunables for a [`QueueStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity of the change broadcast channel. Slow subscribers that
    /// fall more than this many changes behind observe a lag error and
    /// should re-read the collections.
    pub channel_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            channel_capacity: CHANGE_CHANNEL_CAPACITY,
        }
    }
}

/// A change notification, published after every applied mutation.
///
/// Carries enough to know what moved; subscribers re-read the
/// collections for the data itself.
#[derive(Debug, Clone, Serialize)]
pub enum QueueChange {
    /// The queued collection was wholesale-replaced from a snapshot.
    QueueReplaced,
    /// The completed collection was wholesale-replaced from a snapshot.
    HistoryReplaced,
    /// The backend reported a new remaining queue depth.
    StatusChanged { queue_remaining: u32 },
    /// A newly submitted prompt joined the queue.
    PromptQueued { prompt_id: PromptId },
    /// A node began executing.
    NodeStarted { node: NodeId },
    /// A prompt reached a terminal state.
    PromptCompleted {
        prompt_id: PromptId,
        status: CompletionStatus,
    },
    /// A node produced output for a still-queued prompt.
    OutputProduced { prompt_id: PromptId, node: NodeId },
    /// Step progress within the current node.
    ProgressChanged { progress: Progress },
    /// The transient progress/current-node scalars were reset without
    /// any prompt completing (e.g. a terminal event for a prompt this
    /// mirror does not know). Consumers should stop showing progress.
    ProgressCleared,
}

/// Why an incoming notification or snapshot row was discarded.
///
/// Anomalies are non-fatal: the offending unit is skipped, warned, and
/// counted, and the rest of the store is left intact.
#[derive(Debug, thiserror::Error)]
pub enum DropReason {
    /// The event addressed a prompt that is not in the queue and was
    /// never completed — unknown to this mirror.
    #[error("prompt {0} is not tracked by this mirror")]
    UnknownPrompt(PromptId),

    /// A submission arrived for a prompt id already in the queue.
    #[error("prompt {0} is already queued")]
    DuplicatePrompt(PromptId),

    /// The event addressed a prompt that already reached a terminal
    /// state. Completed entries never change.
    #[error("prompt {0} already completed")]
    AlreadyCompleted(PromptId),

    /// A snapshot row did not match the expected shape.
    #[error("snapshot row does not match the expected shape")]
    MalformedSnapshotRow,
}

/// Mutable state behind the lock.
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    /// Queued prompts in submission order. The currently executing
    /// prompt, if any, is the head of this collection — there is no
    /// separate running list.
    pub queued: Vec<QueueEntry>,
    /// Finished prompts. Append-only between history snapshots.
    pub completed: Vec<CompletedEntry>,
    /// Remaining queue depth as last reported by the backend.
    pub queue_remaining: Option<u32>,
    /// The node currently executing. Doubles as the "something is
    /// executing" marker.
    pub current_node: Option<NodeId>,
    /// Step progress within the current node.
    pub progress: Option<Progress>,
}

impl QueueState {
    /// Whether the id is present in the completed collection.
    pub fn is_completed(&self, prompt_id: &str) -> bool {
        self.completed.iter().any(|c| c.entry.prompt_id == prompt_id)
    }

    /// Reset the transient execution scalars.
    pub fn clear_transients(&mut self) {
        self.progress = None;
        self.current_node = None;
    }
}

/// The shared, observable queue state.
///
/// Create once and share by reference (or `Arc`) between the transport
/// feeding it and the consumers reading it.
pub struct QueueStore {
    state: Mutex<QueueState>,
    changes: broadcast::Sender<QueueChange>,
    dropped: AtomicU64,
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl QueueStore {
    pub fn new(config: StoreConfig) -> Self {
        let (changes, _) = broadcast::channel(config.channel_capacity);
        Self {
            state: Mutex::new(QueueState::default()),
            changes,
            dropped: AtomicU64::new(0),
        }
    }

    // ---- read surface ----

    /// Queued prompts in submission order (cloned).
    pub fn queued(&self) -> Vec<QueueEntry> {
        self.state().queued.clone()
    }

    /// Finished prompts (cloned).
    pub fn completed(&self) -> Vec<CompletedEntry> {
        self.state().completed.clone()
    }

    /// Remaining queue depth as last reported by the backend.
    pub fn queue_remaining(&self) -> Option<u32> {
        self.state().queue_remaining
    }

    /// The node currently executing, if any.
    pub fn current_node(&self) -> Option<NodeId> {
        self.state().current_node.clone()
    }

    /// Step progress within the current node, if any.
    pub fn progress(&self) -> Option<Progress> {
        self.state().progress
    }

    /// Derived view: the prompt currently executing.
    ///
    /// The executing prompt is the head of the queued collection while
    /// the current-node marker is set. The marker is re-derived from
    /// events, never carried over from snapshots.
    pub fn executing_prompt_id(&self) -> Option<PromptId> {
        let state = self.state();
        if state.current_node.is_some() {
            state.queued.first().map(|e| e.prompt_id.clone())
        } else {
            None
        }
    }

    /// A cloned entry by prompt id, if still queued.
    pub fn find_queued(&self, prompt_id: &str) -> Option<QueueEntry> {
        let state = self.state();
        locate(&state.queued, prompt_id).map(|hit| hit.entry.clone())
    }

    /// Subscribe to change notifications.
    ///
    /// Every applied mutation publishes exactly one [`QueueChange`].
    pub fn subscribe(&self) -> broadcast::Receiver<QueueChange> {
        self.changes.subscribe()
    }

    /// How many inputs (events or snapshot rows) have been discarded.
    ///
    /// A moving counter with an idle queue indicates the mirror and
    /// the backend have drifted; trigger a snapshot resync.
    pub fn dropped_inputs(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    // ---- shared internals for the ingestor and reconciler ----

    pub(crate) fn state(&self) -> MutexGuard<'_, QueueState> {
        // A poisoned lock means a panicking reader mid-clone; the
        // state itself is never left half-mutated, so recover.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a change. With zero subscribers this is a no-op.
    pub(crate) fn publish(&self, change: QueueChange) {
        // Ignore the SendError — it only means nobody is listening.
        let _ = self.changes.send(change);
    }

    /// Record a discarded input: warn and bump the counter.
    pub(crate) fn drop_input(&self, reason: DropReason) {
        tracing::warn!(%reason, "Discarding queue input");
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_is_empty() {
        let store = QueueStore::default();
        assert!(store.queued().is_empty());
        assert!(store.completed().is_empty());
        assert!(store.queue_remaining().is_none());
        assert!(store.current_node().is_none());
        assert!(store.progress().is_none());
        assert!(store.executing_prompt_id().is_none());
        assert_eq!(store.dropped_inputs(), 0);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let store = QueueStore::default();
        store.publish(QueueChange::ProgressCleared);
    }

    #[test]
    fn subscriber_receives_published_change() {
        let store = QueueStore::default();
        let mut rx = store.subscribe();
        store.publish(QueueChange::StatusChanged { queue_remaining: 2 });

        let change = rx.try_recv().expect("change should be buffered");
        assert!(matches!(
            change,
            QueueChange::StatusChanged { queue_remaining: 2 }
        ));
    }

    #[test]
    fn drop_input_moves_the_counter() {
        let store = QueueStore::default();
        store.drop_input(DropReason::UnknownPrompt("ghost".into()));
        store.drop_input(DropReason::MalformedSnapshotRow);
        assert_eq!(store.dropped_inputs(), 2);
    }

    #[test]
    fn find_queued_clones_the_entry() {
        let store = QueueStore::default();
        store.state().queued.push(QueueEntry {
            number: 1,
            prompt_id: "p1".into(),
            inputs: serde_json::json!({}),
            extra_data: serde_json::json!({}),
            output_nodes: vec![],
            queued_at: None,
            finished_at: None,
            outputs: Default::default(),
        });

        assert_eq!(store.find_queued("p1").unwrap().number, 1);
        assert!(store.find_queued("p2").is_none());
    }

    #[test]
    fn drop_reasons_render_for_logs() {
        let reason = DropReason::AlreadyCompleted("p9".into());
        assert_eq!(reason.to_string(), "prompt p9 already completed");
    }
}
