//! Snapshot ingestion.
//!
//! Snapshots are the authoritative source: applied on (re)connect and
//! on periodic resync, they wholesale-replace the corresponding
//! collection and override any partial view built from events. Both
//! operations are total — a malformed or conflicting row is skipped
//! and counted, never an error — and idempotent.

use std::collections::HashSet;

use comfymirror_protocol::{HistorySnapshot, QueueSnapshot};

use crate::entry::{CompletedEntry, CompletionStatus, QueueEntry};
use crate::store::{DropReason, QueueChange, QueueStore};

impl QueueStore {
    /// Replace the queued collection with the backend's view.
    ///
    /// Running entries are integrated first so the executing prompt
    /// sits at the head, but its "current" status is re-derived from
    /// the node marker — never carried over from prior local state.
    /// The remaining depth is recorded as the size of the pending
    /// portion.
    ///
    /// Skipped rows: malformed, duplicate ids within the snapshot, and
    /// ids already completed (Completed is terminal; terminal wins).
    pub fn apply_queue_snapshot(&self, snapshot: &QueueSnapshot) {
        let mut state = self.state();

        let mut seen: HashSet<&str> = HashSet::new();
        let mut queued: Vec<QueueEntry> = Vec::new();
        let mut pending_depth: u32 = 0;

        for (is_pending, rows) in [(false, &snapshot.running), (true, &snapshot.pending)] {
            for row in rows {
                let Some(submission) = row.valid() else {
                    self.drop_input(DropReason::MalformedSnapshotRow);
                    continue;
                };
                if !seen.insert(submission.prompt_id.as_str()) {
                    self.drop_input(DropReason::DuplicatePrompt(submission.prompt_id.clone()));
                    continue;
                }
                if state.is_completed(&submission.prompt_id) {
                    self.drop_input(DropReason::AlreadyCompleted(submission.prompt_id.clone()));
                    continue;
                }
                queued.push(QueueEntry::from_snapshot(submission));
                if is_pending {
                    pending_depth += 1;
                }
            }
        }

        tracing::debug!(
            queued = queued.len(),
            pending = pending_depth,
            "Applied queue snapshot",
        );

        state.queued = queued;
        state.queue_remaining = Some(pending_depth);
        drop(state);

        self.publish(QueueChange::QueueReplaced);
    }

    /// Replace the completed collection with the backend's history.
    ///
    /// Status is derived, not transmitted: a history entry with at
    /// least one recorded output finished as `Success`; one with none
    /// was served entirely from cache, `AllCached`. Entries are
    /// ordered by submission ordinal so repeated ingestion of the same
    /// history yields the same collection.
    ///
    /// Any still-queued prompt that now appears in history is removed
    /// from the queue: the history is authoritative about terminal
    /// state, and this heals a missed terminal event.
    pub fn apply_history_snapshot(&self, history: &HistorySnapshot) {
        let mut state = self.state();

        let mut seen: HashSet<&str> = HashSet::new();
        let mut completed: Vec<CompletedEntry> = Vec::new();

        for row in history.values() {
            let Some(hist) = row.valid() else {
                self.drop_input(DropReason::MalformedSnapshotRow);
                continue;
            };
            if !seen.insert(hist.prompt.prompt_id.as_str()) {
                self.drop_input(DropReason::DuplicatePrompt(hist.prompt.prompt_id.clone()));
                continue;
            }

            let mut entry = QueueEntry::from_snapshot(&hist.prompt);
            entry.outputs = hist.outputs.clone();
            let status = if entry.outputs.is_empty() {
                CompletionStatus::AllCached
            } else {
                CompletionStatus::Success
            };
            completed.push(CompletedEntry {
                entry,
                status,
                error: None,
            });
        }

        completed.sort_by_key(|c| c.entry.number);

        let before = state.queued.len();
        state
            .queued
            .retain(|e| !completed.iter().any(|c| c.entry.prompt_id == e.prompt_id));
        let healed = before - state.queued.len();

        tracing::debug!(
            completed = completed.len(),
            healed,
            "Applied history snapshot",
        );

        state.completed = completed;
        drop(state);

        self.publish(QueueChange::HistoryReplaced);
    }

    /// Record the backend-reported remaining queue depth.
    pub fn apply_status(&self, queue_remaining: u32) {
        self.state().queue_remaining = Some(queue_remaining);
        self.publish(QueueChange::StatusChanged { queue_remaining });
    }
}
