//! Incremental event reconciliation.
//!
//! One [`QueueEvent`] at a time moves or mutates individual entries
//! without requiring a snapshot. Preconditions that fail (a terminal
//! event for a prompt this mirror never saw, a duplicate submission)
//! drop the event: warned, counted, and the store left intact — except
//! that terminal events always reset the transient progress scalars,
//! found or not, so a ghost prompt cannot pin stale progress on
//! screen.

use chrono::Utc;
use comfymirror_core::{NodeId, Progress, PromptId};

use crate::entry::{CompletedEntry, CompletionStatus, QueueEntry};
use crate::locate::locate;
use crate::store::{DropReason, QueueChange, QueueStore};

/// One incremental notification, addressed to the queue mirror.
///
/// A closed set: adding a kind means handling it in
/// [`QueueStore::apply_event`], checked at compile time.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// A prompt was accepted by the backend.
    Submitted {
        prompt_id: PromptId,
        number: i64,
        inputs: serde_json::Value,
        extra_data: serde_json::Value,
        output_nodes: Vec<NodeId>,
    },
    /// A node began executing. The prompt stays queued.
    NodeStarted { node: NodeId },
    /// The prompt finished executing successfully.
    Finished { prompt_id: PromptId },
    /// Some nodes were served from the backend cache.
    Cached {
        prompt_id: PromptId,
        nodes: Vec<NodeId>,
    },
    /// The prompt failed.
    Failed {
        prompt_id: PromptId,
        message: String,
    },
    /// A node produced output for a still-executing prompt.
    Output {
        prompt_id: PromptId,
        node: NodeId,
        output: serde_json::Value,
    },
    /// Step progress within the current node.
    Progress(Progress),
}

impl QueueStore {
    /// Apply one incremental event as a single visible step.
    pub fn apply_event(&self, event: QueueEvent) {
        match event {
            QueueEvent::Submitted {
                prompt_id,
                number,
                inputs,
                extra_data,
                output_nodes,
            } => self.on_submitted(prompt_id, number, inputs, extra_data, output_nodes),
            QueueEvent::NodeStarted { node } => self.on_node_started(node),
            QueueEvent::Finished { prompt_id } => self.on_finished(prompt_id),
            QueueEvent::Cached { prompt_id, nodes } => self.on_cached(prompt_id, nodes),
            QueueEvent::Failed { prompt_id, message } => self.on_failed(prompt_id, message),
            QueueEvent::Output {
                prompt_id,
                node,
                output,
            } => self.on_output(prompt_id, node, output),
            QueueEvent::Progress(progress) => self.on_progress(progress),
        }
    }

    fn on_submitted(
        &self,
        prompt_id: PromptId,
        number: i64,
        inputs: serde_json::Value,
        extra_data: serde_json::Value,
        output_nodes: Vec<NodeId>,
    ) {
        let mut state = self.state();

        if locate(&state.queued, &prompt_id).is_some() {
            self.drop_input(DropReason::DuplicatePrompt(prompt_id));
            return;
        }
        if state.is_completed(&prompt_id) {
            self.drop_input(DropReason::AlreadyCompleted(prompt_id));
            return;
        }

        tracing::debug!(prompt_id = %prompt_id, number, "Prompt queued");
        state.queued.push(QueueEntry {
            number,
            prompt_id: prompt_id.clone(),
            inputs,
            extra_data,
            output_nodes,
            queued_at: Some(Utc::now()),
            finished_at: None,
            outputs: Default::default(),
        });
        drop(state);

        self.publish(QueueChange::PromptQueued { prompt_id });
    }

    fn on_node_started(&self, node: NodeId) {
        let mut state = self.state();
        state.progress = None;
        state.current_node = Some(node.clone());
        drop(state);

        self.publish(QueueChange::NodeStarted { node });
    }

    fn on_finished(&self, prompt_id: PromptId) {
        self.terminal(prompt_id, CompletionStatus::Success, None, |_| true)
    }

    fn on_cached(&self, prompt_id: PromptId, nodes: Vec<NodeId>) {
        // Terminal only when the cache covered every expected output;
        // a partial hit means the rest still executes.
        self.terminal(prompt_id, CompletionStatus::AllCached, None, |entry| {
            nodes.len() >= entry.output_nodes.len()
        })
    }

    fn on_failed(&self, prompt_id: PromptId, message: String) {
        self.terminal(prompt_id, CompletionStatus::Error, Some(message), |_| true)
    }

    /// Shared terminal transition: clear the transient scalars
    /// unconditionally, then move the entry to completed when it is
    /// present and `applies` holds for it.
    fn terminal(
        &self,
        prompt_id: PromptId,
        status: CompletionStatus,
        error: Option<String>,
        applies: impl FnOnce(&QueueEntry) -> bool,
    ) {
        let mut state = self.state();
        state.clear_transients();

        let hit = locate(&state.queued, &prompt_id).map(|hit| (hit.position, applies(hit.entry)));
        let change = match hit {
            Some((position, true)) => {
                let mut entry = state.queued.remove(position);
                entry.finished_at = Some(Utc::now());
                tracing::debug!(prompt_id = %entry.prompt_id, ?status, "Prompt completed");
                state.completed.push(CompletedEntry {
                    entry,
                    status,
                    error,
                });
                QueueChange::PromptCompleted { prompt_id, status }
            }
            Some((_, false)) => {
                // Precondition not met (partial cache hit): membership
                // untouched, but the scalars were still reset above.
                QueueChange::ProgressCleared
            }
            None => {
                if state.is_completed(&prompt_id) {
                    self.drop_input(DropReason::AlreadyCompleted(prompt_id));
                } else {
                    self.drop_input(DropReason::UnknownPrompt(prompt_id));
                }
                QueueChange::ProgressCleared
            }
        };
        drop(state);

        self.publish(change);
    }

    fn on_output(&self, prompt_id: PromptId, node: NodeId, output: serde_json::Value) {
        let mut state = self.state();

        let Some(position) = locate(&state.queued, &prompt_id).map(|hit| hit.position) else {
            if state.is_completed(&prompt_id) {
                self.drop_input(DropReason::AlreadyCompleted(prompt_id));
            } else {
                self.drop_input(DropReason::UnknownPrompt(prompt_id));
            }
            return;
        };

        state.queued[position].outputs.insert(node.clone(), output);
        drop(state);

        self.publish(QueueChange::OutputProduced { prompt_id, node });
    }

    fn on_progress(&self, progress: Progress) {
        self.state().progress = Some(progress);
        self.publish(QueueChange::ProgressChanged { progress });
    }
}
