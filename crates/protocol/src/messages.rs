//! WebSocket event notifications.
//!
//! The backend pushes JSON frames shaped `{"type": "<kind>", "data": {...}}`,
//! one fact per frame. [`ComfyMessage`] covers the closed set of kinds the
//! queue mirror consumes; anything else is a parse error the caller logs
//! and skips.

use comfymirror_core::{NodeId, Progress, PromptId};
use serde::Deserialize;

/// One incremental notification from the backend.
///
/// Internally tagged on `"type"` with the payload under `"data"`, so the
/// set of kinds is closed at compile time — there is no string-keyed
/// handler table anywhere downstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ComfyMessage {
    /// Periodic queue-depth broadcast.
    #[serde(rename = "status")]
    Status(StatusPayload),

    /// A prompt left the pending queue and began executing.
    #[serde(rename = "execution_start")]
    ExecutionStart(ExecutionStartPayload),

    /// Nodes whose outputs were served from the backend cache.
    #[serde(rename = "execution_cached")]
    ExecutionCached(ExecutionCachedPayload),

    /// The node now executing, or prompt completion when `node` is null.
    #[serde(rename = "executing")]
    Executing(ExecutingPayload),

    /// Step progress within the current node.
    #[serde(rename = "progress")]
    Progress(Progress),

    /// A node finished and produced user-visible output.
    #[serde(rename = "executed")]
    Executed(ExecutedPayload),

    /// The prompt failed.
    #[serde(rename = "execution_error")]
    ExecutionError(ExecutionErrorPayload),
}

/// `status` payload. The depth is nested two levels deep on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusPayload {
    pub status: StatusBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusBody {
    pub exec_info: ExecInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecInfo {
    pub queue_remaining: u32,
}

/// `execution_start` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionStartPayload {
    pub prompt_id: PromptId,
}

/// `execution_cached` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionCachedPayload {
    pub prompt_id: PromptId,
    /// Nodes served from cache. Absent when nothing was cached.
    #[serde(default)]
    pub nodes: Vec<NodeId>,
}

/// `executing` payload.
///
/// `node: Some(..)` names the node that just started; `node: None`
/// means the prompt has finished executing.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingPayload {
    pub node: Option<NodeId>,
    pub prompt_id: PromptId,
}

/// `executed` payload — one node's output, produced mid-execution.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutedPayload {
    pub node: NodeId,
    /// Opaque output value (image lists, file references, ...).
    pub output: serde_json::Value,
    pub prompt_id: PromptId,
}

/// `execution_error` payload.
///
/// Only `prompt_id` and `exception_message` drive the queue mirror; the
/// rest is diagnostic context the backend includes and we keep for logs.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionErrorPayload {
    pub prompt_id: PromptId,
    pub exception_message: String,
    #[serde(default)]
    pub exception_type: Option<String>,
    #[serde(default)]
    pub node_id: Option<NodeId>,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub traceback: Vec<String>,
}

/// Parse one WebSocket text frame into a typed message.
///
/// Malformed JSON and unknown `type` values are errors; the transport
/// layer logs them and moves on to the next frame.
pub fn parse_message(text: &str) -> Result<ComfyMessage, serde_json::Error> {
    serde_json::from_str(text)
}
