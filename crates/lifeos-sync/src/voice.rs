//! Keeps a voice assistant informed about the selected node.

use std::fmt::Write as _;
use std::future::Future;

use tracing::debug;

use lifeos_core::{tree, MessageRole, NodeId, TreeState};

use crate::error::SyncError;

/// How many trailing messages go into a context update.
const RECENT_MESSAGES: usize = 5;

/// A real-time voice session run by a third-party service.
pub trait VoiceAssistant: Send + Sync {
    /// Starts a session, optionally primed with `context`.
    fn start(&self, context: Option<String>) -> impl Future<Output = Result<(), SyncError>> + Send;

    fn stop(&self) -> impl Future<Output = ()> + Send;

    /// Feeds background context into a running session.
    fn send_context_update(&self, update: &str);

    fn is_connected(&self) -> bool;
}

/// Text describing node `id` for the assistant: its path, summary and the
/// last few messages. `None` if the node is not in the tree.
pub fn node_context(state: &TreeState, id: &NodeId) -> Option<String> {
    let path = tree::ancestors(&state.tree, id)?;
    let node = path.last()?;

    let trail: Vec<&str> = path.iter().map(|n| n.label.as_str()).collect();
    let mut out = format!("The user is viewing the {} \"{}\".", node.kind, node.label);
    let _ = write!(out, "\nPath: {}", trail.join(" / "));

    if let Some(summary) = node.summary.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(out, "\nSummary: {summary}");
    }

    if let Some(messages) = node.messages.as_deref().filter(|m| !m.is_empty()) {
        out.push_str("\nRecent messages:");
        let start = messages.len().saturating_sub(RECENT_MESSAGES);
        for message in &messages[start..] {
            let who = match message.role {
                MessageRole::User => "user",
                MessageRole::Ai => "assistant",
            };
            let _ = write!(out, "\n- {who}: {}", message.text);
        }
    }
    Some(out)
}

/// Bridges tree selection to a [`VoiceAssistant`].
pub struct VoiceBridge<V> {
    assistant: V,
    announced: Option<NodeId>,
}

impl<V: VoiceAssistant> VoiceBridge<V> {
    pub fn new(assistant: V) -> Self {
        VoiceBridge {
            assistant,
            announced: None,
        }
    }

    pub fn assistant(&self) -> &V {
        &self.assistant
    }

    /// Starts the session with the currently selected node as context.
    pub async fn start(&mut self, state: &TreeState) -> Result<(), SyncError> {
        let context = state
            .selected_id
            .as_ref()
            .and_then(|id| node_context(state, id));
        self.assistant.start(context).await?;
        self.announced = state.selected_id.clone();
        Ok(())
    }

    pub async fn stop(&mut self) {
        self.assistant.stop().await;
        self.announced = None;
    }

    /// Sends a context update if the selection changed since the last one.
    /// Returns whether an update went out.
    pub fn sync_selection(&mut self, state: &TreeState) -> bool {
        if !self.assistant.is_connected() || state.selected_id == self.announced {
            return false;
        }
        let Some(id) = state.selected_id.clone() else {
            self.announced = None;
            return false;
        };
        let Some(context) = node_context(state, &id) else {
            return false;
        };
        debug!(node = %id, "sending voice context update");
        self.assistant.send_context_update(&context);
        self.announced = Some(id);
        true
    }
}
