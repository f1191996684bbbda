//! The sync gateway: user intents in, reducer events out.
//!
//! [`SyncGateway`] owns the session, the REST client and the tree store.
//! Intents that touch the server wait for the server's answer and only then
//! dispatch the matching reducer event; a failed request sets the session
//! error and leaves the tree alone. Push events from the live channel are
//! pumped into the same store in arrival order.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lifeos_core::{
    build_tree, tree, ApiNode, Message, NodeDraft, NodeId, NodeKind, NodePatch, Outcome,
    TreeEvent, TreeNode,
};

use crate::collab::{FilePicker, IdentityProvider};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::push::{ClientEmission, PushEvents, ServerEvent};
use crate::rest::RestClient;
use crate::session::Session;
use crate::store::TreeStore;

/// Push events that do not change the tree but may interest the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Another client selected a node. Selection stays session-local.
    NodeSelected(ApiNode),
    MessagesSaved(NodeId),
    ArtifactUploaded { url: String },
}

pub struct SyncGateway {
    session: Arc<Session>,
    rest: RestClient,
    store: TreeStore,
    notices: broadcast::Sender<Notice>,
}

impl SyncGateway {
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        let session = Arc::new(Session::new(config));
        let rest = RestClient::new(session.clone())?;
        let (notices, _) = broadcast::channel(64);
        Ok(SyncGateway {
            session,
            rest,
            store: TreeStore::new(),
            notices,
        })
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    // -- connection ---------------------------------------------------------

    /// Opens (or reopens) the push channel and starts pumping its events
    /// into the store. The returned task ends when the channel closes.
    pub async fn connect(&self, token: &str) -> Result<JoinHandle<()>, SyncError> {
        let events = self.session.open(token).await?;
        Ok(self.spawn_pump(events))
    }

    pub async fn disconnect(&self) {
        self.session.close().await;
    }

    /// Applies every event of `events` to the store, in order.
    pub fn spawn_pump(&self, mut events: PushEvents) -> JoinHandle<()> {
        let store = self.store.clone();
        let notices = self.notices.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                apply_server_event(&store, &notices, event);
            }
            debug!("push event stream ended");
        })
    }

    /// Applies one push event. `None` for events that only produce a notice.
    pub fn apply_push_event(&self, event: ServerEvent) -> Option<Outcome> {
        apply_server_event(&self.store, &self.notices, event)
    }

    // -- identity -----------------------------------------------------------

    pub async fn sign_in<I: IdentityProvider>(
        &self,
        identity: &I,
        email: &str,
        password: &str,
    ) -> Result<JoinHandle<()>, SyncError> {
        let token = identity.sign_in(email, password).await?;
        self.connect(&token).await
    }

    /// Registers and, if a token is issued right away, connects.
    pub async fn sign_up<I: IdentityProvider>(
        &self,
        identity: &I,
        email: &str,
        password: &str,
    ) -> Result<Option<JoinHandle<()>>, SyncError> {
        match identity.sign_up(email, password).await? {
            Some(token) => Ok(Some(self.connect(&token).await?)),
            None => Ok(None),
        }
    }

    pub async fn sign_out<I: IdentityProvider>(&self, identity: &I) -> Result<(), SyncError> {
        self.disconnect().await;
        identity.sign_out().await
    }

    /// Re-syncs the session with the identity's current token: reconnects
    /// when there is one (e.g. after a refresh), disconnects when there is not.
    pub async fn follow_identity<I: IdentityProvider>(
        &self,
        identity: &I,
    ) -> Result<Option<JoinHandle<()>>, SyncError> {
        match identity.access_token().await? {
            Some(token) => Ok(Some(self.connect(&token).await?)),
            None => {
                self.disconnect().await;
                Ok(None)
            }
        }
    }

    // -- intents ------------------------------------------------------------

    /// Fetches the whole tree and replaces the local one. Every root starts
    /// expanded. Returns the number of nodes loaded.
    pub async fn load_tree(&self) -> Result<usize, SyncError> {
        self.store.dispatch(TreeEvent::SetLoading(true));
        let index = self.rest.load_tree().await.map_err(|err| self.fail(err))?;

        let roots = build_tree(index.nodes);
        let count = tree::count(&roots);
        let expanded = roots.iter().map(|node| (node.id.clone(), true)).collect();
        self.store.dispatch(TreeEvent::SetTree(roots));
        self.store.dispatch(TreeEvent::SetExpanded(expanded));
        info!(nodes = count, "tree loaded");
        Ok(count)
    }

    /// Selects a node locally and tells the server, if connected.
    pub async fn select_node(&self, id: Option<NodeId>) -> Outcome {
        let outcome = self.store.dispatch(TreeEvent::SelectNode(id.clone()));
        if let Some(node_id) = id {
            self.session
                .emit(ClientEmission::NodeSelect { node_id })
                .await;
        }
        outcome
    }

    pub fn toggle_expand(&self, id: NodeId) -> Outcome {
        self.store.dispatch(TreeEvent::ToggleExpand(id))
    }

    /// A draft for a new node under `parent`, with a fresh ID, the kind the
    /// parent implies, and the kind's default icon unless one is given.
    pub fn draft(&self, parent: Option<NodeId>, label: &str, icon: Option<&str>) -> NodeDraft {
        let parent_kind = parent
            .as_ref()
            .and_then(|id| self.store.read(|state| state.find_node(id).map(|n| n.kind)));
        let kind = NodeKind::default_child_kind(parent_kind);
        let now = now_iso();
        NodeDraft {
            id: NodeId::new(format!("node-{}", uuid::Uuid::new_v4())),
            kind,
            label: label.to_string(),
            icon: icon.map_or_else(|| kind.default_icon().to_string(), str::to_string),
            parent_id: parent,
            date_created: now.clone(),
            date_modified: now,
        }
    }

    pub async fn create_node(&self, draft: NodeDraft) -> Result<Outcome, SyncError> {
        let created = self.rest.create_node(&draft).await.map_err(|err| self.fail(err))?;
        let mut node = TreeNode::from(created);
        if node.id != draft.id {
            warn!(sent = %draft.id, got = %node.id, "server changed the node id");
        }
        if node.icon.is_empty() {
            node.icon = draft.icon.clone();
        }
        Ok(self.commit(TreeEvent::AddNode {
            parent_id: draft.parent_id,
            node,
        }))
    }

    pub async fn update_node(&self, id: &NodeId, patch: NodePatch) -> Result<Outcome, SyncError> {
        let updated = self
            .rest
            .update_node(id, &patch)
            .await
            .map_err(|err| self.fail(err))?;
        let mut patch = patch;
        if !updated.date_modified.is_empty() {
            patch.date_modified = Some(updated.date_modified);
        }
        Ok(self.commit(TreeEvent::UpdateNode {
            id: id.clone(),
            patch,
        }))
    }

    pub async fn rename_node(&self, id: &NodeId, label: &str) -> Result<Outcome, SyncError> {
        self.update_node(id, NodePatch::label(label)).await
    }

    pub async fn delete_node(&self, id: &NodeId) -> Result<Outcome, SyncError> {
        let deleted = self.rest.delete_node(id).await.map_err(|err| self.fail(err))?;
        debug!(node = %id, deleted, "node deleted on server");
        Ok(self.commit(TreeEvent::DeleteNode(id.clone())))
    }

    pub async fn move_node(
        &self,
        id: &NodeId,
        new_parent: Option<NodeId>,
    ) -> Result<Outcome, SyncError> {
        self.rest
            .move_node(id, new_parent.as_ref())
            .await
            .map_err(|err| self.fail(err))?;
        Ok(self.commit(TreeEvent::MoveNode {
            id: id.clone(),
            new_parent,
        }))
    }

    /// Replaces the node's messages on the server, then locally.
    pub async fn save_messages(
        &self,
        id: &NodeId,
        messages: Vec<Message>,
    ) -> Result<Outcome, SyncError> {
        self.rest
            .replace_messages(id, &messages)
            .await
            .map_err(|err| self.fail(err))?;
        Ok(self.commit(TreeEvent::UpdateMessages {
            id: id.clone(),
            messages,
        }))
    }

    /// Fetches the node's messages, artifacts and prompt into the tree.
    pub async fn open_node(&self, id: &NodeId) -> Result<Outcome, SyncError> {
        let detail = self.rest.get_node(id).await.map_err(|err| self.fail(err))?;
        Ok(self.commit(TreeEvent::UpdateNode {
            id: id.clone(),
            patch: detail.content_patch(),
        }))
    }

    /// Lets the user pick a file and sends it over the push channel.
    /// `Ok(false)` when the user cancelled.
    pub async fn upload_artifact<P: FilePicker>(
        &self,
        node_id: &NodeId,
        picker: &P,
    ) -> Result<bool, SyncError> {
        let Some(file) = picker.pick().await? else {
            return Ok(false);
        };
        info!(node = %node_id, file = %file.name, size = file.size, "uploading artifact");
        let sent = self
            .session
            .emit(ClientEmission::ArtifactUpload {
                node_id: node_id.clone(),
                file_name: file.name,
                file_data: file.data,
            })
            .await;
        if !sent {
            return Err(self.fail(SyncError::AuthFailure(
                "push channel is not connected".to_string(),
            )));
        }
        Ok(true)
    }

    /// Asks the server to push the full tree. Returns whether it was sent.
    pub async fn request_tree_push(&self) -> bool {
        self.session.emit(ClientEmission::TreeLoad).await
    }

    fn commit(&self, event: TreeEvent) -> Outcome {
        let outcome = self.store.dispatch(event);
        if let Outcome::Rejected(reason) = &outcome {
            warn!(%reason, "server accepted a change the local tree could not apply");
        }
        outcome
    }

    fn fail(&self, err: SyncError) -> SyncError {
        warn!(error = %err, "request failed");
        self.store
            .dispatch(TreeEvent::SetError(Some(err.user_message())));
        err
    }
}

fn apply_server_event(
    store: &TreeStore,
    notices: &broadcast::Sender<Notice>,
    event: ServerEvent,
) -> Option<Outcome> {
    let name = event.name();
    let reducer_event = match event {
        ServerEvent::TreeLoaded { nodes } => TreeEvent::SetTree(build_tree(nodes)),
        ServerEvent::NodeCreated { node } => TreeEvent::AddNode {
            parent_id: node.parent_id.clone(),
            node: TreeNode::from(node),
        },
        ServerEvent::NodeUpdated { node } => TreeEvent::UpdateNode {
            patch: NodePatch::from_api(&node),
            id: node.id,
        },
        ServerEvent::NodeDeleted { node_id } => TreeEvent::DeleteNode(node_id),
        ServerEvent::MessagesSaved { node_id } => {
            let _ = notices.send(Notice::MessagesSaved(node_id.clone()));
            TreeEvent::UpdateNode {
                id: node_id,
                patch: NodePatch {
                    has_messages: Some(true),
                    ..NodePatch::default()
                },
            }
        }
        ServerEvent::Error { message } => TreeEvent::SetError(Some(message)),
        ServerEvent::NodeSelected { node } => {
            let _ = notices.send(Notice::NodeSelected(node));
            return None;
        }
        ServerEvent::ArtifactUploaded { url } => {
            let _ = notices.send(Notice::ArtifactUploaded { url });
            return None;
        }
        ServerEvent::AuthSuccess | ServerEvent::AuthError { .. } => {
            debug!(event = name, "ignoring auth event after handshake");
            return None;
        }
    };

    let outcome = store.dispatch(reducer_event);
    match &outcome {
        Outcome::Applied => debug!(event = name, "push event applied"),
        Outcome::Rejected(reason) => debug!(event = name, %reason, "push event ignored"),
    }
    Some(outcome)
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
