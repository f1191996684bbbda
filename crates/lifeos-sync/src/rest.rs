//! Request/response client for the Life OS backend.
//!
//! Every call attaches the session's bearer token when one is set. Non-2xx
//! answers are mapped by status (see [`SyncError::from_status`]) with the
//! message taken from the body's `error` field; bodies that do not decode
//! into the expected shape are [`SyncError::InvalidResponse`].

use std::sync::Arc;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use lifeos_core::{ApiNode, Artifact, Message, NodeDraft, NodeId, NodePatch};

use crate::error::SyncError;
use crate::session::Session;

/// Body of `GET /api/tree`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeIndex {
    pub nodes: Vec<ApiNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// Body of `GET /api/nodes/{id}`: the flat node plus its heavy content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDetail {
    #[serde(flatten)]
    pub node: ApiNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<Artifact>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl NodeDetail {
    /// Patch that loads this detail into an already materialized node.
    pub fn content_patch(&self) -> NodePatch {
        NodePatch {
            messages: self.messages.clone(),
            artifacts: self.artifacts.clone(),
            prompt: self.prompt.clone(),
            ..NodePatch::from_api(&self.node)
        }
    }
}

#[derive(Debug, Deserialize)]
struct NodeEnvelope<T> {
    node: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResponse {
    deleted_count: u32,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

impl RestClient {
    pub fn new(session: Arc<Session>) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(session.config().request_timeout)
            .build()?;
        Ok(RestClient {
            http,
            base_url: session.config().api_url.clone(),
            session,
        })
    }

    pub async fn health(&self) -> Result<String, SyncError> {
        let health: HealthResponse = self.send(self.http.get(self.url("/health"))).await?;
        Ok(health.status)
    }

    /// The whole tree as a flat list.
    pub async fn load_tree(&self) -> Result<TreeIndex, SyncError> {
        self.send(self.http.get(self.url("/api/tree"))).await
    }

    pub async fn get_node(&self, id: &NodeId) -> Result<NodeDetail, SyncError> {
        let envelope: NodeEnvelope<NodeDetail> =
            self.send(self.http.get(self.node_url(id))).await?;
        Ok(envelope.node)
    }

    /// Creates the node described by `draft`; returns the server's copy.
    pub async fn create_node(&self, draft: &NodeDraft) -> Result<ApiNode, SyncError> {
        let envelope: NodeEnvelope<ApiNode> = self
            .send(self.http.post(self.node_url(&draft.id)).json(draft))
            .await?;
        Ok(envelope.node)
    }

    pub async fn update_node(&self, id: &NodeId, patch: &NodePatch) -> Result<ApiNode, SyncError> {
        let envelope: NodeEnvelope<ApiNode> = self
            .send(self.http.post(self.node_url(id)).json(patch))
            .await?;
        Ok(envelope.node)
    }

    /// Deletes a node and its subtree; returns how many nodes went away.
    pub async fn delete_node(&self, id: &NodeId) -> Result<u32, SyncError> {
        let deleted: DeleteResponse = self.send(self.http.delete(self.node_url(id))).await?;
        Ok(deleted.deleted_count)
    }

    pub async fn move_node(
        &self,
        id: &NodeId,
        new_parent: Option<&NodeId>,
    ) -> Result<ApiNode, SyncError> {
        let url = format!("{}/move", self.node_url(id));
        let envelope: NodeEnvelope<ApiNode> = self
            .send(self.http.put(url).json(&json!({ "newParentId": new_parent })))
            .await?;
        Ok(envelope.node)
    }

    /// Replaces the node's whole message list.
    pub async fn replace_messages(
        &self,
        id: &NodeId,
        messages: &[Message],
    ) -> Result<(), SyncError> {
        let url = format!("{}/messages", self.node_url(id));
        let _: serde_json::Value = self
            .send(self.http.put(url).json(&json!({ "messages": messages })))
            .await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Node ids are opaque, so they go into the path percent-encoded.
    fn node_url(&self, id: &NodeId) -> String {
        self.url(&format!("/api/nodes/{}", urlencoding::encode(id.as_str())))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SyncError> {
        let request = match self.session.token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "api response");

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| status.to_string());
            return Err(SyncError::from_status(status.as_u16(), message));
        }

        serde_json::from_str(&body).map_err(|err| SyncError::InvalidResponse(err.to_string()))
    }
}

/// Pulls the failure text out of `{"error": "..."}` or
/// `{"error": {"message": "..."}}`.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .as_str()
        .or_else(|| error.get("message").and_then(|m| m.as_str()))
        .map(str::to_string)
}
