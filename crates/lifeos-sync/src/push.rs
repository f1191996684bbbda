//! The push channel: wire protocol and websocket connection.
//!
//! Frames are JSON text messages of the form `{"event": "<name>", "data": {...}}`
//! (`data` is omitted for events without payload). A connection is usable
//! only after the two-step handshake in [`PushChannel::connect`]: open the
//! socket, send `auth`, then wait for `auth:success` or `auth:error`.
//!
//! After the handshake two tasks own the socket halves. The reader decodes
//! inbound frames into [`ServerEvent`]s and forwards them in arrival order;
//! the writer serializes queued [`ClientEmission`]s. Dropping the
//! [`PushChannel`] stops the reader and lets the writer close the socket.

use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as Frame};
use tracing::{debug, warn};

use lifeos_core::{ApiNode, Message, NodeId, NodePatch};

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Client → server emissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEmission {
    #[serde(rename = "auth")]
    Auth { token: String },
    #[serde(rename = "tree:load")]
    TreeLoad,
    #[serde(rename = "node:create")]
    NodeCreate { node: ApiNode },
    #[serde(rename = "node:update")]
    NodeUpdate {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
        updates: NodePatch,
    },
    #[serde(rename = "node:delete")]
    NodeDelete {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
    },
    #[serde(rename = "node:select")]
    NodeSelect {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
    },
    #[serde(rename = "messages:save")]
    MessagesSave {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
        messages: Vec<Message>,
    },
    #[serde(rename = "artifact:upload")]
    ArtifactUpload {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
        #[serde(rename = "fileName")]
        file_name: String,
        /// Base64 file content.
        #[serde(rename = "fileData")]
        file_data: String,
    },
}

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "auth:success")]
    AuthSuccess,
    #[serde(rename = "auth:error")]
    AuthError { message: String },
    #[serde(rename = "tree:loaded")]
    TreeLoaded { nodes: Vec<ApiNode> },
    #[serde(rename = "node:created")]
    NodeCreated { node: ApiNode },
    #[serde(rename = "node:updated")]
    NodeUpdated { node: ApiNode },
    #[serde(rename = "node:deleted")]
    NodeDeleted {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
    },
    #[serde(rename = "node:selected")]
    NodeSelected { node: ApiNode },
    #[serde(rename = "messages:saved")]
    MessagesSaved {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
    },
    #[serde(rename = "artifact:uploaded")]
    ArtifactUploaded { url: String },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    /// Wire name of the event, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::AuthSuccess => "auth:success",
            ServerEvent::AuthError { .. } => "auth:error",
            ServerEvent::TreeLoaded { .. } => "tree:loaded",
            ServerEvent::NodeCreated { .. } => "node:created",
            ServerEvent::NodeUpdated { .. } => "node:updated",
            ServerEvent::NodeDeleted { .. } => "node:deleted",
            ServerEvent::NodeSelected { .. } => "node:selected",
            ServerEvent::MessagesSaved { .. } => "messages:saved",
            ServerEvent::ArtifactUploaded { .. } => "artifact:uploaded",
            ServerEvent::Error { .. } => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Inbound events of an authenticated channel, in arrival order. Ends when
/// the socket closes.
pub type PushEvents = mpsc::UnboundedReceiver<ServerEvent>;

/// An authenticated push connection.
pub struct PushChannel {
    outbound: mpsc::UnboundedSender<ClientEmission>,
    reader: JoinHandle<()>,
}

impl PushChannel {
    /// Opens the socket and authenticates with `token`.
    ///
    /// Resolves only once the server acknowledged the token. A rejection
    /// yields [`SyncError::AuthFailure`] with the server's reason; a socket
    /// that closes or stays silent past `handshake_timeout` yields
    /// [`SyncError::Network`].
    pub async fn connect(
        url: &str,
        token: &str,
        handshake_timeout: Duration,
    ) -> Result<(PushChannel, PushEvents), SyncError> {
        let handshake = async {
            let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
            let (mut sink, mut source) = stream.split();
            let auth = serde_json::to_string(&ClientEmission::Auth {
                token: token.to_string(),
            })?;
            sink.send(Frame::text(auth)).await?;
            await_ack(&mut source).await?;
            Ok::<_, SyncError>((sink, source))
        };

        let (sink, source) = tokio::time::timeout(handshake_timeout, handshake)
            .await
            .map_err(|_| {
                SyncError::Network(format!(
                    "push handshake timed out after {}s",
                    handshake_timeout.as_secs()
                ))
            })??;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(source, events_tx));
        tokio::spawn(write_loop(sink, outbound_rx));

        Ok((
            PushChannel {
                outbound: outbound_tx,
                reader,
            },
            events_rx,
        ))
    }

    /// Queues an emission. Returns `false` once the socket is gone.
    pub fn emit(&self, emission: ClientEmission) -> bool {
        self.outbound.send(emission).is_ok()
    }

    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed() && !self.reader.is_finished()
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn await_ack<S>(source: &mut S) -> Result<(), SyncError>
where
    S: Stream<Item = Result<Frame, WsError>> + Unpin,
{
    while let Some(frame) = source.next().await {
        let text = match frame? {
            Frame::Text(text) => text,
            Frame::Close(_) => break,
            _ => continue,
        };
        match serde_json::from_str::<ServerEvent>(text.as_str()) {
            Ok(ServerEvent::AuthSuccess) => return Ok(()),
            Ok(ServerEvent::AuthError { message }) => return Err(SyncError::AuthFailure(message)),
            Ok(other) => debug!(event = other.name(), "ignoring event received before auth ack"),
            Err(err) => warn!(error = %err, "undecodable frame during handshake"),
        }
    }
    Err(SyncError::Network(
        "push channel closed during handshake".to_string(),
    ))
}

async fn read_loop<S>(mut source: S, events: mpsc::UnboundedSender<ServerEvent>)
where
    S: Stream<Item = Result<Frame, WsError>> + Unpin,
{
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Frame::Text(text)) => match serde_json::from_str::<ServerEvent>(text.as_str()) {
                Ok(event) => {
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Err(err) => warn!(error = %err, "dropping undecodable push frame"),
            },
            Ok(Frame::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "push channel read failed");
                break;
            }
        }
    }
    debug!("push channel reader finished");
}

async fn write_loop<K>(mut sink: K, mut outbound: mpsc::UnboundedReceiver<ClientEmission>)
where
    K: Sink<Frame, Error = WsError> + Unpin,
{
    while let Some(emission) = outbound.recv().await {
        let text = match serde_json::to_string(&emission) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "failed to encode push emission");
                continue;
            }
        };
        if let Err(err) = sink.send(Frame::text(text)).await {
            warn!(error = %err, "push channel write failed");
            break;
        }
    }
    let _ = sink.close().await;
    debug!("push channel writer finished");
}
