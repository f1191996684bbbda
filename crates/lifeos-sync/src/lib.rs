//! Keeps a Life OS knowledge tree in sync with its backend.
//!
//! The request/response API loads and edits the tree; a websocket push
//! channel delivers changes made elsewhere. Both end up as reducer events on
//! one [`TreeStore`], driven by the [`SyncGateway`].

pub mod collab;
pub mod config;
pub mod error;
pub mod gateway;
pub mod push;
pub mod rest;
pub mod session;
pub mod store;
pub mod voice;

pub use collab::{FilePicker, IdentityProvider, PickedFile, StaticToken};
pub use config::SyncConfig;
pub use error::SyncError;
pub use gateway::{Notice, SyncGateway};
pub use push::{ClientEmission, PushChannel, PushEvents, ServerEvent};
pub use rest::{NodeDetail, RestClient, TreeIndex};
pub use session::Session;
pub use store::TreeStore;
pub use voice::{node_context, VoiceAssistant, VoiceBridge};
