//! Authenticated session: bearer token plus the live push channel.
//!
//! At most one push channel exists per session. Opening a new one tears the
//! previous one down first, so a token refresh never leaves two sockets
//! feeding the same tree. The channel lock is never held across the
//! handshake; emissions made meanwhile are dropped as if disconnected.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::push::{ClientEmission, PushChannel, PushEvents};

pub struct Session {
    config: SyncConfig,
    token: RwLock<Option<String>>,
    push: Mutex<Option<PushChannel>>,
    /// Bumped by every `open` and `close`; a handshake only installs its
    /// channel if no later call happened while it ran.
    generation: AtomicU64,
}

impl Session {
    pub fn new(config: SyncConfig) -> Self {
        Session {
            config,
            token: RwLock::new(None),
            push: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Token attached to REST requests, if signed in.
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Sets the REST token without touching the push channel.
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    /// Replaces the push channel with one authenticated by `token`.
    ///
    /// The token is stored for REST use even when the handshake fails. If
    /// `close` or another `open` runs before the handshake finishes, the new
    /// channel is discarded and this call fails.
    pub async fn open(&self, token: &str) -> Result<PushEvents, SyncError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self.push.lock().await.take();
        if previous.is_some() {
            debug!("closing previous push channel");
        }
        drop(previous);
        self.set_token(Some(token.to_string())).await;

        let (channel, events) =
            PushChannel::connect(&self.config.socket_url, token, self.config.handshake_timeout)
                .await?;

        let mut push = self.push.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("push channel superseded during handshake");
            return Err(SyncError::Network(
                "push channel superseded during handshake".to_string(),
            ));
        }
        *push = Some(channel);
        info!(url = %self.config.socket_url, "push channel authenticated");
        Ok(events)
    }

    /// Drops the push channel and forgets the token.
    pub async fn close(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.set_token(None).await;
        if self.push.lock().await.take().is_some() {
            info!("push channel closed");
        }
    }

    /// Sends an emission if a live channel is open. Returns whether it was
    /// queued. A channel whose socket has gone away is dropped here.
    pub async fn emit(&self, emission: ClientEmission) -> bool {
        let mut push = self.push.lock().await;
        let Some(channel) = push.as_ref() else {
            debug!("no push channel, emission dropped");
            return false;
        };
        if channel.is_open() && channel.emit(emission) {
            return true;
        }
        push.take();
        warn!("push channel is gone, emission dropped");
        false
    }

    pub async fn is_connected(&self) -> bool {
        self.push
            .lock()
            .await
            .as_ref()
            .is_some_and(PushChannel::is_open)
    }
}
