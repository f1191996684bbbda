//! External collaborators the gateway drives but does not implement.
//!
//! Identity (sign-in and token refresh) and file selection live outside the
//! sync core; a host plugs them in through these traits.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Source of access tokens.
pub trait IdentityProvider: Send + Sync {
    /// Token of the current identity, `None` when signed out.
    fn access_token(&self) -> impl Future<Output = Result<Option<String>, SyncError>> + Send;

    /// Signs in and returns the new access token.
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<String, SyncError>> + Send;

    /// Registers an account. `None` when the account still needs
    /// confirmation before a token is issued.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Option<String>, SyncError>> + Send;

    fn sign_out(&self) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// A file chosen by the user, already base64-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickedFile {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    pub data: String,
}

pub trait FilePicker: Send + Sync {
    /// Lets the user choose a file. `None` when they cancel.
    fn pick(&self) -> impl Future<Output = Result<Option<PickedFile>, SyncError>> + Send;
}

/// Identity with a fixed token, for scripts and the command line.
#[derive(Debug, Clone)]
pub struct StaticToken(pub Option<String>);

impl IdentityProvider for StaticToken {
    async fn access_token(&self) -> Result<Option<String>, SyncError> {
        Ok(self.0.clone())
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<String, SyncError> {
        self.0
            .clone()
            .ok_or_else(|| SyncError::AuthFailure("no token configured".to_string()))
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<Option<String>, SyncError> {
        Err(SyncError::AuthFailure(
            "sign-up is not available with a static token".to_string(),
        ))
    }

    async fn sign_out(&self) -> Result<(), SyncError> {
        Ok(())
    }
}
