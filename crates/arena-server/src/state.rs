//! Shared application state for the Arena server.
//!
//! [`AppState`] holds the session store, the channel fanout that carries
//! session notifications to `WebSocket` connections, and the credential
//! verifier. It is wrapped in [`Arc`] and injected via Axum's `State`
//! extractor.

use std::sync::Arc;

use arena_session::{ChannelFanout, SessionStore};
use arena_types::UserInfo;

use crate::auth::{Authenticator, Credentials};
use crate::error::ApiError;

/// Shared state for the Axum application.
pub struct AppState {
    /// Every live session.
    pub store: SessionStore,
    /// Topic channels feeding `WebSocket` connections.
    pub fanout: ChannelFanout,
    /// Credential verifier.
    pub auth: Arc<dyn Authenticator>,
}

impl AppState {
    /// Create application state over `store` with no subscribers yet.
    pub fn new(store: SessionStore, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            store,
            fanout: ChannelFanout::new(),
            auth,
        }
    }

    /// Resolve `credentials` to a user.
    ///
    /// # Errors
    ///
    /// [`ApiError::AuthenticationFailure`] if they do not verify.
    pub fn authenticate(&self, credentials: &Credentials) -> Result<UserInfo, ApiError> {
        self.auth
            .verify(credentials)
            .ok_or(ApiError::AuthenticationFailure)
    }
}

impl core::fmt::Debug for AppState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store)
            .field("topics", &self.fanout.topic_count())
            .finish_non_exhaustive()
    }
}
