//! Error types for the Arena API server.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation, or into
//! a `gameError` message on the `WebSocket` channel.

use arena_session::SessionError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

/// Message sent in place of any internal failure's details.
pub const INTERNAL_MESSAGE: &str = "internal error";

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The supplied credentials did not verify.
    #[error("Invalid credentials")]
    AuthenticationFailure,

    /// The request body or a path segment did not have the expected shape.
    #[error("Poorly-formed request: {0}")]
    Malformed(String),

    /// A session lookup by an ID that cannot name any session.
    #[error("game not found")]
    GameNotFound,

    /// The session engine rejected the request.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Malformed(rejection.body_text())
    }
}

impl ApiError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::AuthenticationFailure => StatusCode::FORBIDDEN,
            Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::GameNotFound => StatusCode::NOT_FOUND,
            Self::Session(e) => match e {
                SessionError::NotFound(_) => StatusCode::NOT_FOUND,
                SessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                SessionError::UnknownGameType(_)
                | SessionError::InvalidState { .. }
                | SessionError::AlreadyJoined
                | SessionError::NotAPlayer
                | SessionError::NotEnoughPlayers { .. }
                | SessionError::IllegalMove { .. }
                | SessionError::IndexOutOfBounds { .. } => StatusCode::BAD_REQUEST,
            },
        }
    }

    /// Message safe to show the client.
    ///
    /// Internal failures are logged here and replaced by
    /// [`INTERNAL_MESSAGE`].
    pub fn client_message(&self) -> String {
        if let Self::Session(SessionError::Internal(detail)) = self {
            error!(%detail, "internal error while handling request");
            return INTERNAL_MESSAGE.to_owned();
        }
        self.to_string()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.client_message(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use arena_types::SessionId;

    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        assert_eq!(ApiError::AuthenticationFailure.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(SessionError::NotFound(SessionId::new())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(SessionError::IndexOutOfBounds { index: -1, len: 0 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SessionError::NotAPlayer).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = ApiError::from(SessionError::Internal(String::from("replay diverged at move 3")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), INTERNAL_MESSAGE);
    }

    #[test]
    fn expected_errors_keep_their_message() {
        let err = ApiError::from(SessionError::NotAPlayer);
        assert_eq!(err.client_message(), "not a player in this game");
        assert_eq!(ApiError::AuthenticationFailure.client_message(), "Invalid credentials");
    }
}
