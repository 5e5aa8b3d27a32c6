use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use super::{avatar::AvatarError, gateway::GatewayError};
use crate::auth::dto::StatusResponse;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Session not found")]
    SessionNotFound,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Avatar(#[from] AvatarError),
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ChatError::SessionNotFound => (StatusCode::NOT_FOUND, "Session not found"),
            ChatError::Gateway(e) => {
                error!(error = %e, "model gateway failed");
                (StatusCode::BAD_GATEWAY, "The model could not answer, please try again")
            }
            ChatError::Avatar(e) => {
                error!(error = %e, "avatar lookup failed");
                (StatusCode::BAD_GATEWAY, "Avatar unavailable")
            }
        };
        let body = StatusResponse {
            success: false,
            message: message.into(),
        };
        (status, Json(body)).into_response()
    }
}
