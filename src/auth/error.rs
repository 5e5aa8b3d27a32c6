use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::auth::dto::StatusResponse;

pub const SIGNUP_FAILED: &str = "User cannot be registered please try again later";
pub const LOGIN_FAILED: &str = "Login Failure";

/// Credential-flow failures. The display text is exactly what the client
/// sees; internal causes are logged where they happen and never carried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("User already exists")]
    DuplicateUser,
    #[error("error in hashing password")]
    HashingError,
    #[error("Please fill in all the details carefully")]
    MissingFields,
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Incorrect password")]
    IncorrectPassword,
    #[error("{0}")]
    ServerError(&'static str),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::DuplicateUser | AuthError::MissingFields | AuthError::InvalidEmail => {
                StatusCode::BAD_REQUEST
            }
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::IncorrectPassword => StatusCode::FORBIDDEN,
            AuthError::HashingError | AuthError::ServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = StatusResponse {
            success: false,
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_the_public_contract() {
        assert_eq!(AuthError::DuplicateUser.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::MissingFields.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::IncorrectPassword.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::HashingError.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AuthError::ServerError(LOGIN_FAILED).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn server_error_shows_only_fixed_message() {
        assert_eq!(AuthError::ServerError(SIGNUP_FAILED).to_string(), SIGNUP_FAILED);
    }
}
