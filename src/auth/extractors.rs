use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, StatusCode},
    Json,
};
use tracing::warn;
use uuid::Uuid;

use super::{claims::Role, dto::StatusResponse, jwt::JwtKeys};

/// Caller identity taken from a valid token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

type Rejection = (StatusCode, Json<StatusResponse>);

fn unauthorized(message: &str) -> Rejection {
    (
        StatusCode::UNAUTHORIZED,
        Json(StatusResponse {
            success: false,
            message: message.into(),
        }),
    )
}

/// Bearer header first, then the `token` cookie set by login.
fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        return auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "));
    }
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .find_map(|pair| pair.trim().strip_prefix("token="))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| unauthorized("Token missing"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            unauthorized("Invalid or expired token")
        })?;

        Ok(AuthUser {
            id: claims.id,
            role: claims.role,
        })
    }
}
