use axum::{
    extract::{FromRef, State},
    http::header,
    routing::post,
    Json, Router,
};
use time::{format_description::FormatItem, macros::format_description, Duration, OffsetDateTime};
use tracing::{error, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, SignupRequest, StatusResponse},
        error::{AuthError, LOGIN_FAILED},
        jwt::JwtKeys,
        services,
    },
    state::AppState,
};

const HTTP_DATE: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
}

/// `Set-Cookie` value for the login token. The cookie expires after the
/// configured cookie TTL, which is not the token lifetime.
pub(crate) fn token_cookie(token: &str, expires: OffsetDateTime) -> Result<String, time::error::Format> {
    let expires = expires.to_offset(time::UtcOffset::UTC).format(HTTP_DATE)?;
    Ok(format!("token={token}; Expires={expires}; HttpOnly; Path=/"))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<StatusResponse>, AuthError> {
    services::signup(state.users.as_ref(), payload).await?;
    Ok(Json(StatusResponse {
        success: true,
        message: "user created succesdfully".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<([(header::HeaderName, String); 1], Json<LoginResponse>), AuthError> {
    let keys = JwtKeys::from_ref(&state);
    let outcome = services::login(state.users.as_ref(), &keys, payload).await?;

    let expires = OffsetDateTime::now_utc() + Duration::seconds(state.config.jwt.cookie_ttl_seconds);
    let cookie = token_cookie(&outcome.token, expires).map_err(|e| {
        error!(error = %e, "format cookie expiry failed");
        AuthError::ServerError(LOGIN_FAILED)
    })?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            success: true,
            token: outcome.token,
            user: outcome.user,
            message: "User logged in successfully".into(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn cookie_is_http_only_with_gmt_expiry() {
        let cookie = token_cookie("abc", datetime!(1994-11-06 08:49:37 UTC)).unwrap();
        assert_eq!(
            cookie,
            "token=abc; Expires=Sun, 06 Nov 1994 08:49:37 GMT; HttpOnly; Path=/"
        );
    }

    #[test]
    fn cookie_expiry_is_normalized_to_utc() {
        let cookie = token_cookie("abc", datetime!(1994-11-06 10:49:37 +2)).unwrap();
        assert!(cookie.contains("08:49:37 GMT"));
    }
}
