use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{AvatarResponse, MessageRequest, SessionView},
    error::ChatError,
    transcript::{Speaker, Submission},
};
use crate::{auth::extractors::AuthUser, state::AppState};

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/chat/sessions", post(create_session))
        .route("/chat/sessions/:id", get(get_session))
        .route("/chat/sessions/:id/messages", post(send_message))
        .route("/avatars/:role", get(get_avatar))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn create_session(
    State(state): State<AppState>,
    user: AuthUser,
) -> (StatusCode, Json<SessionView>) {
    let session = state.sessions.create(user.id).await;
    let session = session.lock().await;
    info!(session_id = %session.id(), "chat session started");
    (StatusCode::CREATED, Json(SessionView::from(&*session)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ChatError> {
    let session = state
        .sessions
        .get(id, user.id)
        .await
        .ok_or(ChatError::SessionNotFound)?;
    let session = session.lock().await;
    Ok(Json(SessionView::from(&*session)))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<SessionView>, ChatError> {
    let session = state
        .sessions
        .get(id, user.id)
        .await
        .ok_or(ChatError::SessionNotFound)?;

    // held across the model call: one submission per session at a time
    let mut session = session.lock().await;
    session.edit(body.message);
    if session.submit(state.gateway.as_ref()).await? == Submission::Replied {
        info!(session_id = %id, turns = session.transcript().len(), "exchange appended");
    }
    Ok(Json(SessionView::from(&*session)))
}

#[instrument(skip(state))]
pub async fn get_avatar(
    State(state): State<AppState>,
    Path(role): Path<Speaker>,
) -> Result<Json<AvatarResponse>, ChatError> {
    let url = state.avatars.avatar_url(role).await?;
    Ok(Json(AvatarResponse { role, url }))
}
