use crate::state::AppState;
use axum::Router;

pub mod avatar;
pub mod dto;
pub mod error;
pub mod format;
pub mod gateway;
pub mod handlers;
pub mod sessions;
pub mod transcript;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::chat_routes())
}
