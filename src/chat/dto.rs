use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transcript::{ChatSession, Speaker, Turn};

#[derive(Debug, Default, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TurnView {
    pub role: Speaker,
    pub parts: String,
    pub html: String,
}

impl From<&Turn> for TurnView {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            parts: turn.parts.clone(),
            html: turn.html(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub turns: Vec<TurnView>,
    pub draft: String,
}

impl From<&ChatSession> for SessionView {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id(),
            turns: session.transcript().turns().iter().map(TurnView::from).collect(),
            draft: session.draft().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvatarResponse {
    pub role: Speaker,
    pub url: String,
}
