use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    format,
    gateway::{GatewayError, ModelGateway},
};

/// Who produced a turn. Serialized the way the model API names roles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Model,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Model => "model",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Speaker,
    pub parts: String,
}

impl Turn {
    pub fn user(parts: impl Into<String>) -> Self {
        Self {
            role: Speaker::User,
            parts: parts.into(),
        }
    }

    pub fn model(parts: impl Into<String>) -> Self {
        Self {
            role: Speaker::Model,
            parts: parts.into(),
        }
    }

    /// Display fragment, recomputed on every call.
    pub fn html(&self) -> String {
        format::render(&self.parts)
    }
}

/// Insertion-ordered, append-only history of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// The example exchange every conversation starts from.
    pub fn seeded() -> Self {
        Self {
            turns: vec![
                Turn::user("Hello, I have 2 dogs in my house."),
                Turn::model("Great to meet you. What would you like to know?"),
            ],
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// What a call to [`ChatSession::submit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Draft was blank; nothing changed.
    Ignored,
    /// One user turn and one model turn were appended.
    Replied,
}

/// One user's conversation: transcript plus the pending input.
#[derive(Debug, Clone)]
pub struct ChatSession {
    id: Uuid,
    owner: Uuid,
    transcript: Transcript,
    draft: String,
}

impl ChatSession {
    pub fn new(owner: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            transcript: Transcript::seeded(),
            draft: String::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn edit(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Sends the draft. The user turn is staged and the gateway sees only the
    /// turns that came before it; user and model turns are appended together
    /// once the reply arrives. If the gateway fails, or the returned future is
    /// dropped mid-call, the transcript is untouched and the draft is kept.
    pub async fn submit(&mut self, gateway: &dyn ModelGateway) -> Result<Submission, GatewayError> {
        if self.draft.trim().is_empty() {
            return Ok(Submission::Ignored);
        }

        let user_turn = Turn::user(self.draft.clone());
        debug!(session_id = %self.id, turns = self.transcript.len(), "user turn staged");

        match gateway.reply(&self.transcript.turns, &user_turn.parts).await {
            Ok(reply) => {
                self.transcript.turns.push(user_turn);
                self.transcript.turns.push(Turn::model(reply));
                self.draft.clear();
                Ok(Submission::Replied)
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "model call failed; user turn discarded");
                Err(e)
            }
        }
    }
}
