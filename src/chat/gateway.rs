use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use super::transcript::{Speaker, Turn};
use crate::config::GeminiConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("model request failed: {0}")]
    Transport(reqwest::Error),
    #[error("model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model response malformed: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GatewayError {
    /// Request URLs are stripped so errors are safe to log.
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Transport(e.without_url())
    }
}

/// Hosted conversational model. Stateless: every call carries the whole
/// history that precedes `prompt`.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn reply(&self, history: &[Turn], prompt: &str) -> Result<String, GatewayError>;
}

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Gemini `generateContent` over REST.
pub struct GeminiGateway {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiGateway {
    pub fn new(config: &GeminiConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("mediquity/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

fn build_request<'a>(history: &'a [Turn], prompt: &'a str) -> GenerateRequest<'a> {
    let mut contents: Vec<Content<'a>> = history
        .iter()
        .map(|turn| Content {
            role: turn.role.as_str(),
            parts: [Part { text: &turn.parts }],
        })
        .collect();
    contents.push(Content {
        role: Speaker::User.as_str(),
        parts: [Part { text: prompt }],
    });
    GenerateRequest { contents }
}

fn extract_text(response: GenerateResponse) -> Result<String, GatewayError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::Malformed("no candidates".into()))?;
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(GatewayError::Malformed("candidate has no text".into()));
    }
    Ok(text)
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    #[instrument(skip(self, history, prompt), fields(model = %self.model, history = history.len()))]
    async fn reply(&self, history: &[Turn], prompt: &str) -> Result<String, GatewayError> {
        let resp = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&build_request(history, prompt))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| GatewayError::Malformed(e.to_string()))?;
        let text = extract_text(parsed)?;
        debug!(chars = text.len(), "model replied");
        Ok(text)
    }
}
