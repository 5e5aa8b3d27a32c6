use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use super::transcript::Speaker;
use crate::config::AvatarConfig;

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("avatar request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Picture shown next to a speaker's turns.
#[async_trait]
pub trait AvatarSource: Send + Sync {
    async fn avatar_url(&self, role: Speaker) -> Result<String, AvatarError>;
}

/// Random-image service that answers a search URL with a redirect to a
/// concrete picture; the final URL after redirects is the avatar.
pub struct RandomImageAvatars {
    client: Client,
    base_url: String,
}

impl RandomImageAvatars {
    pub fn new(config: &AvatarConfig) -> Result<Self, AvatarError> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AvatarSource for RandomImageAvatars {
    async fn avatar_url(&self, role: Speaker) -> Result<String, AvatarError> {
        let url = format!("{}/random/100x100/?{}", self.base_url, role.as_str());
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let resolved = resp.url().to_string();
        debug!(role = role.as_str(), %resolved, "avatar resolved");
        Ok(resolved)
    }
}
