use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    auth::repo::{PgUserStore, UserStore},
    chat::{
        avatar::{AvatarSource, RandomImageAvatars},
        gateway::{GeminiGateway, ModelGateway},
        sessions::{SessionLimits, SessionStore},
    },
    config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub gateway: Arc<dyn ModelGateway>,
    pub avatars: Arc<dyn AvatarSource>,
    pub sessions: SessionStore,
}

impl AppState {
    /// Connects to Postgres, applies migrations and builds the HTTP clients.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let users = Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>;
        let gateway =
            Arc::new(GeminiGateway::new(&config.gemini).context("build gemini client")?)
                as Arc<dyn ModelGateway>;
        let avatars =
            Arc::new(RandomImageAvatars::new(&config.avatar).context("build avatar client")?)
                as Arc<dyn AvatarSource>;

        Ok(Self::from_parts(config, users, gateway, avatars))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        gateway: Arc<dyn ModelGateway>,
        avatars: Arc<dyn AvatarSource>,
    ) -> Self {
        let sessions = SessionStore::with_limits(SessionLimits::from(&config.chat));
        Self {
            config,
            users,
            gateway,
            avatars,
            sessions,
        }
    }
}
