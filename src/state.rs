use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::auth::repo::{PgUserRepo, UserRepo};
use crate::config::AppConfig;
use crate::storage::{MediaStore, S3MediaStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub media: Arc<dyn MediaStore>,
}

impl AppState {
    /// Connects to Postgres and the media host. The pool is returned so the
    /// caller can run migrations before serving.
    pub async fn init() -> anyhow::Result<(Self, PgPool)> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let media = Arc::new(
            S3MediaStore::new(&config.media)
                .await
                .context("configure media host")?,
        ) as Arc<dyn MediaStore>;
        let users = Arc::new(PgUserRepo::new(db.clone())) as Arc<dyn UserRepo>;

        Ok((Self::from_parts(config, users, media), db))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            config,
            users,
            media,
        }
    }
}
