use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::library::repo::PgLibraryRepository;
use crate::library::service::LibraryService;
use crate::meals::repo::PgMealCommitRepository;
use crate::nutrition::client::{CachedLookup, FdcClient};
use crate::nutrition::NutritionLookup;
use crate::photos::repo::PgPhotoRepository;
use crate::sessions::repo::PgSessionRepository;
use crate::sessions::service::SessionService;
use crate::users::repo::PgUserRepository;
use crate::users::service::UserService;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let nutrition: Arc<dyn NutritionLookup> = Arc::new(CachedLookup::new(
            FdcClient::new(&config.nutrition)?,
            config.nutrition.search_ttl_secs,
            config.nutrition.food_ttl_secs,
        ));
        Ok(Self::from_parts(db, config, nutrition))
    }

    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        nutrition: Arc<dyn NutritionLookup>,
    ) -> Self {
        let sessions = Arc::new(SessionService::new(
            UserService::new(Arc::new(PgUserRepository::new(db.clone()))),
            Arc::new(PgPhotoRepository::new(db.clone())),
            Arc::new(PgSessionRepository::new(db.clone())),
            LibraryService::new(
                Arc::new(PgLibraryRepository::new(db.clone())),
                config.resolver.clone(),
            ),
            nutrition,
            Arc::new(PgMealCommitRepository::new(db.clone())),
            config.session_ttl_minutes,
        ));
        Self {
            db,
            config,
            sessions,
        }
    }
}
