use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::EngineError;
use crate::users::User;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_platform_id(&self, platform_user_id: i64)
        -> Result<Option<User>, EngineError>;
    /// Creates the user together with an empty settings row.
    async fn create(&self, platform_user_id: i64) -> Result<User, EngineError>;
    async fn touch_last_active(&self, user_id: Uuid) -> Result<(), EngineError>;
}

pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_by_platform_id(
        &self,
        platform_user_id: i64,
    ) -> Result<Option<User>, EngineError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, platform_user_id, created_at, last_active_at
            FROM users
            WHERE platform_user_id = $1
            "#,
        )
        .bind(platform_user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, platform_user_id: i64) -> Result<User, EngineError> {
        let mut tx = self.db.begin().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (platform_user_id)
            VALUES ($1)
            RETURNING id, platform_user_id, created_at, last_active_at
            "#,
        )
        .bind(platform_user_id)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO user_settings (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn touch_last_active(&self, user_id: Uuid) -> Result<(), EngineError> {
        sqlx::query("UPDATE users SET last_active_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
