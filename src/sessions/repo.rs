//! Session store adapter. The context travels as an opaque JSONB blob with a
//! status tag and expiry; `save` writes status, context, and expiry in one
//! statement so a concurrent reader never sees a torn record.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::EngineError;
use crate::sessions::context::{SessionContext, SessionStatus};
use crate::sessions::SessionRecord;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(
        &self,
        user_id: Uuid,
        photo_id: Option<Uuid>,
        status: SessionStatus,
        context: &SessionContext,
        expires_at: OffsetDateTime,
    ) -> Result<SessionRecord, EngineError>;

    async fn get(&self, session_id: Uuid) -> Result<Option<SessionRecord>, EngineError>;

    /// The user's single non-terminal session, if any.
    async fn load_active(&self, user_id: Uuid) -> Result<Option<SessionRecord>, EngineError>;

    async fn save(&self, record: &SessionRecord) -> Result<(), EngineError>;

    /// Marks overdue non-terminal sessions expired; returns how many.
    async fn expire_due(&self, now: OffsetDateTime) -> Result<u64, EngineError>;
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    photo_id: Option<Uuid>,
    status: String,
    context: serde_json::Value,
    expires_at: OffsetDateTime,
}

impl SessionRow {
    fn into_record(self) -> Result<SessionRecord, EngineError> {
        let status = SessionStatus::parse(&self.status).ok_or_else(|| {
            EngineError::Internal(format!("unknown session status {:?}", self.status))
        })?;
        let context: SessionContext = serde_json::from_value(self.context)
            .map_err(|e| EngineError::Internal(format!("malformed session context: {e}")))?;
        Ok(SessionRecord {
            id: self.id,
            user_id: self.user_id,
            photo_id: self.photo_id,
            status,
            context,
            expires_at: self.expires_at,
        })
    }
}

fn context_json(context: &SessionContext) -> Result<serde_json::Value, EngineError> {
    serde_json::to_value(context)
        .map_err(|e| EngineError::Internal(format!("unserializable session context: {e}")))
}

pub struct PgSessionRepository {
    db: PgPool,
}

impl PgSessionRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create(
        &self,
        user_id: Uuid,
        photo_id: Option<Uuid>,
        status: SessionStatus,
        context: &SessionContext,
        expires_at: OffsetDateTime,
    ) -> Result<SessionRecord, EngineError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO photo_sessions (user_id, photo_id, status, context, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, photo_id, status, context, expires_at
            "#,
        )
        .bind(user_id)
        .bind(photo_id)
        .bind(status.as_str())
        .bind(context_json(context)?)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?;
        row.into_record()
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<SessionRecord>, EngineError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, photo_id, status, context, expires_at
            FROM photo_sessions
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(SessionRow::into_record).transpose()
    }

    async fn load_active(&self, user_id: Uuid) -> Result<Option<SessionRecord>, EngineError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, photo_id, status, context, expires_at
            FROM photo_sessions
            WHERE user_id = $1
              AND status NOT IN ('SAVED', 'CANCELLED', 'EXPIRED')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(SessionRow::into_record).transpose()
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            UPDATE photo_sessions
            SET status = $2, context = $3, photo_id = $4, expires_at = $5, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.status.as_str())
        .bind(context_json(&record.context)?)
        .bind(record.photo_id)
        .bind(record.expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn expire_due(&self, now: OffsetDateTime) -> Result<u64, EngineError> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            DELETE FROM photos
            WHERE id IN (
                SELECT photo_id FROM photo_sessions
                WHERE photo_id IS NOT NULL
                  AND status NOT IN ('SAVED', 'CANCELLED', 'EXPIRED')
                  AND expires_at <= $1
            )
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let updated = sqlx::query(
            r#"
            UPDATE photo_sessions
            SET status = 'EXPIRED', photo_id = NULL, updated_at = now()
            WHERE status NOT IN ('SAVED', 'CANCELLED', 'EXPIRED')
              AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(updated.rows_affected())
    }
}
