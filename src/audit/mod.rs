//! Append-only audit trail: before/after snapshots of tracked mutations, for
//! answering "what got saved and why".

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

/// Inserts an event inside the caller's transaction so audit rows share the
/// fate of the mutation they describe.
pub async fn insert_event(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    entity_type: &str,
    entity_id: Uuid,
    event_type: &str,
    before: Option<&serde_json::Value>,
    after: Option<&serde_json::Value>,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_events
            (user_id, entity_type, entity_id, event_type, before, after)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(user_id)
    .bind(entity_type)
    .bind(entity_id)
    .bind(event_type)
    .bind(before)
    .bind(after)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
