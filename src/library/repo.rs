use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::EngineError;
use crate::library::LibraryFood;

/// Read-side persistence for the user food library. Writes (counters, new
/// foods, aliases) happen inside the meal commit transaction.
#[async_trait]
pub trait LibraryRepository: Send + Sync {
    /// Foods whose name or any alias matches the query, with their aliases.
    async fn search_with_aliases(
        &self,
        user_id: Uuid,
        query: &str,
        limit: i64,
    ) -> Result<Vec<(LibraryFood, Vec<String>)>, EngineError>;

    async fn get_with_aliases(
        &self,
        food_id: Uuid,
    ) -> Result<Option<(LibraryFood, Vec<String>)>, EngineError>;

    async fn find_by_source_ref(
        &self,
        user_id: Uuid,
        source_type: &str,
        source_ref: &str,
    ) -> Result<Option<LibraryFood>, EngineError>;

    async fn find_by_name(
        &self,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<LibraryFood>, EngineError>;

    async fn top_foods(&self, user_id: Uuid, limit: i64) -> Result<Vec<LibraryFood>, EngineError>;
}

pub struct PgLibraryRepository {
    db: PgPool,
}

impl PgLibraryRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn aliases_for(&self, food_ids: &[Uuid]) -> Result<Vec<(Uuid, String)>, EngineError> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT food_id, alias_text
            FROM food_aliases
            WHERE food_id = ANY($1)
            ORDER BY alias_text
            "#,
        )
        .bind(food_ids)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

const FOOD_COLUMNS: &str = r#"
    id, user_id, name, brand, store, source_type, source_ref, basis,
    serving_size_g, calories, protein_g, fat_g, carbs_g,
    use_count, last_used_at, created_at
"#;

#[async_trait]
impl LibraryRepository for PgLibraryRepository {
    async fn search_with_aliases(
        &self,
        user_id: Uuid,
        query: &str,
        limit: i64,
    ) -> Result<Vec<(LibraryFood, Vec<String>)>, EngineError> {
        let pattern = format!("%{}%", query.trim());
        let foods = sqlx::query_as::<_, LibraryFood>(&format!(
            r#"
            SELECT {FOOD_COLUMNS}
            FROM foods_user_library
            WHERE user_id = $1
              AND (name ILIKE $2 OR id IN (
                    SELECT food_id FROM food_aliases
                    WHERE user_id = $1 AND alias_text ILIKE $2))
            ORDER BY name
            LIMIT $3
            "#
        ))
        .bind(user_id)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = foods.iter().map(|f| f.id).collect();
        let aliases = self.aliases_for(&ids).await?;
        Ok(foods
            .into_iter()
            .map(|food| {
                let own: Vec<String> = aliases
                    .iter()
                    .filter(|(id, _)| *id == food.id)
                    .map(|(_, alias)| alias.clone())
                    .collect();
                (food, own)
            })
            .collect())
    }

    async fn get_with_aliases(
        &self,
        food_id: Uuid,
    ) -> Result<Option<(LibraryFood, Vec<String>)>, EngineError> {
        let food = sqlx::query_as::<_, LibraryFood>(&format!(
            r#"
            SELECT {FOOD_COLUMNS}
            FROM foods_user_library
            WHERE id = $1
            "#
        ))
        .bind(food_id)
        .fetch_optional(&self.db)
        .await?;
        let Some(food) = food else {
            return Ok(None);
        };
        let aliases = self
            .aliases_for(&[food.id])
            .await?
            .into_iter()
            .map(|(_, alias)| alias)
            .collect();
        Ok(Some((food, aliases)))
    }

    async fn find_by_source_ref(
        &self,
        user_id: Uuid,
        source_type: &str,
        source_ref: &str,
    ) -> Result<Option<LibraryFood>, EngineError> {
        let food = sqlx::query_as::<_, LibraryFood>(&format!(
            r#"
            SELECT {FOOD_COLUMNS}
            FROM foods_user_library
            WHERE user_id = $1 AND source_type = $2 AND source_ref = $3
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(source_type)
        .bind(source_ref)
        .fetch_optional(&self.db)
        .await?;
        Ok(food)
    }

    async fn find_by_name(
        &self,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<LibraryFood>, EngineError> {
        let food = sqlx::query_as::<_, LibraryFood>(&format!(
            r#"
            SELECT {FOOD_COLUMNS}
            FROM foods_user_library
            WHERE user_id = $1 AND lower(name) = lower($2)
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.db)
        .await?;
        Ok(food)
    }

    async fn top_foods(&self, user_id: Uuid, limit: i64) -> Result<Vec<LibraryFood>, EngineError> {
        let foods = sqlx::query_as::<_, LibraryFood>(&format!(
            r#"
            SELECT {FOOD_COLUMNS}
            FROM foods_user_library
            WHERE user_id = $1
            ORDER BY last_used_at DESC NULLS LAST, use_count DESC, name
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(foods)
    }
}
