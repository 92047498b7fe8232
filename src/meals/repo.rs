//! Meal persistence: the atomic commit transaction and the reporting reads
//! over committed logs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::audit;
use crate::error::EngineError;
use crate::library::service::FoodWrite;
use crate::meals::service::{CommitPlan, MealCommitRepository};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealLogRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub logged_at: OffsetDateTime,
    pub total_calories: f64,
    pub total_protein_g: f64,
    pub total_fat_g: f64,
    pub total_carbs_g: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealItemRow {
    pub id: Uuid,
    pub meal_log_id: Uuid,
    pub food_id: Option<Uuid>,
    pub name: String,
    pub grams: f64,
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
}

pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<MealLogRow>> {
    let rows = sqlx::query_as::<_, MealLogRow>(
        r#"
        SELECT id, user_id, logged_at, total_calories, total_protein_g,
               total_fat_g, total_carbs_g
        FROM meal_logs
        WHERE user_id = $1
        ORDER BY logged_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn get_with_items(
    db: &PgPool,
    user_id: Uuid,
    meal_id: Uuid,
) -> anyhow::Result<Option<(MealLogRow, Vec<MealItemRow>)>> {
    let log = sqlx::query_as::<_, MealLogRow>(
        r#"
        SELECT id, user_id, logged_at, total_calories, total_protein_g,
               total_fat_g, total_carbs_g
        FROM meal_logs
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(meal_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    let Some(log) = log else {
        return Ok(None);
    };
    let items = sqlx::query_as::<_, MealItemRow>(
        r#"
        SELECT id, meal_log_id, food_id, name, grams, calories, protein_g,
               fat_g, carbs_g
        FROM meal_items
        WHERE meal_log_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(meal_id)
    .fetch_all(db)
    .await?;
    Ok(Some((log, items)))
}

pub struct PgMealCommitRepository {
    db: PgPool,
}

impl PgMealCommitRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MealCommitRepository for PgMealCommitRepository {
    /// One transaction: meal log, items, library writes, the audit event, the
    /// session flip to SAVED, and photo cleanup. Any failure rolls the whole
    /// thing back and surfaces as `CommitFailure`.
    async fn commit(&self, plan: &CommitPlan) -> Result<Uuid, EngineError> {
        let mut tx = self.db.begin().await.map_err(EngineError::CommitFailure)?;

        let (meal_id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO meal_logs
                (user_id, logged_at, total_calories, total_protein_g,
                 total_fat_g, total_carbs_g)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(plan.user_id)
        .bind(plan.logged_at)
        .bind(plan.totals.calories)
        .bind(plan.totals.protein_g)
        .bind(plan.totals.fat_g)
        .bind(plan.totals.carbs_g)
        .fetch_one(&mut *tx)
        .await
        .map_err(EngineError::CommitFailure)?;

        for item in &plan.items {
            let food_id = match &item.write {
                FoodWrite::Use { food_id, alias } => {
                    sqlx::query(
                        r#"
                        UPDATE foods_user_library
                        SET use_count = use_count + 1, last_used_at = $2
                        WHERE id = $1
                        "#,
                    )
                    .bind(food_id)
                    .bind(plan.logged_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(EngineError::CommitFailure)?;
                    if let Some(alias) = alias {
                        sqlx::query(
                            r#"
                            INSERT INTO food_aliases (user_id, food_id, alias_text)
                            VALUES ($1, $2, $3)
                            ON CONFLICT (food_id, alias_text) DO NOTHING
                            "#,
                        )
                        .bind(plan.user_id)
                        .bind(food_id)
                        .bind(alias)
                        .execute(&mut *tx)
                        .await
                        .map_err(EngineError::CommitFailure)?;
                    }
                    *food_id
                }
                FoodWrite::Create { food } => {
                    let (food_id,): (Uuid,) = sqlx::query_as(
                        r#"
                        INSERT INTO foods_user_library
                            (user_id, name, brand, store, source_type, source_ref,
                             basis, serving_size_g, calories, protein_g, fat_g,
                             carbs_g, use_count, last_used_at)
                        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 1, $13)
                        RETURNING id
                        "#,
                    )
                    .bind(plan.user_id)
                    .bind(&food.name)
                    .bind(&food.brand)
                    .bind(&food.store)
                    .bind(&food.source_type)
                    .bind(&food.source_ref)
                    .bind(food.basis.as_str())
                    .bind(food.serving_size_g)
                    .bind(food.calories)
                    .bind(food.protein_g)
                    .bind(food.fat_g)
                    .bind(food.carbs_g)
                    .bind(plan.logged_at)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(EngineError::CommitFailure)?;
                    food_id
                }
            };

            sqlx::query(
                r#"
                INSERT INTO meal_items
                    (meal_log_id, food_id, name, grams, calories, protein_g,
                     fat_g, carbs_g, nutrition_snapshot)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(meal_id)
            .bind(food_id)
            .bind(&item.name)
            .bind(item.grams)
            .bind(item.macros.calories)
            .bind(item.macros.protein_g)
            .bind(item.macros.fat_g)
            .bind(item.macros.carbs_g)
            .bind(&item.nutrition_snapshot)
            .execute(&mut *tx)
            .await
            .map_err(EngineError::CommitFailure)?;
        }

        audit::insert_event(
            &mut tx,
            plan.user_id,
            "meal_log",
            meal_id,
            "meal_saved",
            None,
            Some(&plan.audit_after),
        )
        .await
        .map_err(EngineError::CommitFailure)?;

        sqlx::query(
            r#"
            UPDATE photo_sessions
            SET status = 'SAVED', photo_id = NULL, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(plan.session_id)
        .execute(&mut *tx)
        .await
        .map_err(EngineError::CommitFailure)?;

        if let Some(photo_id) = plan.photo_id {
            sqlx::query("DELETE FROM photos WHERE id = $1")
                .bind(photo_id)
                .execute(&mut *tx)
                .await
                .map_err(EngineError::CommitFailure)?;
        }

        tx.commit().await.map_err(EngineError::CommitFailure)?;
        Ok(meal_id)
    }
}
