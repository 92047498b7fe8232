use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::meals::repo::{MealItemRow, MealLogRow};

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct MealListItem {
    pub id: Uuid,
    pub logged_at: OffsetDateTime,
    pub total_calories: f64,
    pub total_protein_g: f64,
    pub total_fat_g: f64,
    pub total_carbs_g: f64,
}

impl From<MealLogRow> for MealListItem {
    fn from(row: MealLogRow) -> Self {
        Self {
            id: row.id,
            logged_at: row.logged_at,
            total_calories: row.total_calories,
            total_protein_g: row.total_protein_g,
            total_fat_g: row.total_fat_g,
            total_carbs_g: row.total_carbs_g,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MealItemDetail {
    pub id: Uuid,
    pub food_id: Option<Uuid>,
    pub name: String,
    pub grams: f64,
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
}

impl From<MealItemRow> for MealItemDetail {
    fn from(row: MealItemRow) -> Self {
        Self {
            id: row.id,
            food_id: row.food_id,
            name: row.name,
            grams: row.grams,
            calories: row.calories,
            protein_g: row.protein_g,
            fat_g: row.fat_g,
            carbs_g: row.carbs_g,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MealDetails {
    pub id: Uuid,
    pub logged_at: OffsetDateTime,
    pub total_calories: f64,
    pub total_protein_g: f64,
    pub total_fat_g: f64,
    pub total_carbs_g: f64,
    pub items: Vec<MealItemDetail>,
}
