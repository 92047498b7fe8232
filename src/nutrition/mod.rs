pub mod cache;
pub mod client;
pub mod portion;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Reference quantity a food's stored nutrition values are defined against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Basis {
    Per100g,
    PerServing,
}

impl Basis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Basis::Per100g => "per100g",
            Basis::PerServing => "perServing",
        }
    }

    /// Unknown stored values fall back to per-100g, matching how external
    /// records default.
    pub fn parse(value: &str) -> Basis {
        match value {
            "perServing" => Basis::PerServing,
            _ => Basis::Per100g,
        }
    }
}

/// A nutrition-bearing record from the external database or the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodRecord {
    pub ref_id: String,
    pub name: String,
    pub brand: Option<String>,
    pub basis: Basis,
    pub serving_size_g: Option<f64>,
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
}

/// Narrow query interface over the external nutrition database. Callers must
/// tolerate failure: a lookup error degrades to library-only options.
#[async_trait]
pub trait NutritionLookup: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<FoodRecord>, EngineError>;
    async fn details(&self, ref_id: &str) -> Result<FoodRecord, EngineError>;
}
