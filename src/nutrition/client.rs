//! FDC-style nutrition database client. Search and detail calls run with a
//! bounded timeout; any transport or decode failure surfaces as
//! `ExternalLookupUnavailable` so callers can degrade to library-only options.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::config::NutritionApiConfig;
use crate::error::EngineError;
use crate::nutrition::cache::TtlCache;
use crate::nutrition::{Basis, FoodRecord, NutritionLookup};

const NUTRIENT_CALORIES: i64 = 1008;
const NUTRIENT_PROTEIN: i64 = 1003;
const NUTRIENT_FAT: i64 = 1004;
const NUTRIENT_CARBS: i64 = 1005;

pub struct FdcClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FdcClient {
    pub fn new(config: &NutritionApiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    foods: Vec<FdcFood>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FdcFood {
    fdc_id: i64,
    #[serde(default)]
    description: String,
    brand_owner: Option<String>,
    brand_name: Option<String>,
    serving_size: Option<f64>,
    #[serde(default)]
    food_nutrients: Vec<FdcNutrient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FdcNutrient {
    nutrient_id: Option<i64>,
    nutrient: Option<FdcNutrientInfo>,
    amount: Option<f64>,
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FdcNutrientInfo {
    id: Option<i64>,
}

impl FdcFood {
    /// FDC reports nutrients per 100g for the data types we query.
    fn into_record(self) -> FoodRecord {
        let mut calories = 0.0;
        let mut protein = 0.0;
        let mut fat = 0.0;
        let mut carbs = 0.0;
        for nutrient in &self.food_nutrients {
            let id = nutrient
                .nutrient
                .as_ref()
                .and_then(|n| n.id)
                .or(nutrient.nutrient_id);
            let amount = nutrient.amount.or(nutrient.value);
            let (Some(id), Some(amount)) = (id, amount) else {
                continue;
            };
            match id {
                NUTRIENT_CALORIES => calories = amount,
                NUTRIENT_PROTEIN => protein = amount,
                NUTRIENT_FAT => fat = amount,
                NUTRIENT_CARBS => carbs = amount,
                _ => {}
            }
        }
        FoodRecord {
            ref_id: self.fdc_id.to_string(),
            name: self.description,
            brand: self.brand_owner.or(self.brand_name),
            basis: Basis::Per100g,
            serving_size_g: self.serving_size,
            calories,
            protein_g: protein,
            fat_g: fat,
            carbs_g: carbs,
        }
    }
}

#[async_trait]
impl NutritionLookup for FdcClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<FoodRecord>, EngineError> {
        let url = format!("{}/foods/search", self.base_url);
        let page_size = limit.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", query),
                ("pageSize", page_size.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!(error = %e, query, "nutrition search failed");
                EngineError::ExternalLookupUnavailable
            })?;
        let payload: SearchResponse = response.json().await.map_err(|e| {
            warn!(error = %e, query, "nutrition search returned malformed payload");
            EngineError::ExternalLookupUnavailable
        })?;
        Ok(payload
            .foods
            .into_iter()
            .map(FdcFood::into_record)
            .collect())
    }

    async fn details(&self, ref_id: &str) -> Result<FoodRecord, EngineError> {
        let url = format!("{}/food/{}", self.base_url, ref_id);
        let response = self
            .http
            .get(&url)
            .query(&[("api_key", &self.api_key)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!(error = %e, ref_id, "nutrition detail fetch failed");
                EngineError::ExternalLookupUnavailable
            })?;
        let payload: FdcFood = response.json().await.map_err(|e| {
            warn!(error = %e, ref_id, "nutrition detail returned malformed payload");
            EngineError::ExternalLookupUnavailable
        })?;
        Ok(payload.into_record())
    }
}

/// TTL-caching decorator over any `NutritionLookup`. Search results are cached
/// briefly; full detail records for longer (nutrition data rarely changes).
pub struct CachedLookup<L> {
    inner: L,
    searches: TtlCache<Vec<FoodRecord>>,
    foods: TtlCache<FoodRecord>,
    search_ttl_secs: i64,
    food_ttl_secs: i64,
}

impl<L> CachedLookup<L> {
    pub fn new(inner: L, search_ttl_secs: i64, food_ttl_secs: i64) -> Self {
        Self {
            inner,
            searches: TtlCache::new(),
            foods: TtlCache::new(),
            search_ttl_secs,
            food_ttl_secs,
        }
    }
}

#[async_trait]
impl<L: NutritionLookup> NutritionLookup for CachedLookup<L> {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<FoodRecord>, EngineError> {
        let key = format!("search:{}:{}", query.to_lowercase(), limit);
        if let Some(hit) = self.searches.get(&key).await {
            return Ok(hit);
        }
        let results = self.inner.search(query, limit).await?;
        self.searches
            .insert(key, results.clone(), self.search_ttl_secs)
            .await;
        Ok(results)
    }

    async fn details(&self, ref_id: &str) -> Result<FoodRecord, EngineError> {
        let key = format!("food:{ref_id}");
        if let Some(hit) = self.foods.get(&key).await {
            return Ok(hit);
        }
        let record = self.inner.details(ref_id).await?;
        self.foods
            .insert(key, record.clone(), self.food_ttl_secs)
            .await;
        Ok(record)
    }
}
