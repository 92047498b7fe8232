use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct NutritionApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub search_ttl_secs: i64,
    pub food_ttl_secs: i64,
}

/// Ranking policy for the candidate resolver. Named configuration rather than
/// hard-coded literals so the ordering properties stay testable on their own.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverSettings {
    pub text_weight: f64,
    pub affinity_weight: f64,
    /// Best library score below this triggers an external-database search.
    pub external_lookup_threshold: f64,
    pub recency_half_life_days: f64,
    pub use_count_saturation: f64,
    pub candidate_limit: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            text_weight: 0.7,
            affinity_weight: 0.3,
            external_lookup_threshold: 0.82,
            recency_half_life_days: 30.0,
            use_count_saturation: 5.0,
            candidate_limit: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub nutrition: NutritionApiConfig,
    pub resolver: ResolverSettings,
    pub session_ttl_minutes: i64,
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let nutrition = NutritionApiConfig {
            base_url: std::env::var("FDC_BASE_URL")
                .unwrap_or_else(|_| "https://api.nal.usda.gov/fdc/v1".into()),
            api_key: std::env::var("FDC_API_KEY")?,
            timeout_secs: env_or("FDC_TIMEOUT_SECS", 8),
            search_ttl_secs: env_or("FDC_SEARCH_TTL_SECS", 3600),
            food_ttl_secs: env_or("FDC_FOOD_TTL_SECS", 86_400),
        };
        let defaults = ResolverSettings::default();
        let resolver = ResolverSettings {
            text_weight: env_or("RESOLVER_TEXT_WEIGHT", defaults.text_weight),
            affinity_weight: env_or("RESOLVER_AFFINITY_WEIGHT", defaults.affinity_weight),
            external_lookup_threshold: env_or(
                "RESOLVER_EXTERNAL_THRESHOLD",
                defaults.external_lookup_threshold,
            ),
            recency_half_life_days: env_or(
                "RESOLVER_RECENCY_HALF_LIFE_DAYS",
                defaults.recency_half_life_days,
            ),
            use_count_saturation: env_or(
                "RESOLVER_USE_COUNT_SATURATION",
                defaults.use_count_saturation,
            ),
            candidate_limit: env_or("RESOLVER_CANDIDATE_LIMIT", defaults.candidate_limit),
        };
        Ok(Self {
            database_url,
            nutrition,
            resolver,
            session_ttl_minutes: env_or("SESSION_TTL_MINUTES", 30),
            sweep_interval_secs: env_or("SESSION_SWEEP_INTERVAL_SECS", 60),
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
