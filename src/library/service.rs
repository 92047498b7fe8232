use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::ResolverSettings;
use crate::error::EngineError;
use crate::library::repo::LibraryRepository;
use crate::library::resolver::{self, FoodSource, RankedFood, ResolvedFood};
use crate::nutrition::Basis;

/// A planned library mutation, executed inside the meal commit transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum FoodWrite {
    /// Reuse an existing entry: bump `use_count`, stamp `last_used_at`, and
    /// optionally record the detected label as a new alias.
    Use {
        food_id: Uuid,
        alias: Option<String>,
    },
    /// First save of a novel food (manual entry or external selection).
    Create { food: NewLibraryFood },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLibraryFood {
    pub name: String,
    pub brand: Option<String>,
    pub store: Option<String>,
    pub source_type: String,
    pub source_ref: Option<String>,
    pub basis: Basis,
    pub serving_size_g: Option<f64>,
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
}

pub struct LibraryService {
    repo: Arc<dyn LibraryRepository>,
    settings: ResolverSettings,
}

impl LibraryService {
    pub fn new(repo: Arc<dyn LibraryRepository>, settings: ResolverSettings) -> Self {
        Self { repo, settings }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Ranked library matches for a detected item label.
    pub async fn ranked_matches(
        &self,
        user_id: Uuid,
        label: &str,
        now: OffsetDateTime,
    ) -> Result<Vec<RankedFood>, EngineError> {
        let fetch_limit = (self.settings.candidate_limit * 2).max(10) as i64;
        let entries = self
            .repo
            .search_with_aliases(user_id, label, fetch_limit)
            .await?;
        Ok(resolver::rank_library(&self.settings, label, entries, now))
    }

    pub fn wants_external(&self, ranked: &[RankedFood]) -> bool {
        resolver::wants_external(&self.settings, ranked)
    }

    /// Library Writer planning for one resolved item: decide between reusing
    /// an existing entry and creating a new one, and whether the detected
    /// label should become an alias. Read-only; the write itself happens in
    /// the commit transaction.
    pub async fn plan_food_write(
        &self,
        user_id: Uuid,
        detected_label: &str,
        resolved: &ResolvedFood,
    ) -> Result<FoodWrite, EngineError> {
        match &resolved.source {
            FoodSource::Library { food_id } => {
                match self.repo.get_with_aliases(*food_id).await? {
                    Some((food, aliases)) => Ok(FoodWrite::Use {
                        food_id: food.id,
                        alias: alias_for(detected_label, &food.name, &aliases),
                    }),
                    // The entry vanished mid-session; re-create it from the
                    // snapshot the session carries.
                    None => Ok(FoodWrite::Create {
                        food: new_food_from(resolved, "manual", None),
                    }),
                }
            }
            FoodSource::External { ref_id } => {
                match self
                    .repo
                    .find_by_source_ref(user_id, "fdc", ref_id)
                    .await?
                {
                    Some(existing) => Ok(FoodWrite::Use {
                        food_id: existing.id,
                        alias: alias_for(detected_label, &existing.name, &[]),
                    }),
                    None => Ok(FoodWrite::Create {
                        food: new_food_from(resolved, "fdc", Some(ref_id.clone())),
                    }),
                }
            }
            FoodSource::Manual => {
                match self.repo.find_by_name(user_id, &resolved.profile.name).await? {
                    Some(existing) => Ok(FoodWrite::Use {
                        food_id: existing.id,
                        alias: alias_for(detected_label, &existing.name, &[]),
                    }),
                    None => Ok(FoodWrite::Create {
                        food: new_food_from(resolved, "manual", None),
                    }),
                }
            }
        }
    }
}

fn alias_for(detected_label: &str, food_name: &str, known_aliases: &[String]) -> Option<String> {
    let label = detected_label.trim();
    if label.is_empty() || label.eq_ignore_ascii_case(food_name) {
        return None;
    }
    if known_aliases
        .iter()
        .any(|alias| alias.eq_ignore_ascii_case(label))
    {
        return None;
    }
    Some(label.to_string())
}

fn new_food_from(resolved: &ResolvedFood, source_type: &str, source_ref: Option<String>) -> NewLibraryFood {
    let profile = &resolved.profile;
    NewLibraryFood {
        name: profile.name.clone(),
        brand: profile.brand.clone(),
        store: profile.store.clone(),
        source_type: source_type.to_string(),
        source_ref,
        basis: profile.basis,
        serving_size_g: profile.serving_size_g,
        calories: profile.calories,
        protein_g: profile.protein_g,
        fat_g: profile.fat_g,
        carbs_g: profile.carbs_g,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_skipped_when_label_matches_name_or_alias() {
        assert_eq!(alias_for("Chicken", "chicken", &[]), None);
        assert_eq!(
            alias_for("grilled chicken", "Chicken breast", &["Grilled Chicken".into()]),
            None
        );
        assert_eq!(alias_for("  ", "Chicken breast", &[]), None);
    }

    #[test]
    fn alias_recorded_when_label_is_new_text() {
        assert_eq!(
            alias_for("grilled chicken", "Chicken breast", &[]),
            Some("grilled chicken".to_string())
        );
    }
}
