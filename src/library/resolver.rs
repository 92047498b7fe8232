//! Candidate resolver: turns a detected item label into a ranked set of
//! resolution options: library matches first, external-database results when
//! the library is not confident, and a manual-entry affordance that is always
//! offered last.
//!
//! Ranking is deterministic: a weighted blend of text similarity and usage
//! affinity, with fixed tie-breaks so repeated calls over identical state
//! produce identical ordering.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::ResolverSettings;
use crate::library::LibraryFood;
use crate::nutrition::{Basis, FoodRecord};

/// Affinity multiplier for foods that have never been used.
const NEVER_USED_DECAY: f64 = 0.25;
const CONTAINMENT_FLOOR: f64 = 0.8;

/// Nutrition profile carried by a resolution, snapshotted into the session
/// context so later library edits don't shift an in-flight session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodProfile {
    pub name: String,
    pub brand: Option<String>,
    pub store: Option<String>,
    pub basis: Basis,
    pub serving_size_g: Option<f64>,
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
}

impl FoodProfile {
    pub fn from_library(food: &LibraryFood) -> Self {
        Self {
            name: food.name.clone(),
            brand: food.brand.clone(),
            store: food.store.clone(),
            basis: Basis::parse(&food.basis),
            serving_size_g: food.serving_size_g,
            calories: food.calories,
            protein_g: food.protein_g,
            fat_g: food.fat_g,
            carbs_g: food.carbs_g,
        }
    }

    pub fn from_record(record: &FoodRecord) -> Self {
        Self {
            name: record.name.clone(),
            brand: record.brand.clone(),
            store: None,
            basis: record.basis,
            serving_size_g: record.serving_size_g,
            calories: record.calories,
            protein_g: record.protein_g,
            fat_g: record.fat_g,
            carbs_g: record.carbs_g,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FoodSource {
    Library { food_id: Uuid },
    External { ref_id: String },
    Manual,
}

/// A detected item mapped to a concrete nutrition-bearing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFood {
    pub source: FoodSource,
    pub profile: FoodProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Candidate {
    Library {
        food_id: Uuid,
        label: String,
        profile: FoodProfile,
        score: f64,
    },
    External {
        ref_id: String,
        label: String,
    },
    Manual,
}

impl Candidate {
    pub fn label(&self) -> &str {
        match self {
            Candidate::Library { label, .. } | Candidate::External { label, .. } => label,
            Candidate::Manual => "Enter manually",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankedFood {
    pub food: LibraryFood,
    pub score: f64,
}

/// Scores and orders library entries against the detected label.
pub fn rank_library(
    settings: &ResolverSettings,
    query: &str,
    entries: Vec<(LibraryFood, Vec<String>)>,
    now: OffsetDateTime,
) -> Vec<RankedFood> {
    let mut ranked: Vec<RankedFood> = entries
        .into_iter()
        .map(|(food, aliases)| {
            let similarity = text_similarity(query, &food.name, &aliases);
            let affinity = affinity(settings, food.use_count, food.last_used_at, now);
            let score = settings.text_weight * similarity + settings.affinity_weight * affinity;
            RankedFood { food, score }
        })
        .collect();
    ranked.sort_by(compare_ranked);
    ranked.truncate(settings.candidate_limit);
    ranked
}

fn compare_ranked(a: &RankedFood, b: &RankedFood) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.food.use_count.cmp(&a.food.use_count))
        .then_with(|| b.food.last_used_at.cmp(&a.food.last_used_at))
        .then_with(|| a.food.name.cmp(&b.food.name))
}

/// True when the best library score is not confident enough to skip the
/// external database.
pub fn wants_external(settings: &ResolverSettings, ranked: &[RankedFood]) -> bool {
    ranked
        .first()
        .map(|top| top.score < settings.external_lookup_threshold)
        .unwrap_or(true)
}

/// Assembles the final option list: library first (already ranked), external
/// results after, and the manual-entry affordance always last.
pub fn build_candidates(ranked: &[RankedFood], external: &[FoodRecord]) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = ranked
        .iter()
        .map(|entry| Candidate::Library {
            food_id: entry.food.id,
            label: entry.food.display_label(),
            profile: FoodProfile::from_library(&entry.food),
            score: entry.score,
        })
        .collect();
    for record in external {
        let label = match &record.brand {
            Some(brand) => format!("{} - {}", record.name, brand),
            None => record.name.clone(),
        };
        candidates.push(Candidate::External {
            ref_id: record.ref_id.clone(),
            label,
        });
    }
    candidates.push(Candidate::Manual);
    candidates
}

/// Normalized text similarity in [0, 1]: exact match (name or alias) is 1.0,
/// otherwise the best of token Jaccard and character-bigram Dice, with a
/// floor when one string contains the other.
pub fn text_similarity(query: &str, name: &str, aliases: &[String]) -> f64 {
    let q = normalize(query);
    std::iter::once(name)
        .chain(aliases.iter().map(String::as_str))
        .map(|candidate| pair_similarity(&q, &normalize(candidate)))
        .fold(0.0, f64::max)
}

fn pair_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let mut score = token_jaccard(a, b).max(bigram_dice(a, b));
    if a.contains(b) || b.contains(a) {
        score = score.max(CONTAINMENT_FLOOR);
    }
    score
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn token_jaccard(a: &str, b: &str) -> f64 {
    let ta: std::collections::BTreeSet<&str> = a.split_whitespace().collect();
    let tb: std::collections::BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    intersection / union
}

fn bigram_dice(a: &str, b: &str) -> f64 {
    let ba = bigrams(a);
    let bb = bigrams(b);
    if ba.is_empty() || bb.is_empty() {
        return 0.0;
    }
    let mut shared = 0usize;
    let mut remaining = bb.clone();
    for gram in &ba {
        if let Some(pos) = remaining.iter().position(|g| g == gram) {
            remaining.swap_remove(pos);
            shared += 1;
        }
    }
    (2.0 * shared as f64) / (ba.len() + bb.len()) as f64
}

fn bigrams(s: &str) -> Vec<[char; 2]> {
    let chars: Vec<char> = s.chars().filter(|c| !c.is_whitespace()).collect();
    chars.windows(2).map(|w| [w[0], w[1]]).collect()
}

/// Usage affinity: a saturating function of `use_count`, decayed by how long
/// ago the food was last used so stale favorites lose priority.
pub fn affinity(
    settings: &ResolverSettings,
    use_count: i32,
    last_used_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> f64 {
    let count = f64::from(use_count.max(0));
    let base = count / (count + settings.use_count_saturation);
    let decay = match last_used_at {
        Some(used_at) => {
            let age_days = ((now - used_at).as_seconds_f64() / 86_400.0).max(0.0);
            0.5_f64.powf(age_days / settings.recency_half_life_days)
        }
        None => NEVER_USED_DECAY,
    };
    base * decay
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn fixed_now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn food(name: &str, use_count: i32, last_used_days_ago: Option<i64>) -> LibraryFood {
        let now = fixed_now();
        LibraryFood {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            brand: None,
            store: None,
            source_type: "manual".into(),
            source_ref: None,
            basis: "per100g".into(),
            serving_size_g: None,
            calories: 100.0,
            protein_g: 10.0,
            fat_g: 1.0,
            carbs_g: 5.0,
            use_count,
            last_used_at: last_used_days_ago.map(|d| now - Duration::days(d)),
            created_at: now,
        }
    }

    fn settings() -> ResolverSettings {
        ResolverSettings::default()
    }

    #[test]
    fn exact_name_match_scores_one() {
        assert_eq!(text_similarity("Chicken", "chicken", &[]), 1.0);
    }

    #[test]
    fn alias_match_counts_like_name_match() {
        let aliases = vec!["grilled chicken".to_string()];
        assert_eq!(text_similarity("grilled chicken", "Chicken breast", &aliases), 1.0);
    }

    #[test]
    fn containment_gets_a_floor() {
        let score = text_similarity("rice", "brown rice bowl", &[]);
        assert!(score >= 0.8);
    }

    #[test]
    fn unrelated_names_score_low() {
        let score = text_similarity("rice", "salmon", &[]);
        assert!(score < 0.3, "got {score}");
    }

    #[test]
    fn ranking_is_deterministic_across_calls() {
        let now = fixed_now();
        let entries = || {
            vec![
                (food("chicken breast", 4, Some(2)), vec![]),
                (food("chicken thigh", 4, Some(2)), vec![]),
                (food("rice", 9, Some(1)), vec![]),
            ]
        };
        let first: Vec<String> = rank_library(&settings(), "chicken", entries(), now)
            .into_iter()
            .map(|r| r.food.name)
            .collect();
        let second: Vec<String> = rank_library(&settings(), "chicken", entries(), now)
            .into_iter()
            .map(|r| r.food.name)
            .collect();
        assert_eq!(first, second);
        // Equal score and usage falls back to lexical order.
        assert_eq!(first[0], "chicken breast");
        assert_eq!(first[1], "chicken thigh");
    }

    #[test]
    fn higher_use_count_wins_all_else_equal() {
        let now = fixed_now();
        let entries = vec![
            (food("chicken", 1, Some(3)), vec![]),
            (food("chicken", 10, Some(3)), vec![]),
        ];
        let ranked = rank_library(&settings(), "chicken", entries, now);
        assert_eq!(ranked[0].food.use_count, 10);
    }

    #[test]
    fn stale_favorites_lose_to_fresh_equals() {
        let now = fixed_now();
        let entries = vec![
            (food("oatmeal", 5, Some(365)), vec![]),
            (food("oatmeal", 5, Some(1)), vec![]),
        ];
        let ranked = rank_library(&settings(), "oatmeal", entries, now);
        assert_eq!(ranked[0].food.last_used_at, Some(now - Duration::days(1)));
    }

    #[test]
    fn affinity_is_monotonic_in_use_count() {
        let now = fixed_now();
        let used_at = Some(now - Duration::days(2));
        let s = settings();
        let mut prev = -1.0;
        for count in [0, 1, 3, 10, 50] {
            let value = affinity(&s, count, used_at, now);
            assert!(value > prev, "affinity not increasing at {count}");
            prev = value;
        }
    }

    #[test]
    fn external_wanted_only_below_threshold() {
        let now = fixed_now();
        let s = settings();
        let confident = rank_library(&s, "chicken", vec![(food("chicken", 50, Some(1)), vec![])], now);
        assert!(!wants_external(&s, &confident));
        let weak = rank_library(&s, "dragonfruit", vec![(food("chicken", 0, None), vec![])], now);
        assert!(wants_external(&s, &weak));
        assert!(wants_external(&s, &[]));
    }

    #[test]
    fn manual_entry_is_always_offered_last() {
        let record = FoodRecord {
            ref_id: "11".into(),
            name: "Rice, white".into(),
            brand: Some("Acme".into()),
            basis: Basis::Per100g,
            serving_size_g: None,
            calories: 130.0,
            protein_g: 2.7,
            fat_g: 0.3,
            carbs_g: 28.0,
        };
        let now = fixed_now();
        let ranked = rank_library(&settings(), "rice", vec![(food("rice", 2, Some(1)), vec![])], now);
        let candidates = build_candidates(&ranked, std::slice::from_ref(&record));
        assert!(matches!(candidates.first(), Some(Candidate::Library { .. })));
        assert!(matches!(candidates[1], Candidate::External { .. }));
        assert!(matches!(candidates.last(), Some(Candidate::Manual)));

        let none_from_library = build_candidates(&[], &[]);
        assert!(matches!(none_from_library.last(), Some(Candidate::Manual)));
        assert_eq!(none_from_library.len(), 1);
    }
}
