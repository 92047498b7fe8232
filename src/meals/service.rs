//! Meal summary computation and the atomic commit contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::EngineError;
use crate::library::resolver::{FoodSource, ResolvedFood};
use crate::library::service::FoodWrite;
use crate::nutrition::portion::{self, Macros};

/// Totals plus per-item snapshots for one meal, computed without persisting.
/// The committed `meal_logs` totals are exactly these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealSummary {
    pub items: Vec<ItemSnapshot>,
    pub totals: Macros,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub name: String,
    pub grams: f64,
    pub macros: Macros,
}

/// A resolved, portioned item ready to be summarized or committed.
pub struct LoggableItem<'a> {
    pub resolved: &'a ResolvedFood,
    pub grams: f64,
}

pub fn build_summary(items: &[LoggableItem<'_>]) -> Result<MealSummary, EngineError> {
    let mut snapshots = Vec::with_capacity(items.len());
    for item in items {
        let profile = &item.resolved.profile;
        let at_basis = Macros {
            calories: profile.calories,
            protein_g: profile.protein_g,
            fat_g: profile.fat_g,
            carbs_g: profile.carbs_g,
        };
        let macros = portion::compute_item(
            profile.basis,
            profile.serving_size_g,
            &at_basis,
            item.grams,
        )?;
        snapshots.push(ItemSnapshot {
            name: profile.name.clone(),
            grams: item.grams,
            macros,
        });
    }
    let totals = portion::aggregate(snapshots.iter().map(|s| &s.macros));
    Ok(MealSummary {
        items: snapshots,
        totals,
    })
}

/// Nutrition-at-basis snapshot stored on each meal item, so later library
/// edits don't retroactively alter history.
pub fn nutrition_snapshot(resolved: &ResolvedFood) -> serde_json::Value {
    let profile = &resolved.profile;
    let (source_type, source_ref) = match &resolved.source {
        FoodSource::Library { food_id } => ("library", Some(food_id.to_string())),
        FoodSource::External { ref_id } => ("fdc", Some(ref_id.clone())),
        FoodSource::Manual => ("manual", None),
    };
    json!({
        "basis": profile.basis.as_str(),
        "serving_size_g": profile.serving_size_g,
        "calories": profile.calories,
        "protein_g": profile.protein_g,
        "fat_g": profile.fat_g,
        "carbs_g": profile.carbs_g,
        "source_type": source_type,
        "source_ref": source_ref,
    })
}

#[derive(Debug)]
pub struct CommitItem {
    pub name: String,
    pub grams: f64,
    pub macros: Macros,
    pub nutrition_snapshot: serde_json::Value,
    pub write: FoodWrite,
}

/// Everything the storage layer needs to finalize a session in one
/// transaction: meal log, items, library writes, audit event, and the session
/// flip to SAVED.
#[derive(Debug)]
pub struct CommitPlan {
    pub session_id: Uuid,
    pub photo_id: Option<Uuid>,
    pub user_id: Uuid,
    pub logged_at: OffsetDateTime,
    pub totals: Macros,
    pub items: Vec<CommitItem>,
    pub audit_after: serde_json::Value,
}

/// All-or-nothing by contract: a failure leaves no meal, no items, no library
/// counter changes, and the session untouched.
#[async_trait]
pub trait MealCommitRepository: Send + Sync {
    async fn commit(&self, plan: &CommitPlan) -> Result<Uuid, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::resolver::FoodProfile;
    use crate::nutrition::Basis;

    fn resolved(calories: f64, protein: f64, fat: f64, carbs: f64) -> ResolvedFood {
        ResolvedFood {
            source: FoodSource::Manual,
            profile: FoodProfile {
                name: "food".into(),
                brand: None,
                store: None,
                basis: Basis::Per100g,
                serving_size_g: None,
                calories,
                protein_g: protein,
                fat_g: fat,
                carbs_g: carbs,
            },
        }
    }

    #[test]
    fn summary_totals_equal_item_sums() {
        let chicken = resolved(165.0, 31.0, 3.6, 0.0);
        let rice = resolved(130.0, 2.7, 0.3, 28.0);
        let summary = build_summary(&[
            LoggableItem {
                resolved: &chicken,
                grams: 120.0,
            },
            LoggableItem {
                resolved: &rice,
                grams: 150.0,
            },
        ])
        .unwrap();

        for field in [
            |m: &Macros| m.calories,
            |m: &Macros| m.protein_g,
            |m: &Macros| m.fat_g,
            |m: &Macros| m.carbs_g,
        ] {
            let sum: f64 = summary.items.iter().map(|i| field(&i.macros)).sum();
            assert!((field(&summary.totals) - sum).abs() < 1e-9);
        }
    }

    #[test]
    fn summary_rejects_unportionable_item() {
        let mut bad = resolved(200.0, 5.0, 2.0, 40.0);
        bad.profile.basis = Basis::PerServing;
        bad.profile.serving_size_g = None;
        let err = build_summary(&[LoggableItem {
            resolved: &bad,
            grams: 100.0,
        }])
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn snapshot_records_source_and_basis() {
        let food = resolved(100.0, 1.0, 2.0, 3.0);
        let snapshot = nutrition_snapshot(&food);
        assert_eq!(snapshot["basis"], "per100g");
        assert_eq!(snapshot["source_type"], "manual");
        assert_eq!(snapshot["calories"], 100.0);
    }
}
