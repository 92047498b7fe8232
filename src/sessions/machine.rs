//! Pure session transitions. Every function validates the current status
//! first and returns `InvalidTransition` without touching the context when an
//! action doesn't fit; the service layer only persists on success.

use crate::error::EngineError;
use crate::library::resolver::{Candidate, FoodProfile, FoodSource, ResolvedFood};
use crate::meals::service::MealSummary;
use crate::nutrition::portion::{self, fmt_grams, fmt_kcal};
use crate::nutrition::{Basis, FoodRecord};
use crate::sessions::context::SessionStatus;
use crate::sessions::dto::{ManualEntryForm, SessionView, ViewOption};
use crate::sessions::SessionRecord;

/// Outcome of selecting a candidate: either the step is done, or the service
/// must fetch external details first.
#[derive(Debug)]
pub enum SelectOutcome {
    View(SessionView),
    NeedsDetails { ref_id: String },
}

/// Where the loop goes after a portion is recorded.
#[derive(Debug, PartialEq, Eq)]
pub enum Advance {
    NextItem(usize),
    Summarize,
}

fn ensure(record: &SessionRecord, expected: SessionStatus) -> Result<(), EngineError> {
    if record.status == expected {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition {
            expected: record.status.expected_action(),
        })
    }
}

pub fn review_view(record: &SessionRecord) -> SessionView {
    let mut lines = vec!["I think I see:".to_string()];
    for item in &record.context.items {
        match item.confidence {
            Some(confidence) => lines.push(format!(
                "- {} ({:.0}%)",
                item.label,
                confidence * 100.0
            )),
            None => lines.push(format!("- {}", item.label)),
        }
    }
    lines.push("Does this look right?".to_string());
    SessionView {
        text: lines.join("\n"),
        options: vec![
            ViewOption::new("Looks right", "confirm_items"),
            ViewOption::new("Fix items", "replace_items"),
            ViewOption::new("Cancel", "cancel"),
        ],
    }
}

/// Replace the detected list with user-provided labels; stays in review.
pub fn replace_items(record: &mut SessionRecord, text: &str) -> Result<SessionView, EngineError> {
    ensure(record, SessionStatus::ItemReview)?;
    let labels: Vec<&str> = text
        .split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .collect();
    if labels.is_empty() {
        return Err(EngineError::validation(
            "send a comma-separated list of foods, e.g. rice, chicken",
        ));
    }
    record.context.items = labels
        .into_iter()
        .map(crate::sessions::context::SessionItem::new)
        .collect();
    record.context.current_index = 0;
    record.context.summary = None;
    Ok(review_view(record))
}

/// Accept the reviewed list; returns the first item needing resolution.
pub fn confirm_items(record: &mut SessionRecord) -> Result<usize, EngineError> {
    ensure(record, SessionStatus::ItemReview)?;
    Ok(record.context.first_incomplete().unwrap_or(0))
}

/// Enter resolution for an item with freshly ranked candidates.
pub fn begin_resolution(
    record: &mut SessionRecord,
    index: usize,
    candidates: Vec<Candidate>,
) -> SessionView {
    record.context.current_index = index;
    if let Some(item) = record.context.items.get_mut(index) {
        item.candidates = candidates;
    }
    record.status = SessionStatus::ItemResolution;
    selection_view(record)
}

fn selection_view(record: &SessionRecord) -> SessionView {
    let Some(item) = record.context.current_item() else {
        return SessionView {
            text: "Nothing left to resolve.".into(),
            options: vec![ViewOption::new("Cancel", "cancel")],
        };
    };
    let mut options: Vec<ViewOption> = item
        .candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| ViewOption::new(candidate.label(), format!("select:{index}")))
        .collect();
    options.push(ViewOption::new("Cancel", "cancel"));
    SessionView {
        text: format!("Which one is the {}?", item.label),
        options,
    }
}

fn manual_prompt(label: &str) -> SessionView {
    SessionView {
        text: format!(
            "Enter {label} manually: name, basis (per 100g or per serving, with \
             serving weight), and calories, protein, fat, carbs."
        ),
        options: vec![
            ViewOption::new("Submit entry", "manual_entry"),
            ViewOption::new("Cancel", "cancel"),
        ],
    }
}

pub fn select_candidate(
    record: &mut SessionRecord,
    index: usize,
) -> Result<SelectOutcome, EngineError> {
    ensure(record, SessionStatus::ItemResolution)?;
    let item = record
        .context
        .current_item()
        .ok_or_else(|| EngineError::validation("there is no item to resolve"))?;
    let label = item.label.clone();
    let candidate = item
        .candidates
        .get(index)
        .ok_or_else(|| EngineError::validation("pick one of the listed options"))?
        .clone();
    match candidate {
        Candidate::Library {
            food_id, profile, ..
        } => {
            let resolved = ResolvedFood {
                source: FoodSource::Library { food_id },
                profile,
            };
            set_resolved(record, resolved);
            Ok(SelectOutcome::View(portion_view(record)))
        }
        Candidate::External { ref_id, .. } => Ok(SelectOutcome::NeedsDetails { ref_id }),
        Candidate::Manual => Ok(SelectOutcome::View(manual_prompt(&label))),
    }
}

/// Completes an external selection once the detail record is available.
pub fn resolve_external(
    record: &mut SessionRecord,
    food: &FoodRecord,
) -> Result<SessionView, EngineError> {
    ensure(record, SessionStatus::ItemResolution)?;
    let resolved = ResolvedFood {
        source: FoodSource::External {
            ref_id: food.ref_id.clone(),
        },
        profile: FoodProfile::from_record(food),
    };
    set_resolved(record, resolved);
    Ok(portion_view(record))
}

pub fn manual_entry(
    record: &mut SessionRecord,
    form: &ManualEntryForm,
) -> Result<SessionView, EngineError> {
    ensure(record, SessionStatus::ItemResolution)?;
    let name = form.name.trim();
    if name.is_empty() {
        return Err(EngineError::validation("the food needs a name"));
    }
    if form.basis == Basis::PerServing && !form.serving_size_g.is_some_and(|s| s > 0.0) {
        return Err(EngineError::validation(
            "per-serving entries need the serving weight in grams",
        ));
    }
    let macros = portion::parse_macros(&form.macros)?;
    let resolved = ResolvedFood {
        source: FoodSource::Manual,
        profile: FoodProfile {
            name: name.to_string(),
            brand: form.brand.clone(),
            store: form.store.clone(),
            basis: form.basis,
            serving_size_g: form.serving_size_g,
            calories: macros.calories,
            protein_g: macros.protein_g,
            fat_g: macros.fat_g,
            carbs_g: macros.carbs_g,
        },
    };
    set_resolved(record, resolved);
    Ok(portion_view(record))
}

fn set_resolved(record: &mut SessionRecord, resolved: ResolvedFood) {
    if let Some(item) = record.context.current_item_mut() {
        item.resolved = Some(resolved);
        item.grams = None;
        item.skipped = false;
    }
    record.status = SessionStatus::PortionEntry;
}

pub fn portion_view(record: &SessionRecord) -> SessionView {
    let Some(item) = record.context.current_item() else {
        return SessionView {
            text: "Nothing left to portion.".into(),
            options: vec![ViewOption::new("Cancel", "cancel")],
        };
    };
    let name = item
        .resolved
        .as_ref()
        .map(|r| r.profile.name.as_str())
        .unwrap_or(item.label.as_str());
    let mut options = Vec::new();
    if let Some(estimate) = item.estimate() {
        options.push(ViewOption::new(
            format!("Use {estimate:.0}g (est.)"),
            "accept_estimate",
        ));
    }
    options.push(ViewOption::new("Enter grams", "enter_grams"));
    options.push(ViewOption::new("Skip item", "skip_item"));
    options.push(ViewOption::new("Cancel", "cancel"));
    SessionView {
        text: format!("How much {name} is there?"),
        options,
    }
}

pub fn accept_estimate(record: &mut SessionRecord) -> Result<Advance, EngineError> {
    ensure(record, SessionStatus::PortionEntry)?;
    let estimate = record
        .context
        .current_item()
        .and_then(|item| item.estimate())
        .ok_or_else(|| {
            EngineError::validation("there is no estimate for this item; enter grams instead")
        })?;
    record_grams(record, estimate);
    Ok(advance(record))
}

pub fn enter_grams(record: &mut SessionRecord, text: &str) -> Result<Advance, EngineError> {
    ensure(record, SessionStatus::PortionEntry)?;
    let grams = portion::parse_grams(text)?;
    record_grams(record, grams);
    Ok(advance(record))
}

pub fn skip_item(record: &mut SessionRecord) -> Result<Advance, EngineError> {
    ensure(record, SessionStatus::PortionEntry)?;
    if let Some(item) = record.context.current_item_mut() {
        item.skipped = true;
        item.grams = None;
    }
    Ok(advance(record))
}

fn record_grams(record: &mut SessionRecord, grams: f64) {
    if let Some(item) = record.context.current_item_mut() {
        item.grams = Some(grams);
        item.skipped = false;
    }
}

fn advance(record: &mut SessionRecord) -> Advance {
    match record.context.first_incomplete() {
        Some(index) => Advance::NextItem(index),
        None => Advance::Summarize,
    }
}

pub fn enter_summary(record: &mut SessionRecord, summary: MealSummary) -> SessionView {
    record.context.summary = Some(summary);
    record.status = SessionStatus::SummaryConfirm;
    summary_view(record)
}

fn summary_view(record: &SessionRecord) -> SessionView {
    let Some(summary) = &record.context.summary else {
        return SessionView {
            text: "Nothing to summarize yet.".into(),
            options: vec![ViewOption::new("Cancel", "cancel")],
        };
    };
    let text = format_summary(summary);
    let mut options = Vec::new();
    if !summary.items.is_empty() {
        options.push(ViewOption::new("Save", "confirm_save"));
    }
    for (index, item) in record.context.items.iter().enumerate() {
        if !item.skipped && item.resolved.is_some() {
            let name = item
                .resolved
                .as_ref()
                .map(|r| r.profile.name.clone())
                .unwrap_or_else(|| item.label.clone());
            options.push(ViewOption::new(format!("Edit {name}"), format!("edit:{index}")));
        }
    }
    options.push(ViewOption::new("Cancel", "cancel"));
    SessionView { text, options }
}

fn format_summary(summary: &MealSummary) -> String {
    if summary.items.is_empty() {
        return "All items were skipped; there is nothing to save.".to_string();
    }
    let mut lines = vec![
        "Summary:".to_string(),
        format!(
            "Total: {} kcal, {}P / {}F / {}C",
            fmt_kcal(summary.totals.calories),
            fmt_grams(summary.totals.protein_g),
            fmt_grams(summary.totals.fat_g),
            fmt_grams(summary.totals.carbs_g),
        ),
        "Items:".to_string(),
    ];
    for item in &summary.items {
        lines.push(format!(
            "- {}: {}g, {} kcal ({}P/{}F/{}C)",
            item.name,
            fmt_grams(item.grams),
            fmt_kcal(item.macros.calories),
            fmt_grams(item.macros.protein_g),
            fmt_grams(item.macros.fat_g),
            fmt_grams(item.macros.carbs_g),
        ));
    }
    lines.join("\n")
}

/// Re-open one item from the summary; other resolutions are kept.
pub fn edit_item(record: &mut SessionRecord, index: usize) -> Result<usize, EngineError> {
    ensure(record, SessionStatus::SummaryConfirm)?;
    if index >= record.context.items.len() {
        return Err(EngineError::validation("pick one of the listed items"));
    }
    let item = &mut record.context.items[index];
    item.resolved = None;
    item.grams = None;
    item.skipped = false;
    record.context.summary = None;
    record.context.current_index = index;
    Ok(index)
}

pub fn cancel(record: &mut SessionRecord) -> Result<SessionView, EngineError> {
    if record.status.is_terminal() {
        return Err(EngineError::InvalidTransition {
            expected: record.status.expected_action(),
        });
    }
    record.status = SessionStatus::Cancelled;
    Ok(SessionView {
        text: "Session cancelled. Send another photo to start again.".into(),
        options: vec![],
    })
}

pub fn saved_view(summary: &MealSummary) -> SessionView {
    SessionView {
        text: format!(
            "Saved! {} kcal, {}P / {}F / {}C logged.",
            fmt_kcal(summary.totals.calories),
            fmt_grams(summary.totals.protein_g),
            fmt_grams(summary.totals.fat_g),
            fmt_grams(summary.totals.carbs_g),
        ),
        options: vec![],
    }
}

pub fn nothing_detected_view() -> SessionView {
    SessionView {
        text: "I couldn't find any food in that photo. Send another photo to try again.".into(),
        options: vec![],
    }
}

/// The prompt for the current state, used for resumes and re-prompts.
pub fn current_view(record: &SessionRecord) -> SessionView {
    match record.status {
        SessionStatus::Started => SessionView {
            text: "Still looking at your photo...".into(),
            options: vec![ViewOption::new("Cancel", "cancel")],
        },
        SessionStatus::ItemReview => review_view(record),
        SessionStatus::ItemResolution => selection_view(record),
        SessionStatus::PortionEntry => portion_view(record),
        SessionStatus::SummaryConfirm => summary_view(record),
        SessionStatus::Saved => SessionView {
            text: "This meal is already saved. Send a new photo to log another.".into(),
            options: vec![],
        },
        SessionStatus::Cancelled => SessionView {
            text: "This session was cancelled. Send a new photo to start.".into(),
            options: vec![],
        },
        SessionStatus::Expired => SessionView {
            text: "This session expired. Send a new photo to start over.".into(),
            options: vec![],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::context::{SessionContext, SessionItem};
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    fn record_with(status: SessionStatus, labels: &[&str]) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            photo_id: None,
            status,
            context: SessionContext {
                items: labels.iter().copied().map(SessionItem::new).collect(),
                current_index: 0,
                summary: None,
            },
            expires_at: OffsetDateTime::now_utc() + Duration::minutes(30),
        }
    }

    fn manual_candidates() -> Vec<Candidate> {
        vec![Candidate::Manual]
    }

    #[test]
    fn grams_reply_during_review_is_an_invalid_transition() {
        let mut record = record_with(SessionStatus::ItemReview, &["rice"]);
        let before = record.context.clone();
        let err = enter_grams(&mut record, "150").unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert_eq!(record.context, before);
        assert_eq!(record.status, SessionStatus::ItemReview);
    }

    #[test]
    fn replace_items_rebuilds_the_list_and_stays_in_review() {
        let mut record = record_with(SessionStatus::ItemReview, &["rice"]);
        let view = replace_items(&mut record, " salmon , soup ,, ").unwrap();
        assert_eq!(record.status, SessionStatus::ItemReview);
        let labels: Vec<&str> = record
            .context
            .items
            .iter()
            .map(|item| item.label.as_str())
            .collect();
        assert_eq!(labels, vec!["salmon", "soup"]);
        assert!(view.text.contains("salmon"));
    }

    #[test]
    fn replace_items_rejects_an_empty_list() {
        let mut record = record_with(SessionStatus::ItemReview, &["rice"]);
        let err = replace_items(&mut record, " , ,").unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(record.context.items.len(), 1);
    }

    #[test]
    fn bad_grams_text_keeps_the_portion_prompt() {
        let mut record = record_with(SessionStatus::ItemResolution, &["rice"]);
        begin_resolution(&mut record, 0, manual_candidates());
        manual_entry(
            &mut record,
            &ManualEntryForm {
                name: "rice".into(),
                brand: None,
                store: None,
                basis: Basis::Per100g,
                serving_size_g: None,
                macros: "130, 2.7, 0.3, 28".into(),
            },
        )
        .unwrap();
        let err = enter_grams(&mut record, "a bowl").unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(record.status, SessionStatus::PortionEntry);
        assert_eq!(record.context.items[0].grams, None);
    }

    #[test]
    fn manual_per_serving_requires_a_serving_weight() {
        let mut record = record_with(SessionStatus::ItemResolution, &["soup"]);
        begin_resolution(&mut record, 0, manual_candidates());
        let err = manual_entry(
            &mut record,
            &ManualEntryForm {
                name: "soup".into(),
                brand: None,
                store: None,
                basis: Basis::PerServing,
                serving_size_g: None,
                macros: "100, 5, 2, 10".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(record.status, SessionStatus::ItemResolution);
    }

    #[test]
    fn selecting_out_of_range_is_a_validation_error() {
        let mut record = record_with(SessionStatus::ItemResolution, &["rice"]);
        begin_resolution(&mut record, 0, manual_candidates());
        let err = select_candidate(&mut record, 5).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn edit_item_reopens_only_the_chosen_item() {
        let mut record = record_with(SessionStatus::SummaryConfirm, &["rice", "chicken"]);
        for item in &mut record.context.items {
            item.resolved = Some(ResolvedFood {
                source: FoodSource::Manual,
                profile: FoodProfile {
                    name: item.label.clone(),
                    brand: None,
                    store: None,
                    basis: Basis::Per100g,
                    serving_size_g: None,
                    calories: 100.0,
                    protein_g: 1.0,
                    fat_g: 1.0,
                    carbs_g: 1.0,
                },
            });
            item.grams = Some(100.0);
        }
        let index = edit_item(&mut record, 0).unwrap();
        assert_eq!(index, 0);
        assert!(record.context.items[0].resolved.is_none());
        assert!(record.context.items[1].resolved.is_some());
        assert_eq!(record.context.items[1].grams, Some(100.0));

        let err = edit_item(&mut record, 9);
        assert!(err.is_err());
    }

    #[test]
    fn cancel_is_rejected_on_terminal_sessions() {
        let mut record = record_with(SessionStatus::Saved, &["rice"]);
        assert!(cancel(&mut record).is_err());
        let mut record = record_with(SessionStatus::PortionEntry, &["rice"]);
        let view = cancel(&mut record).unwrap();
        assert_eq!(record.status, SessionStatus::Cancelled);
        assert!(view.text.contains("cancelled"));
    }
}
