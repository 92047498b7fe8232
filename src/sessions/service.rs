//! Session orchestration: owns one photo-to-meal workflow per user from
//! creation to the atomic commit, composing the resolver, portion math, and
//! store adapter around the pure transition functions in `machine`.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::library::resolver;
use crate::library::service::LibraryService;
use crate::meals::service::{
    self as meal_service, CommitItem, CommitPlan, LoggableItem, MealCommitRepository, MealSummary,
};
use crate::nutrition::NutritionLookup;
use crate::photos::repo::PhotoRepository;
use crate::sessions::context::{SessionContext, SessionItem, SessionStatus};
use crate::sessions::dto::{ActionResponse, SessionAction, SessionView, VisionItem};
use crate::sessions::locks::SessionLocks;
use crate::sessions::machine::{self, Advance, SelectOutcome};
use crate::sessions::repo::SessionRepository;
use crate::sessions::SessionRecord;
use crate::users::service::UserService;

pub struct SessionService {
    users: UserService,
    photos: Arc<dyn PhotoRepository>,
    sessions: Arc<dyn SessionRepository>,
    library: LibraryService,
    nutrition: Arc<dyn NutritionLookup>,
    commits: Arc<dyn MealCommitRepository>,
    locks: SessionLocks,
    session_ttl: Duration,
}

impl SessionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: UserService,
        photos: Arc<dyn PhotoRepository>,
        sessions: Arc<dyn SessionRepository>,
        library: LibraryService,
        nutrition: Arc<dyn NutritionLookup>,
        commits: Arc<dyn MealCommitRepository>,
        session_ttl_minutes: i64,
    ) -> Self {
        Self {
            users,
            photos,
            sessions,
            library,
            nutrition,
            commits,
            locks: SessionLocks::new(),
            session_ttl: Duration::minutes(session_ttl_minutes),
        }
    }

    /// The single exposed operation: apply one user action and return the
    /// next prompt. Actions for one user are serialized by a keyed lock.
    pub async fn handle_action(
        &self,
        platform_user_id: i64,
        session_id: Option<Uuid>,
        action: SessionAction,
    ) -> Result<ActionResponse, EngineError> {
        let user = self.users.ensure_user(platform_user_id).await?;
        let _guard = self.locks.acquire(user.id).await;
        match action {
            SessionAction::StartPhoto {
                photo_file_id,
                items,
            } => self.start_or_resume(user.id, photo_file_id, items).await,
            other => self.drive(user.id, session_id, other).await,
        }
    }

    /// Background sweep entry point.
    pub async fn expire_due(&self) -> Result<u64, EngineError> {
        let count = self.sessions.expire_due(OffsetDateTime::now_utc()).await?;
        if count > 0 {
            info!(count, "expired overdue sessions");
        }
        Ok(count)
    }

    async fn start_or_resume(
        &self,
        user_id: Uuid,
        photo_file_id: Option<String>,
        items: Vec<VisionItem>,
    ) -> Result<ActionResponse, EngineError> {
        let now = OffsetDateTime::now_utc();
        if let Some(mut active) = self.sessions.load_active(user_id).await? {
            if active.expires_at > now {
                // Resume: re-display the current step, never a second session.
                let view = machine::current_view(&active);
                return Ok(respond(&active, view));
            }
            self.mark_expired(&mut active).await?;
        }

        let photo_id = match photo_file_id.as_deref() {
            Some(file_id) => Some(self.photos.create(user_id, file_id).await?),
            None => None,
        };
        let context = seed_context(&items);
        let mut record = self
            .sessions
            .create(
                user_id,
                photo_id,
                SessionStatus::Started,
                &context,
                now + self.session_ttl,
            )
            .await?;

        if record.context.items.is_empty() {
            record.status = SessionStatus::Cancelled;
            self.clear_photo(&mut record).await?;
            self.sessions.save(&record).await?;
            return Ok(respond(&record, machine::nothing_detected_view()));
        }

        record.status = SessionStatus::ItemReview;
        self.sessions.save(&record).await?;
        let view = machine::review_view(&record);
        Ok(respond(&record, view))
    }

    async fn drive(
        &self,
        user_id: Uuid,
        session_id: Option<Uuid>,
        action: SessionAction,
    ) -> Result<ActionResponse, EngineError> {
        let now = OffsetDateTime::now_utc();
        let record = match session_id {
            Some(id) => {
                let record = self.sessions.get(id).await?.ok_or(EngineError::NotFound)?;
                if record.user_id != user_id {
                    return Err(EngineError::NotFound);
                }
                record
            }
            None => self
                .sessions
                .load_active(user_id)
                .await?
                .ok_or_else(|| {
                    EngineError::validation("there is no active session; send a photo to start one")
                })?,
        };

        match record.status {
            SessionStatus::Expired => return Err(EngineError::ExpiredSession),
            SessionStatus::Saved | SessionStatus::Cancelled => {
                return Err(EngineError::validation(
                    "that session is already finished; send a new photo to start another",
                ))
            }
            _ => {}
        }
        if record.expires_at <= now {
            let mut overdue = record;
            self.mark_expired(&mut overdue).await?;
            return Err(EngineError::ExpiredSession);
        }

        // Work on a copy; the stored record only changes on success.
        let mut working = record.clone();
        match self.apply(&mut working, action).await {
            Ok(view) => {
                working.expires_at = OffsetDateTime::now_utc() + self.session_ttl;
                self.sessions.save(&working).await?;
                Ok(respond(&working, view))
            }
            Err(err)
                if err.is_recoverable() || matches!(err, EngineError::CommitFailure(_)) =>
            {
                warn!(session_id = %record.id, error = %err, "recoverable action failure");
                let reprompt = machine::current_view(&record);
                Ok(ActionResponse {
                    session_id: Some(record.id),
                    status: record.status.as_str(),
                    view: SessionView {
                        text: format!("{err}\n\n{}", reprompt.text),
                        options: reprompt.options,
                    },
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn apply(
        &self,
        record: &mut SessionRecord,
        action: SessionAction,
    ) -> Result<SessionView, EngineError> {
        match action {
            SessionAction::StartPhoto { .. } => Err(EngineError::InvalidTransition {
                expected: record.status.expected_action(),
            }),
            SessionAction::ConfirmItems => {
                let index = machine::confirm_items(record)?;
                self.enter_resolution(record, index).await
            }
            SessionAction::ReplaceItems { items } => machine::replace_items(record, &items),
            SessionAction::SelectCandidate { index } => {
                match machine::select_candidate(record, index)? {
                    SelectOutcome::View(view) => Ok(view),
                    SelectOutcome::NeedsDetails { ref_id } => {
                        match self.nutrition.details(&ref_id).await {
                            Ok(food) => machine::resolve_external(record, &food),
                            Err(EngineError::ExternalLookupUnavailable) => {
                                warn!(ref_id = %ref_id, "detail fetch failed; re-prompting");
                                let reprompt = machine::current_view(record);
                                Ok(SessionView {
                                    text: format!(
                                        "The nutrition database is unavailable right now. \
                                         Choose another option or try again.\n\n{}",
                                        reprompt.text
                                    ),
                                    options: reprompt.options,
                                })
                            }
                            Err(err) => Err(err),
                        }
                    }
                }
            }
            SessionAction::ManualEntry { entry } => machine::manual_entry(record, &entry),
            SessionAction::AcceptEstimate => {
                let advance = machine::accept_estimate(record)?;
                self.after_advance(record, advance).await
            }
            SessionAction::EnterGrams { text } => {
                let advance = machine::enter_grams(record, &text)?;
                self.after_advance(record, advance).await
            }
            SessionAction::SkipItem => {
                let advance = machine::skip_item(record)?;
                self.after_advance(record, advance).await
            }
            SessionAction::ConfirmSave => self.commit(record).await,
            SessionAction::EditItem { index } => {
                let index = machine::edit_item(record, index)?;
                self.enter_resolution(record, index).await
            }
            SessionAction::Cancel => {
                let view = machine::cancel(record)?;
                self.clear_photo(record).await?;
                Ok(view)
            }
        }
    }

    /// Resolver step: ranked library matches, external results only when the
    /// library isn't confident, manual entry always offered. External failure
    /// degrades to library-only and never blocks the session.
    async fn enter_resolution(
        &self,
        record: &mut SessionRecord,
        index: usize,
    ) -> Result<SessionView, EngineError> {
        let item = record
            .context
            .items
            .get(index)
            .ok_or_else(|| EngineError::Internal("resolution index out of range".into()))?;
        let candidates = if item.candidates.is_empty() {
            let label = item.label.clone();
            let ranked = self
                .library
                .ranked_matches(record.user_id, &label, OffsetDateTime::now_utc())
                .await?;
            let external = if self.library.wants_external(&ranked) {
                match self
                    .nutrition
                    .search(&label, self.library.settings().candidate_limit)
                    .await
                {
                    Ok(results) => results,
                    Err(err) => {
                        warn!(error = %err, label = %label, "external search failed; library and manual only");
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };
            resolver::build_candidates(&ranked, &external)
        } else {
            item.candidates.clone()
        };
        Ok(machine::begin_resolution(record, index, candidates))
    }

    async fn after_advance(
        &self,
        record: &mut SessionRecord,
        advance: Advance,
    ) -> Result<SessionView, EngineError> {
        match advance {
            Advance::NextItem(index) => self.enter_resolution(record, index).await,
            Advance::Summarize => {
                let summary = summarize(&record.context)?;
                Ok(machine::enter_summary(record, summary))
            }
        }
    }

    async fn commit(&self, record: &mut SessionRecord) -> Result<SessionView, EngineError> {
        if record.status != SessionStatus::SummaryConfirm {
            return Err(EngineError::InvalidTransition {
                expected: record.status.expected_action(),
            });
        }
        let summary = summarize(&record.context)?;
        if summary.items.is_empty() {
            return Err(EngineError::validation(
                "every item was skipped, so there is nothing to save; cancel instead",
            ));
        }

        let mut items = Vec::with_capacity(summary.items.len());
        let mut snapshot_index = 0usize;
        for item in &record.context.items {
            if item.skipped {
                continue;
            }
            let (Some(resolved), Some(grams)) = (&item.resolved, item.grams) else {
                continue;
            };
            let macros = summary.items[snapshot_index].macros;
            snapshot_index += 1;
            items.push(CommitItem {
                name: resolved.profile.name.clone(),
                grams,
                macros,
                nutrition_snapshot: meal_service::nutrition_snapshot(resolved),
                write: self
                    .library
                    .plan_food_write(record.user_id, &item.label, resolved)
                    .await?,
            });
        }

        let audit_after = serde_json::json!({
            "total_calories": summary.totals.calories,
            "total_protein_g": summary.totals.protein_g,
            "total_fat_g": summary.totals.fat_g,
            "total_carbs_g": summary.totals.carbs_g,
            "items": summary.items.iter().map(|item| serde_json::json!({
                "name": item.name,
                "grams": item.grams,
                "calories": item.macros.calories,
            })).collect::<Vec<_>>(),
        });
        let plan = CommitPlan {
            session_id: record.id,
            photo_id: record.photo_id,
            user_id: record.user_id,
            logged_at: OffsetDateTime::now_utc(),
            totals: summary.totals,
            items,
            audit_after,
        };
        let meal_id = self.commits.commit(&plan).await?;
        info!(user_id = %record.user_id, %meal_id, "meal committed");
        record.status = SessionStatus::Saved;
        record.photo_id = None;
        record.context.summary = Some(summary.clone());
        Ok(machine::saved_view(&summary))
    }

    async fn mark_expired(&self, record: &mut SessionRecord) -> Result<(), EngineError> {
        record.status = SessionStatus::Expired;
        self.clear_photo(record).await?;
        self.sessions.save(record).await
    }

    async fn clear_photo(&self, record: &mut SessionRecord) -> Result<(), EngineError> {
        if let Some(photo_id) = record.photo_id.take() {
            self.photos.delete(photo_id).await?;
        }
        Ok(())
    }
}

fn respond(record: &SessionRecord, view: SessionView) -> ActionResponse {
    ActionResponse {
        session_id: Some(record.id),
        status: record.status.as_str(),
        view,
    }
}

fn seed_context(items: &[VisionItem]) -> SessionContext {
    SessionContext {
        items: items
            .iter()
            .filter(|item| !item.label.trim().is_empty())
            .map(|item| {
                let mut seeded = SessionItem::new(item.label.trim());
                seeded.confidence = item.confidence;
                seeded.estimated_grams_low = item.estimated_grams_low;
                seeded.estimated_grams_high = item.estimated_grams_high;
                seeded
            })
            .collect(),
        current_index: 0,
        summary: None,
    }
}

fn summarize(context: &SessionContext) -> Result<MealSummary, EngineError> {
    let items: Vec<LoggableItem<'_>> = context
        .items
        .iter()
        .filter(|item| !item.skipped)
        .filter_map(|item| match (&item.resolved, item.grams) {
            (Some(resolved), Some(grams)) => Some(LoggableItem { resolved, grams }),
            _ => None,
        })
        .collect();
    meal_service::build_summary(&items)
}
