//! Typed session state. The context is persisted as an opaque JSONB blob by
//! the store adapter and validated on load, so workflow changes stay decoupled
//! from the schema.

use serde::{Deserialize, Serialize};

use crate::library::resolver::{Candidate, ResolvedFood};
use crate::meals::service::MealSummary;
use crate::nutrition::portion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Started,
    ItemReview,
    ItemResolution,
    PortionEntry,
    SummaryConfirm,
    Saved,
    Cancelled,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Started => "STARTED",
            SessionStatus::ItemReview => "ITEM_REVIEW",
            SessionStatus::ItemResolution => "ITEM_RESOLUTION",
            SessionStatus::PortionEntry => "PORTION_ENTRY",
            SessionStatus::SummaryConfirm => "SUMMARY_CONFIRM",
            SessionStatus::Saved => "SAVED",
            SessionStatus::Cancelled => "CANCELLED",
            SessionStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(value: &str) -> Option<SessionStatus> {
        match value {
            "STARTED" => Some(SessionStatus::Started),
            "ITEM_REVIEW" => Some(SessionStatus::ItemReview),
            "ITEM_RESOLUTION" => Some(SessionStatus::ItemResolution),
            "PORTION_ENTRY" => Some(SessionStatus::PortionEntry),
            "SUMMARY_CONFIRM" => Some(SessionStatus::SummaryConfirm),
            "SAVED" => Some(SessionStatus::Saved),
            "CANCELLED" => Some(SessionStatus::Cancelled),
            "EXPIRED" => Some(SessionStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Saved | SessionStatus::Cancelled | SessionStatus::Expired
        )
    }

    /// What the user is expected to do in this state, for re-prompts.
    pub fn expected_action(&self) -> &'static str {
        match self {
            SessionStatus::Started => "wait while the photo is processed",
            SessionStatus::ItemReview => "confirm or fix the detected item list",
            SessionStatus::ItemResolution => "pick one of the listed foods or enter one manually",
            SessionStatus::PortionEntry => "choose a portion: the estimate, grams, or skip",
            SessionStatus::SummaryConfirm => "save the meal, edit an item, or cancel",
            SessionStatus::Saved | SessionStatus::Cancelled | SessionStatus::Expired => {
                "send a new photo to start a session"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub items: Vec<SessionItem>,
    pub current_index: usize,
    #[serde(default)]
    pub summary: Option<MealSummary>,
}

impl SessionContext {
    pub fn current_item(&self) -> Option<&SessionItem> {
        self.items.get(self.current_index)
    }

    pub fn current_item_mut(&mut self) -> Option<&mut SessionItem> {
        self.items.get_mut(self.current_index)
    }

    /// First item still needing resolution or a portion.
    pub fn first_incomplete(&self) -> Option<usize> {
        self.items.iter().position(|item| !item.is_complete())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionItem {
    pub label: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub estimated_grams_low: Option<f64>,
    #[serde(default)]
    pub estimated_grams_high: Option<f64>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub resolved: Option<ResolvedFood>,
    #[serde(default)]
    pub grams: Option<f64>,
    #[serde(default)]
    pub skipped: bool,
}

impl SessionItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            confidence: None,
            estimated_grams_low: None,
            estimated_grams_high: None,
            candidates: Vec::new(),
            resolved: None,
            grams: None,
            skipped: false,
        }
    }

    pub fn estimate(&self) -> Option<f64> {
        portion::estimate_grams(self.estimated_grams_low, self.estimated_grams_high)
    }

    pub fn is_complete(&self) -> bool {
        self.skipped || (self.resolved.is_some() && self.grams.is_some())
    }
}
