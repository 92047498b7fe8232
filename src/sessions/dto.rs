use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::nutrition::Basis;

/// One detected food item from the vision extraction, consumed already
/// parsed; the engine never sees image data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionItem {
    pub label: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub estimated_grams_low: Option<f64>,
    #[serde(default)]
    pub estimated_grams_high: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualEntryForm {
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub store: Option<String>,
    pub basis: Basis,
    #[serde(default)]
    pub serving_size_g: Option<f64>,
    /// "calories, protein, fat, carbs" as entered by the user.
    pub macros: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionAction {
    /// Photo received; items come from the vision extraction.
    StartPhoto {
        #[serde(default)]
        photo_file_id: Option<String>,
        #[serde(default)]
        items: Vec<VisionItem>,
    },
    ConfirmItems,
    /// Replace the detected list with user-provided comma-separated labels.
    ReplaceItems { items: String },
    SelectCandidate { index: usize },
    ManualEntry { entry: ManualEntryForm },
    AcceptEstimate,
    EnterGrams { text: String },
    SkipItem,
    ConfirmSave,
    EditItem { index: usize },
    Cancel,
}

/// The next user-facing prompt: text plus the actions offered at this step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub text: String,
    pub options: Vec<ViewOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewOption {
    pub label: String,
    pub action: String,
}

impl ViewOption {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub platform_user_id: i64,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub action: SessionAction,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub session_id: Option<Uuid>,
    pub status: &'static str,
    pub view: SessionView,
}
