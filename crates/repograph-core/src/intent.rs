//! Structured classification of a user utterance

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    InformationalQuery,
    DiagramRequest,
    CodeChange,
}

impl Default for IntentCategory {
    fn default() -> Self {
        Self::CodeChange
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Intent {
    pub intent_category: IntentCategory,
    /// Free-form short label, e.g. "add_field" or "list_endpoints".
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Tag hints for seeding the PKG query.
    #[serde(default)]
    pub target_modules: Vec<String>,
    #[serde(default)]
    pub human_approval: bool,
    /// Diagram-request subfield.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_type: Option<String>,
    /// Code-change subfield.
    #[serde(default)]
    pub target_files: Vec<String>,
}

impl Intent {
    /// Minimal intent produced by the keyword fallback; downstream
    /// components must tolerate this shape.
    pub fn minimal(category: IntentCategory, description: impl Into<String>) -> Self {
        Self {
            intent_category: category,
            intent: match category {
                IntentCategory::InformationalQuery => "informational_query".into(),
                IntentCategory::DiagramRequest => "diagram_request".into(),
                IntentCategory::CodeChange => "code_change".into(),
            },
            description: description.into(),
            ..Default::default()
        }
    }
}
