use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::EditorStage;

/// Severity of an editorial observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    Important,
    Enhancement,
}

impl Priority {
    /// Case-insensitive parse of the labels the editors are told to use
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "important" => Some(Self::Important),
            "enhancement" => Some(Self::Enhancement),
            _ => None,
        }
    }
}

/// One localized issue -> fix annotation from a single editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackItem {
    /// Exact substring of the text being replaced
    pub issue: String,
    /// Exact replacement substring
    pub fix: String,
    /// Rationale for the change
    pub impact: String,
    /// Rule identifier from the editor's vocabulary
    pub rule_used: String,
    pub priority: Priority,
}

/// Feedback grouped by the editor that produced it
pub type EditorialFeedback = BTreeMap<EditorStage, Vec<FeedbackItem>>;

/// Feedback map holding an empty list for every editor
pub fn empty_feedback() -> EditorialFeedback {
    EditorStage::ALL.iter().map(|&s| (s, Vec::new())).collect()
}
