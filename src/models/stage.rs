use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

use super::{BlockType, EditorialFeedback};

/// Editorial roles, in canonical pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorStage {
    /// Structure, narrative and point of view across the whole article
    Development,
    /// Clarity and argument logic of each block
    Content,
    /// Sentence-level voice, hedging and precision
    Line,
    /// Grammar, punctuation and house style
    Copy,
    /// Brand voice and compliance
    Brand,
}

impl EditorStage {
    pub const ALL: [EditorStage; 5] = [
        EditorStage::Development,
        EditorStage::Content,
        EditorStage::Line,
        EditorStage::Copy,
        EditorStage::Brand,
    ];

    /// Key used in feedback maps and serialized output
    pub fn key(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Content => "content",
            Self::Line => "line",
            Self::Copy => "copy",
            Self::Brand => "brand",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Development => "Development Editor",
            Self::Content => "Content Editor",
            Self::Line => "Line Editor",
            Self::Copy => "Copy Editor",
            Self::Brand => "Brand Alignment Editor",
        }
    }

    /// Lenient match for keys such as "line", "Line Editor" or "line_editor"
    pub fn from_key(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        let head = normalized
            .strip_suffix(" editor")
            .unwrap_or(&normalized)
            .trim();
        let head = head.strip_prefix("pwc ").unwrap_or(head).trim();
        match head {
            "development" => Some(Self::Development),
            "content" => Some(Self::Content),
            "line" => Some(Self::Line),
            "copy" => Some(Self::Copy),
            "brand" | "brand alignment" => Some(Self::Brand),
            _ => None,
        }
    }

    /// Whether this stage takes article-level context in its prompt
    pub fn uses_aux_context(self) -> bool {
        matches!(self, Self::Development | Self::Content)
    }
}

impl fmt::Display for EditorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for EditorStage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| PipelineError::UnknownStage(s.to_string()))
    }
}

/// Parse a caller-supplied stage selection
///
/// An empty selection means every stage in canonical order. Unknown names and
/// repeated stages are rejected.
pub fn parse_stage_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<EditorStage>, PipelineError> {
    if names.is_empty() {
        return Ok(EditorStage::ALL.to_vec());
    }

    let mut stages = Vec::with_capacity(names.len());
    for name in names {
        let stage: EditorStage = name.as_ref().parse()?;
        if stages.contains(&stage) {
            return Err(PipelineError::DuplicateStage(stage));
        }
        stages.push(stage);
    }
    Ok(stages)
}

/// One block's outcome from a single stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSuggestion {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub level: u8,
    /// Source text of the block
    pub original_text: String,
    /// Text the stage was given (differs from original once earlier stages edited it)
    pub input_text: String,
    pub suggested_text: String,
    /// Computed: `suggested_text != input_text`
    pub has_changes: bool,
    pub feedback: EditorialFeedback,
}

impl BlockSuggestion {
    pub fn feedback_count(&self) -> usize {
        self.feedback.values().map(Vec::len).sum()
    }
}

/// Output of running exactly one stage against one document snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: EditorStage,
    /// One entry per input block, in document order
    pub blocks: Vec<BlockSuggestion>,
    /// Stage-level diagnostics not tied to a block
    #[serde(default)]
    pub warnings: Vec<String>,
    /// The model call failed and every block passed through unchanged
    #[serde(default)]
    pub degraded: bool,
}

impl StageResult {
    pub fn get(&self, id: &str) -> Option<&BlockSuggestion> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn changed_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.has_changes).count()
    }

    pub fn feedback_count(&self) -> usize {
        self.blocks.iter().map(BlockSuggestion::feedback_count).sum()
    }
}
