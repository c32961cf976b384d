use serde::{Deserialize, Serialize};

use super::{
    empty_feedback, Block, BlockType, Document, EditorStage, EditorialFeedback, FeedbackItem,
};

/// Cross-stage view of one block after some subset of stages has run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub level: u8,
    pub original_text: String,
    /// Text from the most recently merged stage that changed this block
    pub final_text: String,
    /// Every editor key is present; lists only grow
    pub editorial_feedback: EditorialFeedback,
}

impl ConsolidatedBlock {
    /// Fresh entry with no edits and an empty list per editor
    pub fn seed(
        id: impl Into<String>,
        block_type: BlockType,
        level: u8,
        original_text: impl Into<String>,
    ) -> Self {
        let original_text = original_text.into();
        Self {
            id: id.into(),
            block_type,
            level,
            final_text: original_text.clone(),
            original_text,
            editorial_feedback: empty_feedback(),
        }
    }

    pub fn from_block(block: &Block) -> Self {
        Self::seed(
            block.id.clone(),
            block.block_type,
            block.level,
            block.original_text.clone(),
        )
    }

    pub fn is_changed(&self) -> bool {
        self.final_text != self.original_text
    }

    pub fn feedback_for(&self, stage: EditorStage) -> &[FeedbackItem] {
        self.editorial_feedback
            .get(&stage)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn feedback_count(&self) -> usize {
        self.editorial_feedback.values().map(Vec::len).sum()
    }
}

/// Consolidated output of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedResult {
    /// Blocks in document order
    pub blocks: Vec<ConsolidatedBlock>,
    /// Stage warnings, in merge order
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Stages folded in so far, in merge order
    #[serde(default)]
    pub stages_applied: Vec<EditorStage>,
}

impl ConsolidatedResult {
    /// Seed one untouched entry per document block
    pub fn from_document(document: &Document) -> Self {
        Self {
            blocks: document
                .blocks
                .iter()
                .map(ConsolidatedBlock::from_block)
                .collect(),
            warnings: Vec::new(),
            stages_applied: Vec::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ConsolidatedBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn changed_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_changed()).count()
    }

    pub fn feedback_count(&self) -> usize {
        self.blocks.iter().map(ConsolidatedBlock::feedback_count).sum()
    }
}
