use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

use super::StageResult;

/// Structural role of a block in the source layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Title,
    Heading,
    Paragraph,
    BulletItem,
}

/// Atomic editable unit of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Stable identifier, unique within a document
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    /// Nesting depth (meaningful for headings)
    #[serde(default)]
    pub level: u8,
    /// Source text - never changed by the pipeline
    pub original_text: String,
    /// Text carried forward from earlier stages, if any changed it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_text: Option<String>,
}

impl Block {
    pub fn new(id: impl Into<String>, block_type: BlockType, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block_type,
            level: 0,
            original_text: text.into(),
            suggested_text: None,
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// The text the next stage should edit
    pub fn current_text(&self) -> &str {
        self.suggested_text.as_deref().unwrap_or(&self.original_text)
    }
}

/// Ordered sequence of blocks; order reflects the source layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Reject documents whose block ids are not unique
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut seen = HashSet::new();
        for block in &self.blocks {
            if !seen.insert(block.id.as_str()) {
                return Err(PipelineError::DuplicateBlockId(block.id.clone()));
            }
        }
        Ok(())
    }

    pub fn get_block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Concatenated current text of all blocks, one block per paragraph
    pub fn article_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.current_text().trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Snapshot for the next stage: blocks changed by `result` carry its text
    pub fn with_applied(&self, result: &StageResult) -> Document {
        let mut next = self.clone();
        for block in &mut next.blocks {
            if let Some(suggestion) = result.get(&block.id) {
                if suggestion.has_changes {
                    block.suggested_text = Some(suggestion.suggested_text.clone());
                }
            }
        }
        next
    }
}
