use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::{Block, BlockType, Document};

/// Load a document, choosing the format from the file extension
///
/// `.json` files hold blocks; anything else is read as Markdown-like text.
pub fn load_document(path: &Path) -> Result<Document> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {:?}", path))?;

    let document = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => parse_document_json(&content)?,
        _ => parse_markdown(&content),
    };
    document.validate()?;
    Ok(document)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentJson {
    Wrapped(Document),
    Bare(Vec<Block>),
}

/// Parse a JSON document: `{"blocks": [...]}` or a bare list of blocks
pub fn parse_document_json(json: &str) -> Result<Document> {
    let parsed: DocumentJson =
        serde_json::from_str(json).context("Failed to parse document JSON")?;
    Ok(match parsed {
        DocumentJson::Wrapped(document) => document,
        DocumentJson::Bare(blocks) => Document::new(blocks),
    })
}

/// Split Markdown-like text into blocks
///
/// - `# ` starts the title, `##` and deeper start headings (level = number of `#`)
/// - `- ` and `* ` lines are bullet items
/// - other lines are joined into paragraphs separated by blank lines
///
/// Ids are assigned in order: `b1`, `b2`, ...
pub fn parse_markdown(text: &str) -> Document {
    let mut builder = BlockBuilder::default();
    let mut paragraph: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            builder.flush(&mut paragraph);
            continue;
        }

        if let Some((level, heading)) = heading(trimmed) {
            builder.flush(&mut paragraph);
            let block_type = if level == 1 {
                BlockType::Title
            } else {
                BlockType::Heading
            };
            builder.push(block_type, heading, level);
            continue;
        }

        if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            builder.flush(&mut paragraph);
            builder.push(BlockType::BulletItem, item.trim(), 0);
            continue;
        }

        paragraph.push(trimmed);
    }
    builder.flush(&mut paragraph);

    Document::new(builder.blocks)
}

/// `(level, text)` for an ATX-style heading line
fn heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = line[hashes..].strip_prefix(' ')?;
    let text = rest.trim().trim_end_matches('#').trim();
    if text.is_empty() {
        return None;
    }
    Some((hashes as u8, text))
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
}

impl BlockBuilder {
    fn push(&mut self, block_type: BlockType, text: &str, level: u8) {
        let id = format!("b{}", self.blocks.len() + 1);
        self.blocks
            .push(Block::new(id, block_type, text).with_level(level));
    }

    fn flush(&mut self, paragraph: &mut Vec<&str>) {
        if paragraph.is_empty() {
            return;
        }
        let text = paragraph.join(" ");
        paragraph.clear();
        self.push(BlockType::Paragraph, &text, 0);
    }
}
