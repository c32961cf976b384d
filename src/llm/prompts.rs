use serde::Serialize;
use serde_json::json;

use crate::llm::{OutputSchema, Prompt};
use crate::models::{BlockType, Document, EditorStage};

/// Name of the tool every editor stage must call
pub const STAGE_TOOL_NAME: &str = "submit_block_edits";

/// Rules shared by every editor stage (non-negotiable constraints)
pub const STAGE_SYSTEM_PREAMBLE: &str = r#"You are one editor in a multi-stage editorial review of a thought leadership article.

You MUST follow these rules:

1. Return exactly one record per input block. Never add, remove, merge, split, or reorder blocks.
2. Keep every block "id" exactly as given.
3. "suggested_text" is the full revised text of the block. If you make no change, repeat the input text verbatim.
4. Every change MUST be reported as a feedback item where:
   - "issue" is the exact substring of the input text being replaced
   - "fix" is the exact replacement substring
   - "impact" explains the editorial benefit in one sentence
   - "rule_used" names the rule from your rule list
   - "priority" is one of: Critical, Important, Enhancement
5. Feedback items for the same block MUST NOT overlap: no two "issue" spans may share characters.
6. Do not add facts, statistics, sources, or claims that are not already in the text.
7. Preserve meaning, intent, and factual accuracy.

Submit your result with the submit_block_edits tool."#;

/// Role instructions and rule vocabulary for an editor stage
pub fn stage_instructions(stage: EditorStage) -> &'static str {
    match stage {
        EditorStage::Development => DEVELOPMENT_INSTRUCTIONS,
        EditorStage::Content => CONTENT_INSTRUCTIONS,
        EditorStage::Line => LINE_INSTRUCTIONS,
        EditorStage::Copy => COPY_INSTRUCTIONS,
        EditorStage::Brand => BRAND_INSTRUCTIONS,
    }
}

const DEVELOPMENT_INSTRUCTIONS: &str = r#"ROLE: Development Editor.

You work at the level of structure, narrative and point of view across the full article.

Outcomes you must enforce:
- A single, clear central argument established early
- Logical progression between sections and paragraphs
- A confident point of view: remove unnecessary hedging and passive constructions
- Forward-looking framing that points toward decisions or actions
- Direct, partnership-oriented address to the reader where appropriate

Use the article analysis (if provided) to decide where the argument is weak or drifts.

RULES (use these names in rule_used):
- Development Editor - Central Argument
- Development Editor - Logical Flow
- Development Editor - Point of View
- Development Editor - Momentum
- Development Editor - Reader Engagement"#;

const CONTENT_INSTRUCTIONS: &str = r#"ROLE: Content Editor.

Refine each block to sharpen clarity, insight, argument logic and executive relevance.
Use the cross-paragraph analysis (if provided) to remove repetition between blocks and
to strengthen transitions. Replace tentative or observational statements with informed
conviction where the text already supports it.

RULES (use these names in rule_used):
- Content Editor - Clarity
- Content Editor - Insight Sharpness
- Content Editor - Argument Logic
- Content Editor - Redundancy
- Content Editor - Transitions"#;

const LINE_INSTRUCTIONS: &str = r#"ROLE: Line Editor.

Work sentence by sentence:
- Each sentence expresses one clear idea; split dense sentences when readability improves
- Prefer active voice when the actor is explicit
- Reduce hedging (may, might, can, often, somewhat) when meaning and confidence are unchanged
- First-person plural only when the organization is the actor; second person only for direct reader address
- fewer/less, more/greater used precisely
- Gender-neutral language and correct pronoun agreement

RULES (use these names in rule_used):
- Line Editor - Sentence Clarity
- Line Editor - Active Voice
- Line Editor - Hedging Reduction
- Line Editor - Point of View
- Line Editor - Comparative Precision
- Line Editor - Inclusive Language
- Line Editor - Pronoun Agreement"#;

const COPY_INSTRUCTIONS: &str = r#"ROLE: Copy Editor.

Copy-level editing only: grammar, spelling, punctuation, capitalization, number style,
abbreviations and consistency. Do NOT restructure, reinterpret, or make stylistic judgment
calls. Remove exact duplicate sentences only.

RULES (use these names in rule_used):
- Copy Editor - Grammar
- Copy Editor - Spelling
- Copy Editor - Punctuation
- Copy Editor - Capitalization
- Copy Editor - Numbers
- Copy Editor - Consistency"#;

const BRAND_INSTRUCTIONS: &str = r#"ROLE: Brand Alignment Editor.

Ensure the content sounds collaborative, bold and optimistic, and complies with brand
requirements:
- The organization speaks in first-person plural; the reader is addressed as "you"
- No parenthetical citations: replace them with narrative attribution naming the source
- No exaggeration or absolutes ("always", "never"), no exclamation marks, no ALL CAPS emphasis
- No new facts, proof points, sources, or competitor references

RULES (use these names in rule_used):
- Brand Editor - Perspective
- Brand Editor - Citation Attribution
- Brand Editor - Voice
- Brand Editor - Prohibited Language
- Brand Editor - Compliance"#;

/// Build the prompt for one editor stage
pub fn build_stage_prompt(
    stage: EditorStage,
    document: &Document,
    aux_context: Option<&str>,
) -> Prompt {
    let system = format!(
        "{}\n\n{}",
        STAGE_SYSTEM_PREAMBLE,
        stage_instructions(stage)
    );

    let mut user = String::new();
    user.push_str(&format!("# Stage: {}\n", stage.display_name()));
    user.push_str(&format!("Blocks: {}\n\n", document.len()));

    if let Some(context) = aux_context.map(str::trim).filter(|c| !c.is_empty()) {
        let heading = match stage {
            EditorStage::Development => "Article Analysis",
            _ => "Cross-Paragraph Analysis",
        };
        user.push_str(&format!("## {} (READ-ONLY CONTEXT)\n", heading));
        user.push_str(context);
        user.push_str("\n\n");
    }

    user.push_str("## Blocks (EDITABLE)\n");
    user.push_str("```json\n");
    user.push_str(&format_blocks(document));
    user.push_str("\n```\n\n");

    user.push_str("## Instructions\n");
    user.push_str(&format!(
        "Edit the blocks as the {} and submit exactly {} records using the {} tool.\n",
        stage.display_name(),
        document.len(),
        STAGE_TOOL_NAME
    ));
    user.push_str(&format!(
        "Report feedback under the \"{}\" key of feedback_edit.\n",
        stage.key()
    ));

    Prompt::new(system, user)
}

/// Serialize the blocks the stage edits
fn format_blocks(document: &Document) -> String {
    let blocks: Vec<BlockDisplay> = document
        .blocks
        .iter()
        .map(|b| BlockDisplay {
            id: &b.id,
            block_type: b.block_type,
            level: b.level,
            text: b.current_text(),
        })
        .collect();

    serde_json::to_string_pretty(&blocks).unwrap_or_else(|_| "[]".to_string())
}

#[derive(Serialize)]
struct BlockDisplay<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    block_type: BlockType,
    #[serde(skip_serializing_if = "is_zero")]
    level: u8,
    text: &'a str,
}

fn is_zero(level: &u8) -> bool {
    *level == 0
}

/// Tool schema for editor stage output
pub fn stage_output_schema(stage: EditorStage) -> OutputSchema {
    let item = json!({
        "type": "object",
        "properties": {
            "issue": {"type": "string", "description": "Exact substring being replaced"},
            "fix": {"type": "string", "description": "Exact replacement substring"},
            "impact": {"type": "string"},
            "rule_used": {"type": "string"},
            "priority": {"type": "string", "enum": ["Critical", "Important", "Enhancement"]}
        },
        "required": ["issue", "fix", "impact", "rule_used", "priority"]
    });

    OutputSchema {
        name: STAGE_TOOL_NAME.to_string(),
        description: format!(
            "Submit one record per block with the {}'s suggested text and feedback",
            stage.display_name()
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "blocks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "suggested_text": {"type": "string"},
                            "feedback_edit": {
                                "type": "object",
                                "properties": { stage.key(): {"type": "array", "items": item} },
                                "required": [stage.key()]
                            }
                        },
                        "required": ["id", "suggested_text", "feedback_edit"]
                    }
                }
            },
            "required": ["blocks"]
        }),
    }
}

const ARTICLE_ANALYSIS_SYSTEM: &str = r#"You are a senior development editor. Read the full article and write a concise analysis
that another editor will use as context. Cover:

1. The central argument, and whether it is stated early and clearly
2. The structure and narrative arc, including weak or missing transitions
3. Sections that drift from the theme, repeat each other, or lack support
4. Tone and point of view: hedging, passivity, reader engagement

Write plain prose and short bullet lists. Do not rewrite the article."#;

const CROSS_PARAGRAPH_SYSTEM: &str = r#"You are a content editor reviewing how paragraphs work together. Read the full article and
write a concise analysis that another editor will use as context. Cover:

1. Ideas repeated across paragraphs (quote the paragraphs involved)
2. Paragraphs whose order or transitions break the argument
3. Terminology used inconsistently between paragraphs
4. Claims made in one paragraph and contradicted or left unsupported in another

Write plain prose and short bullet lists. Do not rewrite the article."#;

pub fn build_article_analysis_prompt(document: &Document) -> Prompt {
    Prompt::new(
        ARTICLE_ANALYSIS_SYSTEM,
        format!("# Article\n\n{}", document.article_text()),
    )
}

pub fn build_cross_paragraph_prompt(document: &Document) -> Prompt {
    let mut user = String::from("# Article (paragraphs numbered)\n\n");
    for (i, block) in document.blocks.iter().enumerate() {
        user.push_str(&format!("[{}] {}\n\n", i + 1, block.current_text().trim()));
    }
    Prompt::new(CROSS_PARAGRAPH_SYSTEM, user)
}

/// Name of the tool the compliance check must call
pub const COMPLIANCE_TOOL_NAME: &str = "submit_compliance";

const COMPLIANCE_SYSTEM: &str = r#"You verify whether a development edit met its article-level gates. Compare the
article before and after the edit and check:

1. A single central argument is established early
2. Sections progress logically with clear transitions
3. Hedging and passive constructions were reduced
4. The reader is addressed directly where guidance is implied
5. No facts, statistics, or sources were added

For every gate that is not met, add one short, human-readable warning.
Submit your verdict with the submit_compliance tool."#;

pub fn build_compliance_prompt(before: &Document, after: &Document) -> Prompt {
    Prompt::new(
        COMPLIANCE_SYSTEM,
        format!(
            "# Before\n\n{}\n\n# After\n\n{}",
            before.article_text(),
            after.article_text()
        ),
    )
}

pub fn compliance_output_schema() -> OutputSchema {
    OutputSchema {
        name: COMPLIANCE_TOOL_NAME.to_string(),
        description: "Submit the compliance verdict for the development edit".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "compliant": {"type": "boolean"},
                "warnings": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["compliant", "warnings"]
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Block;

    fn document() -> Document {
        Document::new(vec![
            Block::new("b1", BlockType::Title, "Why it matters"),
            Block::new("b2", BlockType::Paragraph, "We can maybe improve this."),
        ])
    }

    #[test]
    fn test_stage_prompt_contains_blocks_and_context() {
        let prompt = build_stage_prompt(
            EditorStage::Development,
            &document(),
            Some("The argument arrives late."),
        );

        assert!(prompt.system.contains("Development Editor"));
        assert!(prompt.user.contains("\"id\": \"b2\""));
        assert!(prompt.user.contains("\"type\": \"title\""));
        assert!(prompt.user.contains("Article Analysis"));
        assert!(prompt.user.contains("The argument arrives late."));
        assert!(prompt.user.contains("exactly 2 records"));
    }

    #[test]
    fn test_stage_prompt_skips_blank_context() {
        let prompt = build_stage_prompt(EditorStage::Content, &document(), Some("   "));
        assert!(!prompt.user.contains("Cross-Paragraph Analysis"));
    }

    #[test]
    fn test_stage_prompt_uses_current_text() {
        let mut doc = document();
        doc.blocks[1].suggested_text = Some("We can improve this.".to_string());

        let prompt = build_stage_prompt(EditorStage::Copy, &doc, None);

        assert!(prompt.user.contains("We can improve this."));
        assert!(!prompt.user.contains("maybe"));
    }

    #[test]
    fn test_output_schema_keys_feedback_by_stage() {
        let schema = stage_output_schema(EditorStage::Line);
        let feedback = &schema.input_schema["properties"]["blocks"]["items"]["properties"]
            ["feedback_edit"];

        assert!(feedback["properties"].get("line").is_some());
        assert_eq!(schema.name, STAGE_TOOL_NAME);
    }

    #[test]
    fn test_cross_paragraph_prompt_numbers_blocks() {
        let prompt = build_cross_paragraph_prompt(&document());
        assert!(prompt.user.contains("[1] Why it matters"));
        assert!(prompt.user.contains("[2] We can maybe improve this."));
    }
}
