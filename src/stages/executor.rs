use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::llm::{
    build_stage_prompt, normalize_feedback, normalize_records, sanitize_feedback,
    stage_output_schema, LanguageModel, RawBlockRecord,
};
use crate::models::{empty_feedback, Block, BlockSuggestion, Document, EditorStage, StageResult};

/// Run one editor stage against the current document snapshot
///
/// Always returns exactly one entry per input block:
/// 1. Build the stage prompt (with auxiliary context for development/content)
/// 2. Call the model with the stage output schema
/// 3. Normalize the raw response shape into block records
/// 4. Reconcile records against the document by id
///
/// A failed call or unreadable response degrades to a full pass-through.
pub async fn run_stage(
    llm: &dyn LanguageModel,
    stage: EditorStage,
    document: &Document,
    aux_context: Option<&str>,
) -> StageResult {
    let aux_context = aux_context.filter(|_| stage.uses_aux_context());
    let prompt = build_stage_prompt(stage, document, aux_context);
    let schema = stage_output_schema(stage);

    info!(
        "{}: editing {} blocks{}",
        stage.display_name(),
        document.len(),
        if aux_context.is_some() { " with context" } else { "" }
    );

    let records = match llm
        .invoke(&prompt, Some(&schema))
        .await
        .and_then(normalize_records)
    {
        Ok(records) => records,
        Err(e) => {
            warn!("{} failed, passing blocks through: {:#}", stage.display_name(), e);
            let mut result = passthrough(stage, document);
            result.degraded = true;
            result
                .warnings
                .push(format!("{} produced no usable output: {}", stage.display_name(), e));
            return result;
        }
    };

    let result = reconcile(stage, document, records);
    info!(
        "{}: {} blocks changed, {} feedback items",
        stage.display_name(),
        result.changed_count(),
        result.feedback_count()
    );
    result
}

/// No-op result: every block keeps its text and gets no feedback
pub fn passthrough(stage: EditorStage, document: &Document) -> StageResult {
    StageResult {
        stage,
        blocks: document.blocks.iter().map(unchanged).collect(),
        warnings: Vec::new(),
        degraded: false,
    }
}

fn unchanged(block: &Block) -> BlockSuggestion {
    BlockSuggestion {
        id: block.id.clone(),
        block_type: block.block_type,
        level: block.level,
        original_text: block.original_text.clone(),
        input_text: block.current_text().to_string(),
        suggested_text: block.current_text().to_string(),
        has_changes: false,
        feedback: empty_feedback(),
    }
}

/// Match normalized records to document blocks by id
///
/// Missing records become no-ops, records for unknown ids are ignored and the
/// first record wins when an id repeats. `has_changes` is recomputed from the
/// text, never taken from the model.
pub fn reconcile(
    stage: EditorStage,
    document: &Document,
    records: Vec<RawBlockRecord>,
) -> StageResult {
    let mut by_id: HashMap<String, RawBlockRecord> = HashMap::new();
    for record in records {
        if document.get_block(&record.id).is_none() {
            debug!("{}: ignoring record for unknown block {}", stage, record.id);
            continue;
        }
        by_id.entry(record.id.clone()).or_insert(record);
    }

    let mut warnings = Vec::new();
    let mut missing = 0;
    let mut overlapping = 0;

    let blocks = document
        .blocks
        .iter()
        .map(|block| {
            let Some(record) = by_id.remove(&block.id) else {
                missing += 1;
                return unchanged(block);
            };

            let input_text = block.current_text();
            let suggested_text = record
                .suggested_text
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| input_text.to_string());

            let mut feedback = normalize_feedback(record.feedback_edit.as_ref(), stage);
            overlapping += sanitize_feedback(input_text, &mut feedback).overlapping;

            BlockSuggestion {
                id: block.id.clone(),
                block_type: block.block_type,
                level: block.level,
                original_text: block.original_text.clone(),
                input_text: input_text.to_string(),
                has_changes: suggested_text != input_text,
                suggested_text,
                feedback,
            }
        })
        .collect();

    if missing > 0 {
        warn!("{}: {} blocks missing from response", stage, missing);
        warnings.push(format!(
            "{} returned no record for {} of {} blocks",
            stage.display_name(),
            missing,
            document.len()
        ));
    }
    if overlapping > 0 {
        warnings.push(format!(
            "{} dropped {} overlapping feedback items",
            stage.display_name(),
            overlapping
        ));
    }

    StageResult {
        stage,
        blocks,
        warnings,
        degraded: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockModel;
    use crate::models::{BlockType, Priority};
    use serde_json::json;

    fn hedging_document() -> Document {
        Document::new(vec![Block::new(
            "b1",
            BlockType::Paragraph,
            "We can maybe improve this.",
        )])
    }

    fn three_blocks() -> Document {
        Document::new(vec![
            Block::new("b1", BlockType::Title, "A title"),
            Block::new("b2", BlockType::Paragraph, "First paragraph."),
            Block::new("b3", BlockType::BulletItem, "A bullet"),
        ])
    }

    #[tokio::test]
    async fn test_line_stage_end_to_end() {
        let llm = MockModel::returning(json!([{
            "id": "b1",
            "suggested_text": "We can improve this.",
            "feedback_edit": {
                "line": [{
                    "issue": "can maybe improve",
                    "fix": "can improve",
                    "impact": "removes hedging",
                    "rule_used": "Line Editor – Hedging Reduction",
                    "priority": "Enhancement"
                }]
            }
        }]));

        let result = run_stage(&llm, EditorStage::Line, &hedging_document(), None).await;

        assert_eq!(result.blocks.len(), 1);
        let b1 = &result.blocks[0];
        assert_eq!(b1.suggested_text, "We can improve this.");
        assert!(b1.has_changes);
        assert_eq!(b1.feedback[&EditorStage::Line].len(), 1);
        assert_eq!(b1.feedback[&EditorStage::Line][0].priority, Priority::Enhancement);
        assert!(result.warnings.is_empty());
        assert!(!result.degraded);
    }

    #[tokio::test]
    async fn test_block_count_invariant_with_partial_response() {
        let llm = MockModel::returning(json!({"blocks": [
            {"id": "b2", "suggested_text": "The first paragraph."}
        ]}));

        let result = run_stage(&llm, EditorStage::Content, &three_blocks(), None).await;

        assert_eq!(result.blocks.len(), 3);
        assert_eq!(result.blocks[0].suggested_text, "A title");
        assert!(!result.blocks[0].has_changes);
        assert!(result.blocks[0].feedback.values().all(Vec::is_empty));
        assert!(result.blocks[1].has_changes);
        assert_eq!(result.blocks[2].suggested_text, "A bullet");
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_is_full_noop() {
        let llm = MockModel::returning(json!([]));

        let result = run_stage(&llm, EditorStage::Copy, &three_blocks(), None).await;

        assert_eq!(result.blocks.len(), 3);
        assert_eq!(result.changed_count(), 0);
        assert_eq!(result.feedback_count(), 0);
    }

    #[tokio::test]
    async fn test_has_changes_ignores_model_claim() {
        let llm = MockModel::returning(json!([
            {"id": "b1", "suggested_text": "A title", "has_changes": true},
            {"id": "b2", "suggested_text": "First paragraph!", "has_changes": false}
        ]));

        let result = run_stage(&llm, EditorStage::Copy, &three_blocks(), None).await;

        assert!(!result.blocks[0].has_changes);
        assert!(result.blocks[1].has_changes);
    }

    #[tokio::test]
    async fn test_unknown_ids_and_duplicates_ignored() {
        let llm = MockModel::returning(json!([
            {"id": "b99", "suggested_text": "Spurious"},
            {"id": "b1", "suggested_text": "First title"},
            {"id": "b1", "suggested_text": "Second title"}
        ]));

        let result = run_stage(&llm, EditorStage::Copy, &three_blocks(), None).await;

        assert_eq!(result.blocks.len(), 3);
        assert!(result.get("b99").is_none());
        assert_eq!(result.blocks[0].suggested_text, "First title");
    }

    #[tokio::test]
    async fn test_model_failure_degrades_to_passthrough() {
        let llm = MockModel::failing();

        let result = run_stage(&llm, EditorStage::Brand, &three_blocks(), None).await;

        assert!(result.degraded);
        assert_eq!(result.blocks.len(), 3);
        assert_eq!(result.changed_count(), 0);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("Brand Alignment Editor"));
    }

    #[tokio::test]
    async fn test_unparseable_response_degrades_to_passthrough() {
        let llm = MockModel::returning(json!("I could not complete the edit."));

        let result = run_stage(&llm, EditorStage::Line, &three_blocks(), None).await;

        assert!(result.degraded);
        assert_eq!(result.changed_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_suggestion_is_no_change() {
        let llm = MockModel::returning(json!([{"id": "b1", "suggested_text": "  "}]));

        let result = run_stage(&llm, EditorStage::Line, &hedging_document(), None).await;

        assert_eq!(result.blocks[0].suggested_text, "We can maybe improve this.");
        assert!(!result.blocks[0].has_changes);
    }

    #[tokio::test]
    async fn test_aux_context_only_reaches_context_stages() {
        let llm = MockModel::returning(json!([]));
        let doc = hedging_document();

        run_stage(&llm, EditorStage::Line, &doc, Some("ANALYSIS TEXT")).await;
        run_stage(&llm, EditorStage::Development, &doc, Some("ANALYSIS TEXT")).await;

        let calls = llm.calls();
        assert!(!calls[0].user.contains("ANALYSIS TEXT"));
        assert!(calls[1].user.contains("ANALYSIS TEXT"));
    }

    #[tokio::test]
    async fn test_stage_compares_against_current_text() {
        let mut doc = hedging_document();
        doc.blocks[0].suggested_text = Some("We can improve this.".to_string());
        let llm = MockModel::returning(json!([{"id": "b1", "suggested_text": "We can improve this."}]));

        let result = run_stage(&llm, EditorStage::Copy, &doc, None).await;

        assert!(!result.blocks[0].has_changes);
        assert_eq!(result.blocks[0].original_text, "We can maybe improve this.");
        assert_eq!(result.blocks[0].input_text, "We can improve this.");
    }
}
