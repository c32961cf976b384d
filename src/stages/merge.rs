use tracing::debug;

use crate::models::{ConsolidatedBlock, ConsolidatedResult, Document, StageResult};

/// Fold one stage result into the consolidated view
///
/// For every block in `result`: create the entry if absent, overwrite
/// `final_text` when the stage changed the text (last writer wins by merge
/// order), and extend each editor's feedback list. Merging the same result
/// twice duplicates its feedback; callers merge each result exactly once.
pub fn merge(mut consolidated: ConsolidatedResult, result: &StageResult) -> ConsolidatedResult {
    for suggestion in &result.blocks {
        let index = match consolidated.blocks.iter().position(|b| b.id == suggestion.id) {
            Some(index) => index,
            None => {
                consolidated.blocks.push(ConsolidatedBlock::seed(
                    suggestion.id.clone(),
                    suggestion.block_type,
                    suggestion.level,
                    suggestion.original_text.clone(),
                ));
                consolidated.blocks.len() - 1
            }
        };
        let entry = &mut consolidated.blocks[index];

        if suggestion.has_changes && !suggestion.suggested_text.trim().is_empty() {
            if entry.is_changed() && entry.final_text != suggestion.input_text {
                debug!(
                    "{}: overwriting text it was not shown for block {}",
                    result.stage, entry.id
                );
            }
            entry.final_text = suggestion.suggested_text.clone();
        }

        for (stage, items) in &suggestion.feedback {
            if items.is_empty() {
                continue;
            }
            entry
                .editorial_feedback
                .entry(*stage)
                .or_default()
                .extend(items.iter().cloned());
        }
    }

    consolidated.warnings.extend(result.warnings.iter().cloned());
    consolidated.stages_applied.push(result.stage);
    consolidated
}

/// Seed from the document and merge every result in execution order
pub fn fold(document: &Document, results: &[StageResult]) -> ConsolidatedResult {
    results
        .iter()
        .fold(ConsolidatedResult::from_document(document), merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        empty_feedback, Block, BlockSuggestion, BlockType, EditorStage, FeedbackItem, Priority,
    };

    fn item(issue: &str, fix: &str) -> FeedbackItem {
        FeedbackItem {
            issue: issue.to_string(),
            fix: fix.to_string(),
            impact: "clarity".to_string(),
            rule_used: "rule".to_string(),
            priority: Priority::Important,
        }
    }

    fn suggestion(
        id: &str,
        original: &str,
        suggested: &str,
        items: Vec<(EditorStage, FeedbackItem)>,
    ) -> BlockSuggestion {
        let mut feedback = empty_feedback();
        for (stage, item) in items {
            feedback.entry(stage).or_default().push(item);
        }
        BlockSuggestion {
            id: id.to_string(),
            block_type: BlockType::Paragraph,
            level: 0,
            original_text: original.to_string(),
            input_text: original.to_string(),
            suggested_text: suggested.to_string(),
            has_changes: suggested != original,
            feedback,
        }
    }

    fn stage_result(stage: EditorStage, blocks: Vec<BlockSuggestion>) -> StageResult {
        StageResult {
            stage,
            blocks,
            warnings: vec![],
            degraded: false,
        }
    }

    #[test]
    fn test_end_to_end_line_merge() {
        let result = stage_result(
            EditorStage::Line,
            vec![suggestion(
                "b1",
                "We can maybe improve this.",
                "We can improve this.",
                vec![(EditorStage::Line, item("can maybe improve", "can improve"))],
            )],
        );

        let consolidated = merge(ConsolidatedResult::default(), &result);

        let b1 = consolidated.get("b1").unwrap();
        assert_eq!(b1.original_text, "We can maybe improve this.");
        assert_eq!(b1.final_text, "We can improve this.");
        assert_eq!(b1.feedback_for(EditorStage::Line).len(), 1);
        for stage in [
            EditorStage::Development,
            EditorStage::Content,
            EditorStage::Copy,
            EditorStage::Brand,
        ] {
            assert!(b1.feedback_for(stage).is_empty());
        }
        assert_eq!(consolidated.stages_applied, vec![EditorStage::Line]);
    }

    #[test]
    fn test_last_writer_wins_and_feedback_accumulates() {
        let a = stage_result(
            EditorStage::Development,
            vec![suggestion(
                "b1",
                "Original text.",
                "Text from A.",
                vec![
                    (EditorStage::Development, item("Original", "Text")),
                    (EditorStage::Development, item("text.", "from A.")),
                ],
            )],
        );
        let b = stage_result(
            EditorStage::Line,
            vec![suggestion(
                "b1",
                "Original text.",
                "Text from B.",
                vec![(EditorStage::Line, item("Original text", "Text from B"))],
            )],
        );

        let consolidated = merge(merge(ConsolidatedResult::default(), &a), &b);

        let b1 = consolidated.get("b1").unwrap();
        assert_eq!(b1.final_text, "Text from B.");
        assert_eq!(b1.feedback_for(EditorStage::Development).len(), 2);
        assert_eq!(b1.feedback_for(EditorStage::Line).len(), 1);
    }

    #[test]
    fn test_unchanged_stage_keeps_earlier_text() {
        let a = stage_result(
            EditorStage::Content,
            vec![suggestion("b1", "Old.", "New.", vec![])],
        );
        let b = stage_result(
            EditorStage::Copy,
            vec![suggestion("b1", "Old.", "Old.", vec![])],
        );

        let consolidated = merge(merge(ConsolidatedResult::default(), &a), &b);

        assert_eq!(consolidated.get("b1").unwrap().final_text, "New.");
    }

    #[test]
    fn test_feedback_is_order_independent() {
        let dev = stage_result(
            EditorStage::Development,
            vec![suggestion(
                "b1",
                "Some text.",
                "Dev text.",
                vec![(EditorStage::Development, item("Some", "Dev"))],
            )],
        );
        let line = stage_result(
            EditorStage::Line,
            vec![suggestion(
                "b1",
                "Some text.",
                "Line text.",
                vec![(EditorStage::Line, item("Some", "Line"))],
            )],
        );

        let forward = merge(merge(ConsolidatedResult::default(), &dev), &line);
        let backward = merge(merge(ConsolidatedResult::default(), &line), &dev);

        let f = forward.get("b1").unwrap();
        let b = backward.get("b1").unwrap();
        assert_eq!(f.editorial_feedback, b.editorial_feedback);
        assert_eq!(f.final_text, "Line text.");
        assert_eq!(b.final_text, "Dev text.");
    }

    #[test]
    fn test_remerge_duplicates_feedback() {
        let result = stage_result(
            EditorStage::Copy,
            vec![suggestion(
                "b1",
                "teh cat",
                "the cat",
                vec![(EditorStage::Copy, item("teh", "the"))],
            )],
        );

        let once = merge(ConsolidatedResult::default(), &result);
        let twice = merge(once.clone(), &result);

        assert_eq!(once.get("b1").unwrap().feedback_for(EditorStage::Copy).len(), 1);
        assert_eq!(twice.get("b1").unwrap().feedback_for(EditorStage::Copy).len(), 2);
        assert_eq!(twice.get("b1").unwrap().final_text, "the cat");
    }

    #[test]
    fn test_fold_keeps_document_order_and_warnings() {
        let document = Document::new(vec![
            Block::new("b1", BlockType::Title, "Title"),
            Block::new("b2", BlockType::Paragraph, "Body."),
        ]);
        let mut result = stage_result(
            EditorStage::Brand,
            vec![suggestion("b2", "Body.", "Better body.", vec![])],
        );
        result.warnings.push("Brand Alignment Editor returned no record for 1 of 2 blocks".into());

        let consolidated = fold(&document, &[result]);

        let ids: Vec<_> = consolidated.blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b2"]);
        assert_eq!(consolidated.blocks[1].final_text, "Better body.");
        assert_eq!(consolidated.warnings.len(), 1);
    }
}
