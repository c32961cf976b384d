use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{empty_feedback, EditorStage, EditorialFeedback, FeedbackItem, Priority};

/// Keys under which a wrapped response may carry its record list
const WRAPPER_KEYS: [&str; 3] = ["blocks", "paragraphs", "results"];

/// The raw response shapes a stage call may produce
#[derive(Debug, Clone, PartialEq)]
pub enum RawStageOutput {
    /// JSON text that still needs decoding
    Encoded(String),
    /// Bare list of per-block records
    Records(Vec<Value>),
    /// Object wrapping the record list under a known key
    Wrapped(Vec<Value>),
}

impl RawStageOutput {
    /// Classify a raw value; anything outside the three shapes is rejected
    pub fn classify(value: Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Self::Encoded(text)),
            Value::Array(records) => Some(Self::Records(records)),
            Value::Object(mut map) => WRAPPER_KEYS.iter().find_map(|key| match map.remove(*key) {
                Some(Value::Array(records)) => Some(Self::Wrapped(records)),
                _ => None,
            }),
            _ => None,
        }
    }
}

/// One per-block record after shape normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawBlockRecord {
    pub id: String,
    pub suggested_text: Option<String>,
    pub feedback_edit: Option<Value>,
}

/// Normalize any accepted response shape into a list of block records
///
/// An encoded string is decoded once; it must decode to a list or a wrapping
/// object. Records without an id are skipped.
pub fn normalize_records(value: Value) -> Result<Vec<RawBlockRecord>> {
    let records = match RawStageOutput::classify(value) {
        Some(RawStageOutput::Records(records)) | Some(RawStageOutput::Wrapped(records)) => records,
        Some(RawStageOutput::Encoded(text)) => {
            let decoded: Value = serde_json::from_str(strip_code_fence(&text))
                .context("Stage response is not valid JSON")?;
            match RawStageOutput::classify(decoded) {
                Some(RawStageOutput::Records(records)) | Some(RawStageOutput::Wrapped(records)) => {
                    records
                }
                _ => return Err(anyhow!("Decoded stage response has an unsupported shape")),
            }
        }
        None => return Err(anyhow!("Stage response has an unsupported shape")),
    };

    Ok(records.into_iter().filter_map(parse_record).collect())
}

fn parse_record(value: Value) -> Option<RawBlockRecord> {
    let Value::Object(mut map) = value else {
        debug!("Skipping non-object record");
        return None;
    };

    let id = match map.remove("id") {
        Some(Value::String(id)) => id,
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            debug!("Skipping record without id");
            return None;
        }
    };

    let suggested_text = match map.remove("suggested_text") {
        Some(Value::String(text)) => Some(text),
        _ => None,
    };

    let feedback_edit = map
        .remove("feedback_edit")
        .or_else(|| map.remove("feedback"))
        .filter(|v| !v.is_null());

    Some(RawBlockRecord {
        id,
        suggested_text,
        feedback_edit,
    })
}

/// Strip a surrounding Markdown code fence, if any
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Convert a record's feedback payload into the per-stage map
///
/// A list is attributed to `stage`; a mapping is keyed by editor name and
/// unknown keys are dropped. Malformed items are dropped silently.
pub fn normalize_feedback(raw: Option<&Value>, stage: EditorStage) -> EditorialFeedback {
    let mut feedback = empty_feedback();

    match raw {
        Some(Value::Array(items)) => {
            push_items(&mut feedback, stage, items);
        }
        Some(Value::Object(map)) => {
            for (key, value) in map {
                let Some(owner) = EditorStage::from_key(key) else {
                    debug!("Dropping feedback under unknown key {:?}", key);
                    continue;
                };
                match value {
                    Value::Array(items) => push_items(&mut feedback, owner, items),
                    Value::Object(_) => {
                        push_items(&mut feedback, owner, std::slice::from_ref(value))
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }

    feedback
}

fn push_items(feedback: &mut EditorialFeedback, stage: EditorStage, items: &[Value]) {
    let parsed = items.iter().filter_map(|v| match v {
        Value::Object(map) => parse_feedback_item(map),
        _ => None,
    });
    feedback.entry(stage).or_default().extend(parsed);
}

/// Build a feedback item; `issue`, `fix` and a known `priority` are required
pub fn parse_feedback_item(map: &Map<String, Value>) -> Option<FeedbackItem> {
    let issue = field(map, "issue").filter(|s| !s.is_empty())?;
    let fix = field(map, "fix")?;
    let priority = field(map, "priority").and_then(Priority::parse)?;

    Some(FeedbackItem {
        issue: issue.to_string(),
        fix: fix.to_string(),
        impact: field(map, "impact").unwrap_or_default().to_string(),
        rule_used: field(map, "rule_used")
            .or_else(|| field(map, "rule"))
            .unwrap_or_default()
            .to_string(),
        priority,
    })
}

fn field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_json() -> Value {
        json!({"id": "b1", "suggested_text": "Edited.", "feedback_edit": []})
    }

    #[test]
    fn test_three_shapes_normalize_identically() {
        let bare = json!([record_json()]);
        let wrapped = json!({"blocks": [record_json()]});
        let encoded = Value::String(bare.to_string());

        let expected = normalize_records(bare).unwrap();
        assert_eq!(expected.len(), 1);
        assert_eq!(expected[0].id, "b1");
        assert_eq!(normalize_records(wrapped).unwrap(), expected);
        assert_eq!(normalize_records(encoded).unwrap(), expected);
    }

    #[test]
    fn test_fenced_string_is_decoded() {
        let text = format!("```json\n{}\n```", json!({"paragraphs": [record_json()]}));
        let records = normalize_records(Value::String(text)).unwrap();
        assert_eq!(records[0].suggested_text.as_deref(), Some("Edited."));
    }

    #[test]
    fn test_unsupported_shapes_fail_closed() {
        assert!(normalize_records(json!({"unexpected": []})).is_err());
        assert!(normalize_records(json!(42)).is_err());
        assert!(normalize_records(Value::String("not json".to_string())).is_err());
        // A string that decodes to another string is not unwrapped twice
        let nested = Value::String(Value::String("[]".to_string()).to_string());
        assert!(normalize_records(nested).is_err());
    }

    #[test]
    fn test_records_without_id_are_skipped() {
        let records = normalize_records(json!([
            {"suggested_text": "orphan"},
            {"id": 7, "suggested_text": "numbered"}
        ]))
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "7");
    }

    #[test]
    fn test_feedback_list_attributed_to_running_stage() {
        let raw = json!([
            {"issue": "very unique", "fix": "unique", "impact": "precision", "rule": "Copy - Absolutes", "priority": "Important"}
        ]);

        let feedback = normalize_feedback(Some(&raw), EditorStage::Copy);

        assert_eq!(feedback[&EditorStage::Copy].len(), 1);
        assert_eq!(feedback[&EditorStage::Copy][0].rule_used, "Copy - Absolutes");
        assert!(feedback[&EditorStage::Line].is_empty());
    }

    #[test]
    fn test_feedback_mapping_drops_unknown_keys_and_malformed_items() {
        let raw = json!({
            "line": [
                {"issue": "can maybe improve", "fix": "can improve", "impact": "removes hedging", "rule_used": "Hedging", "priority": "Enhancement"},
                {"fix": "missing issue", "priority": "Critical"},
                {"issue": "x", "fix": "y", "priority": "whenever"}
            ],
            "Copy Editor": [
                {"issue": "teh", "fix": "the", "priority": "critical"}
            ],
            "proofreader": [
                {"issue": "a", "fix": "b", "priority": "Critical"}
            ]
        });

        let feedback = normalize_feedback(Some(&raw), EditorStage::Line);

        assert_eq!(feedback[&EditorStage::Line].len(), 1);
        assert_eq!(feedback[&EditorStage::Copy].len(), 1);
        assert_eq!(feedback[&EditorStage::Copy][0].impact, "");
        assert_eq!(feedback.values().map(Vec::len).sum::<usize>(), 2);
    }

    #[test]
    fn test_missing_feedback_yields_empty_map() {
        let feedback = normalize_feedback(None, EditorStage::Brand);
        assert_eq!(feedback.len(), 5);
        assert!(feedback.values().all(Vec::is_empty));
    }
}
