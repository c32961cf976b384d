use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::llm::{build_compliance_prompt, compliance_output_schema, strip_code_fence, LanguageModel};
use crate::models::{Document, StageResult};

#[derive(Debug, Deserialize)]
struct ComplianceVerdict {
    #[serde(default = "default_compliant")]
    compliant: bool,
    #[serde(default)]
    warnings: Vec<String>,
}

fn default_compliant() -> bool {
    true
}

/// Re-check a development result against its article-level gates
///
/// Appends human-readable warnings to `result`; never touches block text. A
/// failed check is itself reported as a warning.
pub async fn check_development_compliance(
    llm: &dyn LanguageModel,
    before: &Document,
    result: &mut StageResult,
) {
    if result.degraded {
        info!("Compliance check skipped: development stage produced no output");
        return;
    }

    let after = before.with_applied(result);
    let prompt = build_compliance_prompt(before, &after);
    let schema = compliance_output_schema();

    let verdict = match llm
        .invoke(&prompt, Some(&schema))
        .await
        .and_then(parse_verdict)
    {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!("Compliance check failed: {:#}", e);
            result
                .warnings
                .push(format!("Development compliance check could not be completed: {}", e));
            return;
        }
    };

    let mut warnings: Vec<String> = verdict
        .warnings
        .into_iter()
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .collect();

    if !verdict.compliant && warnings.is_empty() {
        warnings.push("edit did not meet its article-level gates".to_string());
    }

    info!(
        "Compliance check: {} ({} warnings)",
        if warnings.is_empty() { "passed" } else { "issues found" },
        warnings.len()
    );

    result
        .warnings
        .extend(warnings.into_iter().map(|w| format!("Development compliance: {}", w)));
}

fn parse_verdict(value: Value) -> Result<ComplianceVerdict> {
    match value {
        Value::String(text) => serde_json::from_str(strip_code_fence(&text))
            .context("Compliance response is not valid JSON"),
        Value::Object(_) => {
            serde_json::from_value(value).context("Compliance response has an unexpected shape")
        }
        _ => Err(anyhow!("Compliance response has an unsupported shape")),
    }
}
