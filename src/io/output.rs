use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{ConsolidatedResult, EditorStage};

/// Write any serializable output as pretty JSON
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    serde_json::to_writer_pretty(file, value).context("Failed to write JSON")?;
    Ok(())
}

/// Human-readable review of a consolidated result
pub struct ReviewReport<'a> {
    result: &'a ConsolidatedResult,
}

impl<'a> ReviewReport<'a> {
    pub fn new(result: &'a ConsolidatedResult) -> Self {
        Self { result }
    }

    /// Format the report as plain text
    pub fn format(&self) -> String {
        let mut output = String::new();

        let stages: Vec<&str> = self
            .result
            .stages_applied
            .iter()
            .map(|s| s.display_name())
            .collect();
        output.push_str("Editorial Review\n");
        output.push_str("================\n");
        output.push_str(&format!("Stages: {}\n", stages.join(", ")));
        output.push_str(&format!(
            "Blocks changed: {} of {}\n",
            self.result.changed_count(),
            self.result.blocks.len()
        ));
        output.push_str(&format!(
            "Feedback items: {}\n\n",
            self.result.feedback_count()
        ));

        for block in &self.result.blocks {
            let marker = if block.is_changed() { "changed" } else { "unchanged" };
            output.push_str(&format!("[{}] {:?} ({})\n", block.id, block.block_type, marker));

            if block.is_changed() {
                output.push_str("  Before:\n");
                output.push_str(&indent(&wrap_text(&block.original_text, 76), 4));
                output.push_str("\n  After:\n");
                output.push_str(&indent(&wrap_text(&block.final_text, 76), 4));
                output.push('\n');
            } else {
                output.push_str(&indent(&wrap_text(&block.final_text, 78), 2));
                output.push('\n');
            }

            for stage in EditorStage::ALL {
                for item in block.feedback_for(stage) {
                    output.push_str(&format!(
                        "  - {} [{:?}] \"{}\" -> \"{}\"\n",
                        stage.display_name(),
                        item.priority,
                        item.issue,
                        item.fix
                    ));
                    if !item.impact.is_empty() {
                        output.push_str(&indent(&wrap_text(&item.impact, 72), 6));
                        output.push('\n');
                    }
                }
            }
            output.push('\n');
        }

        if !self.result.warnings.is_empty() {
            output.push_str("Warnings\n");
            output.push_str("--------\n");
            for warning in &self.result.warnings {
                output.push_str(&format!("- {}\n", warning));
            }
        }

        output
    }

    /// Write to a text file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        write!(file, "{}", self.format())?;
        Ok(())
    }
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap text at approximately the given width
fn wrap_text(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        if line_len + word.len() + 1 > width && line_len > 0 {
            result.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            result.push(' ');
            line_len += 1;
        }
        result.push_str(word);
        line_len += word.len();
    }

    result
}
