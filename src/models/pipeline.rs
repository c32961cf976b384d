use serde::{Deserialize, Serialize};

use super::{ConsolidatedResult, Document, EditorStage, StageResult};

/// Current checkpoint format version.
/// Increment this when making breaking changes to the persisted state.
pub const STATE_VERSION: u32 = 2;

/// Optional helper passes around the editor stages
///
/// Saved with a run so that every resume behaves like the invocation that
/// started it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Produce whole-article analysis before the development stage
    pub article_analysis: bool,
    /// Produce cross-paragraph analysis before the content stage
    pub cross_paragraph_context: bool,
    /// Re-check the development stage against its article-level gates
    pub compliance_check: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            article_analysis: true,
            cross_paragraph_context: true,
            compliance_check: true,
        }
    }
}

/// Persisted state of a sequential run, carried across suspend/resume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub version: u32,
    /// Key under which the state is stored
    pub run_id: String,
    /// RFC3339 timestamps
    pub created_at: String,
    pub updated_at: String,
    /// Document as supplied by the caller
    pub document: Document,
    /// Selected stages, in execution order
    pub stages: Vec<EditorStage>,
    /// Helper passes fixed when the run was created
    #[serde(default)]
    pub config: PipelineConfig,
    /// Index of the next stage to run
    pub cursor: usize,
    /// One result per completed stage
    #[serde(default)]
    pub results: Vec<StageResult>,
    /// Whole-article analysis, produced once for the development stage
    #[serde(default)]
    pub article_analysis: Option<String>,
    /// Consolidated view after the completed stages
    pub consolidated: ConsolidatedResult,
}

impl PipelineState {
    pub fn new(
        run_id: String,
        document: Document,
        stages: Vec<EditorStage>,
        config: PipelineConfig,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let consolidated = ConsolidatedResult::from_document(&document);
        Self {
            version: STATE_VERSION,
            run_id,
            created_at: now.clone(),
            updated_at: now,
            document,
            stages,
            config,
            cursor: 0,
            results: Vec::new(),
            article_analysis: None,
            consolidated,
        }
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.stages.len()
    }

    pub fn next_stage(&self) -> Option<EditorStage> {
        self.stages.get(self.cursor).copied()
    }

    /// Document snapshot carrying the text produced by the completed stages
    pub fn working_document(&self) -> Document {
        self.results
            .iter()
            .fold(self.document.clone(), |doc, result| doc.with_applied(result))
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    pub fn info(&self) -> PipelineStateInfo {
        PipelineStateInfo {
            run_id: self.run_id.clone(),
            completed: self.cursor.min(self.stages.len()),
            total: self.stages.len(),
            next_stage: self.next_stage(),
            updated_at: self.updated_at.clone(),
        }
    }
}

/// Summary of a persisted run for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStateInfo {
    pub run_id: String,
    pub completed: usize,
    pub total: usize,
    pub next_stage: Option<EditorStage>,
    pub updated_at: String,
}
