use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::io::CheckpointStore;
use crate::llm::LanguageModel;
use crate::models::{
    parse_stage_list, ConsolidatedResult, Document, EditorStage, PipelineConfig, PipelineState,
    StageResult,
};

use super::compliance::check_development_compliance;
use super::context::{build_article_analysis, build_cross_paragraph_analysis};
use super::executor::run_stage;
use super::merge::{fold, merge};

/// Where a run stands between steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The stage at the cursor is ready to run
    BeforeStage(EditorStage),
    /// Development is next and its article analysis is not cached yet
    AnalysisPending,
    /// A stage result is recorded but not yet checked and merged
    ValidationPending,
    Done,
}

/// Decide the next step from the persisted state alone
pub fn plan_next(state: &PipelineState) -> Phase {
    if state.results.len() > state.cursor {
        return Phase::ValidationPending;
    }
    match state.next_stage() {
        None => Phase::Done,
        Some(EditorStage::Development)
            if state.config.article_analysis && state.article_analysis.is_none() =>
        {
            Phase::AnalysisPending
        }
        Some(stage) => Phase::BeforeStage(stage),
    }
}

/// Outcome of one sequential-mode invocation
#[derive(Debug, Clone)]
pub enum SequentialOutcome {
    /// One stage ran; the run waits for `resume`
    Suspended {
        run_id: String,
        completed: EditorStage,
        next_stage: EditorStage,
        consolidated: ConsolidatedResult,
    },
    /// Every selected stage has run
    Completed {
        run_id: String,
        consolidated: ConsolidatedResult,
    },
}

impl SequentialOutcome {
    pub fn run_id(&self) -> &str {
        match self {
            Self::Suspended { run_id, .. } | Self::Completed { run_id, .. } => run_id,
        }
    }

    pub fn consolidated(&self) -> &ConsolidatedResult {
        match self {
            Self::Suspended { consolidated, .. } | Self::Completed { consolidated, .. } => {
                consolidated
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Drives editor stages over a document with an injected model
///
/// `config` applies to runs this pipeline creates; resumed runs keep the
/// config they were started with.
pub struct EditorialPipeline<'a> {
    llm: &'a dyn LanguageModel,
    config: PipelineConfig,
}

impl<'a> EditorialPipeline<'a> {
    pub fn new(llm: &'a dyn LanguageModel, config: PipelineConfig) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Eager mode: run every selected stage back to back, then fold
    pub async fn run_all<S: AsRef<str>>(
        &self,
        document: Document,
        stages: &[S],
    ) -> Result<ConsolidatedResult> {
        let mut state = self.prepare(document, stages)?;
        info!(
            "Running {} stages over {} blocks",
            state.stages.len(),
            state.document.len()
        );

        while self.run_next_stage(&mut state).await.is_some() {}

        let consolidated = fold(&state.document, &state.results);
        info!(
            "Pipeline complete: {} blocks changed, {} feedback items, {} warnings",
            consolidated.changed_count(),
            consolidated.feedback_count(),
            consolidated.warnings.len()
        );
        Ok(consolidated)
    }

    /// Advance the run by exactly one stage, including any analysis before
    /// it and validation after it. Returns the stage that ran, or `None`
    /// when the run was already done.
    pub async fn run_next_stage(&self, state: &mut PipelineState) -> Option<EditorStage> {
        loop {
            match plan_next(state) {
                Phase::Done => return None,
                Phase::AnalysisPending => {
                    info!("Building article analysis");
                    let working = state.working_document();
                    let analysis = build_article_analysis(self.llm, &working).await;
                    // Cached even when empty so it is only attempted once
                    state.article_analysis = Some(analysis);
                }
                Phase::BeforeStage(stage) => {
                    let result = self.execute(state, stage).await;
                    state.results.push(result);
                }
                Phase::ValidationPending => return Some(self.commit(state).await),
            }
        }
    }

    async fn execute(&self, state: &PipelineState, stage: EditorStage) -> StageResult {
        let working = state.working_document();
        let aux_context = match stage {
            EditorStage::Development => state.article_analysis.clone(),
            EditorStage::Content if state.config.cross_paragraph_context => {
                Some(build_cross_paragraph_analysis(self.llm, &working).await)
            }
            _ => None,
        }
        .filter(|text| !text.is_empty());

        info!(
            "Stage {}/{}: {}",
            state.cursor + 1,
            state.stages.len(),
            stage.display_name()
        );
        run_stage(self.llm, stage, &working, aux_context.as_deref()).await
    }

    /// Check the pending result, merge it and advance the cursor
    async fn commit(&self, state: &mut PipelineState) -> EditorStage {
        let before = state
            .results
            .iter()
            .take(state.cursor)
            .fold(state.document.clone(), |doc, result| doc.with_applied(result));

        let pending = &mut state.results[state.cursor];
        if pending.stage == EditorStage::Development && state.config.compliance_check {
            check_development_compliance(self.llm, &before, pending).await;
        }

        let stage = pending.stage;
        let consolidated = std::mem::take(&mut state.consolidated);
        state.consolidated = merge(consolidated, &state.results[state.cursor]);
        state.cursor += 1;
        state.touch();
        stage
    }

    /// Sequential mode: create a run, execute its first stage and persist it
    pub async fn start<S: AsRef<str>>(
        &self,
        document: Document,
        stages: &[S],
        store: &dyn CheckpointStore,
    ) -> Result<SequentialOutcome> {
        let mut state = self.prepare(document, stages)?;
        info!(
            "Starting run {} with stages {:?}",
            state.run_id,
            state.stages.iter().map(|s| s.key()).collect::<Vec<_>>()
        );
        self.step(&mut state, store).await
    }

    /// Sequential mode: execute exactly the next stage of a persisted run
    ///
    /// Resuming a completed run returns its stored result without calling the
    /// model.
    pub async fn resume(
        &self,
        run_id: &str,
        store: &dyn CheckpointStore,
    ) -> Result<SequentialOutcome> {
        let mut state = store
            .load(run_id)?
            .ok_or_else(|| PipelineError::RunNotFound(run_id.to_string()))?;

        if state.is_done() {
            info!("Run {} already complete", run_id);
            return Ok(outcome(state));
        }

        self.step(&mut state, store).await
    }

    async fn step(
        &self,
        state: &mut PipelineState,
        store: &dyn CheckpointStore,
    ) -> Result<SequentialOutcome> {
        if let Some(stage) = self.run_next_stage(state).await {
            info!(
                "Run {}: {} done ({}/{})",
                state.run_id,
                stage.display_name(),
                state.cursor,
                state.stages.len()
            );
        }
        store.save(state)?;
        Ok(outcome(state.clone()))
    }

    /// Abort a run; stages already merged are not rolled back
    pub fn discard(run_id: &str, store: &dyn CheckpointStore) -> Result<()> {
        if !store.remove(run_id)? {
            return Err(PipelineError::RunNotFound(run_id.to_string()).into());
        }
        info!("Discarded run {}", run_id);
        Ok(())
    }

    fn prepare<S: AsRef<str>>(&self, document: Document, stages: &[S]) -> Result<PipelineState> {
        document.validate()?;
        let stages = parse_stage_list(stages)?;
        Ok(PipelineState::new(
            Uuid::new_v4().to_string(),
            document,
            stages,
            self.config.clone(),
        ))
    }
}

fn outcome(state: PipelineState) -> SequentialOutcome {
    let completed = state.cursor.checked_sub(1).and_then(|i| state.stages.get(i).copied());
    match (state.next_stage(), completed) {
        (Some(next_stage), Some(completed)) => SequentialOutcome::Suspended {
            run_id: state.run_id,
            completed,
            next_stage,
            consolidated: state.consolidated,
        },
        _ => SequentialOutcome::Completed {
            run_id: state.run_id,
            consolidated: state.consolidated,
        },
    }
}
