use thiserror::Error;

use crate::models::EditorStage;

/// Caller misuse detected at the pipeline boundary
///
/// Model failures never surface here; they degrade to no-op stage results.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown editor stage: {0:?}")]
    UnknownStage(String),

    #[error("editor stage {0} selected more than once")]
    DuplicateStage(EditorStage),

    #[error("duplicate block id in document: {0:?}")]
    DuplicateBlockId(String),

    #[error("no pipeline run found for id {0}")]
    RunNotFound(String),

    #[error("checkpoint version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}
