pub mod error;
pub mod io;
pub mod llm;
pub mod models;
pub mod stages;

pub use error::PipelineError;
pub use io::{
    load_document, write_json, CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore,
    ReviewReport,
};
pub use llm::{AnthropicClient, AnthropicConfig, LanguageModel, OutputSchema, Prompt};
pub use models::{
    Block, BlockType, ConsolidatedBlock, ConsolidatedResult, Document, EditorStage, FeedbackItem,
    PipelineConfig, PipelineState, Priority, StageResult,
};
pub use stages::{merge, run_stage, EditorialPipeline, SequentialOutcome};
