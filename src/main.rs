use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use editorial::{
    load_document, write_json, AnthropicClient, AnthropicConfig, CheckpointStore,
    ConsolidatedResult, EditorialPipeline, FileCheckpointStore, PipelineConfig, PipelineError,
    ReviewReport, SequentialOutcome,
};

#[derive(Parser)]
#[command(name = "editorial")]
#[command(author, version, about = "Multi-stage LLM editorial review pipeline", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every selected stage back to back
    Edit {
        /// Input document (.json blocks, or Markdown-like text)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        stages: StageArgs,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Start a sequential run: execute the first stage and suspend
    Start {
        /// Input document (.json blocks, or Markdown-like text)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        stages: StageArgs,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        pipeline: PipelineArgs,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Execute the next stage of a suspended run, with the options it was started with
    Resume {
        /// Run id printed by `start`
        run_id: String,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Show progress of a run
    Status {
        run_id: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Abort a run and delete its saved state
    Discard {
        run_id: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// List saved runs
    List {
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(Args)]
struct StageArgs {
    /// Stages to run, in order (development, content, line, copy, brand); default all
    #[arg(short, long = "stage", value_delimiter = ',')]
    stages: Vec<String>,
}

#[derive(Args)]
struct OutputArgs {
    /// Output file for the consolidated result (JSON)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output file for the human-readable review report
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args)]
struct ModelArgs {
    /// Model name (overrides EDITORIAL_MODEL)
    #[arg(long)]
    model: Option<String>,
}

impl ModelArgs {
    fn client(&self) -> Result<AnthropicClient> {
        let mut config = AnthropicConfig::from_env()?;
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        info!("Using model {}", config.model);
        Ok(AnthropicClient::new(config))
    }
}

#[derive(Args)]
struct PipelineArgs {
    #[command(flatten)]
    model: ModelArgs,

    /// Skip the article analysis before the development stage
    #[arg(long)]
    no_article_analysis: bool,

    /// Skip the cross-paragraph analysis before the content stage
    #[arg(long)]
    no_cross_paragraph: bool,

    /// Skip the compliance check after the development stage
    #[arg(long)]
    no_compliance_check: bool,
}

impl PipelineArgs {
    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            article_analysis: !self.no_article_analysis,
            cross_paragraph_context: !self.no_cross_paragraph,
            compliance_check: !self.no_compliance_check,
        }
    }
}

#[derive(Args)]
struct StoreArgs {
    /// Directory holding saved runs
    #[arg(long, default_value = ".editorial/runs")]
    store_dir: PathBuf,
}

impl StoreArgs {
    fn open(&self) -> FileCheckpointStore {
        FileCheckpointStore::new(&self.store_dir)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Edit {
            input,
            stages,
            output,
            pipeline,
        } => {
            let document = load_document(&input).context("Failed to load input document")?;
            info!("Loaded {} blocks from {:?}", document.len(), input);

            let client = pipeline.model.client()?;
            let runner = EditorialPipeline::new(&client, pipeline.config());
            let consolidated = runner.run_all(document, &stages.stages).await?;

            write_outputs(&consolidated, &output)?;
            print_summary(&consolidated);
            Ok(())
        }
        Commands::Start {
            input,
            stages,
            output,
            pipeline,
            store,
        } => {
            let document = load_document(&input).context("Failed to load input document")?;
            info!("Loaded {} blocks from {:?}", document.len(), input);

            let client = pipeline.model.client()?;
            let runner = EditorialPipeline::new(&client, pipeline.config());
            let outcome = runner
                .start(document, &stages.stages, &store.open())
                .await?;

            report_outcome(&outcome, &output)
        }
        Commands::Resume {
            run_id,
            output,
            model,
            store,
        } => {
            let client = model.client()?;
            let runner = EditorialPipeline::new(&client, PipelineConfig::default());
            let outcome = runner.resume(&run_id, &store.open()).await?;

            report_outcome(&outcome, &output)
        }
        Commands::Status { run_id, store } => show_status(&run_id, &store.open()),
        Commands::Discard { run_id, store } => {
            EditorialPipeline::discard(&run_id, &store.open())?;
            println!("Discarded run {}", run_id);
            Ok(())
        }
        Commands::List { store } => list_runs(&store.open()),
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn write_outputs(consolidated: &ConsolidatedResult, output: &OutputArgs) -> Result<()> {
    if let Some(path) = &output.output {
        write_json(consolidated, path)?;
        info!("Consolidated result written to {:?}", path);
    }
    if let Some(path) = &output.report {
        ReviewReport::new(consolidated).write_file(path)?;
        info!("Review report written to {:?}", path);
    }
    Ok(())
}

fn report_outcome(outcome: &SequentialOutcome, output: &OutputArgs) -> Result<()> {
    write_outputs(outcome.consolidated(), output)?;
    print_summary(outcome.consolidated());

    match outcome {
        SequentialOutcome::Suspended {
            run_id,
            completed,
            next_stage,
            ..
        } => {
            println!();
            println!(
                "{} complete. Next: {}",
                completed.display_name(),
                next_stage.display_name()
            );
            println!("Review the result, then run: editorial resume {}", run_id);
        }
        SequentialOutcome::Completed { run_id, .. } => {
            println!();
            println!("Run {} complete", run_id);
        }
    }
    Ok(())
}

fn print_summary(consolidated: &ConsolidatedResult) {
    println!("Editorial Summary");
    println!("=================");
    println!("Blocks: {}", consolidated.blocks.len());
    println!("Changed: {}", consolidated.changed_count());
    println!("Feedback items: {}", consolidated.feedback_count());
    if !consolidated.warnings.is_empty() {
        println!("Warnings:");
        for warning in &consolidated.warnings {
            println!("  - {}", warning);
        }
    }
}

fn show_status(run_id: &str, store: &dyn CheckpointStore) -> Result<()> {
    let state = store
        .load(run_id)?
        .ok_or_else(|| PipelineError::RunNotFound(run_id.to_string()))?;
    let info = state.info();

    println!("Run: {}", info.run_id);
    println!("Created: {}", state.created_at);
    println!("Updated: {}", info.updated_at);
    println!("Progress: {}/{} stages", info.completed, info.total);
    for (i, stage) in state.stages.iter().enumerate() {
        let mark = if i < state.cursor { "x" } else { " " };
        println!("  [{}] {}", mark, stage.display_name());
    }
    match info.next_stage {
        Some(stage) => println!("Next: {}", stage.display_name()),
        None => println!("Complete"),
    }
    print_summary(&state.consolidated);
    Ok(())
}

fn list_runs(store: &FileCheckpointStore) -> Result<()> {
    let runs = store.list()?;
    if runs.is_empty() {
        println!("No saved runs in {}", store.dir().display());
        return Ok(());
    }

    for run in runs {
        let next = run
            .next_stage
            .map(|s| s.key().to_string())
            .unwrap_or_else(|| "done".to_string());
        println!(
            "{}  {}/{}  next: {:<12} updated {}",
            run.run_id, run.completed, run.total, next, run.updated_at
        );
    }
    Ok(())
}
