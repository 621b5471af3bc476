use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::render::TerminalRenderer;
use cli::summary::{format_summary, nothing_to_do, summary_json};
use sorter_core::config::{self, AppConfig};
use sorter_core::pipeline::{self, Pipeline, ScorePipeline, TagPipeline};
use sorter_core::BatchScheduler;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let renderer = Arc::new(TerminalRenderer::new());
    tracing_subscriber::fmt()
        .with_writer(renderer.log_writer())
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Score {
            directory,
            output,
            workers,
            json,
        } => {
            cfg.scoring.output = Some(output);
            if let Some(w) = workers {
                cfg.batch.workers = w;
            }
            let provider = pipeline::build_provider(&cfg.service)?;
            let pipeline = ScorePipeline::from_config(provider, &cfg);
            run_batch(&cfg, Arc::new(pipeline), renderer, directory, json).await
        }
        Commands::Tag {
            directory,
            workers,
            dry_run,
            json,
        } => {
            if let Some(w) = workers {
                cfg.batch.workers = w;
            }
            cfg.tagging.dry_run |= dry_run;
            let provider = pipeline::build_provider(&cfg.service)?;
            let pipeline = TagPipeline::from_config(provider, &cfg);
            if pipeline.is_dry_run() {
                println!("--- Running in Dry Run mode. No files will be modified. ---");
            }
            run_batch(&cfg, Arc::new(pipeline), renderer, directory, json).await
        }
    }
}

#[derive(Parser)]
#[command(name = "photo-sorter")]
#[command(about = "Score, sort and tag photos with a local vision model", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every image and move it into <output>/<score>/<relative path>/
    Score {
        /// Root directory to search for images
        directory: PathBuf,
        /// Output directory for the score buckets
        #[arg(short, long)]
        output: PathBuf,
        /// Number of concurrent workers (default 5)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Generate title, description and keywords and write them into each JPEG
    Tag {
        /// Root directory to search for JPEG images
        directory: PathBuf,
        /// Number of concurrent workers (default 5)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Print what would be written without modifying any file
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
}

async fn run_batch(
    cfg: &AppConfig,
    pipeline: Arc<dyn Pipeline>,
    renderer: Arc<TerminalRenderer>,
    directory: PathBuf,
    json: bool,
) -> Result<()> {
    let mode = pipeline.name();
    info!(endpoint = %cfg.service.endpoint, model = %cfg.service.model, mode, "starting");
    let scheduler = BatchScheduler::new(pipeline, cfg.batch.clone())
        .with_sink(renderer);
    let summary = scheduler.run(&directory).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary_json(mode, &summary))?);
    } else if let Some(line) = nothing_to_do(mode, &summary) {
        println!("{}", line);
    } else {
        println!("{}", format_summary(&summary));
        println!("Processing complete.");
    }
    Ok(())
}
