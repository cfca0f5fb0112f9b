//! Lingomux - multilingual subtitle pipeline
//!
//! Command line entry point: runs jobs end to end and exposes the single
//! stages as utilities.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lingomux::cli::{parse_languages, parse_subtitle_arg, Args, Commands};
use lingomux::config::Config;
use lingomux::language::LanguageRegistry;
use lingomux::media::{ExtractOptions, FfmpegProcessor, MediaTool, SubtitleMultiplexer};
use lingomux::models::{JobId, JobStatus, PipelineStage, SubtitleTrack};
use lingomux::pipeline::{self, JobRunner};
use lingomux::setup::{check_binary, Workspace, BINARY_CHECK_TIMEOUT};
use lingomux::store::{JobFilter, JobStore, JsonStore};
use lingomux::subtitle::{chunks_from_json, SubtitleFormatter};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("lingomux.toml").exists() {
                Config::from_file("lingomux.toml")?
            } else {
                Config::default()
            }
        }
    };
    config.apply_env_overrides();

    // Setup logging to both console and file
    setup_logging(&config, args.verbose)?;
    info!("Starting Lingomux");

    let workspace = Workspace::prepare(&config).await?;

    match args.command {
        Commands::Process {
            input,
            input_language,
            target_langs,
        } => {
            let ffmpeg = FfmpegProcessor::new(&config.media).version_info().await?;
            info!("Using {}", ffmpeg);
            check_binary(&config.transcriber.binary_path, "--help", BINARY_CHECK_TIMEOUT).await?;

            let store = Arc::new(JsonStore::open(&workspace.store_path).await?);
            let orchestrator = Arc::new(pipeline::build(&config, &workspace, store)?);

            let targets = parse_languages(&target_langs);
            let mut job_ids = Vec::with_capacity(input.len());
            for video in &input {
                let uploaded = workspace.store_upload(video).await?;
                let job = orchestrator.submit(uploaded, &input_language, &targets).await?;
                println!("Job: {} ({})", job.id, video.display());
                job_ids.push(job.id);
            }

            if let [job_id] = job_ids.as_slice() {
                let progress = stage_progress()?;
                let bar = progress.clone();
                let outcome = orchestrator
                    .run_observed(job_id, move |_, stage| {
                        bar.set_position(stage_index(stage));
                        bar.set_message(stage.to_string());
                    })
                    .await;

                match outcome {
                    Ok(job) => {
                        progress.finish_with_message("done");
                        print_job_result(&job.id, job.output_path.as_deref(), job.processed);
                    }
                    Err(e) => {
                        progress.abandon_with_message("failed");
                        return Err(e.into());
                    }
                }
            } else {
                let runner = JobRunner::new(orchestrator, config.pipeline.max_concurrent_jobs);
                let mut failed = 0;
                for (job_id, outcome) in runner.run_all(job_ids).await {
                    match outcome {
                        Ok(job) => print_job_result(&job.id, job.output_path.as_deref(), job.processed),
                        Err(e) => {
                            failed += 1;
                            eprintln!("Job {} failed: {}", job_id, e);
                        }
                    }
                }
                if failed > 0 {
                    anyhow::bail!("{} job(s) failed", failed);
                }
            }
        }
        Commands::Resume { job } => {
            let store = Arc::new(JsonStore::open(&workspace.store_path).await?);
            let orchestrator = pipeline::build(&config, &workspace, store)?;
            let job = orchestrator.resume(&JobId::from(job.as_str())).await?;
            print_job_result(&job.id, job.output_path.as_deref(), job.processed);
        }
        Commands::Jobs { status } => {
            let store = JsonStore::open(&workspace.store_path).await?;
            let filter = match status {
                Some(status) => JobFilter::with_status(status.parse::<JobStatus>()?),
                None => JobFilter::all(),
            };

            let jobs = JobStore::find_where(&store, &filter).await?;
            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                println!("{:<40} {:<16} {:<10} {:<30} {}", "Job", "Status", "Language", "Targets", "Output");
                println!("{}", "-".repeat(110));
                for job in jobs {
                    let status = match &job.failure {
                        Some(failure) if job.status == JobStatus::Failed => format!("FAILED@{}", failure.stage),
                        _ => job.status.to_string(),
                    };
                    println!(
                        "{:<40} {:<16} {:<10} {:<30} {}",
                        job.id,
                        status,
                        job.input_language,
                        job.target_languages.join(","),
                        job.output_path.map(|p| p.display().to_string()).unwrap_or_default()
                    );
                }
            }
        }
        Commands::Extract { input, output } => {
            info!("Extracting audio from: {}", input.display());
            let processor = FfmpegProcessor::new(&config.media);
            let path = processor
                .extract_audio(&input, &output, &ExtractOptions::from(&config.media))
                .await?;
            println!("Audio written to {}", path.display());
        }
        Commands::Format { input, output } => {
            info!("Formatting chunks from: {}", input.display());
            let content = tokio::fs::read_to_string(&input).await?;
            let chunks = chunks_from_json(&content)?;

            let formatter = SubtitleFormatter::new(
                workspace.transcriptions_dir.clone(),
                Arc::new(lingomux::store::MemoryStore::new()),
            );
            let report = formatter.save_chunks(&chunks, &output).await?;
            println!(
                "Wrote {} block(s) to {} ({} chunk(s) skipped)",
                report.written,
                report.path.display(),
                report.skipped
            );
        }
        Commands::Mux {
            video,
            subtitles,
            output,
        } => {
            let tracks = subtitles
                .iter()
                .map(|arg| parse_subtitle_arg(arg).map(|(language, path)| SubtitleTrack { language, path }))
                .collect::<lingomux::error::Result<Vec<_>>>()?;

            let registry = Arc::new(LanguageRegistry::new());
            let processor: Arc<dyn MediaTool> = Arc::new(FfmpegProcessor::new(&config.media));
            let multiplexer = SubtitleMultiplexer::new(processor, registry, workspace.processed_dir.clone());

            let path = multiplexer.mux_to(&video, &tracks, &output).await?;
            println!("Muxed {} subtitle track(s) into {}", tracks.len(), path.display());
        }
        Commands::Languages => {
            let registry = LanguageRegistry::new();
            println!("{:<6} {}", "Code", "Name");
            println!("{}", "-".repeat(20));
            for language in registry.languages() {
                println!("{:<6} {}", language.code, language.name);
            }
        }
    }

    Ok(())
}

fn print_job_result(job_id: &JobId, output: Option<&Path>, processed: bool) {
    println!("Job: {}", job_id);
    match output {
        Some(path) => println!("Output: {}", path.display()),
        None => warn!("Job {} has no output yet", job_id),
    }
    println!("Processed: {}", processed);
}

fn stage_index(stage: PipelineStage) -> u64 {
    PipelineStage::ALL
        .iter()
        .position(|s| *s == stage)
        .unwrap_or_default() as u64
}

fn stage_progress() -> Result<ProgressBar> {
    let pb = ProgressBar::new(PipelineStage::ALL.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

/// Setup logging to both console and file
fn setup_logging(config: &Config, verbose: bool) -> Result<()> {
    let log_dir = config.paths.log_dir();
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "lingomux.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("lingomux.log").display()
    );

    Ok(())
}
