mod api;
mod config;
mod pipeline;
mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::{info, warn};

use postloop_core::SourceSelection;
use postloop_knowledge::KnowledgeBase;
use postloop_llm::OllamaClient;
use postloop_logging::{init_tracing, LogFormat, Logger, PostHistory};
use postloop_publish::{
    DryRunPublisher, PublishError, Publisher, UnconfiguredPublisher, XPublisher,
};

use crate::config::{ProjectConfig, Settings};
use crate::pipeline::{Pipeline, PipelineOptions, PipelineReport, RunStatus};
use crate::scheduler::SchedulerHandle;

#[derive(Parser, Debug)]
#[command(
    name = "postloop",
    about = "Generate, self-critique and publish short social posts",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Diagnostic log level (RUST_LOG overrides)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Log posts instead of publishing them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Output the final report as JSON
    #[arg(long, global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate posts without publishing them
    Generate {
        /// Number of posts
        #[arg(short = 'n', long, default_value_t = 2)]
        count: usize,
    },
    /// Generate one post and publish it
    Post,
    /// Run the HTTP API and the posting scheduler
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Do not start the scheduler
        #[arg(long)]
        no_schedule: bool,
    },
    /// Show the posting slots and the next fire times
    Schedule,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    init_tracing(&cli.log_level, log_format);

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = ProjectConfig::load(&working_dir)?.unwrap_or_default();
    let mut settings = Settings::resolve(&config, &working_dir)?;
    settings.dry_run |= cli.dry_run;

    match cli.command {
        Command::Schedule => {
            print_schedule(&settings);
            Ok(())
        }
        Command::Generate { count } => {
            let pipeline = build_pipeline(&settings, log_format)?;
            let code = run_and_report(&pipeline, count, false, cli.json_output).await?;
            std::process::exit(code);
        }
        Command::Post => {
            let pipeline = build_pipeline(&settings, log_format)?;
            let code = run_and_report(&pipeline, 1, true, cli.json_output).await?;
            std::process::exit(code);
        }
        Command::Serve { port, no_schedule } => {
            if let Some(port) = port {
                settings.port = port;
            }
            let pipeline = Arc::new(build_pipeline(&settings, log_format)?);
            serve(pipeline, &settings, no_schedule).await
        }
    }
}

fn build_pipeline(settings: &Settings, log_format: LogFormat) -> Result<Pipeline> {
    let generator = OllamaClient::new(&settings.host, &settings.generator_model)
        .with_timeout(settings.request_timeout);
    let critic = OllamaClient::new(&settings.host, &settings.critic_model)
        .with_timeout(settings.request_timeout);

    let knowledge = KnowledgeBase::load(&settings.knowledge_path).with_context(|| {
        format!(
            "Failed to load knowledge base from {}",
            settings.knowledge_path.display()
        )
    })?;
    info!(
        topics = knowledge.topics().len(),
        styles = knowledge.styles().len(),
        "Knowledge base loaded"
    );

    let selection = if settings.pin_sources {
        SourceSelection::PinnedPerRun
    } else {
        SourceSelection::PerIteration
    };

    Ok(Pipeline::new(
        Arc::new(generator),
        Arc::new(critic),
        Arc::new(knowledge),
        build_publisher(settings),
        Arc::new(PostHistory::new(settings.history_path.clone())),
        Arc::new(Logger::new(log_format)),
    )
    .with_options(PipelineOptions {
        selection,
        publish_unapproved: settings.publish_unapproved,
        ..PipelineOptions::default()
    }))
}

fn build_publisher(settings: &Settings) -> Arc<dyn Publisher> {
    if settings.dry_run {
        return Arc::new(DryRunPublisher);
    }
    match XPublisher::from_env() {
        Ok(publisher) => Arc::new(publisher.with_api_base(&settings.api_base)),
        Err(PublishError::MissingCredentials(missing)) => {
            warn!(missing = ?missing, "Publishing credentials not configured");
            Arc::new(UnconfiguredPublisher::new(missing))
        }
        Err(e) => {
            warn!(error = %e, "Publisher unavailable");
            Arc::new(UnconfiguredPublisher::new(Vec::new()))
        }
    }
}

/// Run the pipeline once and print the result. Returns the exit code.
async fn run_and_report(
    pipeline: &Pipeline,
    count: usize,
    publish: bool,
    json_output: bool,
) -> Result<i32> {
    let report = match pipeline.run_once(count, publish).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {}", "✗".bright_red(), e);
            eprintln!("Start the model backend (e.g. `ollama serve`) and try again.");
            return Ok(2);
        }
    };

    if json_output {
        let json = serde_json::to_string_pretty(&report)?;
        println!("{}", json);
    } else {
        print_report(&report);
    }
    Ok(report.exit_code())
}

fn print_report(report: &PipelineReport) {
    for post in &report.posts {
        eprintln!();
        match post.status {
            RunStatus::Approved => eprintln!("=== POST {} APPROVED ===", post.run),
            RunStatus::Unapproved => eprintln!("=== POST {} NOT APPROVED ===", post.run),
            RunStatus::Failed => eprintln!("=== POST {} FAILED ===", post.run),
        }
        if let Some(text) = &post.text {
            println!("{}", text);
            eprintln!(
                "Topic: {} / {}",
                post.topic.as_deref().unwrap_or("-"),
                post.style.as_deref().unwrap_or("-")
            );
            eprintln!(
                "Length: {} chars, {} iteration(s), score {:.1}/10",
                post.character_count.unwrap_or_default(),
                post.iterations,
                post.overall_score.unwrap_or_default()
            );
        }
        if let Some(id) = &post.post_id {
            eprintln!("Published: {}", id);
        }
        if let Some(error) = &post.error {
            eprintln!("Error: {}", error);
        }
    }

    eprintln!();
    eprintln!(
        "Generated {}, published {}, failed {}",
        report.generated, report.published, report.failed
    );
}

fn print_schedule(settings: &Settings) {
    let schedule = &settings.schedule;
    eprintln!("Timezone: {}", schedule.zone());
    eprintln!("Posts per run: {}", schedule.posts_per_run());
    eprintln!("Slots:");
    for time in schedule.times() {
        eprintln!("  {}", time.format("%H:%M"));
    }
    eprintln!(
        "Total daily posts: {}",
        schedule.times().len() * schedule.posts_per_run()
    );
    eprintln!("Next runs:");
    for slot in schedule.upcoming(Utc::now(), schedule.times().len()) {
        eprintln!("  {}", slot.format("%Y-%m-%d %H:%M %:z"));
    }
}

async fn serve(pipeline: Arc<Pipeline>, settings: &Settings, no_schedule: bool) -> Result<()> {
    let router = api::create_router(pipeline.clone(), settings.port);

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;

    let scheduler = if no_schedule {
        None
    } else {
        let posts_per_run = settings.schedule.posts_per_run();
        let job_pipeline = pipeline.clone();
        Some(SchedulerHandle::spawn(
            settings.schedule.clone(),
            move || {
                let pipeline = job_pipeline.clone();
                async move {
                    match pipeline.run_once(posts_per_run, true).await {
                        Ok(report) => info!(
                            published = report.published,
                            failed = report.failed,
                            "Scheduled run finished"
                        ),
                        Err(e) => warn!(error = %e, "Scheduled run skipped"),
                    }
                }
            },
        ))
    };

    eprintln!();
    eprintln!(
        "  {} {}",
        "->".bright_green(),
        format!("Listening on http://localhost:{}", settings.port).bold()
    );
    for route in api::ROUTES {
        eprintln!("     {}", route.dimmed());
    }
    if scheduler.is_some() {
        let slots: Vec<String> = settings
            .schedule
            .times()
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect();
        eprintln!(
            "  {} Scheduler active: {} ({})",
            "->".bright_green(),
            slots.join(", "),
            settings.schedule.zone()
        );
    }
    eprintln!("  {} Press {} to stop", "->".dimmed(), "Ctrl+C".bold());
    eprintln!();

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }

    result.context("API server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    eprintln!("\nShutting down...");
}
