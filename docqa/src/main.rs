use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use docqa::api::DEFAULT_RECENT_LIMIT;
use docqa::models::JobState;
use docqa::workflow::{ProcessingRun, UploadQueue};
use docqa::{
    project, render, Backend, ChatSession, Config, DocumentUpload, HttpBackend, JobPoller,
    PollPhase, SessionOptions,
};

#[derive(Parser)]
#[command(name = "docqa", version, about = "Upload, index and question documents")]
struct Cli {
    /// Backend base URL (overrides DOCQA_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload documents to storage
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List recently uploaded files
    Recent {
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: u32,
    },
    /// Start a processing run and follow it until it settles
    Process {
        #[arg(long)]
        limit: Option<u32>,
        /// Print the initial status and return without polling
        #[arg(long)]
        detach: bool,
    },
    /// Show the status of a processing job
    Status {
        job_id: String,
        /// Keep polling until the job settles
        #[arg(long)]
        watch: bool,
    },
    /// Ask a single question
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Interactive conversation (/history, /retry, /reset, /quit)
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    info!(api_url = %config.api_url, "docqa starting");

    let backend: Arc<dyn Backend> =
        Arc::new(HttpBackend::new(&config.api_url, config.request_timeout)?);

    match cli.command {
        Command::Upload { paths } => upload(backend, paths).await,
        Command::Recent { limit } => recent(backend, limit).await,
        Command::Process { limit, detach } => process(backend, &config, limit, detach).await,
        Command::Status { job_id, watch } => status(backend, &config, job_id, watch).await,
        Command::Ask { question } => ask(backend, &config, question.join(" ")).await,
        Command::Chat => chat(backend, &config).await,
    }
}

async fn upload(backend: Arc<dyn Backend>, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let documents = DocumentUpload::from_paths(&paths)
        .await
        .context("failed to read documents")?;

    let mut queue = UploadQueue::new(backend);
    queue.select(documents);
    let stored = queue.upload().await?;

    println!("{}", render::upload_summary(&stored));
    for file in &stored {
        println!("  {} -> {}/{}", file.original_name, file.container, file.blob_name);
    }
    Ok(())
}

async fn recent(backend: Arc<dyn Backend>, limit: u32) -> anyhow::Result<()> {
    let files = backend.list_recent(limit).await?;
    if files.is_empty() {
        println!("No files yet.");
    }
    for file in &files {
        println!("{}", render::file_record(file));
    }
    Ok(())
}

fn poller(backend: Arc<dyn Backend>, config: &Config) -> JobPoller {
    JobPoller::new(backend, config.poll_interval).with_failure_limit(config.max_poll_failures)
}

async fn process(
    backend: Arc<dyn Backend>,
    config: &Config,
    limit: Option<u32>,
    detach: bool,
) -> anyhow::Result<()> {
    let mut run = ProcessingRun::new(Arc::clone(&backend), poller(backend, config));
    let started = run.launch(limit).await?;
    println!("Job {}", started.job_id);
    println!("{}\n", project(&started));

    if detach {
        return Ok(());
    }
    follow(run.poller()).await
}

async fn status(
    backend: Arc<dyn Backend>,
    config: &Config,
    job_id: String,
    watch: bool,
) -> anyhow::Result<()> {
    if !watch {
        let status = backend.get_status(&job_id).await?;
        println!("{}", project(&status));
        return Ok(());
    }

    let mut poller = poller(backend, config);
    poller.track(job_id);
    follow(&poller).await
}

/// Prints every snapshot the poller publishes until it stops polling.
async fn follow(poller: &JobPoller) -> anyhow::Result<()> {
    let mut rx = poller.subscribe();
    loop {
        let view = rx.borrow_and_update().clone();
        if view.consecutive_failures > 0 {
            if let Some(err) = &view.error {
                eprintln!("status check failed ({}x): {err}", view.consecutive_failures);
            }
        } else if let Some(status) = &view.status {
            println!("{}\n", project(status));
        }

        match view.phase {
            PollPhase::Polling => {}
            PollPhase::Idle => return Ok(()),
            PollPhase::Settled => {
                let job_id = view.job_id.unwrap_or_default();
                return match view.status.map(|s| s.state) {
                    Some(JobState::Failed) => bail!("job {job_id} failed"),
                    _ => Ok(()),
                };
            }
            PollPhase::GaveUp => bail!(
                "gave up after {} failed status checks",
                view.consecutive_failures
            ),
        }

        rx.changed().await?;
    }
}

async fn ask(backend: Arc<dyn Backend>, config: &Config, question: String) -> anyhow::Result<()> {
    let session = ChatSession::new(backend, SessionOptions::from(config))?;
    let response = session.ask(question).await?;
    println!("{}", render::answer(&response));
    Ok(())
}

async fn chat(backend: Arc<dyn Backend>, config: &Config) -> anyhow::Result<()> {
    let session = ChatSession::new(backend, SessionOptions::from(config))?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" | "/exit" => break,
            "/history" => {
                for turn in session.history() {
                    println!("{}", render::turn(&turn));
                }
            }
            "/reset" => {
                session.reset()?;
                println!("Conversation cleared.");
            }
            "/retry" => match session.retry().await {
                Ok(response) => println!("{}\n", render::answer(&response)),
                Err(err) => eprintln!("{err}"),
            },
            "" => {}
            question => match session.ask(question).await {
                Ok(response) => println!("{}\n", render::answer(&response)),
                Err(err) => eprintln!("{err}"),
            },
        }
        prompt()?;
    }
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "> ")?;
    stdout.flush()
}
