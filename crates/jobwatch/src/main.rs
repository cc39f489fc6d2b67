use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use jobwatch::client::HttpJobSource;
use jobwatch::config::{self, WatchConfig};
use jobwatch::normalize::Normalizer;
use jobwatch::poller::JobSource;
use jobwatch::report::ConsoleFailureReporter;
use jobwatch::session::{PresentationMode, WatchSession, parse_duration};
use jobwatch::watch::{self, EXIT_ERROR, EXIT_OK};
use jobwatch::{Error, Result};

const LOG_ENV: &str = "JOBWATCH_LOG";

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Config file (defaults to ./jobwatch.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Write diagnostics to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// Emit diagnostics as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Follow a remote job until it finishes
    Watch {
        /// Job identifier
        id: String,
        /// Seconds between refreshes (minimum 1)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
        /// Full-screen view with a scrolling log
        #[arg(short, long, conflicts_with = "quiet")]
        interactive: bool,
        /// Print only progress deltas
        #[arg(short, long)]
        quiet: bool,
        /// Stop watching after this long, e.g. 90, 30s, 10m, 1h (0 = never)
        #[arg(long, value_parser = parse_duration)]
        timeout: Option<Duration>,
    },
    /// Fetch and print the current status of a job
    Status {
        /// Job identifier
        id: String,
    },
    /// Fetch and print the normalized console log of a job
    Logs {
        /// Job identifier
        id: String,
    },
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            EXIT_ERROR
        }
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run(args: Args) -> Result<i32> {
    let requested = match &args.cmd {
        Command::Watch {
            interactive, quiet, ..
        } => PresentationMode::from_flags(*interactive, *quiet)?,
        Command::Status { .. } | Command::Logs { .. } => PresentationMode::Plain,
    };
    let mode = requested.for_stdout(std::io::stdout().is_terminal());
    init_tracing(
        args.log_file.as_deref(),
        args.log_json,
        mode == PresentationMode::Interactive,
    )?;
    if mode != requested {
        tracing::warn!("stdout is not a terminal; falling back to plain output");
    }

    let cfg = config::load_or_default(args.config.as_deref())?;
    match args.cmd {
        Command::Watch {
            id,
            interval,
            timeout,
            ..
        } => cmd_watch(&cfg, id, interval, mode, timeout),
        Command::Status { id } => cmd_status(&cfg, &id).map(|()| EXIT_OK),
        Command::Logs { id } => cmd_logs(&cfg, &id).map(|()| EXIT_OK),
    }
}

fn cmd_watch(
    cfg: &WatchConfig,
    id: String,
    interval: Option<u64>,
    mode: PresentationMode,
    timeout: Option<Duration>,
) -> Result<i32> {
    let interval = Duration::from_secs(interval.unwrap_or_else(|| cfg.watch.interval_secs()));
    let timeout = match timeout {
        Some(t) => Some(t),
        None => cfg.watch.timeout()?,
    };
    let session = WatchSession::new(id, interval, mode, timeout)?;

    let source: Arc<dyn JobSource> = Arc::new(HttpJobSource::new(&cfg.server)?);
    let outcome = watch::watch(session, source, &ConsoleFailureReporter)?;
    Ok(outcome.exit_code())
}

fn cmd_status(cfg: &WatchConfig, id: &str) -> Result<()> {
    let source = HttpJobSource::new(&cfg.server)?;
    let snap = source
        .fetch_status(id)
        .map_err(|e| e.context(format!("fetching status of job {id}")))?;

    println!("job: {} #{} ({})", snap.name, snap.number, snap.id);
    match snap.running_percent() {
        Some(p) => println!("status: {} {p}%", snap.status),
        None => println!("status: {}", snap.status),
    }
    if !snap.url.is_empty() {
        println!("url: {}", snap.url);
    }
    if !snap.message.is_empty() {
        println!("message: {}", snap.message);
    }
    println!(
        "checked_at: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

fn cmd_logs(cfg: &WatchConfig, id: &str) -> Result<()> {
    let source = HttpJobSource::new(&cfg.server)?;
    let raw = source
        .fetch_log(id)
        .map_err(|e| e.context(format!("fetching log of job {id}")))?;
    for line in Normalizer::for_mode(PresentationMode::Plain).normalize(&raw) {
        println!("{}", line.display());
    }
    Ok(())
}

/// Diagnostics go to `log_file` when given, else stderr. A full-screen session
/// without a log file gets no subscriber at all.
fn init_tracing(log_file: Option<&Path>, json: bool, interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::msg(format!("failed to open log file {}: {e}", path.display())))?;
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false);
        if json {
            builder.json().init();
        } else {
            builder.init();
        }
        return Ok(());
    }

    if interactive {
        return Ok(());
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
