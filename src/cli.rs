use crate::{
    config::Config,
    extractor::command::CommandExtractor,
    job::{CreateJobRequest, JobSnapshot},
    lint::{self, VideoFormat},
    orchestrator::Orchestrator,
    scoring,
    signals::VideoSignals,
    store::FileJobStore,
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "reelcheck")]
#[command(about = "Resumable short-form video analysis (extractor + lint + deterministic score)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./reelcheck.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the extractor program answers.
    Doctor {},
    /// Create a pending job from a video URL or a file reference.
    Create {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        niche: Option<String>,
    },
    /// Run at most one step of a job.
    Advance {
        #[arg(long)]
        job: String,
    },
    /// Advance a job until it completes or fails.
    Run {
        #[arg(long)]
        job: String,
        /// Defaults to orchestrator.max_advances_per_run.
        #[arg(long)]
        max_advances: Option<u32>,
    },
    Status {
        #[arg(long)]
        job: String,
    },
    /// Put a failed job back to pending at the step that failed.
    Retry {
        #[arg(long)]
        job: String,
    },
    /// Score a signals JSON file offline.
    Score {
        #[arg(long)]
        signals: PathBuf,
        #[arg(long)]
        niche: Option<String>,
    },
    /// Lint a signals JSON file (and optional transcript) offline.
    Lint {
        #[arg(long)]
        signals: PathBuf,
        #[arg(long)]
        format: String,
        #[arg(long)]
        transcript: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Create { url, file, niche } => {
            let req = CreateJobRequest {
                video_url: url.clone(),
                file_reference: file.clone(),
                niche: niche.clone(),
            };
            let snap = orchestrator(&cfg)?.create(&req)?;
            print_snapshot(&cfg, &snap)
        }
        Command::Advance { job } => {
            let snap = orchestrator(&cfg)?.advance(job)?;
            print_snapshot(&cfg, &snap)
        }
        Command::Run { job, max_advances } => {
            let max = max_advances.unwrap_or(cfg.orchestrator.max_advances_per_run);
            let snap = orchestrator(&cfg)?.run_to_completion(job, max)?;
            print_snapshot(&cfg, &snap)
        }
        Command::Status { job } => {
            let snap = orchestrator(&cfg)?.snapshot(job)?;
            print_json(&snap)
        }
        Command::Retry { job } => {
            let snap = orchestrator(&cfg)?.reset(job)?;
            print_snapshot(&cfg, &snap)
        }
        Command::Score { signals, niche } => score(&cfg, signals, niche.as_deref()),
        Command::Lint {
            signals,
            format,
            transcript,
        } => lint_file(signals, format, transcript.as_deref()),
    }
}

fn load_config(user: Option<&Path>) -> Result<Config> {
    if let Some(p) = user {
        return Config::load(p);
    }
    for candidate in ["reelcheck.toml", "reelcheck.example.toml"] {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Config::load(&path);
        }
    }
    Ok(Config::default())
}

fn init_logging(
    args: &Args,
    cfg: &Config,
    file_path: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let filter = match args.log_level.as_deref() {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(cfg.logging.level.as_str())),
    };

    // stdout carries the JSON results; logs go to stderr.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn orchestrator(cfg: &Config) -> Result<Orchestrator<CommandExtractor, FileJobStore>> {
    let extractor = CommandExtractor::new(cfg)?;
    let store = FileJobStore::open(&cfg.paths.jobs_dir)?;
    debug!("job store at {}", store.dir().display());
    Ok(Orchestrator::new(cfg, extractor, store))
}

fn doctor(cfg: &Config) -> Result<()> {
    let extractor = CommandExtractor::new(cfg)?;
    let diag = extractor.doctor()?;
    let weights = scoring::weight_tables();
    print_json(&serde_json::json!({
        "extractor": diag,
        "jobs_dir": cfg.paths.jobs_dir,
        "scoring_version": scoring::SCORING_VERSION,
        "weight_tables": weights.len(),
        "lint_rules": VideoFormat::ALL
            .iter()
            .map(|f| (f.as_str(), lint::rules_for(*f)))
            .collect::<std::collections::BTreeMap<_, _>>(),
    }))
}

fn score(cfg: &Config, signals: &Path, niche: Option<&str>) -> Result<()> {
    let signals = read_signals(signals)?;
    let default_niche = cfg.scoring.default_niche.as_str();
    let niche = niche.or_else(|| Some(default_niche).filter(|n| !n.is_empty()));
    let breakdown = scoring::score(&signals, niche)?;
    info!(overall = breakdown.overall, niche = %breakdown.niche, "scored");
    print_json(&breakdown)
}

fn lint_file(signals: &Path, format: &str, transcript: Option<&Path>) -> Result<()> {
    let signals = read_signals(signals)?;
    let format: VideoFormat = format.parse()?;
    let transcript = match transcript {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("reading transcript: {}", p.display()))?,
        None => String::new(),
    };
    let result = lint::lint(&signals, &transcript, format)?;
    info!(
        score = result.score,
        errors = result.errors,
        warnings = result.warnings,
        "linted"
    );
    print_json(&result)
}

fn read_signals(path: &Path) -> Result<VideoSignals> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading signals: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing signals JSON: {}", path.display()))
}

fn print_snapshot(cfg: &Config, snap: &JobSnapshot) -> Result<()> {
    if cfg.global.print_summary {
        print_json(snap)
    } else {
        println!(
            "{} {} {}/{}",
            snap.job_id, snap.status, snap.current_step, snap.total_steps
        );
        Ok(())
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(PathBuf::from(&cfg.paths.jobs_dir).join("reelcheck.log"))
}
