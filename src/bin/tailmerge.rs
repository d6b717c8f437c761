//! tailmerge CLI
//!
//! Follows one or more monitoring log directories and prints the merged,
//! time-ordered record stream to stdout until every source ends or Ctrl-C.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tailmerge::{MergeCoordinator, Record, TailMergeConfig, TypeRegistry};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One JSON object per line
    Json,
    /// Timestamp, type, and `;`-joined fields
    Text,
}

#[derive(Debug, Parser)]
#[command(name = "tailmerge", version, about = "Merge growing monitoring logs into one ordered stream")]
struct Args {
    /// Source directories, in tie-break order
    #[arg(required_unless_present = "config")]
    dirs: Vec<PathBuf>,
    /// JSON configuration file; positional directories are appended to its list
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Skip records of unknown types instead of stopping their source
    #[arg(long)]
    ignore_unknown: bool,
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
    /// Poll interval for new lines, in milliseconds
    #[arg(long)]
    poll_lines_ms: Option<u64>,
    /// Poll interval for new files, in milliseconds
    #[arg(long)]
    poll_files_ms: Option<u64>,
}

/// Environment variables:
/// - RUST_LOG: log filter (default: info)
/// - TAILMERGE_LOG_JSON: JSON log output on stderr (default: false)
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = std::env::var("TAILMERGE_LOG_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_thread_names(true),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr)
                    .with_thread_names(true)
                    .compact(),
            )
            .init();
    }
}

fn load_config(args: &Args) -> Result<TailMergeConfig, String> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            TailMergeConfig::from_json_str(&text).map_err(|e| e.to_string())?
        }
        None => TailMergeConfig::default(),
    };
    config.input_dirs.extend(args.dirs.iter().cloned());
    if args.ignore_unknown {
        config.ignore_unknown_record_types = true;
    }
    if let Some(ms) = args.poll_lines_ms {
        config.poll.new_lines_ms = ms.max(1);
    }
    if let Some(ms) = args.poll_files_ms {
        config.poll.new_files_ms = ms.max(1);
    }
    Ok(config)
}

fn write_record(out: &mut impl Write, format: OutputFormat, record: &Record) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, record)?;
            writeln!(out)
        }
        OutputFormat::Text => writeln!(out, "{record}"),
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let coordinator = MergeCoordinator::new(config, TypeRegistry::with_builtin_types());
    let state = coordinator.state();
    if let Err(e) = ctrlc::set_handler(move || {
        state.stop();
    }) {
        error!(error = %e, "Error setting Ctrl-C handler");
        return ExitCode::FAILURE;
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let format = args.format;
    let summary = coordinator.run(&mut |record: Record| {
        // A closed stdout (e.g. a finished pipe) ends the merge.
        write_record(&mut out, format, &record).and_then(|()| out.flush()).is_ok()
    });

    info!(
        sources = summary.sources_launched,
        delivered = summary.records_delivered,
        "Done"
    );
    ExitCode::SUCCESS
}
