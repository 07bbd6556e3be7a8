use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use day7::{analyze, Settings, SMALL_DIR_LIMIT, SPACE_NEEDED, TOTAL_CAPACITY};
use tracing::debug;
use util::read_input_as_string;

#[derive(Debug, Clone, ValueEnum, Default)]
enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    fn to_tracing_level(&self) -> Option<tracing::Level> {
        match self {
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Silent => None,
        }
    }
}

/// Rebuilds a filesystem from a `cd`/`ls` transcript and reports directory sizes.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// Transcript to read, stdin when omitted
    input: Option<PathBuf>,

    /// Total capacity of the device
    #[arg(long, default_value_t = TOTAL_CAPACITY)]
    capacity: u64,

    /// Free space the update needs
    #[arg(long, default_value_t = SPACE_NEEDED)]
    required: u64,

    /// Largest directory counted as small
    #[arg(long, default_value_t = SMALL_DIR_LIMIT)]
    limit: u64,

    /// Print every directory with its size
    #[arg(long)]
    list_dirs: bool,

    #[arg(long, short, default_value = "warn", value_enum)]
    log_level: LogLevel,
}

impl From<&Cli> for Settings {
    fn from(cli: &Cli) -> Self {
        Settings {
            capacity: cli.capacity,
            required: cli.required,
            limit: cli.limit,
            list_dirs: cli.list_dirs,
        }
    }
}

fn setup_tracing(cli: &Cli) {
    if let Some(level) = cli.log_level.to_tracing_level() {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .without_time()
            .compact()
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(&cli);
    debug!("Parsed CLI arguments: {cli:?}");

    let input = read_input_as_string(cli.input.as_deref())?;
    let report = analyze(input.lines(), &Settings::from(&cli))?;

    println!("{report}");

    Ok(())
}
