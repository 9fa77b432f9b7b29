use std::{env, path::PathBuf};

use aqs_sorter_core::{
    find_config_file, load_config, ConfigFileError, ConfigSource, CONFIG_ENV_VAR, CONFIG_FILENAME,
};
use clap::{Parser, Subcommand};
use slog::{o, Drain, Level, Logger};

use crate::Settings;

#[derive(Parser, Clone, Debug)]
#[command(
    author,
    version,
    about = "AQS Sorter - Finds stations with mutual parameter coverage and aligns their hourly series"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $AQS_SORTER_CONFIG, ./sorter.toml,
    /// $XDG_CONFIG_HOME/aqs-sorter/sorter.toml, /etc/aqs-sorter/sorter.toml
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "AQS_SORTER_LEVEL")]
    pub level: Option<String>,

    /// First year of the requested period
    #[arg(long, env = "AQS_SORTER_YEAR_START")]
    pub year_start: Option<i32>,

    /// Last year of the requested period (inclusive)
    #[arg(long, env = "AQS_SORTER_YEAR_END")]
    pub year_end: Option<i32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum Command {
    /// Find stations reporting every requested parameter and write the roster table
    Match {
        /// Monitor metadata table
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Roster table to write
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Align the roster's hourly observations and write the archive
    Align {
        /// Roster table to read
        #[arg(short, long)]
        roster: Option<PathBuf>,

        /// Directory holding the yearly observation files
        #[arg(long)]
        observation_dir: Option<PathBuf>,

        /// Archive directory to write
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

/// What to run, with file settings and command line merged.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub command: Command,
    pub settings: Settings,
    pub source: ConfigSource,
}

/// Load configuration from CLI args, config file, and environment
pub fn get_config_info() -> Result<RunRequest, ConfigFileError> {
    resolve_settings(Cli::parse())
}

pub fn resolve_settings(cli_args: Cli) -> Result<RunRequest, ConfigFileError> {
    let source = if let Some(ref path) = cli_args.config {
        ConfigSource::Explicit(path.into())
    } else {
        find_config_file(CONFIG_ENV_VAR, CONFIG_FILENAME)
    };

    let mut settings: Settings = load_config(&source)?;

    // CLI args override file config (env vars are handled by clap)
    settings.level = cli_args.level.or(settings.level);
    settings.year_start = cli_args.year_start.or(settings.year_start);
    settings.year_end = cli_args.year_end.or(settings.year_end);

    match &cli_args.command {
        Command::Match { metadata, output } => {
            if let Some(metadata) = metadata {
                settings.matcher.metadata_file = metadata.clone();
            }
            if let Some(output) = output {
                settings.matcher.output_file = output.clone();
            }
        }
        Command::Align {
            roster,
            observation_dir,
            output_dir,
        } => {
            if let Some(roster) = roster {
                settings.aligner.roster_file = roster.clone();
            }
            if let Some(dir) = observation_dir {
                settings.aligner.observation_dir = dir.clone();
            }
            if let Some(dir) = output_dir {
                settings.aligner.output_dir = dir.clone();
            }
        }
    }

    Ok(RunRequest {
        command: cli_args.command,
        settings,
        source,
    })
}

fn parse_level(raw: &str) -> Level {
    match raw.to_lowercase().as_str() {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "info" => Level::Info,
        "warn" => Level::Warning,
        "error" => Level::Error,
        _ => Level::Info,
    }
}

pub fn setup_logger(level: Option<&str>) -> Logger {
    let log_level = match level {
        Some(level) => parse_level(level),
        None => parse_level(&env::var("RUST_LOG").unwrap_or_default()),
    };

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = drain.filter_level(log_level).fuse();
    slog::Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}
