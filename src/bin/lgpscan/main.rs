// SPDX-License-Identifier: Apache-2.0

use chrono::Local;
use clap::{Parser, ValueEnum};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::metadata::LevelFilter;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use lgpscan::exporters::file::build_sink;
use lgpscan::init::args::{CheckpointCommand, RunArgs};
use lgpscan::init::config::{AppConfig, DEFAULT_CONFIG_PATH};
use lgpscan::receivers::lgp::persistence::{CheckpointStore, PersistedCheckpointV0};
use lgpscan::receivers::lgp::{Result, RunCoordinator};

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Scan the day's log file once
    Run(RunArgs),

    /// Inspect or reset the stored checkpoint
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommand,
    },

    /// Return version
    Version,
}

#[derive(Debug, Parser)]
#[command(name = "lgpscan")]
#[command(bin_name = "lgpscan")]
#[command(version, about, long_about = None)]
#[command(subcommand_required = true)]
struct Arguments {
    #[arg(
        value_enum,
        long,
        global = true,
        env = "LGPSCAN_LOG_FORMAT",
        default_value = "text"
    )]
    /// Log format
    log_format: LogFormatArg,

    #[arg(long, global = true, env = "LGPSCAN_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    /// Configuration file
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let opt = Arguments::parse();

    match opt.command {
        Some(Commands::Version) => {
            println!("{}", get_version());
            ExitCode::SUCCESS
        }
        Some(Commands::Run(args)) => {
            with_config(&opt.config, &opt.log_format, |config| run_scan(config, args))
        }
        Some(Commands::Checkpoint { command }) => {
            with_config(&opt.config, &opt.log_format, |config| {
                checkpoint(config, command)
            })
        }
        None => {
            // it shouldn't be possible to get here since we mark a subcommand as
            // required
            eprintln!("ERROR: Must specify a command");
            ExitCode::from(1)
        }
    }
}

/// Load configuration, set up logging, then run `f`
fn with_config<F>(config_path: &Path, log_format: &LogFormatArg, f: F) -> ExitCode
where
    F: FnOnce(&AppConfig) -> Result<()>,
{
    let config = match AppConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured by this file, so stderr is all we have
            eprintln!("ERROR: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    let _guard = match setup_logging(
        log_format,
        config.log_output.as_deref(),
        config.log_max_files,
    ) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ERROR: failed to setup logging: {}", e);
            return ExitCode::from(1);
        }
    };

    match f(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => ExitCode::from(e.exit_code()),
    }
}

fn run_scan(config: &AppConfig, args: RunArgs) -> Result<()> {
    let today = Local::now().date_naive();
    let date = args.date.unwrap_or(today);
    let scanner_config = config.scanner_config();
    info!(
        date = %date,
        log_file = ?scanner_config.log_path_for(date),
        "Starting scan"
    );

    let sink = build_sink(scanner_config.result_format, &scanner_config.result_file);
    let mut coordinator = RunCoordinator::new(scanner_config, config.checkpoint_store(), sink);
    if date == today {
        coordinator.run(date)?;
    } else {
        coordinator.backfill(date)?;
    }

    Ok(())
}

fn checkpoint(config: &AppConfig, command: CheckpointCommand) -> Result<()> {
    let store = config.checkpoint_store();
    let result = match command {
        CheckpointCommand::Show => store.get().and_then(|checkpoint| {
            match checkpoint {
                Some(cp) => {
                    let persisted = PersistedCheckpointV0 {
                        curr_log: cp.source_id,
                        curr_row: cp.offset,
                    };
                    println!("{}", serde_json::to_string_pretty(&persisted)?);
                }
                None => println!("No checkpoint stored at {:?}", store.path()),
            }
            Ok(())
        }),
        CheckpointCommand::Reset => store.remove().map(|removed| {
            if removed {
                info!(path = ?store.path(), "Checkpoint removed");
            } else {
                info!(path = ?store.path(), "No checkpoint to remove");
            }
            if let Some(legacy) = &config.legacy_checkpoint_file {
                if legacy.exists() {
                    warn!(
                        path = ?legacy,
                        "Legacy checkpoint is still present and will be used by the next run"
                    );
                }
            }
        }),
    };

    if let Err(e) = &result {
        error!(error = %e, "Checkpoint command failed");
    }
    result
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

fn setup_logging(
    log_format: &LogFormatArg,
    log_output: Option<&Path>,
    log_max_files: usize,
) -> std::result::Result<LoggerGuard, Box<dyn Error + Send + Sync>> {
    LogTracer::init()?;

    let (non_blocking_writer, guard) = match log_output {
        Some(path) => {
            let file_name = path
                .file_name()
                .ok_or_else(|| format!("invalid log_output path: {:?}", path))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(file_name.to_string_lossy())
                .max_log_files(log_max_files)
                .build(dir)?;
            tracing_appender::non_blocking(appender)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    if *log_format == LogFormatArg::Json {
        let app_name = format!("{}-{}", env!("CARGO_PKG_NAME"), get_version());
        let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);

        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(bunyan_formatting_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        use std::io;
        use std::io::IsTerminal;

        // Skip color codes when not in a terminal
        let use_ansi = log_output.is_none() && io::stdout().is_terminal();

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_target(false)
            .with_level(true)
            .with_ansi(use_ansi)
            .compact();

        let subscriber = Registry::default().with(filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(guard)
}

fn get_version() -> String {
    // Set during CI
    let version_build = option_env!("BUILD_SHORT_SHA").unwrap_or("dev");

    format!("{}-{}", env!("CARGO_PKG_VERSION"), version_build)
}
