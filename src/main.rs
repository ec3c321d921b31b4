//! `efm`: walk a folder of e-books and run actions on every EPUB and PDF.

use clap::Parser;
use ebookfoldermanager::{process_folder, ActionKind, RunOptions};
use std::path::PathBuf;
use std::process::ExitCode;

/// Run efm on a folder. Walks it recursively and performs all actions you
/// specify. Without actions, uses the closest efm.(toml|yaml|yml|json), else
/// prints metadata.
#[derive(Parser, Debug)]
#[command(name = "efm", version, about)]
struct Cli {
    /// Folder to process
    folder: PathBuf,

    /// Actions to perform
    #[arg(value_enum)]
    actions: Vec<ActionKind>,

    /// Print what each action would do without actually doing it
    #[arg(long)]
    dry: bool,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    loglevel: log::LevelFilter,

    /// Path to an Adobe key file for removing Adobe DRM
    #[arg(long)]
    adobekey: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.loglevel)
        .parse_default_env()
        .init();

    let options = RunOptions {
        dry_run: cli.dry,
        actions: (!cli.actions.is_empty()).then_some(cli.actions),
        adobe_key_file: cli.adobekey,
    };

    match process_folder(&cli.folder, &options) {
        Ok(report) if report.is_success() => {
            log::info!(
                "Processed {} books, {} changed.",
                report.processed,
                report.changed.len()
            );
            ExitCode::SUCCESS
        }
        Ok(report) => {
            log::error!(
                "{} of {} books failed.",
                report.failed.len(),
                report.processed
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
