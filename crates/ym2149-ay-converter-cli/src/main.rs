//! AY to YM6 conversion CLI.
//!
//! Converts every song of a Project AY file into a `.ym` register dump:
//! - `<input stem> - <song name>.ym` next to the input, or in `--output-dir`
//! - Per-song summary on stdout
//! - Exit code 0 whenever the container itself could be parsed

mod args;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::error;
use ym2149_ay_converter::{SongOutcome, SongReport, convert_path};

use args::CliArgs;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<()> {
    let config = args.convert_config()?;
    let reports = convert_path(&args.input, args.output_dir.as_deref(), &config)
        .with_context(|| format!("converting {}", args.input.display()))?;

    if reports.is_empty() {
        println!("{}: no matching songs", args.input.display());
    }
    for report in &reports {
        println!("{}", summary_line(report));
    }
    Ok(())
}

fn summary_line(report: &SongReport) -> String {
    let n = report.index + 1;
    let name = &report.name;
    match &report.outcome {
        SongOutcome::Written {
            path,
            frames,
            platform,
            ..
        } => format!("[{n}] {name}: {frames} frames ({platform}) -> {}", path.display()),
        SongOutcome::UnknownPlatform { .. } => format!("[{n}] {name}: unknown platform, skipped"),
        SongOutcome::Empty { .. } => format!("[{n}] {name}: silent, nothing written"),
        SongOutcome::Skipped { reason } => format!("[{n}] {name}: skipped ({reason})"),
        SongOutcome::Failed { error } => format!("[{n}] {name}: failed ({error})"),
    }
}
