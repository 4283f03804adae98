//! Command-line argument parsing for the AY to YM converter.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use ym2149_ay_converter::ConvertConfig;

/// Parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "ay2ym", version)]
#[command(about = "Convert Project AY (ZXAY/EMUL) files into YM6 register dumps")]
pub struct CliArgs {
    /// AY file to convert
    pub input: PathBuf,

    /// JSON conversion config; flags below override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write frames sequentially instead of interleaved
    #[arg(long)]
    pub sequential: bool,

    /// Convert only this song (1-based, as listed by players)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub song: Option<u32>,

    /// Stop every render after this many frames
    #[arg(long, value_name = "FRAMES")]
    pub max_frames: Option<u32>,

    /// CPU cycles per emulation quantum
    #[arg(long, value_name = "CYCLES", value_parser = clap::value_parser!(u32).range(1..))]
    pub quantum: Option<u32>,

    /// Directory for the YM files (default: next to the input)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Log debug details
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl CliArgs {
    /// Log level selected by `-v` / `-q`.
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else if self.quiet {
            LevelFilter::Warn
        } else {
            LevelFilter::Info
        }
    }

    /// Build the conversion config: file first, then flag overrides.
    pub fn convert_config(&self) -> Result<ConvertConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => ConvertConfig::default(),
        };

        if self.sequential {
            config = config.interleaved(false);
        }
        if let Some(song) = self.song {
            config = config.song(song as usize - 1);
        }
        if let Some(frames) = self.max_frames {
            config = config.frame_limit(frames);
        }
        if let Some(cycles) = self.quantum {
            config = config.quantum_cycles(cycles);
        }
        Ok(config)
    }
}
