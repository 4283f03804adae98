//! AY to YM6 conversion.
//!
//! This crate turns Project AY (`.ay`, ZXAY/EMUL) files into YM6 register
//! dumps by running each song's embedded Z80 player and recording the PSG
//! registers once per 50Hz frame:
//! - Robust parser that understands the ZXAY/EMUL container format
//! - Static platform detection (ZX Spectrum or Amstrad CPC) from the loaded code
//! - Cycle-budgeted emulation through a pluggable Z80 backend (`iz80` by default)
//! - YM6 encoder and reader (interleaved or sequential frame layout)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use ym2149_ay_converter::{ConvertConfig, SongOutcome, convert_path};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConvertConfig::default().frame_limit(3_000);
//! for report in convert_path(Path::new("tune.ay"), None, &config)? {
//!     if let SongOutcome::Written { path, frames, .. } = report.outcome {
//!         println!("{}: {frames} frames", path.display());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod classifier;
pub mod config;
pub mod convert;
pub mod cpu_backend;
pub mod driver;
pub mod error;
pub mod format;
pub mod frames;
pub mod machine;
pub mod memory;
mod parser;
pub mod platform;
pub mod ym;

pub use crate::classifier::PortUsage;
pub use crate::config::ConvertConfig;
pub use crate::convert::{
    DirectoryNaming, OutputNaming, SongOutcome, SongReport, convert_file, convert_file_with,
    convert_path, sanitize_file_name,
};
pub use crate::cpu_backend::{DefaultCpu, Iz80Backend, RegPair, Z80Bus, Z80Core};
pub use crate::driver::{
    DriverState, EmulationDriver, Render, RenderReport, RenderSetup, StopReason,
};
pub use crate::error::{AyError, Result};
pub use crate::format::{
    AyBlock, AyFile, AyHeader, AyPoints, AySong, AySongData, DEFAULT_SONG_LENGTH,
};
pub use crate::frames::{Frame, FrameBuffer};
pub use crate::machine::AyMachine;
pub use crate::parser::{derive_song_length, load_ay, resolve_relative_pointer};
pub use crate::platform::Platform;
pub use crate::ym::{YmAttributes, YmDocument, YmHeader, YmMetadata, encode_ym6, parse_ym6};
