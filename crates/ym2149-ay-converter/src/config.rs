//! Conversion options.

use serde::{Deserialize, Serialize};

/// Attribution stored in the YM comment field unless overridden.
pub const DEFAULT_COMMENT: &str = "Converted from AY by ym2149-ay-converter";

/// Default CPU quantum in T-states between frame-boundary checks.
pub const DEFAULT_QUANTUM_CYCLES: u32 = 100;

/// Conversion configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Store frames register-by-register (YM interleaved layout, default: true)
    pub interleaved: bool,
    /// CPU cycles executed between frame-boundary checks (default: 100)
    pub quantum_cycles: u32,
    /// Upper bound on rendered frames per song (default: song + fade length)
    pub frame_limit: Option<u32>,
    /// Comment written into every YM file
    pub comment: String,
    /// Zero-based song to convert (default: all songs)
    pub song: Option<usize>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            interleaved: true,
            quantum_cycles: DEFAULT_QUANTUM_CYCLES,
            frame_limit: None,
            comment: DEFAULT_COMMENT.to_string(),
            song: None,
        }
    }
}

impl ConvertConfig {
    /// Create config writing sequential (non-interleaved) frames
    pub fn sequential() -> Self {
        Self {
            interleaved: false,
            ..Default::default()
        }
    }

    /// Choose the frame layout
    pub fn interleaved(mut self, enable: bool) -> Self {
        self.interleaved = enable;
        self
    }

    /// Set the CPU quantum (clamped to at least one cycle)
    pub fn quantum_cycles(mut self, cycles: u32) -> Self {
        self.quantum_cycles = cycles.max(1);
        self
    }

    /// Cap the number of rendered frames per song
    pub fn frame_limit(mut self, frames: u32) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Replace the comment field
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Convert a single song only
    pub fn song(mut self, index: usize) -> Self {
        self.song = Some(index);
        self
    }

    /// Whether the song at `index` is selected for conversion
    pub fn selects(&self, index: usize) -> bool {
        self.song.is_none_or(|wanted| wanted == index)
    }
}
