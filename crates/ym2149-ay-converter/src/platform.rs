//! Target hardware platforms and their clock constants.

use std::fmt;

/// Emulated video frame rate (PAL).
pub const FRAME_RATE: u16 = 50;

/// Hardware platform whose port conventions the song's code follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// No reliable evidence; the song is not rendered.
    Unknown,
    /// ZX Spectrum 128 (AY on ports 0xFFFD / 0xBFFD).
    ZxSpectrum,
    /// Amstrad CPC (AY behind the 8255 PPI on ports 0xF4xx / 0xF6xx).
    AmstradCpc,
}

impl Platform {
    /// Z80 clock in Hz.
    pub fn cpu_clock(self) -> u32 {
        match self {
            Platform::ZxSpectrum | Platform::Unknown => 3_500_000,
            Platform::AmstradCpc => 4_000_000,
        }
    }

    /// PSG master clock written to the YM header.
    pub fn psg_clock(self) -> u32 {
        match self {
            Platform::ZxSpectrum | Platform::Unknown => 1_773_400,
            Platform::AmstradCpc => 1_000_000,
        }
    }

    /// CPU cycles per emulated frame.
    pub fn frame_cycles(self) -> u64 {
        (self.cpu_clock() / FRAME_RATE as u32) as u64
    }

    /// Short display name.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Unknown => "unknown",
            Platform::ZxSpectrum => "zx-spectrum",
            Platform::AmstradCpc => "amstrad-cpc",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
