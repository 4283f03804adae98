//! YM6 register-dump documents.
//!
//! [`encode_ym6`] serialises captured frames; [`parse_ym6`] reads them back.
//! Only the subset the converter emits is modelled: no digidrums are written
//! and the extra-data block is always empty.

mod reader;
mod writer;

use bitflags::bitflags;

use crate::frames::Frame;
use crate::machine::PSG_REGISTERS;

pub use reader::parse_ym6;
pub use writer::encode_ym6;

/// File magic.
pub const YM6_MAGIC: &[u8; 4] = b"YM6!";
/// Check string following the magic.
pub const YM_CHECK_STRING: &[u8; 8] = b"LeOnArD!";
/// Trailer after the frame data.
pub const YM_END_MARKER: &[u8; 4] = b"End!";
/// Size of the fixed YM6 header.
pub const YM6_HEADER_LEN: usize = 34;
/// Offset of the frame count inside the header.
pub(crate) const FRAME_COUNT_OFFSET: usize = 12;

bitflags! {
    /// YM song attributes (header bitfield)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct YmAttributes: u32 {
        /// Register stream stored register-by-register
        const INTERLEAVED = 0x01;
        /// Digidrum samples are signed
        const DRUM_SIGNED = 0x02;
        /// Digidrum samples are 4-bit packed
        const DRUM_4BIT = 0x04;
        /// Loop mode enabled
        const LOOP_MODE = 0x10;
    }
}

/// Fixed-size YM6 header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YmHeader {
    /// Number of frames in the register stream
    pub frame_count: u32,
    /// Attribute bitfield
    pub attributes: YmAttributes,
    /// Number of digidrum samples
    pub digidrum_count: u16,
    /// PSG master clock in Hz
    pub master_clock: u32,
    /// Player frequency in Hz
    pub frame_rate: u16,
    /// Frame to loop back to
    pub loop_frame: u32,
    /// Size of the skipped extra-data block
    pub extra_data_size: u16,
}

impl YmHeader {
    /// Whether frames are stored register-by-register.
    pub fn is_interleaved(&self) -> bool {
        self.attributes.contains(YmAttributes::INTERLEAVED)
    }
}

/// The three null-terminated strings of a YM file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YmMetadata {
    /// Song title
    pub title: String,
    /// Composer
    pub author: String,
    /// Free-form comment
    pub comment: String,
}

/// A complete YM6 file ready to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YmDocument {
    /// Attribute bitfield (only `INTERLEAVED` is honoured by the encoder)
    pub attributes: YmAttributes,
    /// PSG master clock in Hz
    pub master_clock: u32,
    /// Player frequency in Hz
    pub frame_rate: u16,
    /// Frame to loop back to
    pub loop_frame: u32,
    /// Title / author / comment
    pub metadata: YmMetadata,
    /// Register snapshots
    pub frames: Vec<Frame>,
}

/// Lay out frames register-by-register: all R0 values, then all R1, etc.
pub fn interleave(frames: &[Frame]) -> Vec<u8> {
    let mut stream = Vec::with_capacity(frames.len() * PSG_REGISTERS);
    for reg in 0..PSG_REGISTERS {
        stream.extend(frames.iter().map(|frame| frame[reg]));
    }
    stream
}

/// Inverse of [`interleave`]. `stream` must hold `frame_count * 16` bytes.
pub fn deinterleave(stream: &[u8], frame_count: usize) -> Vec<Frame> {
    let mut frames = vec![[0u8; PSG_REGISTERS]; frame_count];
    for (reg, column) in stream.chunks_exact(frame_count.max(1)).take(PSG_REGISTERS).enumerate() {
        for (frame, &value) in frames.iter_mut().zip(column) {
            frame[reg] = value;
        }
    }
    frames
}
