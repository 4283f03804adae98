//! Captured PSG register frames.

use crate::error::{AyError, Result};
use crate::machine::PSG_REGISTERS;

/// One 50Hz snapshot of all PSG registers.
pub type Frame = [u8; PSG_REGISTERS];

/// Growable list of frames whose allocations never abort the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    frames: Vec<Frame>,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer pre-sized for `frames` snapshots.
    pub fn with_capacity(frames: usize) -> Result<Self> {
        let mut buffer = Self::new();
        buffer
            .frames
            .try_reserve_exact(frames)
            .map_err(|_| AyError::Allocation { frames: 0 })?;
        Ok(buffer)
    }

    /// Append a snapshot, reporting allocation failure instead of panicking.
    pub fn push(&mut self, frame: Frame) -> Result<()> {
        if self.frames.len() == self.frames.capacity() {
            let frames = self.frames.len();
            self.frames
                .try_reserve(1)
                .map_err(|_| AyError::Allocation { frames })?;
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Drop trailing frames whose registers are all zero.
    ///
    /// Calling this twice leaves the buffer unchanged the second time.
    pub fn trim_trailing_silence(&mut self) -> usize {
        let keep = self
            .frames
            .iter()
            .rposition(|frame| frame.iter().any(|&reg| reg != 0))
            .map_or(0, |last| last + 1);
        let removed = self.frames.len() - keep;
        self.frames.truncate(keep);
        removed
    }

    /// Number of captured frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame was captured.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Borrow the captured frames.
    pub fn as_slice(&self) -> &[Frame] {
        &self.frames
    }

    /// Take ownership of the captured frames.
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

impl From<Vec<Frame>> for FrameBuffer {
    fn from(frames: Vec<Frame>) -> Self {
        Self { frames }
    }
}
