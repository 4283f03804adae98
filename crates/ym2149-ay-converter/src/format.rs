//! Data structures describing parsed AY files.

/// Frames assumed when a song declares no length and none can be derived
/// (five minutes at 50Hz).
pub const DEFAULT_SONG_LENGTH: u16 = 15_000;

/// Parsed AY file with header information and available songs.
#[derive(Debug, Clone)]
pub struct AyFile {
    /// Header metadata.
    pub header: AyHeader,
    /// All song entries contained in the file (`NumOfSongs + 1` of them).
    pub songs: Vec<AySong>,
}

/// AY file header metadata.
#[derive(Debug, Clone)]
pub struct AyHeader {
    /// Container format version.
    pub file_version: u8,
    /// Requested AY player version (as stored in the file).
    pub player_version: u8,
    /// Author string extracted from the file (empty when the pointer is invalid).
    pub author: String,
    /// Misc/notes string extracted from the file (empty when the pointer is invalid).
    pub misc: String,
    /// Total number of songs contained in the file (1..=256).
    pub song_count: u16,
    /// Index of the first song as stored in the header.
    pub first_song_index: u8,
}

/// AY song entry.
#[derive(Debug, Clone)]
pub struct AySong {
    /// Zero-based position inside the song structure table.
    pub index: usize,
    /// Song title, or a `Song N` placeholder when the name pointer is invalid.
    pub name: String,
    /// Song descriptor, `None` when the record could not be resolved.
    pub data: Option<AySongData>,
}

/// Metadata and memory layout for a single AY song.
#[derive(Debug, Clone)]
pub struct AySongData {
    /// Channel routing (A/B/C/Noise).
    pub channel_map: [u8; 4],
    /// Effective song length in 1/50s units (derived when the file declares 0).
    pub song_length: u16,
    /// Song length exactly as declared in the file.
    pub declared_song_length: u16,
    /// Declared fade length in 1/50s units.
    pub fade_length: u16,
    /// Common register high-byte initialization value.
    pub hi_reg: u8,
    /// Common register low-byte initialization value.
    pub lo_reg: u8,
    /// Stack/INIT/INT pointers.
    pub points: Option<AyPoints>,
    /// Address table entries in file order.
    pub blocks: Vec<AyBlock>,
}

impl AySongData {
    /// Register pair preset shared by AF, BC, DE, HL, IX and IY.
    pub fn register_preset(&self) -> u16 {
        u16::from_be_bytes([self.hi_reg, self.lo_reg])
    }

    /// Total frames to emulate (song plus fade).
    pub fn total_frames(&self) -> u32 {
        self.song_length as u32 + self.fade_length as u32
    }
}

/// Z80 register setup extracted from the Points structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AyPoints {
    /// Initial stack pointer.
    pub stack: u16,
    /// INIT routine entry point.
    pub init: u16,
    /// INTERRUPT routine entry point (0 when unused).
    pub interrupt: u16,
}

/// Address table entry: where a chunk of the file goes in Z80 memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AyBlock {
    /// Load address inside the Z80 memory map.
    pub address: u16,
    /// Length as declared in the table (clamped only when loading).
    pub length: u16,
    /// Resolved file offset of the payload, `None` when the pointer is invalid.
    pub source: Option<usize>,
}
