//! AY file parser producing structured [`AyFile`] data.
//!
//! The container mixes two pointer conventions. Header pointers are added to
//! fixed anchor offsets, while song table and song record pointers are added
//! to the position of the pointer field itself. Both paths are kept separate
//! here: [`resolve_anchored_pointer`] and [`resolve_relative_pointer`].

use log::{debug, warn};

use crate::error::{AyError, Result};
use crate::format::{
    AyBlock, AyFile, AyHeader, AyPoints, AySong, AySongData, DEFAULT_SONG_LENGTH,
};

/// Size of the fixed ZXAY header.
pub const HEADER_LEN: usize = 20;

const AUTHOR_ANCHOR: usize = 12;
const MISC_ANCHOR: usize = 14;
const SONGS_ANCHOR: usize = 18;

const SONG_ENTRY_LEN: usize = 4;
const SONG_RECORD_LEN: usize = 14;
const POINTS_LEN: usize = 6;
const BLOCK_ENTRY_LEN: usize = 6;

/// Upper bound for the song length walk over the address table.
const LENGTH_SCAN_LIMIT: usize = 15_000;
/// Minimum walk count accepted as a plausible song length.
const MIN_DERIVED_LENGTH: usize = 100;

/// Parse an AY container from raw bytes.
pub fn load_ay(data: &[u8]) -> Result<AyFile> {
    AyParser { data }.parse()
}

/// Resolve the signed big-endian offset stored at `position`, relative to
/// `position` itself.
///
/// Returns `None` when the field is truncated or the target lies outside the
/// buffer.
pub fn resolve_relative_pointer(data: &[u8], position: usize) -> Option<usize> {
    resolve_anchored_pointer(data, position, position)
}

/// Resolve the signed big-endian offset stored at `field`, relative to a
/// fixed `anchor` offset.
pub fn resolve_anchored_pointer(data: &[u8], field: usize, anchor: usize) -> Option<usize> {
    let rel = read_i16(data, field)?;
    let target = anchor as i64 + rel as i64;
    if target < 0 || target >= data.len() as i64 {
        return None;
    }
    Some(target as usize)
}

/// Derive a song length by counting non-zero 16-bit words from the address
/// table onwards.
///
/// Counts of 100 or more are adopted (saturating to `u16::MAX`); anything
/// shorter, or a missing table, falls back to [`DEFAULT_SONG_LENGTH`].
pub fn derive_song_length(data: &[u8], addresses: Option<usize>) -> u16 {
    let Some(start) = addresses else {
        return DEFAULT_SONG_LENGTH;
    };

    let mut count = 0usize;
    while let Some(word) = read_u16(data, start + count * 2) {
        if word == 0 {
            break;
        }
        count += 1;
        if count > LENGTH_SCAN_LIMIT {
            warn!("address table walk hit the {LENGTH_SCAN_LIMIT} entry limit");
            break;
        }
    }

    if count >= MIN_DERIVED_LENGTH {
        count.min(u16::MAX as usize) as u16
    } else {
        debug!("only {count} address words found, using default song length");
        DEFAULT_SONG_LENGTH
    }
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_i16(data: &[u8], offset: usize) -> Option<i16> {
    read_u16(data, offset).map(|v| v as i16)
}

struct AyParser<'a> {
    data: &'a [u8],
}

impl<'a> AyParser<'a> {
    fn parse(&self) -> Result<AyFile> {
        if self.data.len() < HEADER_LEN {
            return Err(AyError::UnexpectedEof {
                needed: HEADER_LEN,
                len: self.data.len(),
            });
        }

        if &self.data[0..4] != b"ZXAY" {
            return Err(AyError::InvalidFileId);
        }

        let type_id = &self.data[4..8];
        if type_id != b"EMUL" {
            let typ = String::from_utf8_lossy(type_id).to_string();
            return Err(AyError::UnsupportedType { typ });
        }

        let song_count = u16::from(self.data[16]) + 1;
        let author = self.read_header_string(AUTHOR_ANCHOR);
        let misc = self.read_header_string(MISC_ANCHOR);

        let header = AyHeader {
            file_version: self.data[8],
            player_version: self.data[9],
            author,
            misc,
            song_count,
            first_song_index: self.data[17],
        };
        debug!(
            "AY header: file v{} player v{} songs={} first={}",
            header.file_version, header.player_version, header.song_count, header.first_song_index
        );

        let table = resolve_anchored_pointer(self.data, SONGS_ANCHOR, SONGS_ANCHOR)
            .ok_or(AyError::SongTableOutOfRange { offset: None })?;
        let songs = self.parse_song_structures(usize::from(song_count), table)?;

        Ok(AyFile { header, songs })
    }

    fn read_header_string(&self, anchor: usize) -> String {
        match resolve_anchored_pointer(self.data, anchor, anchor) {
            Some(ptr) => self.read_nt_string(ptr),
            None => {
                warn!("invalid header string pointer at 0x{anchor:02x}");
                String::new()
            }
        }
    }

    fn parse_song_structures(&self, count: usize, table: usize) -> Result<Vec<AySong>> {
        let table_end = table + count * SONG_ENTRY_LEN;
        if table_end > self.data.len() {
            return Err(AyError::SongTableOutOfRange {
                offset: Some(table),
            });
        }

        let mut songs = Vec::with_capacity(count);
        for index in 0..count {
            let entry = table + index * SONG_ENTRY_LEN;

            let name = match resolve_relative_pointer(self.data, entry) {
                Some(ptr) => self.read_nt_string(ptr),
                None => {
                    warn!("song {index}: invalid name pointer");
                    format!("Song {}", index + 1)
                }
            };

            let data = match resolve_relative_pointer(self.data, entry + 2) {
                Some(ptr) => self.parse_song_data(index, ptr),
                None => {
                    warn!("song {index}: invalid song data pointer");
                    None
                }
            };

            songs.push(AySong { index, name, data });
        }
        Ok(songs)
    }

    fn parse_song_data(&self, index: usize, offset: usize) -> Option<AySongData> {
        let Some(record) = self.data.get(offset..offset + SONG_RECORD_LEN) else {
            warn!("song {index}: song data record truncated at 0x{offset:04x}");
            return None;
        };

        let channel_map = [record[0], record[1], record[2], record[3]];
        let declared_song_length = u16::from_be_bytes([record[4], record[5]]);
        let fade_length = u16::from_be_bytes([record[6], record[7]]);
        let hi_reg = record[8];
        let lo_reg = record[9];

        let points_ptr = resolve_relative_pointer(self.data, offset + 10);
        let addresses_ptr = resolve_relative_pointer(self.data, offset + 12);
        debug!("song {index}: points={points_ptr:04x?} addresses={addresses_ptr:04x?}");

        let song_length = if declared_song_length == 0 {
            let derived = derive_song_length(self.data, addresses_ptr);
            debug!("song {index}: derived song length {derived} frames");
            derived
        } else {
            declared_song_length
        };

        let points = points_ptr.and_then(|ptr| self.parse_points(ptr));
        if points.is_none() {
            warn!("song {index}: no valid points data");
        }

        let blocks = match addresses_ptr {
            Some(ptr) => self.parse_blocks(ptr),
            None => Vec::new(),
        };

        Some(AySongData {
            channel_map,
            song_length,
            declared_song_length,
            fade_length,
            hi_reg,
            lo_reg,
            points,
            blocks,
        })
    }

    fn parse_points(&self, offset: usize) -> Option<AyPoints> {
        let raw = self.data.get(offset..offset + POINTS_LEN)?;
        Some(AyPoints {
            stack: u16::from_be_bytes([raw[0], raw[1]]),
            init: u16::from_be_bytes([raw[2], raw[3]]),
            interrupt: u16::from_be_bytes([raw[4], raw[5]]),
        })
    }

    fn parse_blocks(&self, mut offset: usize) -> Vec<AyBlock> {
        let mut blocks = Vec::new();
        while offset + BLOCK_ENTRY_LEN <= self.data.len() {
            let raw = &self.data[offset..offset + BLOCK_ENTRY_LEN];
            let address = u16::from_be_bytes([raw[0], raw[1]]);
            if address == 0 {
                break;
            }
            blocks.push(AyBlock {
                address,
                length: u16::from_be_bytes([raw[2], raw[3]]),
                source: resolve_relative_pointer(self.data, offset + 4),
            });
            offset += BLOCK_ENTRY_LEN;
        }
        blocks
    }

    fn read_nt_string(&self, start: usize) -> String {
        let tail = self.data.get(start..).unwrap_or_default();
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        String::from_utf8_lossy(&tail[..end]).to_string()
    }
}
