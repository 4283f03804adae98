//! YM6 decoder for uncompressed files.

use super::{
    YM_CHECK_STRING, YM_END_MARKER, YM6_HEADER_LEN, YM6_MAGIC, YmAttributes, YmHeader,
    YmMetadata, deinterleave,
};
use crate::error::{AyError, Result};
use crate::frames::Frame;
use crate::machine::PSG_REGISTERS;

/// Parse an uncompressed YM6 file into header, metadata and frames.
///
/// Digidrum samples and the extra-data block are skipped. The `End!` trailer
/// must directly follow the frame data.
pub fn parse_ym6(data: &[u8]) -> Result<(YmHeader, YmMetadata, Vec<Frame>)> {
    let header = parse_header(data)?;
    let mut offset = YM6_HEADER_LEN;

    offset = skip_digidrums(data, offset, header.digidrum_count)?;
    offset = offset
        .checked_add(header.extra_data_size as usize)
        .filter(|&end| end <= data.len())
        .ok_or("YM6 truncated in extra data section")?;

    let mut strings = [String::new(), String::new(), String::new()];
    for text in strings.iter_mut() {
        let (value, next) = read_nt_string(data, offset)?;
        *text = value;
        offset = next;
    }
    let [title, author, comment] = strings;

    let frame_count = header.frame_count as usize;
    let body_len = frame_count
        .checked_mul(PSG_REGISTERS)
        .ok_or("YM6 frame data size overflow")?;
    let body = data
        .get(offset..offset + body_len)
        .ok_or("YM6 truncated in frame data")?;
    offset += body_len;

    let frames = if header.is_interleaved() {
        deinterleave(body, frame_count)
    } else {
        body.chunks_exact(PSG_REGISTERS)
            .map(|chunk| {
                let mut frame = [0u8; PSG_REGISTERS];
                frame.copy_from_slice(chunk);
                frame
            })
            .collect()
    };

    if data.get(offset..offset + YM_END_MARKER.len()) != Some(YM_END_MARKER.as_slice()) {
        return Err("YM6 missing End! marker".into());
    }

    Ok((header, YmMetadata { title, author, comment }, frames))
}

fn parse_header(data: &[u8]) -> Result<YmHeader> {
    if data.len() < YM6_HEADER_LEN {
        return Err("YM6 file too small for header".into());
    }
    if &data[0..4] != YM6_MAGIC {
        return Err("Invalid YM6 magic".into());
    }
    if &data[4..12] != YM_CHECK_STRING {
        return Err("Invalid YM6 signature".into());
    }

    Ok(YmHeader {
        frame_count: be_u32(data, 12),
        attributes: YmAttributes::from_bits_truncate(be_u32(data, 16)),
        digidrum_count: be_u16(data, 20),
        master_clock: be_u32(data, 22),
        frame_rate: be_u16(data, 26),
        loop_frame: be_u32(data, 28),
        extra_data_size: be_u16(data, 32),
    })
}

fn skip_digidrums(data: &[u8], mut offset: usize, count: u16) -> Result<usize> {
    for _ in 0..count {
        let size = data
            .get(offset..offset + 4)
            .ok_or("YM6 truncated in digidrum size header")?;
        let size = u32::from_be_bytes([size[0], size[1], size[2], size[3]]) as usize;
        offset = (offset + 4)
            .checked_add(size)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| AyError::from("YM6 truncated in digidrum data"))?;
    }
    Ok(offset)
}

fn read_nt_string(data: &[u8], offset: usize) -> Result<(String, usize)> {
    let rest = data.get(offset..).ok_or("YM6 truncated in metadata")?;
    let len = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or("YM6 metadata string not terminated")?;
    let text = String::from_utf8_lossy(&rest[..len]).into_owned();
    Ok((text, offset + len + 1))
}

fn be_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn be_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}
