//! YM6 encoder.

use super::{
    FRAME_COUNT_OFFSET, YM_CHECK_STRING, YM_END_MARKER, YM6_HEADER_LEN, YM6_MAGIC, YmAttributes,
    YmDocument, interleave,
};
use crate::machine::PSG_REGISTERS;

/// Serialise a document into an uncompressed YM6 byte stream.
///
/// The frame count is written as a placeholder and patched once the frame
/// data has been appended, so the header always matches the body.
pub fn encode_ym6(doc: &YmDocument) -> Vec<u8> {
    let meta = &doc.metadata;
    let strings_len = meta.title.len() + meta.author.len() + meta.comment.len() + 3;
    let mut out = Vec::with_capacity(
        YM6_HEADER_LEN + strings_len + doc.frames.len() * PSG_REGISTERS + YM_END_MARKER.len(),
    );

    // Only the layout bit describes what follows; drums and loops are never written.
    let attributes = doc.attributes & YmAttributes::INTERLEAVED;

    out.extend_from_slice(YM6_MAGIC);
    out.extend_from_slice(YM_CHECK_STRING);
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&attributes.bits().to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&doc.master_clock.to_be_bytes());
    out.extend_from_slice(&doc.frame_rate.to_be_bytes());
    out.extend_from_slice(&doc.loop_frame.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());

    for text in [&doc.metadata.title, &doc.metadata.author, &doc.metadata.comment] {
        write_nt_string(&mut out, text);
    }

    if attributes.contains(YmAttributes::INTERLEAVED) {
        out.extend_from_slice(&interleave(&doc.frames));
    } else {
        for frame in &doc.frames {
            out.extend_from_slice(frame);
        }
    }
    out.extend_from_slice(YM_END_MARKER);

    let frame_count = u32::try_from(doc.frames.len()).unwrap_or(u32::MAX);
    out[FRAME_COUNT_OFFSET..FRAME_COUNT_OFFSET + 4].copy_from_slice(&frame_count.to_be_bytes());
    out
}

/// Append `text` as a null-terminated string; embedded NULs would end the
/// field early, so they are dropped.
fn write_nt_string(out: &mut Vec<u8>, text: &str) {
    out.extend(text.bytes().filter(|&b| b != 0));
    out.push(0);
}
