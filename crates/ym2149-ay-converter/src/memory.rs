//! Z80 address space setup for an AY song.
//!
//! Memory layout (before blocks are loaded):
//! - 0x0000 - 0x00FF: RET, with the bootstrap trampoline at 0x0000 and EI at 0x0038
//! - 0x0100 - 0x3FFF: RST 38h
//! - 0x4000 - 0xFFFF: zero

use log::{debug, warn};

use crate::classifier::PortUsage;
use crate::format::{AyBlock, AyPoints};

/// Size of the Z80 address space.
pub const MEMORY_SIZE: usize = 0x1_0000;

const OP_RET: u8 = 0xC9;
const OP_RST_38: u8 = 0xFF;
const OP_EI: u8 = 0xFB;
const IM1_VECTOR: usize = 0x0038;

/// di; call init; loop: im 2; ei; halt; jr loop
const TRAMPOLINE_NO_INTERRUPT: [u8; 10] = [0xF3, 0xCD, 0, 0, 0xED, 0x5E, 0xFB, 0x76, 0x18, 0xFA];

/// di; call init; loop: im 1; ei; halt; call interrupt; jr loop
const TRAMPOLINE_WITH_INTERRUPT: [u8; 13] = [
    0xF3, 0xCD, 0, 0, 0xED, 0x56, 0xFB, 0x76, 0xCD, 0, 0, 0x18, 0xF7,
];

const INIT_PATCH_OFFSET: usize = 2;
const INTERRUPT_PATCH_OFFSET: usize = 9;

/// Result of copying a song's address table into memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Blocks copied (possibly truncated).
    pub loaded: usize,
    /// Blocks whose length had to be clamped.
    pub clamped: usize,
    /// Loading stopped early on a block that clamped to nothing.
    pub halted: bool,
}

/// Fill the address space with the RET / RST 38h / zero bands.
pub fn reset_layout(memory: &mut [u8; MEMORY_SIZE]) {
    memory[..=0x00FF].fill(OP_RET);
    memory[0x0100..=0x3FFF].fill(OP_RST_38);
    memory[0x4000..].fill(0x00);
    memory[IM1_VECTOR] = OP_EI;
}

/// Install the bootstrap code at address 0 that calls INIT once and then
/// either idles on HALT or calls the INTERRUPT routine once per frame.
pub fn install_trampoline(memory: &mut [u8; MEMORY_SIZE], points: &AyPoints) {
    if points.interrupt == 0 {
        memory[..TRAMPOLINE_NO_INTERRUPT.len()].copy_from_slice(&TRAMPOLINE_NO_INTERRUPT);
    } else {
        memory[..TRAMPOLINE_WITH_INTERRUPT.len()].copy_from_slice(&TRAMPOLINE_WITH_INTERRUPT);
        patch_word(memory, INTERRUPT_PATCH_OFFSET, points.interrupt);
    }
    patch_word(memory, INIT_PATCH_OFFSET, points.init);
}

fn patch_word(memory: &mut [u8; MEMORY_SIZE], offset: usize, value: u16) {
    memory[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Copy address table entries from `file` into memory, clamping each block to
/// the address space and to the file.
///
/// Every copied slice is also fed to `usage` so the classifier sees exactly
/// the bytes that ended up in memory. A block that clamps to zero bytes stops
/// loading for the rest of the table.
pub fn load_blocks(
    memory: &mut [u8; MEMORY_SIZE],
    file: &[u8],
    blocks: &[AyBlock],
    usage: &mut PortUsage,
) -> LoadSummary {
    let mut summary = LoadSummary::default();
    for block in blocks {
        let start = block.address as usize;
        let Some(source) = block.source else {
            warn!("block at 0x{start:04x}: invalid data pointer, stop loading");
            summary.halted = true;
            break;
        };

        let mut length = block.length as usize;
        if start + length > MEMORY_SIZE {
            length = MEMORY_SIZE - start;
        }
        if source + length > file.len() {
            length = file.len().saturating_sub(source);
        }
        if length != block.length as usize {
            warn!(
                "block at 0x{start:04x}: length 0x{:04x} clamped to 0x{length:04x}",
                block.length
            );
            summary.clamped += 1;
        }
        if length == 0 {
            warn!("block at 0x{start:04x}: nothing left to load, stop loading");
            summary.halted = true;
            break;
        }

        let payload = &file[source..source + length];
        memory[start..start + length].copy_from_slice(payload);
        usage.scan(payload);
        debug!("loaded block 0x{start:04x}+0x{length:04x} from file offset 0x{source:04x}");
        summary.loaded += 1;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Box<[u8; MEMORY_SIZE]> {
        let mut memory = Box::new([0u8; MEMORY_SIZE]);
        reset_layout(&mut memory);
        memory
    }

    #[test]
    fn layout_bands() {
        let memory = fresh();
        assert_eq!(memory[0x0000], OP_RET);
        assert_eq!(memory[0x0037], OP_RET);
        assert_eq!(memory[0x0038], OP_EI);
        assert_eq!(memory[0x00FF], OP_RET);
        assert_eq!(memory[0x0100], OP_RST_38);
        assert_eq!(memory[0x3FFF], OP_RST_38);
        assert_eq!(memory[0x4000], 0);
        assert_eq!(memory[0xFFFF], 0);
    }

    #[test]
    fn trampoline_without_interrupt() {
        let mut memory = fresh();
        let points = AyPoints {
            stack: 0xF000,
            init: 0xC123,
            interrupt: 0,
        };
        install_trampoline(&mut memory, &points);
        assert_eq!(
            &memory[..10],
            &[0xF3, 0xCD, 0x23, 0xC1, 0xED, 0x5E, 0xFB, 0x76, 0x18, 0xFA]
        );
    }

    #[test]
    fn trampoline_with_interrupt() {
        let mut memory = fresh();
        let points = AyPoints {
            stack: 0xF000,
            init: 0x8000,
            interrupt: 0x80AB,
        };
        install_trampoline(&mut memory, &points);
        assert_eq!(&memory[2..4], &[0x00, 0x80]);
        assert_eq!(&memory[8..11], &[0xCD, 0xAB, 0x80]);
        assert_eq!(&memory[11..13], &[0x18, 0xF7]);
    }

    #[test]
    fn copies_blocks_and_scans_them() {
        let mut memory = fresh();
        let file = [0u8, 0x3E, 0xFF, 0xD3, 0xFD, 0xC9];
        let blocks = [AyBlock {
            address: 0x8000,
            length: 5,
            source: Some(1),
        }];
        let mut usage = PortUsage::new();
        let summary = load_blocks(&mut memory, &file, &blocks, &mut usage);
        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.clamped, 0);
        assert_eq!(&memory[0x8000..0x8005], &file[1..6]);
        assert_eq!(usage.platform_a, 1);
    }

    #[test]
    fn clamps_to_address_space_and_file() {
        let mut memory = fresh();
        let file: Vec<u8> = (0..64u8).collect();
        let blocks = [
            AyBlock {
                address: 0xFFF0,
                length: 0x0100,
                source: Some(0),
            },
            AyBlock {
                address: 0x9000,
                length: 0xFFFF,
                source: Some(60),
            },
        ];
        let summary = load_blocks(&mut memory, &file, &blocks, &mut PortUsage::new());
        assert_eq!(summary.loaded, 2);
        assert_eq!(summary.clamped, 2);
        assert_eq!(&memory[0xFFF0..], &file[..16]);
        assert_eq!(&memory[0x9000..0x9004], &file[60..64]);
        assert_eq!(memory[0x9004], 0);
    }

    #[test]
    fn adversarial_lengths_never_escape_bounds() {
        let file = vec![0xAAu8; 300];
        for address in [0x4000u16, 0x8000, 0xFF00, 0xFFFF] {
            for length in [0u16, 1, 255, 256, 0x7FFF, 0xFFFF] {
                for source in [0usize, 150, 299] {
                    let mut memory = fresh();
                    let blocks = [AyBlock {
                        address,
                        length,
                        source: Some(source),
                    }];
                    // Slicing panics on any out-of-range access.
                    let summary = load_blocks(&mut memory, &file, &blocks, &mut PortUsage::new());
                    assert!(summary.loaded <= 1);
                }
            }
        }
    }

    #[test]
    fn zero_length_stops_remaining_blocks() {
        let mut memory = fresh();
        let file = [1u8, 2, 3, 4];
        let blocks = [
            AyBlock {
                address: 0x8000,
                length: 2,
                source: Some(0),
            },
            AyBlock {
                address: 0x8100,
                length: 0,
                source: Some(0),
            },
            AyBlock {
                address: 0x8200,
                length: 2,
                source: Some(2),
            },
        ];
        let summary = load_blocks(&mut memory, &file, &blocks, &mut PortUsage::new());
        assert_eq!(summary.loaded, 1);
        assert!(summary.halted);
        assert_eq!(memory[0x8200], 0);
    }

    #[test]
    fn invalid_source_stops_loading() {
        let mut memory = fresh();
        let blocks = [AyBlock {
            address: 0x8000,
            length: 4,
            source: None,
        }];
        let summary = load_blocks(&mut memory, &[0u8; 8], &blocks, &mut PortUsage::new());
        assert_eq!(summary.loaded, 0);
        assert!(summary.halted);
    }
}
