//! Static platform detection from loaded Z80 code.
//!
//! The ZX Spectrum and the Amstrad CPC drive the same PSG through different
//! ports, so the emulator must pick one bus decoder before running anything.
//! The scan is a linear pass over each loaded block that follows immediate
//! loads into A, B and C closely enough to reconstruct the port of every
//! `OUT (C),r` and `OUT (n),A` it meets.

use crate::platform::Platform;

const OP_LD_BC_NN: u8 = 0x01;
const OP_INC_B: u8 = 0x04;
const OP_DEC_B: u8 = 0x05;
const OP_LD_B_N: u8 = 0x06;
const OP_LD_C_N: u8 = 0x0E;
const OP_LD_A_N: u8 = 0x3E;
const OP_OUT_N_A: u8 = 0xD3;
const PREFIX_ED: u8 = 0xED;

/// ULA port driving the border colour and the beeper.
const BEEPER_PORT: u8 = 0xFE;

const ZX_SELECT_PORT: u16 = 0xFFFD;
const ZX_DATA_PORT: u16 = 0xBFFD;

/// Address lines A11 / A9 / A8 choose the 8255 PPI and its port.
const CPC_PPI_MASK: u16 = 0x0B00;
const CPC_PPI_PORT_A: u16 = 0x0000;
const CPC_PPI_PORT_C: u16 = 0x0200;
/// Port high bytes at or above this value never address the PPI in practice.
const CPC_HIGH_BYTE_LIMIT: u8 = 0xF8;

/// Port-access tallies gathered from loaded code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortUsage {
    /// Writes matching ZX Spectrum AY ports.
    pub platform_a: u32,
    /// Writes matching Amstrad CPC PPI ports.
    pub platform_b: u32,
    /// Writes to the beeper port (not evidence for either platform).
    pub beeper: u32,
}

#[derive(Default)]
struct Shadow {
    a: Option<u8>,
    b: Option<u8>,
    c: Option<u8>,
}

impl Shadow {
    /// Forget every register `op` overwrites with a value the scan cannot
    /// follow. Returns the instruction length when `op` is one of those.
    fn clobber(&mut self, op: u8, sub: Option<u8>) -> Option<usize> {
        let (a, b, c, len) = match op {
            // rotates, DAA, CPL, INC/DEC A, LD A,(BC)/(DE), EX AF,AF', POP AF
            0x07 | 0x0F | 0x17 | 0x1F | 0x27 | 0x2F | 0x3C | 0x3D | 0x0A | 0x1A | 0x08
            | 0xF1 => (true, false, false, 1),
            // LD A,r / LD A,(HL), then ADD..OR (CP leaves A alone)
            0x78..=0x7E | 0x80..=0xB7 => (true, false, false, 1),
            0x3A => (true, false, false, 3),
            // ALU A,n and IN A,(n)
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xDB => (true, false, false, 2),
            0x40..=0x47 => (false, true, false, 1),
            // DJNZ
            0x10 => (false, true, false, 2),
            0x48..=0x4F | 0x0C | 0x0D => (false, false, true, 1),
            // INC/DEC BC, POP BC, EXX
            0x03 | 0x0B | 0xC1 | 0xD9 => (false, true, true, 1),
            PREFIX_ED => match sub? {
                // IN A,(C), LD A,I, LD A,R
                0x78 | 0x57 | 0x5F => (true, false, false, 2),
                0x40 => (false, true, false, 2),
                0x48 => (false, false, true, 2),
                // LD BC,(nn)
                0x4B => (false, true, true, 4),
                // block I/O decrements B
                0xA2 | 0xAA | 0xB2 | 0xBA | 0xA3 | 0xAB | 0xB3 | 0xBB => (false, true, false, 2),
                _ => return None,
            },
            _ => return None,
        };
        if a {
            self.a = None;
        }
        if b {
            self.b = None;
        }
        if c {
            self.c = None;
        }
        Some(len)
    }
}

impl PortUsage {
    /// Create an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan one loaded block and add its port accesses to the tally.
    ///
    /// Register tracking starts fresh for every block, so the final tally does
    /// not depend on the order blocks are scanned in.
    pub fn scan(&mut self, code: &[u8]) {
        let mut shadow = Shadow::default();
        let mut pc = 0usize;
        while pc < code.len() {
            let op = code[pc];
            let arg1 = code.get(pc + 1).copied();
            let arg2 = code.get(pc + 2).copied();
            pc += match (op, arg1) {
                (OP_LD_A_N, Some(n)) => {
                    shadow.a = Some(n);
                    2
                }
                (OP_LD_B_N, Some(n)) => {
                    shadow.b = Some(n);
                    2
                }
                (OP_LD_C_N, Some(n)) => {
                    shadow.c = Some(n);
                    2
                }
                (OP_LD_BC_NN, Some(lo)) if arg2.is_some() => {
                    shadow.c = Some(lo);
                    shadow.b = arg2;
                    3
                }
                (OP_INC_B, _) => {
                    shadow.b = shadow.b.map(|b| b.wrapping_add(1));
                    1
                }
                (OP_DEC_B, _) => {
                    shadow.b = shadow.b.map(|b| b.wrapping_sub(1));
                    1
                }
                (OP_OUT_N_A, Some(n)) => {
                    self.record_immediate(n, shadow.a);
                    2
                }
                (PREFIX_ED, Some(sub)) if is_out_c_r(sub) => {
                    if let Some(high) = shadow.b {
                        self.record_indirect(high, shadow.c);
                    }
                    2
                }
                (op, sub) => shadow.clobber(op, sub).unwrap_or(1),
            };
        }
    }

    fn record_indirect(&mut self, high: u8, low: Option<u8>) {
        if high == 0xFF || high == 0xBF {
            self.platform_a += 1;
            return;
        }
        let port = u16::from_be_bytes([high, low.unwrap_or(0)]);
        if high < CPC_HIGH_BYTE_LIMIT && is_cpc_psg_port(port) {
            self.platform_b += 1;
        }
    }

    fn record_immediate(&mut self, n: u8, a: Option<u8>) {
        if n == BEEPER_PORT {
            self.beeper += 1;
            return;
        }
        let Some(high) = a else {
            return;
        };
        let port = u16::from_be_bytes([high, n]);
        if port == ZX_SELECT_PORT || port == ZX_DATA_PORT {
            self.platform_a += 1;
        } else if is_cpc_psg_port(port) {
            self.platform_b += 1;
        }
    }

    /// Decide the platform, falling back to the init address when the code
    /// gave no evidence either way.
    pub fn resolve(&self, init: u16) -> Platform {
        if self.platform_a > 0 || self.platform_b > 0 {
            return if self.platform_b > self.platform_a {
                Platform::AmstradCpc
            } else {
                Platform::ZxSpectrum
            };
        }
        if self.beeper > 0 {
            // Beeper-only music has nothing for the PSG capture to record.
            return Platform::Unknown;
        }
        match init {
            0x8000..=0xFFFF => Platform::ZxSpectrum,
            0x4000..=0x7FFF => Platform::AmstradCpc,
            _ => Platform::Unknown,
        }
    }
}

fn is_out_c_r(sub: u8) -> bool {
    matches!(sub, 0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79)
}

fn is_cpc_psg_port(port: u16) -> bool {
    matches!(port & CPC_PPI_MASK, CPC_PPI_PORT_A | CPC_PPI_PORT_C)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(blocks: &[&[u8]]) -> PortUsage {
        let mut usage = PortUsage::new();
        for block in blocks {
            usage.scan(block);
        }
        usage
    }

    #[test]
    fn zx_indirect_writes() {
        // ld bc,0xfffd; out (c),a; ld b,0xbf; out (c),e
        let code = [0x01, 0xFD, 0xFF, 0xED, 0x79, 0x06, 0xBF, 0xED, 0x59];
        let usage = tally(&[&code]);
        assert_eq!(usage.platform_a, 2);
        assert_eq!(usage.platform_b, 0);
        assert_eq!(usage.resolve(0x4000), Platform::ZxSpectrum);
    }

    #[test]
    fn zx_accumulated_b_register() {
        // ld bc,0xfffd; out (c),a; dec b x64 -> 0xbf; out (c),a
        let mut code = vec![0x01, 0xFD, 0xFF, 0xED, 0x79];
        code.extend(std::iter::repeat_n(OP_DEC_B, 0x40));
        code.extend([0xED, 0x79]);
        assert_eq!(tally(&[&code]).platform_a, 2);
    }

    #[test]
    fn cpc_indirect_writes() {
        // ld b,0xf4; out (c),c; ld bc,0xf6c0; out (c),c; ld b,0xf6; out (c),0-ish
        let code = [
            0x06, 0xF4, 0xED, 0x49, 0x01, 0xC0, 0xF6, 0xED, 0x49, 0x06, 0xF6, 0xED, 0x71,
        ];
        let usage = tally(&[&code]);
        assert_eq!(usage.platform_b, 3);
        assert_eq!(usage.resolve(0xC000), Platform::AmstradCpc);
    }

    #[test]
    fn cpc_gate_array_port_is_not_psg() {
        // ld b,0x7f; out (c),c -> gate array, not the PPI
        let usage = tally(&[&[0x06, 0x7F, 0xED, 0x49]]);
        assert_eq!(usage, PortUsage::default());
    }

    #[test]
    fn immediate_ports() {
        // ld a,0xff; out (0xfd),a; ld a,0xbf; out (0xfd),a
        let zx = [0x3E, 0xFF, 0xD3, 0xFD, 0x3E, 0xBF, 0xD3, 0xFD];
        assert_eq!(tally(&[&zx]).platform_a, 2);

        // ld a,0x04; out (0x00),a; ld a,0xc2; out (0x00),a
        let cpc = [0x3E, 0x04, 0xD3, 0x00, 0x3E, 0xC2, 0xD3, 0x00];
        assert_eq!(tally(&[&cpc]).platform_b, 2);
    }

    #[test]
    fn immediate_port_without_known_accumulator_is_ignored() {
        let usage = tally(&[&[0xD3, 0xFD, 0xD3, 0x00]]);
        assert_eq!(usage, PortUsage::default());
    }

    #[test]
    fn beeper_only_is_unknown() {
        // ld a,0x10; out (0xfe),a; xor a; out (0xfe),a
        let usage = tally(&[&[0x3E, 0x10, 0xD3, 0xFE, 0xAF, 0xD3, 0xFE]]);
        assert_eq!(usage.beeper, 2);
        assert_eq!(usage.platform_a + usage.platform_b, 0);
        assert_eq!(usage.resolve(0xC000), Platform::Unknown);
    }

    #[test]
    fn tie_favours_zx() {
        let usage = PortUsage {
            platform_a: 3,
            platform_b: 3,
            beeper: 0,
        };
        assert_eq!(usage.resolve(0), Platform::ZxSpectrum);
        let usage = PortUsage {
            platform_a: 3,
            platform_b: 4,
            beeper: 9,
        };
        assert_eq!(usage.resolve(0), Platform::AmstradCpc);
    }

    #[test]
    fn init_address_fallback() {
        let usage = PortUsage::default();
        assert_eq!(usage.resolve(0xC000), Platform::ZxSpectrum);
        assert_eq!(usage.resolve(0x8000), Platform::ZxSpectrum);
        assert_eq!(usage.resolve(0x4000), Platform::AmstradCpc);
        assert_eq!(usage.resolve(0x3FFF), Platform::Unknown);
    }

    #[test]
    fn block_order_does_not_matter() {
        let first: &[u8] = &[0x01, 0xFD, 0xFF, 0xED, 0x79];
        let second: &[u8] = &[0x3E, 0x04, 0xD3, 0x00, 0x06, 0xF4, 0xED, 0x49];
        let third: &[u8] = &[0x3E, 0x10, 0xD3, 0xFE, 0xED, 0x79];
        let forward = tally(&[first, second, third]);
        let backward = tally(&[third, second, first]);
        assert_eq!(forward, backward);
        assert_eq!(forward.resolve(0x9000), backward.resolve(0x9000));
    }

    #[test]
    fn overwritten_accumulator_is_forgotten() {
        // ld a,0xff; xor a; out (0xfd),a -> port 0x00fd
        let usage = tally(&[&[0x3E, 0xFF, 0xAF, 0xD3, 0xFD]]);
        assert_eq!(usage, PortUsage::default());
        assert_eq!(usage.resolve(0x3000), Platform::Unknown);

        // ld a,0xff; ld a,(hl) / ld a,(0x1234) / in a,(0xfe) / ld a,b; out (0xfd),a
        let loads: [&[u8]; 4] = [&[0x7E], &[0x3A, 0x34, 0x12], &[0xDB, 0xFE], &[0x78]];
        for load in loads {
            let mut code = vec![0x3E, 0xFF];
            code.extend_from_slice(load);
            code.extend([0xD3, 0xFD]);
            assert_eq!(tally(&[&code]), PortUsage::default(), "{load:02x?}");
        }
    }

    #[test]
    fn overwritten_port_register_is_forgotten() {
        // ld bc,0xfffd followed by pop bc / djnz / ld b,a / in b,(c) / ld bc,(nn)
        let clobbers: [&[u8]; 5] = [
            &[0xC1],
            &[0x10, 0xFE],
            &[0x47],
            &[0xED, 0x40],
            &[0xED, 0x4B, 0x00, 0x80],
        ];
        for clobber in clobbers {
            let mut code = vec![0x01, 0xFD, 0xFF];
            code.extend_from_slice(clobber);
            code.extend([0xED, 0x79]);
            assert_eq!(tally(&[&code]), PortUsage::default(), "{clobber:02x?}");
        }

        // Reloading B after the clobber restores tracking.
        let code = [0x01, 0xFD, 0xFF, 0xC1, 0x06, 0xFF, 0xED, 0x79];
        assert_eq!(tally(&[&code]).platform_a, 1);
    }

    #[test]
    fn compare_keeps_accumulator() {
        // ld a,0xbf; cp a; out (0xfd),a
        let usage = tally(&[&[0x3E, 0xBF, 0xBF, 0xD3, 0xFD]]);
        assert_eq!(usage.platform_a, 1);
    }

    #[test]
    fn truncated_instructions_at_block_end() {
        let usage = tally(&[&[0x3E], &[0x01, 0xFD], &[0xED], &[0xD3]]);
        assert_eq!(usage, PortUsage::default());
    }
}
