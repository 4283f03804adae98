//! Z80 machine implementation with AY-3-8910 port bridge.
//!
//! The machine owns the 64K address space and a shadow copy of the 16 PSG
//! registers. Port writes are decoded according to the platform picked by the
//! classifier; nothing is synthesised, the driver only snapshots the shadow
//! registers once per frame.

#[cfg(feature = "trace-ports")]
use log::trace;

use crate::cpu_backend::Z80Bus;
use crate::memory::MEMORY_SIZE;
use crate::platform::Platform;

/// Number of PSG registers captured per frame.
pub const PSG_REGISTERS: usize = 16;

const ZX_PORT_MASK: u16 = 0xC002;
const ZX_REG_PORT: u16 = 0xC000;
const ZX_DATA_PORT: u16 = 0x8000;
const ZX_BEEPER_BIT: u8 = 0x10;

const CPC_PPI_MASK: u16 = 0x0B00;
const CPC_PORT_A: u16 = 0x0000;
const CPC_PORT_C: u16 = 0x0200;
const CPC_CONTROL: u16 = 0x0300;

const CPC_CMD_READ: u8 = 0b01;
const CPC_CMD_WRITE: u8 = 0b10;
const CPC_CMD_SELECT: u8 = 0b11;

/// Writable bits per PSG register on the CPC path.
const CPC_REGISTER_MASK: [u8; 14] = [
    0xFF, 0x0F, 0xFF, 0x0F, 0xFF, 0x0F, 0x1F, 0x3F, 0x1F, 0x1F, 0x1F, 0xFF, 0xFF, 0x0F,
];

/// Address of the instruction whose unmapped port access ends a render.
pub const SENTINEL_PC: u16 = 0xFFFF;

/// Memory + PSG bus implementation used by the emulation driver.
pub struct AyMachine {
    memory: [u8; MEMORY_SIZE],
    registers: [u8; PSG_REGISTERS],
    selected_register: u8,
    beeper: bool,
    cpc_data: u8,
    cpc_pending: u8,
    idle: bool,
    completed: bool,
    platform: Platform,
}

impl AyMachine {
    /// Create a machine with zeroed memory and registers.
    pub fn new(platform: Platform) -> Self {
        Self {
            memory: [0; MEMORY_SIZE],
            registers: [0; PSG_REGISTERS],
            selected_register: 0,
            beeper: false,
            cpc_data: 0,
            cpc_pending: 0,
            idle: true,
            completed: false,
            platform,
        }
    }

    /// Platform whose port decoding is active.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Switch port decoding once the classifier has decided.
    pub fn set_platform(&mut self, platform: Platform) {
        self.platform = platform;
    }

    /// Mutable access to the address space (used by the loader).
    pub fn memory_mut(&mut self) -> &mut [u8; MEMORY_SIZE] {
        &mut self.memory
    }

    /// Read-only view of the address space.
    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    /// Current PSG register shadow.
    pub fn registers(&self) -> [u8; PSG_REGISTERS] {
        self.registers
    }

    /// Currently latched register index.
    pub fn selected_register(&self) -> u8 {
        self.selected_register
    }

    /// Last value written to the beeper bit.
    pub fn beeper(&self) -> bool {
        self.beeper
    }

    /// Whether the song's code reached the completion sentinel.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether no port write happened since the last frame boundary.
    pub fn is_idle(&self) -> bool {
        self.idle
    }

    /// Start a new frame: returns whether the frame just ended saw no port
    /// writes, then re-arms the flag.
    pub fn mark_frame_boundary(&mut self) -> bool {
        std::mem::replace(&mut self.idle, true)
    }

    fn check_sentinel(&mut self, pc: u16) {
        if pc == SENTINEL_PC {
            self.completed = true;
        }
    }

    fn zx_out(&mut self, port: u16, value: u8, pc: u16) {
        if port & 1 == 0 {
            self.beeper = value & ZX_BEEPER_BIT != 0;
            return;
        }
        match port & ZX_PORT_MASK {
            ZX_REG_PORT => self.selected_register = value & 0x0F,
            ZX_DATA_PORT => self.registers[self.selected_register as usize] = value,
            _ => self.check_sentinel(pc),
        }
    }

    fn zx_in(&mut self, port: u16, pc: u16) -> u8 {
        if port & 1 == 0 {
            return u8::from(self.beeper);
        }
        match port & ZX_PORT_MASK {
            ZX_REG_PORT | ZX_DATA_PORT => self.registers[self.selected_register as usize],
            _ => {
                self.check_sentinel(pc);
                0xFF
            }
        }
    }

    fn cpc_out(&mut self, port: u16, value: u8, pc: u16) {
        match port & CPC_PPI_MASK {
            CPC_PORT_A => self.cpc_data = value,
            CPC_PORT_C => {
                let command = value >> 6;
                if command != 0 {
                    self.cpc_pending = command;
                } else {
                    self.commit_cpc_command();
                }
            }
            CPC_CONTROL => {}
            _ => self.check_sentinel(pc),
        }
    }

    fn commit_cpc_command(&mut self) {
        match std::mem::take(&mut self.cpc_pending) {
            CPC_CMD_SELECT => self.selected_register = self.cpc_data & 0x0F,
            CPC_CMD_WRITE => {
                let reg = self.selected_register as usize;
                if let Some(mask) = CPC_REGISTER_MASK.get(reg) {
                    self.registers[reg] = self.cpc_data & mask;
                }
            }
            CPC_CMD_READ => {}
            _ => {}
        }
    }

    fn cpc_in(&mut self, port: u16, pc: u16) -> u8 {
        match port & CPC_PPI_MASK {
            CPC_PORT_A => {
                // Registers 14/15 are the keyboard I/O ports: no key pressed.
                let reg = self.selected_register as usize;
                if reg < CPC_REGISTER_MASK.len() {
                    self.registers[reg]
                } else {
                    0xFF
                }
            }
            CPC_PORT_C | CPC_CONTROL => 0xFF,
            _ => {
                self.check_sentinel(pc);
                0xFF
            }
        }
    }
}

impl Z80Bus for AyMachine {
    fn peek(&self, address: u16) -> u8 {
        self.memory[address as usize]
    }

    fn poke(&mut self, address: u16, value: u8) {
        self.memory[address as usize] = value;
    }

    fn port_in(&mut self, port: u16, pc: u16) -> u8 {
        let value = match self.platform {
            Platform::AmstradCpc => self.cpc_in(port, pc),
            Platform::ZxSpectrum | Platform::Unknown => self.zx_in(port, pc),
        };
        #[cfg(feature = "trace-ports")]
        trace!("in  {port:04X} -> {value:02X} @ {pc:04X}");
        value
    }

    fn port_out(&mut self, port: u16, value: u8, pc: u16) {
        #[cfg(feature = "trace-ports")]
        trace!("out {port:04X} <- {value:02X} @ {pc:04X}");
        self.idle = false;
        match self.platform {
            Platform::AmstradCpc => self.cpc_out(port, value, pc),
            Platform::ZxSpectrum | Platform::Unknown => self.zx_out(port, value, pc),
        }
    }
}
