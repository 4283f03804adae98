//! iz80 emulator backend implementation.
//!
//! `iz80` executes instructions but the converter keeps interrupt state on its
//! own side: IFF1/IFF2, the interrupt mode and HALT are tracked by inspecting
//! the opcode about to run. HALT is never handed to `iz80`; a halted CPU
//! simply burns the rest of its quantum until the next interrupt is accepted,
//! which pushes the address after the HALT the same way a real Z80 does.

use iz80::{Cpu, Machine, Reg8, Reg16};

use super::{RegPair, Z80Bus, Z80Core};

const OP_HALT: u8 = 0x76;
const OP_DI: u8 = 0xF3;
const OP_EI: u8 = 0xFB;
const PREFIX_ED: u8 = 0xED;

/// T-states per internal NOP while halted.
const HALT_CYCLES: u64 = 4;
const IM1_VECTOR: u16 = 0x0038;

/// Adapter exposing a [`Z80Bus`] as an `iz80` machine.
struct BusAdapter<'a, B: Z80Bus> {
    bus: &'a mut B,
    pc: u16,
}

impl<B: Z80Bus> Machine for BusAdapter<'_, B> {
    fn peek(&self, address: u16) -> u8 {
        self.bus.peek(address)
    }

    fn poke(&mut self, address: u16, value: u8) {
        self.bus.poke(address, value);
    }

    fn port_in(&mut self, address: u16) -> u8 {
        self.bus.port_in(address, self.pc)
    }

    fn port_out(&mut self, address: u16, value: u8) {
        self.bus.port_out(address, value, self.pc);
    }
}

/// iz80 CPU backend.
pub struct Iz80Backend {
    cpu: Cpu,
    iff1: bool,
    iff2: bool,
    interrupt_mode: u8,
    /// EI takes effect after the following instruction.
    ei_delay: bool,
    halted: bool,
}

impl Iz80Backend {
    /// Track interrupt-related side effects of the instruction at `pc`.
    fn observe<B: Z80Bus>(&mut self, bus: &B, pc: u16) {
        self.ei_delay = false;
        match bus.peek(pc) {
            OP_DI => {
                self.iff1 = false;
                self.iff2 = false;
            }
            OP_EI => {
                self.iff1 = true;
                self.iff2 = true;
                self.ei_delay = true;
            }
            PREFIX_ED => match bus.peek(pc.wrapping_add(1)) {
                0x46 | 0x66 => self.interrupt_mode = 0,
                0x56 | 0x76 => self.interrupt_mode = 1,
                0x5E | 0x7E => self.interrupt_mode = 2,
                // RETN / RETI
                0x45 | 0x4D | 0x55 | 0x5D | 0x65 | 0x6D | 0x75 | 0x7D => self.iff1 = self.iff2,
                _ => {}
            },
            _ => {}
        }
    }

    fn step<B: Z80Bus>(&mut self, bus: &mut B) -> u64 {
        let pc = self.cpu.immutable_registers().pc();
        if bus.peek(pc) == OP_HALT {
            // HALT counts as the instruction following EI.
            self.ei_delay = false;
            self.halted = true;
            return 0;
        }
        self.observe(bus, pc);

        let before = self.cpu.cycle_count();
        let mut adapter = BusAdapter { bus, pc };
        self.cpu.execute_instruction(&mut adapter);
        self.cpu.cycle_count().saturating_sub(before)
    }

    fn push<B: Z80Bus>(&mut self, bus: &mut B, value: u16) {
        let regs = self.cpu.registers();
        let mut sp = regs.get16(Reg16::SP);
        let [hi, lo] = value.to_be_bytes();
        sp = sp.wrapping_sub(1);
        bus.poke(sp, hi);
        sp = sp.wrapping_sub(1);
        bus.poke(sp, lo);
        regs.set16(Reg16::SP, sp);
    }
}

impl Z80Core for Iz80Backend {
    fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            iff1: false,
            iff2: false,
            interrupt_mode: 0,
            ei_delay: false,
            halted: false,
        }
    }

    fn reset(&mut self) {
        *self = <Self as Z80Core>::new();
    }

    fn pc(&self) -> u16 {
        self.cpu.immutable_registers().pc()
    }

    fn set_pc(&mut self, pc: u16) {
        self.halted = false;
        self.cpu.registers().set_pc(pc);
    }

    fn set_reg16(&mut self, pair: RegPair, value: u16) {
        let reg = match pair {
            RegPair::AF => Reg16::AF,
            RegPair::BC => Reg16::BC,
            RegPair::DE => Reg16::DE,
            RegPair::HL => Reg16::HL,
            RegPair::IX => Reg16::IX,
            RegPair::IY => Reg16::IY,
            RegPair::SP => Reg16::SP,
        };
        self.cpu.registers().set16(reg, value);
    }

    fn set_i(&mut self, value: u8) {
        self.cpu.registers().set8(Reg8::I, value);
    }

    fn set_interrupts(&mut self, enabled: bool) {
        self.iff1 = enabled;
        self.iff2 = enabled;
        self.ei_delay = false;
    }

    fn interrupts_enabled(&self) -> bool {
        self.iff1 && !self.ei_delay
    }

    fn set_interrupt_mode(&mut self, mode: u8) {
        self.interrupt_mode = mode.min(2);
    }

    fn run<B: Z80Bus>(&mut self, bus: &mut B, cycles: u32) -> i64 {
        let budget = cycles as u64;
        let mut elapsed = 0u64;
        while elapsed < budget {
            if self.halted {
                let remaining = budget - elapsed;
                elapsed += remaining.div_ceil(HALT_CYCLES) * HALT_CYCLES;
                break;
            }
            let delta = self.step(bus);
            if delta == 0 && !self.halted {
                break;
            }
            elapsed += delta;
        }
        elapsed as i64
    }

    fn interrupt<B: Z80Bus>(&mut self, bus: &mut B) {
        if !self.interrupts_enabled() {
            return;
        }
        let mut ret = self.pc();
        if self.halted {
            ret = ret.wrapping_add(1);
            self.halted = false;
        }
        self.iff1 = false;
        self.iff2 = false;
        self.push(bus, ret);

        let target = if self.interrupt_mode == 2 {
            let i = self.cpu.immutable_registers().get8(Reg8::I);
            let vector = u16::from_be_bytes([i, 0xFF]);
            u16::from_le_bytes([bus.peek(vector), bus.peek(vector.wrapping_add(1))])
        } else {
            // Mode 0 with an idle (0xFF) data bus executes RST 38h.
            IM1_VECTOR
        };
        self.cpu.registers().set_pc(target);
    }
}
