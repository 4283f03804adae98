//! Abstraction layer for the Z80 CPU backend.
//!
//! The converter only needs a narrow slice of a Z80 core: register setup,
//! "run about N cycles", interrupt delivery, and bus callbacks. Any core that
//! implements [`Z80Core`] can drive a render; the default is [`Iz80Backend`].

mod iz80_impl;

pub use iz80_impl::Iz80Backend;

/// Default CPU backend type alias.
pub type DefaultCpu = Iz80Backend;

/// 16-bit register pairs the converter initializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegPair {
    /// Accumulator and flags.
    AF,
    /// BC pair (also the port address for `OUT (C),r`).
    BC,
    /// DE pair.
    DE,
    /// HL pair.
    HL,
    /// IX index register.
    IX,
    /// IY index register.
    IY,
    /// Stack pointer.
    SP,
}

/// Memory and I/O interface seen by the CPU.
///
/// Port callbacks receive the address of the instruction performing the
/// access so the bus can recognise the completion sentinel.
pub trait Z80Bus {
    /// Read a byte from memory.
    fn peek(&self, address: u16) -> u8;

    /// Write a byte to memory.
    fn poke(&mut self, address: u16, value: u8);

    /// Read from an I/O port.
    fn port_in(&mut self, port: u16, pc: u16) -> u8;

    /// Write to an I/O port.
    fn port_out(&mut self, port: u16, value: u8, pc: u16);
}

/// Unified Z80 CPU interface.
pub trait Z80Core {
    /// Create a new CPU instance in reset state.
    fn new() -> Self;

    /// Power-on reset.
    fn reset(&mut self);

    /// Get the program counter.
    fn pc(&self) -> u16;

    /// Set the program counter.
    fn set_pc(&mut self, pc: u16);

    /// Set a 16-bit register pair.
    fn set_reg16(&mut self, pair: RegPair, value: u16);

    /// Set the interrupt vector base register.
    fn set_i(&mut self, value: u8);

    /// Set both interrupt-enable flip-flops.
    fn set_interrupts(&mut self, enabled: bool);

    /// Whether IFF1 is set, i.e. a maskable interrupt would be accepted.
    fn interrupts_enabled(&self) -> bool;

    /// Select interrupt mode 0, 1 or 2.
    fn set_interrupt_mode(&mut self, mode: u8);

    /// Execute at least `cycles` T-states (finishing the current instruction)
    /// and return the number actually elapsed. A value of zero or below means
    /// the core cannot make progress.
    fn run<B: Z80Bus>(&mut self, bus: &mut B, cycles: u32) -> i64;

    /// Raise a maskable interrupt and let the core accept it.
    fn interrupt<B: Z80Bus>(&mut self, bus: &mut B);
}
