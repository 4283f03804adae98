//! Frame-accurate emulation loop.
//!
//! The driver runs the CPU in small quanta and, whenever the cycle counter
//! passes a frame boundary, delivers the 50Hz interrupt and snapshots the PSG
//! registers. A single long quantum crossing several boundaries produces one
//! snapshot per boundary.

use log::debug;

use crate::config::ConvertConfig;
use crate::cpu_backend::{RegPair, Z80Core};
use crate::error::Result;
use crate::format::{AyPoints, AySongData};
use crate::frames::FrameBuffer;
use crate::machine::AyMachine;

/// Interrupt vector base loaded before INIT runs.
const INITIAL_I: u8 = 3;

/// Why a render stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The song + fade cycle budget was used up.
    BudgetExhausted,
    /// The song's code reached the completion sentinel.
    Completed,
    /// The CPU reported no progress.
    CpuStalled,
}

/// Driver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// CPU not yet set up.
    Init,
    /// Executing quanta.
    Running,
    /// At least one frame threshold has been crossed.
    FrameBoundary,
    /// Render finished.
    Terminated(StopReason),
}

/// Per-song render parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSetup {
    /// Stack / INIT / INTERRUPT addresses.
    pub points: AyPoints,
    /// Value loaded into AF, BC, DE, HL, IX and IY.
    pub register_preset: u16,
    /// Maximum number of frames to render.
    pub frames: u32,
    /// Cycles per CPU quantum.
    pub quantum_cycles: u32,
}

impl RenderSetup {
    /// Derive the setup for one song.
    pub fn new(song: &AySongData, points: AyPoints, config: &ConvertConfig) -> Self {
        let mut frames = song.total_frames();
        if let Some(limit) = config.frame_limit {
            frames = frames.min(limit);
        }
        Self {
            points,
            register_preset: song.register_preset(),
            frames,
            quantum_cycles: config.quantum_cycles.max(1),
        }
    }
}

/// Summary of a finished render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderReport {
    /// Frames captured (before silence trimming).
    pub frames: usize,
    /// CPU cycles executed.
    pub cycles: u64,
    /// Why the render stopped.
    pub stop: StopReason,
    /// Frames during which the song's code wrote no port at all.
    pub idle_frames: usize,
}

/// Captured frames plus the report.
#[derive(Debug, Clone)]
pub struct Render {
    /// Register snapshots, one per frame.
    pub frames: FrameBuffer,
    /// Render summary.
    pub report: RenderReport,
}

/// Drives a [`Z80Core`] against an [`AyMachine`] and collects frames.
pub struct EmulationDriver<C: Z80Core> {
    cpu: C,
    setup: RenderSetup,
    state: DriverState,
    frame_cycles: u64,
    budget: u64,
    cycles: u64,
    next_frame: u64,
    frames: FrameBuffer,
    idle_frames: usize,
}

impl<C: Z80Core> EmulationDriver<C> {
    /// Create a driver for `machine`'s platform.
    pub fn new(cpu: C, machine: &AyMachine, setup: RenderSetup) -> Result<Self> {
        let frame_cycles = machine.platform().frame_cycles();
        Ok(Self {
            cpu,
            setup,
            state: DriverState::Init,
            frame_cycles,
            budget: setup.frames as u64 * frame_cycles,
            cycles: 0,
            next_frame: frame_cycles,
            frames: FrameBuffer::with_capacity(setup.frames as usize)?,
            idle_frames: 0,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// CPU cycles executed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Frames captured so far.
    pub fn frames(&self) -> &FrameBuffer {
        &self.frames
    }

    /// Advance the state machine by one transition.
    pub fn step(&mut self, machine: &mut AyMachine) -> Result<DriverState> {
        self.state = match self.state {
            DriverState::Init => {
                self.init_cpu();
                DriverState::Running
            }
            DriverState::Running => self.run_quantum(machine),
            DriverState::FrameBoundary => {
                self.capture_frames(machine)?;
                DriverState::Running
            }
            done @ DriverState::Terminated(_) => done,
        };
        Ok(self.state)
    }

    /// Run until the render terminates.
    pub fn run(mut self, machine: &mut AyMachine) -> Result<Render> {
        let stop = loop {
            if let DriverState::Terminated(reason) = self.step(machine)? {
                break reason;
            }
        };
        debug!(
            "render stopped ({stop:?}) after {} frames / {} cycles",
            self.frames.len(),
            self.cycles
        );
        let report = RenderReport {
            frames: self.frames.len(),
            cycles: self.cycles,
            stop,
            idle_frames: self.idle_frames,
        };
        Ok(Render {
            frames: self.frames,
            report,
        })
    }

    fn init_cpu(&mut self) {
        let preset = self.setup.register_preset;
        self.cpu.reset();
        self.cpu.set_reg16(RegPair::SP, self.setup.points.stack);
        for pair in [
            RegPair::AF,
            RegPair::BC,
            RegPair::DE,
            RegPair::HL,
            RegPair::IX,
            RegPair::IY,
        ] {
            self.cpu.set_reg16(pair, preset);
        }
        self.cpu.set_i(INITIAL_I);
        self.cpu.set_interrupts(false);
        self.cpu.set_interrupt_mode(1);
        self.cpu.set_pc(0x0000);
    }

    fn run_quantum(&mut self, machine: &mut AyMachine) -> DriverState {
        if machine.is_completed() {
            return DriverState::Terminated(StopReason::Completed);
        }
        if self.cycles >= self.budget || self.frames.len() >= self.setup.frames as usize {
            return DriverState::Terminated(StopReason::BudgetExhausted);
        }
        let elapsed = self.cpu.run(machine, self.setup.quantum_cycles);
        if elapsed <= 0 {
            return DriverState::Terminated(StopReason::CpuStalled);
        }
        self.cycles += elapsed as u64;
        if self.cycles >= self.next_frame {
            DriverState::FrameBoundary
        } else {
            DriverState::Running
        }
    }

    fn capture_frames(&mut self, machine: &mut AyMachine) -> Result<()> {
        let limit = self.setup.frames as usize;
        while self.cycles >= self.next_frame && self.frames.len() < limit {
            if self.cpu.interrupts_enabled() {
                self.cpu.interrupt(machine);
            }
            self.frames.push(machine.registers())?;
            if machine.mark_frame_boundary() {
                self.idle_frames += 1;
            }
            self.next_frame += self.frame_cycles;
        }
        Ok(())
    }
}
