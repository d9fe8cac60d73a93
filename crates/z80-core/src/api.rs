//! Host-facing contracts: configuration, port hooks and step/run outcomes.

use crate::state::{InterruptMode, RegisterFile, POWER_ON_SP};

/// Default number of instructions executed per run chunk.
pub const DEFAULT_CHUNK_STEPS: u32 = 500;

/// Top-level configuration for an execution controller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Stack pointer value installed by reset.
    pub power_on_sp: u16,
    /// Instructions per chunk in `run_until_stop`.
    pub chunk_steps: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            power_on_sp: POWER_ON_SP,
            chunk_steps: DEFAULT_CHUNK_STEPS,
        }
    }
}

/// Host-provided I/O port hooks, bound once per session.
///
/// Ports are 8-bit; the core attaches no meaning to any port number except
/// the banking control port, whose writes are still forwarded here.
pub trait PortIo {
    /// Reads an input port.
    fn port_in(&mut self, port: u8) -> u8;

    /// Writes an output port.
    fn port_out(&mut self, port: u8, value: u8);

    /// Advances host devices after each instruction.
    fn tick(&mut self, _cycles: u32) {}
}

/// Port hooks for a machine with nothing attached: inputs float high and
/// outputs are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NullPorts;

impl PortIo for NullPorts {
    fn port_in(&mut self, _port: u8) -> u8 {
        0xFF
    }

    fn port_out(&mut self, _port: u8, _value: u8) {}
}

impl<T: PortIo + ?Sized> PortIo for Box<T> {
    fn port_in(&mut self, port: u8) -> u8 {
        (**self).port_in(port)
    }

    fn port_out(&mut self, port: u8, value: u8) {
        (**self).port_out(port, value);
    }

    fn tick(&mut self, cycles: u32) {
        (**self).tick(cycles);
    }
}

/// Flat register view with 16-bit pairs, for protocol adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs, clippy::struct_excessive_bools)]
pub struct RegisterSnapshot {
    pub af: u16,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub af_alt: u16,
    pub bc_alt: u16,
    pub de_alt: u16,
    pub hl_alt: u16,
    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,
    /// Interrupt mode as 0, 1 or 2.
    pub im: u8,
    pub iff1: bool,
    pub iff2: bool,
    pub halted: bool,
}

impl From<&RegisterFile> for RegisterSnapshot {
    fn from(regs: &RegisterFile) -> Self {
        Self {
            af: regs.main.af(),
            bc: regs.main.bc(),
            de: regs.main.de(),
            hl: regs.main.hl(),
            af_alt: regs.alt.af(),
            bc_alt: regs.alt.bc(),
            de_alt: regs.alt.de(),
            hl_alt: regs.alt.hl(),
            ix: regs.ix,
            iy: regs.iy,
            sp: regs.sp,
            pc: regs.pc,
            i: regs.i,
            r: regs.r,
            im: match regs.im {
                InterruptMode::Mode0 => 0,
                InterruptMode::Mode1 => 1,
                InterruptMode::Mode2 => 2,
            },
            iff1: regs.iff1,
            iff2: regs.iff2,
            halted: regs.halted,
        }
    }
}

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StepOutcome {
    /// Cycles consumed, including interrupt responses since the last step.
    pub cycles: u32,
    /// Processor is halted after this step.
    pub halted: bool,
    /// Program counter after this step.
    pub pc: u16,
}

/// Why a run call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StopReason {
    /// The program counter reached a breakpoint before executing it.
    Breakpoint(u16),
    /// The processor executed `HALT`.
    Halted,
    /// The step budget ran out; the caller may resume.
    Yielded,
    /// The cancellation token was raised between chunks.
    Cancelled,
}

/// Aggregated outcome of a run call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RunOutcome {
    /// Instructions executed during this call.
    pub steps: u32,
    /// Cycles consumed during this call.
    pub cycles: u64,
    /// Why the call returned.
    pub reason: StopReason,
}
