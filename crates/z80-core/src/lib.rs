//! Core Z80 simulator: processor, banked memory bus and execution controller.

/// Memory bus abstraction and the banked single-board implementation.
pub mod memory;
pub use memory::{
    new_address_space, AddressRange, BankingLayout, BankingState, Bus, Platform, SystemBus,
    ADDRESS_SPACE_BYTES,
};

/// Public host-facing API contract and integration types.
pub mod api;
pub use api::{
    CoreConfig, NullPorts, PortIo, RegisterSnapshot, RunOutcome, StepOutcome, StopReason,
    DEFAULT_CHUNK_STEPS,
};

/// Architectural CPU state model primitives.
pub mod state;
pub use state::{Flags, InterruptMode, RegisterBank, RegisterFile, RunState};

/// Error taxonomy for host-side programming errors.
pub mod fault;
pub use fault::{CoreError, ErrorClass};

/// Program images and Intel HEX decoding.
pub mod image;
pub use image::ProgramImage;

/// Deterministic instruction cycle-cost tables and lookup helpers.
pub mod timing;
pub use timing::{cycle_cost, CycleCostKind, CYCLE_COST_TABLE};

/// Instruction execution pipeline.
pub mod execute;
pub use execute::{Z80, MODE1_VECTOR, NMI_VECTOR};

/// Step, run and reset orchestration.
pub mod controller;
pub use controller::{BreakpointSet, CancellationToken, ExecutionController};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
