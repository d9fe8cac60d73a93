//! Architectural CPU state model primitives.

/// Register file, flag set and interrupt latches.
pub mod registers;
/// Host-observable execution state machine.
pub mod run_state;

pub use registers::{
    Flags, InterruptMode, RegisterBank, RegisterFile, FLAG_C, FLAG_H, FLAG_N, FLAG_PV, FLAG_S,
    FLAG_X, FLAG_Y, FLAG_Z, POWER_ON_A, POWER_ON_F, POWER_ON_SP,
};
pub use run_state::RunState;
