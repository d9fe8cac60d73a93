//! Step, chunked run and reset orchestration on top of the processor and
//! bus. The only component that knows about breakpoints and halting.

use std::collections::{BTreeSet, HashSet};
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;

use crate::api::{CoreConfig, PortIo, RegisterSnapshot, RunOutcome, StepOutcome, StopReason};
use crate::execute::Z80;
use crate::image::ProgramImage;
use crate::memory::{Bus, SystemBus};
use crate::state::{RegisterFile, RunState};
use crate::CoreError;

/// Read-only view of the host's breakpoint addresses.
pub trait BreakpointSet {
    /// Returns `true` when execution must stop before `addr`.
    fn contains_address(&self, addr: u16) -> bool;
}

impl<S: BuildHasher> BreakpointSet for HashSet<u16, S> {
    fn contains_address(&self, addr: u16) -> bool {
        self.contains(&addr)
    }
}

impl BreakpointSet for BTreeSet<u16> {
    fn contains_address(&self, addr: u16) -> bool {
        self.contains(&addr)
    }
}

impl BreakpointSet for [u16] {
    fn contains_address(&self, addr: u16) -> bool {
        self.contains(&addr)
    }
}

/// Cooperative stop request shared between the host and a running
/// controller. Checked only between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing flag shared with other host code.
    #[must_use]
    pub const fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    /// Requests a stop at the next chunk boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Clears a previous request.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Returns `true` once a stop has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// The shared flag.
    #[must_use]
    pub const fn flag(&self) -> &Arc<AtomicBool> {
        &self.flag
    }
}

/// Drives a [`Z80`] over a bound [`SystemBus`].
#[derive(Debug)]
pub struct ExecutionController<P> {
    cpu: Z80,
    bus: Option<SystemBus<P>>,
    state: RunState,
    config: CoreConfig,
}

impl<P: PortIo> ExecutionController<P> {
    /// Creates a controller with no bus bound.
    #[must_use]
    pub fn new(config: CoreConfig) -> Self {
        let mut controller = Self {
            cpu: Z80::new(),
            bus: None,
            state: RunState::Ready,
            config,
        };
        controller.cpu.registers_mut().sp = controller.config.power_on_sp;
        controller
    }

    /// Creates a controller bound to `bus`.
    #[must_use]
    pub fn with_bus(bus: SystemBus<P>, config: CoreConfig) -> Self {
        let mut controller = Self::new(config);
        controller.bus = Some(bus);
        controller
    }

    /// Binds `bus`, returning the previously bound one.
    pub fn bind_bus(&mut self, bus: SystemBus<P>) -> Option<SystemBus<P>> {
        self.bus.replace(bus)
    }

    /// Executes exactly one instruction, or one idle cycle while halted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BusNotBound`] when no bus is bound.
    pub fn step(&mut self) -> Result<StepOutcome, CoreError> {
        let bus = self.bus.as_mut().ok_or(CoreError::BusNotBound)?;
        let cycles = self.cpu.execute_one(bus);
        bus.tick(cycles);
        let regs = self.cpu.registers();
        self.state = if regs.halted {
            RunState::Halted
        } else {
            RunState::Ready
        };
        Ok(StepOutcome {
            cycles,
            halted: regs.halted,
            pc: regs.pc,
        })
    }

    /// Executes at most `max_steps` instructions, checking the program
    /// counter against `breakpoints` before each one.
    ///
    /// Resuming from a breakpoint stop executes the instruction at the
    /// breakpoint before checking again. A halted processor returns
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BusNotBound`] when no bus is bound.
    pub fn run_chunk<S: BreakpointSet + ?Sized>(
        &mut self,
        breakpoints: &S,
        max_steps: u32,
    ) -> Result<RunOutcome, CoreError> {
        let bus = self.bus.as_mut().ok_or(CoreError::BusNotBound)?;
        let mut outcome = RunOutcome {
            steps: 0,
            cycles: 0,
            reason: StopReason::Yielded,
        };
        if self.cpu.registers().halted {
            self.state = RunState::Halted;
            outcome.reason = StopReason::Halted;
            return Ok(outcome);
        }

        let mut step_off = self.state.breakpoint() == Some(self.cpu.registers().pc);
        self.state = RunState::Running;
        while outcome.steps < max_steps {
            let pc = self.cpu.registers().pc;
            if !step_off && breakpoints.contains_address(pc) {
                debug!("breakpoint hit at 0x{pc:04X}");
                self.state = RunState::BreakpointHit(pc);
                outcome.reason = StopReason::Breakpoint(pc);
                return Ok(outcome);
            }
            step_off = false;

            let cycles = self.cpu.execute_one(bus);
            bus.tick(cycles);
            outcome.steps += 1;
            outcome.cycles += u64::from(cycles);

            if self.cpu.registers().halted {
                debug!("processor halted at 0x{:04X}", self.cpu.registers().pc);
                self.state = RunState::Halted;
                outcome.reason = StopReason::Halted;
                return Ok(outcome);
            }
        }
        Ok(outcome)
    }

    /// Runs chunk after chunk until a breakpoint, a halt or a cancellation
    /// request. `cancel` is checked only between chunks, so an instruction
    /// always completes once begun.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BusNotBound`] when no bus is bound.
    pub fn run_until_stop<S: BreakpointSet + ?Sized>(
        &mut self,
        breakpoints: &S,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, CoreError> {
        let chunk_steps = self.config.chunk_steps.max(1);
        let mut total = RunOutcome {
            steps: 0,
            cycles: 0,
            reason: StopReason::Yielded,
        };
        loop {
            let chunk = self.run_chunk(breakpoints, chunk_steps)?;
            total.steps = total.steps.saturating_add(chunk.steps);
            total.cycles += chunk.cycles;
            if chunk.reason != StopReason::Yielded {
                total.reason = chunk.reason;
                return Ok(total);
            }
            if cancel.is_cancelled() {
                debug!("run cancelled after {} steps", total.steps);
                self.state = RunState::Ready;
                total.reason = StopReason::Cancelled;
                return Ok(total);
            }
        }
    }

    /// Resets the processor. With an image, reloads the bus and starts at
    /// `entry`, or at the image's start address when no entry is given.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BusNotBound`] when an image is supplied but no
    /// bus is bound.
    pub fn reset(
        &mut self,
        image: Option<&ProgramImage>,
        entry: Option<u16>,
    ) -> Result<(), CoreError> {
        if image.is_some() && self.bus.is_none() {
            return Err(CoreError::BusNotBound);
        }
        self.cpu.reset();
        self.cpu.registers_mut().sp = self.config.power_on_sp;
        if let (Some(image), Some(bus)) = (image, self.bus.as_mut()) {
            bus.load_image(image);
            self.cpu.registers_mut().pc = entry.unwrap_or_else(|| image.start_address());
        } else if let Some(entry) = entry {
            self.cpu.registers_mut().pc = entry;
        }
        self.state = RunState::Ready;
        debug!("reset, pc 0x{:04X}", self.cpu.registers().pc);
        Ok(())
    }

    /// Delivers an interrupt pulse to the processor.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BusNotBound`] when no bus is bound.
    pub fn signal_interrupt(
        &mut self,
        non_maskable: bool,
        data_bus: u8,
    ) -> Result<bool, CoreError> {
        let bus = self.bus.as_mut().ok_or(CoreError::BusNotBound)?;
        let accepted = self.cpu.signal_interrupt(bus, non_maskable, data_bus);
        if accepted && self.state == RunState::Halted {
            self.state = RunState::Ready;
        }
        Ok(accepted)
    }

    /// Flat register view.
    #[must_use]
    pub fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot::from(self.cpu.registers())
    }

    /// Full register file.
    #[must_use]
    pub const fn register_file(&self) -> &RegisterFile {
        self.cpu.registers()
    }

    /// Mutable register file, for hosts that patch registers.
    pub fn register_file_mut(&mut self) -> &mut RegisterFile {
        self.cpu.registers_mut()
    }

    /// Current program counter.
    #[must_use]
    pub const fn program_counter(&self) -> u16 {
        self.cpu.registers().pc
    }

    /// Whether the processor is halted.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.cpu.registers().halted
    }

    /// Current run state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.state
    }

    /// Bound bus, if any.
    #[must_use]
    pub const fn bus(&self) -> Option<&SystemBus<P>> {
        self.bus.as_ref()
    }

    /// Mutable bound bus, if any.
    pub fn bus_mut(&mut self) -> Option<&mut SystemBus<P>> {
        self.bus.as_mut()
    }

    /// Controller configuration.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashSet};

    use super::{BreakpointSet, CancellationToken, ExecutionController};
    use crate::api::{CoreConfig, NullPorts, StopReason};
    use crate::image::ProgramImage;
    use crate::memory::{Platform, SystemBus};
    use crate::state::RunState;
    use crate::CoreError;

    fn controller(program: &[u8]) -> ExecutionController<NullPorts> {
        let mut controller = ExecutionController::with_bus(
            SystemBus::new(Platform::Simple, NullPorts),
            CoreConfig::default(),
        );
        let image = ProgramImage::from_bytes(0, program).expect("fits");
        controller.reset(Some(&image), None).expect("bus bound");
        controller
    }

    #[test]
    fn unbound_controller_reports_precondition() {
        let mut controller = ExecutionController::<NullPorts>::new(CoreConfig::default());
        assert_eq!(controller.step(), Err(CoreError::BusNotBound));
        assert_eq!(
            controller.run_chunk(&[0_u16][..], 10),
            Err(CoreError::BusNotBound)
        );
        assert_eq!(
            controller.reset(Some(&ProgramImage::default()), None),
            Err(CoreError::BusNotBound)
        );
        assert_eq!(controller.reset(None, Some(0x100)), Ok(()));
        assert_eq!(controller.program_counter(), 0x100);
    }

    #[test]
    fn breakpoint_sets_share_one_contract() {
        let hash: HashSet<u16> = [0x10].into_iter().collect();
        let tree: BTreeSet<u16> = [0x10].into_iter().collect();
        let slice: &[u16] = &[0x10];
        assert!(hash.contains_address(0x10) && !hash.contains_address(0x11));
        assert!(tree.contains_address(0x10));
        assert!(slice.contains_address(0x10));
    }

    #[test]
    fn run_chunk_stops_before_breakpoint_and_steps_off_on_resume() {
        // NOP ; NOP ; loop: JR loop
        let mut controller = controller(&[0x00, 0x00, 0x18, 0xFE]);
        let breakpoints = [0x0001_u16, 0x0002];

        let outcome = controller.run_chunk(&breakpoints[..], 100).expect("bound");
        assert_eq!(outcome.reason, StopReason::Breakpoint(0x0001));
        assert_eq!(outcome.steps, 1);
        assert_eq!(controller.run_state(), RunState::BreakpointHit(0x0001));

        let outcome = controller.run_chunk(&breakpoints[..], 100).expect("bound");
        assert_eq!(outcome.reason, StopReason::Breakpoint(0x0002));
        assert_eq!(outcome.steps, 1);

        let outcome = controller.run_chunk(&[][..], 10).expect("bound");
        assert_eq!(outcome.reason, StopReason::Yielded);
        assert_eq!(outcome.steps, 10);
        assert_eq!(controller.run_state(), RunState::Running);
    }

    #[test]
    fn run_stops_on_halt() {
        let mut controller = controller(&[0x00, 0x76]);
        let outcome = controller
            .run_until_stop(&[][..], &CancellationToken::new())
            .expect("bound");
        assert_eq!(outcome.reason, StopReason::Halted);
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.cycles, 8);
        assert!(controller.is_halted());
        assert_eq!(controller.run_state(), RunState::Halted);
    }

    #[test]
    fn cancellation_is_observed_between_chunks() {
        let mut controller = controller(&[0x18, 0xFE]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = controller.run_until_stop(&[][..], &cancel).expect("bound");
        assert_eq!(outcome.reason, StopReason::Cancelled);
        assert_eq!(outcome.steps, CoreConfig::default().chunk_steps);
        assert_eq!(controller.run_state(), RunState::Ready);
    }

    #[test]
    fn reset_uses_entry_or_image_start() {
        let mut controller = controller(&[0x00]);
        let image = ProgramImage::from_bytes(0x4000, &[0x00]).expect("fits");
        controller.reset(Some(&image), None).expect("bound");
        assert_eq!(controller.program_counter(), 0x4000);
        controller.reset(Some(&image), Some(0x4001)).expect("bound");
        assert_eq!(controller.program_counter(), 0x4001);
        assert_eq!(controller.registers().sp, 0xFFFF);
    }

    #[test]
    fn interrupt_wakes_halted_processor() {
        // IM 1 ; EI ; HALT
        let mut controller = controller(&[0xED, 0x56, 0xFB, 0x76]);
        controller
            .run_until_stop(&[][..], &CancellationToken::new())
            .expect("bound");
        assert!(controller.is_halted());
        assert_eq!(controller.signal_interrupt(false, 0xFF), Ok(true));
        assert!(!controller.is_halted());
        assert_eq!(controller.program_counter(), 0x0038);
        assert_eq!(controller.run_state(), RunState::Ready);
    }
}
