//! Debug session tying the Z80 execution controller to correlated listings.
//!
//! A session owns one controller, its breakpoint set and the correlation
//! indices of a primary listing plus any extra listings. Address and line
//! queries consult the primary index first, then each extra listing in load
//! order.

use std::collections::BTreeSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use z80_core::{
    CancellationToken, CoreConfig, CoreError, ExecutionController, PortIo, ProgramImage,
    RegisterSnapshot, RunOutcome, RunState, StepOutcome, StopReason, SystemBus,
};
use z80_listing::{
    analyze, Correlation, CorrelationConfig, CorrelationIndex, SourceLocation, SourceProvider,
};

/// Serializable source position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File name as resolved by the source provider.
    pub file: String,
    /// 1-indexed line.
    pub line: usize,
}

impl From<SourceLocation> for Location {
    fn from(location: SourceLocation) -> Self {
        Self {
            file: location.file,
            line: location.line,
        }
    }
}

/// Result of [`DebugSession::step`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Cycles, halt status and program counter after the step.
    pub outcome: StepOutcome,
    /// Source location of the new program counter.
    pub location: Option<Location>,
}

/// Result of [`DebugSession::run_chunk`] and [`DebugSession::run_until_stop`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Steps, cycles and stop reason of the call.
    pub outcome: RunOutcome,
    /// Program counter the run came to rest on.
    pub pc: u16,
    /// Source location of `pc`.
    pub location: Option<Location>,
}

/// Attribution statistics of one loaded listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSummary {
    /// Name the listing was loaded under.
    pub name: String,
    /// Emission entries parsed.
    pub entries: usize,
    /// Entries graded HIGH.
    pub high: usize,
    /// Entries graded MEDIUM.
    pub medium: usize,
    /// Entries graded LOW.
    pub low: usize,
    /// Source files the listing names that could not be loaded.
    pub missing_sources: Vec<String>,
}

/// A listing correlated against its sources, with its lookup index.
#[derive(Debug, Clone)]
pub struct LoadedListing {
    name: String,
    correlation: Correlation,
    index: CorrelationIndex,
}

impl LoadedListing {
    /// Parses, correlates and indexes `text`.
    #[must_use]
    pub fn load<S: SourceProvider + ?Sized>(
        name: impl Into<String>,
        text: &str,
        provider: &S,
        config: &CorrelationConfig,
    ) -> Self {
        let (correlation, index) = analyze(text, provider, config);
        Self {
            name: name.into(),
            correlation,
            index,
        }
    }

    /// Name the listing was loaded under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finalized attribution.
    #[must_use]
    pub const fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    /// Address and line lookups.
    #[must_use]
    pub const fn index(&self) -> &CorrelationIndex {
        &self.index
    }

    /// Attribution statistics.
    #[must_use]
    pub fn summary(&self) -> ListingSummary {
        let (low, medium, high) = self.correlation.confidence_counts();
        ListingSummary {
            name: self.name.clone(),
            entries: self.correlation.entries.len(),
            high,
            medium,
            low,
            missing_sources: self.correlation.missing_sources.clone(),
        }
    }
}

/// Stepping and source-level query surface over one simulated machine.
#[derive(Debug)]
pub struct DebugSession<P> {
    controller: ExecutionController<P>,
    breakpoints: BTreeSet<u16>,
    cancel: CancellationToken,
    correlation_config: CorrelationConfig,
    primary: Option<LoadedListing>,
    extras: Vec<LoadedListing>,
}

impl<P: PortIo> DebugSession<P> {
    /// Creates a session driving `bus` with default correlation settings.
    #[must_use]
    pub fn new(bus: SystemBus<P>, config: CoreConfig) -> Self {
        Self::with_correlation_config(bus, config, CorrelationConfig::default())
    }

    /// Creates a session with explicit correlation settings.
    #[must_use]
    pub fn with_correlation_config(
        bus: SystemBus<P>,
        config: CoreConfig,
        correlation_config: CorrelationConfig,
    ) -> Self {
        Self {
            controller: ExecutionController::with_bus(bus, config),
            breakpoints: BTreeSet::new(),
            cancel: CancellationToken::new(),
            correlation_config,
            primary: None,
            extras: Vec::new(),
        }
    }

    /// Correlates `text` and installs it as the primary listing, replacing
    /// any previous one.
    pub fn load_listing<S: SourceProvider + ?Sized>(
        &mut self,
        name: impl Into<String>,
        text: &str,
        provider: &S,
    ) -> ListingSummary {
        let listing = LoadedListing::load(name, text, provider, &self.correlation_config);
        let summary = listing.summary();
        info!(
            "primary listing {}: {} entries, {} high, {} medium, {} low",
            summary.name, summary.entries, summary.high, summary.medium, summary.low
        );
        self.primary = Some(listing);
        summary
    }

    /// Correlates `text` independently and appends it to the extra listings.
    pub fn load_extra_listing<S: SourceProvider + ?Sized>(
        &mut self,
        name: impl Into<String>,
        text: &str,
        provider: &S,
    ) -> ListingSummary {
        let listing = LoadedListing::load(name, text, provider, &self.correlation_config);
        let summary = listing.summary();
        info!(
            "extra listing {}: {} entries, {} high, {} medium, {} low",
            summary.name, summary.entries, summary.high, summary.medium, summary.low
        );
        self.extras.push(listing);
        summary
    }

    /// Drops every loaded listing.
    pub fn clear_listings(&mut self) {
        self.primary = None;
        self.extras.clear();
    }

    /// Loaded listings, primary first.
    pub fn listings(&self) -> impl Iterator<Item = &LoadedListing> {
        self.primary.iter().chain(&self.extras)
    }

    /// Missing source files across all listings, each named once.
    #[must_use]
    pub fn missing_sources(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self
            .listings()
            .flat_map(|listing| &listing.correlation.missing_sources)
        {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    /// Executes one instruction.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError`] from the controller.
    pub fn step(&mut self) -> Result<StepReport, CoreError> {
        let outcome = self.controller.step()?;
        Ok(StepReport {
            outcome,
            location: self.location_of(outcome.pc),
        })
    }

    /// Executes at most `max_steps` instructions against the session's
    /// breakpoints.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError`] from the controller.
    pub fn run_chunk(&mut self, max_steps: u32) -> Result<RunReport, CoreError> {
        let outcome = self.controller.run_chunk(&self.breakpoints, max_steps)?;
        Ok(self.run_report(outcome))
    }

    /// Runs until a breakpoint, a halt or a cancellation request raised
    /// through [`Self::cancellation_token`]. A cancelled run clears the token
    /// before returning.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError`] from the controller.
    pub fn run_until_stop(&mut self) -> Result<RunReport, CoreError> {
        let outcome = self
            .controller
            .run_until_stop(&self.breakpoints, &self.cancel)?;
        if outcome.reason == StopReason::Cancelled {
            self.cancel.clear();
        }
        Ok(self.run_report(outcome))
    }

    /// Token that stops [`Self::run_until_stop`] at the next chunk boundary.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resets the processor, optionally reloading memory from `image`.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError`] from the controller.
    pub fn reset(
        &mut self,
        image: Option<&ProgramImage>,
        entry: Option<u16>,
    ) -> Result<(), CoreError> {
        self.controller.reset(image, entry)
    }

    /// Delivers an interrupt pulse; returns whether it was accepted.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError`] from the controller.
    pub fn signal_interrupt(
        &mut self,
        non_maskable: bool,
        data_bus: u8,
    ) -> Result<bool, CoreError> {
        self.controller.signal_interrupt(non_maskable, data_bus)
    }

    /// Adds an address breakpoint. Returns `false` if it was already set.
    pub fn add_breakpoint(&mut self, address: u16) -> bool {
        debug!("breakpoint set at 0x{address:04X}");
        self.breakpoints.insert(address)
    }

    /// Removes an address breakpoint. Returns `false` if it was not set.
    pub fn remove_breakpoint(&mut self, address: u16) -> bool {
        self.breakpoints.remove(&address)
    }

    /// Sets breakpoints on every address `(file, line)` resolves to and
    /// returns them. An empty result means the line has no code.
    pub fn add_line_breakpoint(&mut self, file: &str, line: usize) -> Vec<u16> {
        let addresses = self.resolve_location_to_addresses(file, line);
        for address in &addresses {
            self.add_breakpoint(*address);
        }
        addresses
    }

    /// Removes the breakpoints [`Self::add_line_breakpoint`] would set.
    pub fn remove_line_breakpoint(&mut self, file: &str, line: usize) -> Vec<u16> {
        let addresses = self.resolve_location_to_addresses(file, line);
        for address in &addresses {
            self.breakpoints.remove(address);
        }
        addresses
    }

    /// Removes all breakpoints.
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// Active breakpoints.
    #[must_use]
    pub const fn breakpoints(&self) -> &BTreeSet<u16> {
        &self.breakpoints
    }

    /// Flat register view.
    #[must_use]
    pub fn registers(&self) -> RegisterSnapshot {
        self.controller.registers()
    }

    /// Current program counter.
    #[must_use]
    pub const fn program_counter(&self) -> u16 {
        self.controller.program_counter()
    }

    /// Whether the processor is halted.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.controller.is_halted()
    }

    /// Current run state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.controller.run_state()
    }

    /// Reads memory through the current banking view.
    #[must_use]
    pub fn peek(&self, addr: u16) -> Option<u8> {
        self.controller.bus().map(|bus| bus.peek(addr))
    }

    /// Source location executing at `addr`.
    #[must_use]
    pub fn resolve_address_to_location(&self, addr: u16) -> Option<SourceLocation> {
        self.listings()
            .find_map(|listing| listing.index.resolve_address(addr))
    }

    /// Candidate addresses for `(file, line)` from the first listing that
    /// knows the line.
    #[must_use]
    pub fn resolve_location_to_addresses(&self, file: &str, line: usize) -> Vec<u16> {
        self.listings()
            .map(|listing| listing.index.resolve_location(file, line))
            .find(|addresses| !addresses.is_empty())
            .unwrap_or_default()
    }

    /// Source location of the current program counter.
    #[must_use]
    pub fn current_location(&self) -> Option<SourceLocation> {
        self.resolve_address_to_location(self.program_counter())
    }

    /// Underlying controller.
    #[must_use]
    pub const fn controller(&self) -> &ExecutionController<P> {
        &self.controller
    }

    /// Mutable underlying controller, for bus and register patches.
    pub fn controller_mut(&mut self) -> &mut ExecutionController<P> {
        &mut self.controller
    }

    fn location_of(&self, addr: u16) -> Option<Location> {
        self.resolve_address_to_location(addr).map(Location::from)
    }

    fn run_report(&self, outcome: RunOutcome) -> RunReport {
        let pc = self.program_counter();
        RunReport {
            outcome,
            pc,
            location: self.location_of(pc),
        }
    }
}
