use log::{debug, trace};

use crate::api::PortIo;
use crate::image::ProgramImage;
use crate::memory::{
    any_contains, new_address_space, resolve_read, resolve_write, AccessTarget, AddressRange,
    BankingLayout, BankingState, Bus, DiscardReason, WriteDisposition, EXPANSION_BANK_BYTES,
    EXPANSION_BANK_COUNT,
};
use crate::CoreError;

/// Memory platform selected when a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Platform {
    /// Flat 64 KiB of RAM.
    #[default]
    Simple,
    /// Flat memory whose listed ranges ignore writes.
    RomOverlay(Vec<AddressRange>),
    /// Shadow alias, write protection and two-bank expansion window.
    Banked(BankingLayout),
}

/// Bus implementation for the supported single-board platforms.
///
/// Owns the base memory, the expansion banks, the banking gates and the
/// host port hooks.
#[derive(Debug, Clone)]
pub struct SystemBus<P> {
    memory: Box<[u8]>,
    banks: [Box<[u8]>; EXPANSION_BANK_COUNT],
    platform: Platform,
    banking: BankingState,
    power_on_banking: BankingState,
    relocated: bool,
    ports: P,
}

impl<P: PortIo> SystemBus<P> {
    /// Creates a bus with the platform's power-on banking gates.
    #[must_use]
    pub fn new(platform: Platform, ports: P) -> Self {
        let banking = match platform {
            Platform::Banked(_) => BankingState::default(),
            Platform::Simple | Platform::RomOverlay(_) => BankingState::flat(),
        };
        Self::with_banking(platform, banking, ports)
    }

    /// Creates a bus whose gates start in `banking` and return to it on
    /// every image load.
    #[must_use]
    pub fn with_banking(platform: Platform, banking: BankingState, ports: P) -> Self {
        Self {
            memory: new_address_space(),
            banks: [
                vec![0; EXPANSION_BANK_BYTES].into_boxed_slice(),
                vec![0; EXPANSION_BANK_BYTES].into_boxed_slice(),
            ],
            platform,
            banking,
            power_on_banking: banking,
            relocated: false,
            ports,
        }
    }

    /// Replaces base memory with `image`, restores the power-on gates and
    /// runs the shadow bootstrap once.
    pub fn load_image(&mut self, image: &ProgramImage) {
        self.memory.copy_from_slice(image.bytes());
        self.banking = self.power_on_banking;
        self.relocated = false;
        self.shadow_bootstrap();
        debug!(
            "loaded program image, start 0x{:04X}, shadow relocated: {}",
            image.start_address(),
            self.relocated
        );
    }

    /// Preloads one expansion bank from offset zero.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ImageOutOfRange`] for a bank index other than 0
    /// or 1, or for data longer than the expansion window.
    pub fn load_bank(&mut self, bank: u8, data: &[u8]) -> Result<(), CoreError> {
        let Some(storage) = self.banks.get_mut(usize::from(bank)) else {
            return Err(CoreError::ImageOutOfRange {
                target: "bank index",
                len: usize::from(bank) + 1,
                capacity: EXPANSION_BANK_COUNT,
            });
        };
        if data.len() > storage.len() {
            return Err(CoreError::ImageOutOfRange {
                target: "expansion bank",
                len: data.len(),
                capacity: storage.len(),
            });
        }
        storage[..data.len()].copy_from_slice(data);
        debug!("loaded {} bytes into expansion bank {bank}", data.len());
        Ok(())
    }

    /// Reads a byte through the current banking view without touching any
    /// device.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        self.load(self.read_target(addr))
    }

    /// Current banking gates.
    #[must_use]
    pub const fn banking(&self) -> BankingState {
        self.banking
    }

    /// Selected platform.
    #[must_use]
    pub const fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Whether the last image load relocated the low ROM into the shadow
    /// range.
    #[must_use]
    pub const fn shadow_relocated(&self) -> bool {
        self.relocated
    }

    /// Base memory, ignoring any banking redirection.
    #[must_use]
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Storage of one expansion bank, if it exists.
    #[must_use]
    pub fn bank(&self, bank: u8) -> Option<&[u8]> {
        self.banks.get(usize::from(bank)).map(AsRef::as_ref)
    }

    /// Host port hooks.
    #[must_use]
    pub const fn ports(&self) -> &P {
        &self.ports
    }

    /// Mutable host port hooks.
    pub fn ports_mut(&mut self) -> &mut P {
        &mut self.ports
    }

    fn shadow_bootstrap(&mut self) {
        let Platform::Banked(layout) = &self.platform else {
            return;
        };
        if !layout.needs_shadow_bootstrap() {
            return;
        }
        let source = layout.shadow_window;
        let target = layout.shadow_target_range();
        let target_span = usize::from(target.start)..=usize::from(target.end);
        if self.memory[target_span].iter().any(|byte| *byte != 0) {
            debug!("shadow range already populated, bootstrap skipped");
            return;
        }
        let source_span = usize::from(source.start)..=usize::from(source.end);
        self.memory
            .copy_within(source_span.clone(), usize::from(target.start));
        self.memory[source_span].fill(0);
        self.relocated = true;
    }

    fn is_rom(&self, addr: u16) -> bool {
        match &self.platform {
            Platform::Simple => false,
            Platform::RomOverlay(ranges) => any_contains(ranges, addr),
            Platform::Banked(layout) => {
                if self.relocated {
                    if layout.shadow_window.contains(addr) {
                        return false;
                    }
                    if layout.shadow_target_range().contains(addr) {
                        return true;
                    }
                }
                any_contains(&layout.rom_ranges, addr)
            }
        }
    }

    fn read_target(&self, addr: u16) -> AccessTarget {
        match &self.platform {
            Platform::Banked(layout) => resolve_read(layout, self.banking, addr),
            Platform::Simple | Platform::RomOverlay(_) => AccessTarget::Base(addr),
        }
    }

    fn write_disposition(&self, addr: u16) -> WriteDisposition {
        let is_rom = self.is_rom(addr);
        match &self.platform {
            Platform::Banked(layout) => resolve_write(layout, self.banking, is_rom, addr),
            Platform::Simple | Platform::RomOverlay(_) => {
                if is_rom {
                    WriteDisposition::Discard(DiscardReason::Rom)
                } else {
                    WriteDisposition::Store(AccessTarget::Base(addr))
                }
            }
        }
    }

    fn load(&self, target: AccessTarget) -> u8 {
        match target {
            AccessTarget::Base(addr) => self.memory[usize::from(addr)],
            AccessTarget::Bank { bank, offset } => self.banks[usize::from(bank & 1)]
                .get(offset)
                .copied()
                .unwrap_or(0xFF),
        }
    }
}

impl<P: PortIo> Bus for SystemBus<P> {
    fn read(&mut self, addr: u16) -> u8 {
        self.peek(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        match self.write_disposition(addr) {
            WriteDisposition::Store(AccessTarget::Base(target)) => {
                self.memory[usize::from(target)] = value;
            }
            WriteDisposition::Store(AccessTarget::Bank { bank, offset }) => {
                if let Some(slot) = self.banks[usize::from(bank & 1)].get_mut(offset) {
                    *slot = value;
                }
            }
            WriteDisposition::Discard(reason) => {
                trace!("write 0x{value:02X} to 0x{addr:04X} discarded: {reason:?}");
            }
        }
    }

    fn port_in(&mut self, port: u8) -> u8 {
        self.ports.port_in(port)
    }

    fn port_out(&mut self, port: u8, value: u8) {
        if let Platform::Banked(layout) = &self.platform {
            if port == layout.control_port {
                let next = BankingState::from_control(value);
                if next != self.banking {
                    debug!("banking control 0x{value:02X}: {next:?}");
                }
                self.banking = next;
            }
        }
        self.ports.port_out(port, value);
    }

    fn tick(&mut self, cycles: u32) {
        self.ports.tick(cycles);
    }
}
