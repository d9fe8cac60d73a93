//! Address windows of the banked single-board layout and their defaults.

/// Inclusive start of the low window aliased by the shadow ROM.
pub const SHADOW_START: u16 = 0x0000;
/// Inclusive end of the low window aliased by the shadow ROM.
pub const SHADOW_END: u16 = 0x07FF;
/// Inclusive start of the high range the shadow window reads from.
pub const SHADOW_TARGET_START: u16 = 0xC000;
/// Inclusive end of the high range the shadow window reads from.
pub const SHADOW_TARGET_END: u16 = 0xC7FF;
/// Inclusive start of the write-protectable range.
pub const PROTECT_START: u16 = 0x4000;
/// Inclusive end of the write-protectable range.
pub const PROTECT_END: u16 = 0x7FFF;
/// Inclusive start of the bank-switched expansion window.
pub const EXPANSION_START: u16 = 0x8000;
/// Inclusive end of the bank-switched expansion window.
pub const EXPANSION_END: u16 = 0xBFFF;
/// Inclusive start of the monitor ROM.
pub const MONITOR_ROM_START: u16 = 0xC000;
/// Inclusive end of the monitor ROM.
pub const MONITOR_ROM_END: u16 = 0xFFFF;
/// Number of selectable banks behind the expansion window.
pub const EXPANSION_BANK_COUNT: usize = 2;
/// Size in bytes of one expansion bank.
pub const EXPANSION_BANK_BYTES: usize = (EXPANSION_END - EXPANSION_START) as usize + 1;
/// Default I/O port whose writes drive the banking gates.
pub const DEFAULT_CONTROL_PORT: u8 = 0xFF;

/// Inclusive address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AddressRange {
    /// Inclusive start address.
    pub start: u16,
    /// Inclusive end address.
    pub end: u16,
}

impl AddressRange {
    /// Creates an inclusive range.
    #[must_use]
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// Returns `true` when `addr` lies inside this range.
    #[must_use]
    pub const fn contains(self, addr: u16) -> bool {
        addr >= self.start && addr <= self.end
    }

    /// Returns `true` when every address of `other` lies inside this range.
    #[must_use]
    pub const fn covers(self, other: Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Number of bytes in the range.
    #[must_use]
    pub const fn len(self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    /// Returns `true` for an inverted range that holds no address.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.end < self.start
    }

    /// Offset of `addr` from the range start.
    #[must_use]
    pub const fn offset_of(self, addr: u16) -> usize {
        addr.wrapping_sub(self.start) as usize
    }
}

/// Returns `true` when any range in `ranges` contains `addr`.
#[must_use]
pub fn any_contains(ranges: &[AddressRange], addr: u16) -> bool {
    ranges.iter().any(|range| range.contains(addr))
}

/// Returns `true` when the union of `ranges` covers every address of `target`.
#[must_use]
pub fn ranges_cover(ranges: &[AddressRange], target: AddressRange) -> bool {
    (target.start..=target.end).all(|addr| any_contains(ranges, addr))
}

/// Address windows and ROM ranges of a banked platform.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BankingLayout {
    /// Port whose writes update the banking gates.
    pub control_port: u8,
    /// Low window that reads through to `shadow_target` while shadowing.
    pub shadow_window: AddressRange,
    /// Start of the range aliased by `shadow_window`.
    pub shadow_target: u16,
    /// Range whose writes are dropped while protection is enabled.
    pub protect_range: AddressRange,
    /// Window backed by the selected expansion bank while expansion is on.
    pub expansion_window: AddressRange,
    /// Ranges never writable by the processor.
    pub rom_ranges: Vec<AddressRange>,
}

impl Default for BankingLayout {
    fn default() -> Self {
        Self {
            control_port: DEFAULT_CONTROL_PORT,
            shadow_window: AddressRange::new(SHADOW_START, SHADOW_END),
            shadow_target: SHADOW_TARGET_START,
            protect_range: AddressRange::new(PROTECT_START, PROTECT_END),
            expansion_window: AddressRange::new(EXPANSION_START, EXPANSION_END),
            rom_ranges: vec![AddressRange::new(MONITOR_ROM_START, MONITOR_ROM_END)],
        }
    }
}

impl BankingLayout {
    /// The range `shadow_window` aliases.
    #[must_use]
    pub const fn shadow_target_range(&self) -> AddressRange {
        let len = self.shadow_window.end.wrapping_sub(self.shadow_window.start);
        AddressRange::new(self.shadow_target, self.shadow_target.wrapping_add(len))
    }

    /// Translates a shadow-window address into its aliased target address.
    #[must_use]
    pub const fn shadow_alias(&self, addr: u16) -> u16 {
        self.shadow_target
            .wrapping_add(addr.wrapping_sub(self.shadow_window.start))
    }

    /// Returns `true` when the shadow bootstrap applies to this layout: the
    /// ROM ranges cover the shadow window but not its target.
    #[must_use]
    pub fn needs_shadow_bootstrap(&self) -> bool {
        ranges_cover(&self.rom_ranges, self.shadow_window)
            && !ranges_cover(&self.rom_ranges, self.shadow_target_range())
    }
}

const _: () = assert_default_layout();

const fn assert_default_layout() {
    assert!(
        SHADOW_END - SHADOW_START == SHADOW_TARGET_END - SHADOW_TARGET_START,
        "shadow window and target must be the same size"
    );
    assert!(
        EXPANSION_BANK_BYTES == 0x4000,
        "expansion banks are 16 KiB"
    );
    assert!(
        PROTECT_END < EXPANSION_START,
        "protect range must sit below the expansion window"
    );
    assert!(
        EXPANSION_END < SHADOW_TARGET_START,
        "expansion window must sit below the shadow target"
    );
}
