//! Memory bus abstraction and the banked single-board implementation.

/// Read/write target resolution helpers.
pub mod access;
/// Control-port banking gates.
pub mod banking;
/// Address windows and layout defaults.
pub mod map;
/// Platform bus owning memory, banks and host port hooks.
pub mod system;

pub use access::{resolve_read, resolve_write, AccessTarget, DiscardReason, WriteDisposition};
pub use banking::{
    BankingState, CONTROL_BANK, CONTROL_EXPAND, CONTROL_PROTECT, CONTROL_SHADOW_OFF,
};
pub use map::{
    any_contains, ranges_cover, AddressRange, BankingLayout, DEFAULT_CONTROL_PORT,
    EXPANSION_BANK_BYTES, EXPANSION_BANK_COUNT, EXPANSION_END, EXPANSION_START, MONITOR_ROM_END,
    MONITOR_ROM_START, PROTECT_END, PROTECT_START, SHADOW_END, SHADOW_START, SHADOW_TARGET_END,
    SHADOW_TARGET_START,
};
pub use system::{Platform, SystemBus};

/// Size in bytes of the flat architectural address space (64 KiB).
pub const ADDRESS_SPACE_BYTES: usize = u16::MAX as usize + 1;

/// Allocates a zeroed 64 KiB address-space backing store.
#[must_use]
pub fn new_address_space() -> Box<[u8]> {
    vec![0; ADDRESS_SPACE_BYTES].into_boxed_slice()
}

/// Everything the processor touches outside its register file.
///
/// Every memory and port access of an executing instruction goes through
/// this trait; the processor never holds a reference to raw memory.
pub trait Bus {
    /// Reads one byte of memory.
    fn read(&mut self, addr: u16) -> u8;

    /// Writes one byte of memory. Implementations may discard the write.
    fn write(&mut self, addr: u16, value: u8);

    /// Reads an 8-bit I/O port.
    fn port_in(&mut self, port: u8) -> u8;

    /// Writes an 8-bit I/O port.
    fn port_out(&mut self, port: u8, value: u8);

    /// Advances attached devices by `cycles` clock cycles.
    fn tick(&mut self, _cycles: u32) {}

    /// Reads a little-endian word.
    fn read_word(&mut self, addr: u16) -> u16 {
        let low = self.read(addr);
        let high = self.read(addr.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }

    /// Writes a little-endian word.
    fn write_word(&mut self, addr: u16, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.write(addr, low);
        self.write(addr.wrapping_add(1), high);
    }
}
