//! Read/write target resolution for the banked layout.
//!
//! Resolution is pure: given the layout, the gate state and whether the
//! address is ROM, it names the backing store an access lands on. The bus
//! owns the stores and applies the result.

use crate::memory::{BankingLayout, BankingState};

/// Backing store an access resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessTarget {
    /// Base 64 KiB array at the given address.
    Base(u16),
    /// Expansion bank storage.
    Bank {
        /// Selected bank index.
        bank: u8,
        /// Offset inside the bank.
        offset: usize,
    },
}

/// Why a write was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscardReason {
    /// Address is inside a ROM range.
    Rom,
    /// Address is inside the protect range while protection is on.
    Protected,
}

/// Outcome of resolving a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteDisposition {
    /// Store the byte at the target.
    Store(AccessTarget),
    /// Silently drop the byte.
    Discard(DiscardReason),
}

/// Resolves a read. Shadow aliasing wins over the expansion window.
#[must_use]
pub const fn resolve_read(layout: &BankingLayout, state: BankingState, addr: u16) -> AccessTarget {
    if state.shadow && layout.shadow_window.contains(addr) {
        return AccessTarget::Base(layout.shadow_alias(addr));
    }
    if state.expand && layout.expansion_window.contains(addr) {
        return AccessTarget::Bank {
            bank: state.bank,
            offset: layout.expansion_window.offset_of(addr),
        };
    }
    AccessTarget::Base(addr)
}

/// Resolves a write. ROM and protection are checked before the expansion
/// window, so neither can be bypassed through a bank.
#[must_use]
pub const fn resolve_write(
    layout: &BankingLayout,
    state: BankingState,
    is_rom: bool,
    addr: u16,
) -> WriteDisposition {
    if is_rom {
        return WriteDisposition::Discard(DiscardReason::Rom);
    }
    if state.protect && layout.protect_range.contains(addr) {
        return WriteDisposition::Discard(DiscardReason::Protected);
    }
    if state.expand && layout.expansion_window.contains(addr) {
        return WriteDisposition::Store(AccessTarget::Bank {
            bank: state.bank,
            offset: layout.expansion_window.offset_of(addr),
        });
    }
    WriteDisposition::Store(AccessTarget::Base(addr))
}

#[cfg(test)]
mod tests {
    use super::{resolve_read, resolve_write, AccessTarget, DiscardReason, WriteDisposition};
    use crate::memory::{AddressRange, BankingLayout, BankingState};

    #[test]
    fn shadow_alias_takes_priority_over_expansion() {
        let layout = BankingLayout {
            expansion_window: AddressRange::new(0x0000, 0x3FFF),
            ..BankingLayout::default()
        };
        let state = BankingState {
            shadow: true,
            protect: false,
            expand: true,
            bank: 1,
        };
        assert_eq!(
            resolve_read(&layout, state, 0x0010),
            AccessTarget::Base(0xC010)
        );
        assert_eq!(
            resolve_read(&layout, state, 0x0810),
            AccessTarget::Bank {
                bank: 1,
                offset: 0x0810
            }
        );
    }

    #[test]
    fn flat_state_reads_base_everywhere() {
        let layout = BankingLayout::default();
        for addr in [0x0000, 0x07FF, 0x8000, 0xBFFF, 0xFFFF] {
            assert_eq!(
                resolve_read(&layout, BankingState::flat(), addr),
                AccessTarget::Base(addr)
            );
        }
    }

    #[test]
    fn writes_through_shadow_window_land_in_base() {
        let layout = BankingLayout::default();
        assert_eq!(
            resolve_write(&layout, BankingState::default(), false, 0x0010),
            WriteDisposition::Store(AccessTarget::Base(0x0010))
        );
    }

    #[test]
    fn rom_and_protection_win_over_expansion() {
        let layout = BankingLayout {
            protect_range: AddressRange::new(0x8000, 0x8FFF),
            ..BankingLayout::default()
        };
        let state = BankingState {
            shadow: false,
            protect: true,
            expand: true,
            bank: 0,
        };
        assert_eq!(
            resolve_write(&layout, state, true, 0x9000),
            WriteDisposition::Discard(DiscardReason::Rom)
        );
        assert_eq!(
            resolve_write(&layout, state, false, 0x8000),
            WriteDisposition::Discard(DiscardReason::Protected)
        );
        assert_eq!(
            resolve_write(&layout, state, false, 0x9000),
            WriteDisposition::Store(AccessTarget::Bank {
                bank: 0,
                offset: 0x1000
            })
        );
    }

    #[test]
    fn protection_off_allows_protect_range() {
        let layout = BankingLayout::default();
        let state = BankingState::flat();
        assert_eq!(
            resolve_write(&layout, state, false, 0x4000),
            WriteDisposition::Store(AccessTarget::Base(0x4000))
        );
    }
}
