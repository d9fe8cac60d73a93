//! Banking gates decoded from the control-port byte.

/// Control bit that disables the shadow alias when set.
pub const CONTROL_SHADOW_OFF: u8 = 1 << 0;
/// Control bit that enables write protection.
pub const CONTROL_PROTECT: u8 = 1 << 1;
/// Control bit that enables the expansion window.
pub const CONTROL_EXPAND: u8 = 1 << 2;
/// Control bit that selects expansion bank 1.
pub const CONTROL_BANK: u8 = 1 << 3;

/// Current state of the banking gates.
///
/// The shadow gate is active-low, so a machine that has never written the
/// control port boots through the shadow alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(clippy::struct_excessive_bools)]
pub struct BankingState {
    /// Reads of the shadow window come from the shadow target.
    pub shadow: bool,
    /// Writes to the protect range are discarded.
    pub protect: bool,
    /// The expansion window is backed by the selected bank.
    pub expand: bool,
    /// Selected expansion bank (0 or 1).
    pub bank: u8,
}

impl Default for BankingState {
    fn default() -> Self {
        Self::from_control(0)
    }
}

impl BankingState {
    /// Decodes a control-port byte.
    #[must_use]
    pub const fn from_control(value: u8) -> Self {
        Self {
            shadow: value & CONTROL_SHADOW_OFF == 0,
            protect: value & CONTROL_PROTECT != 0,
            expand: value & CONTROL_EXPAND != 0,
            bank: if value & CONTROL_BANK == 0 { 0 } else { 1 },
        }
    }

    /// Encodes the gates back into a control-port byte.
    #[must_use]
    pub const fn to_control(self) -> u8 {
        let mut value = 0;
        if !self.shadow {
            value |= CONTROL_SHADOW_OFF;
        }
        if self.protect {
            value |= CONTROL_PROTECT;
        }
        if self.expand {
            value |= CONTROL_EXPAND;
        }
        if self.bank != 0 {
            value |= CONTROL_BANK;
        }
        value
    }

    /// State with every gate open: no shadow, no protection, no expansion.
    #[must_use]
    pub const fn flat() -> Self {
        Self::from_control(CONTROL_SHADOW_OFF)
    }
}

#[cfg(test)]
mod tests {
    use super::{BankingState, CONTROL_BANK, CONTROL_EXPAND, CONTROL_PROTECT, CONTROL_SHADOW_OFF};

    #[test]
    fn power_on_state_shadows_low_memory() {
        let state = BankingState::default();
        assert!(state.shadow);
        assert!(!state.protect);
        assert!(!state.expand);
        assert_eq!(state.bank, 0);
    }

    #[test]
    fn control_bits_decode_independently() {
        let state = BankingState::from_control(CONTROL_SHADOW_OFF | CONTROL_EXPAND | CONTROL_BANK);
        assert!(!state.shadow);
        assert!(!state.protect);
        assert!(state.expand);
        assert_eq!(state.bank, 1);

        let state = BankingState::from_control(CONTROL_PROTECT);
        assert!(state.shadow && state.protect && !state.expand);
    }

    #[test]
    fn control_encoding_roundtrips_low_nibble() {
        for value in 0_u8..16 {
            assert_eq!(BankingState::from_control(value).to_control(), value);
        }
    }

    #[test]
    fn flat_state_disables_every_redirect() {
        let state = BankingState::flat();
        assert!(!state.shadow && !state.protect && !state.expand);
    }
}
