/// Execution-controller state machine observed by hosts.
///
/// `Ready -> Running -> {Halted, BreakpointHit}`; reset returns to `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Reset or freshly loaded; nothing executed yet.
    #[default]
    Ready,
    /// Executing, or paused between chunks of a run.
    Running,
    /// The processor executed `HALT` and waits for an interrupt.
    Halted,
    /// A run stopped before executing the instruction at this address.
    BreakpointHit(u16),
}

impl RunState {
    /// Returns the breakpoint address when stopped on one.
    #[must_use]
    pub const fn breakpoint(self) -> Option<u16> {
        match self {
            Self::BreakpointHit(address) => Some(address),
            Self::Ready | Self::Running | Self::Halted => None,
        }
    }

    /// Returns `true` once a run has come to rest on a halt or breakpoint.
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(self, Self::Halted | Self::BreakpointHit(_))
    }
}

#[cfg(test)]
mod tests {
    use super::RunState;

    #[test]
    fn run_state_default_is_ready() {
        assert_eq!(RunState::default(), RunState::Ready);
    }

    #[test]
    fn breakpoint_accessor_reports_only_breakpoint_variant() {
        assert_eq!(RunState::Ready.breakpoint(), None);
        assert_eq!(RunState::Running.breakpoint(), None);
        assert_eq!(RunState::Halted.breakpoint(), None);
        assert_eq!(RunState::BreakpointHit(0x1234).breakpoint(), Some(0x1234));
    }

    #[test]
    fn stopped_states_are_halt_and_breakpoint() {
        assert!(!RunState::Ready.is_stopped());
        assert!(!RunState::Running.is_stopped());
        assert!(RunState::Halted.is_stopped());
        assert!(RunState::BreakpointHit(0).is_stopped());
    }
}
