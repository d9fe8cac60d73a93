use thiserror::Error;

/// Error classes used for diagnostics aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The caller drove the core without the prerequisites in place.
    Precondition,
    /// A program image could not be placed in the 64 KiB address space.
    Image,
}

/// Failures surfaced by the core to its caller.
///
/// Data quality never produces these; they mark programming errors in the
/// host and should stop the current operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum CoreError {
    /// Execution was requested before any bus was bound.
    #[error("no memory bus is bound to the execution controller")]
    BusNotBound,
    /// A raw image does not fit above its load address.
    #[error("image of {len} bytes does not fit at load address 0x{load_address:04X}")]
    ImageTooLarge {
        /// Length of the rejected image.
        len: usize,
        /// Requested load address.
        load_address: u16,
    },
    /// An image targets memory that does not exist on the bound platform.
    #[error("image of {len} bytes exceeds the {capacity}-byte {target}")]
    ImageOutOfRange {
        /// Name of the target region.
        target: &'static str,
        /// Length of the rejected image.
        len: usize,
        /// Capacity of the target region.
        capacity: usize,
    },
    /// Malformed Intel HEX input.
    #[error("invalid Intel HEX at line {line}: {reason}")]
    InvalidHex {
        /// 1-indexed line number of the offending record.
        line: usize,
        /// Short description of the defect.
        reason: &'static str,
    },
}

impl CoreError {
    /// Returns the diagnostics class for this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::BusNotBound => ErrorClass::Precondition,
            Self::ImageTooLarge { .. } | Self::ImageOutOfRange { .. } | Self::InvalidHex { .. } => {
                ErrorClass::Image
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreError, ErrorClass};

    #[test]
    fn class_mapping_matches_error_taxonomy() {
        assert_eq!(CoreError::BusNotBound.class(), ErrorClass::Precondition);
        assert_eq!(
            CoreError::ImageTooLarge {
                len: 70_000,
                load_address: 0
            }
            .class(),
            ErrorClass::Image
        );
        assert_eq!(
            CoreError::InvalidHex {
                line: 1,
                reason: "bad checksum"
            }
            .class(),
            ErrorClass::Image
        );
    }

    #[test]
    fn messages_carry_context() {
        let err = CoreError::ImageTooLarge {
            len: 16,
            load_address: 0xFFF8,
        };
        assert_eq!(
            err.to_string(),
            "image of 16 bytes does not fit at load address 0xFFF8"
        );
    }
}
