//! Program images bound to the bus at load or reset time.

use log::debug;

use crate::memory::{new_address_space, ADDRESS_SPACE_BYTES};
use crate::CoreError;

const HEX_RECORD_DATA: u8 = 0x00;
const HEX_RECORD_EOF: u8 = 0x01;
const HEX_RECORD_EXTENDED_SEGMENT: u8 = 0x02;
const HEX_RECORD_START_SEGMENT: u8 = 0x03;
const HEX_RECORD_EXTENDED_LINEAR: u8 = 0x04;
const HEX_RECORD_START_LINEAR: u8 = 0x05;

/// A full 64 KiB memory image plus the address execution starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    bytes: Box<[u8]>,
    start_address: u16,
}

impl Default for ProgramImage {
    fn default() -> Self {
        Self {
            bytes: new_address_space(),
            start_address: 0,
        }
    }
}

impl ProgramImage {
    /// Places `data` at `load_address` in an otherwise zeroed image. The start
    /// address is the load address.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ImageTooLarge`] when `data` runs past `0xFFFF`.
    pub fn from_bytes(load_address: u16, data: &[u8]) -> Result<Self, CoreError> {
        let start = usize::from(load_address);
        if start + data.len() > ADDRESS_SPACE_BYTES {
            return Err(CoreError::ImageTooLarge {
                len: data.len(),
                load_address,
            });
        }
        let mut image = Self {
            start_address: load_address,
            ..Self::default()
        };
        image.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(image)
    }

    /// Parses Intel HEX text.
    ///
    /// Extended segment and linear address records are honoured as long as
    /// the resulting addresses stay inside 64 KiB. A start address record sets
    /// the start address; otherwise it is the lowest address written.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHex`] for malformed records or a checksum
    /// mismatch, and [`CoreError::ImageOutOfRange`] for data beyond 64 KiB.
    pub fn from_intel_hex(text: &str) -> Result<Self, CoreError> {
        let mut image = Self::default();
        let mut base: u32 = 0;
        let mut explicit_start = None;
        let mut lowest = None::<u16>;
        let mut records = 0_usize;

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let record = raw.trim();
            if record.is_empty() {
                continue;
            }
            let bytes = decode_record(record, line)?;
            records += 1;

            let len = usize::from(bytes[0]);
            let offset = u16::from_be_bytes([bytes[1], bytes[2]]);
            let kind = bytes[3];
            let payload = &bytes[4..4 + len];

            match kind {
                HEX_RECORD_DATA => {
                    let addr = base + u32::from(offset);
                    let end = addr as usize + payload.len();
                    if end > ADDRESS_SPACE_BYTES {
                        return Err(CoreError::ImageOutOfRange {
                            target: "address space",
                            len: end,
                            capacity: ADDRESS_SPACE_BYTES,
                        });
                    }
                    image.bytes[addr as usize..end].copy_from_slice(payload);
                    if !payload.is_empty() {
                        #[allow(clippy::cast_possible_truncation)]
                        let addr = addr as u16;
                        lowest = Some(lowest.map_or(addr, |low| low.min(addr)));
                    }
                }
                HEX_RECORD_EOF => break,
                HEX_RECORD_EXTENDED_SEGMENT => {
                    base = u32::from(payload_word(payload, line)?) << 4;
                }
                HEX_RECORD_EXTENDED_LINEAR => {
                    base = u32::from(payload_word(payload, line)?) << 16;
                }
                HEX_RECORD_START_SEGMENT | HEX_RECORD_START_LINEAR => {
                    if payload.len() != 4 {
                        return Err(CoreError::InvalidHex {
                            line,
                            reason: "start address record must carry four bytes",
                        });
                    }
                    explicit_start = Some(u16::from_be_bytes([payload[2], payload[3]]));
                }
                _ => {
                    return Err(CoreError::InvalidHex {
                        line,
                        reason: "unknown record type",
                    })
                }
            }
        }

        image.start_address = explicit_start.or(lowest).unwrap_or(0);
        debug!(
            "parsed {records} Intel HEX records, start address 0x{:04X}",
            image.start_address
        );
        Ok(image)
    }

    /// Overrides the start address.
    #[must_use]
    pub const fn with_start_address(mut self, start_address: u16) -> Self {
        self.start_address = start_address;
        self
    }

    /// The 64 KiB image contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Address execution starts from when no entry is given.
    #[must_use]
    pub const fn start_address(&self) -> u16 {
        self.start_address
    }
}

fn decode_record(record: &str, line: usize) -> Result<Vec<u8>, CoreError> {
    let Some(digits) = record.strip_prefix(':') else {
        return Err(CoreError::InvalidHex {
            line,
            reason: "record does not start with ':'",
        });
    };
    if !digits.is_ascii() {
        return Err(CoreError::InvalidHex {
            line,
            reason: "record contains a non-hex digit",
        });
    }
    if digits.len() % 2 != 0 || digits.len() < 10 {
        return Err(CoreError::InvalidHex {
            line,
            reason: "record has an odd or short digit count",
        });
    }
    let bytes = (0..digits.len())
        .step_by(2)
        .map(|at| u8::from_str_radix(&digits[at..at + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| CoreError::InvalidHex {
            line,
            reason: "record contains a non-hex digit",
        })?;

    if bytes.len() != usize::from(bytes[0]) + 5 {
        return Err(CoreError::InvalidHex {
            line,
            reason: "record length does not match its byte count",
        });
    }
    let sum = bytes.iter().fold(0_u8, |acc, byte| acc.wrapping_add(*byte));
    if sum != 0 {
        return Err(CoreError::InvalidHex {
            line,
            reason: "checksum mismatch",
        });
    }
    Ok(bytes)
}

fn payload_word(payload: &[u8], line: usize) -> Result<u16, CoreError> {
    match payload {
        [high, low] => Ok(u16::from_be_bytes([*high, *low])),
        _ => Err(CoreError::InvalidHex {
            line,
            reason: "address record must carry two bytes",
        }),
    }
}
