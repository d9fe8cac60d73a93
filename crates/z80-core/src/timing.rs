//! Clock-cycle costs of every opcode group and interrupt response.
//!
//! Opcode tables hold the cost of the untaken path; conditional extras are
//! charged separately through [`CycleCostKind`] when a branch is taken or a
//! block instruction repeats.

/// Fixed costs charged outside the per-opcode tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleCostKind {
    /// One idle cycle while halted.
    HaltIdle,
    /// Non-maskable interrupt acknowledge and restart.
    NmiResponse,
    /// Mode 0 acknowledge, before the supplied instruction's own cost.
    Mode0Response,
    /// Mode 1 acknowledge and restart.
    Mode1Response,
    /// Mode 2 acknowledge and vector fetch.
    Mode2Response,
    /// Extra cost of a taken `JR cc` or `DJNZ`.
    RelativeJumpTaken,
    /// Extra cost of a taken `CALL cc`.
    CallTaken,
    /// Extra cost of a taken `RET cc`.
    ReturnTaken,
    /// Extra cost of a repeating block instruction iteration.
    BlockRepeat,
    /// `DD`/`FD` prefix fetch.
    IndexPrefix,
    /// Displacement fetch and address add for `(IX+d)` operands.
    IndexDisplacement,
    /// Displacement fetch for `LD (IX+d),n`, overlapped with the immediate.
    IndexImmediateDisplacement,
    /// `DDCB`/`FDCB` bit test.
    IndexedBitTest,
    /// `DDCB`/`FDCB` rotate, shift, set or reset.
    IndexedBitModify,
}

/// Single source-of-truth table for the fixed costs.
pub const CYCLE_COST_TABLE: &[(CycleCostKind, u32)] = &[
    (CycleCostKind::HaltIdle, 1),
    (CycleCostKind::NmiResponse, 11),
    (CycleCostKind::Mode0Response, 2),
    (CycleCostKind::Mode1Response, 13),
    (CycleCostKind::Mode2Response, 19),
    (CycleCostKind::RelativeJumpTaken, 5),
    (CycleCostKind::CallTaken, 7),
    (CycleCostKind::ReturnTaken, 6),
    (CycleCostKind::BlockRepeat, 5),
    (CycleCostKind::IndexPrefix, 4),
    (CycleCostKind::IndexDisplacement, 8),
    (CycleCostKind::IndexImmediateDisplacement, 5),
    (CycleCostKind::IndexedBitTest, 20),
    (CycleCostKind::IndexedBitModify, 23),
];

/// Returns the fixed cost for `kind`.
#[must_use]
pub const fn cycle_cost(kind: CycleCostKind) -> u32 {
    match kind {
        CycleCostKind::HaltIdle => 1,
        CycleCostKind::NmiResponse => 11,
        CycleCostKind::Mode0Response => 2,
        CycleCostKind::Mode1Response => 13,
        CycleCostKind::Mode2Response => 19,
        CycleCostKind::RelativeJumpTaken => 5,
        CycleCostKind::CallTaken => 7,
        CycleCostKind::ReturnTaken => 6,
        CycleCostKind::BlockRepeat => 5,
        CycleCostKind::IndexPrefix => 4,
        CycleCostKind::IndexDisplacement => 8,
        CycleCostKind::IndexImmediateDisplacement => 5,
        CycleCostKind::IndexedBitTest => 20,
        CycleCostKind::IndexedBitModify => 23,
    }
}

/// Unprefixed opcode costs, untaken path. Prefix bytes hold zero.
#[rustfmt::skip]
pub const BASE_CYCLES: [u8; 256] = [
    4, 10,  7,  6,  4,  4,  7,  4,  4, 11,  7,  6,  4,  4,  7,  4,
    8, 10,  7,  6,  4,  4,  7,  4, 12, 11,  7,  6,  4,  4,  7,  4,
    7, 10, 16,  6,  4,  4,  7,  4,  7, 11, 16,  6,  4,  4,  7,  4,
    7, 10, 13,  6, 11, 11, 10,  4,  7, 11, 13,  6,  4,  4,  7,  4,
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
    7,  7,  7,  7,  7,  7,  4,  7,  4,  4,  4,  4,  4,  4,  7,  4,
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
    4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4,
    5, 10, 10, 10, 10, 11,  7, 11,  5, 10, 10,  0, 10, 17,  7, 11,
    5, 10, 10, 11, 10, 11,  7, 11,  5,  4, 10, 11, 10,  0,  7, 11,
    5, 10, 10, 19, 10, 11,  7, 11,  5,  4, 10,  4, 10,  0,  7, 11,
    5, 10, 10,  4, 10, 11,  7, 11,  5,  6, 10,  4, 10,  0,  7, 11,
];

const fn build_ed_cycles() -> [u8; 256] {
    let mut table = [8_u8; 256];
    let mut opcode = 0x40;
    while opcode < 0x80 {
        table[opcode] = match opcode & 0x07 {
            0 | 1 => 12,
            2 => 15,
            3 => 20,
            5 => 14,
            7 => match opcode {
                0x47 | 0x4F | 0x57 | 0x5F => 9,
                0x67 | 0x6F => 18,
                _ => 8,
            },
            _ => 8,
        };
        opcode += 1;
    }
    let mut block = 0xA0;
    while block < 0xC0 {
        if block & 0x07 < 4 {
            table[block] = 16;
        }
        block += 1;
    }
    table
}

/// `ED`-prefixed opcode costs including the prefix, untaken path. Undefined
/// opcodes cost 8.
pub const ED_CYCLES: [u8; 256] = build_ed_cycles();

/// Returns `true` when an unprefixed opcode reads or writes `(HL)`, which an
/// index prefix turns into an `(IX+d)` operand.
#[must_use]
pub const fn uses_indirect_hl(opcode: u8) -> bool {
    match opcode {
        0x34..=0x36 => true,
        0x76 => false,
        0x40..=0x7F => opcode & 0x07 == 6 || (opcode >> 3) & 0x07 == 6,
        0x80..=0xBF => opcode & 0x07 == 6,
        _ => false,
    }
}

/// Cost of an unprefixed opcode.
#[must_use]
pub const fn base_cycles(opcode: u8) -> u32 {
    BASE_CYCLES[opcode as usize] as u32
}

/// Cost of an `ED`-prefixed opcode.
#[must_use]
pub const fn ed_cycles(opcode: u8) -> u32 {
    ED_CYCLES[opcode as usize] as u32
}

/// Cost of a `CB`-prefixed opcode including the prefix.
#[must_use]
pub const fn cb_cycles(opcode: u8) -> u32 {
    if opcode & 0x07 != 6 {
        8
    } else if opcode >> 6 == 1 {
        12
    } else {
        15
    }
}

/// Cost of an opcode following a `DD`/`FD` prefix, including the prefix.
#[must_use]
pub const fn indexed_cycles(opcode: u8) -> u32 {
    let mut cost = cycle_cost(CycleCostKind::IndexPrefix) + base_cycles(opcode);
    if uses_indirect_hl(opcode) {
        cost += if opcode == 0x36 {
            cycle_cost(CycleCostKind::IndexImmediateDisplacement)
        } else {
            cycle_cost(CycleCostKind::IndexDisplacement)
        };
    }
    cost
}

/// Cost of a `DDCB`/`FDCB` opcode including both prefixes.
#[must_use]
pub const fn indexed_cb_cycles(opcode: u8) -> u32 {
    if opcode >> 6 == 1 {
        cycle_cost(CycleCostKind::IndexedBitTest)
    } else {
        cycle_cost(CycleCostKind::IndexedBitModify)
    }
}
