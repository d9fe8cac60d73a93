//! Flag computation primitives shared by every opcode group.
//!
//! Each helper computes a result and writes the complete architectural flag
//! effect of its instruction class, including the undocumented X/Y copies.

use crate::state::Flags;

const fn build_parity_table() -> [bool; 256] {
    let mut table = [false; 256];
    let mut index = 0;
    while index < 256 {
        #[allow(clippy::cast_possible_truncation)]
        let byte = index as u8;
        table[index] = byte.count_ones() % 2 == 0;
        index += 1;
    }
    table
}

/// Even-parity lookup indexed by result byte (`true` = even number of ones).
pub const PARITY: [bool; 256] = build_parity_table();

/// Returns the parity flag value for `value`.
#[must_use]
pub const fn parity(value: u8) -> bool {
    PARITY[value as usize]
}

/// Sets S, Z, P/V (parity), X, Y from `value` and clears H and N.
const fn set_logic_flags(flags: &mut Flags, value: u8) {
    flags.set_szxy(value);
    flags.pv = parity(value);
    flags.h = false;
    flags.n = false;
}

/// `ADD`/`ADC` on 8-bit operands.
pub const fn add8(flags: &mut Flags, a: u8, value: u8, carry_in: bool) -> u8 {
    let carry = carry_in as u16;
    let sum = a as u16 + value as u16 + carry;
    #[allow(clippy::cast_possible_truncation)]
    let result = sum as u8;
    flags.set_szxy(result);
    flags.h = (a & 0x0F) + (value & 0x0F) + carry as u8 > 0x0F;
    flags.pv = (a ^ value) & 0x80 == 0 && (a ^ result) & 0x80 != 0;
    flags.n = false;
    flags.c = sum > 0xFF;
    result
}

/// `SUB`/`SBC` on 8-bit operands.
pub const fn sub8(flags: &mut Flags, a: u8, value: u8, carry_in: bool) -> u8 {
    let carry = carry_in as i16;
    let diff = a as i16 - value as i16 - carry;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let result = diff as u8;
    flags.set_szxy(result);
    flags.h = ((a & 0x0F) as i16) - ((value & 0x0F) as i16) - carry < 0;
    flags.pv = (a ^ value) & 0x80 != 0 && (a ^ result) & 0x80 != 0;
    flags.n = true;
    flags.c = diff < 0;
    result
}

/// `CP`: a subtraction whose X/Y bits come from the operand, not the result.
pub const fn compare8(flags: &mut Flags, a: u8, value: u8) {
    sub8(flags, a, value, false);
    flags.set_xy(value);
}

/// `AND`.
pub const fn and8(flags: &mut Flags, a: u8, value: u8) -> u8 {
    let result = a & value;
    set_logic_flags(flags, result);
    flags.h = true;
    flags.c = false;
    result
}

/// `OR`.
pub const fn or8(flags: &mut Flags, a: u8, value: u8) -> u8 {
    let result = a | value;
    set_logic_flags(flags, result);
    flags.c = false;
    result
}

/// `XOR`.
pub const fn xor8(flags: &mut Flags, a: u8, value: u8) -> u8 {
    let result = a ^ value;
    set_logic_flags(flags, result);
    flags.c = false;
    result
}

/// `INC r`: carry is preserved.
pub const fn inc8(flags: &mut Flags, value: u8) -> u8 {
    let result = value.wrapping_add(1);
    flags.set_szxy(result);
    flags.h = value & 0x0F == 0x0F;
    flags.pv = value == 0x7F;
    flags.n = false;
    result
}

/// `DEC r`: carry is preserved.
pub const fn dec8(flags: &mut Flags, value: u8) -> u8 {
    let result = value.wrapping_sub(1);
    flags.set_szxy(result);
    flags.h = value & 0x0F == 0x00;
    flags.pv = value == 0x80;
    flags.n = true;
    result
}

/// `ADD HL/IX/IY,rr`: S, Z and P/V are preserved.
pub const fn add16(flags: &mut Flags, left: u16, right: u16) -> u16 {
    let sum = left as u32 + right as u32;
    #[allow(clippy::cast_possible_truncation)]
    let result = sum as u16;
    flags.h = (left & 0x0FFF) + (right & 0x0FFF) > 0x0FFF;
    flags.n = false;
    flags.c = sum > 0xFFFF;
    flags.set_xy(result.to_be_bytes()[0]);
    result
}

/// `ADC HL,rr`.
pub const fn adc16(flags: &mut Flags, left: u16, right: u16) -> u16 {
    let carry = flags.c as u32;
    let sum = left as u32 + right as u32 + carry;
    #[allow(clippy::cast_possible_truncation)]
    let result = sum as u16;
    let high = result.to_be_bytes()[0];
    flags.s = result & 0x8000 != 0;
    flags.z = result == 0;
    flags.set_xy(high);
    flags.h = (left & 0x0FFF) as u32 + (right & 0x0FFF) as u32 + carry > 0x0FFF;
    flags.pv = (left ^ right) & 0x8000 == 0 && (left ^ result) & 0x8000 != 0;
    flags.n = false;
    flags.c = sum > 0xFFFF;
    result
}

/// `SBC HL,rr`.
pub const fn sbc16(flags: &mut Flags, left: u16, right: u16) -> u16 {
    let carry = flags.c as i32;
    let diff = left as i32 - right as i32 - carry;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let result = diff as u16;
    let high = result.to_be_bytes()[0];
    flags.s = result & 0x8000 != 0;
    flags.z = result == 0;
    flags.set_xy(high);
    flags.h = ((left & 0x0FFF) as i32) - ((right & 0x0FFF) as i32) - carry < 0;
    flags.pv = (left ^ right) & 0x8000 != 0 && (left ^ result) & 0x8000 != 0;
    flags.n = true;
    flags.c = diff < 0;
    result
}

/// Rotate and shift operations of the `CB` group, in opcode order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftOp {
    /// Rotate left circular.
    Rlc,
    /// Rotate right circular.
    Rrc,
    /// Rotate left through carry.
    Rl,
    /// Rotate right through carry.
    Rr,
    /// Shift left arithmetic.
    Sla,
    /// Shift right arithmetic, keeping bit 7.
    Sra,
    /// Undocumented shift left shifting in a one.
    Sll,
    /// Shift right logical.
    Srl,
}

impl ShiftOp {
    /// All operations indexed by the `y` field of a `CB` opcode.
    pub const ALL: [Self; 8] = [
        Self::Rlc,
        Self::Rrc,
        Self::Rl,
        Self::Rr,
        Self::Sla,
        Self::Sra,
        Self::Sll,
        Self::Srl,
    ];

    /// Decodes the 3-bit operation field of a `CB` opcode.
    #[must_use]
    pub const fn from_u3(bits: u8) -> Self {
        Self::ALL[(bits & 0x07) as usize]
    }
}

/// Applies a `CB`-group rotate/shift, setting S, Z, P/V, X, Y from the result,
/// clearing H and N, and setting C from the bit shifted out.
pub const fn shift(flags: &mut Flags, op: ShiftOp, value: u8) -> u8 {
    let carry_in = flags.c as u8;
    let (result, carry_out) = match op {
        ShiftOp::Rlc => (value.rotate_left(1), value & 0x80 != 0),
        ShiftOp::Rrc => (value.rotate_right(1), value & 0x01 != 0),
        ShiftOp::Rl => ((value << 1) | carry_in, value & 0x80 != 0),
        ShiftOp::Rr => ((value >> 1) | (carry_in << 7), value & 0x01 != 0),
        ShiftOp::Sla => (value << 1, value & 0x80 != 0),
        ShiftOp::Sra => ((value >> 1) | (value & 0x80), value & 0x01 != 0),
        ShiftOp::Sll => ((value << 1) | 0x01, value & 0x80 != 0),
        ShiftOp::Srl => (value >> 1, value & 0x01 != 0),
    };
    set_logic_flags(flags, result);
    flags.c = carry_out;
    if matches!(op, ShiftOp::Srl) {
        flags.s = false;
    }
    result
}

/// Accumulator rotates (`RLCA`, `RRCA`, `RLA`, `RRA`): only H, N, C and
/// X/Y change.
pub const fn rotate_accumulator(flags: &mut Flags, op: ShiftOp, a: u8) -> u8 {
    let saved = (flags.s, flags.z, flags.pv);
    let result = shift(flags, op, a);
    flags.s = saved.0;
    flags.z = saved.1;
    flags.pv = saved.2;
    result
}

/// `BIT b,r`: X/Y come from `xy_source`, which differs for memory operands.
pub const fn bit(flags: &mut Flags, bit_index: u8, value: u8, xy_source: u8) {
    let set = value & (1 << (bit_index & 0x07)) != 0;
    flags.z = !set;
    flags.pv = !set;
    flags.s = bit_index == 7 && set;
    flags.h = true;
    flags.n = false;
    flags.set_xy(xy_source);
}

/// `DAA`: decimal adjust after an 8-bit addition or subtraction.
pub const fn daa(flags: &mut Flags, a: u8) -> u8 {
    let mut correction = 0u8;
    let mut carry = flags.c;
    if flags.h || a & 0x0F > 9 {
        correction |= 0x06;
    }
    if flags.c || a > 0x99 {
        correction |= 0x60;
        carry = true;
    }
    let result = if flags.n {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    flags.h = if flags.n {
        flags.h && a & 0x0F < 6
    } else {
        a & 0x0F > 9
    };
    flags.set_szxy(result);
    flags.pv = parity(result);
    flags.c = carry;
    result
}

/// `CPL`.
pub const fn cpl(flags: &mut Flags, a: u8) -> u8 {
    let result = !a;
    flags.h = true;
    flags.n = true;
    flags.set_xy(result);
    result
}

/// `NEG`, computed as `0 - A`.
pub const fn neg(flags: &mut Flags, a: u8) -> u8 {
    sub8(flags, 0, a, false)
}

/// `SCF`.
pub const fn scf(flags: &mut Flags, a: u8) {
    flags.h = false;
    flags.n = false;
    flags.c = true;
    flags.set_xy(a);
}

/// `CCF`: H takes the previous carry.
pub const fn ccf(flags: &mut Flags, a: u8) {
    flags.h = flags.c;
    flags.n = false;
    flags.c = !flags.c;
    flags.set_xy(a);
}

/// Flags for `IN r,(C)`, `RLD`, `RRD` and `LD A,I/R` style loads of `value`.
pub const fn load_flags(flags: &mut Flags, value: u8, pv: bool) {
    flags.set_szxy(value);
    flags.h = false;
    flags.n = false;
    flags.pv = pv;
}
