//! Z80 register file: main and alternate banks, index and special
//! registers, interrupt flip-flops, and the `F` flag layout.

/// Power-on value of the stack pointer.
pub const POWER_ON_SP: u16 = 0xFFFF;
/// Power-on value of the accumulator.
pub const POWER_ON_A: u8 = 0xFF;
/// Power-on value of the flag register.
pub const POWER_ON_F: u8 = 0xFF;

/// `F` bit for carry.
pub const FLAG_C: u8 = 1 << 0;
/// `F` bit for add/subtract.
pub const FLAG_N: u8 = 1 << 1;
/// `F` bit for parity/overflow.
pub const FLAG_PV: u8 = 1 << 2;
/// Undocumented `F` bit 3, a copy of result bit 3.
pub const FLAG_X: u8 = 1 << 3;
/// `F` bit for half-carry.
pub const FLAG_H: u8 = 1 << 4;
/// Undocumented `F` bit 5, a copy of result bit 5.
pub const FLAG_Y: u8 = 1 << 5;
/// `F` bit for zero result.
pub const FLAG_Z: u8 = 1 << 6;
/// `F` bit for sign.
pub const FLAG_S: u8 = 1 << 7;

/// The eight single-bit flags of one register bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(clippy::struct_excessive_bools)]
pub struct Flags {
    /// Sign (bit 7 of the result).
    pub s: bool,
    /// Zero result.
    pub z: bool,
    /// Undocumented copy of result bit 5.
    pub y: bool,
    /// Half-carry out of bit 3 (bit 11 for 16-bit arithmetic).
    pub h: bool,
    /// Undocumented copy of result bit 3.
    pub x: bool,
    /// Parity or signed overflow, depending on the instruction.
    pub pv: bool,
    /// Last operation was a subtraction.
    pub n: bool,
    /// Carry out of bit 7 (bit 15 for 16-bit arithmetic).
    pub c: bool,
}

impl Flags {
    /// Packs the flags into the architectural `F` byte.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        let mut value = 0;
        if self.s {
            value |= FLAG_S;
        }
        if self.z {
            value |= FLAG_Z;
        }
        if self.y {
            value |= FLAG_Y;
        }
        if self.h {
            value |= FLAG_H;
        }
        if self.x {
            value |= FLAG_X;
        }
        if self.pv {
            value |= FLAG_PV;
        }
        if self.n {
            value |= FLAG_N;
        }
        if self.c {
            value |= FLAG_C;
        }
        value
    }

    /// Unpacks an architectural `F` byte.
    #[must_use]
    pub const fn from_byte(value: u8) -> Self {
        Self {
            s: value & FLAG_S != 0,
            z: value & FLAG_Z != 0,
            y: value & FLAG_Y != 0,
            h: value & FLAG_H != 0,
            x: value & FLAG_X != 0,
            pv: value & FLAG_PV != 0,
            n: value & FLAG_N != 0,
            c: value & FLAG_C != 0,
        }
    }

    /// Copies the undocumented X/Y bits from `value`.
    pub const fn set_xy(&mut self, value: u8) {
        self.x = value & FLAG_X != 0;
        self.y = value & FLAG_Y != 0;
    }

    /// Sets sign, zero and the X/Y copy bits from a result byte.
    pub const fn set_szxy(&mut self, value: u8) {
        self.s = value & 0x80 != 0;
        self.z = value == 0;
        self.set_xy(value);
    }
}

/// One bank of 8-bit general registers with its own flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub struct RegisterBank {
    pub a: u8,
    pub flags: Flags,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
}

impl RegisterBank {
    /// `AF` pair.
    #[must_use]
    pub const fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.flags.to_byte()])
    }

    /// `BC` pair.
    #[must_use]
    pub const fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    /// `DE` pair.
    #[must_use]
    pub const fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    /// `HL` pair.
    #[must_use]
    pub const fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    /// Writes the `AF` pair.
    pub const fn set_af(&mut self, value: u16) {
        let [a, f] = value.to_be_bytes();
        self.a = a;
        self.flags = Flags::from_byte(f);
    }

    /// Writes the `BC` pair.
    pub const fn set_bc(&mut self, value: u16) {
        let [b, c] = value.to_be_bytes();
        self.b = b;
        self.c = c;
    }

    /// Writes the `DE` pair.
    pub const fn set_de(&mut self, value: u16) {
        let [d, e] = value.to_be_bytes();
        self.d = d;
        self.e = e;
    }

    /// Writes the `HL` pair.
    pub const fn set_hl(&mut self, value: u16) {
        let [h, l] = value.to_be_bytes();
        self.h = h;
        self.l = l;
    }
}

/// Maskable interrupt response mode selected by `IM 0/1/2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InterruptMode {
    /// Execute the instruction placed on the data bus.
    #[default]
    Mode0,
    /// Restart at `0x0038`.
    Mode1,
    /// Vectored through the table addressed by `I` and the data bus.
    Mode2,
}

/// Complete Z80 register file, including interrupt latches and the
/// per-instruction cycle accumulator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(clippy::struct_excessive_bools)]
pub struct RegisterFile {
    /// Active register bank.
    pub main: RegisterBank,
    /// Shadow register bank.
    pub alt: RegisterBank,
    /// Index register `IX`.
    pub ix: u16,
    /// Index register `IY`.
    pub iy: u16,
    /// Interrupt vector base `I`.
    pub i: u8,
    /// Memory refresh counter `R`.
    pub r: u8,
    /// Stack pointer.
    pub sp: u16,
    /// Program counter.
    pub pc: u16,
    /// Current interrupt mode.
    pub im: InterruptMode,
    /// Primary interrupt enable latch.
    pub iff1: bool,
    /// Secondary latch preserving `IFF1` across an NMI.
    pub iff2: bool,
    /// Set by `HALT`, cleared by any accepted interrupt.
    pub halted: bool,
    /// `EI` executed; latches open before the next instruction.
    pub pending_ei: bool,
    /// `DI` executed; latches close before the next instruction.
    pub pending_di: bool,
    /// Cycles accumulated since the last completed `execute_one`.
    pub cycles: u32,
}

impl RegisterFile {
    /// Restores the predictable power-on subset of the register file.
    ///
    /// `BC`, `DE`, `HL`, the shadow bank and the index registers keep
    /// whatever they held, as on real silicon.
    pub fn reset(&mut self) {
        self.sp = POWER_ON_SP;
        self.pc = 0;
        self.main.a = POWER_ON_A;
        self.main.flags = Flags::from_byte(POWER_ON_F);
        self.i = 0;
        self.r = 0;
        self.im = InterruptMode::Mode0;
        self.iff1 = false;
        self.iff2 = false;
        self.halted = false;
        self.pending_ei = false;
        self.pending_di = false;
        self.cycles = 0;
    }

    /// Bumps the low seven bits of `R`, leaving bit 7 untouched.
    pub const fn increment_refresh(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }

    /// `EX AF,AF'`.
    pub fn exchange_af(&mut self) {
        core::mem::swap(&mut self.main.a, &mut self.alt.a);
        core::mem::swap(&mut self.main.flags, &mut self.alt.flags);
    }

    /// `EXX`: swaps `BC`, `DE` and `HL` with their shadow copies.
    pub fn exchange_general(&mut self) {
        core::mem::swap(&mut self.main.b, &mut self.alt.b);
        core::mem::swap(&mut self.main.c, &mut self.alt.c);
        core::mem::swap(&mut self.main.d, &mut self.alt.d);
        core::mem::swap(&mut self.main.e, &mut self.alt.e);
        core::mem::swap(&mut self.main.h, &mut self.alt.h);
        core::mem::swap(&mut self.main.l, &mut self.alt.l);
    }
}
