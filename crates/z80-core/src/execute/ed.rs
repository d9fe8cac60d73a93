//! `ED`-prefixed opcodes. Undefined encodings execute as 8-cycle no-ops.

use super::flags::{adc16, load_flags, neg, parity, sbc16};
use super::{IndexMode, Z80};
use crate::memory::Bus;
use crate::state::{InterruptMode, FLAG_X};
use crate::timing::{cycle_cost, ed_cycles, CycleCostKind};

/// Interrupt mode selected by the `y` field of `ED 46/56/5E` and aliases.
const IM_BY_Y: [InterruptMode; 8] = [
    InterruptMode::Mode0,
    InterruptMode::Mode0,
    InterruptMode::Mode1,
    InterruptMode::Mode2,
    InterruptMode::Mode0,
    InterruptMode::Mode0,
    InterruptMode::Mode1,
    InterruptMode::Mode2,
];

/// Direction and repeat behaviour of a block instruction.
#[derive(Debug, Clone, Copy)]
struct BlockStep {
    decrement: bool,
    repeat: bool,
}

impl Z80 {
    pub(super) fn execute_ed<B: Bus + ?Sized>(&mut self, bus: &mut B, opcode: u8) {
        self.regs.cycles += ed_cycles(opcode);
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;
        match opcode >> 6 {
            1 => self.execute_ed_group1(bus, y, z),
            2 if z <= 3 && y >= 4 => {
                let step = BlockStep {
                    decrement: y & 1 == 1,
                    repeat: y >= 6,
                };
                match z {
                    0 => self.block_load(bus, step),
                    1 => self.block_compare(bus, step),
                    2 => self.block_in(bus, step),
                    _ => self.block_out(bus, step),
                }
            }
            _ => {}
        }
    }

    fn execute_ed_group1<B: Bus + ?Sized>(&mut self, bus: &mut B, y: u8, z: u8) {
        let p = y >> 1;
        let q = y & 1;
        match z {
            0 => {
                // IN r,(C); y = 6 only sets flags.
                let value = bus.port_in(self.regs.main.c);
                let carry = self.regs.main.flags.c;
                load_flags(&mut self.regs.main.flags, value, parity(value));
                self.regs.main.flags.c = carry;
                if y != 6 {
                    self.set_reg8(y, IndexMode::Hl, value);
                }
            }
            1 => {
                let value = if y == 6 {
                    0
                } else {
                    self.reg8(y, IndexMode::Hl)
                };
                bus.port_out(self.regs.main.c, value);
            }
            2 => {
                let hl = self.regs.main.hl();
                let operand = self.reg16(p, IndexMode::Hl);
                let result = if q == 0 {
                    sbc16(&mut self.regs.main.flags, hl, operand)
                } else {
                    adc16(&mut self.regs.main.flags, hl, operand)
                };
                self.regs.main.set_hl(result);
            }
            3 => {
                let addr = self.fetch_word(bus);
                if q == 0 {
                    bus.write_word(addr, self.reg16(p, IndexMode::Hl));
                } else {
                    let value = bus.read_word(addr);
                    self.set_reg16(p, IndexMode::Hl, value);
                }
            }
            4 => {
                let a = self.regs.main.a;
                self.regs.main.a = neg(&mut self.regs.main.flags, a);
            }
            5 => {
                // RETN and RETI both restore IFF1 from IFF2.
                self.regs.pc = self.pop_word(bus);
                self.regs.iff1 = self.regs.iff2;
            }
            6 => self.regs.im = IM_BY_Y[usize::from(y)],
            _ => self.execute_ed_transfer(bus, y),
        }
    }

    /// `LD I,A`, `LD R,A`, `LD A,I`, `LD A,R`, `RRD`, `RLD`.
    fn execute_ed_transfer<B: Bus + ?Sized>(&mut self, bus: &mut B, y: u8) {
        match y {
            0 => self.regs.i = self.regs.main.a,
            1 => self.regs.r = self.regs.main.a,
            2 | 3 => {
                let value = if y == 2 { self.regs.i } else { self.regs.r };
                let carry = self.regs.main.flags.c;
                load_flags(&mut self.regs.main.flags, value, self.regs.iff2);
                self.regs.main.flags.c = carry;
                self.regs.main.a = value;
            }
            4 | 5 => {
                let addr = self.regs.main.hl();
                let memory = bus.read(addr);
                let a = self.regs.main.a;
                let (stored, nibble) = if y == 4 {
                    ((a << 4) | (memory >> 4), memory & 0x0F)
                } else {
                    ((memory << 4) | (a & 0x0F), memory >> 4)
                };
                bus.write(addr, stored);
                let result = (a & 0xF0) | nibble;
                self.regs.main.a = result;
                let carry = self.regs.main.flags.c;
                load_flags(&mut self.regs.main.flags, result, parity(result));
                self.regs.main.flags.c = carry;
            }
            _ => {}
        }
    }

    fn step_hl(&mut self, step: BlockStep) {
        let hl = self.regs.main.hl();
        self.regs.main.set_hl(if step.decrement {
            hl.wrapping_sub(1)
        } else {
            hl.wrapping_add(1)
        });
    }

    fn repeat_block(&mut self) {
        self.regs.pc = self.regs.pc.wrapping_sub(2);
        self.regs.cycles += cycle_cost(CycleCostKind::BlockRepeat);
    }

    /// `LDI LDD LDIR LDDR`.
    fn block_load<B: Bus + ?Sized>(&mut self, bus: &mut B, step: BlockStep) {
        let value = bus.read(self.regs.main.hl());
        let de = self.regs.main.de();
        bus.write(de, value);
        self.step_hl(step);
        self.regs.main.set_de(if step.decrement {
            de.wrapping_sub(1)
        } else {
            de.wrapping_add(1)
        });
        let bc = self.regs.main.bc().wrapping_sub(1);
        self.regs.main.set_bc(bc);

        let n = value.wrapping_add(self.regs.main.a);
        let flags = &mut self.regs.main.flags;
        flags.h = false;
        flags.n = false;
        flags.pv = bc != 0;
        flags.x = n & FLAG_X != 0;
        flags.y = n & 0x02 != 0;

        if step.repeat && bc != 0 {
            self.repeat_block();
        }
    }

    /// `CPI CPD CPIR CPDR`.
    fn block_compare<B: Bus + ?Sized>(&mut self, bus: &mut B, step: BlockStep) {
        let value = bus.read(self.regs.main.hl());
        self.step_hl(step);
        let bc = self.regs.main.bc().wrapping_sub(1);
        self.regs.main.set_bc(bc);

        let a = self.regs.main.a;
        let result = a.wrapping_sub(value);
        let half = (a & 0x0F) < (value & 0x0F);
        let flags = &mut self.regs.main.flags;
        flags.s = result & 0x80 != 0;
        flags.z = result == 0;
        flags.h = half;
        flags.pv = bc != 0;
        flags.n = true;
        let n = result.wrapping_sub(u8::from(half));
        flags.x = n & FLAG_X != 0;
        flags.y = n & 0x02 != 0;

        if step.repeat && bc != 0 && result != 0 {
            self.repeat_block();
        }
    }

    /// `INI IND INIR INDR`.
    fn block_in<B: Bus + ?Sized>(&mut self, bus: &mut B, step: BlockStep) {
        let c = self.regs.main.c;
        let value = bus.port_in(c);
        bus.write(self.regs.main.hl(), value);
        self.step_hl(step);
        let b = self.regs.main.b.wrapping_sub(1);
        self.regs.main.b = b;

        let adjusted_c = if step.decrement {
            c.wrapping_sub(1)
        } else {
            c.wrapping_add(1)
        };
        let k = u16::from(value) + u16::from(adjusted_c);
        self.block_io_flags(value, k, b);

        if step.repeat && b != 0 {
            self.repeat_block();
        }
    }

    /// `OUTI OUTD OTIR OTDR`.
    fn block_out<B: Bus + ?Sized>(&mut self, bus: &mut B, step: BlockStep) {
        let value = bus.read(self.regs.main.hl());
        let b = self.regs.main.b.wrapping_sub(1);
        self.regs.main.b = b;
        bus.port_out(self.regs.main.c, value);
        self.step_hl(step);

        let k = u16::from(value) + u16::from(self.regs.main.l);
        self.block_io_flags(value, k, b);

        if step.repeat && b != 0 {
            self.repeat_block();
        }
    }

    fn block_io_flags(&mut self, value: u8, k: u16, b: u8) {
        let flags = &mut self.regs.main.flags;
        flags.set_szxy(b);
        flags.n = value & 0x80 != 0;
        flags.h = k > 0xFF;
        flags.c = k > 0xFF;
        let [_, low] = k.to_be_bytes();
        flags.pv = parity((low & 0x07) ^ b);
    }
}
