//! `CB` bit operations and their `DDCB`/`FDCB` indexed forms.

use super::flags::{bit, shift, ShiftOp};
use super::{IndexMode, Z80};
use crate::memory::Bus;
use crate::timing::{cb_cycles, indexed_cb_cycles};

impl Z80 {
    /// `CB xx`: rotate/shift, `BIT`, `RES`, `SET` on a register or `(HL)`.
    pub(super) fn execute_cb<B: Bus + ?Sized>(&mut self, bus: &mut B, opcode: u8) {
        self.regs.cycles += cb_cycles(opcode);
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;

        if z == 6 {
            let addr = self.regs.main.hl();
            let value = bus.read(addr);
            // MEMPTR is not modelled; H stands in for the X/Y source.
            let xy_source = self.regs.main.h;
            if let Some(result) = self.bit_operation(opcode, y, value, xy_source) {
                bus.write(addr, result);
            }
        } else {
            let value = self.reg8(z, IndexMode::Hl);
            if let Some(result) = self.bit_operation(opcode, y, value, value) {
                self.set_reg8(z, IndexMode::Hl, result);
            }
        }
    }

    /// `DD CB d xx` / `FD CB d xx`. The displacement precedes the opcode. Non
    /// `BIT` forms also copy the result into the register named by `z`
    /// unless `z` is 6.
    pub(super) fn execute_indexed_cb<B: Bus + ?Sized>(&mut self, bus: &mut B, mode: IndexMode) {
        let addr = self.indirect_address(bus, mode);
        let opcode = self.fetch_byte(bus);
        self.regs.cycles += indexed_cb_cycles(opcode);
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;

        let value = bus.read(addr);
        let xy_source = addr.to_be_bytes()[0];
        if let Some(result) = self.bit_operation(opcode, y, value, xy_source) {
            bus.write(addr, result);
            if z != 6 {
                self.set_reg8(z, IndexMode::Hl, result);
            }
        }
    }

    /// Applies the operation selected by the top two bits of a `CB` opcode.
    /// Returns the byte to write back, or `None` for `BIT`.
    fn bit_operation(&mut self, opcode: u8, y: u8, value: u8, xy_source: u8) -> Option<u8> {
        match opcode >> 6 {
            0 => Some(shift(
                &mut self.regs.main.flags,
                ShiftOp::from_u3(y),
                value,
            )),
            1 => {
                bit(&mut self.regs.main.flags, y, value, xy_source);
                None
            }
            2 => Some(value & !(1 << y)),
            _ => Some(value | (1 << y)),
        }
    }
}
