//! Unprefixed opcodes, also reached through `DD`/`FD` with `HL` replaced by
//! the index register.

use super::flags::{
    add16, add8, and8, ccf, compare8, cpl, daa, dec8, inc8, or8, rotate_accumulator, scf, sub8,
    xor8, ShiftOp,
};
use super::{IndexMode, Z80};
use crate::memory::Bus;
use crate::timing::{cycle_cost, CycleCostKind};

impl Z80 {
    /// Executes an unprefixed opcode decoded as `x y z` fields (`p = y >> 1`,
    /// `q = y & 1`). The caller has already charged the opcode's cost.
    pub(super) fn execute_base<B: Bus + ?Sized>(
        &mut self,
        bus: &mut B,
        opcode: u8,
        mode: IndexMode,
    ) {
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;
        match opcode >> 6 {
            0 => self.execute_block0(bus, y, z, mode),
            1 => self.execute_load8(bus, y, z, mode),
            2 => {
                let value = self.alu_operand(bus, z, mode);
                self.alu(y, value);
            }
            _ => self.execute_block3(bus, y, z, mode),
        }
    }

    fn execute_block0<B: Bus + ?Sized>(&mut self, bus: &mut B, y: u8, z: u8, mode: IndexMode) {
        let p = y >> 1;
        let q = y & 1;
        match z {
            0 => self.execute_relative(bus, y),
            1 => {
                if q == 0 {
                    let value = self.fetch_word(bus);
                    self.set_reg16(p, mode, value);
                } else {
                    let left = self.index_register(mode);
                    let right = self.reg16(p, mode);
                    let result = add16(&mut self.regs.main.flags, left, right);
                    self.set_index_register(mode, result);
                }
            }
            2 => self.execute_indirect_load(bus, p, q, mode),
            3 => {
                let value = self.reg16(p, mode);
                let value = if q == 0 {
                    value.wrapping_add(1)
                } else {
                    value.wrapping_sub(1)
                };
                self.set_reg16(p, mode, value);
            }
            4 | 5 => {
                let increment = z == 4;
                if y == 6 {
                    let addr = self.indirect_address(bus, mode);
                    let value = bus.read(addr);
                    let result = self.inc_dec(increment, value);
                    bus.write(addr, result);
                } else {
                    let value = self.reg8(y, mode);
                    let result = self.inc_dec(increment, value);
                    self.set_reg8(y, mode, result);
                }
            }
            6 => {
                if y == 6 {
                    let addr = self.indirect_address(bus, mode);
                    let value = self.fetch_byte(bus);
                    bus.write(addr, value);
                } else {
                    let value = self.fetch_byte(bus);
                    self.set_reg8(y, mode, value);
                }
            }
            _ => self.execute_accumulator_op(y),
        }
    }

    /// `NOP`, `EX AF,AF'`, `DJNZ`, `JR` and `JR cc`.
    fn execute_relative<B: Bus + ?Sized>(&mut self, bus: &mut B, y: u8) {
        match y {
            0 => {}
            1 => self.regs.exchange_af(),
            2 => {
                let displacement = self.fetch_displacement(bus);
                self.regs.main.b = self.regs.main.b.wrapping_sub(1);
                if self.regs.main.b != 0 {
                    self.jump_relative(displacement);
                    self.regs.cycles += cycle_cost(CycleCostKind::RelativeJumpTaken);
                }
            }
            3 => {
                let displacement = self.fetch_displacement(bus);
                self.jump_relative(displacement);
            }
            _ => {
                let displacement = self.fetch_displacement(bus);
                if self.condition(y - 4) {
                    self.jump_relative(displacement);
                    self.regs.cycles += cycle_cost(CycleCostKind::RelativeJumpTaken);
                }
            }
        }
    }

    fn jump_relative(&mut self, displacement: i8) {
        self.regs.pc = self.regs.pc.wrapping_add_signed(i16::from(displacement));
    }

    /// `LD (BC)/(DE)/(nn),A`, `LD (nn),HL` and their loading counterparts.
    fn execute_indirect_load<B: Bus + ?Sized>(
        &mut self,
        bus: &mut B,
        p: u8,
        q: u8,
        mode: IndexMode,
    ) {
        match (q, p) {
            (0, 0) => bus.write(self.regs.main.bc(), self.regs.main.a),
            (0, 1) => bus.write(self.regs.main.de(), self.regs.main.a),
            (0, 2) => {
                let addr = self.fetch_word(bus);
                bus.write_word(addr, self.index_register(mode));
            }
            (0, _) => {
                let addr = self.fetch_word(bus);
                bus.write(addr, self.regs.main.a);
            }
            (_, 0) => self.regs.main.a = bus.read(self.regs.main.bc()),
            (_, 1) => self.regs.main.a = bus.read(self.regs.main.de()),
            (_, 2) => {
                let addr = self.fetch_word(bus);
                let value = bus.read_word(addr);
                self.set_index_register(mode, value);
            }
            (_, _) => {
                let addr = self.fetch_word(bus);
                self.regs.main.a = bus.read(addr);
            }
        }
    }

    fn inc_dec(&mut self, increment: bool, value: u8) -> u8 {
        if increment {
            inc8(&mut self.regs.main.flags, value)
        } else {
            dec8(&mut self.regs.main.flags, value)
        }
    }

    /// `RLCA RRCA RLA RRA DAA CPL SCF CCF`.
    fn execute_accumulator_op(&mut self, y: u8) {
        let flags = &mut self.regs.main.flags;
        let a = self.regs.main.a;
        match y {
            0 => self.regs.main.a = rotate_accumulator(flags, ShiftOp::Rlc, a),
            1 => self.regs.main.a = rotate_accumulator(flags, ShiftOp::Rrc, a),
            2 => self.regs.main.a = rotate_accumulator(flags, ShiftOp::Rl, a),
            3 => self.regs.main.a = rotate_accumulator(flags, ShiftOp::Rr, a),
            4 => self.regs.main.a = daa(flags, a),
            5 => self.regs.main.a = cpl(flags, a),
            6 => scf(flags, a),
            _ => ccf(flags, a),
        }
    }

    /// `LD r,r'` and `HALT`. With an `(IX+d)` operand the other register is
    /// the plain `H`/`L`.
    fn execute_load8<B: Bus + ?Sized>(&mut self, bus: &mut B, y: u8, z: u8, mode: IndexMode) {
        if y == 6 && z == 6 {
            self.regs.halted = true;
        } else if z == 6 {
            let addr = self.indirect_address(bus, mode);
            let value = bus.read(addr);
            self.set_reg8(y, IndexMode::Hl, value);
        } else if y == 6 {
            let addr = self.indirect_address(bus, mode);
            bus.write(addr, self.reg8(z, IndexMode::Hl));
        } else {
            let value = self.reg8(z, mode);
            self.set_reg8(y, mode, value);
        }
    }

    fn alu_operand<B: Bus + ?Sized>(&mut self, bus: &mut B, z: u8, mode: IndexMode) -> u8 {
        if z == 6 {
            let addr = self.indirect_address(bus, mode);
            bus.read(addr)
        } else {
            self.reg8(z, mode)
        }
    }

    /// `ADD ADC SUB SBC AND XOR OR CP` on the accumulator.
    pub(super) fn alu(&mut self, operation: u8, value: u8) {
        let flags = &mut self.regs.main.flags;
        let a = self.regs.main.a;
        let carry = flags.c;
        self.regs.main.a = match operation & 0x07 {
            0 => add8(flags, a, value, false),
            1 => add8(flags, a, value, carry),
            2 => sub8(flags, a, value, false),
            3 => sub8(flags, a, value, carry),
            4 => and8(flags, a, value),
            5 => xor8(flags, a, value),
            6 => or8(flags, a, value),
            _ => {
                compare8(flags, a, value);
                a
            }
        };
    }

    fn execute_block3<B: Bus + ?Sized>(&mut self, bus: &mut B, y: u8, z: u8, mode: IndexMode) {
        let p = y >> 1;
        let q = y & 1;
        match z {
            0 => {
                if self.condition(y) {
                    self.regs.pc = self.pop_word(bus);
                    self.regs.cycles += cycle_cost(CycleCostKind::ReturnTaken);
                }
            }
            1 => {
                if q == 0 {
                    let value = self.pop_word(bus);
                    self.set_reg16_stack(p, mode, value);
                } else {
                    match p {
                        0 => self.regs.pc = self.pop_word(bus),
                        1 => self.regs.exchange_general(),
                        2 => self.regs.pc = self.index_register(mode),
                        _ => self.regs.sp = self.index_register(mode),
                    }
                }
            }
            2 => {
                let target = self.fetch_word(bus);
                if self.condition(y) {
                    self.regs.pc = target;
                }
            }
            3 => self.execute_misc(bus, y, mode),
            4 => {
                let target = self.fetch_word(bus);
                if self.condition(y) {
                    self.call(bus, target);
                    self.regs.cycles += cycle_cost(CycleCostKind::CallTaken);
                }
            }
            5 => {
                if q == 0 {
                    let value = self.reg16_stack(p, mode);
                    self.push_word(bus, value);
                } else if p == 0 {
                    let target = self.fetch_word(bus);
                    self.call(bus, target);
                }
                // p = 1..=3 are the DD/ED/FD prefixes, consumed by dispatch.
            }
            6 => {
                let value = self.fetch_byte(bus);
                self.alu(y, value);
            }
            _ => self.call(bus, u16::from(y) * 8),
        }
    }

    /// `JP nn`, `OUT (n),A`, `IN A,(n)`, `EX (SP),HL`, `EX DE,HL`, `DI`, `EI`.
    fn execute_misc<B: Bus + ?Sized>(&mut self, bus: &mut B, y: u8, mode: IndexMode) {
        match y {
            0 => self.regs.pc = self.fetch_word(bus),
            // y = 1 is the CB prefix, consumed by dispatch.
            1 => {}
            2 => {
                let port = self.fetch_byte(bus);
                bus.port_out(port, self.regs.main.a);
            }
            3 => {
                let port = self.fetch_byte(bus);
                self.regs.main.a = bus.port_in(port);
            }
            4 => {
                let sp = self.regs.sp;
                let stacked = bus.read_word(sp);
                bus.write_word(sp, self.index_register(mode));
                self.set_index_register(mode, stacked);
            }
            5 => {
                let de = self.regs.main.de();
                self.regs.main.set_de(self.regs.main.hl());
                self.regs.main.set_hl(de);
            }
            6 => self.regs.pending_di = true,
            _ => self.regs.pending_ei = true,
        }
    }

    fn call<B: Bus + ?Sized>(&mut self, bus: &mut B, target: u16) {
        self.push_word(bus, self.regs.pc);
        self.regs.pc = target;
    }
}

#[cfg(test)]
mod tests {
    use crate::execute::tests::TestBus;
    use crate::execute::Z80;

    fn run(program: &[u8], steps: usize) -> (Z80, TestBus, u32) {
        let mut bus = TestBus::with_program(0, program);
        let mut cpu = Z80::new();
        let mut cycles = 0;
        for _ in 0..steps {
            cycles += cpu.execute_one(&mut bus);
        }
        (cpu, bus, cycles)
    }

    #[test]
    fn load_immediate_and_store_through_hl() {
        // LD HL,0x4000 ; LD (HL),0x5A ; LD A,(HL)
        let (cpu, bus, cycles) = run(&[0x21, 0x00, 0x40, 0x36, 0x5A, 0x7E], 3);
        assert_eq!(bus.memory[0x4000], 0x5A);
        assert_eq!(cpu.registers().main.a, 0x5A);
        assert_eq!(cycles, 10 + 10 + 7);
    }

    #[test]
    fn djnz_loops_until_b_reaches_zero() {
        // LD B,3 ; loop: DJNZ loop
        let (cpu, _, cycles) = run(&[0x06, 0x03, 0x10, 0xFE], 4);
        assert_eq!(cpu.registers().main.b, 0);
        assert_eq!(cpu.registers().pc, 4);
        assert_eq!(cycles, 7 + 13 + 13 + 8);
    }

    #[test]
    fn conditional_jumps_charge_taken_cost() {
        // XOR A ; JR Z,+2 ; NOP ; NOP ; JR NZ,-2
        let (cpu, _, cycles) = run(&[0xAF, 0x28, 0x02, 0x00, 0x00, 0x20, 0xFE], 3);
        assert_eq!(cpu.registers().pc, 7);
        assert_eq!(cycles, 4 + 12 + 7);
    }

    #[test]
    fn call_and_return_use_stack() {
        // LD SP,0x8000 ; CALL 0x0010 ; ... 0x0010: RET
        let mut program = vec![0x31, 0x00, 0x80, 0xCD, 0x10, 0x00];
        program.resize(0x10, 0);
        program.push(0xC9);
        let (cpu, bus, cycles) = run(&program, 3);
        assert_eq!(cpu.registers().pc, 0x0006);
        assert_eq!(cpu.registers().sp, 0x8000);
        assert_eq!(bus.memory[0x7FFF], 0x00);
        assert_eq!(bus.memory[0x7FFE], 0x06);
        assert_eq!(cycles, 10 + 17 + 10);
    }

    #[test]
    fn out_immediate_reaches_port_hook() {
        // LD A,0x42 ; OUT (0x01),A
        let (_, bus, _) = run(&[0x3E, 0x42, 0xD3, 0x01], 2);
        assert_eq!(bus.outputs, vec![(0x01, 0x42)]);
    }

    #[test]
    fn push_pop_af_preserves_undocumented_bits() {
        // LD SP,0x8000 ; LD BC,0x12FF ; PUSH BC ; POP AF
        let (cpu, _, _) = run(&[0x31, 0x00, 0x80, 0x01, 0xFF, 0x12, 0xC5, 0xF1], 4);
        assert_eq!(cpu.registers().main.af(), 0x12FF);
    }

    #[test]
    fn indexed_load_uses_signed_displacement() {
        // LD IX,0x4010 ; LD (IX-0x10),0x77 ; LD B,(IX-0x10)
        let program = [
            0xDD, 0x21, 0x10, 0x40, 0xDD, 0x36, 0xF0, 0x77, 0xDD, 0x46, 0xF0,
        ];
        let (cpu, bus, cycles) = run(&program, 3);
        assert_eq!(bus.memory[0x4000], 0x77);
        assert_eq!(cpu.registers().main.b, 0x77);
        assert_eq!(cycles, 14 + 19 + 19);
    }

    #[test]
    fn index_halves_are_addressable() {
        // LD IX,0x1234 ; LD A,IXH ; LD IXL,A
        let program = [0xDD, 0x21, 0x34, 0x12, 0xDD, 0x7C, 0xDD, 0x6F];
        let (cpu, _, _) = run(&program, 3);
        assert_eq!(cpu.registers().main.a, 0x12);
        assert_eq!(cpu.registers().ix, 0x1212);
        assert_eq!(cpu.registers().main.hl(), 0);
    }

    #[test]
    fn indexed_memory_operand_keeps_plain_h() {
        // LD IX,0x4000 ; LD H,(IX+0)
        let mut program = vec![0xDD, 0x21, 0x00, 0x40, 0xDD, 0x66, 0x00];
        program.resize(0x4000, 0);
        program.push(0x99);
        let (cpu, _, _) = run(&program, 2);
        assert_eq!(cpu.registers().main.h, 0x99);
        assert_eq!(cpu.registers().ix, 0x4000);
    }

    #[test]
    fn exchanges_swap_register_sets() {
        // LD HL,1 ; EXX ; LD HL,2 ; EX DE,HL ; EXX
        let program = [0x21, 0x01, 0x00, 0xD9, 0x21, 0x02, 0x00, 0xEB, 0xD9];
        let (cpu, _, _) = run(&program, 5);
        assert_eq!(cpu.registers().main.hl(), 1);
        assert_eq!(cpu.registers().alt.de(), 2);
    }

    #[test]
    fn rst_pushes_next_address() {
        let (cpu, bus, cycles) = run(&[0x00, 0xEF], 2);
        assert_eq!(cpu.registers().pc, 0x0028);
        assert_eq!(bus.memory[0xFFFD], 0x02);
        assert_eq!(cycles, 4 + 11);
    }
}
