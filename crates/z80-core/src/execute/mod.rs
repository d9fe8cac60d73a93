//! Instruction execution for the Z80.
//!
//! One call to [`Z80::execute_one`] runs these steps in order:
//! 1. Apply an `EI`/`DI` deferred by the previous instruction
//! 2. Bump the low seven bits of `R`
//! 3. Fetch the opcode and advance `PC` past it
//! 4. Dispatch; operands are fetched by the handler
//! 5. Return the accumulated cycle count and clear it
//!
//! Prefix bytes are opcode fetches of their own and bump `R` again.

mod base;
mod cb;
mod ed;
pub mod flags;

use log::trace;

use crate::memory::Bus;
use crate::state::{InterruptMode, RegisterFile};
use crate::timing::{base_cycles, cycle_cost, indexed_cycles, CycleCostKind};

/// Fixed restart address of the non-maskable interrupt.
pub const NMI_VECTOR: u16 = 0x0066;
/// Fixed restart address of mode 1 maskable interrupts.
pub const MODE1_VECTOR: u16 = 0x0038;

/// Register that `HL`-based encodings address under the active prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum IndexMode {
    Hl,
    Ix,
    Iy,
}

/// Z80 processor: the register file plus the decode/execute engine.
///
/// Memory and ports are reached only through the [`Bus`] handed to each
/// call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Z80 {
    regs: RegisterFile,
}

impl Z80 {
    /// Creates a processor in the power-on state.
    #[must_use]
    pub fn new() -> Self {
        let mut cpu = Self::default();
        cpu.reset();
        cpu
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Mutable register file.
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }

    /// Restores the predictable power-on subset of the register file.
    pub fn reset(&mut self) {
        self.regs.reset();
    }

    /// Runs one instruction, or one idle cycle while halted, and returns the
    /// cycles consumed since the previous call, interrupt responses included.
    pub fn execute_one<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        self.apply_pending_interrupt_mask();
        if self.regs.halted {
            self.regs.cycles += cycle_cost(CycleCostKind::HaltIdle);
            return self.take_cycles();
        }

        self.regs.increment_refresh();
        let pc = self.regs.pc;
        let opcode = self.fetch_byte(bus);
        trace!("0x{pc:04X}: opcode 0x{opcode:02X}");
        self.dispatch(bus, opcode);
        self.take_cycles()
    }

    /// Pulses the interrupt pin. Returns `true` when the interrupt was
    /// accepted.
    ///
    /// Non-maskable requests are always accepted. Maskable requests need
    /// `IFF1` and follow the current interrupt mode; `data_bus` is the byte
    /// the interrupting device drives (an opcode in mode 0, the low vector
    /// byte in mode 2).
    pub fn signal_interrupt<B: Bus + ?Sized>(
        &mut self,
        bus: &mut B,
        non_maskable: bool,
        data_bus: u8,
    ) -> bool {
        if non_maskable {
            self.regs.increment_refresh();
            self.regs.halted = false;
            self.regs.iff2 = self.regs.iff1;
            self.regs.iff1 = false;
            self.push_word(bus, self.regs.pc);
            self.regs.pc = NMI_VECTOR;
            self.regs.cycles += cycle_cost(CycleCostKind::NmiResponse);
            return true;
        }

        if !self.regs.iff1 {
            return false;
        }

        self.regs.increment_refresh();
        self.regs.halted = false;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        match self.regs.im {
            InterruptMode::Mode0 => {
                self.regs.cycles += cycle_cost(CycleCostKind::Mode0Response);
                self.dispatch(bus, data_bus);
            }
            InterruptMode::Mode1 => {
                self.push_word(bus, self.regs.pc);
                self.regs.pc = MODE1_VECTOR;
                self.regs.cycles += cycle_cost(CycleCostKind::Mode1Response);
            }
            InterruptMode::Mode2 => {
                self.push_word(bus, self.regs.pc);
                let vector = u16::from_be_bytes([self.regs.i, data_bus]);
                self.regs.pc = bus.read_word(vector);
                self.regs.cycles += cycle_cost(CycleCostKind::Mode2Response);
            }
        }
        true
    }

    const fn apply_pending_interrupt_mask(&mut self) {
        if self.regs.pending_ei {
            self.regs.iff1 = true;
            self.regs.iff2 = true;
            self.regs.pending_ei = false;
        }
        if self.regs.pending_di {
            self.regs.iff1 = false;
            self.regs.iff2 = false;
            self.regs.pending_di = false;
        }
    }

    const fn take_cycles(&mut self) -> u32 {
        let cycles = self.regs.cycles;
        self.regs.cycles = 0;
        cycles
    }

    /// Executes `opcode`, which has already been fetched.
    fn dispatch<B: Bus + ?Sized>(&mut self, bus: &mut B, opcode: u8) {
        match opcode {
            0xCB => {
                self.regs.increment_refresh();
                let opcode = self.fetch_byte(bus);
                self.execute_cb(bus, opcode);
            }
            0xED => {
                self.regs.increment_refresh();
                let opcode = self.fetch_byte(bus);
                self.execute_ed(bus, opcode);
            }
            0xDD => self.execute_indexed(bus, IndexMode::Ix),
            0xFD => self.execute_indexed(bus, IndexMode::Iy),
            _ => {
                self.regs.cycles += base_cycles(opcode);
                self.execute_base(bus, opcode, IndexMode::Hl);
            }
        }
    }

    fn execute_indexed<B: Bus + ?Sized>(&mut self, bus: &mut B, mode: IndexMode) {
        self.regs.increment_refresh();
        let opcode = self.fetch_byte(bus);
        match opcode {
            0xCB => self.execute_indexed_cb(bus, mode),
            // A prefix followed by another prefix behaves as a four-cycle no-op.
            0xDD | 0xED | 0xFD => {
                self.regs.cycles += cycle_cost(CycleCostKind::IndexPrefix);
                self.dispatch(bus, opcode);
            }
            _ => {
                self.regs.cycles += indexed_cycles(opcode);
                self.execute_base(bus, opcode, mode);
            }
        }
    }

    fn fetch_byte<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn fetch_word<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let low = self.fetch_byte(bus);
        let high = self.fetch_byte(bus);
        u16::from_le_bytes([low, high])
    }

    fn fetch_displacement<B: Bus + ?Sized>(&mut self, bus: &mut B) -> i8 {
        i8::from_le_bytes([self.fetch_byte(bus)])
    }

    /// Pushes high byte first, pre-decrementing `SP` before each write.
    fn push_word<B: Bus + ?Sized>(&mut self, bus: &mut B, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, high);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, low);
    }

    fn pop_word<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let low = bus.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let high = bus.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_le_bytes([low, high])
    }

    /// Effective address of an `(HL)` operand, or `(IX+d)`/`(IY+d)` under a
    /// prefix, in which case the displacement is fetched.
    fn indirect_address<B: Bus + ?Sized>(&mut self, bus: &mut B, mode: IndexMode) -> u16 {
        match mode {
            IndexMode::Hl => self.regs.main.hl(),
            IndexMode::Ix | IndexMode::Iy => {
                let displacement = self.fetch_displacement(bus);
                self.index_register(mode).wrapping_add_signed(i16::from(displacement))
            }
        }
    }

    const fn index_register(&self, mode: IndexMode) -> u16 {
        match mode {
            IndexMode::Hl => self.regs.main.hl(),
            IndexMode::Ix => self.regs.ix,
            IndexMode::Iy => self.regs.iy,
        }
    }

    const fn set_index_register(&mut self, mode: IndexMode, value: u16) {
        match mode {
            IndexMode::Hl => self.regs.main.set_hl(value),
            IndexMode::Ix => self.regs.ix = value,
            IndexMode::Iy => self.regs.iy = value,
        }
    }

    /// 8-bit register by encoding (`B C D E H L - A`). Under a prefix `H`/`L`
    /// select the index register halves. Encoding 6 is memory and is never
    /// passed here.
    const fn reg8(&self, index: u8, mode: IndexMode) -> u8 {
        match index & 0x07 {
            0 => self.regs.main.b,
            1 => self.regs.main.c,
            2 => self.regs.main.d,
            3 => self.regs.main.e,
            4 => self.index_register(mode).to_be_bytes()[0],
            5 => self.index_register(mode).to_be_bytes()[1],
            _ => self.regs.main.a,
        }
    }

    const fn set_reg8(&mut self, index: u8, mode: IndexMode, value: u8) {
        match index & 0x07 {
            0 => self.regs.main.b = value,
            1 => self.regs.main.c = value,
            2 => self.regs.main.d = value,
            3 => self.regs.main.e = value,
            4 => {
                let [_, low] = self.index_register(mode).to_be_bytes();
                self.set_index_register(mode, u16::from_be_bytes([value, low]));
            }
            5 => {
                let [high, _] = self.index_register(mode).to_be_bytes();
                self.set_index_register(mode, u16::from_be_bytes([high, value]));
            }
            6 => {}
            _ => self.regs.main.a = value,
        }
    }

    /// Register pair by encoding (`BC DE HL SP`).
    const fn reg16(&self, index: u8, mode: IndexMode) -> u16 {
        match index & 0x03 {
            0 => self.regs.main.bc(),
            1 => self.regs.main.de(),
            2 => self.index_register(mode),
            _ => self.regs.sp,
        }
    }

    const fn set_reg16(&mut self, index: u8, mode: IndexMode, value: u16) {
        match index & 0x03 {
            0 => self.regs.main.set_bc(value),
            1 => self.regs.main.set_de(value),
            2 => self.set_index_register(mode, value),
            _ => self.regs.sp = value,
        }
    }

    /// Register pair for `PUSH`/`POP` (`BC DE HL AF`).
    const fn reg16_stack(&self, index: u8, mode: IndexMode) -> u16 {
        if index & 0x03 == 3 {
            self.regs.main.af()
        } else {
            self.reg16(index, mode)
        }
    }

    const fn set_reg16_stack(&mut self, index: u8, mode: IndexMode, value: u16) {
        if index & 0x03 == 3 {
            self.regs.main.set_af(value);
        } else {
            self.set_reg16(index, mode, value);
        }
    }

    /// Condition by encoding (`NZ Z NC C PO PE P M`).
    const fn condition(&self, index: u8) -> bool {
        let flags = self.regs.main.flags;
        match index & 0x07 {
            0 => !flags.z,
            1 => flags.z,
            2 => !flags.c,
            3 => flags.c,
            4 => !flags.pv,
            5 => flags.pv,
            6 => !flags.s,
            _ => flags.s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Z80, MODE1_VECTOR, NMI_VECTOR};
    use crate::memory::{new_address_space, Bus};
    use crate::state::InterruptMode;

    pub(super) struct TestBus {
        pub memory: Box<[u8]>,
        pub outputs: Vec<(u8, u8)>,
        pub input: u8,
    }

    impl TestBus {
        pub fn with_program(origin: u16, program: &[u8]) -> Self {
            let mut memory = new_address_space();
            let start = usize::from(origin);
            memory[start..start + program.len()].copy_from_slice(program);
            Self {
                memory,
                outputs: Vec::new(),
                input: 0xFF,
            }
        }
    }

    impl Bus for TestBus {
        fn read(&mut self, addr: u16) -> u8 {
            self.memory[usize::from(addr)]
        }

        fn write(&mut self, addr: u16, value: u8) {
            self.memory[usize::from(addr)] = value;
        }

        fn port_in(&mut self, _port: u8) -> u8 {
            self.input
        }

        fn port_out(&mut self, port: u8, value: u8) {
            self.outputs.push((port, value));
        }
    }

    #[test]
    fn nop_costs_four_cycles_and_bumps_refresh() {
        let mut bus = TestBus::with_program(0, &[0x00]);
        let mut cpu = Z80::new();
        assert_eq!(cpu.execute_one(&mut bus), 4);
        assert_eq!(cpu.registers().pc, 1);
        assert_eq!(cpu.registers().r, 1);
    }

    #[test]
    fn prefixes_bump_refresh_again() {
        let mut bus = TestBus::with_program(0, &[0xDD, 0x21, 0x34, 0x12, 0xCB, 0x00]);
        let mut cpu = Z80::new();
        assert_eq!(cpu.execute_one(&mut bus), 14);
        assert_eq!(cpu.registers().ix, 0x1234);
        assert_eq!(cpu.registers().r, 2);
        assert_eq!(cpu.execute_one(&mut bus), 8);
        assert_eq!(cpu.registers().r, 4);
    }

    #[test]
    fn ei_takes_effect_after_following_instruction() {
        let mut bus = TestBus::with_program(0, &[0xFB, 0x00, 0x00]);
        let mut cpu = Z80::new();
        cpu.execute_one(&mut bus);
        assert!(!cpu.registers().iff1);
        assert!(!cpu.signal_interrupt(&mut bus, false, 0xFF));

        cpu.execute_one(&mut bus);
        assert!(cpu.registers().iff1 && cpu.registers().iff2);
    }

    #[test]
    fn di_is_deferred_like_ei() {
        let mut bus = TestBus::with_program(0, &[0xF3, 0x00]);
        let mut cpu = Z80::new();
        cpu.registers_mut().iff1 = true;
        cpu.registers_mut().iff2 = true;
        cpu.execute_one(&mut bus);
        assert!(cpu.registers().iff1);
        cpu.execute_one(&mut bus);
        assert!(!cpu.registers().iff1 && !cpu.registers().iff2);
    }

    #[test]
    fn halted_cpu_idles_one_cycle() {
        let mut bus = TestBus::with_program(0, &[0x76, 0x00]);
        let mut cpu = Z80::new();
        assert_eq!(cpu.execute_one(&mut bus), 4);
        assert!(cpu.registers().halted);
        assert_eq!(cpu.execute_one(&mut bus), 1);
        assert_eq!(cpu.registers().pc, 1);
    }

    #[test]
    fn nmi_pushes_pc_and_preserves_iff1_in_iff2() {
        let mut bus = TestBus::with_program(0, &[0x76]);
        let mut cpu = Z80::new();
        cpu.registers_mut().iff1 = true;
        cpu.execute_one(&mut bus);

        assert!(cpu.signal_interrupt(&mut bus, true, 0));
        let regs = cpu.registers();
        assert_eq!(regs.pc, NMI_VECTOR);
        assert!(!regs.iff1 && regs.iff2 && !regs.halted);
        assert_eq!(regs.sp, 0xFFFD);
        assert_eq!(bus.memory[0xFFFE], 0x00);
        assert_eq!(bus.memory[0xFFFD], 0x01);
        assert_eq!(cpu.execute_one(&mut bus), 11 + 4);
    }

    #[test]
    fn mode1_restarts_at_0038() {
        let mut bus = TestBus::with_program(0, &[0x00]);
        let mut cpu = Z80::new();
        cpu.registers_mut().im = InterruptMode::Mode1;
        cpu.registers_mut().iff1 = true;
        cpu.registers_mut().pc = 0x1234;
        assert!(cpu.signal_interrupt(&mut bus, false, 0xFF));
        assert_eq!(cpu.registers().pc, MODE1_VECTOR);
        assert_eq!(bus.read_word(cpu.registers().sp), 0x1234);
        assert!(!cpu.registers().iff1 && !cpu.registers().iff2);
    }

    #[test]
    fn mode0_executes_data_bus_opcode() {
        let mut bus = TestBus::with_program(0, &[]);
        let mut cpu = Z80::new();
        cpu.registers_mut().iff1 = true;
        cpu.registers_mut().pc = 0x0200;
        assert!(cpu.signal_interrupt(&mut bus, false, 0xCF));
        assert_eq!(cpu.registers().pc, 0x0008);
        assert_eq!(bus.read_word(cpu.registers().sp), 0x0200);
        bus.memory[0x0008] = 0x00;
        assert_eq!(cpu.execute_one(&mut bus), 2 + 11 + 4);
    }
}
