//! Interrupt acceptance and vectoring across the three maskable modes.

#![allow(clippy::pedantic, clippy::nursery)]

use log as _;
use proptest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use rstest::rstest;
use z80_core::{Bus, InterruptMode, NullPorts, Platform, SystemBus, Z80, MODE1_VECTOR, NMI_VECTOR};

fn cpu_at(pc: u16, iff1: bool, im: InterruptMode) -> (Z80, SystemBus<NullPorts>) {
    let mut cpu = Z80::new();
    let regs = cpu.registers_mut();
    regs.pc = pc;
    regs.sp = 0xF000;
    regs.iff1 = iff1;
    regs.iff2 = iff1;
    regs.im = im;
    (cpu, SystemBus::new(Platform::Simple, NullPorts))
}

#[test]
fn mode2_reads_vector_from_table_at_i_and_data_bus() {
    let (mut cpu, mut bus) = cpu_at(0x1234, true, InterruptMode::Mode2);
    cpu.registers_mut().i = 0x20;
    bus.write_word(0x2004, 0x5678);

    assert!(cpu.signal_interrupt(&mut bus, false, 0x04));
    assert_eq!(cpu.registers().pc, 0x5678);
    assert_eq!(cpu.registers().sp, 0xEFFE);
    assert_eq!(bus.read_word(0xEFFE), 0x1234);
    assert_eq!(cpu.execute_one(&mut bus), 19 + 4);
}

#[test]
fn mode2_accepts_odd_table_entries() {
    let (mut cpu, mut bus) = cpu_at(0x0100, true, InterruptMode::Mode2);
    cpu.registers_mut().i = 0x30;
    bus.write_word(0x3005, 0x4321);
    assert!(cpu.signal_interrupt(&mut bus, false, 0x05));
    assert_eq!(cpu.registers().pc, 0x4321);
}

#[rstest]
#[case::mode0(InterruptMode::Mode0)]
#[case::mode1(InterruptMode::Mode1)]
#[case::mode2(InterruptMode::Mode2)]
fn maskable_requests_need_iff1(#[case] im: InterruptMode) {
    let (mut cpu, mut bus) = cpu_at(0x0200, false, im);
    assert!(!cpu.signal_interrupt(&mut bus, false, 0xFF));
    assert_eq!(cpu.registers().pc, 0x0200);
    assert_eq!(cpu.registers().sp, 0xF000);
    assert_eq!(cpu.registers().r, 0);
}

#[rstest]
#[case::disabled(false)]
#[case::enabled(true)]
fn nmi_is_always_accepted(#[case] iff1: bool) {
    let (mut cpu, mut bus) = cpu_at(0x0300, iff1, InterruptMode::Mode1);
    assert!(cpu.signal_interrupt(&mut bus, true, 0x00));
    let regs = cpu.registers();
    assert_eq!(regs.pc, NMI_VECTOR);
    assert!(!regs.iff1);
    assert_eq!(regs.iff2, iff1);
    assert_eq!(bus.read_word(regs.sp), 0x0300);
}

#[rstest]
#[case::mode1(InterruptMode::Mode1, 13)]
#[case::mode2(InterruptMode::Mode2, 19)]
fn response_cost_is_charged_to_next_step(#[case] im: InterruptMode, #[case] response: u32) {
    let (mut cpu, mut bus) = cpu_at(0x0400, true, im);
    assert!(cpu.signal_interrupt(&mut bus, false, 0x00));
    assert_eq!(cpu.execute_one(&mut bus), response + 4);
}

#[test]
fn retn_restores_iff1_from_iff2_after_nmi() {
    let (mut cpu, mut bus) = cpu_at(0x0500, true, InterruptMode::Mode1);
    // RETN at the NMI handler.
    bus.write(NMI_VECTOR, 0xED);
    bus.write(NMI_VECTOR + 1, 0x45);
    assert!(cpu.signal_interrupt(&mut bus, true, 0x00));
    assert!(!cpu.registers().iff1);
    cpu.execute_one(&mut bus);
    assert_eq!(cpu.registers().pc, 0x0500);
    assert!(cpu.registers().iff1);
}

#[test]
fn interrupt_resumes_after_halt() {
    let (mut cpu, mut bus) = cpu_at(0x0600, true, InterruptMode::Mode1);
    bus.write(0x0600, 0x76);
    cpu.execute_one(&mut bus);
    assert!(cpu.registers().halted);
    assert!(cpu.signal_interrupt(&mut bus, false, 0xFF));
    assert!(!cpu.registers().halted);
    assert_eq!(cpu.registers().pc, MODE1_VECTOR);
    assert_eq!(bus.read_word(cpu.registers().sp), 0x0601);
}
