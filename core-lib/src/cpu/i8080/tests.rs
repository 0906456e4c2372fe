use super::*;
use crate::bus::FlatMemory;
use pretty_assertions::assert_eq;
use test_case::test_case;

fn machine(program: &[u8]) -> (Cpu8080, FlatMemory) {
    let mut mem = FlatMemory::new(0x10000);
    mem.load(0, program);
    (Cpu8080::new(), mem)
}

fn run(cpu: &mut Cpu8080, mem: &mut FlatMemory, steps: usize) -> u32 {
    let mut ticks = 0;
    for _ in 0..steps {
        assert!(cpu.step(mem));
        ticks += cpu.instruction_ticks();
    }
    ticks
}

#[test]
fn mvi_add_and_flags() {
    // MVI A,0x0F / MVI B,0x01 / ADD B
    let (mut cpu, mut mem) = machine(&[0x3E, 0x0F, 0x06, 0x01, 0x80]);
    run(&mut cpu, &mut mem, 3);
    assert_eq!(cpu.a, 0x10);
    assert!(cpu.flag(Flags::AUX_CARRY));
    assert!(!cpu.flag(Flags::ZERO));
    assert!(!cpu.flag(Flags::CARRY));
    assert!(!cpu.flag(Flags::SIGN));
}

#[test]
fn add_overflow_into_sign_and_carry() {
    // MVI A,0x80 / ADI 0x80
    let (mut cpu, mut mem) = machine(&[0x3E, 0x80, 0xC6, 0x80]);
    run(&mut cpu, &mut mem, 2);
    assert_eq!(cpu.a, 0x00);
    assert!(cpu.flag(Flags::ZERO));
    assert!(cpu.flag(Flags::CARRY));
    assert!(cpu.flag(Flags::PARITY));
}

#[test]
fn mov_through_memory() {
    // LXI H,0x2000 / MVI M,0x5A / MOV A,M
    let (mut cpu, mut mem) = machine(&[0x21, 0x00, 0x20, 0x36, 0x5A, 0x7E]);
    run(&mut cpu, &mut mem, 3);
    assert_eq!(cpu.a, 0x5A);
    assert_eq!(mem.read8(0x2000), 0x5A);
}

#[test]
fn instruction_timing_charges() {
    let (mut cpu, mut mem) = machine(&[0x00, 0x3E, 0x42, 0xC3, 0x00, 0x10]);
    cpu.step(&mut mem); // NOP
    assert_eq!(cpu.instruction_ticks(), 4);
    cpu.step(&mut mem); // MVI A
    assert_eq!(cpu.instruction_ticks(), 7);
    cpu.step(&mut mem); // JMP
    assert_eq!(cpu.instruction_ticks(), 10);
    assert_eq!(cpu.pc, 0x1000);
}

#[test_case(0x01, 17, 0x1000 ; "taken when zero flag clear")]
#[test_case(0x00, 11, 0x0007 ; "skipped when zero flag set")]
fn conditional_call_timing(operand: u8, expected_ticks: u32, expected_pc: u16) {
    // MVI A,op / ADI 0 (sets Z from result) / CNZ 0x1000
    let (mut cpu, mut mem) = machine(&[0x3E, operand, 0xC6, 0x00, 0xC4, 0x00, 0x10]);
    run(&mut cpu, &mut mem, 2);
    cpu.step(&mut mem);
    assert_eq!(cpu.instruction_ticks(), expected_ticks);
    assert_eq!(cpu.pc, expected_pc);
}

#[test]
fn call_and_ret_round_trip() {
    // CALL 0x0010 ... at 0x10: RET
    let (mut cpu, mut mem) = machine(&[0xCD, 0x10, 0x00]);
    mem.load(0x10, &[0xC9]);
    cpu.step(&mut mem);
    assert_eq!(cpu.pc, 0x0010);
    assert_eq!(mem.read16_le(u32::from(cpu.sp)), 0x0003);
    cpu.step(&mut mem);
    assert_eq!(cpu.pc, 0x0003);
}

#[test]
fn daa_adjusts_bcd_sum() {
    // MVI A,0x9B / DAA -> 0x01, CY and AC set
    let (mut cpu, mut mem) = machine(&[0x3E, 0x9B, 0x27]);
    run(&mut cpu, &mut mem, 2);
    assert_eq!(cpu.a, 0x01);
    assert!(cpu.flag(Flags::CARRY));
    assert!(cpu.flag(Flags::AUX_CARRY));
}

#[test]
fn flag_byte_forces_reserved_bits() {
    let mut cpu = Cpu8080::new();
    cpu.set_flags(0xFF);
    assert_eq!(cpu.flags(), 0xD7);
    cpu.set_flags(0x00);
    assert_eq!(cpu.flags(), 0x02);
}

#[test]
fn push_pop_psw_round_trips_flag_mask() {
    // MVI A,0xFF / ADI 1 (Z,AC,CY,P set) / PUSH PSW / POP PSW
    let (mut cpu, mut mem) = machine(&[0x3E, 0xFF, 0xC6, 0x01, 0xF5, 0xF1]);
    run(&mut cpu, &mut mem, 3);
    let pushed = mem.read8(u32::from(cpu.sp));
    assert_eq!(pushed & 0x2A, 0x02, "fixed bits hold their values");
    cpu.step(&mut mem);
    assert!(cpu.flag(Flags::ZERO));
    assert!(cpu.flag(Flags::CARRY));
}

#[test]
fn halt_waits_for_interrupt() {
    // EI / HLT, handler at RST 1 (0x0008)
    let (mut cpu, mut mem) = machine(&[0xFB, 0x76]);
    run(&mut cpu, &mut mem, 2);
    assert_eq!(cpu.state(), CpuState::Halted);
    // Idle steps burn cycles but go nowhere.
    cpu.step(&mut mem);
    assert_eq!(cpu.state(), CpuState::Halted);
    assert_eq!(cpu.instruction_ticks(), 4);

    cpu.set_irq_vector(true, 1);
    cpu.step(&mut mem);
    assert_eq!(cpu.pc, 0x0008);
    assert_eq!(cpu.state(), CpuState::Running);
}

#[test]
fn ei_delays_interrupt_by_one_instruction() {
    // EI / MVI A,0x42: the MVI must run before the interrupt is taken.
    let (mut cpu, mut mem) = machine(&[0xFB, 0x3E, 0x42]);
    cpu.set_irq_vector(true, 0);
    cpu.step(&mut mem); // EI shields its own boundary
    assert_eq!(cpu.pc, 0x0001, "not serviced while the shield holds");
    cpu.step(&mut mem); // the MVI retires, then the interrupt is taken
    assert_eq!(cpu.a, 0x42);
    assert_eq!(cpu.pc, 0x0000);
    // Return address on the stack is past the MVI.
    assert_eq!(mem.read16_le(u32::from(cpu.sp)), 0x0003);
}

#[test]
fn interrupt_ignored_when_disabled() {
    let (mut cpu, mut mem) = machine(&[0x00, 0x00]);
    cpu.set_irq_vector(true, 2);
    run(&mut cpu, &mut mem, 2);
    assert_eq!(cpu.pc, 0x0002, "no service without EI");
}

#[test]
fn snapshot_round_trip_preserves_execution() {
    let program = [0x3E, 0x10, 0x06, 0x22, 0x80, 0x76];
    let (mut cpu, mut mem) = machine(&program);
    run(&mut cpu, &mut mem, 2);
    let snap = cpu.snapshot().unwrap();
    assert_eq!(snap["cpu"], "8080");

    let (mut other, mut mem2) = machine(&program);
    other.restore(&snap).unwrap();
    run(&mut cpu, &mut mem, 1);
    run(&mut other, &mut mem2, 1);
    assert_eq!(cpu.a, other.a);
    assert_eq!(cpu.pc, other.pc);
    assert_eq!(cpu.flags(), other.flags());
}

#[test]
fn snapshot_rejects_other_architecture() {
    let cpu = Cpu8080::new();
    let mut snap = cpu.snapshot().unwrap();
    snap["cpu"] = "z80".into();
    let mut other = Cpu8080::new();
    assert!(matches!(
        other.restore(&snap),
        Err(crate::snapshot::SnapshotError::ArchitectureMismatch { .. })
    ));
}

#[test]
fn rotate_instructions_only_touch_carry() {
    // MVI A,0x81 / RLC
    let (mut cpu, mut mem) = machine(&[0x3E, 0x81, 0x07]);
    run(&mut cpu, &mut mem, 2);
    assert_eq!(cpu.a, 0x03);
    assert!(cpu.flag(Flags::CARRY));
    assert!(!cpu.flag(Flags::ZERO));
}

#[test]
fn xthl_swaps_top_of_stack() {
    // LXI SP,0x3000 / LXI H,0x1234 / PUSH H / LXI H,0xABCD / XTHL
    let (mut cpu, mut mem) = machine(&[
        0x31, 0x00, 0x30, 0x21, 0x34, 0x12, 0xE5, 0x21, 0xCD, 0xAB, 0xE3,
    ]);
    run(&mut cpu, &mut mem, 5);
    assert_eq!(cpu.hl(), 0x1234);
    assert_eq!(mem.read16_le(u32::from(cpu.sp)), 0xABCD);
}

#[test]
fn every_opcode_dispatches() {
    // Execute each opcode byte in isolation on a fresh core; none may
    // fault (the 8080 has no undefined encodings).
    for op in 0..=255u8 {
        let mut cpu = Cpu8080::new();
        let mut mem = FlatMemory::new(0x10000);
        cpu.pc = 0x100;
        cpu.sp = 0x8000;
        assert!(cpu.exec(&mut mem, op).is_ok(), "opcode {op:#04X}");
    }
}
