use super::*;
use crate::bus::FlatMemory;
use pretty_assertions::assert_eq;

fn machine(program: &[u8]) -> (CpuZ80, FlatMemory) {
    let mut mem = FlatMemory::new(0x10000);
    mem.load(0, program);
    (CpuZ80::new(), mem)
}

fn run(cpu: &mut CpuZ80, mem: &mut FlatMemory, steps: usize) {
    for _ in 0..steps {
        assert!(cpu.step(mem));
    }
}

#[test]
fn subtract_sets_n_and_overflow() {
    // LD A,0x80 / SUB 1: 0x80 - 1 overflows signed
    let (mut cpu, mut mem) = machine(&[0x3E, 0x80, 0xD6, 0x01]);
    run(&mut cpu, &mut mem, 2);
    assert_eq!(cpu.a, 0x7F);
    assert!(cpu.flag(Flags::SUBTRACT));
    assert!(cpu.flag(Flags::PARITY_OVERFLOW));
    assert!(cpu.flag(Flags::HALF_CARRY));
    assert!(!cpu.flag(Flags::CARRY));
}

#[test]
fn logic_ops_use_parity() {
    // LD A,0x0F / AND 0x03
    let (mut cpu, mut mem) = machine(&[0x3E, 0x0F, 0xE6, 0x03]);
    run(&mut cpu, &mut mem, 2);
    assert_eq!(cpu.a, 0x03);
    assert!(cpu.flag(Flags::PARITY_OVERFLOW), "two bits set: even parity");
    assert!(cpu.flag(Flags::HALF_CARRY), "AND always sets H");
    assert!(!cpu.flag(Flags::SUBTRACT));
}

#[test]
fn djnz_loops_with_extra_cycles() {
    // LD B,3 / DJNZ -2
    let (mut cpu, mut mem) = machine(&[0x06, 0x03, 0x10, 0xFE]);
    run(&mut cpu, &mut mem, 1);
    cpu.step(&mut mem);
    assert_eq!(cpu.instruction_ticks(), 13, "taken");
    assert_eq!(cpu.pc, 0x0002);
    run(&mut cpu, &mut mem, 1);
    cpu.step(&mut mem);
    assert_eq!(cpu.instruction_ticks(), 8, "B hit zero, fell through");
    assert_eq!(cpu.pc, 0x0004);
    assert_eq!(cpu.b, 0);
}

#[test]
fn shadow_registers_swap() {
    // LD A,1 / EX AF,AF' / LD A,2 / EX AF,AF'
    let (mut cpu, mut mem) = machine(&[0x3E, 0x01, 0x08, 0x3E, 0x02, 0x08]);
    run(&mut cpu, &mut mem, 4);
    assert_eq!(cpu.a, 0x01);
    assert_eq!(cpu.a2, 0x02);

    // LD BC / EXX clears the working set view.
    let (mut cpu, mut mem) = machine(&[0x01, 0x34, 0x12, 0xD9]);
    run(&mut cpu, &mut mem, 2);
    assert_eq!(cpu.bc(), 0x0000);
    assert_eq!(common::make_word(cpu.b2, cpu.c2), 0x1234);
}

#[test]
fn cb_bit_set_res() {
    // LD A,0 / SET 3,A / BIT 3,A / RES 3,A
    let (mut cpu, mut mem) = machine(&[0x3E, 0x00, 0xCB, 0xDF, 0xCB, 0x5F, 0xCB, 0x9F]);
    run(&mut cpu, &mut mem, 2);
    assert_eq!(cpu.a, 0x08);
    assert_eq!(cpu.instruction_ticks(), 8);
    run(&mut cpu, &mut mem, 1);
    assert!(!cpu.flag(Flags::ZERO));
    run(&mut cpu, &mut mem, 1);
    assert_eq!(cpu.a, 0x00);
}

#[test]
fn cb_on_memory_costs_more() {
    // LD HL,0x4000 / SET 0,(HL) / BIT 0,(HL)
    let (mut cpu, mut mem) = machine(&[0x21, 0x00, 0x40, 0xCB, 0xC6, 0xCB, 0x46]);
    mem.write8(0x4000, 0x00);
    run(&mut cpu, &mut mem, 1);
    cpu.step(&mut mem);
    assert_eq!(cpu.instruction_ticks(), 15);
    assert_eq!(mem.read8(0x4000), 0x01);
    cpu.step(&mut mem);
    assert_eq!(cpu.instruction_ticks(), 12);
    assert!(!cpu.flag(Flags::ZERO));
}

#[test]
fn sbc_hl_full_flags() {
    // LD HL,0x8000 / LD DE,1 / OR A (clear carry) / SBC HL,DE
    let (mut cpu, mut mem) = machine(&[0x21, 0x00, 0x80, 0x11, 0x01, 0x00, 0xB7, 0xED, 0x52]);
    run(&mut cpu, &mut mem, 3);
    cpu.step(&mut mem);
    assert_eq!(cpu.hl(), 0x7FFF);
    assert_eq!(cpu.instruction_ticks(), 15);
    assert!(cpu.flag(Flags::PARITY_OVERFLOW), "signed overflow");
    assert!(cpu.flag(Flags::SUBTRACT));
}

#[test]
fn ldir_copies_and_rewinds() {
    // LD HL,0x1000 / LD DE,0x2000 / LD BC,3 / LDIR
    let (mut cpu, mut mem) = machine(&[
        0x21, 0x00, 0x10, 0x11, 0x00, 0x20, 0x01, 0x03, 0x00, 0xED, 0xB0,
    ]);
    mem.load(0x1000, &[0xAA, 0xBB, 0xCC]);
    run(&mut cpu, &mut mem, 3);

    cpu.step(&mut mem);
    assert_eq!(cpu.instruction_ticks(), 21, "iteration with repeat");
    assert_eq!(cpu.current_address(), 0x0009, "PC rewound to the LDIR");
    run(&mut cpu, &mut mem, 1);
    cpu.step(&mut mem);
    assert_eq!(cpu.instruction_ticks(), 16, "final iteration");

    assert_eq!(mem.read8(0x2000), 0xAA);
    assert_eq!(mem.read8(0x2001), 0xBB);
    assert_eq!(mem.read8(0x2002), 0xCC);
    assert_eq!(cpu.bc(), 0);
    assert!(!cpu.flag(Flags::PARITY_OVERFLOW));
    assert_eq!(cpu.pc, 0x000B);
}

#[test]
fn index_register_loads_and_alu() {
    // LD IX,0x3000 / LD (IX+5),0x42 / ADD A,(IX+5)
    let (mut cpu, mut mem) = machine(&[
        0xDD, 0x21, 0x00, 0x30, 0xDD, 0x36, 0x05, 0x42, 0xDD, 0x86, 0x05,
    ]);
    cpu.a = 0;
    cpu.step(&mut mem);
    assert_eq!(cpu.ix, 0x3000);
    assert_eq!(cpu.instruction_ticks(), 14);
    cpu.step(&mut mem);
    assert_eq!(mem.read8(0x3005), 0x42);
    assert_eq!(cpu.instruction_ticks(), 19);
    cpu.step(&mut mem);
    assert_eq!(cpu.a, 0x42);
    assert_eq!(cpu.instruction_ticks(), 19);
}

#[test]
fn iy_prefix_selects_other_register() {
    // LD IY,0x5000 / LD (IY-1),B with B=0x7E
    let (mut cpu, mut mem) = machine(&[0xFD, 0x21, 0x00, 0x50, 0xFD, 0x70, 0xFF]);
    cpu.b = 0x7E;
    run(&mut cpu, &mut mem, 2);
    assert_eq!(mem.read8(0x4FFF), 0x7E);
}

#[test]
fn dd_prefix_falls_through_on_unaffected_opcode() {
    // DD then LD B,n: prefix costs 4, instruction runs unchanged.
    let (mut cpu, mut mem) = machine(&[0xDD, 0x06, 0x55]);
    cpu.step(&mut mem);
    assert_eq!(cpu.b, 0x55);
    assert_eq!(cpu.instruction_ticks(), 4 + 7);
}

#[test]
fn ddcb_bit_ops_on_indexed_memory() {
    // LD IX,0x3000 / SET 7,(IX+2)
    let (mut cpu, mut mem) = machine(&[0xDD, 0x21, 0x00, 0x30, 0xDD, 0xCB, 0x02, 0xFE]);
    mem.write8(0x3002, 0x00);
    run(&mut cpu, &mut mem, 1);
    cpu.step(&mut mem);
    assert_eq!(mem.read8(0x3002), 0x80);
    assert_eq!(cpu.instruction_ticks(), 23);
}

#[test]
fn refresh_register_keeps_bit_seven() {
    let (mut cpu, mut mem) = machine(&[0x00; 16]);
    cpu.r = 0xFE;
    run(&mut cpu, &mut mem, 4);
    assert_eq!(cpu.r, 0x82, "counter wrapped inside the low 7 bits");
}

#[test]
fn im1_interrupt_after_ei_delay() {
    // ED 56 (IM 1) / EI / NOP; INT pending throughout.
    let (mut cpu, mut mem) = machine(&[0xED, 0x56, 0xFB, 0x00]);
    cpu.set_irq(true);
    run(&mut cpu, &mut mem, 2); // IM 1, then EI shields its own boundary
    assert_eq!(cpu.pc, 0x0003, "not serviced while the shield holds");
    cpu.step(&mut mem); // the NOP retires, then the line is honored
    assert_eq!(cpu.pc, IM1_VECTOR);
    assert_eq!(mem.read16_le(u32::from(cpu.sp)), 0x0004, "return past the NOP");
    assert!(!cpu.iff1);
    assert!(!cpu.iff2);
}

#[test]
fn im2_fetches_vector_from_table() {
    // LD A,0x20 / ED 47 (LD I,A) / ED 5E (IM 2) / EI / NOP
    let (mut cpu, mut mem) = machine(&[0x3E, 0x20, 0xED, 0x47, 0xED, 0x5E, 0xFB, 0x00]);
    mem.write16_le(0x2080, 0x4321); // vector table entry
    cpu.set_irq_data(true, 0x80);
    run(&mut cpu, &mut mem, 5); // shield expires as the NOP retires
    assert_eq!(cpu.pc, 0x4321);
    assert_eq!(mem.read16_le(u32::from(cpu.sp)), 0x0008);
}

#[test]
fn im0_service_stops_the_core() {
    let (mut cpu, mut mem) = machine(&[0xFB, 0x00, 0x00]);
    cpu.set_irq(true);
    run(&mut cpu, &mut mem, 1); // EI shields its own boundary
    assert!(!cpu.step(&mut mem), "IM 0 service is a fault");
    assert_eq!(cpu.state(), CpuState::Stopped);
    assert!(!cpu.step(&mut mem), "stopped is terminal");
}

#[test]
fn nmi_beats_int_and_preserves_iff2() {
    let (mut cpu, mut mem) = machine(&[0xED, 0x56, 0xFB, 0x00, 0x00]);
    run(&mut cpu, &mut mem, 2); // IM 1, EI
    cpu.set_irq(true);
    cpu.set_nmi(true);
    cpu.set_nmi(false); // falling edge latches
    cpu.step(&mut mem); // the shielded NOP retires; NMI wins the sample
    assert_eq!(cpu.pc, NMI_VECTOR);
    assert!(!cpu.iff1);
    assert!(cpu.iff2, "IFF2 remembers the pre-NMI enable");

    // The pending maskable request is taken as soon as RETN restores IFF1.
    mem.load(u32::from(NMI_VECTOR), &[0xED, 0x45]); // RETN
    cpu.step(&mut mem);
    assert_eq!(cpu.pc, IM1_VECTOR);
    assert_eq!(mem.read16_le(u32::from(cpu.sp)), 0x0004, "RETN's return address stacked");
}

#[test]
fn halt_resumes_after_interrupt() {
    let (mut cpu, mut mem) = machine(&[0xED, 0x56, 0xFB, 0x00, 0x76, 0x3C]); // ... HALT / INC A
    run(&mut cpu, &mut mem, 5);
    assert_eq!(cpu.state(), CpuState::Halted);
    cpu.set_irq(true);
    cpu.step(&mut mem);
    assert_eq!(cpu.pc, IM1_VECTOR);
    // Return lands past the HALT.
    assert_eq!(mem.read16_le(u32::from(cpu.sp)), 0x0005);
}

#[test]
fn daa_corrects_bcd_addition() {
    // LD A,0x15 / ADD A,0x27 / DAA => 42 BCD
    let (mut cpu, mut mem) = machine(&[0x3E, 0x15, 0xC6, 0x27, 0x27]);
    run(&mut cpu, &mut mem, 3);
    assert_eq!(cpu.a, 0x42);
    assert!(!cpu.flag(Flags::CARRY));
}

#[test]
fn snapshot_round_trip() {
    let program = [0x3E, 0x10, 0x06, 0x22, 0x80, 0xD9, 0x08];
    let (mut cpu, mut mem) = machine(&program);
    run(&mut cpu, &mut mem, 4);
    let snap = cpu.snapshot().unwrap();
    assert_eq!(snap["cpu"], "z80");

    let (mut other, mut mem2) = machine(&program);
    other.restore(&snap).unwrap();
    run(&mut cpu, &mut mem, 1);
    run(&mut other, &mut mem2, 1);
    assert_eq!(cpu.af(), other.af());
    assert_eq!(cpu.a2, other.a2);
    assert_eq!(cpu.pc, other.pc);
    assert_eq!(cpu.r, other.r);
}

#[test]
fn snapshot_rejects_foreign_tag() {
    let cpu = CpuZ80::new();
    let mut snap = cpu.snapshot().unwrap();
    snap["cpu"] = "6809".into();
    let mut other = CpuZ80::new();
    assert!(matches!(
        other.restore(&snap),
        Err(crate::snapshot::SnapshotError::ArchitectureMismatch { .. })
    ));
}
