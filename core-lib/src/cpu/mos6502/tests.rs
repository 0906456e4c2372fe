use super::*;
use crate::bus::FlatMemory;
use pretty_assertions::assert_eq;
use test_case::test_case;

const ORIGIN: u16 = 0x0200;

fn machine(program: &[u8]) -> (Cpu6502, FlatMemory) {
    let mut mem = FlatMemory::new(0x10000);
    mem.load(u32::from(ORIGIN), program);
    mem.write16_le(u32::from(RESET_VECTOR), ORIGIN);
    let mut cpu = Cpu6502::new();
    cpu.reset(&mut mem);
    (cpu, mem)
}

fn run(cpu: &mut Cpu6502, mem: &mut FlatMemory, steps: usize) {
    for _ in 0..steps {
        assert!(cpu.step(mem));
    }
}

#[test]
fn reset_reads_the_vector() {
    let (cpu, _) = machine(&[0xEA]);
    assert_eq!(cpu.pc, ORIGIN);
    assert!(cpu.flag(Flags::IRQ_DISABLE));
    assert_eq!(cpu.sp, 0xFD);
}

#[test]
fn lda_sets_nz() {
    let (mut cpu, mut mem) = machine(&[0xA9, 0x00, 0xA9, 0x80]);
    run(&mut cpu, &mut mem, 1);
    assert!(cpu.flag(Flags::ZERO));
    run(&mut cpu, &mut mem, 1);
    assert!(cpu.flag(Flags::NEGATIVE));
    assert!(!cpu.flag(Flags::ZERO));
}

#[test]
fn adc_overflow_cases() {
    // CLC / LDA #$50 / ADC #$50: 0x50+0x50 overflows signed
    let (mut cpu, mut mem) = machine(&[0x18, 0xA9, 0x50, 0x69, 0x50]);
    run(&mut cpu, &mut mem, 3);
    assert_eq!(cpu.a, 0xA0);
    assert!(cpu.flag(Flags::OVERFLOW));
    assert!(!cpu.flag(Flags::CARRY));
    assert!(cpu.flag(Flags::NEGATIVE));
}

#[test]
fn adc_crossing_into_the_sign_bit() {
    // CLC / LDA #$7F / ADC #$01: smallest positive overflow
    let (mut cpu, mut mem) = machine(&[0x18, 0xA9, 0x7F, 0x69, 0x01]);
    run(&mut cpu, &mut mem, 3);
    assert_eq!(cpu.a, 0x80);
    assert!(cpu.flag(Flags::OVERFLOW));
    assert!(!cpu.flag(Flags::CARRY));
    assert!(cpu.flag(Flags::NEGATIVE));
    assert!(!cpu.flag(Flags::ZERO));
}

#[test]
fn sbc_borrow_semantics() {
    // SEC / LDA #$10 / SBC #$20
    let (mut cpu, mut mem) = machine(&[0x38, 0xA9, 0x10, 0xE9, 0x20]);
    run(&mut cpu, &mut mem, 3);
    assert_eq!(cpu.a, 0xF0);
    assert!(!cpu.flag(Flags::CARRY), "borrow clears carry");
    assert!(cpu.flag(Flags::NEGATIVE));
}

#[test]
fn decimal_adc() {
    // SED / SEC / LDA #$58 / ADC #$46 => 58 + 46 + 1 = 105 BCD
    let (mut cpu, mut mem) = machine(&[0xF8, 0x38, 0xA9, 0x58, 0x69, 0x46]);
    run(&mut cpu, &mut mem, 4);
    assert_eq!(cpu.a, 0x05);
    assert!(cpu.flag(Flags::CARRY));
}

#[test]
fn decimal_sbc() {
    // SED / SEC / LDA #$42 / SBC #$17 => 25 BCD
    let (mut cpu, mut mem) = machine(&[0xF8, 0x38, 0xA9, 0x42, 0xE9, 0x17]);
    run(&mut cpu, &mut mem, 4);
    assert_eq!(cpu.a, 0x25);
    assert!(cpu.flag(Flags::CARRY));
}

#[test]
fn zero_page_indexing_wraps() {
    // LDX #$05 / LDA $FE,X reads $0003, not $0103
    let (mut cpu, mut mem) = machine(&[0xA2, 0x05, 0xB5, 0xFE]);
    mem.write8(0x0003, 0x77);
    mem.write8(0x0103, 0x11);
    run(&mut cpu, &mut mem, 2);
    assert_eq!(cpu.a, 0x77);
}

#[test]
fn indexed_indirect_pointer_wraps_in_zero_page() {
    // LDX #$01 / LDA ($FE,X): pointer at $FF/$00
    let (mut cpu, mut mem) = machine(&[0xA2, 0x01, 0xA1, 0xFE]);
    mem.write8(0x00FF, 0x34);
    mem.write8(0x0000, 0x12);
    mem.write8(0x1234, 0x99);
    run(&mut cpu, &mut mem, 2);
    assert_eq!(cpu.a, 0x99);
}

#[test_case(0x00, 4 ; "same page")]
#[test_case(0xC8, 5 ; "page crossed")]
fn absolute_y_page_cross_penalty(y: u8, expected: u32) {
    // LDY #y / LDA $0480,Y
    let (mut cpu, mut mem) = machine(&[0xA0, y, 0xB9, 0x80, 0x04]);
    run(&mut cpu, &mut mem, 1);
    cpu.step(&mut mem);
    assert_eq!(cpu.instruction_ticks(), expected);
}

#[test]
fn store_never_charges_page_cross() {
    // LDY #$C8 / STA $0480,Y
    let (mut cpu, mut mem) = machine(&[0xA0, 0xC8, 0x99, 0x80, 0x04]);
    run(&mut cpu, &mut mem, 1);
    cpu.step(&mut mem);
    assert_eq!(cpu.instruction_ticks(), 5);
}

#[test]
fn branch_timing_depends_on_distance() {
    // BNE +0x10 with Z clear, not crossing a page
    let (mut cpu, mut mem) = machine(&[0xA9, 0x01, 0xD0, 0x10]);
    run(&mut cpu, &mut mem, 1);
    cpu.step(&mut mem);
    assert_eq!(cpu.instruction_ticks(), 3, "taken, same page");
    assert_eq!(cpu.pc, ORIGIN + 4 + 0x10);

    // Not taken.
    let (mut cpu, mut mem) = machine(&[0xA9, 0x00, 0xD0, 0x10]);
    run(&mut cpu, &mut mem, 1);
    cpu.step(&mut mem);
    assert_eq!(cpu.instruction_ticks(), 2);

    // Taken across a page: branch backwards over the page boundary.
    let (mut cpu, mut mem) = machine(&[0xA9, 0x01, 0xD0, 0xF0]);
    run(&mut cpu, &mut mem, 1);
    cpu.step(&mut mem);
    assert_eq!(cpu.instruction_ticks(), 4, "taken, page crossed");
    assert_eq!(cpu.pc, ORIGIN + 4 - 0x10);
}

#[test]
fn rmw_operates_on_memory() {
    // LDA #$81 / STA $10 / ASL $10
    let (mut cpu, mut mem) = machine(&[0xA9, 0x81, 0x85, 0x10, 0x06, 0x10]);
    run(&mut cpu, &mut mem, 3);
    assert_eq!(mem.read8(0x0010), 0x02);
    assert!(cpu.flag(Flags::CARRY));
    assert_eq!(cpu.instruction_ticks(), 5);
}

#[test]
fn jmp_indirect_page_wrap_defect() {
    // JMP ($04FF): high byte comes from $0400, not $0500
    let (mut cpu, mut mem) = machine(&[0x6C, 0xFF, 0x04]);
    mem.write8(0x04FF, 0x00);
    mem.write8(0x0400, 0x30);
    mem.write8(0x0500, 0x99);
    run(&mut cpu, &mut mem, 1);
    assert_eq!(cpu.pc, 0x3000);
}

#[test]
fn jsr_rts_round_trip() {
    let (mut cpu, mut mem) = machine(&[0x20, 0x00, 0x30]);
    mem.load(0x3000, &[0x60]); // RTS
    run(&mut cpu, &mut mem, 1);
    assert_eq!(cpu.pc, 0x3000);
    // JSR stacks the address of its own last byte.
    assert_eq!(mem.read16_le(0x0100 + u32::from(cpu.sp) + 1), ORIGIN + 2);
    run(&mut cpu, &mut mem, 1);
    assert_eq!(cpu.pc, ORIGIN + 3);
}

#[test]
fn brk_pushes_flags_with_b_set() {
    let (mut cpu, mut mem) = machine(&[0x58, 0x00]); // CLI / BRK
    mem.write16_le(u32::from(IRQ_VECTOR), 0x4000);
    run(&mut cpu, &mut mem, 2);
    assert_eq!(cpu.pc, 0x4000);
    assert!(cpu.flag(Flags::IRQ_DISABLE));
    let stacked = mem.read8(0x0100 + u32::from(cpu.sp) + 1);
    assert_ne!(stacked & Flags::BREAK.bits(), 0);
    // Return address skips the signature byte.
    assert_eq!(mem.read16_le(0x0100 + u32::from(cpu.sp) + 2), ORIGIN + 3);
}

#[test]
fn irq_respects_interrupt_disable() {
    let (mut cpu, mut mem) = machine(&[0xEA, 0x58, 0xEA, 0xEA]);
    mem.write16_le(u32::from(IRQ_VECTOR), 0x4000);
    cpu.set_irq(true);
    run(&mut cpu, &mut mem, 1); // NOP retires with I still set
    assert_eq!(cpu.pc, ORIGIN + 1, "line held off by the mask");
    cpu.step(&mut mem); // CLI retires, then the line is honored
    assert_eq!(cpu.pc, 0x4000);
    // Stacked flags have B clear for a hardware interrupt.
    let stacked = mem.read8(0x0100 + u32::from(cpu.sp) + 1);
    assert_eq!(stacked & Flags::BREAK.bits(), 0);
    assert_eq!(mem.read16_le(0x0100 + u32::from(cpu.sp) + 2), ORIGIN + 2);
}

#[test]
fn nmi_wins_over_pending_irq() {
    let (mut cpu, mut mem) = machine(&[0x58, 0xEA, 0xEA, 0xEA]);
    mem.write16_le(u32::from(IRQ_VECTOR), 0x4000);
    mem.write16_le(u32::from(NMI_VECTOR), 0x5000);
    mem.load(0x5000, &[0x40]); // RTI
    run(&mut cpu, &mut mem, 1); // CLI
    cpu.set_irq(true);
    cpu.set_nmi(true);
    cpu.set_nmi(false);
    cpu.step(&mut mem); // the next instruction retires; NMI wins the sample
    assert_eq!(cpu.pc, 0x5000);
    // The maskable request is taken as soon as RTI unmasks it.
    cpu.step(&mut mem);
    assert_eq!(cpu.pc, 0x4000);
}

#[test]
fn nmi_edge_does_not_refire_while_held() {
    let (mut cpu, mut mem) = machine(&[0xEA, 0xEA, 0xEA, 0xEA]);
    mem.write16_le(u32::from(NMI_VECTOR), 0x5000);
    mem.load(0x5000, &[0xEA, 0xEA, 0xEA]);
    cpu.set_nmi(true);
    cpu.set_nmi(false); // edge
    cpu.step(&mut mem);
    assert_eq!(cpu.pc, 0x5000);
    // Line still low: no second service.
    cpu.step(&mut mem);
    assert_eq!(cpu.pc, 0x5001);
}

#[test]
fn illegal_opcode_continues_as_nop() {
    let (mut cpu, mut mem) = machine(&[0x02, 0xA9, 0x42]);
    run(&mut cpu, &mut mem, 2);
    assert_eq!(cpu.state(), CpuState::Running);
    assert_eq!(cpu.a, 0x42);
}

#[test]
fn snapshot_round_trip() {
    let program = [0xA9, 0x42, 0x48, 0xA2, 0x10, 0xE8];
    let (mut cpu, mut mem) = machine(&program);
    run(&mut cpu, &mut mem, 3);
    let snap = cpu.snapshot().unwrap();
    assert_eq!(snap["cpu"], "6502");

    let (mut other, mut mem2) = machine(&program);
    other.restore(&snap).unwrap();
    run(&mut cpu, &mut mem, 3);
    run(&mut other, &mut mem2, 3);
    assert_eq!(cpu.x, other.x);
    assert_eq!(cpu.pc, other.pc);
    assert_eq!(cpu.f, other.f);
}
