//! Shared fixtures: one small machine per architecture, each loaded with
//! a short program that exercises arithmetic, memory writes and control
//! flow in that architecture's own encoding.

use core_lib::{Cpu, Cpu6502, Cpu6809, Cpu8080, Cpu8086, CpuZ80, FlatMemory};

pub struct Machine {
    pub name: &'static str,
    pub cpu: Box<dyn Cpu>,
    pub mem: FlatMemory,
}

fn machine(name: &'static str, mut cpu: Box<dyn Cpu>, mut mem: FlatMemory) -> Machine {
    cpu.reset(&mut mem);
    Machine { name, cpu, mem }
}

/// All five cores, reset and ready to step.
pub fn all_machines() -> Vec<Machine> {
    vec![
        machine("6502", Box::new(Cpu6502::new()), mem_6502()),
        machine("8080", Box::new(Cpu8080::new()), mem_8080()),
        machine("z80", Box::new(CpuZ80::new()), mem_z80()),
        machine("8086", Box::new(Cpu8086::new()), mem_8086()),
        machine("6809", Box::new(Cpu6809::new()), mem_6809()),
    ]
}

fn mem_6502() -> FlatMemory {
    let mut mem = FlatMemory::new(0x1_0000);
    // LDX #0 / LDA #$10 / CLC / ADC #5 / INX / STA $40 / JMP self
    mem.load(
        0x0200,
        &[
            0xA2, 0x00, 0xA9, 0x10, 0x18, 0x69, 0x05, 0xE8, 0x85, 0x40, 0x4C, 0x0A, 0x02,
        ],
    );
    mem.load(0xFFFC, &[0x00, 0x02]);
    mem
}

fn mem_8080() -> FlatMemory {
    let mut mem = FlatMemory::new(0x1_0000);
    // MVI A,5 / MVI B,3 / ADD B / ADI $10 / STA $0040 / JMP 0
    mem.load(
        0,
        &[0x3E, 0x05, 0x06, 0x03, 0x80, 0xC6, 0x10, 0x32, 0x40, 0x00, 0xC3, 0x00, 0x00],
    );
    mem
}

fn mem_z80() -> FlatMemory {
    let mut mem = FlatMemory::new(0x1_0000);
    // LD B,4 / LD HL,$1000 / LD A,$77 / fill loop (LD (HL),A / INC HL /
    // INC A / DJNZ) / HALT
    mem.load(
        0,
        &[0x06, 0x04, 0x21, 0x00, 0x10, 0x3E, 0x77, 0x77, 0x23, 0x3C, 0x10, 0xFB, 0x76],
    );
    mem
}

fn mem_8086() -> FlatMemory {
    let mut mem = FlatMemory::new(0x10_0000);
    // Reset target jumps to 0000:0100.
    mem.load(0xF_FFF0, &[0xEA, 0x00, 0x01, 0x00, 0x00]);
    // MOV AX,$1234 / MOV BX,$2000 / MOV [BX],AX / INC AX / HLT
    mem.load(0x0100, &[0xB8, 0x34, 0x12, 0xBB, 0x00, 0x20, 0x89, 0x07, 0x40, 0xF4]);
    mem
}

fn mem_6809() -> FlatMemory {
    let mut mem = FlatMemory::new(0x1_0000);
    // LDS #$0400 / LDA #$2A / LDB #7 / MUL / STD <$40 / BRA self
    mem.load(
        0x0400,
        &[0x10, 0xCE, 0x04, 0x00, 0x86, 0x2A, 0xC6, 0x07, 0x3D, 0xDD, 0x40, 0x20, 0xFE],
    );
    mem.load(0xFFFE, &[0x04, 0x00]);
    mem
}
