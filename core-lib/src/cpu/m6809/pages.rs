//! The two prefixed opcode pages.
//!
//! Page 2 (0x10) holds the long branches, the Y/S register file and
//! SWI2; page 3 (0x11) is nearly empty: SWI3 and the U/S compares.
//! Cycle charges for these sub-opcodes come from the group tables; the
//! prefix slot in the main table is free.

use super::ops::{operand16, operand_addr, MODE_IMM};
use super::{Cpu6809, Flags, SWI2_VECTOR, SWI3_VECTOR};
use crate::bus::Bus;
use crate::cpu::{ExecResult, OpTable};
use once_cell::sync::Lazy;

fn op_unknown(c: &mut Cpu6809, _bus: &mut dyn Bus) -> ExecResult {
    Err(crate::cpu::Fault::UnknownOpcode {
        addr: u32::from(c.current_op),
        opcode: c.sub_opcode,
    })
}

impl Cpu6809 {
    /// Long branch: 16-bit displacement, one extra cycle when taken.
    fn long_branch(&mut self, bus: &mut dyn Bus, cc: u8, group: usize) {
        let d = self.fetch16(bus);
        if self.cond(cc) {
            let extra = Self::info().group_timing(group, self.sub_opcode).t3;
            self.tick(extra);
            self.pc = self.pc.wrapping_add(d);
        }
    }

    fn cmp16(&mut self, lhs: u16, v: u16) {
        let s = crate::alu::sub16(lhs, v, false);
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::OVERFLOW, s.overflow);
        self.adjust_nz16(s.result);
    }
}

fn build_page2() -> OpTable<Cpu6809> {
    let mut t = OpTable::new(op_unknown);

    // LBRN through LBLE; LBRA lives on the main page.
    for cc in 1..16u8 {
        t.set(0x20 | cc, move |c, b| {
            c.long_branch(b, cc, 0);
            Ok(())
        });
    }

    t.set(0x3F, |c, b| {
        c.software_interrupt(b, SWI2_VECTOR, Flags::empty());
        Ok(())
    });

    for mode in 0..4u8 {
        let block = 0x80 | (mode << 4);
        t.set(block | 0x3, move |c, b| {
            let v = operand16(c, b, mode);
            let d = c.d();
            c.cmp16(d, v);
            Ok(())
        });
        t.set(block | 0xC, move |c, b| {
            let v = operand16(c, b, mode);
            let y = c.y;
            c.cmp16(y, v);
            Ok(())
        });
        t.set(block | 0xE, move |c, b| {
            let v = operand16(c, b, mode);
            c.y = c.ld16(v);
            Ok(())
        });
        if mode != MODE_IMM {
            t.set(block | 0xF, move |c, b| {
                let addr = operand_addr(c, b, mode);
                let v = c.y;
                c.write16(b, addr, v);
                c.ld16(v);
                Ok(())
            });
        }

        let sblock = 0xC0 | (mode << 4);
        t.set(sblock | 0xE, move |c, b| {
            let v = operand16(c, b, mode);
            let v = c.ld16(v);
            c.set_s(v);
            Ok(())
        });
        if mode != MODE_IMM {
            t.set(sblock | 0xF, move |c, b| {
                let addr = operand_addr(c, b, mode);
                let v = c.s;
                c.write16(b, addr, v);
                c.ld16(v);
                Ok(())
            });
        }
    }

    t
}

fn build_page3() -> OpTable<Cpu6809> {
    let mut t = OpTable::new(op_unknown);

    t.set(0x3F, |c, b| {
        c.software_interrupt(b, SWI3_VECTOR, Flags::empty());
        Ok(())
    });

    for mode in 0..4u8 {
        let block = 0x80 | (mode << 4);
        t.set(block | 0x3, move |c, b| {
            let v = operand16(c, b, mode);
            let u = c.u;
            c.cmp16(u, v);
            Ok(())
        });
        t.set(block | 0xC, move |c, b| {
            let v = operand16(c, b, mode);
            let s = c.s;
            c.cmp16(s, v);
            Ok(())
        });
    }

    t
}

pub(super) static PAGE2: Lazy<OpTable<Cpu6809>> = Lazy::new(build_page2);
pub(super) static PAGE3: Lazy<OpTable<Cpu6809>> = Lazy::new(build_page3);
