//! 6809 instruction set: main-page dispatch table and the semantics
//! shared with the prefixed pages.
//!
//! The accumulator blocks at 0x80-0xFF are a 16x4 grid: the low nibble
//! picks the operation, bits 4-5 pick the addressing mode (immediate,
//! direct, indexed, extended), so most of the table is built in loops.
//! The read-modify-write block repeats at 0x00 (direct), 0x40/0x50
//! (inherent on A/B), 0x60 (indexed) and 0x70 (extended).

use super::{Cpu6809, Flags, Wait, SWI_VECTOR};
use crate::alu;
use crate::bus::Bus;
use crate::cpu::{ExecResult, OpTable};
use once_cell::sync::Lazy;

// Addressing-mode column (bits 4-5 of the accumulator-block opcodes).
pub(super) const MODE_IMM: u8 = 0;
pub(super) const MODE_DIRECT: u8 = 1;
pub(super) const MODE_INDEXED: u8 = 2;
pub(super) const MODE_EXTENDED: u8 = 3;

impl Cpu6809 {
    /// Index register by postbyte field: X, Y, U, S.
    fn ixreg(&self, rr: u8) -> u16 {
        match rr & 3 {
            0 => self.x,
            1 => self.y,
            2 => self.u,
            _ => self.s,
        }
    }

    fn set_ixreg(&mut self, rr: u8, v: u16) {
        match rr & 3 {
            0 => self.x = v,
            1 => self.y = v,
            2 => self.u = v,
            _ => self.set_s(v),
        }
    }

    fn direct_addr(&mut self, bus: &mut dyn Bus) -> u16 {
        let lo = self.fetch8(bus);
        common::make_word(self.dp, lo)
    }

    fn extended_addr(&mut self, bus: &mut dyn Bus) -> u16 {
        self.fetch16(bus)
    }

    /// Resolve an indexed postbyte, billing its extra cycles. Unused
    /// encodings fall back to plain `,R`.
    pub(super) fn indexed_addr(&mut self, bus: &mut dyn Bus) -> u16 {
        let post = self.fetch8(bus);
        let rr = (post >> 5) & 3;
        if post & 0x80 == 0 {
            // 5-bit signed offset.
            self.tick(1);
            let mut off = post & 0x1F;
            if off & 0x10 != 0 {
                off |= 0xE0;
            }
            return self.ixreg(rr).wrapping_add(common::widen(off));
        }
        let base = self.ixreg(rr);
        let addr = match post & 0x0F {
            0x00 => {
                self.tick(2);
                self.set_ixreg(rr, base.wrapping_add(1));
                base
            }
            0x01 => {
                self.tick(3);
                self.set_ixreg(rr, base.wrapping_add(2));
                base
            }
            0x02 => {
                self.tick(2);
                let a = base.wrapping_sub(1);
                self.set_ixreg(rr, a);
                a
            }
            0x03 => {
                self.tick(3);
                let a = base.wrapping_sub(2);
                self.set_ixreg(rr, a);
                a
            }
            0x05 => {
                self.tick(1);
                base.wrapping_add(common::widen(self.b))
            }
            0x06 => {
                self.tick(1);
                base.wrapping_add(common::widen(self.a))
            }
            0x08 => {
                self.tick(1);
                let d = self.fetch8(bus);
                base.wrapping_add(common::widen(d))
            }
            0x09 => {
                self.tick(4);
                let d = self.fetch16(bus);
                base.wrapping_add(d)
            }
            0x0B => {
                self.tick(4);
                base.wrapping_add(self.d())
            }
            0x0C => {
                self.tick(1);
                let d = self.fetch8(bus);
                self.pc.wrapping_add(common::widen(d))
            }
            0x0D => {
                self.tick(5);
                let d = self.fetch16(bus);
                self.pc.wrapping_add(d)
            }
            0x0F => {
                self.tick(2);
                self.fetch16(bus)
            }
            _ => base,
        };
        if post & 0x10 != 0 {
            self.tick(3);
            self.read16(bus, addr)
        } else {
            addr
        }
    }

    // 8-bit arithmetic with full condition codes.

    fn add8v(&mut self, a: u8, v: u8, carry: bool) -> u8 {
        let s = alu::add8(a, v, carry);
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::OVERFLOW, s.overflow);
        self.set_flag(Flags::HALF_CARRY, s.half);
        self.adjust_nz8(s.result);
        s.result
    }

    /// Subtract; H is left alone, which is what the silicon does.
    fn sub8v(&mut self, a: u8, v: u8, borrow: bool) -> u8 {
        let s = alu::sub8(a, v, borrow);
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::OVERFLOW, s.overflow);
        self.adjust_nz8(s.result);
        s.result
    }

    fn logic8(&mut self, v: u8) -> u8 {
        self.set_flag(Flags::OVERFLOW, false);
        self.adjust_nz8(v);
        v
    }

    fn add16v(&mut self, a: u16, v: u16) -> u16 {
        let s = alu::add16(a, v, false);
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::OVERFLOW, s.overflow);
        self.adjust_nz16(s.result);
        s.result
    }

    fn sub16v(&mut self, a: u16, v: u16) -> u16 {
        let s = alu::sub16(a, v, false);
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::OVERFLOW, s.overflow);
        self.adjust_nz16(s.result);
        s.result
    }

    pub(super) fn ld16(&mut self, v: u16) -> u16 {
        self.set_flag(Flags::OVERFLOW, false);
        self.adjust_nz16(v);
        v
    }

    /// The unary block: NEG through CLR, selected by the opcode's low
    /// nibble. TST and JMP are handled by the callers.
    fn unary(&mut self, low: u8, v: u8) -> u8 {
        match low {
            0x0 => self.sub8v(0, v, false),
            0x3 => {
                let r = self.logic8(!v);
                self.set_flag(Flags::CARRY, true);
                r
            }
            0x4 => {
                self.set_flag(Flags::CARRY, v & 1 != 0);
                let r = v >> 1;
                self.adjust_nz8(r);
                r
            }
            0x6 => {
                let carry = self.flag(Flags::CARRY);
                self.set_flag(Flags::CARRY, v & 1 != 0);
                let r = (v >> 1) | (u8::from(carry) << 7);
                self.adjust_nz8(r);
                r
            }
            0x7 => {
                self.set_flag(Flags::CARRY, v & 1 != 0);
                let r = ((v as i8) >> 1) as u8;
                self.adjust_nz8(r);
                r
            }
            0x8 => {
                self.set_flag(Flags::CARRY, v & 0x80 != 0);
                self.set_flag(Flags::OVERFLOW, (v ^ (v << 1)) & 0x80 != 0);
                let r = v << 1;
                self.adjust_nz8(r);
                r
            }
            0x9 => {
                let carry = self.flag(Flags::CARRY);
                self.set_flag(Flags::CARRY, v & 0x80 != 0);
                self.set_flag(Flags::OVERFLOW, (v ^ (v << 1)) & 0x80 != 0);
                let r = (v << 1) | u8::from(carry);
                self.adjust_nz8(r);
                r
            }
            0xA => {
                let r = v.wrapping_sub(1);
                self.set_flag(Flags::OVERFLOW, v == 0x80);
                self.adjust_nz8(r);
                r
            }
            0xC => {
                let r = v.wrapping_add(1);
                self.set_flag(Flags::OVERFLOW, v == 0x7F);
                self.adjust_nz8(r);
                r
            }
            _ => {
                // CLR
                self.cc -= Flags::NEGATIVE | Flags::OVERFLOW | Flags::CARRY;
                self.set_flag(Flags::ZERO, true);
                0
            }
        }
    }

    fn daa(&mut self) {
        let mut adjust = 0u8;
        if self.a & 0x0F > 9 || self.flag(Flags::HALF_CARRY) {
            adjust |= 0x06;
        }
        if self.a > 0x99 || self.flag(Flags::CARRY) {
            adjust |= 0x60;
            self.set_flag(Flags::CARRY, true);
        }
        self.a = self.a.wrapping_add(adjust);
        let a = self.a;
        self.adjust_nz8(a);
    }

    /// Branch condition by encoding field (low nibble of the Bcc/LBcc
    /// opcode).
    pub(super) fn cond(&self, idx: u8) -> bool {
        let c = self.flag(Flags::CARRY);
        let z = self.flag(Flags::ZERO);
        let n = self.flag(Flags::NEGATIVE);
        let v = self.flag(Flags::OVERFLOW);
        let positive = match idx >> 1 {
            0 => true,
            1 => !(c || z),
            2 => !c,
            3 => !z,
            4 => !v,
            5 => !n,
            6 => n == v,
            _ => !z && (n == v),
        };
        positive == (idx & 1 == 0)
    }

    // Inter-register codes for TFR/EXG: D X Y U S PC, then A B CC DP.

    fn inter_get(&self, code: u8) -> u16 {
        match code {
            0x0 => self.d(),
            0x1 => self.x,
            0x2 => self.y,
            0x3 => self.u,
            0x4 => self.s,
            0x5 => self.pc,
            0x8 => u16::from(self.a),
            0x9 => u16::from(self.b),
            0xA => u16::from(self.cc.bits()),
            0xB => u16::from(self.dp),
            _ => 0xFFFF,
        }
    }

    fn inter_set(&mut self, code: u8, v: u16) {
        match code {
            0x0 => self.set_d(v),
            0x1 => self.x = v,
            0x2 => self.y = v,
            0x3 => self.u = v,
            0x4 => self.set_s(v),
            0x5 => self.pc = v,
            0x8 => self.a = common::lo(v),
            0x9 => self.b = common::lo(v),
            0xA => self.cc = Flags::from_bits_truncate(common::lo(v)),
            0xB => self.dp = common::lo(v),
            _ => {}
        }
    }

    // Stack masks: bit 7 PC, 6 U/S, 5 Y, 4 X, 3 DP, 2 B, 1 A, 0 CC.
    // One extra cycle per byte moved.

    fn pshs(&mut self, bus: &mut dyn Bus, mask: u8) {
        if common::bit(mask, 7) {
            let v = self.pc;
            self.push16s(bus, v);
            self.tick(2);
        }
        if common::bit(mask, 6) {
            let v = self.u;
            self.push16s(bus, v);
            self.tick(2);
        }
        if common::bit(mask, 5) {
            let v = self.y;
            self.push16s(bus, v);
            self.tick(2);
        }
        if common::bit(mask, 4) {
            let v = self.x;
            self.push16s(bus, v);
            self.tick(2);
        }
        if common::bit(mask, 3) {
            let v = self.dp;
            self.push8s(bus, v);
            self.tick(1);
        }
        if common::bit(mask, 2) {
            let v = self.b;
            self.push8s(bus, v);
            self.tick(1);
        }
        if common::bit(mask, 1) {
            let v = self.a;
            self.push8s(bus, v);
            self.tick(1);
        }
        if common::bit(mask, 0) {
            let v = self.cc.bits();
            self.push8s(bus, v);
            self.tick(1);
        }
    }

    fn puls(&mut self, bus: &mut dyn Bus, mask: u8) {
        if common::bit(mask, 0) {
            let v = self.pop8s(bus);
            self.cc = Flags::from_bits_truncate(v);
            self.tick(1);
        }
        if common::bit(mask, 1) {
            self.a = self.pop8s(bus);
            self.tick(1);
        }
        if common::bit(mask, 2) {
            self.b = self.pop8s(bus);
            self.tick(1);
        }
        if common::bit(mask, 3) {
            self.dp = self.pop8s(bus);
            self.tick(1);
        }
        if common::bit(mask, 4) {
            self.x = self.pop16s(bus);
            self.tick(2);
        }
        if common::bit(mask, 5) {
            self.y = self.pop16s(bus);
            self.tick(2);
        }
        if common::bit(mask, 6) {
            self.u = self.pop16s(bus);
            self.tick(2);
        }
        if common::bit(mask, 7) {
            self.pc = self.pop16s(bus);
            self.tick(2);
        }
    }

    fn push16u(&mut self, bus: &mut dyn Bus, v: u16) {
        self.push8u(bus, common::lo(v));
        self.push8u(bus, common::hi(v));
    }

    fn pop16u(&mut self, bus: &mut dyn Bus) -> u16 {
        let h = self.pop8u(bus);
        let l = self.pop8u(bus);
        common::make_word(h, l)
    }

    fn pshu(&mut self, bus: &mut dyn Bus, mask: u8) {
        if common::bit(mask, 7) {
            let v = self.pc;
            self.push16u(bus, v);
            self.tick(2);
        }
        if common::bit(mask, 6) {
            let v = self.s;
            self.push16u(bus, v);
            self.tick(2);
        }
        if common::bit(mask, 5) {
            let v = self.y;
            self.push16u(bus, v);
            self.tick(2);
        }
        if common::bit(mask, 4) {
            let v = self.x;
            self.push16u(bus, v);
            self.tick(2);
        }
        if common::bit(mask, 3) {
            let v = self.dp;
            self.push8u(bus, v);
            self.tick(1);
        }
        if common::bit(mask, 2) {
            let v = self.b;
            self.push8u(bus, v);
            self.tick(1);
        }
        if common::bit(mask, 1) {
            let v = self.a;
            self.push8u(bus, v);
            self.tick(1);
        }
        if common::bit(mask, 0) {
            let v = self.cc.bits();
            self.push8u(bus, v);
            self.tick(1);
        }
    }

    fn pulu(&mut self, bus: &mut dyn Bus, mask: u8) {
        if common::bit(mask, 0) {
            let v = self.pop8u(bus);
            self.cc = Flags::from_bits_truncate(v);
            self.tick(1);
        }
        if common::bit(mask, 1) {
            self.a = self.pop8u(bus);
            self.tick(1);
        }
        if common::bit(mask, 2) {
            self.b = self.pop8u(bus);
            self.tick(1);
        }
        if common::bit(mask, 3) {
            self.dp = self.pop8u(bus);
            self.tick(1);
        }
        if common::bit(mask, 4) {
            self.x = self.pop16u(bus);
            self.tick(2);
        }
        if common::bit(mask, 5) {
            self.y = self.pop16u(bus);
            self.tick(2);
        }
        if common::bit(mask, 6) {
            let v = self.pop16u(bus);
            self.set_s(v);
            self.tick(2);
        }
        if common::bit(mask, 7) {
            self.pc = self.pop16u(bus);
            self.tick(2);
        }
    }
}

/// Effective address for the memory columns of the accumulator grid.
pub(super) fn operand_addr(c: &mut Cpu6809, bus: &mut dyn Bus, mode: u8) -> u16 {
    match mode {
        MODE_DIRECT => c.direct_addr(bus),
        MODE_INDEXED => c.indexed_addr(bus),
        _ => c.extended_addr(bus),
    }
}

pub(super) fn operand8(c: &mut Cpu6809, bus: &mut dyn Bus, mode: u8) -> u8 {
    if mode == MODE_IMM {
        c.fetch8(bus)
    } else {
        let addr = operand_addr(c, bus, mode);
        c.read8(bus, addr)
    }
}

pub(super) fn operand16(c: &mut Cpu6809, bus: &mut dyn Bus, mode: u8) -> u16 {
    if mode == MODE_IMM {
        c.fetch16(bus)
    } else {
        let addr = operand_addr(c, bus, mode);
        c.read16(bus, addr)
    }
}

fn op_unknown(c: &mut Cpu6809, _bus: &mut dyn Bus) -> ExecResult {
    Err(crate::cpu::Fault::UnknownOpcode {
        addr: u32::from(c.current_op),
        opcode: c.opcode,
    })
}

#[allow(clippy::too_many_lines)]
fn build() -> OpTable<Cpu6809> {
    let mut t = OpTable::new(op_unknown);

    // Unary block over memory: direct, indexed, extended columns.
    for (block, mode) in [
        (0x00u8, MODE_DIRECT),
        (0x60, MODE_INDEXED),
        (0x70, MODE_EXTENDED),
    ] {
        for low in [0x0u8, 0x3, 0x4, 0x6, 0x7, 0x8, 0x9, 0xA, 0xC, 0xF] {
            t.set(block | low, move |c, b| {
                let addr = operand_addr(c, b, mode);
                let v = c.read8(b, addr);
                let r = c.unary(low, v);
                c.write8(b, addr, r);
                Ok(())
            });
        }
        t.set(block | 0xD, move |c, b| {
            // TST only reads.
            let addr = operand_addr(c, b, mode);
            let v = c.read8(b, addr);
            c.set_flag(Flags::OVERFLOW, false);
            c.adjust_nz8(v);
            Ok(())
        });
        t.set(block | 0xE, move |c, b| {
            c.pc = operand_addr(c, b, mode);
            Ok(())
        });
    }

    // Unary block on the accumulators.
    for low in [0x0u8, 0x3, 0x4, 0x6, 0x7, 0x8, 0x9, 0xA, 0xC, 0xF] {
        t.set(0x40 | low, move |c, _b| {
            let v = c.a;
            c.a = c.unary(low, v);
            Ok(())
        });
        t.set(0x50 | low, move |c, _b| {
            let v = c.b;
            c.b = c.unary(low, v);
            Ok(())
        });
    }
    for (op, sel) in [(0x4Du8, 0u8), (0x5D, 1)] {
        t.set(op, move |c, _b| {
            let v = if sel == 0 { c.a } else { c.b };
            c.set_flag(Flags::OVERFLOW, false);
            c.adjust_nz8(v);
            Ok(())
        });
    }

    t.set(0x10, |c, b| {
        let op2 = c.fetch8(b);
        c.sub_opcode = op2;
        c.tick(Cpu6809::info().group_timing(0, op2).base);
        super::pages::PAGE2.exec(c, b, op2)
    });
    t.set(0x11, |c, b| {
        let op2 = c.fetch8(b);
        c.sub_opcode = op2;
        c.tick(Cpu6809::info().group_timing(1, op2).base);
        super::pages::PAGE3.exec(c, b, op2)
    });

    t.set(0x12, |_c, _b| Ok(()));
    t.set(0x13, |c, _b| {
        c.halt_for(Wait::Sync);
        Ok(())
    });
    t.set(0x16, |c, b| {
        let d = c.fetch16(b);
        c.pc = c.pc.wrapping_add(d);
        Ok(())
    });
    t.set(0x17, |c, b| {
        let d = c.fetch16(b);
        let pc = c.pc;
        c.push16s(b, pc);
        c.pc = c.pc.wrapping_add(d);
        Ok(())
    });
    t.set(0x19, |c, _b| {
        c.daa();
        Ok(())
    });
    t.set(0x1A, |c, b| {
        let v = c.fetch8(b);
        c.cc |= Flags::from_bits_truncate(v);
        Ok(())
    });
    t.set(0x1C, |c, b| {
        let v = c.fetch8(b);
        c.cc &= Flags::from_bits_truncate(v);
        Ok(())
    });
    t.set(0x1D, |c, _b| {
        let v = common::widen(c.b);
        c.set_d(v);
        let d = c.d();
        c.set_flag(Flags::OVERFLOW, false);
        c.adjust_nz16(d);
        Ok(())
    });
    t.set(0x1E, |c, b| {
        let post = c.fetch8(b);
        let r1 = c.inter_get(post >> 4);
        let r2 = c.inter_get(post & 0x0F);
        c.inter_set(post >> 4, r2);
        c.inter_set(post & 0x0F, r1);
        Ok(())
    });
    t.set(0x1F, |c, b| {
        let post = c.fetch8(b);
        let v = c.inter_get(post >> 4);
        c.inter_set(post & 0x0F, v);
        Ok(())
    });

    // Short branches.
    for cc in 0..16u8 {
        t.set(0x20 | cc, move |c, b| {
            let d = c.fetch8(b);
            if c.cond(cc) {
                c.pc = c.pc.wrapping_add(common::widen(d));
            }
            Ok(())
        });
    }

    t.set(0x30, |c, b| {
        c.x = c.indexed_addr(b);
        let z = c.x == 0;
        c.set_flag(Flags::ZERO, z);
        Ok(())
    });
    t.set(0x31, |c, b| {
        c.y = c.indexed_addr(b);
        let z = c.y == 0;
        c.set_flag(Flags::ZERO, z);
        Ok(())
    });
    t.set(0x32, |c, b| {
        let v = c.indexed_addr(b);
        c.set_s(v);
        Ok(())
    });
    t.set(0x33, |c, b| {
        c.u = c.indexed_addr(b);
        Ok(())
    });
    t.set(0x34, |c, b| {
        let mask = c.fetch8(b);
        c.pshs(b, mask);
        Ok(())
    });
    t.set(0x35, |c, b| {
        let mask = c.fetch8(b);
        c.puls(b, mask);
        Ok(())
    });
    t.set(0x36, |c, b| {
        let mask = c.fetch8(b);
        c.pshu(b, mask);
        Ok(())
    });
    t.set(0x37, |c, b| {
        let mask = c.fetch8(b);
        c.pulu(b, mask);
        Ok(())
    });
    t.set(0x39, |c, b| {
        c.pc = c.pop16s(b);
        Ok(())
    });
    t.set(0x3A, |c, _b| {
        c.x = c.x.wrapping_add(u16::from(c.b));
        Ok(())
    });
    t.set(0x3B, |c, b| {
        let v = c.pop8s(b);
        c.cc = Flags::from_bits_truncate(v);
        if c.flag(Flags::ENTIRE) {
            c.tick_taken();
            c.a = c.pop8s(b);
            c.b = c.pop8s(b);
            c.dp = c.pop8s(b);
            c.x = c.pop16s(b);
            c.y = c.pop16s(b);
            c.u = c.pop16s(b);
        }
        c.pc = c.pop16s(b);
        Ok(())
    });
    t.set(0x3C, |c, b| {
        let v = c.fetch8(b);
        c.cc &= Flags::from_bits_truncate(v);
        c.set_flag(Flags::ENTIRE, true);
        c.push_entire(b);
        c.halt_for(Wait::Cwai);
        Ok(())
    });
    t.set(0x3D, |c, _b| {
        let d = u16::from(c.a) * u16::from(c.b);
        c.set_d(d);
        c.set_flag(Flags::ZERO, d == 0);
        c.set_flag(Flags::CARRY, d & 0x80 != 0);
        Ok(())
    });
    t.set(0x3F, |c, b| {
        c.software_interrupt(b, SWI_VECTOR, Flags::IRQ_MASK | Flags::FIRQ_MASK);
        Ok(())
    });

    // Accumulator A column and the X/D/JSR rows sharing it.
    for mode in 0..4u8 {
        let block = 0x80 | (mode << 4);
        t.set(block, move |c, b| {
            let v = operand8(c, b, mode);
            let a = c.a;
            c.a = c.sub8v(a, v, false);
            Ok(())
        });
        t.set(block | 0x1, move |c, b| {
            let v = operand8(c, b, mode);
            let a = c.a;
            c.sub8v(a, v, false);
            Ok(())
        });
        t.set(block | 0x2, move |c, b| {
            let v = operand8(c, b, mode);
            let a = c.a;
            let borrow = c.flag(Flags::CARRY);
            c.a = c.sub8v(a, v, borrow);
            Ok(())
        });
        t.set(block | 0x3, move |c, b| {
            let v = operand16(c, b, mode);
            let d = c.d();
            let r = c.sub16v(d, v);
            c.set_d(r);
            Ok(())
        });
        t.set(block | 0x4, move |c, b| {
            let v = operand8(c, b, mode);
            c.a = c.logic8(c.a & v);
            Ok(())
        });
        t.set(block | 0x5, move |c, b| {
            let v = operand8(c, b, mode);
            let r = c.a & v;
            c.logic8(r);
            Ok(())
        });
        t.set(block | 0x6, move |c, b| {
            let v = operand8(c, b, mode);
            c.a = c.logic8(v);
            Ok(())
        });
        t.set(block | 0x8, move |c, b| {
            let v = operand8(c, b, mode);
            c.a = c.logic8(c.a ^ v);
            Ok(())
        });
        t.set(block | 0x9, move |c, b| {
            let v = operand8(c, b, mode);
            let a = c.a;
            let carry = c.flag(Flags::CARRY);
            c.a = c.add8v(a, v, carry);
            Ok(())
        });
        t.set(block | 0xA, move |c, b| {
            let v = operand8(c, b, mode);
            c.a = c.logic8(c.a | v);
            Ok(())
        });
        t.set(block | 0xB, move |c, b| {
            let v = operand8(c, b, mode);
            let a = c.a;
            c.a = c.add8v(a, v, false);
            Ok(())
        });
        t.set(block | 0xC, move |c, b| {
            let v = operand16(c, b, mode);
            let x = c.x;
            c.sub16v(x, v);
            Ok(())
        });
        t.set(block | 0xE, move |c, b| {
            let v = operand16(c, b, mode);
            c.x = c.ld16(v);
            Ok(())
        });
        if mode != MODE_IMM {
            t.set(block | 0x7, move |c, b| {
                let addr = operand_addr(c, b, mode);
                let v = c.a;
                c.write8(b, addr, v);
                c.logic8(v);
                Ok(())
            });
            t.set(block | 0xD, move |c, b| {
                let addr = operand_addr(c, b, mode);
                let pc = c.pc;
                c.push16s(b, pc);
                c.pc = addr;
                Ok(())
            });
            t.set(block | 0xF, move |c, b| {
                let addr = operand_addr(c, b, mode);
                let v = c.x;
                c.write16(b, addr, v);
                c.ld16(v);
                Ok(())
            });
        }
    }
    // BSR takes the JSR slot in the immediate column.
    t.set(0x8D, |c, b| {
        let d = c.fetch8(b);
        let pc = c.pc;
        c.push16s(b, pc);
        c.pc = c.pc.wrapping_add(common::widen(d));
        Ok(())
    });

    // Accumulator B column, with the D/U rows.
    for mode in 0..4u8 {
        let block = 0xC0 | (mode << 4);
        t.set(block, move |c, b| {
            let v = operand8(c, b, mode);
            let r = c.b;
            c.b = c.sub8v(r, v, false);
            Ok(())
        });
        t.set(block | 0x1, move |c, b| {
            let v = operand8(c, b, mode);
            let r = c.b;
            c.sub8v(r, v, false);
            Ok(())
        });
        t.set(block | 0x2, move |c, b| {
            let v = operand8(c, b, mode);
            let r = c.b;
            let borrow = c.flag(Flags::CARRY);
            c.b = c.sub8v(r, v, borrow);
            Ok(())
        });
        t.set(block | 0x3, move |c, b| {
            let v = operand16(c, b, mode);
            let d = c.d();
            let r = c.add16v(d, v);
            c.set_d(r);
            Ok(())
        });
        t.set(block | 0x4, move |c, b| {
            let v = operand8(c, b, mode);
            c.b = c.logic8(c.b & v);
            Ok(())
        });
        t.set(block | 0x5, move |c, b| {
            let v = operand8(c, b, mode);
            let r = c.b & v;
            c.logic8(r);
            Ok(())
        });
        t.set(block | 0x6, move |c, b| {
            let v = operand8(c, b, mode);
            c.b = c.logic8(v);
            Ok(())
        });
        t.set(block | 0x8, move |c, b| {
            let v = operand8(c, b, mode);
            c.b = c.logic8(c.b ^ v);
            Ok(())
        });
        t.set(block | 0x9, move |c, b| {
            let v = operand8(c, b, mode);
            let r = c.b;
            let carry = c.flag(Flags::CARRY);
            c.b = c.add8v(r, v, carry);
            Ok(())
        });
        t.set(block | 0xA, move |c, b| {
            let v = operand8(c, b, mode);
            c.b = c.logic8(c.b | v);
            Ok(())
        });
        t.set(block | 0xB, move |c, b| {
            let v = operand8(c, b, mode);
            let r = c.b;
            c.b = c.add8v(r, v, false);
            Ok(())
        });
        t.set(block | 0xC, move |c, b| {
            let v = operand16(c, b, mode);
            let r = c.ld16(v);
            c.set_d(r);
            Ok(())
        });
        t.set(block | 0xE, move |c, b| {
            let v = operand16(c, b, mode);
            c.u = c.ld16(v);
            Ok(())
        });
        if mode != MODE_IMM {
            t.set(block | 0x7, move |c, b| {
                let addr = operand_addr(c, b, mode);
                let v = c.b;
                c.write8(b, addr, v);
                c.logic8(v);
                Ok(())
            });
            t.set(block | 0xD, move |c, b| {
                let addr = operand_addr(c, b, mode);
                let v = c.d();
                c.write16(b, addr, v);
                c.ld16(v);
                Ok(())
            });
            t.set(block | 0xF, move |c, b| {
                let addr = operand_addr(c, b, mode);
                let v = c.u;
                c.write16(b, addr, v);
                c.ld16(v);
                Ok(())
            });
        }
    }

    t
}

pub(super) static TABLE: Lazy<OpTable<Cpu6809>> = Lazy::new(build);
