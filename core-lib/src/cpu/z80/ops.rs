//! Z80 unprefixed instruction set.
//!
//! Same octal grid as the 8080 but with the Z80's flag semantics: N
//! tracks add vs subtract, P/V is overflow for arithmetic and parity for
//! logic, and bits 3/5 of F shadow the result.

use super::{prefix, CpuZ80, Flags, IndexReg};
use crate::alu;
use crate::bus::Bus;
use crate::cpu::{ExecResult, OpTable};
use once_cell::sync::Lazy;

const REG_M: u8 = 6;

impl CpuZ80 {
    pub(super) fn reg(&mut self, bus: &mut dyn Bus, idx: u8) -> u8 {
        match idx {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            REG_M => {
                let addr = self.hl();
                self.read8(bus, addr)
            }
            _ => self.a,
        }
    }

    pub(super) fn set_reg(&mut self, bus: &mut dyn Bus, idx: u8, v: u8) {
        match idx {
            0 => self.b = v,
            1 => self.c = v,
            2 => self.d = v,
            3 => self.e = v,
            4 => self.h = v,
            5 => self.l = v,
            REG_M => {
                let addr = self.hl();
                self.write8(bus, addr, v);
            }
            _ => self.a = v,
        }
    }

    pub(super) fn pair(&self, idx: u8) -> u16 {
        match idx {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.sp,
        }
    }

    pub(super) fn set_pair(&mut self, idx: u8, v: u16) {
        match idx {
            0 => self.set_bc(v),
            1 => self.set_de(v),
            2 => self.set_hl(v),
            _ => self.sp = v,
        }
    }

    pub(super) fn cond(&self, idx: u8) -> bool {
        let (flag, want) = match idx {
            0 => (Flags::ZERO, false),
            1 => (Flags::ZERO, true),
            2 => (Flags::CARRY, false),
            3 => (Flags::CARRY, true),
            4 => (Flags::PARITY_OVERFLOW, false),
            5 => (Flags::PARITY_OVERFLOW, true),
            6 => (Flags::SIGN, false),
            _ => (Flags::SIGN, true),
        };
        self.flag(flag) == want
    }

    /// S, Z and the result-shadow bits 3/5.
    pub(super) fn adjust_szxy(&mut self, v: u8) {
        self.set_flag(Flags::SIGN, v & 0x80 != 0);
        self.set_flag(Flags::ZERO, v == 0);
        self.set_flag(Flags::XF, v & 0x08 != 0);
        self.set_flag(Flags::YF, v & 0x20 != 0);
    }

    pub(super) fn add_a(&mut self, v: u8, carry_in: bool) {
        let s = alu::add8(self.a, v, carry_in);
        self.a = s.result;
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::HALF_CARRY, s.half);
        self.set_flag(Flags::PARITY_OVERFLOW, s.overflow);
        self.set_flag(Flags::SUBTRACT, false);
        self.adjust_szxy(s.result);
    }

    /// Shared by SUB/SBC/CP/NEG; the caller decides what to do with the
    /// result.
    pub(super) fn sub_val(&mut self, lhs: u8, v: u8, borrow_in: bool) -> u8 {
        let s = alu::sub8(lhs, v, borrow_in);
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::HALF_CARRY, s.half);
        self.set_flag(Flags::PARITY_OVERFLOW, s.overflow);
        self.set_flag(Flags::SUBTRACT, true);
        self.adjust_szxy(s.result);
        s.result
    }

    fn logic_flags(&mut self, half: bool) {
        self.set_flag(Flags::CARRY, false);
        self.set_flag(Flags::HALF_CARRY, half);
        self.set_flag(Flags::SUBTRACT, false);
        let r = self.a;
        self.set_flag(Flags::PARITY_OVERFLOW, common::parity_even(r));
        self.adjust_szxy(r);
    }

    pub(super) fn and_a(&mut self, v: u8) {
        self.a &= v;
        self.logic_flags(true);
    }

    pub(super) fn xor_a(&mut self, v: u8) {
        self.a ^= v;
        self.logic_flags(false);
    }

    pub(super) fn or_a(&mut self, v: u8) {
        self.a |= v;
        self.logic_flags(false);
    }

    pub(super) fn alu_op(&mut self, op: u8, v: u8) {
        match op {
            0 => self.add_a(v, false),
            1 => {
                let c = self.flag(Flags::CARRY);
                self.add_a(v, c);
            }
            2 => self.a = self.sub_val(self.a, v, false),
            3 => {
                let c = self.flag(Flags::CARRY);
                self.a = self.sub_val(self.a, v, c);
            }
            4 => self.and_a(v),
            5 => self.xor_a(v),
            6 => self.or_a(v),
            _ => {
                // CP: flags only; bits 3/5 come from the operand.
                self.sub_val(self.a, v, false);
                self.set_flag(Flags::XF, v & 0x08 != 0);
                self.set_flag(Flags::YF, v & 0x20 != 0);
            }
        }
    }

    /// INC r: every flag but C.
    pub(super) fn inc8(&mut self, v: u8) -> u8 {
        let r = v.wrapping_add(1);
        self.set_flag(Flags::HALF_CARRY, v & 0x0F == 0x0F);
        self.set_flag(Flags::PARITY_OVERFLOW, v == 0x7F);
        self.set_flag(Flags::SUBTRACT, false);
        self.adjust_szxy(r);
        r
    }

    pub(super) fn dec8(&mut self, v: u8) -> u8 {
        let r = v.wrapping_sub(1);
        self.set_flag(Flags::HALF_CARRY, v & 0x0F == 0);
        self.set_flag(Flags::PARITY_OVERFLOW, v == 0x80);
        self.set_flag(Flags::SUBTRACT, true);
        self.adjust_szxy(r);
        r
    }

    /// ADD HL,rr (and ADD IX,rr): H from bit 11, C, N cleared; S/Z/PV
    /// untouched. Bits 3/5 from the high byte of the result.
    pub(super) fn add16_flags(&mut self, dst: u16, src: u16) -> u16 {
        let s = alu::add16(dst, src, false);
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::HALF_CARRY, s.half11);
        self.set_flag(Flags::SUBTRACT, false);
        let hi = common::hi(s.result);
        self.set_flag(Flags::XF, hi & 0x08 != 0);
        self.set_flag(Flags::YF, hi & 0x20 != 0);
        s.result
    }

    pub(super) fn daa(&mut self) {
        let a = self.a;
        let n = self.flag(Flags::SUBTRACT);
        let mut t = 0u8;
        if self.flag(Flags::HALF_CARRY) || (a & 0x0F) > 9 {
            t |= 0x06;
        }
        if self.flag(Flags::CARRY) || a > 0x99 {
            t |= 0x60;
        }
        let s = if n {
            alu::sub8(a, t, false)
        } else {
            alu::add8(a, t, false)
        };
        self.a = s.result;
        self.set_flag(Flags::CARRY, t & 0x60 != 0);
        self.set_flag(Flags::HALF_CARRY, s.half);
        self.set_flag(Flags::PARITY_OVERFLOW, common::parity_even(s.result));
        self.adjust_szxy(s.result);
    }

    pub(super) fn jr_if(&mut self, bus: &mut dyn Bus, taken: bool) {
        let d = self.fetch8(bus);
        if taken {
            self.pc = self.pc.wrapping_add(common::widen(d));
            self.tick_taken();
        }
    }

    pub(super) fn jp_if(&mut self, bus: &mut dyn Bus, taken: bool) {
        let target = self.fetch16(bus);
        if taken {
            self.pc = target;
            self.tick_taken();
        }
    }

    pub(super) fn call_if(&mut self, bus: &mut dyn Bus, taken: bool) {
        let target = self.fetch16(bus);
        if taken {
            let ret = self.pc;
            self.push16(bus, ret);
            self.pc = target;
            self.tick_taken();
        }
    }

    pub(super) fn ret_if(&mut self, bus: &mut dyn Bus, taken: bool) {
        if taken {
            self.pc = self.pop16(bus);
            self.tick_taken();
        }
    }

    pub(super) fn op_undefined(&mut self, _bus: &mut dyn Bus) -> ExecResult {
        log::warn!(
            "z80: unmapped opcode {:#04X} at {:#06X}, treating as NOP",
            self.opcode,
            self.current_op
        );
        Ok(())
    }
}

pub(super) static TABLE: Lazy<OpTable<CpuZ80>> = Lazy::new(build);

#[allow(clippy::too_many_lines)]
fn build() -> OpTable<CpuZ80> {
    let mut t = OpTable::new(CpuZ80::op_undefined);

    t.set(0x00, |_, _| Ok(()));

    // Loads over the register grid.
    for dst in 0..8u8 {
        for src in 0..8u8 {
            if dst == REG_M && src == REG_M {
                continue;
            }
            t.set(0x40 | dst << 3 | src, move |c, b| {
                let v = c.reg(b, src);
                c.set_reg(b, dst, v);
                Ok(())
            });
        }
    }
    t.set(0x76, |c, _| {
        c.halt();
        Ok(())
    });

    for r in 0..8u8 {
        t.set(0x04 | r << 3, move |c, b| {
            let v = c.reg(b, r);
            let v = c.inc8(v);
            c.set_reg(b, r, v);
            Ok(())
        });
        t.set(0x05 | r << 3, move |c, b| {
            let v = c.reg(b, r);
            let v = c.dec8(v);
            c.set_reg(b, r, v);
            Ok(())
        });
        t.set(0x06 | r << 3, move |c, b| {
            let v = c.fetch8(b);
            c.set_reg(b, r, v);
            Ok(())
        });
    }

    for op in 0..8u8 {
        for src in 0..8u8 {
            t.set(0x80 | op << 3 | src, move |c, b| {
                let v = c.reg(b, src);
                c.alu_op(op, v);
                Ok(())
            });
        }
        t.set(0xC6 | op << 3, move |c, b| {
            let v = c.fetch8(b);
            c.alu_op(op, v);
            Ok(())
        });
    }

    for rp in 0..4u8 {
        t.set(0x01 | rp << 4, move |c, b| {
            let v = c.fetch16(b);
            c.set_pair(rp, v);
            Ok(())
        });
        t.set(0x03 | rp << 4, move |c, _| {
            c.set_pair(rp, c.pair(rp).wrapping_add(1));
            Ok(())
        });
        t.set(0x0B | rp << 4, move |c, _| {
            c.set_pair(rp, c.pair(rp).wrapping_sub(1));
            Ok(())
        });
        t.set(0x09 | rp << 4, move |c, _| {
            let r = c.add16_flags(c.hl(), c.pair(rp));
            c.set_hl(r);
            Ok(())
        });
    }

    t.set(0x02, |c, b| {
        let addr = c.bc();
        let v = c.a;
        c.write8(b, addr, v);
        Ok(())
    });
    t.set(0x12, |c, b| {
        let addr = c.de();
        let v = c.a;
        c.write8(b, addr, v);
        Ok(())
    });
    t.set(0x0A, |c, b| {
        let addr = c.bc();
        c.a = c.read8(b, addr);
        Ok(())
    });
    t.set(0x1A, |c, b| {
        let addr = c.de();
        c.a = c.read8(b, addr);
        Ok(())
    });

    // Accumulator rotates: C, H, N and bits 3/5 only.
    let rot_flags = |c: &mut CpuZ80, carry: bool| {
        c.set_flag(Flags::CARRY, carry);
        c.set_flag(Flags::HALF_CARRY, false);
        c.set_flag(Flags::SUBTRACT, false);
        let a = c.a;
        c.set_flag(Flags::XF, a & 0x08 != 0);
        c.set_flag(Flags::YF, a & 0x20 != 0);
    };
    t.set(0x07, move |c, _| {
        let carry = c.a & 0x80 != 0;
        c.a = c.a.rotate_left(1);
        rot_flags(c, carry);
        Ok(())
    });
    t.set(0x0F, move |c, _| {
        let carry = c.a & 0x01 != 0;
        c.a = c.a.rotate_right(1);
        rot_flags(c, carry);
        Ok(())
    });
    t.set(0x17, move |c, _| {
        let carry = c.a & 0x80 != 0;
        c.a = c.a << 1 | u8::from(c.flag(Flags::CARRY));
        rot_flags(c, carry);
        Ok(())
    });
    t.set(0x1F, move |c, _| {
        let carry = c.a & 0x01 != 0;
        c.a = c.a >> 1 | u8::from(c.flag(Flags::CARRY)) << 7;
        rot_flags(c, carry);
        Ok(())
    });

    // Relative jumps.
    t.set(0x18, |c, b| {
        c.jr_if(b, true);
        Ok(())
    });
    t.set(0x10, |c, b| {
        c.b = c.b.wrapping_sub(1);
        let taken = c.b != 0;
        c.jr_if(b, taken);
        Ok(())
    });
    for cc in 0..4u8 {
        t.set(0x20 | cc << 3, move |c, b| {
            let taken = c.cond(cc);
            c.jr_if(b, taken);
            Ok(())
        });
    }

    t.set(0x08, |c, _| {
        core::mem::swap(&mut c.a, &mut c.a2);
        core::mem::swap(&mut c.f, &mut c.f2);
        Ok(())
    });
    t.set(0xD9, |c, _| {
        core::mem::swap(&mut c.b, &mut c.b2);
        core::mem::swap(&mut c.c, &mut c.c2);
        core::mem::swap(&mut c.d, &mut c.d2);
        core::mem::swap(&mut c.e, &mut c.e2);
        core::mem::swap(&mut c.h, &mut c.h2);
        core::mem::swap(&mut c.l, &mut c.l2);
        Ok(())
    });

    t.set(0x22, |c, b| {
        let addr = c.fetch16(b);
        let hl = c.hl();
        c.write16(b, addr, hl);
        Ok(())
    });
    t.set(0x2A, |c, b| {
        let addr = c.fetch16(b);
        let v = c.read16(b, addr);
        c.set_hl(v);
        Ok(())
    });
    t.set(0x32, |c, b| {
        let addr = c.fetch16(b);
        let v = c.a;
        c.write8(b, addr, v);
        Ok(())
    });
    t.set(0x3A, |c, b| {
        let addr = c.fetch16(b);
        c.a = c.read8(b, addr);
        Ok(())
    });

    t.set(0x27, |c, _| {
        c.daa();
        Ok(())
    });
    t.set(0x2F, |c, _| {
        c.a = !c.a;
        c.set_flag(Flags::HALF_CARRY, true);
        c.set_flag(Flags::SUBTRACT, true);
        let a = c.a;
        c.set_flag(Flags::XF, a & 0x08 != 0);
        c.set_flag(Flags::YF, a & 0x20 != 0);
        Ok(())
    });
    t.set(0x37, |c, _| {
        c.set_flag(Flags::CARRY, true);
        c.set_flag(Flags::HALF_CARRY, false);
        c.set_flag(Flags::SUBTRACT, false);
        let a = c.a;
        c.set_flag(Flags::XF, a & 0x08 != 0);
        c.set_flag(Flags::YF, a & 0x20 != 0);
        Ok(())
    });
    t.set(0x3F, |c, _| {
        let carry = c.flag(Flags::CARRY);
        c.set_flag(Flags::HALF_CARRY, carry);
        c.set_flag(Flags::CARRY, !carry);
        c.set_flag(Flags::SUBTRACT, false);
        let a = c.a;
        c.set_flag(Flags::XF, a & 0x08 != 0);
        c.set_flag(Flags::YF, a & 0x20 != 0);
        Ok(())
    });

    // Control flow.
    for cc in 0..8u8 {
        t.set(0xC2 | cc << 3, move |c, b| {
            let taken = c.cond(cc);
            c.jp_if(b, taken);
            Ok(())
        });
        t.set(0xC4 | cc << 3, move |c, b| {
            let taken = c.cond(cc);
            c.call_if(b, taken);
            Ok(())
        });
        t.set(0xC0 | cc << 3, move |c, b| {
            let taken = c.cond(cc);
            c.ret_if(b, taken);
            Ok(())
        });
        t.set(0xC7 | cc << 3, move |c, b| {
            let ret = c.pc;
            c.push16(b, ret);
            c.pc = u16::from(cc) * 8;
            Ok(())
        });
    }
    t.set(0xC3, |c, b| {
        c.jp_if(b, true);
        Ok(())
    });
    t.set(0xCD, |c, b| {
        c.call_if(b, true);
        Ok(())
    });
    t.set(0xC9, |c, b| {
        c.ret_if(b, true);
        Ok(())
    });
    t.set(0xE9, |c, _| {
        c.pc = c.hl();
        Ok(())
    });

    // Stack.
    for rp in 0..3u8 {
        t.set(0xC5 | rp << 4, move |c, b| {
            let v = c.pair(rp);
            c.push16(b, v);
            Ok(())
        });
        t.set(0xC1 | rp << 4, move |c, b| {
            let v = c.pop16(b);
            c.set_pair(rp, v);
            Ok(())
        });
    }
    t.set(0xF5, |c, b| {
        let v = c.af();
        c.push16(b, v);
        Ok(())
    });
    t.set(0xF1, |c, b| {
        let v = c.pop16(b);
        c.set_af(v);
        Ok(())
    });
    t.set(0xE3, |c, b| {
        let sp = c.sp;
        let mem = c.read16(b, sp);
        let hl = c.hl();
        c.write16(b, sp, hl);
        c.set_hl(mem);
        Ok(())
    });
    t.set(0xF9, |c, _| {
        c.sp = c.hl();
        Ok(())
    });
    t.set(0xEB, |c, _| {
        let de = c.de();
        let hl = c.hl();
        c.set_de(hl);
        c.set_hl(de);
        Ok(())
    });

    // Port I/O: A on the upper half of the address bus.
    t.set(0xDB, |c, b| {
        let port = c.fetch8(b);
        c.a = b.io_read8(common::make_word(c.a, port));
        Ok(())
    });
    t.set(0xD3, |c, b| {
        let port = c.fetch8(b);
        b.io_write8(common::make_word(c.a, port), c.a);
        Ok(())
    });

    t.set(0xF3, |c, _| {
        c.set_iff(false);
        Ok(())
    });
    t.set(0xFB, |c, _| {
        c.set_iff(true);
        Ok(())
    });

    // Prefixes.
    t.set(0xCB, prefix::bits_prefix);
    t.set(0xED, prefix::extd_prefix);
    t.set(0xDD, |c, b| prefix::index_prefix(c, b, IndexReg::Ix));
    t.set(0xFD, |c, b| prefix::index_prefix(c, b, IndexReg::Iy));

    t
}
