//! 8086 instruction set: dispatch table and per-opcode semantics.
//!
//! The encoding is block-structured: the ALU two-operand block at
//! 0x00-0x3F, ModRM group opcodes (0x80-0x83, 0xD0-0xD3, 0xF6/0xF7,
//! 0xFE/0xFF) that select the operation from the ModRM reg field, and
//! prefix bytes (segment overrides, LOCK, REP) that re-dispatch the
//! following opcode. Undocumented encodings alias their documented
//! neighbours the way the silicon does (0x60-0x6F mirror the Jcc block,
//! 0xC0/0xC1/0xC8/0xC9 mirror the RET encodings, 0xD6 is SALC).

use super::{Cpu8086, Flags, Rep, Segment, VEC_BREAKPOINT, VEC_DIVIDE, VEC_OVERFLOW};
use crate::alu;
use crate::bus::Bus;
use crate::cpu::{ExecResult, OpTable};
use once_cell::sync::Lazy;

// ALU operation selectors, both for the 0x00-0x3F block (bits 3-5 of the
// opcode) and for the immediate group's reg field.
const OP_ADD: u8 = 0;
const OP_OR: u8 = 1;
const OP_ADC: u8 = 2;
const OP_SBB: u8 = 3;
const OP_AND: u8 = 4;
const OP_SUB: u8 = 5;
const OP_XOR: u8 = 6;
const OP_CMP: u8 = 7;

impl Cpu8086 {
    fn adjust_szp8(&mut self, v: u8) {
        self.set_flag(Flags::SIGN, v & 0x80 != 0);
        self.set_flag(Flags::ZERO, v == 0);
        self.set_flag(Flags::PARITY, common::parity_even(v));
    }

    fn adjust_szp16(&mut self, v: u16) {
        self.set_flag(Flags::SIGN, v & 0x8000 != 0);
        self.set_flag(Flags::ZERO, v == 0);
        // Parity only ever looks at the low byte.
        self.set_flag(Flags::PARITY, common::parity_even(common::lo(v)));
    }

    fn apply_sum8(&mut self, s: alu::Sum8) -> u8 {
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::AUX_CARRY, s.half);
        self.set_flag(Flags::OVERFLOW, s.overflow);
        self.adjust_szp8(s.result);
        s.result
    }

    fn apply_sum16(&mut self, s: alu::Sum16) -> u16 {
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::AUX_CARRY, s.half);
        self.set_flag(Flags::OVERFLOW, s.overflow);
        self.adjust_szp16(s.result);
        s.result
    }

    fn logic_flags8(&mut self, v: u8) {
        self.set_flag(Flags::CARRY, false);
        self.set_flag(Flags::OVERFLOW, false);
        self.set_flag(Flags::AUX_CARRY, false);
        self.adjust_szp8(v);
    }

    fn logic_flags16(&mut self, v: u16) {
        self.set_flag(Flags::CARRY, false);
        self.set_flag(Flags::OVERFLOW, false);
        self.set_flag(Flags::AUX_CARRY, false);
        self.adjust_szp16(v);
    }

    /// Two-operand ALU on bytes. CMP returns the untouched left operand
    /// so callers can write it back unconditionally.
    fn alu8(&mut self, op: u8, a: u8, b: u8) -> u8 {
        let carry = self.flag(Flags::CARRY);
        match op {
            OP_ADD => self.apply_sum8(alu::add8(a, b, false)),
            OP_ADC => self.apply_sum8(alu::add8(a, b, carry)),
            OP_SUB => self.apply_sum8(alu::sub8(a, b, false)),
            OP_SBB => self.apply_sum8(alu::sub8(a, b, carry)),
            OP_AND => {
                let r = a & b;
                self.logic_flags8(r);
                r
            }
            OP_OR => {
                let r = a | b;
                self.logic_flags8(r);
                r
            }
            OP_XOR => {
                let r = a ^ b;
                self.logic_flags8(r);
                r
            }
            _ => {
                self.apply_sum8(alu::sub8(a, b, false));
                a
            }
        }
    }

    fn alu16(&mut self, op: u8, a: u16, b: u16) -> u16 {
        let carry = self.flag(Flags::CARRY);
        match op {
            OP_ADD => self.apply_sum16(alu::add16(a, b, false)),
            OP_ADC => self.apply_sum16(alu::add16(a, b, carry)),
            OP_SUB => self.apply_sum16(alu::sub16(a, b, false)),
            OP_SBB => self.apply_sum16(alu::sub16(a, b, carry)),
            OP_AND => {
                let r = a & b;
                self.logic_flags16(r);
                r
            }
            OP_OR => {
                let r = a | b;
                self.logic_flags16(r);
                r
            }
            OP_XOR => {
                let r = a ^ b;
                self.logic_flags16(r);
                r
            }
            _ => {
                self.apply_sum16(alu::sub16(a, b, false));
                a
            }
        }
    }

    // INC/DEC leave the carry alone.

    fn inc8(&mut self, v: u8) -> u8 {
        let carry = self.flag(Flags::CARRY);
        let r = self.apply_sum8(alu::add8(v, 1, false));
        self.set_flag(Flags::CARRY, carry);
        r
    }

    fn dec8(&mut self, v: u8) -> u8 {
        let carry = self.flag(Flags::CARRY);
        let r = self.apply_sum8(alu::sub8(v, 1, false));
        self.set_flag(Flags::CARRY, carry);
        r
    }

    fn inc16(&mut self, v: u16) -> u16 {
        let carry = self.flag(Flags::CARRY);
        let r = self.apply_sum16(alu::add16(v, 1, false));
        self.set_flag(Flags::CARRY, carry);
        r
    }

    fn dec16(&mut self, v: u16) -> u16 {
        let carry = self.flag(Flags::CARRY);
        let r = self.apply_sum16(alu::sub16(v, 1, false));
        self.set_flag(Flags::CARRY, carry);
        r
    }

    /// Jcc condition by encoding field (low nibble of the opcode).
    fn cond(&self, idx: u8) -> bool {
        let cf = self.flag(Flags::CARRY);
        let zf = self.flag(Flags::ZERO);
        let sf = self.flag(Flags::SIGN);
        let of = self.flag(Flags::OVERFLOW);
        let pf = self.flag(Flags::PARITY);
        let positive = match idx >> 1 {
            0 => of,
            1 => cf,
            2 => zf,
            3 => cf || zf,
            4 => sf,
            5 => pf,
            6 => sf != of,
            _ => zf || (sf != of),
        };
        positive == (idx & 1 == 0)
    }

    /// Rotate/shift group. The OF convention follows the single-bit
    /// definitions; multi-bit counts leave it at the last step's value.
    fn shift8(&mut self, op: u8, v: u8, count: u8) -> u8 {
        let mut v = v;
        for _ in 0..count {
            let carry = self.flag(Flags::CARRY);
            let (r, c) = match op {
                0 => (v.rotate_left(1), v & 0x80 != 0),
                1 => (v.rotate_right(1), v & 0x01 != 0),
                2 => ((v << 1) | u8::from(carry), v & 0x80 != 0),
                3 => ((v >> 1) | (u8::from(carry) << 7), v & 0x01 != 0),
                5 => (v >> 1, v & 0x01 != 0),
                7 => (((v as i8) >> 1) as u8, v & 0x01 != 0),
                _ => (v << 1, v & 0x80 != 0),
            };
            self.set_flag(Flags::CARRY, c);
            v = r;
        }
        if count != 0 {
            let of = match op {
                1 | 3 => (v ^ (v << 1)) & 0x80 != 0,
                7 => false,
                _ => (v & 0x80 != 0) != self.flag(Flags::CARRY),
            };
            self.set_flag(Flags::OVERFLOW, of);
            if op >= 4 {
                self.adjust_szp8(v);
            }
        }
        v
    }

    fn shift16(&mut self, op: u8, v: u16, count: u8) -> u16 {
        let mut v = v;
        for _ in 0..count {
            let carry = self.flag(Flags::CARRY);
            let (r, c) = match op {
                0 => (v.rotate_left(1), v & 0x8000 != 0),
                1 => (v.rotate_right(1), v & 0x0001 != 0),
                2 => ((v << 1) | u16::from(carry), v & 0x8000 != 0),
                3 => ((v >> 1) | (u16::from(carry) << 15), v & 0x0001 != 0),
                5 => (v >> 1, v & 0x0001 != 0),
                7 => (((v as i16) >> 1) as u16, v & 0x0001 != 0),
                _ => (v << 1, v & 0x8000 != 0),
            };
            self.set_flag(Flags::CARRY, c);
            v = r;
        }
        if count != 0 {
            let of = match op {
                1 | 3 => (v ^ (v << 1)) & 0x8000 != 0,
                7 => false,
                _ => (v & 0x8000 != 0) != self.flag(Flags::CARRY),
            };
            self.set_flag(Flags::OVERFLOW, of);
            if op >= 4 {
                self.adjust_szp16(v);
            }
        }
        v
    }

    // String machinery. SI walks the data segment (overridable), DI
    // always walks ES.

    fn advance(&mut self, offset: u16, width: u16) -> u16 {
        if self.flag(Flags::DIRECTION) {
            offset.wrapping_sub(width)
        } else {
            offset.wrapping_add(width)
        }
    }

    fn src_addr(&mut self) -> u32 {
        let seg = self.data_seg(Segment::Ds);
        Self::physical(seg, self.si)
    }

    fn dst_addr(&self) -> u32 {
        Self::physical(self.es, self.di)
    }

    /// One string primitive. Under a repeat prefix a step runs a single
    /// iteration, decrements CX and rewinds IP onto the prefix so the
    /// next step re-executes it; interrupts land between iterations with
    /// IP pointing at the restartable prefix.
    fn run_string(
        &mut self,
        bus: &mut dyn Bus,
        uses_zero: bool,
        one: impl FnOnce(&mut Self, &mut dyn Bus),
    ) {
        let Some(kind) = self.rep else {
            one(self, bus);
            return;
        };
        if self.cx == 0 {
            return;
        }
        one(self, bus);
        self.cx = self.cx.wrapping_sub(1);
        if self.cx == 0 {
            return;
        }
        if uses_zero {
            let zero = self.flag(Flags::ZERO);
            let done = match kind {
                Rep::Equal => !zero,
                Rep::NotEqual => zero,
            };
            if done {
                return;
            }
        }
        // Restart the whole prefixed instruction on the next step.
        self.ip = self.current_op.wrapping_sub(u32::from(self.cs) << 4) as u16;
    }

    // Multiply and divide. A quotient that does not fit raises the
    // divide vector instead of writing results.

    fn mul8(&mut self, v: u8) {
        let r = u16::from(self.al()) * u16::from(v);
        self.ax = r;
        let upper = common::hi(r) != 0;
        self.set_flag(Flags::CARRY, upper);
        self.set_flag(Flags::OVERFLOW, upper);
        self.tick(Self::info().misc("mul8").base);
    }

    fn imul8(&mut self, v: u8) {
        let r = i16::from(self.al() as i8) * i16::from(v as i8);
        self.ax = r as u16;
        let wide = r != i16::from(r as i8);
        self.set_flag(Flags::CARRY, wide);
        self.set_flag(Flags::OVERFLOW, wide);
        self.tick(Self::info().misc("imul8").base);
    }

    fn mul16(&mut self, v: u16) {
        let r = u32::from(self.ax) * u32::from(v);
        self.ax = r as u16;
        self.dx = (r >> 16) as u16;
        let upper = self.dx != 0;
        self.set_flag(Flags::CARRY, upper);
        self.set_flag(Flags::OVERFLOW, upper);
        self.tick(Self::info().misc("mul16").base);
    }

    fn imul16(&mut self, v: u16) {
        let r = i32::from(self.ax as i16) * i32::from(v as i16);
        self.ax = r as u16;
        self.dx = (r >> 16) as u16;
        let wide = r != i32::from(r as i16);
        self.set_flag(Flags::CARRY, wide);
        self.set_flag(Flags::OVERFLOW, wide);
        self.tick(Self::info().misc("imul16").base);
    }

    fn div8(&mut self, bus: &mut dyn Bus, v: u8) {
        self.tick(Self::info().misc("div8").base);
        if v == 0 {
            self.interrupt(bus, VEC_DIVIDE);
            return;
        }
        let q = self.ax / u16::from(v);
        if q > 0xFF {
            self.interrupt(bus, VEC_DIVIDE);
            return;
        }
        let r = self.ax % u16::from(v);
        self.set_al(q as u8);
        self.set_ah(r as u8);
    }

    fn idiv8(&mut self, bus: &mut dyn Bus, v: u8) {
        self.tick(Self::info().misc("idiv8").base);
        if v == 0 {
            self.interrupt(bus, VEC_DIVIDE);
            return;
        }
        let dividend = i16::from_le_bytes(self.ax.to_le_bytes()) as i32;
        let q = dividend / i32::from(v as i8);
        if !(-128..=127).contains(&q) {
            self.interrupt(bus, VEC_DIVIDE);
            return;
        }
        let r = dividend % i32::from(v as i8);
        self.set_al(q as u8);
        self.set_ah(r as u8);
    }

    fn div16(&mut self, bus: &mut dyn Bus, v: u16) {
        self.tick(Self::info().misc("div16").base);
        if v == 0 {
            self.interrupt(bus, VEC_DIVIDE);
            return;
        }
        let dividend = (u32::from(self.dx) << 16) | u32::from(self.ax);
        let q = dividend / u32::from(v);
        if q > 0xFFFF {
            self.interrupt(bus, VEC_DIVIDE);
            return;
        }
        self.ax = q as u16;
        self.dx = (dividend % u32::from(v)) as u16;
    }

    fn idiv16(&mut self, bus: &mut dyn Bus, v: u16) {
        self.tick(Self::info().misc("idiv16").base);
        if v == 0 {
            self.interrupt(bus, VEC_DIVIDE);
            return;
        }
        let dividend = (i64::from(self.dx as i16) << 16) | i64::from(self.ax);
        let q = dividend / i64::from(v as i16);
        if !(-32768..=32767).contains(&q) {
            self.interrupt(bus, VEC_DIVIDE);
            return;
        }
        self.ax = q as u16;
        self.dx = (dividend % i64::from(v as i16)) as u16;
    }

    // The decimal adjust quartet.

    fn daa(&mut self) {
        let original = self.al();
        if original & 0x0F > 9 || self.flag(Flags::AUX_CARRY) {
            self.set_al(self.al().wrapping_add(0x06));
            self.set_flag(Flags::AUX_CARRY, true);
        }
        if original > 0x99 || self.flag(Flags::CARRY) {
            self.set_al(self.al().wrapping_add(0x60));
            self.set_flag(Flags::CARRY, true);
        }
        let al = self.al();
        self.adjust_szp8(al);
    }

    fn das(&mut self) {
        let original = self.al();
        if original & 0x0F > 9 || self.flag(Flags::AUX_CARRY) {
            self.set_al(self.al().wrapping_sub(0x06));
            self.set_flag(Flags::AUX_CARRY, true);
        }
        if original > 0x99 || self.flag(Flags::CARRY) {
            self.set_al(self.al().wrapping_sub(0x60));
            self.set_flag(Flags::CARRY, true);
        }
        let al = self.al();
        self.adjust_szp8(al);
    }

    fn aaa(&mut self) {
        if self.al() & 0x0F > 9 || self.flag(Flags::AUX_CARRY) {
            self.set_al(self.al().wrapping_add(6));
            self.set_ah(self.ah().wrapping_add(1));
            self.set_flag(Flags::AUX_CARRY, true);
            self.set_flag(Flags::CARRY, true);
        } else {
            self.set_flag(Flags::AUX_CARRY, false);
            self.set_flag(Flags::CARRY, false);
        }
        self.set_al(self.al() & 0x0F);
    }

    fn aas(&mut self) {
        if self.al() & 0x0F > 9 || self.flag(Flags::AUX_CARRY) {
            self.set_al(self.al().wrapping_sub(6));
            self.set_ah(self.ah().wrapping_sub(1));
            self.set_flag(Flags::AUX_CARRY, true);
            self.set_flag(Flags::CARRY, true);
        } else {
            self.set_flag(Flags::AUX_CARRY, false);
            self.set_flag(Flags::CARRY, false);
        }
        self.set_al(self.al() & 0x0F);
    }
}

/// Re-dispatch after a prefix byte. The prefix state set by the caller
/// survives because the top of `exec` is not re-entered.
fn run_prefixed(c: &mut Cpu8086, bus: &mut dyn Bus) -> ExecResult {
    c.tick(Cpu8086::info().misc("prefix").base);
    let op2 = c.fetch8(bus);
    c.opcode = op2;
    TABLE.exec(c, bus, op2)
}

fn unknown_reg_field(c: &mut Cpu8086) -> ExecResult {
    Err(crate::cpu::Fault::UnknownOpcode {
        addr: c.current_op,
        opcode: c.opcode,
    })
}

#[allow(clippy::too_many_lines)]
fn build() -> OpTable<Cpu8086> {
    fn op_unknown(c: &mut Cpu8086, _bus: &mut dyn Bus) -> ExecResult {
        Err(crate::cpu::Fault::UnknownOpcode {
            addr: c.current_op,
            opcode: c.opcode,
        })
    }

    let mut t = OpTable::new(op_unknown);

    // ALU block: six encodings per operation.
    for op in 0..8u8 {
        let base = op << 3;
        t.set(base, move |c, b| {
            let m = c.fetch_modrm(b);
            let lhs = m.read8(c, b);
            let rhs = c.reg8(m.reg);
            let r = c.alu8(op, lhs, rhs);
            if op != OP_CMP {
                m.write8(c, b, r);
            }
            Ok(())
        });
        t.set(base + 1, move |c, b| {
            let m = c.fetch_modrm(b);
            let lhs = m.read16(c, b);
            let rhs = c.reg16(m.reg);
            let r = c.alu16(op, lhs, rhs);
            if op != OP_CMP {
                m.write16(c, b, r);
            }
            Ok(())
        });
        t.set(base + 2, move |c, b| {
            let m = c.fetch_modrm(b);
            let rhs = m.read8(c, b);
            let lhs = c.reg8(m.reg);
            let r = c.alu8(op, lhs, rhs);
            if op != OP_CMP {
                c.set_reg8(m.reg, r);
            }
            Ok(())
        });
        t.set(base + 3, move |c, b| {
            let m = c.fetch_modrm(b);
            let rhs = m.read16(c, b);
            let lhs = c.reg16(m.reg);
            let r = c.alu16(op, lhs, rhs);
            if op != OP_CMP {
                c.set_reg16(m.reg, r);
            }
            Ok(())
        });
        t.set(base + 4, move |c, b| {
            let imm = c.fetch8(b);
            let lhs = c.al();
            let r = c.alu8(op, lhs, imm);
            if op != OP_CMP {
                c.set_al(r);
            }
            Ok(())
        });
        t.set(base + 5, move |c, b| {
            let imm = c.fetch16(b);
            let lhs = c.ax;
            let r = c.alu16(op, lhs, imm);
            if op != OP_CMP {
                c.ax = r;
            }
            Ok(())
        });
    }

    // Segment register push/pop. 0x0F really is POP CS on this part.
    for seg in 0..4u8 {
        t.set(0x06 | (seg << 3), move |c, b| {
            let v = c.sreg(seg);
            c.push16(b, v);
            Ok(())
        });
        t.set(0x07 | (seg << 3), move |c, b| {
            let v = c.pop16(b);
            c.set_sreg(seg, v);
            Ok(())
        });
    }

    // Segment override prefixes.
    for (opcode, seg) in [
        (0x26u8, Segment::Es),
        (0x2E, Segment::Cs),
        (0x36, Segment::Ss),
        (0x3E, Segment::Ds),
    ] {
        t.set(opcode, move |c, b| {
            c.seg_override = Some(seg);
            run_prefixed(c, b)
        });
    }

    t.set(0x27, |c, _b| {
        c.daa();
        Ok(())
    });
    t.set(0x2F, |c, _b| {
        c.das();
        Ok(())
    });
    t.set(0x37, |c, _b| {
        c.aaa();
        Ok(())
    });
    t.set(0x3F, |c, _b| {
        c.aas();
        Ok(())
    });

    for r in 0..8u8 {
        t.set(0x40 | r, move |c, _b| {
            let v = c.reg16(r);
            let v = c.inc16(v);
            c.set_reg16(r, v);
            Ok(())
        });
        t.set(0x48 | r, move |c, _b| {
            let v = c.reg16(r);
            let v = c.dec16(v);
            c.set_reg16(r, v);
            Ok(())
        });
        t.set(0x50 | r, move |c, b| {
            // PUSH SP stores the already-decremented value.
            let v = if r == 4 {
                c.sp.wrapping_sub(2)
            } else {
                c.reg16(r)
            };
            c.push16(b, v);
            Ok(())
        });
        t.set(0x58 | r, move |c, b| {
            let v = c.pop16(b);
            c.set_reg16(r, v);
            Ok(())
        });
    }

    // Jcc; 0x60-0x6F are undocumented mirrors of the block.
    for cc in 0..16u8 {
        let jcc = move |c: &mut Cpu8086, b: &mut dyn Bus| {
            let d = c.fetch8(b);
            if c.cond(cc) {
                c.tick_taken();
                c.ip = c.ip.wrapping_add(common::widen(d));
            }
            Ok(())
        };
        t.set(0x70 | cc, jcc);
        t.set(0x60 | cc, jcc);
    }

    // Immediate group: the reg field picks the ALU operation.
    for opcode in [0x80u8, 0x82] {
        t.set(opcode, |c, b| {
            let m = c.fetch_modrm(b);
            let lhs = m.read8(c, b);
            let imm = c.fetch8(b);
            let r = c.alu8(m.reg, lhs, imm);
            if m.reg != OP_CMP {
                m.write8(c, b, r);
            }
            Ok(())
        });
    }
    t.set(0x81, |c, b| {
        let m = c.fetch_modrm(b);
        let lhs = m.read16(c, b);
        let imm = c.fetch16(b);
        let r = c.alu16(m.reg, lhs, imm);
        if m.reg != OP_CMP {
            m.write16(c, b, r);
        }
        Ok(())
    });
    t.set(0x83, |c, b| {
        let m = c.fetch_modrm(b);
        let lhs = m.read16(c, b);
        let imm = common::widen(c.fetch8(b));
        let r = c.alu16(m.reg, lhs, imm);
        if m.reg != OP_CMP {
            m.write16(c, b, r);
        }
        Ok(())
    });

    t.set(0x84, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read8(c, b) & c.reg8(m.reg);
        c.logic_flags8(v);
        Ok(())
    });
    t.set(0x85, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read16(c, b) & c.reg16(m.reg);
        c.logic_flags16(v);
        Ok(())
    });
    t.set(0x86, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read8(c, b);
        let r = c.reg8(m.reg);
        m.write8(c, b, r);
        c.set_reg8(m.reg, v);
        Ok(())
    });
    t.set(0x87, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read16(c, b);
        let r = c.reg16(m.reg);
        m.write16(c, b, r);
        c.set_reg16(m.reg, v);
        Ok(())
    });
    t.set(0x88, |c, b| {
        let m = c.fetch_modrm(b);
        let v = c.reg8(m.reg);
        m.write8(c, b, v);
        Ok(())
    });
    t.set(0x89, |c, b| {
        let m = c.fetch_modrm(b);
        let v = c.reg16(m.reg);
        m.write16(c, b, v);
        Ok(())
    });
    t.set(0x8A, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read8(c, b);
        c.set_reg8(m.reg, v);
        Ok(())
    });
    t.set(0x8B, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read16(c, b);
        c.set_reg16(m.reg, v);
        Ok(())
    });
    t.set(0x8C, |c, b| {
        let m = c.fetch_modrm(b);
        let v = c.sreg(m.reg);
        m.write16(c, b, v);
        Ok(())
    });
    t.set(0x8D, |c, b| {
        let m = c.fetch_modrm(b);
        c.set_reg16(m.reg, m.offset());
        Ok(())
    });
    t.set(0x8E, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read16(c, b);
        c.set_sreg(m.reg, v);
        Ok(())
    });
    t.set(0x8F, |c, b| {
        let m = c.fetch_modrm(b);
        let v = c.pop16(b);
        m.write16(c, b, v);
        Ok(())
    });

    // XCHG AX,r16; encoding 0x90 is the canonical NOP.
    for r in 0..8u8 {
        t.set(0x90 | r, move |c, _b| {
            let v = c.reg16(r);
            c.set_reg16(r, c.ax);
            c.ax = v;
            Ok(())
        });
    }

    t.set(0x98, |c, _b| {
        c.ax = common::widen(c.al());
        Ok(())
    });
    t.set(0x99, |c, _b| {
        c.dx = if c.ax & 0x8000 != 0 { 0xFFFF } else { 0 };
        Ok(())
    });
    t.set(0x9A, |c, b| {
        let offset = c.fetch16(b);
        let seg = c.fetch16(b);
        let cs = c.cs;
        let ip = c.ip;
        c.push16(b, cs);
        c.push16(b, ip);
        c.cs = seg;
        c.ip = offset;
        Ok(())
    });
    t.set(0x9B, |_c, _b| Ok(())); // WAIT: no coprocessor attached
    t.set(0x9C, |c, b| {
        let f = c.flags_word();
        c.push16(b, f);
        Ok(())
    });
    t.set(0x9D, |c, b| {
        let f = c.pop16(b);
        c.set_flags_word(f);
        Ok(())
    });
    t.set(0x9E, |c, _b| {
        let word = (c.flags_word() & 0xFF00) | u16::from(c.ah());
        c.set_flags_word(word);
        Ok(())
    });
    t.set(0x9F, |c, _b| {
        let v = common::lo(c.flags_word());
        c.set_ah(v);
        Ok(())
    });

    // Accumulator moves with a direct offset.
    t.set(0xA0, |c, b| {
        let offset = c.fetch16(b);
        let seg = c.data_seg(Segment::Ds);
        let addr = Cpu8086::physical(seg, offset);
        let v = c.read8(b, addr);
        c.set_al(v);
        Ok(())
    });
    t.set(0xA1, |c, b| {
        let offset = c.fetch16(b);
        let seg = c.data_seg(Segment::Ds);
        let addr = Cpu8086::physical(seg, offset);
        c.ax = c.read16(b, addr);
        Ok(())
    });
    t.set(0xA2, |c, b| {
        let offset = c.fetch16(b);
        let seg = c.data_seg(Segment::Ds);
        let addr = Cpu8086::physical(seg, offset);
        let v = c.al();
        c.write8(b, addr, v);
        Ok(())
    });
    t.set(0xA3, |c, b| {
        let offset = c.fetch16(b);
        let seg = c.data_seg(Segment::Ds);
        let addr = Cpu8086::physical(seg, offset);
        let v = c.ax;
        c.write16(b, addr, v);
        Ok(())
    });

    // String primitives.
    t.set(0xA4, |c, b| {
        c.run_string(b, false, |c, b| {
            let src = c.src_addr();
            let v = c.read8(b, src);
            let dst = c.dst_addr();
            c.write8(b, dst, v);
            c.si = c.advance(c.si, 1);
            c.di = c.advance(c.di, 1);
        });
        Ok(())
    });
    t.set(0xA5, |c, b| {
        c.run_string(b, false, |c, b| {
            let src = c.src_addr();
            let v = c.read16(b, src);
            let dst = c.dst_addr();
            c.write16(b, dst, v);
            c.si = c.advance(c.si, 2);
            c.di = c.advance(c.di, 2);
        });
        Ok(())
    });
    t.set(0xA6, |c, b| {
        c.run_string(b, true, |c, b| {
            let src = c.src_addr();
            let lhs = c.read8(b, src);
            let dst = c.dst_addr();
            let rhs = c.read8(b, dst);
            c.apply_sum8(alu::sub8(lhs, rhs, false));
            c.si = c.advance(c.si, 1);
            c.di = c.advance(c.di, 1);
        });
        Ok(())
    });
    t.set(0xA7, |c, b| {
        c.run_string(b, true, |c, b| {
            let src = c.src_addr();
            let lhs = c.read16(b, src);
            let dst = c.dst_addr();
            let rhs = c.read16(b, dst);
            c.apply_sum16(alu::sub16(lhs, rhs, false));
            c.si = c.advance(c.si, 2);
            c.di = c.advance(c.di, 2);
        });
        Ok(())
    });
    t.set(0xA8, |c, b| {
        let imm = c.fetch8(b);
        let v = c.al() & imm;
        c.logic_flags8(v);
        Ok(())
    });
    t.set(0xA9, |c, b| {
        let imm = c.fetch16(b);
        let v = c.ax & imm;
        c.logic_flags16(v);
        Ok(())
    });
    t.set(0xAA, |c, b| {
        c.run_string(b, false, |c, b| {
            let dst = c.dst_addr();
            let v = c.al();
            c.write8(b, dst, v);
            c.di = c.advance(c.di, 1);
        });
        Ok(())
    });
    t.set(0xAB, |c, b| {
        c.run_string(b, false, |c, b| {
            let dst = c.dst_addr();
            let v = c.ax;
            c.write16(b, dst, v);
            c.di = c.advance(c.di, 2);
        });
        Ok(())
    });
    t.set(0xAC, |c, b| {
        c.run_string(b, false, |c, b| {
            let src = c.src_addr();
            let v = c.read8(b, src);
            c.set_al(v);
            c.si = c.advance(c.si, 1);
        });
        Ok(())
    });
    t.set(0xAD, |c, b| {
        c.run_string(b, false, |c, b| {
            let src = c.src_addr();
            c.ax = c.read16(b, src);
            c.si = c.advance(c.si, 2);
        });
        Ok(())
    });
    t.set(0xAE, |c, b| {
        c.run_string(b, true, |c, b| {
            let dst = c.dst_addr();
            let rhs = c.read8(b, dst);
            let lhs = c.al();
            c.apply_sum8(alu::sub8(lhs, rhs, false));
            c.di = c.advance(c.di, 1);
        });
        Ok(())
    });
    t.set(0xAF, |c, b| {
        c.run_string(b, true, |c, b| {
            let dst = c.dst_addr();
            let rhs = c.read16(b, dst);
            let lhs = c.ax;
            c.apply_sum16(alu::sub16(lhs, rhs, false));
            c.di = c.advance(c.di, 2);
        });
        Ok(())
    });

    for r in 0..8u8 {
        t.set(0xB0 | r, move |c, b| {
            let v = c.fetch8(b);
            c.set_reg8(r, v);
            Ok(())
        });
        t.set(0xB8 | r, move |c, b| {
            let v = c.fetch16(b);
            c.set_reg16(r, v);
            Ok(())
        });
    }

    // Near and far returns; 0xC0/0xC1/0xC8/0xC9 alias their neighbours.
    for opcode in [0xC0u8, 0xC2] {
        t.set(opcode, |c, b| {
            let n = c.fetch16(b);
            c.ip = c.pop16(b);
            c.sp = c.sp.wrapping_add(n);
            Ok(())
        });
    }
    for opcode in [0xC1u8, 0xC3] {
        t.set(opcode, |c, b| {
            c.ip = c.pop16(b);
            Ok(())
        });
    }
    for opcode in [0xC8u8, 0xCA] {
        t.set(opcode, |c, b| {
            let n = c.fetch16(b);
            c.ip = c.pop16(b);
            c.cs = c.pop16(b);
            c.sp = c.sp.wrapping_add(n);
            Ok(())
        });
    }
    for opcode in [0xC9u8, 0xCB] {
        t.set(opcode, |c, b| {
            c.ip = c.pop16(b);
            c.cs = c.pop16(b);
            Ok(())
        });
    }

    t.set(0xC4, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read16(c, b);
        c.es = c.read16(b, m.address().wrapping_add(2));
        c.set_reg16(m.reg, v);
        Ok(())
    });
    t.set(0xC5, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read16(c, b);
        c.ds = c.read16(b, m.address().wrapping_add(2));
        c.set_reg16(m.reg, v);
        Ok(())
    });
    t.set(0xC6, |c, b| {
        let m = c.fetch_modrm(b);
        let v = c.fetch8(b);
        m.write8(c, b, v);
        Ok(())
    });
    t.set(0xC7, |c, b| {
        let m = c.fetch_modrm(b);
        let v = c.fetch16(b);
        m.write16(c, b, v);
        Ok(())
    });

    t.set(0xCC, |c, b| {
        c.interrupt(b, VEC_BREAKPOINT);
        Ok(())
    });
    t.set(0xCD, |c, b| {
        let vector = c.fetch8(b);
        c.interrupt(b, vector);
        Ok(())
    });
    t.set(0xCE, |c, b| {
        if c.flag(Flags::OVERFLOW) {
            c.interrupt(b, VEC_OVERFLOW);
        }
        Ok(())
    });
    t.set(0xCF, |c, b| {
        c.ip = c.pop16(b);
        c.cs = c.pop16(b);
        let f = c.pop16(b);
        c.set_flags_word(f);
        Ok(())
    });

    // Shift/rotate group: by one, or by CL with a per-bit surcharge.
    t.set(0xD0, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read8(c, b);
        let r = c.shift8(m.reg, v, 1);
        m.write8(c, b, r);
        Ok(())
    });
    t.set(0xD1, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read16(c, b);
        let r = c.shift16(m.reg, v, 1);
        m.write16(c, b, r);
        Ok(())
    });
    t.set(0xD2, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read8(c, b);
        let count = c.cl();
        let r = c.shift8(m.reg, v, count);
        m.write8(c, b, r);
        for _ in 0..count {
            c.tick_taken();
        }
        Ok(())
    });
    t.set(0xD3, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read16(c, b);
        let count = c.cl();
        let r = c.shift16(m.reg, v, count);
        m.write16(c, b, r);
        for _ in 0..count {
            c.tick_taken();
        }
        Ok(())
    });

    t.set(0xD4, |c, b| {
        let divisor = c.fetch8(b);
        if divisor == 0 {
            c.interrupt(b, VEC_DIVIDE);
            return Ok(());
        }
        let al = c.al();
        c.set_ah(al / divisor);
        c.set_al(al % divisor);
        let al = c.al();
        c.adjust_szp8(al);
        Ok(())
    });
    t.set(0xD5, |c, b| {
        let base = c.fetch8(b);
        let v = c.al().wrapping_add(c.ah().wrapping_mul(base));
        c.set_al(v);
        c.set_ah(0);
        c.adjust_szp8(v);
        Ok(())
    });
    // SALC, undocumented.
    t.set(0xD6, |c, _b| {
        let v = if c.flag(Flags::CARRY) { 0xFF } else { 0x00 };
        c.set_al(v);
        Ok(())
    });
    t.set(0xD7, |c, b| {
        let seg = c.data_seg(Segment::Ds);
        let addr = Cpu8086::physical(seg, c.bx.wrapping_add(u16::from(c.al())));
        let v = c.read8(b, addr);
        c.set_al(v);
        Ok(())
    });

    // Coprocessor escapes: consume the operand, do nothing.
    for opcode in 0xD8..=0xDFu8 {
        t.set(opcode, |c, b| {
            let _ = c.fetch_modrm(b);
            Ok(())
        });
    }

    // Loops and JCXZ.
    t.set(0xE0, |c, b| {
        let d = c.fetch8(b);
        c.cx = c.cx.wrapping_sub(1);
        if c.cx != 0 && !c.flag(Flags::ZERO) {
            c.tick_taken();
            c.ip = c.ip.wrapping_add(common::widen(d));
        }
        Ok(())
    });
    t.set(0xE1, |c, b| {
        let d = c.fetch8(b);
        c.cx = c.cx.wrapping_sub(1);
        if c.cx != 0 && c.flag(Flags::ZERO) {
            c.tick_taken();
            c.ip = c.ip.wrapping_add(common::widen(d));
        }
        Ok(())
    });
    t.set(0xE2, |c, b| {
        let d = c.fetch8(b);
        c.cx = c.cx.wrapping_sub(1);
        if c.cx != 0 {
            c.tick_taken();
            c.ip = c.ip.wrapping_add(common::widen(d));
        }
        Ok(())
    });
    t.set(0xE3, |c, b| {
        let d = c.fetch8(b);
        if c.cx == 0 {
            c.tick_taken();
            c.ip = c.ip.wrapping_add(common::widen(d));
        }
        Ok(())
    });

    // Port I/O.
    t.set(0xE4, |c, b| {
        let port = u16::from(c.fetch8(b));
        let v = b.io_read8(port);
        c.set_al(v);
        Ok(())
    });
    t.set(0xE5, |c, b| {
        let port = u16::from(c.fetch8(b));
        let l = b.io_read8(port);
        let h = b.io_read8(port.wrapping_add(1));
        c.ax = common::make_word(h, l);
        Ok(())
    });
    t.set(0xE6, |c, b| {
        let port = u16::from(c.fetch8(b));
        b.io_write8(port, c.al());
        Ok(())
    });
    t.set(0xE7, |c, b| {
        let port = u16::from(c.fetch8(b));
        b.io_write8(port, common::lo(c.ax));
        b.io_write8(port.wrapping_add(1), common::hi(c.ax));
        Ok(())
    });
    t.set(0xEC, |c, b| {
        let v = b.io_read8(c.dx);
        c.set_al(v);
        Ok(())
    });
    t.set(0xED, |c, b| {
        let l = b.io_read8(c.dx);
        let h = b.io_read8(c.dx.wrapping_add(1));
        c.ax = common::make_word(h, l);
        Ok(())
    });
    t.set(0xEE, |c, b| {
        b.io_write8(c.dx, c.al());
        Ok(())
    });
    t.set(0xEF, |c, b| {
        b.io_write8(c.dx, common::lo(c.ax));
        b.io_write8(c.dx.wrapping_add(1), common::hi(c.ax));
        Ok(())
    });

    t.set(0xE8, |c, b| {
        let d = c.fetch16(b);
        let ip = c.ip;
        c.push16(b, ip);
        c.ip = c.ip.wrapping_add(d);
        Ok(())
    });
    t.set(0xE9, |c, b| {
        let d = c.fetch16(b);
        c.ip = c.ip.wrapping_add(d);
        Ok(())
    });
    t.set(0xEA, |c, b| {
        let offset = c.fetch16(b);
        let seg = c.fetch16(b);
        c.ip = offset;
        c.cs = seg;
        Ok(())
    });
    t.set(0xEB, |c, b| {
        let d = c.fetch8(b);
        c.ip = c.ip.wrapping_add(common::widen(d));
        Ok(())
    });

    // LOCK: single-processor bus, prefix has no observable effect.
    t.set(0xF0, run_prefixed);
    t.set(0xF1, run_prefixed);
    t.set(0xF2, |c, b| {
        c.rep = Some(Rep::NotEqual);
        run_prefixed(c, b)
    });
    t.set(0xF3, |c, b| {
        c.rep = Some(Rep::Equal);
        run_prefixed(c, b)
    });

    t.set(0xF4, |c, _b| {
        c.halt();
        Ok(())
    });
    t.set(0xF5, |c, _b| {
        let v = !c.flag(Flags::CARRY);
        c.set_flag(Flags::CARRY, v);
        Ok(())
    });

    // Unary group: TEST imm, NOT, NEG, multiply and divide.
    t.set(0xF6, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read8(c, b);
        match m.reg {
            0 | 1 => {
                let imm = c.fetch8(b);
                c.logic_flags8(v & imm);
            }
            2 => m.write8(c, b, !v),
            3 => {
                let r = c.apply_sum8(alu::sub8(0, v, false));
                m.write8(c, b, r);
            }
            4 => c.mul8(v),
            5 => c.imul8(v),
            6 => c.div8(b, v),
            _ => c.idiv8(b, v),
        }
        Ok(())
    });
    t.set(0xF7, |c, b| {
        let m = c.fetch_modrm(b);
        let v = m.read16(c, b);
        match m.reg {
            0 | 1 => {
                let imm = c.fetch16(b);
                c.logic_flags16(v & imm);
            }
            2 => m.write16(c, b, !v),
            3 => {
                let r = c.apply_sum16(alu::sub16(0, v, false));
                m.write16(c, b, r);
            }
            4 => c.mul16(v),
            5 => c.imul16(v),
            6 => c.div16(b, v),
            _ => c.idiv16(b, v),
        }
        Ok(())
    });

    for (opcode, flag) in [
        (0xF8u8, Flags::CARRY),
        (0xFA, Flags::INTERRUPT),
        (0xFC, Flags::DIRECTION),
    ] {
        t.set(opcode, move |c, _b| {
            c.set_flag(flag, false);
            Ok(())
        });
        t.set(opcode + 1, move |c, _b| {
            c.set_flag(flag, true);
            Ok(())
        });
    }

    t.set(0xFE, |c, b| {
        let m = c.fetch_modrm(b);
        match m.reg {
            0 => {
                let v = m.read8(c, b);
                let v = c.inc8(v);
                m.write8(c, b, v);
            }
            1 => {
                let v = m.read8(c, b);
                let v = c.dec8(v);
                m.write8(c, b, v);
            }
            _ => return unknown_reg_field(c),
        }
        Ok(())
    });
    t.set(0xFF, |c, b| {
        let m = c.fetch_modrm(b);
        match m.reg {
            0 => {
                let v = m.read16(c, b);
                let v = c.inc16(v);
                m.write16(c, b, v);
            }
            1 => {
                let v = m.read16(c, b);
                let v = c.dec16(v);
                m.write16(c, b, v);
            }
            2 => {
                let target = m.read16(c, b);
                let ip = c.ip;
                c.push16(b, ip);
                c.ip = target;
            }
            3 => {
                let offset = m.read16(c, b);
                let seg = c.read16(b, m.address().wrapping_add(2));
                let cs = c.cs;
                let ip = c.ip;
                c.push16(b, cs);
                c.push16(b, ip);
                c.cs = seg;
                c.ip = offset;
            }
            4 => c.ip = m.read16(c, b),
            5 => {
                let offset = m.read16(c, b);
                c.cs = c.read16(b, m.address().wrapping_add(2));
                c.ip = offset;
            }
            _ => {
                let v = m.read16(c, b);
                c.push16(b, v);
            }
        }
        Ok(())
    });

    t
}

pub(super) static TABLE: Lazy<OpTable<Cpu8086>> = Lazy::new(build);
