//! 8080 instruction set: dispatch table and per-opcode semantics.
//!
//! The table is indexed by the raw opcode byte. The encoding is octal at
//! heart (register fields at bits 0-2 and 3-5), so most of it is built in
//! loops. The undocumented encodings are aliases of documented ones and
//! are mapped as such.

use super::{Cpu8080, Flags};
use crate::alu;
use crate::bus::Bus;
use crate::cpu::{ExecResult, OpTable};
use once_cell::sync::Lazy;

// Register field values, per the encoding.
const REG_M: u8 = 6;

impl Cpu8080 {
    /// Read the register (or memory cell, for field 6) named by an
    /// encoding field.
    fn reg(&mut self, bus: &mut dyn Bus, idx: u8) -> u8 {
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

    fn set_reg(&mut self, bus: &mut dyn Bus, idx: u8, v: u8) {
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

    /// Register pair by encoding field: BC, DE, HL, SP.
    fn pair(&self, idx: u8) -> u16 {
        match idx {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.sp,
        }
    }

    fn set_pair(&mut self, idx: u8, v: u16) {
        match idx {
            0 => self.set_bc(v),
            1 => self.set_de(v),
            2 => self.set_hl(v),
            _ => self.sp = v,
        }
    }

    /// Condition by encoding field: NZ, Z, NC, C, PO, PE, P, M.
    fn cond(&self, idx: u8) -> bool {
        let (flag, want) = match idx {
            0 => (Flags::ZERO, false),
            1 => (Flags::ZERO, true),
            2 => (Flags::CARRY, false),
            3 => (Flags::CARRY, true),
            4 => (Flags::PARITY, false),
            5 => (Flags::PARITY, true),
            6 => (Flags::SIGN, false),
            _ => (Flags::SIGN, true),
        };
        self.flag(flag) == want
    }

    fn adjust_szp(&mut self, v: u8) {
        self.set_flag(Flags::SIGN, v & 0x80 != 0);
        self.set_flag(Flags::ZERO, v == 0);
        self.set_flag(Flags::PARITY, common::parity_even(v));
    }

    fn add(&mut self, v: u8, carry_in: bool) {
        let s = alu::add8(self.a, v, carry_in);
        self.a = s.result;
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::AUX_CARRY, s.half);
        self.adjust_szp(s.result);
    }

    /// SUB/SBB and CMP share everything but the writeback.
    fn compare(&mut self, v: u8, borrow_in: bool) -> u8 {
        let s = alu::sub8(self.a, v, borrow_in);
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::AUX_CARRY, s.half);
        self.adjust_szp(s.result);
        s.result
    }

    fn ana(&mut self, v: u8) {
        // AC is the OR of bit 3 of the operands, a documented 8080 quirk.
        let half = (self.a | v) & 0x08 != 0;
        self.a &= v;
        self.set_flag(Flags::CARRY, false);
        self.set_flag(Flags::AUX_CARRY, half);
        let r = self.a;
        self.adjust_szp(r);
    }

    fn xra(&mut self, v: u8) {
        self.a ^= v;
        self.set_flag(Flags::CARRY, false);
        self.set_flag(Flags::AUX_CARRY, false);
        let r = self.a;
        self.adjust_szp(r);
    }

    fn ora(&mut self, v: u8) {
        self.a |= v;
        self.set_flag(Flags::CARRY, false);
        self.set_flag(Flags::AUX_CARRY, false);
        let r = self.a;
        self.adjust_szp(r);
    }

    /// The arithmetic/logic grid row, by encoding field.
    fn alu_op(&mut self, op: u8, v: u8) {
        match op {
            0 => self.add(v, false),
            1 => {
                let c = self.flag(Flags::CARRY);
                self.add(v, c);
            }
            2 => {
                self.a = self.compare(v, false);
            }
            3 => {
                let c = self.flag(Flags::CARRY);
                self.a = self.compare(v, c);
            }
            4 => self.ana(v),
            5 => self.xra(v),
            6 => self.ora(v),
            _ => {
                self.compare(v, false);
            }
        }
    }

    fn inr(&mut self, bus: &mut dyn Bus, idx: u8) {
        let v = self.reg(bus, idx);
        let s = alu::add8(v, 1, false);
        self.set_reg(bus, idx, s.result);
        self.set_flag(Flags::AUX_CARRY, s.half);
        self.adjust_szp(s.result);
    }

    fn dcr(&mut self, bus: &mut dyn Bus, idx: u8) {
        let v = self.reg(bus, idx);
        let s = alu::sub8(v, 1, false);
        self.set_reg(bus, idx, s.result);
        self.set_flag(Flags::AUX_CARRY, s.half);
        self.adjust_szp(s.result);
    }

    fn dad(&mut self, idx: u8) {
        let s = alu::add16(self.hl(), self.pair(idx), false);
        self.set_hl(s.result);
        self.set_flag(Flags::CARRY, s.carry);
    }

    fn daa(&mut self) {
        let mut a = self.a;
        let mut half = false;
        if (a & 0x0F) > 9 || self.flag(Flags::AUX_CARRY) {
            let s = alu::add8(a, 0x06, false);
            half = s.half;
            a = s.result;
        }
        let mut carry = self.flag(Flags::CARRY);
        if (a >> 4) > 9 || carry {
            let s = alu::add8(a, 0x60, false);
            carry = carry || s.carry;
            a = s.result;
        }
        self.a = a;
        self.set_flag(Flags::CARRY, carry);
        self.set_flag(Flags::AUX_CARRY, half);
        self.adjust_szp(a);
    }

    fn jump_if(&mut self, bus: &mut dyn Bus, taken: bool) {
        let target = self.fetch16(bus);
        if taken {
            self.pc = target;
            self.tick_taken();
        }
    }

    fn call_if(&mut self, bus: &mut dyn Bus, taken: bool) {
        let target = self.fetch16(bus);
        if taken {
            let ret = self.pc;
            self.push16(bus, ret);
            self.pc = target;
            self.tick_taken();
        }
    }

    fn ret_if(&mut self, bus: &mut dyn Bus, taken: bool) {
        if taken {
            self.pc = self.pop16(bus);
            self.tick_taken();
        }
    }

    fn op_undefined(&mut self, _bus: &mut dyn Bus) -> ExecResult {
        // Every 8080 encoding maps to something; reaching this means the
        // table builder has a hole. Treat as NOP but make it visible.
        log::warn!(
            "8080: unmapped opcode {:#04X} at {:#06X}, treating as NOP",
            self.opcode,
            self.current_op
        );
        Ok(())
    }
}

pub(super) static TABLE: Lazy<OpTable<Cpu8080>> = Lazy::new(build);

#[allow(clippy::too_many_lines)]
fn build() -> OpTable<Cpu8080> {
    let mut t = OpTable::new(Cpu8080::op_undefined);

    let nop = |_: &mut Cpu8080, _: &mut dyn Bus| Ok(());
    // NOP plus its undocumented aliases.
    for op in [0x00u8, 0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38] {
        t.set(op, nop);
    }

    // Moves, loads, arithmetic over the register grid.
    for dst in 0..8u8 {
        for src in 0..8u8 {
            if dst == REG_M && src == REG_M {
                continue; // that slot is HLT
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
            c.inr(b, r);
            Ok(())
        });
        t.set(0x05 | r << 3, move |c, b| {
            c.dcr(b, r);
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
        // Immediate forms: ADI, ACI, SUI, SBI, ANI, XRI, ORI, CPI.
        t.set(0xC6 | op << 3, move |c, b| {
            let v = c.fetch8(b);
            c.alu_op(op, v);
            Ok(())
        });
    }

    // Register-pair operations.
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
            c.dad(rp);
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

    // Rotates. Only CY is affected.
    t.set(0x07, |c, _| {
        let carry = c.a & 0x80 != 0;
        c.a = c.a.rotate_left(1);
        c.set_flag(Flags::CARRY, carry);
        Ok(())
    });
    t.set(0x0F, |c, _| {
        let carry = c.a & 0x01 != 0;
        c.a = c.a.rotate_right(1);
        c.set_flag(Flags::CARRY, carry);
        Ok(())
    });
    t.set(0x17, |c, _| {
        let carry = c.a & 0x80 != 0;
        c.a = c.a << 1 | u8::from(c.flag(Flags::CARRY));
        c.set_flag(Flags::CARRY, carry);
        Ok(())
    });
    t.set(0x1F, |c, _| {
        let carry = c.a & 0x01 != 0;
        c.a = c.a >> 1 | u8::from(c.flag(Flags::CARRY)) << 7;
        c.set_flag(Flags::CARRY, carry);
        Ok(())
    });

    // Direct-address loads and stores.
    t.set(0x22, |c, b| {
        let addr = c.fetch16(b);
        let hl = c.hl();
        c.write8(b, addr, common::lo(hl));
        c.write8(b, addr.wrapping_add(1), common::hi(hl));
        Ok(())
    });
    t.set(0x2A, |c, b| {
        let addr = c.fetch16(b);
        let l = c.read8(b, addr);
        let h = c.read8(b, addr.wrapping_add(1));
        c.set_hl(common::make_word(h, l));
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
        Ok(())
    });
    t.set(0x37, |c, _| {
        c.set_flag(Flags::CARRY, true);
        Ok(())
    });
    t.set(0x3F, |c, _| {
        let inv = !c.flag(Flags::CARRY);
        c.set_flag(Flags::CARRY, inv);
        Ok(())
    });

    // Control flow.
    for cc in 0..8u8 {
        t.set(0xC2 | cc << 3, move |c, b| {
            let taken = c.cond(cc);
            c.jump_if(b, taken);
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
    let jmp = |c: &mut Cpu8080, b: &mut dyn Bus| {
        c.jump_if(b, true);
        Ok(())
    };
    t.set(0xC3, jmp);
    t.set(0xCB, jmp); // undocumented alias
    let call = |c: &mut Cpu8080, b: &mut dyn Bus| {
        c.call_if(b, true);
        Ok(())
    };
    for op in [0xCDu8, 0xDD, 0xED, 0xFD] {
        t.set(op, call);
    }
    let ret = |c: &mut Cpu8080, b: &mut dyn Bus| {
        c.ret_if(b, true);
        Ok(())
    };
    t.set(0xC9, ret);
    t.set(0xD9, ret); // undocumented alias
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
        let v = common::make_word(c.a, c.flags());
        c.push16(b, v);
        Ok(())
    });
    t.set(0xF1, |c, b| {
        let v = c.pop16(b);
        c.a = common::hi(v);
        c.set_flags(common::lo(v));
        Ok(())
    });
    t.set(0xE3, |c, b| {
        let sp = c.sp;
        let l = c.read8(b, sp);
        let h = c.read8(b, sp.wrapping_add(1));
        let hl = c.hl();
        c.write8(b, sp, common::lo(hl));
        c.write8(b, sp.wrapping_add(1), common::hi(hl));
        c.set_hl(common::make_word(h, l));
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

    // Port I/O.
    t.set(0xDB, |c, b| {
        let port = c.fetch8(b);
        c.a = b.io_read8(u16::from(port));
        Ok(())
    });
    t.set(0xD3, |c, b| {
        let port = c.fetch8(b);
        b.io_write8(u16::from(port), c.a);
        Ok(())
    });

    t.set(0xFB, |c, _| {
        c.set_interrupts_enabled(true);
        Ok(())
    });
    t.set(0xF3, |c, _| {
        c.set_interrupts_enabled(false);
        Ok(())
    });

    t
}
