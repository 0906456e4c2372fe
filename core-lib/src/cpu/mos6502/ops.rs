//! 6502 instruction set: addressing-mode resolution and the dispatch
//! table for the documented opcodes.

use super::{Cpu6502, Flags};
use crate::alu;
use crate::bus::Bus;
use crate::cpu::{ExecResult, OpTable};
use once_cell::sync::Lazy;

/// Addressing modes that produce an operand address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Mode {
    Imm,
    Zp,
    Zpx,
    Zpy,
    Abs,
    Abx,
    Aby,
    Inx,
    Iny,
}

impl Cpu6502 {
    /// Word read that never leaves the zero page (pointer fetches wrap
    /// at 0xFF).
    fn read16_zp(&mut self, bus: &mut dyn Bus, zp: u8) -> u16 {
        let l = self.read8(bus, u16::from(zp));
        let h = self.read8(bus, u16::from(zp.wrapping_add(1)));
        common::make_word(h, l)
    }

    /// Effective address for `mode`, recording page crossings for the
    /// modes that bill them.
    fn resolve(&mut self, bus: &mut dyn Bus, mode: Mode) -> u16 {
        match mode {
            Mode::Imm => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                addr
            }
            Mode::Zp => u16::from(self.fetch8(bus)),
            Mode::Zpx => {
                let zp = self.fetch8(bus);
                u16::from(zp.wrapping_add(self.x))
            }
            Mode::Zpy => {
                let zp = self.fetch8(bus);
                u16::from(zp.wrapping_add(self.y))
            }
            Mode::Abs => self.fetch16(bus),
            Mode::Abx => {
                let base = self.fetch16(bus);
                let addr = base.wrapping_add(u16::from(self.x));
                self.page_crossed = common::hi(base) != common::hi(addr);
                addr
            }
            Mode::Aby => {
                let base = self.fetch16(bus);
                let addr = base.wrapping_add(u16::from(self.y));
                self.page_crossed = common::hi(base) != common::hi(addr);
                addr
            }
            Mode::Inx => {
                let zp = self.fetch8(bus).wrapping_add(self.x);
                self.read16_zp(bus, zp)
            }
            Mode::Iny => {
                let zp = self.fetch8(bus);
                let base = self.read16_zp(bus, zp);
                let addr = base.wrapping_add(u16::from(self.y));
                self.page_crossed = common::hi(base) != common::hi(addr);
                addr
            }
        }
    }

    fn operand(&mut self, bus: &mut dyn Bus, mode: Mode) -> u8 {
        let addr = self.resolve(bus, mode);
        self.read8(bus, addr)
    }

    // Arithmetic.

    fn adc(&mut self, v: u8) {
        let carry = self.flag(Flags::CARRY);
        if self.flag(Flags::DECIMAL) {
            self.adc_decimal(v, carry);
        } else {
            let s = alu::add8(self.a, v, carry);
            self.a = s.result;
            self.set_flag(Flags::CARRY, s.carry);
            self.set_flag(Flags::OVERFLOW, s.overflow);
            self.adjust_nz(s.result);
        }
    }

    /// NMOS decimal add: N/V from the intermediate high nibble, Z from
    /// the binary sum.
    fn adc_decimal(&mut self, v: u8, carry: bool) {
        let a = self.a;
        let c = u16::from(carry);
        let binary = u16::from(a) + u16::from(v) + c;
        self.set_flag(Flags::ZERO, binary as u8 == 0);

        let mut lo = u16::from(a & 0x0F) + u16::from(v & 0x0F) + c;
        if lo > 9 {
            lo += 6;
        }
        let mut hi = u16::from(a >> 4) + u16::from(v >> 4) + u16::from(lo > 0x0F);
        let mid = ((hi as u8) << 4) | (lo as u8 & 0x0F);
        self.set_flag(Flags::NEGATIVE, mid & 0x80 != 0);
        self.set_flag(Flags::OVERFLOW, (a ^ mid) & (v ^ mid) & 0x80 != 0);
        if hi > 9 {
            hi += 6;
        }
        self.set_flag(Flags::CARRY, hi > 0x0F);
        self.a = ((hi as u8) << 4) | (lo as u8 & 0x0F);
    }

    fn sbc(&mut self, v: u8) {
        let borrow = !self.flag(Flags::CARRY);
        let s = alu::sub8(self.a, v, borrow);
        // Flags always come from the binary difference.
        self.set_flag(Flags::CARRY, !s.carry);
        self.set_flag(Flags::OVERFLOW, s.overflow);
        self.adjust_nz(s.result);
        if self.flag(Flags::DECIMAL) {
            let a = self.a;
            let mut lo =
                i16::from(a & 0x0F) - i16::from(v & 0x0F) - i16::from(borrow);
            let mut hi = i16::from(a >> 4) - i16::from(v >> 4);
            if lo < 0 {
                lo -= 6;
                hi -= 1;
            }
            if hi < 0 {
                hi -= 6;
            }
            self.a = ((hi as u8) << 4) | (lo as u8 & 0x0F);
        } else {
            self.a = s.result;
        }
    }

    fn compare(&mut self, reg: u8, v: u8) {
        let s = alu::sub8(reg, v, false);
        self.set_flag(Flags::CARRY, !s.carry);
        self.adjust_nz(s.result);
    }

    fn bit(&mut self, v: u8) {
        self.set_flag(Flags::ZERO, self.a & v == 0);
        self.set_flag(Flags::NEGATIVE, v & 0x80 != 0);
        self.set_flag(Flags::OVERFLOW, v & 0x40 != 0);
    }

    // Shifts, shared between accumulator and memory forms.

    fn asl(&mut self, v: u8) -> u8 {
        self.set_flag(Flags::CARRY, v & 0x80 != 0);
        let r = v << 1;
        self.adjust_nz(r);
        r
    }

    fn lsr(&mut self, v: u8) -> u8 {
        self.set_flag(Flags::CARRY, v & 0x01 != 0);
        let r = v >> 1;
        self.adjust_nz(r);
        r
    }

    fn rol(&mut self, v: u8) -> u8 {
        let carry_in = u8::from(self.flag(Flags::CARRY));
        self.set_flag(Flags::CARRY, v & 0x80 != 0);
        let r = v << 1 | carry_in;
        self.adjust_nz(r);
        r
    }

    fn ror(&mut self, v: u8) -> u8 {
        let carry_in = u8::from(self.flag(Flags::CARRY)) << 7;
        self.set_flag(Flags::CARRY, v & 0x01 != 0);
        let r = v >> 1 | carry_in;
        self.adjust_nz(r);
        r
    }

    fn op_undefined(&mut self, _bus: &mut dyn Bus) -> ExecResult {
        // NMOS illegal opcodes mostly behave as NOPs of various widths;
        // software in the wild relies on execution continuing.
        log::warn!(
            "6502: illegal opcode {:#04X} at {:#06X}, continuing as NOP",
            self.opcode,
            self.current_op
        );
        Ok(())
    }
}

fn read_op(
    t: &mut OpTable<Cpu6502>,
    entries: &[(u8, Mode)],
    f: fn(&mut Cpu6502, u8),
) {
    for &(op, mode) in entries {
        t.set(op, move |c, b| {
            let v = c.operand(b, mode);
            f(c, v);
            c.charge_page_cross();
            Ok(())
        });
    }
}

fn store_op(t: &mut OpTable<Cpu6502>, entries: &[(u8, Mode)], get: fn(&Cpu6502) -> u8) {
    for &(op, mode) in entries {
        t.set(op, move |c, b| {
            let addr = c.resolve(b, mode);
            let v = get(c);
            c.write8(b, addr, v);
            Ok(())
        });
    }
}

/// Read-modify-write: the memory forms of the shift/INC/DEC family.
fn rmw_op(
    t: &mut OpTable<Cpu6502>,
    entries: &[(u8, Mode)],
    f: fn(&mut Cpu6502, u8) -> u8,
) {
    for &(op, mode) in entries {
        t.set(op, move |c, b| {
            let addr = c.resolve(b, mode);
            let v = c.read8(b, addr);
            let v = f(c, v);
            c.write8(b, addr, v);
            Ok(())
        });
    }
}

pub(super) static TABLE: Lazy<OpTable<Cpu6502>> = Lazy::new(build);

#[allow(clippy::too_many_lines)]
fn build() -> OpTable<Cpu6502> {
    use Mode::{Abs, Abx, Aby, Imm, Inx, Iny, Zp, Zpx, Zpy};
    let mut t = OpTable::new(Cpu6502::op_undefined);

    // Loads.
    read_op(
        &mut t,
        &[
            (0xA9, Imm),
            (0xA5, Zp),
            (0xB5, Zpx),
            (0xAD, Abs),
            (0xBD, Abx),
            (0xB9, Aby),
            (0xA1, Inx),
            (0xB1, Iny),
        ],
        |c, v| {
            c.a = v;
            c.adjust_nz(v);
        },
    );
    read_op(
        &mut t,
        &[(0xA2, Imm), (0xA6, Zp), (0xB6, Zpy), (0xAE, Abs), (0xBE, Aby)],
        |c, v| {
            c.x = v;
            c.adjust_nz(v);
        },
    );
    read_op(
        &mut t,
        &[(0xA0, Imm), (0xA4, Zp), (0xB4, Zpx), (0xAC, Abs), (0xBC, Abx)],
        |c, v| {
            c.y = v;
            c.adjust_nz(v);
        },
    );

    // Stores.
    store_op(
        &mut t,
        &[
            (0x85, Zp),
            (0x95, Zpx),
            (0x8D, Abs),
            (0x9D, Abx),
            (0x99, Aby),
            (0x81, Inx),
            (0x91, Iny),
        ],
        |c| c.a,
    );
    store_op(&mut t, &[(0x86, Zp), (0x96, Zpy), (0x8E, Abs)], |c| c.x);
    store_op(&mut t, &[(0x84, Zp), (0x94, Zpx), (0x8C, Abs)], |c| c.y);

    // Arithmetic and logic.
    read_op(
        &mut t,
        &[
            (0x69, Imm),
            (0x65, Zp),
            (0x75, Zpx),
            (0x6D, Abs),
            (0x7D, Abx),
            (0x79, Aby),
            (0x61, Inx),
            (0x71, Iny),
        ],
        Cpu6502::adc,
    );
    read_op(
        &mut t,
        &[
            (0xE9, Imm),
            (0xE5, Zp),
            (0xF5, Zpx),
            (0xED, Abs),
            (0xFD, Abx),
            (0xF9, Aby),
            (0xE1, Inx),
            (0xF1, Iny),
        ],
        Cpu6502::sbc,
    );
    read_op(
        &mut t,
        &[
            (0xC9, Imm),
            (0xC5, Zp),
            (0xD5, Zpx),
            (0xCD, Abs),
            (0xDD, Abx),
            (0xD9, Aby),
            (0xC1, Inx),
            (0xD1, Iny),
        ],
        |c, v| c.compare(c.a, v),
    );
    read_op(&mut t, &[(0xE0, Imm), (0xE4, Zp), (0xEC, Abs)], |c, v| {
        c.compare(c.x, v);
    });
    read_op(&mut t, &[(0xC0, Imm), (0xC4, Zp), (0xCC, Abs)], |c, v| {
        c.compare(c.y, v);
    });
    read_op(
        &mut t,
        &[
            (0x29, Imm),
            (0x25, Zp),
            (0x35, Zpx),
            (0x2D, Abs),
            (0x3D, Abx),
            (0x39, Aby),
            (0x21, Inx),
            (0x31, Iny),
        ],
        |c, v| {
            c.a &= v;
            let a = c.a;
            c.adjust_nz(a);
        },
    );
    read_op(
        &mut t,
        &[
            (0x09, Imm),
            (0x05, Zp),
            (0x15, Zpx),
            (0x0D, Abs),
            (0x1D, Abx),
            (0x19, Aby),
            (0x01, Inx),
            (0x11, Iny),
        ],
        |c, v| {
            c.a |= v;
            let a = c.a;
            c.adjust_nz(a);
        },
    );
    read_op(
        &mut t,
        &[
            (0x49, Imm),
            (0x45, Zp),
            (0x55, Zpx),
            (0x4D, Abs),
            (0x5D, Abx),
            (0x59, Aby),
            (0x41, Inx),
            (0x51, Iny),
        ],
        |c, v| {
            c.a ^= v;
            let a = c.a;
            c.adjust_nz(a);
        },
    );
    read_op(&mut t, &[(0x24, Zp), (0x2C, Abs)], Cpu6502::bit);

    // Shifts: accumulator forms, then memory forms.
    t.set(0x0A, |c, _| {
        c.a = c.asl(c.a);
        Ok(())
    });
    t.set(0x4A, |c, _| {
        c.a = c.lsr(c.a);
        Ok(())
    });
    t.set(0x2A, |c, _| {
        c.a = c.rol(c.a);
        Ok(())
    });
    t.set(0x6A, |c, _| {
        c.a = c.ror(c.a);
        Ok(())
    });
    rmw_op(
        &mut t,
        &[(0x06, Zp), (0x16, Zpx), (0x0E, Abs), (0x1E, Abx)],
        Cpu6502::asl,
    );
    rmw_op(
        &mut t,
        &[(0x46, Zp), (0x56, Zpx), (0x4E, Abs), (0x5E, Abx)],
        Cpu6502::lsr,
    );
    rmw_op(
        &mut t,
        &[(0x26, Zp), (0x36, Zpx), (0x2E, Abs), (0x3E, Abx)],
        Cpu6502::rol,
    );
    rmw_op(
        &mut t,
        &[(0x66, Zp), (0x76, Zpx), (0x6E, Abs), (0x7E, Abx)],
        Cpu6502::ror,
    );
    rmw_op(
        &mut t,
        &[(0xE6, Zp), (0xF6, Zpx), (0xEE, Abs), (0xFE, Abx)],
        |c, v| {
            let r = v.wrapping_add(1);
            c.adjust_nz(r);
            r
        },
    );
    rmw_op(
        &mut t,
        &[(0xC6, Zp), (0xD6, Zpx), (0xCE, Abs), (0xDE, Abx)],
        |c, v| {
            let r = v.wrapping_sub(1);
            c.adjust_nz(r);
            r
        },
    );

    // Register transfers and increments.
    t.set(0xAA, |c, _| {
        c.x = c.a;
        let v = c.x;
        c.adjust_nz(v);
        Ok(())
    });
    t.set(0xA8, |c, _| {
        c.y = c.a;
        let v = c.y;
        c.adjust_nz(v);
        Ok(())
    });
    t.set(0x8A, |c, _| {
        c.a = c.x;
        let v = c.a;
        c.adjust_nz(v);
        Ok(())
    });
    t.set(0x98, |c, _| {
        c.a = c.y;
        let v = c.a;
        c.adjust_nz(v);
        Ok(())
    });
    t.set(0xBA, |c, _| {
        c.x = c.sp;
        let v = c.x;
        c.adjust_nz(v);
        Ok(())
    });
    t.set(0x9A, |c, _| {
        c.sp = c.x;
        Ok(())
    });
    t.set(0xE8, |c, _| {
        c.x = c.x.wrapping_add(1);
        let v = c.x;
        c.adjust_nz(v);
        Ok(())
    });
    t.set(0xC8, |c, _| {
        c.y = c.y.wrapping_add(1);
        let v = c.y;
        c.adjust_nz(v);
        Ok(())
    });
    t.set(0xCA, |c, _| {
        c.x = c.x.wrapping_sub(1);
        let v = c.x;
        c.adjust_nz(v);
        Ok(())
    });
    t.set(0x88, |c, _| {
        c.y = c.y.wrapping_sub(1);
        let v = c.y;
        c.adjust_nz(v);
        Ok(())
    });

    // Stack.
    t.set(0x48, |c, b| {
        let v = c.a;
        c.push8(b, v);
        Ok(())
    });
    t.set(0x68, |c, b| {
        c.a = c.pop8(b);
        let v = c.a;
        c.adjust_nz(v);
        Ok(())
    });
    t.set(0x08, |c, b| {
        // PHP pushes with B and bit 5 set.
        let v = (c.f | Flags::BREAK | Flags::RESERVED).bits();
        c.push8(b, v);
        Ok(())
    });
    t.set(0x28, |c, b| {
        let v = c.pop8(b);
        c.f = (Flags::from_bits_truncate(v) | Flags::RESERVED) - Flags::BREAK;
        Ok(())
    });

    // Flag manipulation.
    t.set(0x18, |c, _| {
        c.set_flag(Flags::CARRY, false);
        Ok(())
    });
    t.set(0x38, |c, _| {
        c.set_flag(Flags::CARRY, true);
        Ok(())
    });
    t.set(0x58, |c, _| {
        c.set_flag(Flags::IRQ_DISABLE, false);
        Ok(())
    });
    t.set(0x78, |c, _| {
        c.set_flag(Flags::IRQ_DISABLE, true);
        Ok(())
    });
    t.set(0xB8, |c, _| {
        c.set_flag(Flags::OVERFLOW, false);
        Ok(())
    });
    t.set(0xD8, |c, _| {
        c.set_flag(Flags::DECIMAL, false);
        Ok(())
    });
    t.set(0xF8, |c, _| {
        c.set_flag(Flags::DECIMAL, true);
        Ok(())
    });

    // Control flow.
    t.set(0x4C, |c, b| {
        c.pc = c.fetch16(b);
        Ok(())
    });
    t.set(0x6C, |c, b| {
        // Indirect JMP reproduces the page-wrap defect: the vector's
        // high byte is fetched without carrying into the page.
        let ptr = c.fetch16(b);
        let l = c.read8(b, ptr);
        let wrapped = (ptr & 0xFF00) | u16::from(common::lo(ptr).wrapping_add(1));
        let h = c.read8(b, wrapped);
        c.pc = common::make_word(h, l);
        Ok(())
    });
    t.set(0x20, |c, b| {
        let target = c.fetch16(b);
        let ret = c.pc.wrapping_sub(1);
        c.push16(b, ret);
        c.pc = target;
        Ok(())
    });
    t.set(0x60, |c, b| {
        c.pc = c.pop16(b).wrapping_add(1);
        Ok(())
    });

    t.set(0x10, |c, b| {
        let taken = !c.flag(Flags::NEGATIVE);
        c.branch(b, taken);
        Ok(())
    });
    t.set(0x30, |c, b| {
        let taken = c.flag(Flags::NEGATIVE);
        c.branch(b, taken);
        Ok(())
    });
    t.set(0x50, |c, b| {
        let taken = !c.flag(Flags::OVERFLOW);
        c.branch(b, taken);
        Ok(())
    });
    t.set(0x70, |c, b| {
        let taken = c.flag(Flags::OVERFLOW);
        c.branch(b, taken);
        Ok(())
    });
    t.set(0x90, |c, b| {
        let taken = !c.flag(Flags::CARRY);
        c.branch(b, taken);
        Ok(())
    });
    t.set(0xB0, |c, b| {
        let taken = c.flag(Flags::CARRY);
        c.branch(b, taken);
        Ok(())
    });
    t.set(0xD0, |c, b| {
        let taken = !c.flag(Flags::ZERO);
        c.branch(b, taken);
        Ok(())
    });
    t.set(0xF0, |c, b| {
        let taken = c.flag(Flags::ZERO);
        c.branch(b, taken);
        Ok(())
    });

    // BRK: two-byte instruction, stacked copy carries B.
    t.set(0x00, |c, b| {
        c.fetch8(b); // signature byte
        let pc = c.pc;
        c.push16(b, pc);
        let flags = (c.f | Flags::BREAK | Flags::RESERVED).bits();
        c.push8(b, flags);
        c.set_flag(Flags::IRQ_DISABLE, true);
        c.pc = c.read16(b, super::IRQ_VECTOR);
        Ok(())
    });
    t.set(0x40, |c, b| {
        let v = c.pop8(b);
        c.f = (Flags::from_bits_truncate(v) | Flags::RESERVED) - Flags::BREAK;
        c.pc = c.pop16(b);
        Ok(())
    });

    t.set(0xEA, |_, _| Ok(()));

    t
}
