//! Z80 prefixed instruction sets: CB (bit operations), ED (extended),
//! DD/FD (index registers) and the DD CB / FD CB double prefix.
//!
//! Prefix handlers fetch the second opcode byte, charge the group timing
//! from the metadata tables, and dispatch into the secondary table.

use super::{CpuZ80, Flags, IndexReg};
use crate::bus::Bus;
use crate::cpu::{ExecResult, OpTable};
use once_cell::sync::Lazy;

// Metadata group indices: grp1 = CB, grp2 = ED, grp3 = DD/FD.
const GRP_CB: usize = 0;
const GRP_ED: usize = 1;
const GRP_IDX: usize = 2;

const REG_M: u8 = 6;

impl CpuZ80 {
    /// Rotate/shift family shared by CB and DD CB: RLC RRC RL RR SLA
    /// SRA SLL SRL, by group field.
    fn cb_rot(&mut self, grp: u8, v: u8) -> u8 {
        let carry_in = self.flag(Flags::CARRY);
        let (r, carry) = match grp {
            0 => (v.rotate_left(1), v & 0x80 != 0),
            1 => (v.rotate_right(1), v & 0x01 != 0),
            2 => (v << 1 | u8::from(carry_in), v & 0x80 != 0),
            3 => (v >> 1 | u8::from(carry_in) << 7, v & 0x01 != 0),
            4 => (v << 1, v & 0x80 != 0),
            5 => ((v >> 1) | (v & 0x80), v & 0x01 != 0),
            // SLL, the undocumented shift that feeds in a 1.
            6 => (v << 1 | 1, v & 0x80 != 0),
            _ => (v >> 1, v & 0x01 != 0),
        };
        self.set_flag(Flags::CARRY, carry);
        self.set_flag(Flags::HALF_CARRY, false);
        self.set_flag(Flags::SUBTRACT, false);
        self.set_flag(Flags::PARITY_OVERFLOW, common::parity_even(r));
        self.adjust_szxy(r);
        r
    }

    fn bit_test(&mut self, bit: u8, v: u8) {
        let set = v & (1 << bit) != 0;
        self.set_flag(Flags::ZERO, !set);
        self.set_flag(Flags::PARITY_OVERFLOW, !set);
        self.set_flag(Flags::SIGN, bit == 7 && set);
        self.set_flag(Flags::HALF_CARRY, true);
        self.set_flag(Flags::SUBTRACT, false);
        self.set_flag(Flags::XF, v & 0x08 != 0);
        self.set_flag(Flags::YF, v & 0x20 != 0);
    }

    /// `(IX+d)` / `(IY+d)` with the displacement fetched from the stream.
    fn fetch_index_addr(&mut self, bus: &mut dyn Bus) -> u16 {
        let d = self.fetch8(bus);
        self.index_val().wrapping_add(common::widen(d))
    }

    /// 16-bit ADC/SBC through HL (ED grid).
    fn adc16_hl(&mut self, v: u16) {
        let c = self.flag(Flags::CARRY);
        let s = crate::alu::add16(self.hl(), v, c);
        self.set_hl(s.result);
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::HALF_CARRY, s.half11);
        self.set_flag(Flags::PARITY_OVERFLOW, s.overflow);
        self.set_flag(Flags::SUBTRACT, false);
        self.set_flag(Flags::SIGN, s.result & 0x8000 != 0);
        self.set_flag(Flags::ZERO, s.result == 0);
        let hi = common::hi(s.result);
        self.set_flag(Flags::XF, hi & 0x08 != 0);
        self.set_flag(Flags::YF, hi & 0x20 != 0);
    }

    fn sbc16_hl(&mut self, v: u16) {
        let c = self.flag(Flags::CARRY);
        let s = crate::alu::sub16(self.hl(), v, c);
        self.set_hl(s.result);
        self.set_flag(Flags::CARRY, s.carry);
        self.set_flag(Flags::HALF_CARRY, s.half11);
        self.set_flag(Flags::PARITY_OVERFLOW, s.overflow);
        self.set_flag(Flags::SUBTRACT, true);
        self.set_flag(Flags::SIGN, s.result & 0x8000 != 0);
        self.set_flag(Flags::ZERO, s.result == 0);
        let hi = common::hi(s.result);
        self.set_flag(Flags::XF, hi & 0x08 != 0);
        self.set_flag(Flags::YF, hi & 0x20 != 0);
    }

    /// IN r,(C) flag rule, shared by the IN grid and the flag-only form.
    fn in_flags(&mut self, v: u8) {
        self.set_flag(Flags::HALF_CARRY, false);
        self.set_flag(Flags::SUBTRACT, false);
        self.set_flag(Flags::PARITY_OVERFLOW, common::parity_even(v));
        self.adjust_szxy(v);
    }

    /// One LDI/LDD transfer. `dir` is +1 or -1.
    fn block_transfer(&mut self, bus: &mut dyn Bus, dir: i16) {
        let hl = self.hl();
        let de = self.de();
        let v = self.read8(bus, hl);
        self.write8(bus, de, v);
        self.set_hl(hl.wrapping_add(dir as u16));
        self.set_de(de.wrapping_add(dir as u16));
        let bc = self.bc().wrapping_sub(1);
        self.set_bc(bc);
        self.set_flag(Flags::HALF_CARRY, false);
        self.set_flag(Flags::SUBTRACT, false);
        self.set_flag(Flags::PARITY_OVERFLOW, bc != 0);
        let n = self.a.wrapping_add(v);
        self.set_flag(Flags::XF, n & 0x08 != 0);
        self.set_flag(Flags::YF, n & 0x02 != 0);
    }

    /// One CPI/CPD comparison.
    fn block_compare(&mut self, bus: &mut dyn Bus, dir: i16) {
        let hl = self.hl();
        let v = self.read8(bus, hl);
        let carry = self.flag(Flags::CARRY);
        self.sub_val(self.a, v, false);
        // CPI leaves C alone.
        self.set_flag(Flags::CARRY, carry);
        self.set_hl(hl.wrapping_add(dir as u16));
        let bc = self.bc().wrapping_sub(1);
        self.set_bc(bc);
        self.set_flag(Flags::PARITY_OVERFLOW, bc != 0);
    }

    /// One INI/IND input.
    fn block_in(&mut self, bus: &mut dyn Bus, dir: i16) {
        let port = self.bc();
        let v = bus.io_read8(port);
        let hl = self.hl();
        self.write8(bus, hl, v);
        self.set_hl(hl.wrapping_add(dir as u16));
        self.b = self.b.wrapping_sub(1);
        let b = self.b;
        self.set_flag(Flags::ZERO, b == 0);
        self.set_flag(Flags::SUBTRACT, true);
    }

    /// One OUTI/OUTD output.
    fn block_out(&mut self, bus: &mut dyn Bus, dir: i16) {
        let hl = self.hl();
        let v = self.read8(bus, hl);
        self.b = self.b.wrapping_sub(1);
        bus.io_write8(self.bc(), v);
        self.set_hl(hl.wrapping_add(dir as u16));
        let b = self.b;
        self.set_flag(Flags::ZERO, b == 0);
        self.set_flag(Flags::SUBTRACT, true);
    }

    /// Rewind to re-execute the repeating block op and charge the
    /// per-iteration extra.
    fn block_repeat(&mut self, op2: u8) {
        self.pc = self.pc.wrapping_sub(2);
        let extra = Self::info().group_timing(GRP_ED, op2).t3;
        self.tick(extra);
    }
}

pub(super) fn bits_prefix(c: &mut CpuZ80, bus: &mut dyn Bus) -> ExecResult {
    let op2 = c.fetch8(bus);
    c.bump_r();
    c.tick(CpuZ80::info().group_timing(GRP_CB, op2).base);
    BITS.exec(c, bus, op2)
}

pub(super) fn extd_prefix(c: &mut CpuZ80, bus: &mut dyn Bus) -> ExecResult {
    let op2 = c.fetch8(bus);
    c.bump_r();
    c.sub_opcode = op2;
    c.tick(CpuZ80::info().group_timing(GRP_ED, op2).base);
    EXTD.exec(c, bus, op2)
}

pub(super) fn index_prefix(c: &mut CpuZ80, bus: &mut dyn Bus, which: IndexReg) -> ExecResult {
    c.idx_sel = Some(which);
    let op2 = c.fetch8(bus);
    c.bump_r();
    c.sub_opcode = op2;
    c.tick(CpuZ80::info().group_timing(GRP_IDX, op2).base);
    INDEXED.exec(c, bus, op2)
}

static BITS: Lazy<OpTable<CpuZ80>> = Lazy::new(build_bits);
static EXTD: Lazy<OpTable<CpuZ80>> = Lazy::new(build_extd);
static INDEXED: Lazy<OpTable<CpuZ80>> = Lazy::new(build_indexed);

fn build_bits() -> OpTable<CpuZ80> {
    let mut t = OpTable::new(CpuZ80::op_undefined);
    for r in 0..8u8 {
        for grp in 0..8u8 {
            t.set(grp << 3 | r, move |c, b| {
                let v = c.reg(b, r);
                let v = c.cb_rot(grp, v);
                c.set_reg(b, r, v);
                Ok(())
            });
        }
        for bit in 0..8u8 {
            t.set(0x40 | bit << 3 | r, move |c, b| {
                let v = c.reg(b, r);
                c.bit_test(bit, v);
                Ok(())
            });
            t.set(0x80 | bit << 3 | r, move |c, b| {
                let v = c.reg(b, r) & !(1 << bit);
                c.set_reg(b, r, v);
                Ok(())
            });
            t.set(0xC0 | bit << 3 | r, move |c, b| {
                let v = c.reg(b, r) | 1 << bit;
                c.set_reg(b, r, v);
                Ok(())
            });
        }
    }
    t
}

/// Unlisted ED encodings are documented to behave as NOPs.
fn extd_nop(c: &mut CpuZ80, _bus: &mut dyn Bus) -> ExecResult {
    log::trace!("z80: ED {:#04X} is a no-op", c.sub_opcode);
    Ok(())
}

#[allow(clippy::too_many_lines)]
fn build_extd() -> OpTable<CpuZ80> {
    let mut t = OpTable::new(extd_nop);

    for r in 0..8u8 {
        t.set(0x40 | r << 3, move |c, b| {
            let v = b.io_read8(c.bc());
            c.in_flags(v);
            if r != REG_M {
                c.set_reg(b, r, v);
            }
            Ok(())
        });
        t.set(0x41 | r << 3, move |c, b| {
            let v = if r == REG_M { 0 } else { c.reg(b, r) };
            b.io_write8(c.bc(), v);
            Ok(())
        });
    }

    for rp in 0..4u8 {
        t.set(0x42 | rp << 4, move |c, _| {
            c.sbc16_hl(c.pair(rp));
            Ok(())
        });
        t.set(0x4A | rp << 4, move |c, _| {
            c.adc16_hl(c.pair(rp));
            Ok(())
        });
        t.set(0x43 | rp << 4, move |c, b| {
            let addr = c.fetch16(b);
            let v = c.pair(rp);
            c.write16(b, addr, v);
            Ok(())
        });
        t.set(0x4B | rp << 4, move |c, b| {
            let addr = c.fetch16(b);
            let v = c.read16(b, addr);
            c.set_pair(rp, v);
            Ok(())
        });
    }

    // NEG and RETN echo through the whole column.
    for op in [0x44u8, 0x4C, 0x54, 0x5C, 0x64, 0x6C, 0x74, 0x7C] {
        t.set(op, |c, _| {
            c.a = c.sub_val(0, c.a, false);
            Ok(())
        });
    }
    let retn = |c: &mut CpuZ80, b: &mut dyn Bus| {
        c.pc = c.pop16(b);
        c.iff1 = c.iff2;
        Ok(())
    };
    for op in [0x45u8, 0x55, 0x5D, 0x65, 0x6D, 0x75, 0x7D] {
        t.set(op, retn);
    }
    t.set(0x4D, retn); // RETI

    for (ops, mode) in [
        ([0x46u8, 0x4E, 0x66, 0x6E], 0u8),
        ([0x56, 0x76, 0x56, 0x76], 1),
        ([0x5E, 0x7E, 0x5E, 0x7E], 2),
    ] {
        for op in ops {
            t.set(op, move |c, _| {
                c.im = mode;
                Ok(())
            });
        }
    }

    t.set(0x47, |c, _| {
        c.i = c.a;
        Ok(())
    });
    t.set(0x4F, |c, _| {
        c.r = c.a;
        Ok(())
    });
    let ld_a_special = |c: &mut CpuZ80, v: u8| {
        c.a = v;
        c.set_flag(Flags::HALF_CARRY, false);
        c.set_flag(Flags::SUBTRACT, false);
        let iff2 = c.iff2;
        c.set_flag(Flags::PARITY_OVERFLOW, iff2);
        c.adjust_szxy(v);
    };
    t.set(0x57, move |c, _| {
        ld_a_special(c, c.i);
        Ok(())
    });
    t.set(0x5F, move |c, _| {
        ld_a_special(c, c.r);
        Ok(())
    });

    // RRD/RLD: BCD nibble rotation through A and (HL).
    t.set(0x67, |c, b| {
        let hl = c.hl();
        let m = c.read8(b, hl);
        let a = c.a;
        c.write8(b, hl, (a & 0x0F) << 4 | m >> 4);
        c.a = (a & 0xF0) | (m & 0x0F);
        let v = c.a;
        c.set_flag(Flags::HALF_CARRY, false);
        c.set_flag(Flags::SUBTRACT, false);
        c.set_flag(Flags::PARITY_OVERFLOW, common::parity_even(v));
        c.adjust_szxy(v);
        Ok(())
    });
    t.set(0x6F, |c, b| {
        let hl = c.hl();
        let m = c.read8(b, hl);
        let a = c.a;
        c.write8(b, hl, m << 4 | (a & 0x0F));
        c.a = (a & 0xF0) | m >> 4;
        let v = c.a;
        c.set_flag(Flags::HALF_CARRY, false);
        c.set_flag(Flags::SUBTRACT, false);
        c.set_flag(Flags::PARITY_OVERFLOW, common::parity_even(v));
        c.adjust_szxy(v);
        Ok(())
    });

    // Block operations.
    t.set(0xA0, |c, b| {
        c.block_transfer(b, 1);
        Ok(())
    });
    t.set(0xA8, |c, b| {
        c.block_transfer(b, -1);
        Ok(())
    });
    t.set(0xB0, |c, b| {
        c.block_transfer(b, 1);
        if c.bc() != 0 {
            c.block_repeat(0xB0);
        }
        Ok(())
    });
    t.set(0xB8, |c, b| {
        c.block_transfer(b, -1);
        if c.bc() != 0 {
            c.block_repeat(0xB8);
        }
        Ok(())
    });
    t.set(0xA1, |c, b| {
        c.block_compare(b, 1);
        Ok(())
    });
    t.set(0xA9, |c, b| {
        c.block_compare(b, -1);
        Ok(())
    });
    t.set(0xB1, |c, b| {
        c.block_compare(b, 1);
        if c.bc() != 0 && !c.flag(Flags::ZERO) {
            c.block_repeat(0xB1);
        }
        Ok(())
    });
    t.set(0xB9, |c, b| {
        c.block_compare(b, -1);
        if c.bc() != 0 && !c.flag(Flags::ZERO) {
            c.block_repeat(0xB9);
        }
        Ok(())
    });
    t.set(0xA2, |c, b| {
        c.block_in(b, 1);
        Ok(())
    });
    t.set(0xAA, |c, b| {
        c.block_in(b, -1);
        Ok(())
    });
    t.set(0xB2, |c, b| {
        c.block_in(b, 1);
        if c.b != 0 {
            c.block_repeat(0xB2);
        }
        Ok(())
    });
    t.set(0xBA, |c, b| {
        c.block_in(b, -1);
        if c.b != 0 {
            c.block_repeat(0xBA);
        }
        Ok(())
    });
    t.set(0xA3, |c, b| {
        c.block_out(b, 1);
        Ok(())
    });
    t.set(0xAB, |c, b| {
        c.block_out(b, -1);
        Ok(())
    });
    t.set(0xB3, |c, b| {
        c.block_out(b, 1);
        if c.b != 0 {
            c.block_repeat(0xB3);
        }
        Ok(())
    });
    t.set(0xBB, |c, b| {
        c.block_out(b, -1);
        if c.b != 0 {
            c.block_repeat(0xBB);
        }
        Ok(())
    });

    t
}

/// A DD/FD prefix in front of an opcode it does not modify simply costs
/// the prefix fetch; the opcode then executes as unprefixed.
fn indexed_fallback(c: &mut CpuZ80, bus: &mut dyn Bus) -> ExecResult {
    let op2 = c.sub_opcode;
    c.tick(CpuZ80::info().timing(op2).base);
    super::ops::TABLE.exec(c, bus, op2)
}

#[allow(clippy::too_many_lines)]
fn build_indexed() -> OpTable<CpuZ80> {
    let mut t = OpTable::new(indexed_fallback);

    t.set(0x21, |c, b| {
        let v = c.fetch16(b);
        c.set_index_val(v);
        Ok(())
    });
    t.set(0x22, |c, b| {
        let addr = c.fetch16(b);
        let v = c.index_val();
        c.write16(b, addr, v);
        Ok(())
    });
    t.set(0x2A, |c, b| {
        let addr = c.fetch16(b);
        let v = c.read16(b, addr);
        c.set_index_val(v);
        Ok(())
    });
    t.set(0x23, |c, _| {
        c.set_index_val(c.index_val().wrapping_add(1));
        Ok(())
    });
    t.set(0x2B, |c, _| {
        c.set_index_val(c.index_val().wrapping_sub(1));
        Ok(())
    });

    // ADD IX,rr with IX standing in for HL in the pair encoding.
    for rp in 0..4u8 {
        t.set(0x09 | rp << 4, move |c, _| {
            let src = if rp == 2 { c.index_val() } else { c.pair(rp) };
            let r = c.add16_flags(c.index_val(), src);
            c.set_index_val(r);
            Ok(())
        });
    }

    t.set(0x34, |c, b| {
        let addr = c.fetch_index_addr(b);
        let v = c.read8(b, addr);
        let v = c.inc8(v);
        c.write8(b, addr, v);
        Ok(())
    });
    t.set(0x35, |c, b| {
        let addr = c.fetch_index_addr(b);
        let v = c.read8(b, addr);
        let v = c.dec8(v);
        c.write8(b, addr, v);
        Ok(())
    });
    t.set(0x36, |c, b| {
        let addr = c.fetch_index_addr(b);
        let v = c.fetch8(b);
        c.write8(b, addr, v);
        Ok(())
    });

    for r in 0..8u8 {
        if r == REG_M {
            continue;
        }
        t.set(0x46 | r << 3, move |c, b| {
            let addr = c.fetch_index_addr(b);
            let v = c.read8(b, addr);
            c.set_reg(b, r, v);
            Ok(())
        });
        t.set(0x70 | r, move |c, b| {
            let addr = c.fetch_index_addr(b);
            let v = c.reg(b, r);
            c.write8(b, addr, v);
            Ok(())
        });
    }

    for op in 0..8u8 {
        t.set(0x86 | op << 3, move |c, b| {
            let addr = c.fetch_index_addr(b);
            let v = c.read8(b, addr);
            c.alu_op(op, v);
            Ok(())
        });
    }

    t.set(0xE1, |c, b| {
        let v = c.pop16(b);
        c.set_index_val(v);
        Ok(())
    });
    t.set(0xE5, |c, b| {
        let v = c.index_val();
        c.push16(b, v);
        Ok(())
    });
    t.set(0xE3, |c, b| {
        let sp = c.sp;
        let mem = c.read16(b, sp);
        let v = c.index_val();
        c.write16(b, sp, v);
        c.set_index_val(mem);
        Ok(())
    });
    t.set(0xE9, |c, _| {
        c.pc = c.index_val();
        Ok(())
    });
    t.set(0xF9, |c, _| {
        c.sp = c.index_val();
        Ok(())
    });

    // DD CB d op: displacement comes before the final opcode byte.
    t.set(0xCB, |c, b| {
        let addr = c.fetch_index_addr(b);
        let op2 = c.fetch8(b);
        let v = c.read8(b, addr);
        match op2 >> 6 {
            0 => {
                let r = c.cb_rot(op2 >> 3 & 7, v);
                c.write8(b, addr, r);
                c.tick(CpuZ80::info().misc("ddcb").base);
            }
            1 => {
                c.bit_test(op2 >> 3 & 7, v);
                c.tick(CpuZ80::info().misc("ddcb.bit").base);
            }
            2 => {
                c.write8(b, addr, v & !(1 << (op2 >> 3 & 7)));
                c.tick(CpuZ80::info().misc("ddcb").base);
            }
            _ => {
                c.write8(b, addr, v | 1 << (op2 >> 3 & 7));
                c.tick(CpuZ80::info().misc("ddcb").base);
            }
        }
        Ok(())
    });

    t
}
