//! ModRM operand decoding and effective-address timing.
//!
//! The EA cost is billed here during resolution; the instruction's own
//! BASE/MEM columns are billed by the dispatcher afterwards.

use super::{Cpu8086, Segment};
use crate::bus::Bus;

/// A decoded ModRM byte with its effective address, when it has one.
#[derive(Debug, Clone, Copy)]
pub(super) struct ModRm {
    pub(super) mode: u8,
    pub(super) reg: u8,
    pub(super) rm: u8,
    offset: u16,
    addr: u32,
}

impl ModRm {
    pub(super) fn is_mem(&self) -> bool {
        self.mode != 3
    }

    pub(super) fn read8(&self, cpu: &mut Cpu8086, bus: &mut dyn Bus) -> u8 {
        if self.is_mem() {
            cpu.read8(bus, self.addr)
        } else {
            cpu.reg8(self.rm)
        }
    }

    pub(super) fn write8(&self, cpu: &mut Cpu8086, bus: &mut dyn Bus, v: u8) {
        if self.is_mem() {
            cpu.write8(bus, self.addr, v);
        } else {
            cpu.set_reg8(self.rm, v);
        }
    }

    pub(super) fn read16(&self, cpu: &mut Cpu8086, bus: &mut dyn Bus) -> u16 {
        if self.is_mem() {
            cpu.read16(bus, self.addr)
        } else {
            cpu.reg16(self.rm)
        }
    }

    pub(super) fn write16(&self, cpu: &mut Cpu8086, bus: &mut dyn Bus, v: u16) {
        if self.is_mem() {
            cpu.write16(bus, self.addr, v);
        } else {
            cpu.set_reg16(self.rm, v);
        }
    }

    /// Offset within the operand's segment. Only meaningful for memory
    /// operands; LEA wants it.
    pub(super) fn offset(&self) -> u16 {
        self.offset
    }

    /// Physical address of the operand. Memory forms only.
    pub(super) fn address(&self) -> u32 {
        self.addr
    }
}

impl Cpu8086 {
    /// Fetch and resolve a ModRM byte, billing the EA cycles and
    /// recording whether the operand lives in memory.
    pub(super) fn fetch_modrm(&mut self, bus: &mut dyn Bus) -> ModRm {
        let byte = self.fetch8(bus);
        let mode = byte >> 6;
        let reg = (byte >> 3) & 7;
        let rm = byte & 7;
        if mode == 3 {
            return ModRm {
                mode,
                reg,
                rm,
                offset: 0,
                addr: 0,
            };
        }
        self.operand_is_mem = true;

        let disp: u16 = match mode {
            1 => common::widen(self.fetch8(bus)),
            2 => self.fetch16(bus),
            _ => 0,
        };

        let info = Self::info();
        let (offset, default_seg) = match rm {
            0 => {
                self.tick(info.misc("ea.index.lo").base);
                (self.bx.wrapping_add(self.si), Segment::Ds)
            }
            1 => {
                self.tick(info.misc("ea.index.hi").base);
                (self.bx.wrapping_add(self.di), Segment::Ds)
            }
            2 => {
                self.tick(info.misc("ea.index.hi").base);
                (self.bp.wrapping_add(self.si), Segment::Ss)
            }
            3 => {
                self.tick(info.misc("ea.index.lo").base);
                (self.bp.wrapping_add(self.di), Segment::Ss)
            }
            4 => {
                self.tick(info.misc("ea.base").base);
                (self.si, Segment::Ds)
            }
            5 => {
                self.tick(info.misc("ea.base").base);
                (self.di, Segment::Ds)
            }
            6 => {
                if mode == 0 {
                    // Direct 16-bit address instead of [BP].
                    self.tick(info.misc("ea.direct").base);
                    let direct = self.fetch16(bus);
                    let seg = self.data_seg(Segment::Ds);
                    return ModRm {
                        mode,
                        reg,
                        rm,
                        offset: direct,
                        addr: Self::physical(seg, direct),
                    };
                }
                self.tick(info.misc("ea.base").base);
                (self.bp, Segment::Ss)
            }
            _ => {
                self.tick(info.misc("ea.base").base);
                (self.bx, Segment::Ds)
            }
        };
        if mode != 0 {
            self.tick(info.misc("ea.disp").base);
        }
        let seg = self.data_seg(default_seg);
        let offset = offset.wrapping_add(disp);
        ModRm {
            mode,
            reg,
            rm,
            offset,
            addr: Self::physical(seg, offset),
        }
    }
}
