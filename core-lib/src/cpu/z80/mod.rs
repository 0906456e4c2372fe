//! Zilog Z80 core.
//!
//! A superset of the 8080 in spirit but with its own flag semantics
//! (N/H bookkeeping, overflow in P/V), shadow register file, two index
//! registers reached through the DD/FD prefixes, and three interrupt
//! modes. The main dispatch table covers the unprefixed set; CB, ED and
//! DD/FD route through their own tables (see `prefix`).

mod ops;
mod prefix;
#[cfg(test)]
mod tests;

use crate::bus::Bus;
use crate::cpu::{Cpu, CpuState, ExecResult, Fault};
use crate::info::{self, CpuInfo};
use crate::latch::{EdgeDetectLatch, Trigger};
use crate::snapshot::{self, SnapshotError};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

const ID: &str = "z80";

const NMI_VECTOR: u16 = 0x0066;
const IM1_VECTOR: u16 = 0x0038;

bitflags! {
    /// Z80 flags. All eight bits are architecturally visible; bits 3
    /// and 5 shadow the result's bits 3 and 5.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Flags: u8 {
        const CARRY = 0b0000_0001;
        const SUBTRACT = 0b0000_0010;
        const PARITY_OVERFLOW = 0b0000_0100;
        const XF = 0b0000_1000;
        const HALF_CARRY = 0b0001_0000;
        const YF = 0b0010_0000;
        const ZERO = 0b0100_0000;
        const SIGN = 0b1000_0000;
    }
}

/// Which index register a DD/FD prefix selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum IndexReg {
    Ix,
    Iy,
}

#[derive(Serialize, Deserialize)]
pub struct CpuZ80 {
    pub(crate) a: u8,
    pub(crate) f: Flags,
    pub(crate) b: u8,
    pub(crate) c: u8,
    pub(crate) d: u8,
    pub(crate) e: u8,
    pub(crate) h: u8,
    pub(crate) l: u8,

    // Shadow set, reached through EX AF,AF' and EXX.
    pub(crate) a2: u8,
    pub(crate) f2: Flags,
    pub(crate) b2: u8,
    pub(crate) c2: u8,
    pub(crate) d2: u8,
    pub(crate) e2: u8,
    pub(crate) h2: u8,
    pub(crate) l2: u8,

    pub(crate) ix: u16,
    pub(crate) iy: u16,
    pub(crate) sp: u16,
    pub(crate) pc: u16,

    /// Interrupt page and refresh registers.
    pub(crate) i: u8,
    pub(crate) r: u8,

    pub(crate) iff1: bool,
    pub(crate) iff2: bool,
    pub(crate) im: u8,

    state: CpuState,
    op_ticks: u32,
    current_op: u16,
    opcode: u8,
    /// Second opcode byte of the active prefixed instruction.
    sub_opcode: u8,
    /// Index register selected by the active DD/FD prefix, if any.
    idx_sel: Option<IndexReg>,

    int_line: bool,
    /// Byte the interrupting device drives on the bus (IM 2 vector low).
    int_data: u8,
    nmi: EdgeDetectLatch,
}

impl Default for CpuZ80 {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuZ80 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0xFF,
            f: Flags::all(),
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            a2: 0xFF,
            f2: Flags::all(),
            b2: 0,
            c2: 0,
            d2: 0,
            e2: 0,
            h2: 0,
            l2: 0,
            ix: 0xFFFF,
            iy: 0xFFFF,
            sp: 0xFFFF,
            pc: 0,
            i: 0,
            r: 0,
            iff1: false,
            iff2: false,
            im: 0,
            state: CpuState::Running,
            op_ticks: 0,
            current_op: 0,
            opcode: 0,
            sub_opcode: 0,
            idx_sel: None,
            int_line: false,
            int_data: 0xFF,
            nmi: EdgeDetectLatch::new(Trigger::Negative),
        }
    }

    fn info() -> &'static CpuInfo {
        info::z80()
    }

    // Pairs.

    pub(crate) fn bc(&self) -> u16 {
        common::make_word(self.b, self.c)
    }
    pub(crate) fn set_bc(&mut self, v: u16) {
        self.b = common::hi(v);
        self.c = common::lo(v);
    }
    pub(crate) fn de(&self) -> u16 {
        common::make_word(self.d, self.e)
    }
    pub(crate) fn set_de(&mut self, v: u16) {
        self.d = common::hi(v);
        self.e = common::lo(v);
    }
    pub(crate) fn hl(&self) -> u16 {
        common::make_word(self.h, self.l)
    }
    pub(crate) fn set_hl(&mut self, v: u16) {
        self.h = common::hi(v);
        self.l = common::lo(v);
    }
    pub(crate) fn af(&self) -> u16 {
        common::make_word(self.a, self.f.bits())
    }
    pub(crate) fn set_af(&mut self, v: u16) {
        self.a = common::hi(v);
        self.f = Flags::from_bits_retain(common::lo(v));
    }

    pub(crate) fn flag(&self, f: Flags) -> bool {
        self.f.contains(f)
    }

    pub(crate) fn set_flag(&mut self, f: Flags, on: bool) {
        self.f.set(f, on);
    }

    /// The index register named by the active prefix (IX when none, which
    /// only the prefix table reaches).
    pub(crate) fn index_val(&self) -> u16 {
        match self.idx_sel {
            Some(IndexReg::Iy) => self.iy,
            _ => self.ix,
        }
    }

    pub(crate) fn set_index_val(&mut self, v: u16) {
        match self.idx_sel {
            Some(IndexReg::Iy) => self.iy = v,
            _ => self.ix = v,
        }
    }

    // Bus access.

    pub(crate) fn read8(&mut self, bus: &mut dyn Bus, addr: u16) -> u8 {
        bus.read8(u32::from(addr))
    }

    pub(crate) fn write8(&mut self, bus: &mut dyn Bus, addr: u16, v: u8) {
        bus.write8(u32::from(addr), v);
    }

    pub(crate) fn read16(&mut self, bus: &mut dyn Bus, addr: u16) -> u16 {
        let l = self.read8(bus, addr);
        let h = self.read8(bus, addr.wrapping_add(1));
        common::make_word(h, l)
    }

    pub(crate) fn write16(&mut self, bus: &mut dyn Bus, addr: u16, v: u16) {
        self.write8(bus, addr, common::lo(v));
        self.write8(bus, addr.wrapping_add(1), common::hi(v));
    }

    pub(crate) fn fetch8(&mut self, bus: &mut dyn Bus) -> u8 {
        let v = self.read8(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
        v
    }

    pub(crate) fn fetch16(&mut self, bus: &mut dyn Bus) -> u16 {
        let l = self.fetch8(bus);
        let h = self.fetch8(bus);
        common::make_word(h, l)
    }

    pub(crate) fn push16(&mut self, bus: &mut dyn Bus, v: u16) {
        self.sp = self.sp.wrapping_sub(1);
        self.write8(bus, self.sp, common::hi(v));
        self.sp = self.sp.wrapping_sub(1);
        self.write8(bus, self.sp, common::lo(v));
    }

    pub(crate) fn pop16(&mut self, bus: &mut dyn Bus) -> u16 {
        let l = self.read8(bus, self.sp);
        self.sp = self.sp.wrapping_add(1);
        let h = self.read8(bus, self.sp);
        self.sp = self.sp.wrapping_add(1);
        common::make_word(h, l)
    }

    pub(crate) fn tick(&mut self, n: u8) {
        self.op_ticks = self.op_ticks.wrapping_add(u32::from(n));
    }

    pub(crate) fn tick_taken(&mut self) {
        let extra = Self::info().timing(self.opcode).t3;
        self.tick(extra);
    }

    pub(crate) fn halt(&mut self) {
        self.state = CpuState::Halted;
    }

    /// Refresh counter: incremented on every opcode fetch (prefix bytes
    /// included), bit 7 untouched.
    pub(crate) fn bump_r(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }

    pub(crate) fn set_iff(&mut self, on: bool) {
        self.iff1 = on;
        self.iff2 = on;
    }

    /// Drive INT and the byte the device will answer the acknowledge
    /// cycle with (the IM 2 vector low byte).
    pub fn set_irq_data(&mut self, level: bool, data: u8) {
        self.int_line = level;
        self.int_data = data;
    }

    fn wake(&mut self) {
        if self.state == CpuState::Halted {
            self.state = CpuState::Running;
        }
    }

    fn service_interrupt(&mut self, bus: &mut dyn Bus) -> ExecResult {
        if self.nmi.is_latched() {
            self.nmi.clear();
            self.wake();
            self.iff2 = self.iff1;
            self.iff1 = false;
            let pc = self.pc;
            self.push16(bus, pc);
            self.pc = NMI_VECTOR;
            self.tick(Self::info().misc("nmi").base);
            return Ok(());
        }
        if !self.int_line || !self.iff1 || self.opcode == 0xFB {
            return Ok(());
        }
        self.wake();
        self.set_iff(false);
        let pc = self.pc;
        match self.im {
            1 => {
                self.push16(bus, pc);
                self.pc = IM1_VECTOR;
                self.tick(Self::info().misc("irq").base);
            }
            2 => {
                self.push16(bus, pc);
                let table = common::make_word(self.i, self.int_data);
                self.pc = self.read16(bus, table);
                self.tick(Self::info().misc("irq.im2").base);
            }
            _ => {
                // IM 0 executes an instruction the device jams on the
                // bus; nothing here models that acknowledge cycle.
                return Err(Fault::Unsupported {
                    addr: u32::from(pc),
                    what: "interrupt mode 0 service",
                });
            }
        }
        Ok(())
    }
}

impl Cpu for CpuZ80 {
    fn id(&self) -> &'static str {
        ID
    }

    fn reset(&mut self, _bus: &mut dyn Bus) {
        *self = Self::new();
    }

    fn step(&mut self, bus: &mut dyn Bus) -> bool {
        if self.state == CpuState::Stopped {
            return false;
        }
        self.op_ticks = 0;
        if self.state == CpuState::Halted {
            // Halted cores keep fetching NOPs internally.
            self.bump_r();
            self.tick(4);
        } else {
            self.current_op = self.pc;
            let opcode = self.fetch8(bus);
            self.bump_r();
            if let Err(fault) = self.exec(bus, opcode) {
                log::error!("z80: {fault}");
                self.state = CpuState::Stopped;
                return false;
            }
        }
        // Interrupts are sampled once, after the instruction retires.
        if let Err(fault) = self.service_interrupt(bus) {
            log::error!("z80: {fault}");
            self.state = CpuState::Stopped;
            return false;
        }
        true
    }

    fn exec(&mut self, bus: &mut dyn Bus, opcode: u8) -> ExecResult {
        self.opcode = opcode;
        self.idx_sel = None;
        self.tick(Self::info().timing(opcode).base);
        ops::TABLE.exec(self, bus, opcode)
    }

    fn state(&self) -> CpuState {
        self.state
    }

    fn instruction_ticks(&self) -> u32 {
        self.op_ticks
    }

    fn current_address(&self) -> u32 {
        u32::from(self.current_op)
    }

    fn set_irq(&mut self, level: bool) {
        self.int_line = level;
    }

    fn set_nmi(&mut self, level: bool) {
        self.nmi.set(level);
    }

    fn snapshot(&self) -> Result<serde_json::Value, SnapshotError> {
        snapshot::save(ID, self)
    }

    fn restore(&mut self, from: &serde_json::Value) -> Result<(), SnapshotError> {
        *self = snapshot::restore(ID, from)?;
        Ok(())
    }
}
