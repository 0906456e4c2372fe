//! Intel 8086 core.
//!
//! Segmented 20-bit addressing, ModRM operand encoding, and a vector
//! table at the bottom of memory. Register halves (AL/AH and friends)
//! are views over 16-bit backing registers. Operand-form timing uses the
//! metadata's MEM column when ModRM resolved to memory, plus the
//! effective-address cost billed during resolution.

mod modrm;
mod ops;

use crate::bus::Bus;
use crate::cpu::{Cpu, CpuState, ExecResult};
use crate::info::{self, CpuInfo};
use crate::latch::{EdgeDetectLatch, Trigger};
use crate::snapshot::{self, SnapshotError};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

const ID: &str = "8086";

const ADDRESS_MASK: u32 = 0xF_FFFF;

// Dedicated vectors.
const VEC_DIVIDE: u8 = 0;
const VEC_TRAP: u8 = 1;
const VEC_NMI: u8 = 2;
const VEC_BREAKPOINT: u8 = 3;
const VEC_OVERFLOW: u8 = 4;

bitflags! {
    /// FLAGS register. Bit 1 reads set; bits 12-15 read set on the 8086.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Flags: u16 {
        const CARRY = 0x0001;
        const RESERVED_ON = 0x0002;
        const PARITY = 0x0004;
        const AUX_CARRY = 0x0010;
        const ZERO = 0x0040;
        const SIGN = 0x0080;
        const TRAP = 0x0100;
        const INTERRUPT = 0x0200;
        const DIRECTION = 0x0400;
        const OVERFLOW = 0x0800;
        const RESERVED_HIGH = 0xF000;
    }
}

/// Segment registers by ModRM/sreg encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Segment {
    Es,
    Cs,
    Ss,
    Ds,
}

/// Active repeat prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Rep {
    /// REPNE/REPNZ.
    NotEqual,
    /// REP/REPE/REPZ.
    Equal,
}

#[derive(Serialize, Deserialize)]
pub struct Cpu8086 {
    pub(crate) ax: u16,
    pub(crate) bx: u16,
    pub(crate) cx: u16,
    pub(crate) dx: u16,
    pub(crate) si: u16,
    pub(crate) di: u16,
    pub(crate) bp: u16,
    pub(crate) sp: u16,
    pub(crate) ip: u16,
    pub(crate) cs: u16,
    pub(crate) ds: u16,
    pub(crate) es: u16,
    pub(crate) ss: u16,
    pub(crate) f: Flags,

    state: CpuState,
    op_ticks: u32,
    current_op: u32,
    opcode: u8,
    /// ModRM resolved to a memory operand this instruction.
    operand_is_mem: bool,
    seg_override: Option<Segment>,
    rep: Option<Rep>,

    intr_line: bool,
    intr_vector: u8,
    nmi: EdgeDetectLatch,
}

impl Default for Cpu8086 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu8086 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ax: 0,
            bx: 0,
            cx: 0,
            dx: 0,
            si: 0,
            di: 0,
            bp: 0,
            sp: 0,
            ip: 0,
            cs: 0xFFFF,
            ds: 0,
            es: 0,
            ss: 0,
            f: Flags::RESERVED_ON | Flags::RESERVED_HIGH,
            state: CpuState::Running,
            op_ticks: 0,
            current_op: 0xF_FFF0,
            opcode: 0,
            operand_is_mem: false,
            seg_override: None,
            rep: None,
            intr_line: false,
            intr_vector: 8,
            nmi: EdgeDetectLatch::new(Trigger::Positive),
        }
    }

    fn info() -> &'static CpuInfo {
        info::i8086()
    }

    // Byte views over the general registers.

    pub(crate) fn al(&self) -> u8 {
        common::lo(self.ax)
    }
    pub(crate) fn set_al(&mut self, v: u8) {
        self.ax = common::set_lo(self.ax, v);
    }
    pub(crate) fn ah(&self) -> u8 {
        common::hi(self.ax)
    }
    pub(crate) fn set_ah(&mut self, v: u8) {
        self.ax = common::set_hi(self.ax, v);
    }
    pub(crate) fn cl(&self) -> u8 {
        common::lo(self.cx)
    }

    /// 8-bit register by encoding: AL CL DL BL AH CH DH BH.
    pub(crate) fn reg8(&self, idx: u8) -> u8 {
        let word = match idx & 3 {
            0 => self.ax,
            1 => self.cx,
            2 => self.dx,
            _ => self.bx,
        };
        if idx & 4 == 0 {
            common::lo(word)
        } else {
            common::hi(word)
        }
    }

    pub(crate) fn set_reg8(&mut self, idx: u8, v: u8) {
        let word = match idx & 3 {
            0 => &mut self.ax,
            1 => &mut self.cx,
            2 => &mut self.dx,
            _ => &mut self.bx,
        };
        *word = if idx & 4 == 0 {
            common::set_lo(*word, v)
        } else {
            common::set_hi(*word, v)
        };
    }

    /// 16-bit register by encoding: AX CX DX BX SP BP SI DI.
    pub(crate) fn reg16(&self, idx: u8) -> u16 {
        match idx & 7 {
            0 => self.ax,
            1 => self.cx,
            2 => self.dx,
            3 => self.bx,
            4 => self.sp,
            5 => self.bp,
            6 => self.si,
            _ => self.di,
        }
    }

    pub(crate) fn set_reg16(&mut self, idx: u8, v: u16) {
        match idx & 7 {
            0 => self.ax = v,
            1 => self.cx = v,
            2 => self.dx = v,
            3 => self.bx = v,
            4 => self.sp = v,
            5 => self.bp = v,
            6 => self.si = v,
            _ => self.di = v,
        }
    }

    pub(crate) fn sreg(&self, idx: u8) -> u16 {
        match idx & 3 {
            0 => self.es,
            1 => self.cs,
            2 => self.ss,
            _ => self.ds,
        }
    }

    pub(crate) fn set_sreg(&mut self, idx: u8, v: u16) {
        match idx & 3 {
            0 => self.es = v,
            1 => self.cs = v,
            2 => self.ss = v,
            _ => self.ds = v,
        }
    }

    pub(crate) fn seg_value(&self, seg: Segment) -> u16 {
        match seg {
            Segment::Es => self.es,
            Segment::Cs => self.cs,
            Segment::Ss => self.ss,
            Segment::Ds => self.ds,
        }
    }

    /// Data segment for an access, honoring an active override.
    pub(crate) fn data_seg(&self, default: Segment) -> u16 {
        self.seg_value(self.seg_override.unwrap_or(default))
    }

    /// 20-bit physical address.
    pub(crate) fn physical(seg: u16, offset: u16) -> u32 {
        ((u32::from(seg) << 4) + u32::from(offset)) & ADDRESS_MASK
    }

    pub(crate) fn flag(&self, f: Flags) -> bool {
        self.f.contains(f)
    }

    pub(crate) fn set_flag(&mut self, f: Flags, on: bool) {
        self.f.set(f, on);
    }

    pub(crate) fn flags_word(&self) -> u16 {
        (self.f | Flags::RESERVED_ON | Flags::RESERVED_HIGH).bits()
    }

    pub(crate) fn set_flags_word(&mut self, v: u16) {
        self.f = Flags::from_bits_truncate(v) | Flags::RESERVED_ON | Flags::RESERVED_HIGH;
    }

    // Bus access.

    pub(crate) fn read8(&mut self, bus: &mut dyn Bus, addr: u32) -> u8 {
        bus.read8(addr & ADDRESS_MASK)
    }

    pub(crate) fn write8(&mut self, bus: &mut dyn Bus, addr: u32, v: u8) {
        bus.write8(addr & ADDRESS_MASK, v);
    }

    pub(crate) fn read16(&mut self, bus: &mut dyn Bus, addr: u32) -> u16 {
        let l = self.read8(bus, addr);
        let h = self.read8(bus, addr.wrapping_add(1));
        common::make_word(h, l)
    }

    pub(crate) fn write16(&mut self, bus: &mut dyn Bus, addr: u32, v: u16) {
        self.write8(bus, addr, common::lo(v));
        self.write8(bus, addr.wrapping_add(1), common::hi(v));
    }

    pub(crate) fn fetch8(&mut self, bus: &mut dyn Bus) -> u8 {
        let addr = Self::physical(self.cs, self.ip);
        self.ip = self.ip.wrapping_add(1);
        self.read8(bus, addr)
    }

    pub(crate) fn fetch16(&mut self, bus: &mut dyn Bus) -> u16 {
        let l = self.fetch8(bus);
        let h = self.fetch8(bus);
        common::make_word(h, l)
    }

    pub(crate) fn push16(&mut self, bus: &mut dyn Bus, v: u16) {
        self.sp = self.sp.wrapping_sub(2);
        let addr = Self::physical(self.ss, self.sp);
        self.write16(bus, addr, v);
    }

    pub(crate) fn pop16(&mut self, bus: &mut dyn Bus) -> u16 {
        let addr = Self::physical(self.ss, self.sp);
        self.sp = self.sp.wrapping_add(2);
        self.read16(bus, addr)
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

    /// Drive INTR with the vector the interrupt controller will supply.
    pub fn set_irq_vector(&mut self, level: bool, vector: u8) {
        self.intr_line = level;
        self.intr_vector = vector;
    }

    /// Software/hardware interrupt entry: flags, CS, IP on the stack,
    /// then the far pointer from the vector table.
    pub(crate) fn interrupt(&mut self, bus: &mut dyn Bus, vector: u8) {
        let flags = self.flags_word();
        self.push16(bus, flags);
        self.set_flag(Flags::INTERRUPT, false);
        self.set_flag(Flags::TRAP, false);
        let cs = self.cs;
        let ip = self.ip;
        self.push16(bus, cs);
        self.push16(bus, ip);
        let base = u32::from(vector) * 4;
        self.ip = self.read16(bus, base);
        self.cs = self.read16(bus, base + 2);
        self.tick(Self::info().misc("int").base);
    }

    fn service_interrupt(&mut self, bus: &mut dyn Bus) {
        if self.nmi.is_latched() {
            self.nmi.clear();
            if self.state == CpuState::Halted {
                self.state = CpuState::Running;
            }
            self.interrupt(bus, VEC_NMI);
            return;
        }
        if !self.intr_line || !self.flag(Flags::INTERRUPT) {
            return;
        }
        // STI enables interrupts after the following instruction.
        if self.opcode == 0xFB {
            return;
        }
        if self.state == CpuState::Halted {
            self.state = CpuState::Running;
        }
        let vector = self.intr_vector;
        self.interrupt(bus, vector);
    }
}

impl Cpu for Cpu8086 {
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
            self.tick(2);
            self.service_interrupt(bus);
            return true;
        }
        let trap_armed = self.flag(Flags::TRAP);
        self.current_op = Self::physical(self.cs, self.ip);
        let opcode = self.fetch8(bus);
        if let Err(fault) = self.exec(bus, opcode) {
            log::error!("8086: {fault}");
            self.state = CpuState::Stopped;
            return false;
        }
        // Single-step trap fires after the instruction completes, then
        // the external lines are sampled once.
        if trap_armed && self.flag(Flags::TRAP) {
            self.interrupt(bus, VEC_TRAP);
        }
        self.service_interrupt(bus);
        true
    }

    fn exec(&mut self, bus: &mut dyn Bus, opcode: u8) -> ExecResult {
        self.opcode = opcode;
        self.operand_is_mem = false;
        let result = ops::TABLE.exec(self, bus, opcode);
        // Operand-form timing: MEM column when ModRM hit memory.
        let t = Self::info().timing(self.opcode);
        let base = if self.operand_is_mem && t.mem != 0 {
            t.mem
        } else {
            t.base
        };
        self.tick(base);
        self.seg_override = None;
        self.rep = None;
        result
    }

    fn state(&self) -> CpuState {
        self.state
    }

    fn instruction_ticks(&self) -> u32 {
        self.op_ticks
    }

    fn current_address(&self) -> u32 {
        self.current_op
    }

    fn set_irq(&mut self, level: bool) {
        self.intr_line = level;
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
