//! MOS 6502 core.
//!
//! Eight-bit accumulator machine with a fixed page-one stack, BCD
//! arithmetic behind the D flag, and three vectors at the top of the
//! address space. Indexed addressing charges an extra cycle when the
//! effective address crosses a page, which the resolvers record in a
//! side channel for the handlers to bill.

mod ops;
#[cfg(test)]
mod tests;

use crate::bus::Bus;
use crate::cpu::{Cpu, CpuState, ExecResult};
use crate::info::{self, CpuInfo};
use crate::latch::{EdgeDetectLatch, Trigger};
use crate::snapshot::{self, SnapshotError};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

const ID: &str = "6502";

const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

const STACK_PAGE: u16 = 0x0100;

bitflags! {
    /// Processor status. Bit 5 always reads as 1; B only exists on the
    /// stack copy pushed by BRK/PHP.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Flags: u8 {
        const CARRY = 0b0000_0001;
        const ZERO = 0b0000_0010;
        const IRQ_DISABLE = 0b0000_0100;
        const DECIMAL = 0b0000_1000;
        const BREAK = 0b0001_0000;
        const RESERVED = 0b0010_0000;
        const OVERFLOW = 0b0100_0000;
        const NEGATIVE = 0b1000_0000;
    }
}

#[derive(Serialize, Deserialize)]
pub struct Cpu6502 {
    pub(crate) a: u8,
    pub(crate) x: u8,
    pub(crate) y: u8,
    pub(crate) sp: u8,
    pub(crate) pc: u16,
    pub(crate) f: Flags,

    state: CpuState,
    op_ticks: u32,
    current_op: u16,
    opcode: u8,
    /// Set by the indexed addressing resolvers when the effective
    /// address crossed a page.
    page_crossed: bool,

    irq_line: bool,
    nmi: EdgeDetectLatch,
}

impl Default for Cpu6502 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu6502 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
            f: Flags::RESERVED | Flags::IRQ_DISABLE,
            state: CpuState::Running,
            op_ticks: 0,
            current_op: 0,
            opcode: 0,
            page_crossed: false,
            irq_line: false,
            nmi: EdgeDetectLatch::new(Trigger::Negative),
        }
    }

    fn info() -> &'static CpuInfo {
        info::mos6502()
    }

    pub(crate) fn flag(&self, f: Flags) -> bool {
        self.f.contains(f)
    }

    pub(crate) fn set_flag(&mut self, f: Flags, on: bool) {
        self.f.set(f, on);
    }

    pub(crate) fn adjust_nz(&mut self, v: u8) {
        self.set_flag(Flags::NEGATIVE, v & 0x80 != 0);
        self.set_flag(Flags::ZERO, v == 0);
    }

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

    pub(crate) fn push8(&mut self, bus: &mut dyn Bus, v: u8) {
        let addr = STACK_PAGE + u16::from(self.sp);
        self.write8(bus, addr, v);
        self.sp = self.sp.wrapping_sub(1);
    }

    pub(crate) fn pop8(&mut self, bus: &mut dyn Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        let addr = STACK_PAGE + u16::from(self.sp);
        self.read8(bus, addr)
    }

    pub(crate) fn push16(&mut self, bus: &mut dyn Bus, v: u16) {
        self.push8(bus, common::hi(v));
        self.push8(bus, common::lo(v));
    }

    pub(crate) fn pop16(&mut self, bus: &mut dyn Bus) -> u16 {
        let l = self.pop8(bus);
        let h = self.pop8(bus);
        common::make_word(h, l)
    }

    pub(crate) fn tick(&mut self, n: u8) {
        self.op_ticks = self.op_ticks.wrapping_add(u32::from(n));
    }

    /// Bill the page-cross penalty for the current opcode, if the
    /// resolver flagged one.
    pub(crate) fn charge_page_cross(&mut self) {
        if self.page_crossed {
            let extra = Self::info().timing(self.opcode).t3;
            self.tick(extra);
        }
    }

    /// Branch bookkeeping: taken costs t3, a taken branch across a page
    /// costs t4 on top.
    pub(crate) fn branch(&mut self, bus: &mut dyn Bus, taken: bool) {
        let d = self.fetch8(bus);
        if taken {
            let timing = Self::info().timing(self.opcode);
            self.tick(timing.t3);
            let target = self.pc.wrapping_add(common::widen(d));
            if common::hi(target) != common::hi(self.pc) {
                self.tick(timing.t4);
            }
            self.pc = target;
        }
    }

    fn interrupt(&mut self, bus: &mut dyn Bus, vector: u16) {
        let pc = self.pc;
        self.push16(bus, pc);
        // The stacked copy has B clear for hardware interrupts.
        let flags = (self.f | Flags::RESERVED) - Flags::BREAK;
        self.push8(bus, flags.bits());
        self.set_flag(Flags::IRQ_DISABLE, true);
        self.pc = self.read16(bus, vector);
        self.tick(Self::info().misc("irq").base);
    }

    fn service_interrupt(&mut self, bus: &mut dyn Bus) {
        if self.nmi.is_latched() {
            self.nmi.clear();
            self.interrupt(bus, NMI_VECTOR);
        } else if self.irq_line && !self.flag(Flags::IRQ_DISABLE) {
            self.interrupt(bus, IRQ_VECTOR);
        }
    }
}

impl Cpu for Cpu6502 {
    fn id(&self) -> &'static str {
        ID
    }

    fn reset(&mut self, bus: &mut dyn Bus) {
        *self = Self::new();
        self.pc = self.read16(bus, RESET_VECTOR);
    }

    fn step(&mut self, bus: &mut dyn Bus) -> bool {
        if self.state == CpuState::Stopped {
            return false;
        }
        self.op_ticks = 0;
        self.current_op = self.pc;
        let opcode = self.fetch8(bus);
        if let Err(fault) = self.exec(bus, opcode) {
            log::error!("6502: {fault}");
            self.state = CpuState::Stopped;
            return false;
        }
        // Interrupts are sampled once, after the instruction retires.
        self.service_interrupt(bus);
        true
    }

    fn exec(&mut self, bus: &mut dyn Bus, opcode: u8) -> ExecResult {
        self.opcode = opcode;
        self.page_crossed = false;
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
        self.irq_line = level;
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
