//! Motorola 6809 core.
//!
//! Big-endian, two 8-bit accumulators forming the 16-bit D pair, two
//! stacks (S for the machine, U for the program) and a direct-page
//! register. Interrupts come in three flavours: NMI and IRQ stack the
//! whole machine state, FIRQ only the return address and CC. The E flag
//! records which frame shape is on the stack so RTI can undo either.

mod ops;
mod pages;

use crate::bus::Bus;
use crate::cpu::{Cpu, CpuState, ExecResult};
use crate::info::{self, CpuInfo};
use crate::latch::{EdgeDetectLatch, Trigger};
use crate::snapshot::{self, SnapshotError};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

const ID: &str = "6809";

const SWI3_VECTOR: u16 = 0xFFF2;
const SWI2_VECTOR: u16 = 0xFFF4;
const FIRQ_VECTOR: u16 = 0xFFF6;
const IRQ_VECTOR: u16 = 0xFFF8;
const SWI_VECTOR: u16 = 0xFFFA;
const NMI_VECTOR: u16 = 0xFFFC;
const RESET_VECTOR: u16 = 0xFFFE;

bitflags! {
    /// Condition code register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Flags: u8 {
        const CARRY = 0x01;
        const OVERFLOW = 0x02;
        const ZERO = 0x04;
        const NEGATIVE = 0x08;
        const IRQ_MASK = 0x10;
        const HALF_CARRY = 0x20;
        const FIRQ_MASK = 0x40;
        /// Entire state stacked (vs. the short FIRQ frame).
        const ENTIRE = 0x80;
    }
}

/// What a stopped-clock instruction is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Wait {
    None,
    /// SYNC: resume on any interrupt line, serviced or not.
    Sync,
    /// CWAI: state already stacked, vector without pushing again.
    Cwai,
}

#[derive(Serialize, Deserialize)]
pub struct Cpu6809 {
    pub(crate) a: u8,
    pub(crate) b: u8,
    pub(crate) x: u16,
    pub(crate) y: u16,
    pub(crate) u: u16,
    pub(crate) s: u16,
    pub(crate) pc: u16,
    pub(crate) dp: u8,
    pub(crate) cc: Flags,

    state: CpuState,
    op_ticks: u32,
    current_op: u16,
    opcode: u8,
    sub_opcode: u8,
    wait: Wait,

    irq_line: bool,
    firq_line: bool,
    nmi: EdgeDetectLatch,
    /// The NMI is ignored until the machine stack pointer has been
    /// loaded at least once after reset.
    nmi_armed: bool,
}

impl Default for Cpu6809 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu6809 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            b: 0,
            x: 0,
            y: 0,
            u: 0,
            s: 0,
            pc: 0,
            dp: 0,
            cc: Flags::IRQ_MASK | Flags::FIRQ_MASK,
            state: CpuState::Running,
            op_ticks: 0,
            current_op: 0,
            opcode: 0,
            sub_opcode: 0,
            wait: Wait::None,
            irq_line: false,
            firq_line: false,
            nmi: EdgeDetectLatch::new(Trigger::Negative),
            nmi_armed: false,
        }
    }

    fn info() -> &'static CpuInfo {
        info::m6809()
    }

    pub(crate) fn d(&self) -> u16 {
        common::make_word(self.a, self.b)
    }

    pub(crate) fn set_d(&mut self, v: u16) {
        self.a = common::hi(v);
        self.b = common::lo(v);
    }

    /// Every write to the machine stack pointer arms the NMI.
    pub(crate) fn set_s(&mut self, v: u16) {
        self.s = v;
        self.nmi_armed = true;
    }

    pub(crate) fn flag(&self, f: Flags) -> bool {
        self.cc.contains(f)
    }

    pub(crate) fn set_flag(&mut self, f: Flags, on: bool) {
        self.cc.set(f, on);
    }

    pub(crate) fn adjust_nz8(&mut self, v: u8) {
        self.set_flag(Flags::NEGATIVE, v & 0x80 != 0);
        self.set_flag(Flags::ZERO, v == 0);
    }

    pub(crate) fn adjust_nz16(&mut self, v: u16) {
        self.set_flag(Flags::NEGATIVE, v & 0x8000 != 0);
        self.set_flag(Flags::ZERO, v == 0);
    }

    pub(crate) fn read8(&mut self, bus: &mut dyn Bus, addr: u16) -> u8 {
        bus.read8(u32::from(addr))
    }

    pub(crate) fn write8(&mut self, bus: &mut dyn Bus, addr: u16, v: u8) {
        bus.write8(u32::from(addr), v);
    }

    /// Big-endian word read.
    pub(crate) fn read16(&mut self, bus: &mut dyn Bus, addr: u16) -> u16 {
        let h = self.read8(bus, addr);
        let l = self.read8(bus, addr.wrapping_add(1));
        common::make_word(h, l)
    }

    pub(crate) fn write16(&mut self, bus: &mut dyn Bus, addr: u16, v: u16) {
        self.write8(bus, addr, common::hi(v));
        self.write8(bus, addr.wrapping_add(1), common::lo(v));
    }

    pub(crate) fn fetch8(&mut self, bus: &mut dyn Bus) -> u8 {
        let v = self.read8(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
        v
    }

    pub(crate) fn fetch16(&mut self, bus: &mut dyn Bus) -> u16 {
        let h = self.fetch8(bus);
        let l = self.fetch8(bus);
        common::make_word(h, l)
    }

    // Machine stack (S), used for subroutines and interrupt frames.

    pub(crate) fn push8s(&mut self, bus: &mut dyn Bus, v: u8) {
        self.s = self.s.wrapping_sub(1);
        let addr = self.s;
        self.write8(bus, addr, v);
    }

    pub(crate) fn pop8s(&mut self, bus: &mut dyn Bus) -> u8 {
        let addr = self.s;
        self.s = self.s.wrapping_add(1);
        self.read8(bus, addr)
    }

    pub(crate) fn push16s(&mut self, bus: &mut dyn Bus, v: u16) {
        self.push8s(bus, common::lo(v));
        self.push8s(bus, common::hi(v));
    }

    pub(crate) fn pop16s(&mut self, bus: &mut dyn Bus) -> u16 {
        let h = self.pop8s(bus);
        let l = self.pop8s(bus);
        common::make_word(h, l)
    }

    // User stack (U).

    pub(crate) fn push8u(&mut self, bus: &mut dyn Bus, v: u8) {
        self.u = self.u.wrapping_sub(1);
        let addr = self.u;
        self.write8(bus, addr, v);
    }

    pub(crate) fn pop8u(&mut self, bus: &mut dyn Bus) -> u8 {
        let addr = self.u;
        self.u = self.u.wrapping_add(1);
        self.read8(bus, addr)
    }

    pub(crate) fn tick(&mut self, n: u8) {
        self.op_ticks = self.op_ticks.wrapping_add(u32::from(n));
    }

    pub(crate) fn tick_taken(&mut self) {
        let extra = Self::info().timing(self.opcode).t3;
        self.tick(extra);
    }

    fn halt_for(&mut self, wait: Wait) {
        self.wait = wait;
        self.state = CpuState::Halted;
    }

    /// Push the full machine-state frame: PC, U, Y, X, DP, B, A, CC.
    pub(crate) fn push_entire(&mut self, bus: &mut dyn Bus) {
        let pc = self.pc;
        self.push16s(bus, pc);
        let u = self.u;
        self.push16s(bus, u);
        let y = self.y;
        self.push16s(bus, y);
        let x = self.x;
        self.push16s(bus, x);
        let dp = self.dp;
        self.push8s(bus, dp);
        let b = self.b;
        self.push8s(bus, b);
        let a = self.a;
        self.push8s(bus, a);
        let cc = self.cc.bits();
        self.push8s(bus, cc);
    }

    /// Software interrupts stack everything, then vector. The masks are
    /// only raised for SWI proper.
    pub(crate) fn software_interrupt(&mut self, bus: &mut dyn Bus, vector: u16, mask: Flags) {
        self.set_flag(Flags::ENTIRE, true);
        self.push_entire(bus);
        self.cc |= mask;
        self.pc = self.read16(bus, vector);
    }

    fn dispatch_interrupt(
        &mut self,
        bus: &mut dyn Bus,
        entire: bool,
        vector: u16,
        mask: Flags,
        timing: &str,
    ) {
        if self.wait == Wait::Cwai {
            // CWAI already stacked the full frame with E set.
            self.wait = Wait::None;
        } else if entire {
            self.set_flag(Flags::ENTIRE, true);
            self.push_entire(bus);
        } else {
            self.set_flag(Flags::ENTIRE, false);
            let pc = self.pc;
            self.push16s(bus, pc);
            let cc = self.cc.bits();
            self.push8s(bus, cc);
        }
        self.cc |= mask;
        self.pc = self.read16(bus, vector);
        self.state = CpuState::Running;
        self.tick(Self::info().misc(timing).base);
    }

    fn service_interrupt(&mut self, bus: &mut dyn Bus) {
        // SYNC continues on any line activity, masked or not.
        if self.wait == Wait::Sync
            && (self.nmi.is_latched() || self.firq_line || self.irq_line)
        {
            self.wait = Wait::None;
            self.state = CpuState::Running;
        }
        if self.nmi.is_latched() && self.nmi_armed {
            self.nmi.clear();
            self.dispatch_interrupt(
                bus,
                true,
                NMI_VECTOR,
                Flags::IRQ_MASK | Flags::FIRQ_MASK,
                "nmi",
            );
        } else if self.firq_line && !self.flag(Flags::FIRQ_MASK) {
            self.dispatch_interrupt(
                bus,
                false,
                FIRQ_VECTOR,
                Flags::IRQ_MASK | Flags::FIRQ_MASK,
                "firq",
            );
        } else if self.irq_line && !self.flag(Flags::IRQ_MASK) {
            self.dispatch_interrupt(bus, true, IRQ_VECTOR, Flags::IRQ_MASK, "irq");
        }
    }

    /// Drive the fast interrupt request line.
    pub fn set_firq(&mut self, level: bool) {
        self.firq_line = level;
    }
}

impl Cpu for Cpu6809 {
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
        if self.state == CpuState::Halted {
            self.tick(1);
            self.service_interrupt(bus);
            return true;
        }
        self.current_op = self.pc;
        let opcode = self.fetch8(bus);
        if let Err(fault) = self.exec(bus, opcode) {
            log::error!("6809: {fault}");
            self.state = CpuState::Stopped;
            return false;
        }
        // Interrupts are sampled once, after the instruction retires.
        self.service_interrupt(bus);
        true
    }

    fn exec(&mut self, bus: &mut dyn Bus, opcode: u8) -> ExecResult {
        self.opcode = opcode;
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
