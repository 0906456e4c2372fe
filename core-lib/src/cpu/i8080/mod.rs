//! Intel 8080 core.
//!
//! Little-endian, 16-bit address space, level-sensitive INT pin. The
//! interrupting device supplies a restart number (RST 0-7) with the
//! request, which is the common hardware arrangement.

mod ops;
#[cfg(test)]
mod tests;

use crate::bus::Bus;
use crate::cpu::{Cpu, CpuState, ExecResult};
use crate::info::{self, CpuInfo};
use crate::snapshot::{self, SnapshotError};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

const ID: &str = "8080";

bitflags! {
    /// 8080 PSW flags. Bit 1 reads as 1, bits 3 and 5 as 0, always.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Flags: u8 {
        const CARRY = 0b0000_0001;
        const RESERVED_ON = 0b0000_0010;
        const PARITY = 0b0000_0100;
        const AUX_CARRY = 0b0001_0000;
        const ZERO = 0b0100_0000;
        const SIGN = 0b1000_0000;
    }
}

#[derive(Serialize, Deserialize)]
pub struct Cpu8080 {
    pub(crate) a: u8,
    pub(crate) f: Flags,
    pub(crate) b: u8,
    pub(crate) c: u8,
    pub(crate) d: u8,
    pub(crate) e: u8,
    pub(crate) h: u8,
    pub(crate) l: u8,
    pub(crate) sp: u16,
    pub(crate) pc: u16,

    state: CpuState,
    op_ticks: u32,
    current_op: u16,
    /// Last executed opcode; interrupts are held off for one instruction
    /// after EI, which this makes visible.
    opcode: u8,
    interrupts_enabled: bool,
    int_line: bool,
    int_vector: u8,
}

impl Default for Cpu8080 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu8080 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            f: Flags::RESERVED_ON,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            sp: 0,
            pc: 0,
            state: CpuState::Running,
            op_ticks: 0,
            current_op: 0,
            opcode: 0,
            interrupts_enabled: false,
            int_line: false,
            int_vector: 7,
        }
    }

    fn info() -> &'static CpuInfo {
        info::i8080()
    }

    // Register pairs.

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

    /// PSW flag byte with the fixed bits forced.
    pub(crate) fn flags(&self) -> u8 {
        (self.f | Flags::RESERVED_ON).bits()
    }

    /// Load the flag byte, masking the bits the register cannot hold.
    pub(crate) fn set_flags(&mut self, v: u8) {
        self.f = Flags::from_bits_truncate(v) | Flags::RESERVED_ON;
    }

    pub(crate) fn flag(&self, f: Flags) -> bool {
        self.f.contains(f)
    }

    pub(crate) fn set_flag(&mut self, f: Flags, on: bool) {
        self.f.set(f, on);
    }

    // Bus access. The 8080 never forms an address above 0xFFFF.

    pub(crate) fn read8(&mut self, bus: &mut dyn Bus, addr: u16) -> u8 {
        bus.read8(u32::from(addr))
    }

    pub(crate) fn write8(&mut self, bus: &mut dyn Bus, addr: u16, v: u8) {
        bus.write8(u32::from(addr), v);
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

    /// Charge the conditional-path extra for the current opcode.
    pub(crate) fn tick_taken(&mut self) {
        let extra = Self::info().timing(self.opcode).t3;
        self.tick(extra);
    }

    pub(crate) fn halt(&mut self) {
        self.state = CpuState::Halted;
    }

    pub(crate) fn set_interrupts_enabled(&mut self, on: bool) {
        self.interrupts_enabled = on;
    }

    /// Drive INT with an explicit restart number (RST 0-7).
    pub fn set_irq_vector(&mut self, level: bool, rst: u8) {
        self.int_line = level;
        self.int_vector = rst & 7;
    }

    fn service_interrupt(&mut self, bus: &mut dyn Bus) {
        if !self.int_line || !self.interrupts_enabled {
            return;
        }
        // EI enables interrupts after the *following* instruction.
        if self.opcode == 0xFB {
            return;
        }
        self.interrupts_enabled = false;
        if self.state == CpuState::Halted {
            self.state = CpuState::Running;
        }
        self.push16(bus, self.pc);
        self.pc = u16::from(self.int_vector) * 8;
        let irq = Self::info().misc("irq");
        self.tick(irq.base);
    }
}

impl Cpu for Cpu8080 {
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
            // Burn idle cycles waiting for an interrupt.
            self.tick(4);
            self.service_interrupt(bus);
            return true;
        }
        self.current_op = self.pc;
        let opcode = self.fetch8(bus);
        if let Err(fault) = self.exec(bus, opcode) {
            log::error!("8080: {fault}");
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
        self.int_line = level;
    }

    fn snapshot(&self) -> Result<serde_json::Value, SnapshotError> {
        snapshot::save(ID, self)
    }

    fn restore(&mut self, from: &serde_json::Value) -> Result<(), SnapshotError> {
        *self = snapshot::restore(ID, from)?;
        Ok(())
    }
}
