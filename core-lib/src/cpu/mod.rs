//! The core execution model shared by every architecture.
//!
//! A core owns its registers, interrupt lines and cycle counter; memory
//! and devices stay behind the [`Bus`]. The drive loop is always the same:
//! call [`Cpu::step`] until it returns `false`.

pub mod i8080;
pub mod i8086;
pub mod m6809;
pub mod mos6502;
pub mod z80;

use crate::bus::Bus;
use crate::snapshot::SnapshotError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Execution state of a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuState {
    /// Not executing; a fault or an explicit stop. Terminal until reset.
    Stopped,
    #[default]
    Running,
    /// A halt instruction was executed; waiting for an interrupt.
    Halted,
}

/// A condition the core cannot execute through.
///
/// Faults are values, not panics: `step` converts them into the
/// `Stopped` state so a driver loop sees a clean termination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("unknown opcode {opcode:#04X} at {addr:#06X}")]
    UnknownOpcode { addr: u32, opcode: u8 },

    #[error("{what} at {addr:#06X} is not supported")]
    Unsupported { addr: u32, what: &'static str },
}

/// Per-opcode handler result.
pub type ExecResult = Result<(), Fault>;

/// One CPU core. Everything a machine needs to drive it.
pub trait Cpu {
    /// Architecture tag ("6502", "8080", "z80", "8086", "6809"). Also the
    /// snapshot tag.
    fn id(&self) -> &'static str;

    /// Hardware reset: registers and interrupt machinery to power-on
    /// values. Cores that fetch a reset vector read it from `bus`.
    fn reset(&mut self, bus: &mut dyn Bus);

    /// Service pending interrupts, then run one instruction. Returns
    /// `false` once the core is `Stopped`; a `Halted` core still returns
    /// `true` and burns idle cycles waiting for an interrupt.
    fn step(&mut self, bus: &mut dyn Bus) -> bool;

    /// Execute a single already-fetched opcode. `step` calls this; it is
    /// public so harnesses can inject instructions.
    fn exec(&mut self, bus: &mut dyn Bus, opcode: u8) -> ExecResult;

    fn state(&self) -> CpuState;

    /// Cycles consumed by the most recent `step`.
    fn instruction_ticks(&self) -> u32;

    /// Address of the instruction being (or about to be) executed.
    fn current_address(&self) -> u32;

    /// Drive the maskable interrupt line (level-sensitive).
    fn set_irq(&mut self, level: bool) {
        let _ = level;
    }

    /// Drive the non-maskable interrupt line (edge-sensitive). No-op on
    /// cores without an NMI pin.
    fn set_nmi(&mut self, level: bool) {
        let _ = level;
    }

    /// Complete execution state as a tagged JSON object.
    fn snapshot(&self) -> Result<serde_json::Value, SnapshotError>;

    /// Restore from a snapshot taken on the same architecture.
    fn restore(&mut self, from: &serde_json::Value) -> Result<(), SnapshotError>;
}

/// 256-entry dispatch table of boxed opcode handlers.
///
/// Built once per architecture (behind a `Lazy`) and shared by every
/// instance; handlers close over opcode specifics (register indices,
/// condition codes) so execution is a single indexed call.
pub(crate) struct OpTable<C> {
    ops: Vec<Box<dyn Fn(&mut C, &mut dyn Bus) -> ExecResult + Send + Sync>>,
}

impl<C: 'static> OpTable<C> {
    /// A table with every slot set to `default` (the unknown-opcode
    /// handler). Builders then overwrite the defined encodings.
    pub(crate) fn new(default: fn(&mut C, &mut dyn Bus) -> ExecResult) -> Self {
        let mut ops = Vec::with_capacity(256);
        for _ in 0..256 {
            ops.push(Box::new(default) as Box<_>);
        }
        Self { ops }
    }

    pub(crate) fn set(
        &mut self,
        opcode: u8,
        f: impl Fn(&mut C, &mut dyn Bus) -> ExecResult + Send + Sync + 'static,
    ) {
        self.ops[opcode as usize] = Box::new(f);
    }

    #[inline]
    pub(crate) fn exec(&self, core: &mut C, bus: &mut dyn Bus, opcode: u8) -> ExecResult {
        (self.ops[opcode as usize])(core, bus)
    }
}
