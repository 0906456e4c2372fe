pub mod alu;
pub mod bus;
pub mod cpu;
pub mod info;
pub mod latch;
pub mod snapshot;

// Re-export common types
pub use bus::{Bus, FlatMemory};
pub use cpu::i8080::Cpu8080;
pub use cpu::i8086::Cpu8086;
pub use cpu::m6809::Cpu6809;
pub use cpu::mos6502::Cpu6502;
pub use cpu::z80::CpuZ80;
pub use cpu::{Cpu, CpuState, Fault};
pub use latch::{EdgeDetectLatch, Trigger};
pub use snapshot::SnapshotError;
