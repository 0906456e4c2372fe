//! okto CLI
//!
//! Loads a flat binary image into RAM, runs one of the emulator cores
//! over it, and optionally traces execution or writes a snapshot.
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use core_lib::{info, Bus, Cpu, Cpu6502, Cpu6809, Cpu8080, Cpu8086, CpuState, CpuZ80, FlatMemory};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about = "Command line driver for the okto emulator cores")]
struct Cli {
    /// Enable verbose logging (equivalent to RUST_LOG=debug)
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a flat binary image on one of the cores
    Run {
        /// Path to the binary image
        #[arg(value_name = "IMAGE_PATH")]
        image: PathBuf,
        /// Which CPU core to run
        #[arg(long, value_enum, default_value_t = Arch::I8080)]
        cpu: Arch,
        /// Address the image is loaded at (hex accepted with 0x)
        #[arg(long, value_parser = parse_addr, default_value = "0")]
        load_addr: u32,
        /// Entry point; wires the architecture's reset path to this address
        #[arg(long, value_parser = parse_addr)]
        entry: Option<u32>,
        /// Maximum number of instructions to execute
        #[arg(long, default_value_t = 1_000_000)]
        steps: u64,
        /// Print one line per instruction
        #[arg(long)]
        trace: bool,
        /// Restore CPU state from a snapshot before running
        #[arg(long, value_name = "SNAPSHOT_PATH")]
        resume: Option<PathBuf>,
        /// Write the final CPU state to a snapshot file
        #[arg(long, value_name = "SNAPSHOT_PATH")]
        snapshot_out: Option<PathBuf>,
    },
    /// Inspect a snapshot file
    Snapshot {
        /// Path to the snapshot file
        #[arg(value_name = "SNAPSHOT_PATH")]
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Arch {
    #[value(name = "6502")]
    Mos6502,
    #[value(name = "8080")]
    I8080,
    #[value(name = "z80")]
    Z80,
    #[value(name = "8086")]
    I8086,
    #[value(name = "6809")]
    M6809,
}

fn parse_addr(s: &str) -> Result<u32, String> {
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    u32::from_str_radix(digits, radix).map_err(|e| format!("bad address '{s}': {e}"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();

    match cli.command {
        Commands::Run {
            image,
            cpu,
            load_addr,
            entry,
            steps,
            trace,
            resume,
            snapshot_out,
        } => run(
            &image,
            cpu,
            load_addr,
            entry,
            steps,
            trace,
            resume.as_deref(),
            snapshot_out.as_deref(),
        ),
        Commands::Snapshot { file } => inspect(&file),
    }
}

fn build(arch: Arch) -> (Box<dyn Cpu>, FlatMemory, &'static info::CpuInfo) {
    match arch {
        Arch::Mos6502 => (
            Box::new(Cpu6502::new()) as Box<dyn Cpu>,
            FlatMemory::new(0x1_0000),
            info::mos6502(),
        ),
        Arch::I8080 => (
            Box::new(Cpu8080::new()),
            FlatMemory::new(0x1_0000),
            info::i8080(),
        ),
        Arch::Z80 => (
            Box::new(CpuZ80::new()),
            FlatMemory::new(0x1_0000),
            info::z80(),
        ),
        Arch::I8086 => (
            Box::new(Cpu8086::new()),
            FlatMemory::new(0x10_0000),
            info::i8086(),
        ),
        Arch::M6809 => (
            Box::new(Cpu6809::new()),
            FlatMemory::new(0x1_0000),
            info::m6809(),
        ),
    }
}

/// Point the architecture's reset path at `entry`: vector write for the
/// cores that fetch one, a planted jump for the cores that start at a
/// fixed address.
fn plant_entry(arch: Arch, mem: &mut FlatMemory, entry: u32) {
    match arch {
        Arch::Mos6502 => mem.write16_le(0xFFFC, entry as u16),
        Arch::M6809 => mem.write16_be(0xFFFE, entry as u16),
        Arch::I8080 | Arch::Z80 => {
            // JP entry at the reset address.
            mem.write8(0x0000, 0xC3);
            mem.write16_le(0x0001, entry as u16);
        }
        Arch::I8086 => {
            // JMP FAR 0000:entry at the reset target FFFF:0000.
            mem.write8(0xF_FFF0, 0xEA);
            mem.write16_le(0xF_FFF1, entry as u16);
            mem.write16_le(0xF_FFF3, 0x0000);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    image: &Path,
    arch: Arch,
    load_addr: u32,
    entry: Option<u32>,
    steps: u64,
    trace: bool,
    resume: Option<&Path>,
    snapshot_out: Option<&Path>,
) -> anyhow::Result<()> {
    if !image.exists() {
        anyhow::bail!("image file not found: {}", image.display());
    }
    let data = std::fs::read(image)
        .with_context(|| format!("failed to read image from {}", image.display()))?;

    let (mut cpu, mut mem, meta) = build(arch);
    mem.load(load_addr, &data);
    if let Some(entry) = entry {
        plant_entry(arch, &mut mem, entry);
    }
    cpu.reset(&mut mem);

    if let Some(path) = resume {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot from {}", path.display()))?;
        let snap: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("snapshot {} is not valid JSON", path.display()))?;
        cpu.restore(&snap)
            .with_context(|| format!("snapshot {} was rejected", path.display()))?;
        tracing::info!(snapshot = %path.display(), "resumed");
    }

    tracing::info!(
        cpu = cpu.id(),
        image = %image.display(),
        bytes = data.len(),
        load_addr = format_args!("{load_addr:#06X}"),
        "starting"
    );

    let mut executed = 0u64;
    let mut ticks = 0u64;
    while executed < steps {
        if trace {
            let text = disassemble(&*cpu, &mut mem, meta);
            println!("{:05X}  {text}", cpu.current_address());
        }
        if !cpu.step(&mut mem) {
            break;
        }
        executed += 1;
        ticks += u64::from(cpu.instruction_ticks());
        if cpu.state() == CpuState::Halted {
            tracing::info!(addr = format_args!("{:#06X}", cpu.current_address()), "halted");
            break;
        }
    }

    tracing::info!(
        executed,
        ticks,
        state = ?cpu.state(),
        addr = format_args!("{:#06X}", cpu.current_address()),
        "finished"
    );

    let snap = cpu.snapshot().context("snapshot failed")?;
    let text = serde_json::to_string_pretty(&snap).context("snapshot did not serialize")?;
    println!("{text}");

    if let Some(path) = snapshot_out {
        std::fs::write(path, &text)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        tracing::info!(snapshot = %path.display(), "snapshot written");
    }
    Ok(())
}

/// Trace text for the next instruction: the metadata mnemonic, following
/// one level of prefix into the sub-opcode tables.
fn disassemble(cpu: &dyn Cpu, mem: &mut FlatMemory, meta: &info::CpuInfo) -> String {
    let addr = cpu.current_address();
    let op = mem.read8(addr);
    if meta.opcode(op).group.is_some() {
        let op2 = mem.read8(addr.wrapping_add(1));
        meta.sub_opcode(op, op2)
    } else {
        meta.opcode(op).text.clone()
    }
}

fn inspect(file: &Path) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("snapshot file not found: {}", file.display());
    }
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read snapshot from {}", file.display()))?;
    let snap: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("snapshot {} is not valid JSON", file.display()))?;
    let arch = snap
        .get("cpu")
        .and_then(serde_json::Value::as_str)
        .context("snapshot has no 'cpu' tag")?;
    println!("architecture: {arch}");
    println!("{}", serde_json::to_string_pretty(&snap)?);
    Ok(())
}

#[cfg(test)]
mod tests;
