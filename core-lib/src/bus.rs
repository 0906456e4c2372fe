//! Memory and port access as seen by a CPU core.
//!
//! Every bus transaction the cores make goes through [`Bus`], so a machine
//! wires RAM, ROM and devices behind one trait object. Addresses are `u32`
//! to cover the 8086's 20-bit physical space; 16-bit cores never form an
//! address above `0xFFFF`.

/// A CPU-visible bus: byte-wide memory plus an optional I/O port space.
///
/// Reads take `&mut self` because device reads can have side effects
/// (status registers that clear on read, FIFO pops).
pub trait Bus {
    /// Read one byte from memory.
    fn read8(&mut self, addr: u32) -> u8;

    /// Write one byte to memory.
    fn write8(&mut self, addr: u32, value: u8);

    /// Read from an I/O port (8080/Z80 `IN`, 8086 `IN`). Floating bus by
    /// default for machines without a port space.
    fn io_read8(&mut self, port: u16) -> u8 {
        let _ = port;
        0xFF
    }

    /// Write to an I/O port. Ignored by default.
    fn io_write8(&mut self, port: u16, value: u8) {
        let _ = (port, value);
    }

    /// Read a little-endian word (8080/Z80/6502/8086 ordering).
    fn read16_le(&mut self, addr: u32) -> u16 {
        let l = self.read8(addr);
        let h = self.read8(addr.wrapping_add(1));
        common::make_word(h, l)
    }

    /// Write a little-endian word.
    fn write16_le(&mut self, addr: u32, value: u16) {
        self.write8(addr, common::lo(value));
        self.write8(addr.wrapping_add(1), common::hi(value));
    }

    /// Read a big-endian word (6809 ordering).
    fn read16_be(&mut self, addr: u32) -> u16 {
        let h = self.read8(addr);
        let l = self.read8(addr.wrapping_add(1));
        common::make_word(h, l)
    }

    /// Write a big-endian word.
    fn write16_be(&mut self, addr: u32, value: u16) {
        self.write8(addr, common::hi(value));
        self.write8(addr.wrapping_add(1), common::lo(value));
    }
}

/// Flat RAM covering a power-of-two address space. Out-of-range reads
/// return the floating-bus value; out-of-range writes are dropped.
pub struct FlatMemory {
    bytes: Vec<u8>,
}

/// Value returned for reads nothing answers.
pub const FLOATING_BUS: u8 = 0xFF;

impl FlatMemory {
    /// RAM of `size` bytes, filled with the floating-bus pattern.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![FLOATING_BUS; size],
        }
    }

    /// Copy `data` into memory starting at `addr`, truncating at the end
    /// of the address space.
    pub fn load(&mut self, addr: u32, data: &[u8]) {
        let start = addr as usize;
        if start >= self.bytes.len() {
            return;
        }
        let end = (start + data.len()).min(self.bytes.len());
        self.bytes[start..end].copy_from_slice(&data[..end - start]);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Direct view of the backing store, for test assertions.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Bus for FlatMemory {
    fn read8(&mut self, addr: u32) -> u8 {
        self.bytes.get(addr as usize).copied().unwrap_or(FLOATING_BUS)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        if let Some(b) = self.bytes.get_mut(addr as usize) {
            *b = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fresh_memory_reads_floating() {
        let mut mem = FlatMemory::new(0x100);
        assert_eq!(mem.read8(0x00), 0xFF);
        assert_eq!(mem.read8(0xFF), 0xFF);
    }

    #[test]
    fn out_of_range_access_is_harmless() {
        let mut mem = FlatMemory::new(0x10);
        mem.write8(0x20, 0x55);
        assert_eq!(mem.read8(0x20), 0xFF);
    }

    #[test]
    fn word_endianness_helpers() {
        let mut mem = FlatMemory::new(0x100);
        mem.write16_le(0x10, 0x1234);
        assert_eq!(mem.read8(0x10), 0x34);
        assert_eq!(mem.read8(0x11), 0x12);
        assert_eq!(mem.read16_le(0x10), 0x1234);

        mem.write16_be(0x20, 0x1234);
        assert_eq!(mem.read8(0x20), 0x12);
        assert_eq!(mem.read8(0x21), 0x34);
        assert_eq!(mem.read16_be(0x20), 0x1234);
    }

    #[test]
    fn load_truncates_at_end_of_space() {
        let mut mem = FlatMemory::new(0x10);
        mem.load(0x0E, &[1, 2, 3, 4]);
        assert_eq!(mem.read8(0x0E), 1);
        assert_eq!(mem.read8(0x0F), 2);
        // bytes 3 and 4 fell off the end
        mem.load(0x40, &[9]);
        assert_eq!(mem.len(), 0x10);
    }
}
