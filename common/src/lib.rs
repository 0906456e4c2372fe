//! Byte and word helpers shared by every CPU core.
//!
//! All of the emulated processors shuffle 8-bit halves of 16-bit quantities
//! around constantly, so these live in one dependency-free crate.

/// Build a 16-bit word from high and low bytes.
#[inline]
pub const fn make_word(h: u8, l: u8) -> u16 {
    ((h as u16) << 8) | (l as u16)
}

/// High byte of a word.
#[inline]
pub const fn hi(w: u16) -> u8 {
    (w >> 8) as u8
}

/// Low byte of a word.
#[inline]
pub const fn lo(w: u16) -> u8 {
    w as u8
}

/// Replace the high byte of a word.
#[inline]
pub const fn set_hi(w: u16, b: u8) -> u16 {
    (w & 0x00FF) | ((b as u16) << 8)
}

/// Replace the low byte of a word.
#[inline]
pub const fn set_lo(w: u16, b: u8) -> u16 {
    (w & 0xFF00) | (b as u16)
}

/// Sign-extend a byte to 16 bits (for relative branches and displacements).
#[inline]
pub const fn widen(b: u8) -> u16 {
    b as i8 as i16 as u16
}

/// True when the low byte has an even number of set bits.
#[inline]
pub const fn parity_even(b: u8) -> bool {
    b.count_ones() % 2 == 0
}

/// Test a single bit.
#[inline]
pub const fn bit(v: u8, n: u8) -> bool {
    (v >> n) & 1 != 0
}

/// Test a single bit of a word.
#[inline]
pub const fn bit16(v: u16, n: u8) -> bool {
    (v >> n) & 1 != 0
}

/// Set or clear a single bit.
#[inline]
pub const fn set_bit(v: u8, n: u8, on: bool) -> u8 {
    if on {
        v | (1 << n)
    } else {
        v & !(1 << n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_halves_alias() {
        let w = make_word(0x12, 0x34);
        assert_eq!(w, 0x1234);
        assert_eq!(hi(w), 0x12);
        assert_eq!(lo(w), 0x34);
        assert_eq!(set_hi(w, 0xAB), 0xAB34);
        assert_eq!(set_lo(w, 0xCD), 0x12CD);
    }

    #[test]
    fn widen_sign_extends() {
        assert_eq!(widen(0x7F), 0x007F);
        assert_eq!(widen(0x80), 0xFF80);
        assert_eq!(widen(0xFF), 0xFFFF);
    }

    #[test]
    fn parity() {
        assert!(parity_even(0x00));
        assert!(parity_even(0x03));
        assert!(!parity_even(0x01));
        assert!(parity_even(0xFF));
    }

    #[test]
    fn bits() {
        assert!(bit(0x80, 7));
        assert!(!bit(0x80, 6));
        assert_eq!(set_bit(0x00, 3, true), 0x08);
        assert_eq!(set_bit(0xFF, 0, false), 0xFE);
    }
}
