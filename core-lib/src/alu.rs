//! Shared arithmetic primitives.
//!
//! Every core computes carry, half-carry and signed overflow the same way;
//! only which flag bits they land in differs. The cores call these and map
//! the booleans into their own status registers.

/// Result of an 8-bit add or subtract with full flag information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sum8 {
    pub result: u8,
    /// Carry out of bit 7 (borrow for subtraction).
    pub carry: bool,
    /// Carry out of bit 3 (the BCD half-carry).
    pub half: bool,
    /// Two's-complement overflow.
    pub overflow: bool,
}

/// Result of a 16-bit add or subtract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sum16 {
    pub result: u16,
    /// Carry out of bit 15 (borrow for subtraction).
    pub carry: bool,
    /// Carry out of bit 3. The 8086 reports this for word ops.
    pub half: bool,
    /// Carry out of bit 11. The Z80 reports this for 16-bit ADC/SBC.
    pub half11: bool,
    /// Two's-complement overflow at bit 15.
    pub overflow: bool,
}

/// `a + b + carry_in` with flags.
#[must_use]
pub fn add8(a: u8, b: u8, carry_in: bool) -> Sum8 {
    let c = u16::from(carry_in);
    let wide = u16::from(a) + u16::from(b) + c;
    let result = wide as u8;
    Sum8 {
        result,
        carry: wide > 0xFF,
        half: (a & 0x0F) + (b & 0x0F) + c as u8 > 0x0F,
        overflow: (a ^ result) & (b ^ result) & 0x80 != 0,
    }
}

/// `a - b - borrow_in` with flags. `carry` is the borrow.
#[must_use]
pub fn sub8(a: u8, b: u8, borrow_in: bool) -> Sum8 {
    let c = u16::from(borrow_in);
    let wide = u16::from(a).wrapping_sub(u16::from(b)).wrapping_sub(c);
    let result = wide as u8;
    Sum8 {
        result,
        carry: u16::from(a) < u16::from(b) + c,
        half: (a & 0x0F) < (b & 0x0F) + c as u8,
        overflow: (a ^ b) & (a ^ result) & 0x80 != 0,
    }
}

/// `a + b + carry_in` on words.
#[must_use]
pub fn add16(a: u16, b: u16, carry_in: bool) -> Sum16 {
    let c = u32::from(carry_in);
    let wide = u32::from(a) + u32::from(b) + c;
    let result = wide as u16;
    // Internal carries: bit n set when there was a carry into bit n.
    let carries = u32::from(a) ^ u32::from(b) ^ wide;
    Sum16 {
        result,
        carry: wide > 0xFFFF,
        half: carries & 0x0010 != 0,
        half11: carries & 0x1000 != 0,
        overflow: (a ^ result) & (b ^ result) & 0x8000 != 0,
    }
}

/// `a - b - borrow_in` on words. `carry` is the borrow.
#[must_use]
pub fn sub16(a: u16, b: u16, borrow_in: bool) -> Sum16 {
    let c = u32::from(borrow_in);
    let wide = u32::from(a).wrapping_sub(u32::from(b)).wrapping_sub(c);
    let result = wide as u16;
    let carries = u32::from(a) ^ u32::from(b) ^ wide;
    Sum16 {
        result,
        carry: u32::from(a) < u32::from(b) + c,
        half: carries & 0x0010 != 0,
        half11: carries & 0x1000 != 0,
        overflow: (a ^ b) & (a ^ result) & 0x8000 != 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Exhaustive over the full 8-bit input space: the reference for each
    // flag is computed in wider arithmetic.
    #[test]
    fn add8_flags_exhaustive() {
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                for cin in [false, true] {
                    let s = add8(a, b, cin);
                    let wide = u32::from(a) + u32::from(b) + u32::from(cin);
                    assert_eq!(s.result, wide as u8);
                    assert_eq!(s.carry, wide > 0xFF);
                    let signed =
                        i32::from(a as i8) + i32::from(b as i8) + i32::from(cin);
                    assert_eq!(s.overflow, !(-128..=127).contains(&signed));
                    let nibble =
                        u32::from(a & 0xF) + u32::from(b & 0xF) + u32::from(cin);
                    assert_eq!(s.half, nibble > 0xF);
                }
            }
        }
    }

    #[test]
    fn sub8_flags_exhaustive() {
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                for cin in [false, true] {
                    let s = sub8(a, b, cin);
                    let wide = i32::from(a) - i32::from(b) - i32::from(cin);
                    assert_eq!(s.result, wide as u8);
                    assert_eq!(s.carry, wide < 0);
                    let signed =
                        i32::from(a as i8) - i32::from(b as i8) - i32::from(cin);
                    assert_eq!(s.overflow, !(-128..=127).contains(&signed));
                    let nibble =
                        i32::from(a & 0xF) - i32::from(b & 0xF) - i32::from(cin);
                    assert_eq!(s.half, nibble < 0);
                }
            }
        }
    }

    proptest! {
        #[test]
        fn add16_matches_wide_arithmetic(a: u16, b: u16, cin: bool) {
            let s = add16(a, b, cin);
            let wide = u32::from(a) + u32::from(b) + u32::from(cin);
            prop_assert_eq!(s.result, wide as u16);
            prop_assert_eq!(s.carry, wide > 0xFFFF);
            let signed = i32::from(a as i16) + i32::from(b as i16) + i32::from(cin);
            prop_assert_eq!(s.overflow, !(-32768..=32767).contains(&signed));
        }

        #[test]
        fn sub16_matches_wide_arithmetic(a: u16, b: u16, cin: bool) {
            let s = sub16(a, b, cin);
            let wide = i64::from(a) - i64::from(b) - i64::from(cin);
            prop_assert_eq!(s.result, wide as u16);
            prop_assert_eq!(s.carry, wide < 0);
            let signed = i32::from(a as i16) - i32::from(b as i16) - i32::from(cin);
            prop_assert_eq!(s.overflow, !(-32768..=32767).contains(&signed));
        }

        #[test]
        fn sub_is_add_of_complement_without_borrow(a: u8, b: u8) {
            // Classic identity: a - b == a + !b + 1, carries inverted.
            let s = sub8(a, b, false);
            let t = add8(a, !b, true);
            prop_assert_eq!(s.result, t.result);
            prop_assert_eq!(s.carry, !t.carry);
        }
    }

    #[test]
    fn half11_tracks_bit_eleven() {
        let s = add16(0x0FFF, 0x0001, false);
        assert!(s.half11);
        assert!(!s.carry);
        let s = add16(0x0800, 0x0700, false);
        assert!(!s.half11);
    }
}
