//! # LEB128
//!
//! Unsigned and signed Little-Endian Base-128 integers.
//!
//! DWARF places no upper bound on the width of a LEB128 value, so decoded
//! values are kept at 128 bits and stored as two explicit 64-bit halves.
//! Byte `i` of the encoding supplies bits `7i..7i+7` of the value. Bytes 0-8
//! land entirely in `low`, byte 9 supplies bit 63 of `low` and bits 0-5 of
//! `high`, and bytes 10-18 land entirely in `high`.

use std::fmt;

use crate::error::{DwarfError, DwarfResult};

/// Longest encoding we accept: 19 bytes carry 133 payload bits.
pub const MAX_LEB128_LEN: usize = 19;

/// Unsigned LEB128 value split into low and high 64-bit halves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ULeb128
{
    pub low: u64,
    pub high: u64,
}

/// Signed LEB128 value split into low and high 64-bit halves.
///
/// Both halves are sign-extended, so a small negative number has
/// `high == -1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SLeb128
{
    pub low: i64,
    pub high: i64,
}

impl ULeb128
{
    pub const ZERO: Self = ULeb128 { low: 0, high: 0 };

    pub const fn new(value: u64) -> Self
    {
        ULeb128 { low: value, high: 0 }
    }

    pub const fn is_zero(self) -> bool
    {
        self.low == 0 && self.high == 0
    }

    /// Full 128-bit value.
    pub const fn value(self) -> u128
    {
        ((self.high as u128) << 64) | self.low as u128
    }

    /// The value if it fits in 64 bits.
    pub const fn as_u64(self) -> Option<u64>
    {
        if self.high == 0 {
            Some(self.low)
        } else {
            None
        }
    }

    /// The value narrowed to `u64`, failing with a decoding error naming `what`.
    pub fn to_u64(self, what: &str) -> DwarfResult<u64>
    {
        self.as_u64()
            .ok_or_else(|| DwarfError::Decoding(format!("{what} does not fit in 64 bits: {self}")))
    }

    pub(crate) fn deposit(&mut self, group: u8, shift: u32)
    {
        let group = u64::from(group & 0x7f);
        if shift < 64 {
            self.low |= group << shift;
            if shift + 7 > 64 {
                self.high |= group >> (64 - shift);
            }
        } else if shift < 128 {
            self.high |= group << (shift - 64);
        }
    }
}

impl From<u64> for ULeb128
{
    fn from(value: u64) -> Self
    {
        ULeb128::new(value)
    }
}

impl fmt::Display for ULeb128
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        if self.high == 0 {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}", self.value())
        }
    }
}

impl SLeb128
{
    pub const fn new(value: i64) -> Self
    {
        SLeb128 {
            low: value,
            high: if value < 0 { -1 } else { 0 },
        }
    }

    /// Full 128-bit value.
    pub const fn value(self) -> i128
    {
        (((self.high as u64 as u128) << 64) | self.low as u64 as u128) as i128
    }

    /// The value if it fits in 64 bits.
    pub const fn as_i64(self) -> Option<i64>
    {
        let sign = if self.low < 0 { -1 } else { 0 };
        if self.high == sign {
            Some(self.low)
        } else {
            None
        }
    }

    /// The value narrowed to `i64`, failing with a decoding error naming `what`.
    pub fn to_i64(self, what: &str) -> DwarfResult<i64>
    {
        self.as_i64()
            .ok_or_else(|| DwarfError::Decoding(format!("{what} does not fit in 64 bits: {}", self.value())))
    }
}

impl From<i64> for SLeb128
{
    fn from(value: i64) -> Self
    {
        SLeb128::new(value)
    }
}

impl From<ULeb128> for SLeb128
{
    fn from(value: ULeb128) -> Self
    {
        SLeb128 {
            low: value.low as i64,
            high: value.high as i64,
        }
    }
}

impl fmt::Display for SLeb128
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.value())
    }
}

/// Decode an unsigned LEB128 from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_unsigned(bytes: &[u8], start: usize) -> DwarfResult<(ULeb128, usize)>
{
    let mut value = ULeb128::ZERO;
    for index in 0..MAX_LEB128_LEN {
        let byte = *bytes.get(start + index).ok_or(DwarfError::OutOfRange {
            offset: start,
            wanted: index + 1,
            len: bytes.len(),
        })?;
        value.deposit(byte, 7 * index as u32);
        if byte & 0x80 == 0 {
            return Ok((value, index + 1));
        }
    }
    Err(DwarfError::Decoding(format!(
        "LEB128 at offset 0x{start:x} is longer than {MAX_LEB128_LEN} bytes"
    )))
}

/// Decode a signed LEB128 from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_signed(bytes: &[u8], start: usize) -> DwarfResult<(SLeb128, usize)>
{
    let (raw, consumed) = decode_unsigned(bytes, start)?;
    let last = bytes[start + consumed - 1];
    let mut value = raw;

    // sign bit of the final group fills everything above it
    if last & 0x40 != 0 {
        let filled = 7 * consumed as u32;
        if filled < 64 {
            value.low |= u64::MAX << filled;
            value.high = u64::MAX;
        } else if filled < 128 {
            value.high |= u64::MAX << (filled - 64);
        }
    }

    Ok((SLeb128::from(value), consumed))
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn encode_unsigned(mut value: u128) -> Vec<u8>
    {
        let mut out = Vec::new();
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return out;
            }
            out.push(byte | 0x80);
        }
    }

    fn encode_signed(mut value: i128) -> Vec<u8>
    {
        let mut out = Vec::new();
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
            if done {
                out.push(byte);
                return out;
            }
            out.push(byte | 0x80);
        }
    }

    #[test]
    fn test_unsigned_boundaries()
    {
        for value in [0u128, 127, 128, 16383, (1 << 63) - 1] {
            let bytes = encode_unsigned(value);
            let (decoded, consumed) = decode_unsigned(&bytes, 0).unwrap();
            assert_eq!(decoded.value(), value);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn test_signed_boundaries()
    {
        for value in [0i128, 127, 128, 16383, (1 << 63) - 1, -1, -64, -65] {
            let bytes = encode_signed(value);
            let (decoded, consumed) = decode_signed(&bytes, 0).unwrap();
            assert_eq!(decoded.value(), value, "value {value}");
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn test_known_encodings()
    {
        assert_eq!(decode_unsigned(&[0xe5, 0x8e, 0x26], 0).unwrap().0.low, 624_485);
        assert_eq!(decode_signed(&[0xc0, 0xbb, 0x78], 0).unwrap().0.low, -123_456);
        assert_eq!(decode_signed(&[0x7f], 0).unwrap().0, SLeb128::new(-1));
        assert_eq!(decode_signed(&[0x40], 0).unwrap().0, SLeb128::new(-64));
    }

    #[test]
    fn test_halves_split_at_bit_64()
    {
        let value: u128 = (0x1234_5678_u128 << 64) | 0xdead_beef_cafe_f00d;
        let bytes = encode_unsigned(value);
        let (decoded, _) = decode_unsigned(&bytes, 0).unwrap();
        assert_eq!(decoded.low, 0xdead_beef_cafe_f00d);
        assert_eq!(decoded.high, 0x1234_5678);
        assert_eq!(decoded.as_u64(), None);
    }

    #[test]
    fn test_u64_max_straddles()
    {
        let bytes = encode_unsigned(u128::from(u64::MAX));
        assert_eq!(bytes.len(), 10);
        let (decoded, _) = decode_unsigned(&bytes, 0).unwrap();
        assert_eq!(decoded.low, u64::MAX);
        assert_eq!(decoded.high, 0);
    }

    #[test]
    fn test_signed_negative_wide_value()
    {
        let value: i128 = -(1 << 100);
        let (decoded, _) = decode_signed(&encode_signed(value), 0).unwrap();
        assert_eq!(decoded.value(), value);
        assert_eq!(decoded.as_i64(), None);
        assert_eq!(decoded.high >> 36, -1);
    }

    #[test]
    fn test_truncated_input()
    {
        assert!(matches!(decode_unsigned(&[0x80, 0x80], 0), Err(DwarfError::OutOfRange { .. })));
    }

    #[test]
    fn test_overlong_input()
    {
        let bytes = [0x80u8; 20];
        assert!(matches!(decode_unsigned(&bytes, 0), Err(DwarfError::Decoding(_))));
    }
}
