//! # Byte reader
//!
//! A cursor over a borrowed section buffer. Every read is little-endian,
//! advances the cursor by the number of bytes consumed, and fails with
//! [`DwarfError::OutOfRange`] instead of panicking when the buffer runs out.

pub mod leb128;

pub use leb128::{SLeb128, ULeb128};

use crate::error::{DwarfError, DwarfResult};

/// Initial-length value announcing the 64-bit DWARF format.
pub const DWARF64_ESCAPE: u32 = 0xffff_ffff;

/// Start of the initial-length range reserved by the DWARF standard.
const RESERVED_LENGTH_START: u32 = 0xffff_fff0;

/// Cursor over a byte buffer.
///
/// The cursor is a small `Copy` value, so a decoder can fork it to peek
/// ahead (as the attribute sizer does) without disturbing the caller.
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a>
{
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a>
{
    pub fn new(data: &'a [u8]) -> Self
    {
        Self { data, offset: 0 }
    }

    /// Cursor positioned at `offset`. The offset is not validated until the
    /// first read.
    pub fn at(data: &'a [u8], offset: usize) -> Self
    {
        Self { data, offset }
    }

    pub fn data(&self) -> &'a [u8]
    {
        self.data
    }

    pub fn offset(&self) -> usize
    {
        self.offset
    }

    pub fn set_offset(&mut self, offset: usize)
    {
        self.offset = offset;
    }

    pub fn len(&self) -> usize
    {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.data.is_empty()
    }

    /// True once the cursor has consumed the whole buffer.
    pub fn is_at_end(&self) -> bool
    {
        self.offset >= self.data.len()
    }

    pub fn remaining(&self) -> usize
    {
        self.data.len().saturating_sub(self.offset)
    }

    fn out_of_range(&self, wanted: usize) -> DwarfError
    {
        DwarfError::OutOfRange {
            offset: self.offset,
            wanted,
            len: self.data.len(),
        }
    }

    /// Borrow the next `count` bytes and advance past them.
    pub fn read_bytes(&mut self, count: usize) -> DwarfResult<&'a [u8]>
    {
        let end = self
            .offset
            .checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| self.out_of_range(count))?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, count: usize) -> DwarfResult<()>
    {
        self.read_bytes(count).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self) -> DwarfResult<[u8; N]>
    {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> DwarfResult<u8>
    {
        let byte = *self.data.get(self.offset).ok_or_else(|| self.out_of_range(1))?;
        self.offset += 1;
        Ok(byte)
    }

    pub fn read_i8(&mut self) -> DwarfResult<i8>
    {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> DwarfResult<u16>
    {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> DwarfResult<i16>
    {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> DwarfResult<u32>
    {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> DwarfResult<i32>
    {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> DwarfResult<u64>
    {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> DwarfResult<i64>
    {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Null-terminated byte string, without the terminator.
    pub fn read_cstr(&mut self) -> DwarfResult<&'a [u8]>
    {
        let rest = self.data.get(self.offset..).unwrap_or_default();
        let len = rest
            .iter()
            .position(|byte| *byte == 0)
            .ok_or_else(|| self.out_of_range(rest.len() + 1))?;
        let bytes = &rest[..len];
        self.offset += len + 1;
        Ok(bytes)
    }

    /// Null-terminated string. Invalid UTF-8 is replaced, not rejected;
    /// producers occasionally emit Latin-1 paths.
    pub fn read_string(&mut self) -> DwarfResult<String>
    {
        Ok(String::from_utf8_lossy(self.read_cstr()?).into_owned())
    }

    /// Read an initial-length field.
    ///
    /// Returns the length and whether the 64-bit DWARF format is in use. The
    /// flag must be carried into every offset-sized read of the same unit.
    pub fn read_initial_length(&mut self) -> DwarfResult<(u64, bool)>
    {
        let start = self.offset;
        let length = self.read_u32()?;
        if length == DWARF64_ESCAPE {
            return Ok((self.read_u64()?, true));
        }
        if length >= RESERVED_LENGTH_START {
            return Err(DwarfError::Decoding(format!(
                "reserved initial length 0x{length:08x} at offset 0x{start:x}"
            )));
        }
        Ok((u64::from(length), false))
    }

    /// Section offset: 8 bytes in 64-bit DWARF, 4 bytes otherwise.
    pub fn read_offset(&mut self, is64: bool) -> DwarfResult<u64>
    {
        if is64 {
            self.read_u64()
        } else {
            self.read_u32().map(u64::from)
        }
    }

    /// Target address of the given byte width. A width of zero reads nothing
    /// and yields zero.
    pub fn read_address(&mut self, width: u8) -> DwarfResult<u64>
    {
        match width {
            0 => Ok(0),
            1 => self.read_u8().map(u64::from),
            2 => self.read_u16().map(u64::from),
            4 => self.read_u32().map(u64::from),
            8 => self.read_u64(),
            other => Err(DwarfError::UnsupportedWidth(other)),
        }
    }

    pub fn read_uleb128(&mut self) -> DwarfResult<ULeb128>
    {
        let (value, consumed) = leb128::decode_unsigned(self.data, self.offset)?;
        self.offset += consumed;
        Ok(value)
    }

    pub fn read_sleb128(&mut self) -> DwarfResult<SLeb128>
    {
        let (value, consumed) = leb128::decode_signed(self.data, self.offset)?;
        self.offset += consumed;
        Ok(value)
    }
}

/// Narrow a decoded 64-bit quantity to `usize`.
pub fn to_usize(value: u64, what: &str) -> DwarfResult<usize>
{
    usize::try_from(value).map_err(|_| DwarfError::Decoding(format!("{what} 0x{value:x} exceeds the address space")))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_fixed_width_little_endian()
    {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0xff];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u16().unwrap(), 0x0201);
        assert_eq!(cursor.read_u32().unwrap(), 0x0605_0403);
        assert_eq!(cursor.offset(), 6);
        assert_eq!(cursor.read_u8().unwrap(), 0x07);
        assert_eq!(cursor.read_u8().unwrap(), 0x08);
        assert_eq!(cursor.read_i8().unwrap(), -1);
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_out_of_range_does_not_advance()
    {
        let data = [0x01, 0x02, 0x03];
        let mut cursor = ByteCursor::new(&data);
        let err = cursor.read_u32().unwrap_err();
        assert!(matches!(err, DwarfError::OutOfRange { offset: 0, wanted: 4, len: 3 }));
        assert_eq!(cursor.offset(), 0);
    }

    #[test]
    fn test_read_string()
    {
        let data = b"main.c\0util.c\0";
        let mut cursor = ByteCursor::new(data);
        assert_eq!(cursor.read_string().unwrap(), "main.c");
        assert_eq!(cursor.read_string().unwrap(), "util.c");
        assert!(cursor.read_string().is_err());
    }

    #[test]
    fn test_unterminated_string()
    {
        let mut cursor = ByteCursor::new(b"abc");
        assert!(matches!(cursor.read_cstr(), Err(DwarfError::OutOfRange { .. })));
    }

    #[test]
    fn test_initial_length_32()
    {
        let data = [0x10, 0x00, 0x00, 0x00];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_initial_length().unwrap(), (0x10, false));
        assert_eq!(cursor.offset(), 4);
    }

    #[test]
    fn test_initial_length_64()
    {
        let mut data = vec![0xff, 0xff, 0xff, 0xff];
        data.extend_from_slice(&0x1234u64.to_le_bytes());
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_initial_length().unwrap(), (0x1234, true));
        assert_eq!(cursor.offset(), 12);
    }

    #[test]
    fn test_initial_length_reserved()
    {
        let data = [0xf0, 0xff, 0xff, 0xff];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(cursor.read_initial_length(), Err(DwarfError::Decoding(_))));
    }

    #[test]
    fn test_read_address_widths()
    {
        let data = 0x1122_3344_5566_7788u64.to_le_bytes();
        assert_eq!(ByteCursor::new(&data).read_address(0).unwrap(), 0);
        assert_eq!(ByteCursor::new(&data).read_address(4).unwrap(), 0x5566_7788);
        assert_eq!(ByteCursor::new(&data).read_address(8).unwrap(), 0x1122_3344_5566_7788);
        assert!(matches!(
            ByteCursor::new(&data).read_address(3),
            Err(DwarfError::UnsupportedWidth(3))
        ));
    }

    #[test]
    fn test_leb128_advances_cursor()
    {
        let data = [0xe5, 0x8e, 0x26, 0x7f];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_uleb128().unwrap().low, 624_485);
        assert_eq!(cursor.offset(), 3);
        assert_eq!(cursor.read_sleb128().unwrap().low, -1);
        assert!(cursor.is_at_end());
    }
}
