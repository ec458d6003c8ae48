//! Attribute value sizing.
//!
//! Forms are not self-delimiting in general, so an entry's attributes can only
//! be split apart by measuring each value in declaration order. The sizer reads
//! just enough of the value (a length prefix, a LEB128, a string terminator)
//! to know where it ends.

use gimli::constants::{self, DwForm};

use super::Encoding;
use crate::error::{DwarfError, DwarfResult};
use crate::reader::ByteCursor;

/// Encoded byte length of the value of `form` starting at `cursor`.
///
/// The caller's cursor is not moved; `cursor` is taken by value.
pub fn size_of(form: DwForm, mut cursor: ByteCursor<'_>, encoding: Encoding) -> DwarfResult<usize>
{
    let head = cursor.offset();
    let size = match form {
        constants::DW_FORM_addr => usize::from(encoding.address_size),

        // DWARF 2 encoded ref_addr as an address, later versions as an offset
        constants::DW_FORM_ref_addr if encoding.version <= 2 => usize::from(encoding.address_size),
        constants::DW_FORM_ref_addr
        | constants::DW_FORM_sec_offset
        | constants::DW_FORM_strp
        | constants::DW_FORM_line_strp
        | constants::DW_FORM_strp_sup
        | constants::DW_FORM_GNU_ref_alt
        | constants::DW_FORM_GNU_strp_alt => encoding.offset_size(),

        constants::DW_FORM_block1 => {
            let length = usize::from(cursor.read_u8()?);
            1 + length
        }
        constants::DW_FORM_block2 => {
            let length = usize::from(cursor.read_u16()?);
            2 + length
        }
        constants::DW_FORM_block4 => {
            let length = cursor.read_u32()? as usize;
            4 + length
        }
        constants::DW_FORM_block | constants::DW_FORM_exprloc => {
            let length = cursor.read_uleb128()?.to_u64("block length")?;
            let length = crate::reader::to_usize(length, "block length")?;
            (cursor.offset() - head) + length
        }

        constants::DW_FORM_flag_present | constants::DW_FORM_implicit_const => 0,

        constants::DW_FORM_data1
        | constants::DW_FORM_ref1
        | constants::DW_FORM_flag
        | constants::DW_FORM_strx1
        | constants::DW_FORM_addrx1 => 1,

        constants::DW_FORM_data2 | constants::DW_FORM_ref2 | constants::DW_FORM_strx2 | constants::DW_FORM_addrx2 => 2,

        constants::DW_FORM_strx3 | constants::DW_FORM_addrx3 => 3,

        constants::DW_FORM_data4
        | constants::DW_FORM_ref4
        | constants::DW_FORM_ref_sup4
        | constants::DW_FORM_strx4
        | constants::DW_FORM_addrx4 => 4,

        constants::DW_FORM_data8 | constants::DW_FORM_ref8 | constants::DW_FORM_ref_sig8 | constants::DW_FORM_ref_sup8 => 8,

        constants::DW_FORM_data16 => 16,

        constants::DW_FORM_strx
        | constants::DW_FORM_addrx
        | constants::DW_FORM_loclistx
        | constants::DW_FORM_rnglistx
        | constants::DW_FORM_udata
        | constants::DW_FORM_ref_udata
        | constants::DW_FORM_GNU_addr_index
        | constants::DW_FORM_GNU_str_index => {
            cursor.read_uleb128()?;
            cursor.offset() - head
        }

        constants::DW_FORM_sdata => {
            cursor.read_sleb128()?;
            cursor.offset() - head
        }

        constants::DW_FORM_indirect => {
            let selected = cursor.read_uleb128()?;
            let selected = selected
                .as_u64()
                .and_then(|raw| u16::try_from(raw).ok())
                .map(DwForm)
                .ok_or_else(|| DwarfError::Decoding(format!("indirect form selector {selected} out of range")))?;
            let prefix = cursor.offset() - head;
            prefix + size_of(selected, cursor, encoding)?
        }

        constants::DW_FORM_string => {
            cursor.read_cstr()?;
            cursor.offset() - head
        }

        other => return Err(DwarfError::UnsupportedForm(other)),
    };
    Ok(size)
}
