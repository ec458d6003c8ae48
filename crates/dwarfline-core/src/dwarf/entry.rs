//! Debug-info entries.
//!
//! An entry is stored as its abbreviation code plus the raw bytes of each
//! attribute value. Values are only interpreted when one of the typed accessors
//! asks for them, using the form recorded in the entry's declaration.

use std::collections::HashMap;
use std::sync::Arc;

use gimli::constants::{self, DwAt, DwForm, DwTag};

use super::abbrev::{AbbreviationDeclaration, AbbreviationTable};
use super::form;
use super::strings::StringTable;
use super::Encoding;
use crate::error::{DwarfError, DwarfResult};
use crate::reader::{to_usize, ByteCursor, ULeb128};

/// Everything needed to decode an entry of a particular unit.
///
/// Passed into every entry decode instead of having entries point back at
/// their unit.
#[derive(Clone, Copy)]
pub struct EntryContext<'a>
{
    pub abbreviations: &'a AbbreviationTable,
    /// Offset of the unit's abbreviation set in `.debug_abbrev`.
    pub abbrev_offset: u64,
    pub encoding: Encoding,
}

impl EntryContext<'_>
{
    pub fn declaration(&self, code: ULeb128) -> DwarfResult<Arc<AbbreviationDeclaration>>
    {
        self.abbreviations.declaration(self.abbrev_offset, code)
    }
}

/// Target of a reference-class attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference
{
    /// Offset from the start of the owning unit's header.
    Unit(u64),
    /// Offset into `.debug_info`.
    Section(u64),
    /// 8-byte type signature of a type unit.
    Signature(u64),
}

/// One decoded debug-info entry.
#[derive(Debug, Clone)]
pub struct DebugInfoEntry
{
    offset: usize,
    code: ULeb128,
    declaration: Option<Arc<AbbreviationDeclaration>>,
    attributes: HashMap<DwAt, Vec<u8>>,
    encoding: Encoding,
}

impl DebugInfoEntry
{
    /// Decode the entry at `cursor`, copying each attribute payload verbatim.
    ///
    /// Attributes are measured in declaration order; a payload boundary cannot
    /// be found without measuring everything before it.
    pub fn decode(cursor: &mut ByteCursor<'_>, ctx: &EntryContext<'_>) -> DwarfResult<Self>
    {
        let offset = cursor.offset();
        let code = cursor.read_uleb128()?;
        let mut entry = DebugInfoEntry {
            offset,
            code,
            declaration: None,
            attributes: HashMap::new(),
            encoding: ctx.encoding,
        };
        if code.is_zero() {
            return Ok(entry);
        }

        let declaration = ctx.declaration(code)?;
        for attr in declaration.attributes() {
            let length = form::size_of(attr.form, *cursor, ctx.encoding)?;
            let payload = cursor.read_bytes(length)?;
            entry.attributes.insert(attr.name, payload.to_vec());
        }
        entry.declaration = Some(declaration);
        Ok(entry)
    }

    /// Offset of the entry within `.debug_info`.
    pub fn offset(&self) -> usize
    {
        self.offset
    }

    pub fn code(&self) -> ULeb128
    {
        self.code
    }

    /// True for the zero-code entry that terminates a sibling list.
    pub fn is_null(&self) -> bool
    {
        self.code.is_zero()
    }

    pub fn declaration(&self) -> Option<&AbbreviationDeclaration>
    {
        self.declaration.as_deref()
    }

    pub fn tag(&self) -> Option<DwTag>
    {
        self.declaration.as_ref().map(|decl| decl.tag())
    }

    pub fn has_children(&self) -> bool
    {
        self.declaration.as_ref().is_some_and(|decl| decl.has_children())
    }

    pub fn has_attribute(&self, name: DwAt) -> bool
    {
        self.attributes.contains_key(&name)
    }

    /// Raw payload bytes of an attribute, exactly as stored in the section.
    pub fn raw(&self, name: DwAt) -> Option<&[u8]>
    {
        self.attributes.get(&name).map(Vec::as_slice)
    }

    /// Declared form of an attribute.
    pub fn form(&self, name: DwAt) -> Option<DwForm>
    {
        self.declaration.as_ref().and_then(|decl| decl.form_of(name))
    }

    /// Form and payload with any `indirect` selectors peeled off.
    fn value(&self, name: DwAt) -> DwarfResult<Option<(DwForm, &[u8])>>
    {
        let (Some(mut form), Some(mut bytes)) = (self.form(name), self.raw(name)) else {
            return Ok(None);
        };
        while form == constants::DW_FORM_indirect {
            let mut cursor = ByteCursor::new(bytes);
            let selected = cursor.read_uleb128()?;
            form = selected
                .as_u64()
                .and_then(|raw| u16::try_from(raw).ok())
                .map(DwForm)
                .ok_or_else(|| DwarfError::Decoding(format!("indirect form selector {selected} out of range")))?;
            bytes = &bytes[cursor.offset()..];
        }
        Ok(Some((form, bytes)))
    }

    /// Offset of the unit's line program in `.debug_line` (`DW_AT_stmt_list`).
    ///
    /// Returns `Ok(None)` when the entry has no line table.
    pub fn line_table_offset(&self) -> DwarfResult<Option<u64>>
    {
        let Some((form, bytes)) = self.value(constants::DW_AT_stmt_list)? else {
            return Ok(None);
        };
        let mut cursor = ByteCursor::new(bytes);
        let offset = match form {
            constants::DW_FORM_sec_offset => cursor.read_offset(self.encoding.is64)?,
            constants::DW_FORM_data4 if self.encoding.version < 5 => u64::from(cursor.read_u32()?),
            constants::DW_FORM_data8 if self.encoding.version < 5 => cursor.read_u64()?,
            other => return Err(DwarfError::UnsupportedForm(other)),
        };
        Ok(Some(offset))
    }

    /// Address-class attribute such as `DW_AT_low_pc`.
    pub fn address(&self, name: DwAt) -> DwarfResult<Option<u64>>
    {
        let Some((form, bytes)) = self.value(name)? else {
            return Ok(None);
        };
        match form {
            constants::DW_FORM_addr => Ok(Some(ByteCursor::new(bytes).read_address(self.encoding.address_size)?)),
            constants::DW_FORM_addrx
            | constants::DW_FORM_addrx1
            | constants::DW_FORM_addrx2
            | constants::DW_FORM_addrx3
            | constants::DW_FORM_addrx4
            | constants::DW_FORM_GNU_addr_index => Err(DwarfError::UnsupportedFeature(format!(
                "{name} uses {form}, which needs .debug_addr"
            ))),
            other => Err(DwarfError::UnsupportedForm(other)),
        }
    }

    /// Unsigned constant.
    pub fn udata(&self, name: DwAt) -> DwarfResult<Option<u64>>
    {
        let Some((form, bytes)) = self.value(name)? else {
            return Ok(None);
        };
        let mut cursor = ByteCursor::new(bytes);
        let value = match form {
            constants::DW_FORM_data1 => u64::from(cursor.read_u8()?),
            constants::DW_FORM_data2 => u64::from(cursor.read_u16()?),
            constants::DW_FORM_data4 => u64::from(cursor.read_u32()?),
            constants::DW_FORM_data8 => cursor.read_u64()?,
            constants::DW_FORM_udata => cursor.read_uleb128()?.to_u64("udata value")?,
            constants::DW_FORM_sdata => cursor.read_sleb128()?.to_i64("sdata value")? as u64,
            constants::DW_FORM_implicit_const => self.implicit_const(name)? as u64,
            other => return Err(DwarfError::UnsupportedForm(other)),
        };
        Ok(Some(value))
    }

    /// Signed constant. Fixed-size data forms are sign-extended from their width.
    pub fn sdata(&self, name: DwAt) -> DwarfResult<Option<i64>>
    {
        let Some((form, bytes)) = self.value(name)? else {
            return Ok(None);
        };
        let mut cursor = ByteCursor::new(bytes);
        let value = match form {
            constants::DW_FORM_data1 => i64::from(cursor.read_i8()?),
            constants::DW_FORM_data2 => i64::from(cursor.read_i16()?),
            constants::DW_FORM_data4 => i64::from(cursor.read_i32()?),
            constants::DW_FORM_data8 => cursor.read_i64()?,
            constants::DW_FORM_sdata => cursor.read_sleb128()?.to_i64("sdata value")?,
            constants::DW_FORM_udata => cursor.read_uleb128()?.to_u64("udata value")? as i64,
            constants::DW_FORM_implicit_const => self.implicit_const(name)?,
            other => return Err(DwarfError::UnsupportedForm(other)),
        };
        Ok(Some(value))
    }

    fn implicit_const(&self, name: DwAt) -> DwarfResult<i64>
    {
        self.declaration
            .as_ref()
            .and_then(|decl| decl.implicit_const(name))
            .ok_or_else(|| DwarfError::Decoding(format!("{name} has no implicit constant")))?
            .to_i64("implicit constant")
    }

    pub fn flag(&self, name: DwAt) -> DwarfResult<Option<bool>>
    {
        let Some((form, bytes)) = self.value(name)? else {
            return Ok(None);
        };
        match form {
            constants::DW_FORM_flag => Ok(Some(ByteCursor::new(bytes).read_u8()? != 0)),
            constants::DW_FORM_flag_present => Ok(Some(true)),
            other => Err(DwarfError::UnsupportedForm(other)),
        }
    }

    /// Block or expression payload, without its length prefix.
    ///
    /// Location expressions are returned undecoded.
    pub fn block(&self, name: DwAt) -> DwarfResult<Option<&[u8]>>
    {
        let Some((form, bytes)) = self.value(name)? else {
            return Ok(None);
        };
        let mut cursor = ByteCursor::new(bytes);
        let length = match form {
            constants::DW_FORM_block1 => usize::from(cursor.read_u8()?),
            constants::DW_FORM_block2 => usize::from(cursor.read_u16()?),
            constants::DW_FORM_block4 => to_usize(u64::from(cursor.read_u32()?), "block length")?,
            constants::DW_FORM_block | constants::DW_FORM_exprloc => {
                to_usize(cursor.read_uleb128()?.to_u64("block length")?, "block length")?
            }
            other => return Err(DwarfError::UnsupportedForm(other)),
        };
        Ok(Some(cursor.read_bytes(length)?))
    }

    pub fn reference(&self, name: DwAt) -> DwarfResult<Option<Reference>>
    {
        let Some((form, bytes)) = self.value(name)? else {
            return Ok(None);
        };
        let mut cursor = ByteCursor::new(bytes);
        let reference = match form {
            constants::DW_FORM_ref1 => Reference::Unit(u64::from(cursor.read_u8()?)),
            constants::DW_FORM_ref2 => Reference::Unit(u64::from(cursor.read_u16()?)),
            constants::DW_FORM_ref4 => Reference::Unit(u64::from(cursor.read_u32()?)),
            constants::DW_FORM_ref8 => Reference::Unit(cursor.read_u64()?),
            constants::DW_FORM_ref_udata => Reference::Unit(cursor.read_uleb128()?.to_u64("unit reference")?),
            constants::DW_FORM_ref_addr if self.encoding.version <= 2 => {
                Reference::Section(cursor.read_address(self.encoding.address_size)?)
            }
            constants::DW_FORM_ref_addr => Reference::Section(cursor.read_offset(self.encoding.is64)?),
            constants::DW_FORM_ref_sig8 => Reference::Signature(cursor.read_u64()?),
            constants::DW_FORM_ref_sup4 | constants::DW_FORM_ref_sup8 | constants::DW_FORM_GNU_ref_alt => {
                return Err(DwarfError::UnsupportedFeature(format!(
                    "{name} references a supplementary object file"
                )))
            }
            other => return Err(DwarfError::UnsupportedForm(other)),
        };
        Ok(Some(reference))
    }

    /// String-class attribute, resolved through `.debug_str` or
    /// `.debug_line_str` when the form points into one of them.
    pub fn string(&self, name: DwAt, strings: &StringTable, line_strings: &StringTable) -> DwarfResult<Option<Arc<str>>>
    {
        let Some((form, bytes)) = self.value(name)? else {
            return Ok(None);
        };
        let mut cursor = ByteCursor::new(bytes);
        let (table, section) = match form {
            constants::DW_FORM_string => return Ok(Some(Arc::from(cursor.read_string()?))),
            constants::DW_FORM_strp => (strings, ".debug_str"),
            constants::DW_FORM_line_strp => (line_strings, ".debug_line_str"),
            constants::DW_FORM_strp_sup | constants::DW_FORM_GNU_strp_alt => {
                return Err(DwarfError::UnsupportedFeature(format!(
                    "{name} points into a supplementary object file"
                )))
            }
            constants::DW_FORM_strx
            | constants::DW_FORM_strx1
            | constants::DW_FORM_strx2
            | constants::DW_FORM_strx3
            | constants::DW_FORM_strx4
            | constants::DW_FORM_GNU_str_index => {
                return Err(DwarfError::UnsupportedFeature(format!(
                    "{name} uses {form}, which needs .debug_str_offsets"
                )))
            }
            other => return Err(DwarfError::UnsupportedForm(other)),
        };
        let offset = cursor.read_offset(self.encoding.is64)?;
        table
            .get(offset)
            .map(Some)
            .ok_or_else(|| DwarfError::Decoding(format!("no string at offset 0x{offset:x} in {section}")))
    }
}
