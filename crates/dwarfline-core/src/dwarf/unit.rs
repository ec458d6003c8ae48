//! Compilation unit headers (`.debug_info`).

use std::sync::Arc;

use gimli::constants::{self, DwUt};
use tracing::debug;

use super::abbrev::AbbreviationTable;
use super::entry::{DebugInfoEntry, EntryContext};
use super::line::{LineProgram, LineProgramCache};
use super::{Encoding, MAX_VERSION, MIN_VERSION};
use crate::error::{DwarfError, DwarfResult};
use crate::reader::{to_usize, ByteCursor};

/// A decoded unit header together with its root entry.
///
/// Only the root entry (normally `DW_TAG_compile_unit`) is decoded; child
/// entries are left in the section.
#[derive(Clone)]
pub struct CompilationUnit
{
    offset: usize,
    length: u64,
    encoding: Encoding,
    unit_type: DwUt,
    abbrev_offset: u64,
    type_signature: Option<u64>,
    type_offset: Option<u64>,
    root: DebugInfoEntry,
    next_offset: usize,
    line_programs: Arc<LineProgramCache>,
}

impl CompilationUnit
{
    /// Decode the unit starting at `cursor`.
    ///
    /// On success the cursor is left at the start of the next unit,
    /// regardless of how much of this unit was actually read.
    ///
    /// ## Errors
    ///
    /// - [`DwarfError::OutOfRange`] if the declared length runs past the section
    /// - [`DwarfError::UnsupportedFeature`] for versions outside 2..=5 and for
    ///   split or skeleton units
    pub fn decode(
        cursor: &mut ByteCursor<'_>,
        abbreviations: &AbbreviationTable,
        line_programs: &Arc<LineProgramCache>,
    ) -> DwarfResult<Self>
    {
        let offset = cursor.offset();
        let (length, is64) = cursor.read_initial_length()?;
        let header_start = cursor.offset();
        let next_offset = header_start
            .checked_add(to_usize(length, "unit length")?)
            .filter(|next| *next <= cursor.len())
            .ok_or(DwarfError::OutOfRange {
                offset: header_start,
                wanted: usize::try_from(length).unwrap_or(usize::MAX),
                len: cursor.len(),
            })?;

        let version = cursor.read_u16()?;
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(DwarfError::UnsupportedFeature(format!(
                "unit version {version} at offset 0x{offset:x}"
            )));
        }

        let mut type_signature = None;
        let mut type_offset = None;
        let (unit_type, address_size, abbrev_offset) = if version >= 5 {
            let unit_type = DwUt(cursor.read_u8()?);
            let address_size = cursor.read_u8()?;
            let abbrev_offset = cursor.read_offset(is64)?;
            match unit_type {
                constants::DW_UT_compile | constants::DW_UT_partial => {}
                constants::DW_UT_type => {
                    type_signature = Some(cursor.read_u64()?);
                    type_offset = Some(cursor.read_offset(is64)?);
                }
                constants::DW_UT_skeleton | constants::DW_UT_split_compile | constants::DW_UT_split_type => {
                    return Err(DwarfError::UnsupportedFeature(format!(
                        "split DWARF unit ({unit_type}) at offset 0x{offset:x}"
                    )))
                }
                other => {
                    return Err(DwarfError::Decoding(format!(
                        "unknown unit type {other} at offset 0x{offset:x}"
                    )))
                }
            }
            (unit_type, address_size, abbrev_offset)
        } else {
            let abbrev_offset = cursor.read_offset(is64)?;
            let address_size = cursor.read_u8()?;
            (constants::DW_UT_compile, address_size, abbrev_offset)
        };

        let encoding = Encoding {
            is64,
            version,
            address_size,
        };
        let ctx = EntryContext {
            abbreviations,
            abbrev_offset,
            encoding,
        };
        let root = DebugInfoEntry::decode(cursor, &ctx)?;

        // the root entry is all we read; skip its children
        cursor.set_offset(next_offset);

        debug!(
            offset,
            version,
            unit_type = %unit_type,
            address_size,
            abbrev_offset,
            "decoded compilation unit"
        );

        Ok(CompilationUnit {
            offset,
            length,
            encoding,
            unit_type,
            abbrev_offset,
            type_signature,
            type_offset,
            root,
            next_offset,
            line_programs: Arc::clone(line_programs),
        })
    }

    /// Offset of the unit header in `.debug_info`.
    pub fn offset(&self) -> usize
    {
        self.offset
    }

    /// Unit length as declared, excluding the initial-length field.
    pub fn length(&self) -> u64
    {
        self.length
    }

    /// Offset one past the end of this unit.
    pub fn next_offset(&self) -> usize
    {
        self.next_offset
    }

    pub fn encoding(&self) -> Encoding
    {
        self.encoding
    }

    pub fn version(&self) -> u16
    {
        self.encoding.version
    }

    pub fn is64(&self) -> bool
    {
        self.encoding.is64
    }

    pub fn address_size(&self) -> u8
    {
        self.encoding.address_size
    }

    /// Unit type; pre-v5 units are always `DW_UT_compile`.
    pub fn unit_type(&self) -> DwUt
    {
        self.unit_type
    }

    pub fn abbrev_offset(&self) -> u64
    {
        self.abbrev_offset
    }

    /// Type signature of a `DW_UT_type` unit.
    pub fn type_signature(&self) -> Option<u64>
    {
        self.type_signature
    }

    /// Unit-relative offset of the type entry of a `DW_UT_type` unit.
    pub fn type_offset(&self) -> Option<u64>
    {
        self.type_offset
    }

    pub fn root(&self) -> &DebugInfoEntry
    {
        &self.root
    }

    /// The unit's line program, decoded on first request.
    ///
    /// Returns `Ok(None)` when the root entry has no `DW_AT_stmt_list`.
    pub fn line_program(&self) -> DwarfResult<Option<Arc<LineProgram>>>
    {
        let Some(offset) = self.root.line_table_offset()? else {
            return Ok(None);
        };
        self.line_programs.get(offset, self.encoding.address_size).map(Some)
    }
}

impl std::fmt::Debug for CompilationUnit
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("CompilationUnit")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("encoding", &self.encoding)
            .field("unit_type", &self.unit_type)
            .field("abbrev_offset", &self.abbrev_offset)
            .field("root", &self.root.tag())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::dwarf::strings::StringTable;

    // code 1: compile_unit, no children, name: string
    const ABBREV: &[u8] = &[0x01, 0x11, 0x00, 0x03, 0x08, 0x00, 0x00, 0x00];

    fn programs() -> Arc<LineProgramCache>
    {
        Arc::new(LineProgramCache::new(
            Arc::from(Vec::<u8>::new()),
            Arc::new(StringTable::empty()),
            Arc::new(StringTable::empty()),
        ))
    }

    fn v4_unit(padding: usize) -> Vec<u8>
    {
        let mut body = Vec::new();
        body.extend_from_slice(&4u16.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.push(8);
        body.push(0x01);
        body.extend_from_slice(b"x.c\0");
        body.extend(std::iter::repeat(0).take(padding));

        let mut unit = (body.len() as u32).to_le_bytes().to_vec();
        unit.extend_from_slice(&body);
        unit
    }

    #[test]
    fn test_next_offset_includes_initial_length()
    {
        let abbreviations = AbbreviationTable::new(Arc::from(ABBREV));
        let mut section = v4_unit(5);
        section.extend_from_slice(&v4_unit(0));

        let mut cursor = ByteCursor::new(&section);
        let unit = CompilationUnit::decode(&mut cursor, &abbreviations, &programs()).unwrap();
        assert_eq!(unit.next_offset(), unit.length() as usize + 4);
        assert_eq!(cursor.offset(), unit.next_offset());
        assert_eq!(unit.root().tag(), Some(constants::DW_TAG_compile_unit));

        let second = CompilationUnit::decode(&mut cursor, &abbreviations, &programs()).unwrap();
        assert_eq!(second.offset(), unit.next_offset());
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_dwarf64_v5_unit()
    {
        let abbreviations = AbbreviationTable::new(Arc::from(ABBREV));
        let mut body = Vec::new();
        body.extend_from_slice(&5u16.to_le_bytes());
        body.push(constants::DW_UT_compile.0);
        body.push(8);
        body.extend_from_slice(&0u64.to_le_bytes());
        body.push(0x01);
        body.extend_from_slice(b"y.c\0");

        let mut section = vec![0xff, 0xff, 0xff, 0xff];
        section.extend_from_slice(&(body.len() as u64).to_le_bytes());
        section.extend_from_slice(&body);

        let mut cursor = ByteCursor::new(&section);
        let unit = CompilationUnit::decode(&mut cursor, &abbreviations, &programs()).unwrap();
        assert!(unit.is64());
        assert_eq!(unit.version(), 5);
        assert_eq!(unit.next_offset(), section.len());
        assert_eq!(unit.next_offset(), unit.length() as usize + 12);
    }

    #[test]
    fn test_type_unit_keeps_signature()
    {
        let abbreviations = AbbreviationTable::new(Arc::from(ABBREV));
        let mut body = Vec::new();
        body.extend_from_slice(&5u16.to_le_bytes());
        body.push(constants::DW_UT_type.0);
        body.push(8);
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&0xdead_beef_u64.to_le_bytes());
        body.extend_from_slice(&0x1cu32.to_le_bytes());
        body.push(0x01);
        body.extend_from_slice(b"t\0");

        let mut section = (body.len() as u32).to_le_bytes().to_vec();
        section.extend_from_slice(&body);

        let unit = CompilationUnit::decode(&mut ByteCursor::new(&section), &abbreviations, &programs()).unwrap();
        assert_eq!(unit.unit_type(), constants::DW_UT_type);
        assert_eq!(unit.type_signature(), Some(0xdead_beef));
        assert_eq!(unit.type_offset(), Some(0x1c));
    }

    #[test]
    fn test_split_unit_rejected()
    {
        let abbreviations = AbbreviationTable::new(Arc::from(ABBREV));
        let mut body = Vec::new();
        body.extend_from_slice(&5u16.to_le_bytes());
        body.push(constants::DW_UT_skeleton.0);
        body.push(8);
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&[0; 8]);
        let mut section = (body.len() as u32).to_le_bytes().to_vec();
        section.extend_from_slice(&body);

        let err = CompilationUnit::decode(&mut ByteCursor::new(&section), &abbreviations, &programs()).unwrap_err();
        assert!(matches!(err, DwarfError::UnsupportedFeature(_)));
    }

    #[test]
    fn test_unsupported_version()
    {
        let abbreviations = AbbreviationTable::new(Arc::from(ABBREV));
        let section = [0x07, 0x00, 0x00, 0x00, 0x06, 0x00, 0, 0, 0, 0, 8];
        let err = CompilationUnit::decode(&mut ByteCursor::new(&section), &abbreviations, &programs()).unwrap_err();
        assert!(matches!(err, DwarfError::UnsupportedFeature(_)));
    }

    #[test]
    fn test_length_past_section()
    {
        let abbreviations = AbbreviationTable::new(Arc::from(ABBREV));
        let mut section = v4_unit(0);
        section[0] = 0x40;
        let err = CompilationUnit::decode(&mut ByteCursor::new(&section), &abbreviations, &programs()).unwrap_err();
        assert!(matches!(err, DwarfError::OutOfRange { .. }));
    }

    #[test]
    fn test_missing_stmt_list_has_no_program()
    {
        let abbreviations = AbbreviationTable::new(Arc::from(ABBREV));
        let section = v4_unit(0);
        let unit = CompilationUnit::decode(&mut ByteCursor::new(&section), &abbreviations, &programs()).unwrap();
        assert!(unit.line_program().unwrap().is_none());
    }
}
