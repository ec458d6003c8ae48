//! Abbreviation tables (`.debug_abbrev`).
//!
//! Each compilation unit names the offset of its abbreviation set. A set is a
//! run of declarations, each introduced by a non-zero code and describing a
//! tag, a children flag, and the ordered (attribute, form) layout of every
//! entry that uses the code. A code of zero ends the set.

use std::collections::HashMap;
use std::sync::Arc;

use gimli::constants::{self, DwAt, DwForm, DwTag};
use smallvec::SmallVec;
use tracing::debug;

use crate::cache::MemoCache;
use crate::error::{DwarfError, DwarfResult};
use crate::reader::{to_usize, ByteCursor, SLeb128, ULeb128};

/// One (attribute, form) pair of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec
{
    pub name: DwAt,
    pub form: DwForm,
    /// Value carried by the declaration itself when `form` is `implicit_const`.
    pub implicit_const: Option<SLeb128>,
}

/// Decoded abbreviation declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbbreviationDeclaration
{
    code: ULeb128,
    tag: DwTag,
    has_children: bool,
    attributes: SmallVec<[AttributeSpec; 8]>,
    forms: HashMap<DwAt, DwForm>,
    implicit_consts: HashMap<DwAt, SLeb128>,
}

impl AbbreviationDeclaration
{
    pub fn code(&self) -> ULeb128
    {
        self.code
    }

    pub fn tag(&self) -> DwTag
    {
        self.tag
    }

    pub fn has_children(&self) -> bool
    {
        self.has_children
    }

    /// Attributes in declaration order, which is also payload order.
    pub fn attributes(&self) -> &[AttributeSpec]
    {
        &self.attributes
    }

    pub fn form_of(&self, name: DwAt) -> Option<DwForm>
    {
        self.forms.get(&name).copied()
    }

    pub fn implicit_const(&self, name: DwAt) -> Option<SLeb128>
    {
        self.implicit_consts.get(&name).copied()
    }

    fn decode(code: ULeb128, cursor: &mut ByteCursor<'_>) -> DwarfResult<Self>
    {
        let raw_tag = cursor.read_uleb128()?;
        let tag = narrow_u16(raw_tag, "abbreviation tag").map(DwTag)?;

        let has_children = match cursor.read_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(DwarfError::Decoding(format!(
                    "abbreviation {code} has malformed children flag 0x{other:02x}"
                )))
            }
        };

        let mut declaration = AbbreviationDeclaration {
            code,
            tag,
            has_children,
            attributes: SmallVec::new(),
            forms: HashMap::new(),
            implicit_consts: HashMap::new(),
        };

        loop {
            let name = cursor.read_uleb128()?;
            let form = cursor.read_uleb128()?;
            if name.is_zero() && form.is_zero() {
                break;
            }

            let name = narrow_u16(name, "attribute name").map(DwAt)?;
            let form = narrow_u16(form, "attribute form").map(DwForm)?;
            let implicit_const = if form == constants::DW_FORM_implicit_const {
                let value = cursor.read_sleb128()?;
                declaration.implicit_consts.insert(name, value);
                Some(value)
            } else {
                None
            };

            if declaration.forms.insert(name, form).is_some() {
                return Err(DwarfError::Decoding(format!(
                    "abbreviation {code} declares attribute {name} twice"
                )));
            }
            declaration.attributes.push(AttributeSpec {
                name,
                form,
                implicit_const,
            });
        }

        Ok(declaration)
    }
}

fn narrow_u16(value: ULeb128, what: &str) -> DwarfResult<u16>
{
    value
        .as_u64()
        .and_then(|raw| u16::try_from(raw).ok())
        .ok_or_else(|| DwarfError::Decoding(format!("{what} {value} out of range")))
}

/// Declarations of one set, keyed by code.
pub type AbbreviationSet = HashMap<ULeb128, Arc<AbbreviationDeclaration>>;

/// Lazily decoded `.debug_abbrev` section.
///
/// Sets are decoded on first access to their offset and cached for the
/// lifetime of the table.
pub struct AbbreviationTable
{
    data: Arc<[u8]>,
    sets: MemoCache<u64, Arc<AbbreviationSet>>,
}

impl AbbreviationTable
{
    pub fn new(data: Arc<[u8]>) -> Self
    {
        Self {
            data,
            sets: MemoCache::new(),
        }
    }

    /// Declaration `code` of the set starting at `offset`.
    ///
    /// ## Errors
    ///
    /// Fails if the set cannot be decoded or does not declare `code`.
    pub fn declaration(&self, offset: u64, code: ULeb128) -> DwarfResult<Arc<AbbreviationDeclaration>>
    {
        let set = self.set(offset)?;
        set.get(&code).cloned().ok_or_else(|| {
            DwarfError::Decoding(format!(
                "abbreviation code {code} not found in set at offset 0x{offset:x}"
            ))
        })
    }

    /// The whole declaration set starting at `offset`.
    pub fn set(&self, offset: u64) -> DwarfResult<Arc<AbbreviationSet>>
    {
        self.sets.get_or_try_insert_with(offset, || self.decode_set(offset).map(Arc::new))
    }

    /// Number of sets decoded so far.
    pub fn cached_sets(&self) -> usize
    {
        self.sets.len()
    }

    fn decode_set(&self, offset: u64) -> DwarfResult<AbbreviationSet>
    {
        let start = to_usize(offset, "abbreviation offset")?;
        if start >= self.data.len() {
            return Err(DwarfError::Decoding(format!(
                "abbreviation offset 0x{offset:x} is past the end of .debug_abbrev (0x{:x} bytes)",
                self.data.len()
            )));
        }

        let mut cursor = ByteCursor::at(&self.data, start);
        let mut set = AbbreviationSet::new();
        while !cursor.is_at_end() {
            let code = cursor.read_uleb128()?;
            if code.is_zero() {
                break;
            }

            let declaration = AbbreviationDeclaration::decode(code, &mut cursor)?;
            if set.insert(code, Arc::new(declaration)).is_some() {
                return Err(DwarfError::Decoding(format!(
                    "abbreviation code {code} declared twice in set at offset 0x{offset:x}"
                )));
            }
        }

        debug!(offset, declarations = set.len(), "decoded abbreviation set");
        Ok(set)
    }
}
