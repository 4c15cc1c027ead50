use bitflags::bitflags;
use log::warn;
use winnow::binary::{le_u16, le_u32, u8};
use winnow::combinator::repeat;
use winnow::error::{ErrMode, Needed};
use winnow::prelude::*;
use winnow::token::take;

use crate::structs::chunk::ChunkHeader;
use crate::structs::config::ResConfig;
use crate::structs::value::RawValue;

/// Entry index sentinel in dense offset tables.
pub const NO_ENTRY: u32 = 0xFFFF_FFFF;
/// Entry index sentinel in 16-bit offset tables.
pub const NO_ENTRY16: u16 = 0xFFFF;

/// Decode a fixed-width, NUL-padded UTF-16 name field.
fn decode_utf16_name(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .take_while(|&unit| unit != 0)
        .collect();

    String::from_utf16_lossy(&units)
}

/// Table chunk header: the package count, followed by the global value
/// string pool.
#[derive(Debug)]
pub struct TableHeader {
    pub header: ChunkHeader,
    pub package_count: u32,
}

impl TableHeader {
    #[inline(always)]
    pub fn parse(input: &mut &[u8]) -> ModalResult<TableHeader> {
        (ChunkHeader::parse, le_u32)
            .map(|(header, package_count)| TableHeader {
                header,
                package_count,
            })
            .parse_next(input)
    }
}

/// Package chunk header. The name field is 128 UTF-16 code units,
/// NUL padded.
#[derive(Debug)]
pub struct PackageHeader {
    pub header: ChunkHeader,
    pub id: u32,
    pub name: String,
    pub type_strings_offset: u32,
    pub key_strings_offset: u32,
    pub type_id_offset: u32,
}

impl PackageHeader {
    /// Header size with the `type_id_offset` field present.
    const FULL_SIZE: u16 = (ChunkHeader::size_of() + 4 + 256 + 4 * 5) as u16;

    pub fn parse(header: ChunkHeader, input: &mut &[u8]) -> ModalResult<PackageHeader> {
        let (id, name, type_strings_offset, _last_public_type, key_strings_offset, _last_public_key) =
            (le_u32, take(256usize), le_u32, le_u32, le_u32, le_u32).parse_next(input)?;

        let name = decode_utf16_name(name);

        // older toolchains omit type_id_offset; any other size means the
        // header declares padding we have to step over
        let mut type_id_offset = 0;
        match header.header_size {
            s if s == Self::FULL_SIZE => {
                type_id_offset = le_u32.parse_next(input)?;
            }
            s if s == Self::FULL_SIZE - 4 => {}
            s => {
                type_id_offset = le_u32.parse_next(input)?;
                let skipped = s.saturating_sub(Self::FULL_SIZE);
                let _ = take(skipped as usize).parse_next(input)?;
                warn!("package header of {} bytes, skipped {} extra", s, skipped);
            }
        }

        Ok(PackageHeader {
            header,
            id,
            name,
            type_strings_offset,
            key_strings_offset,
            type_id_offset,
        })
    }
}

bitflags! {
    /// Per-entry flags inside a type chunk.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u16 {
        /// Entry is a bag of name/value mappings, not a single value.
        const COMPLEX = 0x0001;

        /// Entry is declared public for reference from other packages.
        const PUBLIC = 0x0002;

        /// Weak entry, may be overridden by a strong one of the same name.
        const WEAK = 0x0004;

        /// Compact entry: 16-bit key, type in the flag high byte, data inline.
        const COMPACT = 0x0008;
    }
}

bitflags! {
    /// Layout flags of a type chunk.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeFlags: u8 {
        /// Entries are `(index, offset/4)` pairs sorted for binary search.
        const SPARSE = 0x01;

        /// Dense offsets are 16-bit, `real = offset * 4`, 0xFFFF absent.
        const OFFSET16 = 0x02;
    }
}

/// A type-spec chunk: per-entry configuration masks for one type id.
#[derive(Debug)]
pub struct TypeSpecChunk {
    pub id: u8,
    pub entry_count: u32,
    pub flags: Vec<u32>,
    /// Absolute offset of the flag array in the input, for the publicizer.
    pub flags_offset: usize,
}

impl TypeSpecChunk {
    /// `flags_offset_base` is the absolute offset of the first byte after
    /// the chunk header.
    pub fn parse(
        header: ChunkHeader,
        input: &mut &[u8],
        flags_offset_base: usize,
    ) -> ModalResult<TypeSpecChunk> {
        let start_len = input.len();
        let (id, _res0, _types_count, entry_count) =
            (u8, u8, le_u16, le_u32).parse_next(input)?;

        // honor a larger declared header before the flag array
        let consumed = ChunkHeader::size_of() + (start_len - input.len());
        if header.header_size as usize > consumed {
            let _ = take(header.header_size as usize - consumed).parse_next(input)?;
        }

        let flags_offset = flags_offset_base + (start_len - input.len());
        let flags = repeat(entry_count as usize, le_u32).parse_next(input)?;

        Ok(TypeSpecChunk {
            id,
            entry_count,
            flags,
            flags_offset,
        })
    }
}

/// Payload of one present entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryData {
    /// An inline typed value.
    Simple(RawValue),
    /// Compact form: the value type travels in the flag high byte.
    Compact { data_type: u8, data: u32 },
    /// A bag: parent reference plus ordered `(name_id, value)` children.
    Bag {
        parent: u32,
        items: Vec<(u32, RawValue)>,
    },
}

/// One decoded table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub flags: EntryFlags,
    pub key_index: u32,
    pub data: EntryData,
}

impl Entry {
    pub fn parse(input: &mut &[u8]) -> ModalResult<Entry> {
        let (size_or_key, raw_flags, key_or_data) = (le_u16, le_u16, le_u32).parse_next(input)?;
        let flags = EntryFlags::from_bits_truncate(raw_flags);

        if flags.contains(EntryFlags::COMPACT) {
            return Ok(Entry {
                flags,
                key_index: size_or_key as u32,
                data: EntryData::Compact {
                    data_type: (raw_flags >> 8) as u8,
                    data: key_or_data,
                },
            });
        }

        let key_index = key_or_data;
        if flags.contains(EntryFlags::COMPLEX) {
            let (parent, count) = (le_u32, le_u32).parse_next(input)?;
            let items = repeat(count as usize, (le_u32, RawValue::parse)).parse_next(input)?;
            return Ok(Entry {
                flags,
                key_index,
                data: EntryData::Bag { parent, items },
            });
        }

        Ok(Entry {
            flags,
            key_index,
            data: EntryData::Simple(RawValue::parse(input)?),
        })
    }
}

/// A type chunk: one configuration's worth of entries for a type id.
#[derive(Debug)]
pub struct TypeChunk {
    pub id: u8,
    pub flags: TypeFlags,
    pub entry_count: u32,
    pub config: ResConfig,
    /// Present entries as `(entry index, entry)`, in declaration order.
    pub entries: Vec<(u16, Entry)>,
}

impl TypeChunk {
    pub fn parse(header: ChunkHeader, input: &mut &[u8]) -> ModalResult<TypeChunk> {
        let start_len = input.len();
        let (id, flags, _reserved, entry_count, entries_start) =
            (u8, u8, le_u16, le_u32, le_u32).parse_next(input)?;
        let flags = TypeFlags::from_bits_truncate(flags);

        let config = ResConfig::parse(input)?;

        let consumed = ChunkHeader::size_of() + (start_len - input.len());
        if header.header_size as usize > consumed {
            let _ = take(header.header_size as usize - consumed).parse_next(input)?;
        }

        // the offset table (dense) or index pairs (sparse)
        let offsets: Vec<(u16, u32)> = if flags.contains(TypeFlags::SPARSE) {
            repeat(
                entry_count as usize,
                (le_u16, le_u16).map(|(idx, quads)| (idx, quads as u32 * 4)),
            )
            .parse_next(input)?
        } else if flags.contains(TypeFlags::OFFSET16) {
            let raw: Vec<u16> = repeat(entry_count as usize, le_u16).parse_next(input)?;
            raw.into_iter()
                .enumerate()
                .filter(|&(_, offset)| offset != NO_ENTRY16)
                .map(|(idx, offset)| (idx as u16, offset as u32 * 4))
                .collect()
        } else {
            let raw: Vec<u32> = repeat(entry_count as usize, le_u32).parse_next(input)?;
            raw.into_iter()
                .enumerate()
                .filter(|&(_, offset)| offset != NO_ENTRY)
                .map(|(idx, offset)| (idx as u16, offset))
                .collect()
        };

        // carve the entry region so a bad offset cannot escape the chunk
        let consumed = ChunkHeader::size_of() + (start_len - input.len());
        let gap = (entries_start as usize).saturating_sub(consumed);
        let entries_size = (header.size as usize).saturating_sub(entries_start as usize);
        let (region, rest) = input
            .split_at_checked(gap + entries_size)
            .ok_or_else(|| ErrMode::Incomplete(Needed::Unknown))?;
        *input = rest;
        let region = &region[gap..];

        let mut entries = Vec::with_capacity(offsets.len());
        for (idx, offset) in offsets {
            let Some(mut slice) = region.get(offset as usize..) else {
                warn!(
                    "entry {} of type {} points past its chunk (offset 0x{:x})",
                    idx, id, offset
                );
                continue;
            };
            entries.push((idx, Entry::parse(&mut slice)?));
        }

        Ok(TypeChunk {
            id,
            flags,
            entry_count,
            config,
            entries,
        })
    }

    pub fn is_sparse(&self) -> bool {
        self.flags.contains(TypeFlags::SPARSE)
    }
}

/// Shared-library chunk: package-id to package-name mappings.
#[derive(Debug)]
pub struct LibraryChunk {
    pub entries: Vec<(u32, String)>,
}

impl LibraryChunk {
    pub fn parse(input: &mut &[u8]) -> ModalResult<LibraryChunk> {
        let count = le_u32.parse_next(input)?;
        let entries = repeat(
            count as usize,
            (le_u32, take(256usize))
                .map(|(id, name): (u32, &[u8])| (id, decode_utf16_name(name))),
        )
        .parse_next(input)?;

        Ok(LibraryChunk { entries })
    }
}

/// Staged-alias chunk: staged id to finalized id pairs.
#[derive(Debug)]
pub struct StagedAliasChunk {
    pub entries: Vec<(u32, u32)>,
}

impl StagedAliasChunk {
    pub fn parse(input: &mut &[u8]) -> ModalResult<StagedAliasChunk> {
        let count = le_u32.parse_next(input)?;
        let entries = repeat(count as usize, (le_u32, le_u32)).parse_next(input)?;

        Ok(StagedAliasChunk { entries })
    }
}

/// Overlayable chunk: the name/actor pair; policies follow as child chunks.
#[derive(Debug)]
pub struct OverlayableChunk {
    pub name: String,
    pub actor: String,
}

impl OverlayableChunk {
    pub fn parse(input: &mut &[u8]) -> ModalResult<OverlayableChunk> {
        (take(512usize), take(512usize))
            .map(|(name, actor): (&[u8], &[u8])| OverlayableChunk {
                name: decode_utf16_name(name),
                actor: decode_utf16_name(actor),
            })
            .parse_next(input)
    }
}

/// Overlayable-policy chunk: policy flags plus the ids it covers.
#[derive(Debug)]
pub struct OverlayablePolicyChunk {
    pub policy_flags: u32,
    pub entries: Vec<u32>,
}

impl OverlayablePolicyChunk {
    pub fn parse(input: &mut &[u8]) -> ModalResult<OverlayablePolicyChunk> {
        let (policy_flags, entry_count) = (le_u32, le_u32).parse_next(input)?;
        let entries = repeat(entry_count as usize, le_u32).parse_next(input)?;

        Ok(OverlayablePolicyChunk {
            policy_flags,
            entries,
        })
    }
}
