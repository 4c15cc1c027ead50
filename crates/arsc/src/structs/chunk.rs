use winnow::binary::{le_u16, le_u32};
use winnow::prelude::*;

use crate::errors::ArscError;

/// Chunk type codes used by the compiled resource table.
///
/// See: <https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=237>
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u16)]
pub enum ChunkType {
    #[default]
    Null = 0x0000,
    StringPool = 0x0001,
    Table = 0x0002,
    Xml = 0x0003,

    TablePackage = 0x0200,
    TableType = 0x0201,
    TableTypeSpec = 0x0202,
    TableLibrary = 0x0203,
    TableOverlayable = 0x0204,
    TableOverlayablePolicy = 0x0205,
    TableStagedAlias = 0x0206,

    Unknown(u16),
}

impl From<u16> for ChunkType {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => ChunkType::Null,
            0x0001 => ChunkType::StringPool,
            0x0002 => ChunkType::Table,
            0x0003 => ChunkType::Xml,
            0x0200 => ChunkType::TablePackage,
            0x0201 => ChunkType::TableType,
            0x0202 => ChunkType::TableTypeSpec,
            0x0203 => ChunkType::TableLibrary,
            0x0204 => ChunkType::TableOverlayable,
            0x0205 => ChunkType::TableOverlayablePolicy,
            0x0206 => ChunkType::TableStagedAlias,
            other => ChunkType::Unknown(other),
        }
    }
}

impl ChunkType {
    pub fn code(self) -> u16 {
        match self {
            ChunkType::Unknown(v) => v,
            ChunkType::Null => 0x0000,
            ChunkType::StringPool => 0x0001,
            ChunkType::Table => 0x0002,
            ChunkType::Xml => 0x0003,
            ChunkType::TablePackage => 0x0200,
            ChunkType::TableType => 0x0201,
            ChunkType::TableTypeSpec => 0x0202,
            ChunkType::TableLibrary => 0x0203,
            ChunkType::TableOverlayable => 0x0204,
            ChunkType::TableOverlayablePolicy => 0x0205,
            ChunkType::TableStagedAlias => 0x0206,
        }
    }
}

/// Header at the front of every chunk in the resource table.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkHeader {
    /// Type identifier for this chunk. The meaning of the rest of the chunk
    /// depends on it.
    pub kind: ChunkType,

    /// Size of the chunk header in bytes. Data, if any, starts at this
    /// offset from the chunk start.
    pub header_size: u16,

    /// Total size of this chunk in bytes, header and child chunks included.
    pub size: u32,
}

impl ChunkHeader {
    #[inline]
    pub fn parse(input: &mut &[u8]) -> ModalResult<ChunkHeader> {
        (le_u16, le_u16, le_u32)
            .map(|(kind, header_size, size)| ChunkHeader {
                kind: ChunkType::from(kind),
                header_size,
                size,
            })
            .parse_next(input)
    }

    /// Size of the chunk body, the 8 header bytes excluded.
    #[inline(always)]
    pub fn content_size(&self) -> u32 {
        self.size.saturating_sub(Self::size_of() as u32)
    }

    #[inline(always)]
    pub const fn size_of() -> usize {
        // u16 kind + u16 header_size + u32 size
        2 + 2 + 4
    }
}

/// Tracks positions against the full input so chunk-relative offsets can be
/// turned into absolute ones (the publicizer patches by absolute offset).
#[derive(Clone, Copy)]
pub struct ByteSource {
    total: usize,
}

impl ByteSource {
    pub fn new(input: &[u8]) -> ByteSource {
        ByteSource { total: input.len() }
    }

    /// Absolute offset of the next unread byte of `rest`.
    #[inline(always)]
    pub fn offset(&self, rest: &[u8]) -> usize {
        self.total - rest.len()
    }

    /// Fail with [`ArscError::UnalignedRead`] unless the current position is
    /// 4-byte aligned. Only meaningful in strict mode; lenient callers skip
    /// the check.
    pub fn check_alignment(&self, rest: &[u8]) -> Result<(), ArscError> {
        let offset = self.offset(rest);
        if offset % 4 != 0 {
            return Err(ArscError::UnalignedRead(offset));
        }
        Ok(())
    }

    /// Verify a chunk's declared total size fits in the remaining input.
    /// `rest` must point at the first byte after the chunk header.
    pub fn check_chunk(&self, header: &ChunkHeader, rest: &[u8]) -> Result<(), ArscError> {
        let body = header.content_size() as usize;
        if body > rest.len() {
            return Err(ArscError::TruncatedChunk {
                offset: self.offset(rest) - ChunkHeader::size_of(),
                declared: header.size,
                available: rest.len() + ChunkHeader::size_of(),
            });
        }
        Ok(())
    }
}

/// Reposition `input` at the end of a chunk whose header has already been
/// consumed. Used both for deterministic trailing-byte skips and for lenient
/// recovery past a malformed chunk body.
pub fn skip_chunk_body(header: &ChunkHeader, input: &mut &[u8]) -> Result<(), ArscError> {
    let body = header.content_size() as usize;
    if body > input.len() {
        return Err(ArscError::IoFailure("chunk body"));
    }
    *input = &input[body..];
    Ok(())
}

/// Skip whatever the declared header size covers beyond the fields already
/// read. `consumed` counts bytes read since the chunk start.
pub fn skip_header_padding(
    header: &ChunkHeader,
    consumed: usize,
    input: &mut &[u8],
) -> Result<(), ArscError> {
    let declared = header.header_size as usize;
    if declared > consumed {
        let pad = declared - consumed;
        if pad > input.len() {
            return Err(ArscError::IoFailure("chunk header padding"));
        }
        *input = &input[pad..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_fields() {
        let bytes = [0x02, 0x00, 0x0c, 0x00, 0x20, 0x00, 0x00, 0x00];
        let header = ChunkHeader::parse(&mut &bytes[..]).unwrap();
        assert_eq!(header.kind, ChunkType::Table);
        assert_eq!(header.header_size, 12);
        assert_eq!(header.size, 32);
        assert_eq!(header.content_size(), 24);
    }

    #[test]
    fn unknown_type_round_trips_code() {
        assert_eq!(ChunkType::from(0x042), ChunkType::Unknown(0x0042));
        assert_eq!(ChunkType::Unknown(0x0042).code(), 0x0042);
    }

    #[test]
    fn truncated_chunk_is_detected() {
        let source = ByteSource::new(&[0u8; 16]);
        let header = ChunkHeader {
            kind: ChunkType::StringPool,
            header_size: 28,
            size: 64,
        };
        // pretend the header was read at offset 0
        let rest = &[0u8; 8][..];
        let err = source.check_chunk(&header, rest).unwrap_err();
        assert!(matches!(err, ArscError::TruncatedChunk { declared: 64, .. }));
    }

    #[test]
    fn header_padding_is_skipped() {
        let header = ChunkHeader {
            kind: ChunkType::TablePackage,
            header_size: 12,
            size: 16,
        };
        let bytes = [0xAA, 0xBB, 0xCC, 0xDD, 0x01];
        let mut input = &bytes[..];
        // 8 header bytes consumed so far, declared header is 12
        skip_header_padding(&header, 8, &mut input).unwrap();
        assert_eq!(input, &[0x01]);
    }
}
