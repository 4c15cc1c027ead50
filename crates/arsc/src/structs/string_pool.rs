use bitflags::bitflags;
use log::warn;
use smallvec::SmallVec;
use winnow::binary::{le_u16, le_u32, u8};
use winnow::combinator::repeat;
use winnow::error::{ErrMode, Needed};
use winnow::prelude::*;
use winnow::token::take;

use crate::errors::ArscError;
use crate::structs::chunk::ChunkHeader;

bitflags! {
    #[derive(Debug, Clone, Copy)]
    pub struct PoolFlags: u32 {
        /// Strings are sorted by value
        const SORTED = 1 << 0;

        /// Strings are UTF-8 encoded (UTF-16 otherwise)
        const UTF8 = 1 << 8;
    }
}

/// One styled region of a pool string.
///
/// `tag` references another pool string naming the markup element
/// (`b`, `i`, or `font;color=#ff0000` style tag;attr pairs); `first` and
/// `last` are inclusive character indices into the styled string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleSpan {
    pub tag: u32,
    pub first: u32,
    pub last: u32,
}

impl StyleSpan {
    /// Terminates a span list inside the style data.
    const END: u32 = 0xFFFF_FFFF;
}

pub type SpanList = SmallVec<[StyleSpan; 2]>;

#[derive(Debug)]
pub struct PoolHeader {
    pub header: ChunkHeader,
    pub string_count: u32,
    pub style_count: u32,
    pub flags: PoolFlags,
    pub strings_start: u32,
    pub styles_start: u32,
}

impl PoolHeader {
    pub fn parse(input: &mut &[u8]) -> ModalResult<PoolHeader> {
        let header = ChunkHeader::parse(input)?;
        let (string_count, style_count, flags, strings_start, styles_start) =
            (le_u32, le_u32, le_u32, le_u32, le_u32).parse_next(input)?;

        Ok(PoolHeader {
            header,
            string_count,
            style_count,
            flags: PoolFlags::from_bits_truncate(flags),
            strings_start,
            styles_start,
        })
    }

    #[inline]
    pub fn is_utf8(&self) -> bool {
        self.flags.contains(PoolFlags::UTF8)
    }

    #[inline]
    pub fn is_sorted(&self) -> bool {
        self.flags.contains(PoolFlags::SORTED)
    }

    #[inline]
    pub const fn size_of() -> usize {
        ChunkHeader::size_of() + 5 * 4
    }
}

/// A decoded string pool: interned strings plus their optional style spans.
#[derive(Debug, Default)]
pub struct StringPool {
    strings: Vec<String>,
    styles: Vec<SpanList>,
    utf8: bool,
    sorted: bool,
}

/// Lookup sentinel for out-of-range indices.
const EMPTY: &str = "";

impl StringPool {
    /// Decode a whole pool chunk. The cursor is left at the chunk end
    /// regardless of trailing padding.
    pub fn parse(input: &mut &[u8], lenient: bool) -> ModalResult<StringPool> {
        let start_len = input.len();
        let mut header = PoolHeader::parse(input)?;

        // malformed pools sometimes lie about the string count; the offset
        // table between header and strings_start is authoritative
        let table_bytes = header
            .strings_start
            .saturating_sub(PoolHeader::size_of() as u32 + header.style_count * 4);
        let derived_count = table_bytes / 4;
        if header.string_count != derived_count && header.strings_start != 0 {
            warn!(
                "string pool declares {} strings, offset table holds {}",
                header.string_count, derived_count
            );
            if lenient {
                header.string_count = derived_count;
            }
        }

        let string_offsets: Vec<u32> =
            repeat(header.string_count as usize, le_u32).parse_next(input)?;
        let style_offsets: Vec<u32> =
            repeat(header.style_count as usize, le_u32).parse_next(input)?;

        // carve the rest of the chunk out of the input so damaged string data
        // cannot run past the chunk boundary
        let consumed = start_len - input.len();
        let body_size = (header.header.size as usize).saturating_sub(consumed);
        let (body, rest) = input
            .split_at_checked(body_size)
            .ok_or_else(|| ErrMode::Incomplete(Needed::Unknown))?;
        *input = rest;

        // string and style data offsets are relative to the chunk start
        let string_data = (header.strings_start as usize)
            .checked_sub(consumed)
            .and_then(|base| body.get(base..))
            .ok_or_else(|| ErrMode::Incomplete(Needed::Unknown))?;
        let strings = Self::parse_strings(string_data, &header, &string_offsets);

        let styles = if header.style_count > 0 && header.styles_start != 0 {
            let style_data = (header.styles_start as usize)
                .checked_sub(consumed)
                .and_then(|base| body.get(base..))
                .ok_or_else(|| ErrMode::Incomplete(Needed::Unknown))?;
            Self::parse_styles(style_data, &style_offsets)
        } else {
            Vec::new()
        };

        Ok(StringPool {
            strings,
            styles,
            utf8: header.is_utf8(),
            sorted: header.is_sorted(),
        })
    }

    fn parse_strings(data: &[u8], header: &PoolHeader, offsets: &[u32]) -> Vec<String> {
        let is_utf8 = header.is_utf8();
        let mut strings = Vec::with_capacity(offsets.len());

        for &offset in offsets {
            match data.get(offset as usize..) {
                Some(mut slice) => {
                    strings.push(Self::parse_string(&mut slice, is_utf8).unwrap_or_default())
                }
                None => {
                    warn!("string offset 0x{:x} past pool data", offset);
                    strings.push(String::new());
                }
            }
        }

        strings
    }

    /// Decode one length-prefixed string.
    ///
    /// UTF-16 carries a u16 char length (high bit selects a 4-byte extended
    /// form), UTF-8 carries a u8 char length followed by a u8 byte length
    /// (each with a 2-byte extended form). Both are NUL terminated.
    fn parse_string(input: &mut &[u8], is_utf8: bool) -> ModalResult<String> {
        if !is_utf8 {
            let len = le_u16.parse_next(input)?;
            let chars = if len & 0x8000 != 0 {
                let low = le_u16.parse_next(input)?;
                (((len & 0x7FFF) as u32) << 16 | low as u32) as usize
            } else {
                len as usize
            };

            let content = take(chars * 2).parse_next(input)?;
            let _ = le_u16.parse_next(input)?;

            Ok(Self::decode_utf16(content, chars))
        } else {
            // char length first, then the byte length that actually matters
            let char_len = u8.parse_next(input)?;
            if char_len & 0x80 != 0 {
                let _ = u8.parse_next(input)?;
            }

            let byte_len = u8.parse_next(input)?;
            let bytes = if byte_len & 0x80 != 0 {
                let low = u8.parse_next(input)?;
                ((byte_len as u32 & 0x7F) << 8) | low as u32
            } else {
                byte_len as u32
            };

            let content = take(bytes).parse_next(input)?;
            let _ = u8.parse_next(input)?;

            Ok(String::from_utf8_lossy(content).into_owned())
        }
    }

    fn decode_utf16(slice: &[u8], chars: usize) -> String {
        char::decode_utf16(
            slice
                .chunks_exact(2)
                .take(chars)
                .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]])),
        )
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
    }

    fn parse_styles(data: &[u8], offsets: &[u32]) -> Vec<SpanList> {
        let mut styles = Vec::with_capacity(offsets.len());

        for &offset in offsets {
            let mut spans = SpanList::new();
            let mut slice = match data.get(offset as usize..) {
                Some(s) => s,
                None => {
                    warn!("style offset 0x{:x} past style data", offset);
                    styles.push(spans);
                    continue;
                }
            };

            loop {
                let Ok(tag): Result<u32, winnow::error::ContextError> =
                    le_u32.parse_next(&mut slice)
                else {
                    break;
                };
                if tag == StyleSpan::END {
                    break;
                }
                let Ok((first, last)): Result<(u32, u32), winnow::error::ContextError> =
                    (le_u32, le_u32).parse_next(&mut slice)
                else {
                    break;
                };
                spans.push(StyleSpan { tag, first, last });
            }

            styles.push(spans);
        }

        styles
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn is_utf8(&self) -> bool {
        self.utf8
    }

    /// Lookup by index; out-of-range yields the empty sentinel.
    pub fn get(&self, idx: u32) -> &str {
        self.strings.get(idx as usize).map_or(EMPTY, String::as_str)
    }

    /// Strict lookup for callers that must surface bad indices.
    pub fn get_checked(&self, idx: u32) -> Result<&str, ArscError> {
        self.strings
            .get(idx as usize)
            .map(String::as_str)
            .ok_or(ArscError::StringPoolIndexOutOfRange {
                index: idx,
                count: self.strings.len() as u32,
            })
    }

    /// Style spans attached to string `idx`, empty when unstyled.
    pub fn spans(&self, idx: u32) -> &[StyleSpan] {
        self.styles.get(idx as usize).map_or(&[], SmallVec::as_slice)
    }

    #[cfg(test)]
    pub(crate) fn from_strings(strings: Vec<String>) -> StringPool {
        StringPool {
            strings,
            styles: Vec::new(),
            utf8: true,
            sorted: false,
        }
    }
}
