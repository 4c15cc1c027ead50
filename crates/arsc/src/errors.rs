use thiserror::Error;

/// Errors produced while decoding, mutating or emitting a resource table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArscError {
    /// A chunk declares more bytes than the input holds
    #[error("chunk at offset 0x{offset:x} declares {declared} bytes, only {available} available")]
    TruncatedChunk {
        offset: usize,
        declared: u32,
        available: usize,
    },

    /// A chunk carries a type code this decoder does not know
    #[error("unknown chunk type 0x{0:04x}")]
    UnknownChunkType(u16),

    /// A required 4-byte alignment was violated
    #[error("unaligned read at offset 0x{0:x}")]
    UnalignedRead(usize),

    /// A string pool lookup went past the declared string count
    #[error("string pool index {index} out of range (count {count})")]
    StringPoolIndexOutOfRange { index: u32, count: u32 },

    /// A type chunk referenced a type id no type spec declared
    #[error("type chunk references unknown type id {0}")]
    UnknownTypeId(u8),

    /// A reference points at a resource id the table does not hold
    #[error("unknown resource id 0x{0:08x}")]
    UnknownResourceId(u32),

    /// A second resource arrived for the same (spec, config) pair
    #[error("duplicate resource 0x{id:08x} for config '{config}'")]
    DuplicateResource { id: u32, config: String },

    /// A config block claims a size beyond its containing chunk
    #[error("config block claims {claimed} bytes, chunk has {available}")]
    InvalidConfig { claimed: u32, available: usize },

    /// Input uses an encoding variant this decoder does not support
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),

    /// The caller's cancellation predicate fired
    #[error("decode cancelled")]
    Cancelled,

    /// Underlying byte stream ran dry mid-structure
    #[error("input exhausted while reading {0}")]
    IoFailure(&'static str),
}
