use crate::thing_type::ThingCategory;

pub type Result<T> = std::result::Result<T, FormatError>;

/// Decode and encode failures for metadata and sprite files.
///
/// Decode errors carry enough context (flag, previous flag, category, id or
/// byte offset) to tell a corrupt file apart from a version mismatch.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error(
        "unknown flag 0x{flag:02X} (previous flag 0x{previous_flag:02X}) in {category} {id}"
    )]
    UnknownFlag {
        flag: u8,
        previous_flag: u8,
        category: ThingCategory,
        id: u32,
    },

    #[error("{category} {id} has too many sprites ({count} > {limit})")]
    TooManySprites {
        category: ThingCategory,
        id: u32,
        count: usize,
        limit: usize,
    },

    #[error("unexpected end of data at offset {offset}: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        offset: u64,
        needed: usize,
        available: usize,
    },

    #[error("unknown trailing data at offset {offset} ({remaining} bytes)")]
    TrailingData { offset: u64, remaining: usize },

    #[error("sprite id {id} does not fit a {bits}-bit field")]
    SpriteIdOverflow { id: u32, bits: u32 },

    #[error("{category} {id} has {count} frame groups, expected 1 or 2")]
    InvalidFrameGroupCount {
        category: ThingCategory,
        id: u32,
        count: usize,
    },

    #[error("{category} {id} has no frame group")]
    MissingFrameGroup { category: ThingCategory, id: u32 },

    #[error("{category} {id} uses pattern z {pattern_z}, which this format cannot store")]
    PatternZUnsupported {
        category: ThingCategory,
        id: u32,
        pattern_z: u8,
    },

    #[error("{category} count {count} does not fit the 16-bit header field")]
    CountOverflow { category: ThingCategory, count: u32 },

    #[error("invalid frame group type {0}")]
    InvalidFrameGroupType(u8),

    #[error("{category} {id} has a sprite index of length {actual}, geometry requires {expected}")]
    SpriteIndexMismatch {
        category: ThingCategory,
        id: u32,
        expected: usize,
        actual: usize,
    },

    #[error("invalid pixel buffer: expected {expected} bytes, got {len}")]
    InvalidPixelBuffer { expected: usize, len: usize },

    #[error("sprite {id} compresses to {len} bytes, more than a 16-bit length allows")]
    SpriteTooLarge { id: u32, len: usize },

    #[error("sprite file would exceed the 32-bit address range ({0} bytes)")]
    FileTooLarge(u64),

    #[error("string cannot be represented in the file charset: {0}")]
    InvalidString(String),

    #[error("signature mismatch: expected 0x{expected:08X}, found 0x{found:08X}")]
    InvalidSignature { expected: u32, found: u32 },

    #[error("unsupported client version {0}")]
    UnsupportedVersion(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
