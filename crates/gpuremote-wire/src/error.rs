/// Reasons a payload failed to decode.
///
/// Decoding is all-or-nothing: any of these aborts the whole value being
/// decoded and no partially built value escapes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unexpected end of input (needed {needed} bytes, {remaining} remaining)")]
    UnexpectedEof { needed: usize, remaining: usize },

    /// A variant or enum tag outside the known set.
    #[error("invalid {ty} tag {tag}")]
    InvalidTag { ty: &'static str, tag: u8 },

    #[error("invalid bool byte {0:#04x}")]
    InvalidBool(u8),

    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// Identifier fields are never zero.
    #[error("zero identifier")]
    ZeroIdentifier,

    /// A sequence claims more elements than the remaining input could hold.
    #[error("sequence length {len} exceeds remaining input ({remaining} bytes)")]
    LengthOverflow { len: usize, remaining: usize },

    #[error("unknown {ty} flag bits {bits:#x}")]
    UnknownFlags { ty: &'static str, bits: u32 },

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

pub type Result<T> = std::result::Result<T, WireError>;
