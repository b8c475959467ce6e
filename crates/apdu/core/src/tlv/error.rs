//! Error types for the TLV codec

/// Errors raised while parsing or serializing TLV data
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TlvError {
    /// Tag number does not fit into 64 bits
    #[error("Tag number exceeds 64 bits")]
    TagOverflow,

    /// Fewer bytes remain than the encoding demands
    #[error("Truncated TLV input")]
    TruncatedInput,

    /// Long-form length field wider than 32 bits
    #[error("Length field of {0} octets is not supported")]
    LengthOverflow(usize),

    /// Input contained no TLV object at all
    #[error("No TLV data")]
    NoData,

    /// Value does not denote a valid tag
    #[error("Invalid tag {0:#X}")]
    InvalidTag(u64),

    /// A constructed node cannot be encoded in this dialect
    #[error("Constructed nodes are not supported in {0} TLV")]
    ConstructedNotAllowed(&'static str),

    /// The tag does not fit into this dialect
    #[error("Tag {0:#X} cannot be encoded in {1} TLV")]
    TagNotEncodable(u64, &'static str),

    /// The value is longer than this dialect can describe
    #[error("Value of {0} bytes is too long for {1} TLV")]
    ValueTooLong(usize, &'static str),

    /// Constructed nodes nest deeper than the parser follows
    #[error("TLV nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    /// Indefinite length on a primitive node
    #[error("Primitive tag {0:#X} with indefinite length")]
    IndefinitePrimitive(u64),

    /// Constructed flag of the tag does not match the node kind
    #[error("Tag {0:#X} does not match node kind")]
    KindMismatch(u64),
}
