//! Core types for the tetherpack binary format.

/// Identifies the type of an encoded value.
///
/// The tag byte is what makes the format self-describing: a decoder can skip
/// any value it does not care about, which is the basis for forward-compatible
/// records.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    // Payload-free scalars
    BoolTrue = 0x01,
    BoolFalse = 0x02,
    Unit = 0x03,
    OptionNone = 0x04,

    // Fixed-width scalars
    S32 = 0x08,
    S64 = 0x09,
    F64 = 0x0A,
    U64 = 0x0B,

    // Blobs (Tag + u32 Len + Bytes)
    String = 0x10,
    Bytes = 0x11,

    // Containers (Tag + u32 Len + Body)
    List = 0x20,
    Map = 0x21,

    // ADTs (Tag + u32 Len + Body)
    OptionSome = 0x30,
    ResultOk = 0x31,
    ResultErr = 0x32,
    Variant = 0x33,
}

impl Tag {
    /// Returns the Tag for a given byte, or `None` if the byte is not a tag.
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Tag::BoolTrue),
            0x02 => Some(Tag::BoolFalse),
            0x03 => Some(Tag::Unit),
            0x04 => Some(Tag::OptionNone),
            0x08 => Some(Tag::S32),
            0x09 => Some(Tag::S64),
            0x0A => Some(Tag::F64),
            0x0B => Some(Tag::U64),
            0x10 => Some(Tag::String),
            0x11 => Some(Tag::Bytes),
            0x20 => Some(Tag::List),
            0x21 => Some(Tag::Map),
            0x30 => Some(Tag::OptionSome),
            0x31 => Some(Tag::ResultOk),
            0x32 => Some(Tag::ResultErr),
            0x33 => Some(Tag::Variant),
            _ => None,
        }
    }
}

/// The kind of container currently open on the encoder stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The virtual root; allows any number of items.
    Root,
    /// Ordered sequence; allows any number of items.
    List,
    /// Key-value container; strictly allows only `Tag::Variant` children.
    Map,
    /// Strict container; allows exactly one item.
    Option,
    /// Strict container; allows exactly one item.
    Result,
    /// Strict container; allows exactly one item (the payload) after the name.
    Variant,
}

/// Encoding and decoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Byte does not correspond to a valid `Tag`.
    InvalidTag(u8),
    /// String data is not valid UTF-8.
    InvalidUtf8,
    /// Closing a scope that does not match the innermost open scope.
    ScopeMismatch { expected: Scope, actual: Scope },
    /// Attempted to close a scope when only the root remains.
    ScopeUnderflow,
    /// Attempted to finalize the buffer with open scopes.
    ScopeStillOpen,
    /// Buffer exhausted while reading.
    UnexpectedEnd,
    /// Blob or container body exceeds `u32::MAX` bytes.
    BlobTooLarge(usize),
    /// Wrote more than one item into a strict scope (Option/Result/Variant).
    TooManyItems(Scope),
    /// Closed a strict scope (Option/Result/Variant) without writing a value.
    EmptyAdt(Scope),
    /// Wrote a non-Variant directly into a Map.
    InvalidMapEntry,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidTag(b) => write!(f, "Invalid tag byte: {:#04x}", b),
            Error::ScopeMismatch { expected, actual } => {
                write!(f, "Scope mismatch: expected {:?}, found {:?}", expected, actual)
            }
            Error::TooManyItems(s) => write!(f, "Too many items in scope {:?}; expected exactly 1", s),
            Error::EmptyAdt(s) => write!(f, "Empty ADT scope {:?}; expected exactly 1 item", s),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for tetherpack operations.
pub type Result<T> = std::result::Result<T, Error>;
