//! # Error Definitions
//!
//! The central ledger of protocol and remote failures.

use tetherpack::Error as PackError;

/// Operational failures within the protocol layer itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The underlying tetherpack serialization failed.
    Pack(PackError),
    /// A value on the wire had a different shape than expected.
    TypeMismatch { expected: String, found: String },
    /// A record was missing a required field.
    MissingField(String),
    /// An unknown variant or top-level frame kind was encountered.
    UnknownVariant(String),
    /// The internal structure of the frame was malformed (e.g. missing seq).
    ProtocolViolation(String),
    /// A tag with no `Value` representation appeared in a value position.
    UnsupportedType(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pack(e) => write!(f, "Pack error: {}", e),
            Self::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            Self::MissingField(name) => write!(f, "Missing field: {}", name),
            Self::UnknownVariant(name) => write!(f, "Unknown variant: {}", name),
            Self::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
            Self::UnsupportedType(name) => write!(f, "Unsupported type: {}", name),
        }
    }
}

impl std::error::Error for Error {}

impl From<PackError> for Error {
    fn from(e: PackError) -> Self {
        Self::Pack(e)
    }
}

/// A specialized Result type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a remote handler failed (the "Err" side of a Reply).
///
/// These are distinct from [`Error`]: a `FailureReason` means the frame
/// arrived intact and the *handler* refused or failed the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The method does not exist on the service.
    MethodNotFound,
    /// The argument count did not match the method signature.
    BadArgumentCount,
    /// An argument had the wrong shape or an out-of-range value.
    InvalidArgument,
    /// The handler itself reported a failure.
    Failed,
}

impl FailureReason {
    /// The wire tag for this reason.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::MethodNotFound => "NoMethod",
            Self::BadArgumentCount => "BadArgCount",
            Self::InvalidArgument => "BadArg",
            Self::Failed => "Failed",
        }
    }

    /// Parses a wire tag back into a reason.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "NoMethod" => Ok(Self::MethodNotFound),
            "BadArgCount" => Ok(Self::BadArgumentCount),
            "BadArg" => Ok(Self::InvalidArgument),
            "Failed" => Ok(Self::Failed),
            _ => Err(Error::UnknownVariant(format!("FailureReason: {}", tag))),
        }
    }
}
