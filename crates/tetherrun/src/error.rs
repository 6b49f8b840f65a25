//! Runtime error taxonomy.
//!
//! Everything a caller can get back from the registry or a connection, as
//! values. Nothing here panics across the boundary, and nothing is retried.

use tetherrpc::FailureReason;

use crate::registry::ServiceName;

/// Failures surfaced by the registry and connection layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The service name did not resolve.
    NotFound(ServiceName),
    /// A service with this name already exists in the registry.
    AlreadyRegistered(ServiceName),
    /// The operation requires a Bound connection.
    NotConnected,
    /// The remote handler reported a failure.
    Remote(FailureReason),
    /// The peer disappeared mid-operation.
    ConnectionLost,
    /// The payload could not be encoded or decoded.
    Marshal(tetherrpc::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "Service not found: {}", name),
            Self::AlreadyRegistered(name) => write!(f, "Service already registered: {}", name),
            Self::NotConnected => write!(f, "Connection is not bound"),
            Self::Remote(reason) => write!(f, "Remote failure: {:?}", reason),
            Self::ConnectionLost => write!(f, "Connection lost"),
            Self::Marshal(e) => write!(f, "Marshal error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<tetherrpc::Error> for Error {
    fn from(e: tetherrpc::Error) -> Self {
        Self::Marshal(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
