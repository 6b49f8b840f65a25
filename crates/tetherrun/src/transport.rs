//! # Transport Abstraction
//!
//! A minimal, async interface for moving bytes between a client and a bound
//! service.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: the transport knows nothing about frames, values, or
//!   services. It moves opaque buffers.
//! - **Duplex**: either side may send at any time. Request/response pairing,
//!   correlation, and one-shot envelopes are all built on top of this, not
//!   defined here.

use std::fmt;

/// Errors that occur at the transport layer.
#[derive(Debug, Clone)]
pub enum TransportError {
    /// The peer is unreachable or the link was dropped.
    ConnectionLost(String),
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A mechanism to exchange byte buffers with one peer.
///
/// This trait is object-safe (`Arc<dyn Transport>`). Implementations exist
/// for in-process channels ([`crate::channel::ChannelTransport`]); local
/// sockets or named pipes would slot in the same way.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends one payload to the peer.
    ///
    /// Returns once the payload is handed to the link, not once the peer has
    /// processed it.
    async fn send(&self, payload: &[u8]) -> Result<()>;

    /// Receives the next payload from the peer.
    ///
    /// Returns `Ok(None)` when the peer has closed the link cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>>;

    /// Closes the outgoing side of the link.
    ///
    /// After this, the peer's `recv` observes end-of-stream. Idempotent.
    fn close(&self);
}
