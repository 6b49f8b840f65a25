//! # tetherrun
//!
//! A local IPC runtime: named services, bound connections, a synchronous RPC
//! channel, and a fire-and-forget messenger channel.
//!
//! ## Architecture
//!
//! - **Registry**: the process-local namespace. Services register under
//!   unique names; clients resolve names to endpoints.
//! - **Connection**: one client's binding to one service, with an explicit
//!   `Unbound → Binding → Bound → Unbinding → Unbound` lifecycle and an
//!   ordered event channel (`Connected`, `Disconnected`).
//! - **Service**: the server half of the contract — a dispatcher over
//!   operation names plus a handler for one-shot envelopes.
//! - **Transport**: a byte-moving trait. The in-process
//!   [`ChannelTransport`] is the built-in local link; sockets or pipes would
//!   implement the same trait.
//!
//! Everything marshalled across a connection travels as [tetherrpc] frames
//! over [tetherpack] bytes: cross-boundary data is copied, never shared.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tetherrun::Registry;
//! use tetherrun::Value;
//! use tetherrun::demo::InfoService;
//!
//! # async fn example() -> tetherrun::Result<()> {
//! let registry = Registry::new();
//! registry.register("tether.demo.Info", InfoService)?;
//!
//! let (conn, mut events) = registry.connect("tether.demo.Info");
//! events.recv().await; // Connected
//!
//! let sum = conn.call("add", &[Value::I32(10), Value::I32(20)]).await?;
//! assert_eq!(sum, Value::I32(30));
//!
//! conn.disconnect();
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency policy
//!
//! Calls on one connection are strictly serialized; independent connections
//! are served concurrently, each by its own service loop. Disconnecting is
//! the only cancellation: an in-flight call on a torn-down connection
//! resolves with `ConnectionLost`, never a hang.

pub mod channel;
pub mod connection;
pub mod demo;
pub mod error;
pub mod message;
pub mod registry;
pub mod service;
pub mod transport;

#[cfg(test)]
mod tests;

pub use channel::ChannelTransport;
pub use connection::BindState;
pub use connection::ConnEvent;
pub use connection::ConnEvents;
pub use connection::Connection;
pub use error::Error;
pub use error::Result;
pub use message::Mailbox;
pub use message::Message;
pub use message::Peer;
pub use message::ReplyAddress;
pub use registry::Endpoint;
pub use registry::Registry;
pub use registry::ServiceName;
pub use service::Service;
pub use transport::Transport;
pub use transport::TransportError;

pub use tetherrpc::FailureReason;
pub use tetherrpc::Value;
