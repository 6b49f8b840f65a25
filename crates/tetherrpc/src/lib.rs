//! # Tetherrpc
//!
//! The wire protocol for tether connections, carried over [tetherpack].
//!
//! ## Frames
//!
//! Three frame kinds cross a connection:
//!
//! - **Call**: `{seq, method, args}` — a synchronous request. The peer must
//!   answer with a Reply carrying the same sequence number.
//! - **Reply**: `{seq, Result<value, FailureReason>}` — the answer to exactly
//!   one Call.
//! - **Post**: `{token?, fields}` — a one-shot envelope for the messenger
//!   channel. No correlation; if a token is attached, it names the sender's
//!   mailbox so a reply envelope can find its way back.
//!
//! All frame headers are maps keyed by field name, so either side can add
//! header fields without breaking the other (unknown keys are skipped).
//!
//! ## Errors
//!
//! [`Error`] is the *protocol* failing: malformed bytes, type confusion.
//! [`FailureReason`] is the *remote handler* failing: the "Err" side of a
//! Reply. The two are kept apart deliberately; callers react to them
//! differently.

pub mod error;
pub mod frame;
pub mod value;


pub use error::Error;
pub use error::FailureReason;
pub use error::Result;

pub use value::Value;
pub use value::decode_value;
pub use value::encode_value;

pub use frame::CallDecoder;
pub use frame::CallEncoder;
pub use frame::PostDecoder;
pub use frame::PostEncoder;
pub use frame::ReplyDecoder;
pub use frame::ReplyErrEncoder;
pub use frame::ReplyOkEncoder;
pub use frame::RpcFrame;
pub use frame::decode_seq;
