//! # Tetherpack
//!
//! A small, self-describing binary format for moving typed records across a
//! process boundary.
//!
//! ## Philosophy
//!
//! - **TLV Architecture**: `[Tag][Length?][Body]` structure means a reader can
//!   always skip a value it does not understand. Unknown record fields are
//!   ignored, not fatal.
//! - **Explicit state**: the encoder tracks open containers on a scope stack
//!   and refuses structurally invalid writes. The decoder is a zero-copy,
//!   bounds-checked view.
//! - **No schema**: field names travel with the data. Both sides agree on
//!   meaning, not on layout.
//!
//! ## Format
//!
//! - **Scalars**: `[Tag: 1b][Data: N]`
//! - **Blobs**: `[Tag: 1b][Len: 4b][Data: Len]`
//! - **Containers**: `[Tag: 1b][Len: 4b][Body: Len]`
//!
//! All integers are little-endian.

pub mod decoder;
pub mod encoder;
pub mod types;


pub use types::Error;
pub use types::Result;
pub use types::Scope;
pub use types::Tag;

pub use encoder::Encoder;

pub use decoder::Decoder;
pub use decoder::ListIter;
pub use decoder::MapIter;
