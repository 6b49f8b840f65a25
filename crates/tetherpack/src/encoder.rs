//! Scope-stack driven encoder.
//!
//! The encoder back-patches container length headers when a scope closes, so
//! callers never compute sizes up front. Structural rules are enforced as
//! writes happen:
//!
//! 1. **Map scopes**: only `variant_begin()` (a key/value pair) is allowed as
//!    a direct child.
//! 2. **ADT scopes (Option, Result, Variant)**: exactly one item must be
//!    written before the scope closes.
//! 3. **Root scope**: the encoder must be back at the root to finalize bytes.

use crate::types::Error;
use crate::types::Result;
use crate::types::Scope;
use crate::types::Tag;

/// An open container on the encoder stack.
struct Frame {
    /// Offset of the first body byte (the length header sits just before it).
    start: usize,
    scope: Scope,
    count: usize,
}

/// A growable buffer that encodes values into the tetherpack format.
pub struct Encoder {
    buf: Vec<u8>,
    /// Bottom entry is always `Scope::Root`.
    stack: Vec<Frame>,
}

impl Encoder {
    /// Creates a new encoder with default capacity.
    pub fn new() -> Self {
        let mut enc = Self {
            buf: Vec::with_capacity(256),
            stack: Vec::with_capacity(8),
        };
        enc.stack.push(Frame { start: 0, scope: Scope::Root, count: 0 });
        enc
    }

    /// Consumes the encoder and returns the final byte vector.
    ///
    /// # Errors
    /// Returns `Error::ScopeStillOpen` if any container is still open.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if self.stack.len() > 1 {
            return Err(Error::ScopeStillOpen);
        }
        Ok(self.buf)
    }

    /// Returns a view of the encoded bytes so far.
    ///
    /// # Errors
    /// Returns `Error::ScopeStillOpen` if any container is still open.
    pub fn as_bytes(&self) -> Result<&[u8]> {
        if self.stack.len() > 1 {
            return Err(Error::ScopeStillOpen);
        }
        Ok(&self.buf)
    }

    fn current_frame(&mut self) -> &mut Frame {
        self.stack.last_mut().expect("root frame is never popped")
    }

    fn check_write(&mut self, tag: Tag) -> Result<()> {
        let frame = self.current_frame();
        match frame.scope {
            Scope::Root | Scope::List => Ok(()),
            Scope::Map => {
                if tag != Tag::Variant {
                    Err(Error::InvalidMapEntry)
                } else {
                    Ok(())
                }
            }
            Scope::Option | Scope::Result | Scope::Variant => {
                if frame.count >= 1 {
                    Err(Error::TooManyItems(frame.scope))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn on_item_written(&mut self) {
        self.current_frame().count += 1;
    }

    fn write_tag(&mut self, tag: Tag) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        Ok(())
    }

    fn write_u32_raw(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_blob(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        if data.len() > u32::MAX as usize {
            return Err(Error::BlobTooLarge(data.len()));
        }
        self.write_tag(tag)?;
        self.write_u32_raw(data.len() as u32);
        self.buf.extend_from_slice(data);
        self.on_item_written();
        Ok(())
    }

    fn begin_scope(&mut self, tag: Tag, scope: Scope) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&[0, 0, 0, 0]); // Length placeholder
        self.stack.push(Frame {
            start: self.buf.len(),
            scope,
            count: 0,
        });
        Ok(())
    }

    fn end_scope(&mut self, expected: Scope) -> Result<()> {
        if self.stack.len() <= 1 {
            return Err(Error::ScopeUnderflow);
        }

        {
            let frame = self.current_frame();
            if frame.scope != expected {
                return Err(Error::ScopeMismatch { expected, actual: frame.scope });
            }
            match frame.scope {
                Scope::Option | Scope::Result | Scope::Variant => {
                    if frame.count == 0 {
                        return Err(Error::EmptyAdt(frame.scope));
                    }
                }
                _ => {}
            }
        }

        // Pop and patch the length header.
        let frame = self.stack.pop().expect("checked above");
        let body_len = self.buf.len() - frame.start;
        if body_len > u32::MAX as usize {
            return Err(Error::BlobTooLarge(body_len));
        }
        let len_bytes = (body_len as u32).to_le_bytes();
        let len_pos = frame.start - 4;
        self.buf[len_pos..frame.start].copy_from_slice(&len_bytes);

        self.on_item_written();
        Ok(())
    }

    /// Encodes a boolean.
    pub fn bool(&mut self, v: bool) -> Result<()> {
        self.write_tag(if v { Tag::BoolTrue } else { Tag::BoolFalse })?;
        self.on_item_written();
        Ok(())
    }

    /// Encodes a signed 32-bit integer (LE).
    pub fn s32(&mut self, v: i32) -> Result<()> {
        self.write_tag(Tag::S32)?;
        self.buf.extend_from_slice(&v.to_le_bytes());
        self.on_item_written();
        Ok(())
    }

    /// Encodes a signed 64-bit integer (LE).
    pub fn s64(&mut self, v: i64) -> Result<()> {
        self.write_tag(Tag::S64)?;
        self.buf.extend_from_slice(&v.to_le_bytes());
        self.on_item_written();
        Ok(())
    }

    /// Encodes a 64-bit float (LE).
    pub fn f64(&mut self, v: f64) -> Result<()> {
        self.write_tag(Tag::F64)?;
        self.buf.extend_from_slice(&v.to_le_bytes());
        self.on_item_written();
        Ok(())
    }

    /// Encodes an unsigned 64-bit integer (LE).
    pub fn u64(&mut self, v: u64) -> Result<()> {
        self.write_tag(Tag::U64)?;
        self.buf.extend_from_slice(&v.to_le_bytes());
        self.on_item_written();
        Ok(())
    }

    /// Encodes Unit `()`.
    pub fn unit(&mut self) -> Result<()> {
        self.write_tag(Tag::Unit)?;
        self.on_item_written();
        Ok(())
    }

    /// Encodes `Option::None`.
    pub fn option_none(&mut self) -> Result<()> {
        self.write_tag(Tag::OptionNone)?;
        self.on_item_written();
        Ok(())
    }

    /// Encodes a UTF-8 string blob.
    pub fn str(&mut self, v: &str) -> Result<()> {
        self.write_blob(Tag::String, v.as_bytes())
    }

    /// Encodes a raw byte blob.
    pub fn bytes(&mut self, v: &[u8]) -> Result<()> {
        self.write_blob(Tag::Bytes, v)
    }

    /// Begins a List container. Close with `list_end()`.
    pub fn list_begin(&mut self) -> Result<()> {
        self.begin_scope(Tag::List, Scope::List)
    }

    /// Ends a List container.
    pub fn list_end(&mut self) -> Result<()> {
        self.end_scope(Scope::List)
    }

    /// Begins a Map container. Close with `map_end()`.
    ///
    /// Only `variant_begin()` children are allowed: each entry is a named
    /// value, and names are how decoders survive fields they do not know.
    pub fn map_begin(&mut self) -> Result<()> {
        self.begin_scope(Tag::Map, Scope::Map)
    }

    /// Ends a Map container.
    pub fn map_end(&mut self) -> Result<()> {
        self.end_scope(Scope::Map)
    }

    /// Begins an `Option::Some` container. Requires exactly one item.
    pub fn option_some_begin(&mut self) -> Result<()> {
        self.begin_scope(Tag::OptionSome, Scope::Option)
    }

    /// Ends an `Option::Some` container.
    pub fn option_some_end(&mut self) -> Result<()> {
        self.end_scope(Scope::Option)
    }

    /// Begins a `Result::Ok` container. Requires exactly one item.
    pub fn result_ok_begin(&mut self) -> Result<()> {
        self.begin_scope(Tag::ResultOk, Scope::Result)
    }

    /// Ends a `Result::Ok` container.
    pub fn result_ok_end(&mut self) -> Result<()> {
        self.end_scope(Scope::Result)
    }

    /// Begins a `Result::Err` container. Requires exactly one item.
    pub fn result_err_begin(&mut self) -> Result<()> {
        self.begin_scope(Tag::ResultErr, Scope::Result)
    }

    /// Ends a `Result::Err` container.
    pub fn result_err_end(&mut self) -> Result<()> {
        self.end_scope(Scope::Result)
    }

    /// Begins a Variant (named payload) and writes the name immediately.
    ///
    /// Requires exactly one payload item before `variant_end()`. For unit
    /// variants, write `unit()`.
    pub fn variant_begin(&mut self, name: &str) -> Result<()> {
        if name.len() > u32::MAX as usize {
            return Err(Error::BlobTooLarge(name.len()));
        }
        self.begin_scope(Tag::Variant, Scope::Variant)?;
        // The name is scope metadata, not the payload item, so it is written
        // raw rather than through the item-counting path.
        self.buf.push(Tag::String as u8);
        self.write_u32_raw(name.len() as u32);
        self.buf.extend_from_slice(name.as_bytes());
        Ok(())
    }

    /// Ends a Variant.
    pub fn variant_end(&mut self) -> Result<()> {
        self.end_scope(Scope::Variant)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}
