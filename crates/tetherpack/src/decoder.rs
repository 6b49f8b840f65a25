//! Zero-copy, bounds-checked decoder.
//!
//! A `Decoder` is an immutable view over a byte slice; reads advance the view.
//! Container reads return new `Decoder` instances restricted to the
//! container's body, so a malformed inner value can never escape its bounds.
//!
//! `skip` consumes any well-formed value without interpreting it, which is
//! what lets record readers ignore fields added by newer writers.

use crate::types::Error;
use crate::types::Result;
use crate::types::Tag;

/// A decoding view over a byte slice.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over the slice.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Returns the number of unread bytes in the view.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Peeks the next Tag without advancing.
    pub fn peek_tag(&self) -> Result<Tag> {
        if self.buf.is_empty() {
            return Err(Error::UnexpectedEnd);
        }
        Tag::from_u8(self.buf[0]).ok_or(Error::InvalidTag(self.buf[0]))
    }

    fn consume(&mut self, n: usize) -> Result<()> {
        if n > self.buf.len() {
            return Err(Error::UnexpectedEnd);
        }
        self.buf = &self.buf[n..];
        Ok(())
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() {
            return Err(Error::UnexpectedEnd);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read_slice(&mut self, n: usize) -> Result<Decoder<'a>> {
        Ok(Decoder::new(self.read_bytes(n)?))
    }

    fn read_len(&mut self) -> Result<usize> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4 bytes")) as usize)
    }

    fn check_tag(&mut self, expected: Tag) -> Result<()> {
        let tag = self.peek_tag()?;
        if tag == expected {
            self.consume(1)
        } else {
            Err(Error::InvalidTag(tag as u8))
        }
    }

    /// Skips the next item and all of its nested children.
    pub fn skip(&mut self) -> Result<()> {
        let tag = self.peek_tag()?;
        self.consume(1)?;

        match tag {
            Tag::BoolTrue | Tag::BoolFalse | Tag::Unit | Tag::OptionNone => {}
            Tag::S32 => self.consume(4)?,
            Tag::S64 | Tag::F64 | Tag::U64 => self.consume(8)?,
            // Variable length: [Len: u32][Body: Len]
            Tag::String
            | Tag::Bytes
            | Tag::List
            | Tag::Map
            | Tag::OptionSome
            | Tag::ResultOk
            | Tag::ResultErr
            | Tag::Variant => {
                let len = self.read_len()?;
                self.consume(len)?;
            }
        }
        Ok(())
    }

    /// Decodes a bool.
    pub fn bool(&mut self) -> Result<bool> {
        let tag = self.peek_tag()?;
        match tag {
            Tag::BoolTrue => {
                self.consume(1)?;
                Ok(true)
            }
            Tag::BoolFalse => {
                self.consume(1)?;
                Ok(false)
            }
            _ => Err(Error::InvalidTag(tag as u8)),
        }
    }

    /// Decodes a signed 32-bit integer (LE).
    pub fn s32(&mut self) -> Result<i32> {
        self.check_tag(Tag::S32)?;
        Ok(i32::from_le_bytes(self.read_bytes(4)?.try_into().expect("4 bytes")))
    }

    /// Decodes a signed 64-bit integer (LE).
    pub fn s64(&mut self) -> Result<i64> {
        self.check_tag(Tag::S64)?;
        Ok(i64::from_le_bytes(self.read_bytes(8)?.try_into().expect("8 bytes")))
    }

    /// Decodes a 64-bit float (LE).
    pub fn f64(&mut self) -> Result<f64> {
        self.check_tag(Tag::F64)?;
        Ok(f64::from_le_bytes(self.read_bytes(8)?.try_into().expect("8 bytes")))
    }

    /// Decodes an unsigned 64-bit integer (LE).
    pub fn u64(&mut self) -> Result<u64> {
        self.check_tag(Tag::U64)?;
        Ok(u64::from_le_bytes(self.read_bytes(8)?.try_into().expect("8 bytes")))
    }

    /// Decodes Unit `()`.
    pub fn unit(&mut self) -> Result<()> {
        self.check_tag(Tag::Unit)
    }

    /// Decodes a string slice (UTF-8).
    pub fn str(&mut self) -> Result<&'a str> {
        self.check_tag(Tag::String)?;
        let len = self.read_len()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    /// Decodes a byte slice.
    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        self.check_tag(Tag::Bytes)?;
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    fn enter_container(&mut self, expected: Tag) -> Result<Decoder<'a>> {
        self.check_tag(expected)?;
        let len = self.read_len()?;
        self.read_slice(len)
    }

    /// Decodes a List into an iterator over its items.
    pub fn list(&mut self) -> Result<ListIter<'a>> {
        Ok(ListIter { dec: self.enter_container(Tag::List)? })
    }

    /// Decodes a Map into an iterator over its named entries.
    pub fn map(&mut self) -> Result<MapIter<'a>> {
        Ok(MapIter { dec: self.enter_container(Tag::Map)? })
    }

    /// Decodes an Option.
    ///
    /// Returns `Some(Decoder)` for the payload if present, or `None`.
    pub fn option(&mut self) -> Result<Option<Decoder<'a>>> {
        let tag = self.peek_tag()?;
        match tag {
            Tag::OptionNone => {
                self.consume(1)?;
                Ok(None)
            }
            Tag::OptionSome => Ok(Some(self.enter_container(Tag::OptionSome)?)),
            _ => Err(Error::InvalidTag(tag as u8)),
        }
    }

    /// Decodes a Result.
    ///
    /// Returns `Ok(Decoder)` or `Err(Decoder)` for the respective payloads.
    pub fn result(&mut self) -> Result<std::result::Result<Decoder<'a>, Decoder<'a>>> {
        let tag = self.peek_tag()?;
        match tag {
            Tag::ResultOk => Ok(Ok(self.enter_container(Tag::ResultOk)?)),
            Tag::ResultErr => Ok(Err(self.enter_container(Tag::ResultErr)?)),
            _ => Err(Error::InvalidTag(tag as u8)),
        }
    }

    /// Decodes a Variant.
    ///
    /// Returns `(name, payload decoder)`.
    pub fn variant(&mut self) -> Result<(&'a str, Decoder<'a>)> {
        let mut inner = self.enter_container(Tag::Variant)?;
        let name = inner.str()?;
        Ok((name, inner))
    }
}

/// Iterator over items within a List.
#[derive(Debug)]
pub struct ListIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> ListIter<'a> {
    /// Returns a Decoder for the next item, or `None` at the end.
    pub fn next(&mut self) -> Option<Decoder<'a>> {
        if self.dec.remaining() == 0 {
            return None;
        }
        let mut probe = self.dec.clone();
        if probe.skip().is_err() {
            return None;
        }
        let len = self.dec.remaining() - probe.remaining();
        self.dec.read_slice(len).ok()
    }
}

/// Iterator over named entries (Variants) within a Map.
#[derive(Debug)]
pub struct MapIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> MapIter<'a> {
    /// Returns `(key, value decoder)` for the next entry, or `None` at the end.
    pub fn next(&mut self) -> Result<Option<(&'a str, Decoder<'a>)>> {
        if self.dec.remaining() == 0 {
            return Ok(None);
        }
        if self.dec.peek_tag()? != Tag::Variant {
            return Err(Error::InvalidMapEntry);
        }
        let (name, val) = self.dec.variant()?;
        Ok(Some((name, val)))
    }
}
