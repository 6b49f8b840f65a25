//! Value translation between Rust data and the tetherpack wire.
//!
//! `Value` is the dynamic shape everything marshalled across a connection
//! passes through: call arguments, results, and messenger field bags. Records
//! are name-keyed, which is what makes them forward compatible — a reader
//! plucks the fields it knows and leaves the rest.

use tetherpack::Decoder;
use tetherpack::Encoder;
use tetherpack::Tag;

use crate::error::Error;
use crate::error::Result;

/// A dynamically typed value crossing the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(String),
    List(Vec<Value>),
    /// Name-keyed fields, in writer order.
    Record(Vec<(String, Value)>),
}

impl Value {
    /// A short name for the value's shape, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::I32(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Looks up a record field by name. `None` for missing fields or
    /// non-record values.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_record()?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }
}

/// Encodes a `Value` into the encoder stream.
pub fn encode_value(enc: &mut Encoder, val: &Value) -> Result<()> {
    match val {
        Value::Unit => enc.unit()?,
        Value::Bool(v) => enc.bool(*v)?,
        Value::I32(v) => enc.s32(*v)?,
        Value::I64(v) => enc.s64(*v)?,
        Value::F64(v) => enc.f64(*v)?,
        Value::Str(v) => enc.str(v)?,
        Value::List(items) => {
            enc.list_begin()?;
            for item in items {
                encode_value(enc, item)?;
            }
            enc.list_end()?;
        }
        Value::Record(fields) => {
            enc.map_begin()?;
            for (name, value) in fields {
                enc.variant_begin(name)?;
                encode_value(enc, value)?;
                enc.variant_end()?;
            }
            enc.map_end()?;
        }
    }
    Ok(())
}

/// Decodes the next value from the decoder.
///
/// The wire is self-describing, so no expected type is needed; tags with no
/// `Value` representation fail with `UnsupportedType`.
pub fn decode_value(dec: &mut Decoder<'_>) -> Result<Value> {
    let tag = dec.peek_tag()?;
    match tag {
        Tag::Unit => {
            dec.unit()?;
            Ok(Value::Unit)
        }
        Tag::BoolTrue | Tag::BoolFalse => Ok(Value::Bool(dec.bool()?)),
        Tag::S32 => Ok(Value::I32(dec.s32()?)),
        Tag::S64 => Ok(Value::I64(dec.s64()?)),
        Tag::F64 => Ok(Value::F64(dec.f64()?)),
        Tag::String => Ok(Value::Str(dec.str()?.to_string())),
        Tag::List => {
            let mut iter = dec.list()?;
            let mut items = Vec::new();
            while let Some(mut item) = iter.next() {
                items.push(decode_value(&mut item)?);
            }
            Ok(Value::List(items))
        }
        Tag::Map => {
            let mut iter = dec.map()?;
            let mut fields = Vec::new();
            while let Some((name, mut val)) = iter.next()? {
                fields.push((name.to_string(), decode_value(&mut val)?));
            }
            Ok(Value::Record(fields))
        }
        other => Err(Error::UnsupportedType(format!("{:?}", other))),
    }
}

/// Decodes a List container into a vector of values.
pub fn decode_value_list(dec: &mut Decoder<'_>) -> Result<Vec<Value>> {
    let mut iter = dec.list()?;
    let mut items = Vec::new();
    while let Some(mut item) = iter.next() {
        items.push(decode_value(&mut item)?);
    }
    Ok(items)
}
