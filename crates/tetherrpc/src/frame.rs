//! # Protocol Frames
//!
//! The three envelope kinds that cross a connection: Call, Reply, Post.
//!
//! ## Invariants
//! - **Panic safety**: all decoding paths return `Result`, never panicking on
//!   unknown data.
//! - **Forward compatibility**: unknown header fields are safely skipped.
//! - **Correlation**: every Reply carries the seq of the Call it answers.
//!   Post frames carry no seq; a mailbox token routes replies instead.

use tetherpack::Decoder;
use tetherpack::Encoder;

use crate::error::Error;
use crate::error::FailureReason;
use crate::error::Result;
use crate::value::Value;
use crate::value::decode_value;
use crate::value::decode_value_list;
use crate::value::encode_value;

/// Encodes an outbound Call frame.
pub struct CallEncoder<'a> {
    pub seq: u64,
    pub method: &'a str,
    pub args: &'a [Value],
}

impl<'a> CallEncoder<'a> {
    pub fn new(seq: u64, method: &'a str, args: &'a [Value]) -> Self {
        Self { seq, method, args }
    }

    /// Encode this call into the encoder.
    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.variant_begin("Call")?;
        enc.map_begin()?;

        write_map_u64(enc, "seq", self.seq)?;
        write_map_str(enc, "method", self.method)?;

        enc.variant_begin("args")?;
        enc.list_begin()?;
        for val in self.args {
            encode_value(enc, val)?;
        }
        enc.list_end()?;
        enc.variant_end()?;

        enc.map_end()?;
        enc.variant_end()?;
        Ok(())
    }
}

/// A decoded inbound Call frame.
pub struct CallDecoder<'a> {
    pub seq: u64,
    pub method: &'a str,
    pub args: Vec<Value>,
}

impl<'a> CallDecoder<'a> {
    /// Decode a Call frame body.
    pub fn decode(mut dec: Decoder<'a>) -> Result<Self> {
        let mut map = dec.map()?;
        let mut seq = None;
        let mut method = None;
        let mut args = None;

        while let Some((key, mut val)) = map.next()? {
            match key {
                "seq" => seq = Some(val.u64()?),
                "method" => method = Some(val.str()?),
                "args" => args = Some(decode_value_list(&mut val)?),
                _ => val.skip()?,
            }
        }

        Ok(CallDecoder {
            seq: seq.ok_or(Error::ProtocolViolation("Missing seq".into()))?,
            method: method.ok_or(Error::ProtocolViolation("Missing method".into()))?,
            args: args.ok_or(Error::ProtocolViolation("Missing args".into()))?,
        })
    }
}

/// Encodes an outbound Reply frame (success).
pub struct ReplyOkEncoder<'a> {
    pub seq: u64,
    pub value: &'a Value,
}

impl<'a> ReplyOkEncoder<'a> {
    pub fn new(seq: u64, value: &'a Value) -> Self {
        Self { seq, value }
    }

    /// Encode this success reply into the encoder.
    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.variant_begin("Reply")?;
        enc.result_ok_begin()?;
        enc.map_begin()?;

        write_map_u64(enc, "seq", self.seq)?;

        enc.variant_begin("value")?;
        encode_value(enc, self.value)?;
        enc.variant_end()?;

        enc.map_end()?;
        enc.result_ok_end()?;
        enc.variant_end()?;
        Ok(())
    }
}

/// Encodes an outbound Reply frame (failure).
pub struct ReplyErrEncoder {
    pub seq: u64,
    pub reason: FailureReason,
}

impl ReplyErrEncoder {
    pub fn new(seq: u64, reason: FailureReason) -> Self {
        Self { seq, reason }
    }

    /// Encode this failure reply into the encoder.
    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.variant_begin("Reply")?;
        enc.result_err_begin()?;
        enc.map_begin()?;

        write_map_u64(enc, "seq", self.seq)?;

        enc.variant_begin("reason")?;
        encode_unit_variant(enc, self.reason.as_tag())?;
        enc.variant_end()?;

        enc.map_end()?;
        enc.result_err_end()?;
        enc.variant_end()?;
        Ok(())
    }
}

/// A decoded inbound Reply frame.
pub struct ReplyDecoder {
    pub seq: u64,
    /// `Ok(value)` on success, `Err(reason)` if the remote handler failed.
    pub status: std::result::Result<Value, FailureReason>,
}

impl ReplyDecoder {
    /// Decode a Reply frame body.
    pub fn decode(mut dec: Decoder<'_>) -> Result<Self> {
        match dec.result()? {
            Ok(ok_body) => Self::decode_success(ok_body),
            Err(err_body) => Self::decode_failure(err_body),
        }
    }

    fn decode_success(mut ok_body: Decoder<'_>) -> Result<Self> {
        let mut map = ok_body.map()?;
        let mut seq = None;
        let mut value = None;

        while let Some((key, mut val)) = map.next()? {
            match key {
                "seq" => seq = Some(val.u64()?),
                "value" => value = Some(decode_value(&mut val)?),
                _ => val.skip()?,
            }
        }

        Ok(ReplyDecoder {
            seq: seq.ok_or(Error::ProtocolViolation("Missing seq".into()))?,
            status: Ok(value.ok_or(Error::ProtocolViolation("Missing value".into()))?),
        })
    }

    fn decode_failure(mut err_body: Decoder<'_>) -> Result<Self> {
        let mut map = err_body.map()?;
        let mut seq = None;
        let mut reason = None;

        while let Some((key, mut val)) = map.next()? {
            match key {
                "seq" => seq = Some(val.u64()?),
                "reason" => {
                    let tag = decode_unit_variant(&mut val)?;
                    reason = Some(FailureReason::from_tag(tag)?);
                }
                _ => val.skip()?,
            }
        }

        Ok(ReplyDecoder {
            seq: seq.ok_or(Error::ProtocolViolation("Missing seq".into()))?,
            status: Err(reason.ok_or(Error::ProtocolViolation("Missing reason".into()))?),
        })
    }
}

/// Encodes an outbound Post frame (one-shot messenger envelope).
pub struct PostEncoder<'a> {
    /// Mailbox token for routing a reply back to the sender, if any.
    pub token: Option<u64>,
    pub fields: &'a [(String, Value)],
}

impl<'a> PostEncoder<'a> {
    pub fn new(token: Option<u64>, fields: &'a [(String, Value)]) -> Self {
        Self { token, fields }
    }

    /// Encode this post into the encoder.
    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.variant_begin("Post")?;
        enc.map_begin()?;

        enc.variant_begin("token")?;
        match self.token {
            Some(t) => {
                enc.option_some_begin()?;
                enc.u64(t)?;
                enc.option_some_end()?;
            }
            None => enc.option_none()?,
        }
        enc.variant_end()?;

        enc.variant_begin("fields")?;
        enc.map_begin()?;
        for (name, value) in self.fields {
            enc.variant_begin(name)?;
            encode_value(enc, value)?;
            enc.variant_end()?;
        }
        enc.map_end()?;
        enc.variant_end()?;

        enc.map_end()?;
        enc.variant_end()?;
        Ok(())
    }
}

/// A decoded inbound Post frame.
pub struct PostDecoder {
    pub token: Option<u64>,
    pub fields: Vec<(String, Value)>,
}

impl PostDecoder {
    /// Decode a Post frame body.
    pub fn decode(mut dec: Decoder<'_>) -> Result<Self> {
        let mut map = dec.map()?;
        let mut token = None;
        let mut fields = None;

        while let Some((key, mut val)) = map.next()? {
            match key {
                "token" => {
                    token = match val.option()? {
                        Some(mut body) => Some(body.u64()?),
                        None => None,
                    };
                }
                "fields" => {
                    let mut inner = val.map()?;
                    let mut bag = Vec::new();
                    while let Some((name, mut field)) = inner.next()? {
                        bag.push((name.to_string(), decode_value(&mut field)?));
                    }
                    fields = Some(bag);
                }
                _ => val.skip()?,
            }
        }

        Ok(PostDecoder {
            token,
            fields: fields.ok_or(Error::ProtocolViolation("Missing fields".into()))?,
        })
    }
}

/// Top-level frame decoder.
pub enum RpcFrame<'a> {
    Call(CallDecoder<'a>),
    Reply(ReplyDecoder),
    Post(PostDecoder),
}

impl<'a> RpcFrame<'a> {
    /// Decode any frame from the decoder.
    pub fn decode(dec: &mut Decoder<'a>) -> Result<Self> {
        let (frame_kind, body) = dec.variant()?;
        match frame_kind {
            "Call" => Ok(RpcFrame::Call(CallDecoder::decode(body)?)),
            "Reply" => Ok(RpcFrame::Reply(ReplyDecoder::decode(body)?)),
            "Post" => Ok(RpcFrame::Post(PostDecoder::decode(body)?)),
            _ => Err(Error::UnknownVariant(format!("Top-level frame: {}", frame_kind))),
        }
    }
}

/// Decodes just the sequence number from a raw Call or Reply frame.
///
/// Useful for producing a correlated failure reply when full decoding of the
/// frame fails. Post frames carry no seq and return `ProtocolViolation`.
pub fn decode_seq(bytes: &[u8]) -> Result<u64> {
    let mut dec = Decoder::new(bytes);
    let (frame_kind, mut body) = dec.variant()?;
    let mut map = match frame_kind {
        "Call" => body.map()?,
        "Reply" => match body.result()? {
            Ok(mut ok_body) => ok_body.map()?,
            Err(mut err_body) => err_body.map()?,
        },
        "Post" => return Err(Error::ProtocolViolation("Post frames carry no seq".into())),
        _ => return Err(Error::UnknownVariant(format!("Top-level frame: {}", frame_kind))),
    };

    while let Some((key, mut val)) = map.next()? {
        if key == "seq" {
            return Ok(val.u64()?);
        } else {
            val.skip()?;
        }
    }

    Err(Error::ProtocolViolation("Missing seq".into()))
}

// Helper functions

fn write_map_u64(enc: &mut Encoder, key: &str, val: u64) -> Result<()> {
    enc.variant_begin(key)?;
    enc.u64(val)?;
    enc.variant_end()?;
    Ok(())
}

fn write_map_str(enc: &mut Encoder, key: &str, val: &str) -> Result<()> {
    enc.variant_begin(key)?;
    enc.str(val)?;
    enc.variant_end()?;
    Ok(())
}

/// Encode a unit variant (variant with no payload).
fn encode_unit_variant(enc: &mut Encoder, tag: &str) -> Result<()> {
    enc.variant_begin(tag)?;
    enc.unit()?;
    enc.variant_end()?;
    Ok(())
}

/// Decode a unit variant and return its tag.
fn decode_unit_variant<'a>(dec: &mut Decoder<'a>) -> Result<&'a str> {
    let (tag, mut body) = dec.variant()?;
    body.unit()?;
    Ok(tag)
}
