//! # Protocol Frames
//!
//! The envelope around one invocation and its reply.
//!
//! ```text
//! Invoke := Variant("Invoke", Record { seq, target, method, args })
//! Reply  := Variant("Reply",  Ok(Record { seq, result }) | Err(Record { seq, kind, message }))
//! ```
//!
//! ## Invariants
//! - **Panic safety**: every decoding path returns `Result`.
//! - **Forward compatibility**: unknown record fields are skipped.

use tetherpack::Decoder;
use tetherpack::Encoder;

use crate::codec::decode_value;
use crate::codec::decode_values;
use crate::codec::encode_value;
use crate::codec::encode_values;
use crate::error::Error;
use crate::error::FailureKind;
use crate::error::RemoteFailure;
use crate::error::Result;
use crate::handle::RemoteHandle;
use crate::value::Value;

/// Encodes an outbound invocation without copying its arguments.
pub struct InvokeEncoder<'a> {
    pub seq: u64,
    pub target: &'a RemoteHandle,
    pub method: &'a str,
    pub args: &'a [Value],
}

impl<'a> InvokeEncoder<'a> {
    pub fn new(seq: u64, target: &'a RemoteHandle, method: &'a str, args: &'a [Value]) -> Self {
        Self { seq, target, method, args }
    }

    pub fn encode(&self, enc: &mut Encoder, max_depth: usize) -> Result<()> {
        enc.variant_begin("Invoke")?;
        enc.record_begin()?;

        write_seq(enc, self.seq)?;
        enc.variant_begin("target")?;
        enc.handle(self.target.id())?;
        enc.variant_end()?;
        write_field_str(enc, "method", self.method)?;

        enc.variant_begin("args")?;
        encode_values(enc, self.args, max_depth)?;
        enc.variant_end()?;

        enc.record_end()?;
        enc.variant_end()?;
        Ok(())
    }

    pub fn to_bytes(&self, max_depth: usize) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc, max_depth)?;
        Ok(enc.into_bytes()?)
    }
}

/// A decoded inbound invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    pub seq: u64,
    pub target: RemoteHandle,
    pub method: String,
    pub args: Vec<Value>,
}

impl Invocation {
    fn decode(mut body: Decoder, max_depth: usize) -> Result<Self> {
        let mut fields = body.record()?;
        let mut seq = None;
        let mut target = None;
        let mut method = None;
        let mut args = None;

        while let Some((name, mut val)) = fields.next()? {
            match name {
                "seq" => seq = Some(read_seq(&mut val)?),
                "target" => target = Some(RemoteHandle::new(val.handle()?)),
                "method" => method = Some(val.str()?.to_string()),
                "args" => args = Some(decode_values(&mut val, max_depth)?),
                _ => val.skip()?,
            }
        }

        Ok(Self {
            seq: seq.ok_or_else(|| missing("seq"))?,
            target: target.ok_or_else(|| missing("target"))?,
            method: method.ok_or_else(|| missing("method"))?,
            args: args.ok_or_else(|| missing("args"))?,
        })
    }
}

/// A reply, either decoded from the wire or built by a foreign runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub seq: u64,
    pub outcome: std::result::Result<Value, RemoteFailure>,
}

impl Reply {
    pub fn ok(seq: u64, result: Value) -> Self {
        Self { seq, outcome: Ok(result) }
    }

    pub fn err(seq: u64, failure: RemoteFailure) -> Self {
        Self { seq, outcome: Err(failure) }
    }

    pub fn encode(&self, enc: &mut Encoder, max_depth: usize) -> Result<()> {
        enc.variant_begin("Reply")?;
        match &self.outcome {
            Ok(result) => {
                enc.result_ok_begin()?;
                enc.record_begin()?;
                write_seq(enc, self.seq)?;
                enc.variant_begin("result")?;
                encode_value(enc, result, max_depth)?;
                enc.variant_end()?;
                enc.record_end()?;
                enc.result_ok_end()?;
            }
            Err(failure) => {
                enc.result_err_begin()?;
                enc.record_begin()?;
                write_seq(enc, self.seq)?;
                write_field_str(enc, "kind", failure.kind.as_tag())?;
                write_field_str(enc, "message", &failure.message)?;
                enc.record_end()?;
                enc.result_err_end()?;
            }
        }
        enc.variant_end()?;
        Ok(())
    }

    pub fn to_bytes(&self, max_depth: usize) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc, max_depth)?;
        Ok(enc.into_bytes()?)
    }

    fn decode(mut body: Decoder, max_depth: usize) -> Result<Self> {
        match body.result()? {
            Ok(mut ok_body) => {
                let mut fields = ok_body.record()?;
                let mut seq = None;
                let mut result = None;
                while let Some((name, mut val)) = fields.next()? {
                    match name {
                        "seq" => seq = Some(read_seq(&mut val)?),
                        "result" => result = Some(decode_value(&mut val, max_depth)?),
                        _ => val.skip()?,
                    }
                }
                Ok(Self::ok(
                    seq.ok_or_else(|| missing("seq"))?,
                    result.ok_or_else(|| missing("result"))?,
                ))
            }
            Err(mut err_body) => {
                let mut fields = err_body.record()?;
                let mut seq = None;
                let mut kind = None;
                let mut message = None;
                while let Some((name, mut val)) = fields.next()? {
                    match name {
                        "seq" => seq = Some(read_seq(&mut val)?),
                        "kind" => kind = Some(FailureKind::from_tag(val.str()?)),
                        "message" => message = Some(val.str()?.to_string()),
                        _ => val.skip()?,
                    }
                }
                let kind = kind.ok_or_else(|| missing("kind"))?;
                Ok(Self::err(
                    seq.ok_or_else(|| missing("seq"))?,
                    RemoteFailure::new(kind, message.unwrap_or_default()),
                ))
            }
        }
    }
}

/// Top-level frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Invoke(Invocation),
    Reply(Reply),
}

impl Frame {
    pub fn decode(bytes: &[u8], max_depth: usize) -> Result<Self> {
        let mut dec = Decoder::new(bytes);
        let (kind, body) = dec.variant()?;
        match kind {
            "Invoke" => Ok(Frame::Invoke(Invocation::decode(body, max_depth)?)),
            "Reply" => Ok(Frame::Reply(Reply::decode(body, max_depth)?)),
            other => Err(Error::Protocol(format!("unknown frame kind: {}", other))),
        }
    }
}

fn missing(field: &str) -> Error {
    Error::Protocol(format!("missing {}", field))
}

// Sequence numbers travel as s64; anything past i64::MAX is refused.
fn write_seq(enc: &mut Encoder, seq: u64) -> Result<()> {
    let wire = i64::try_from(seq).map_err(|_| Error::Protocol(format!("sequence {} out of range", seq)))?;
    enc.variant_begin("seq")?;
    enc.s64(wire)?;
    enc.variant_end()?;
    Ok(())
}

fn read_seq(dec: &mut Decoder) -> Result<u64> {
    let wire = dec.s64()?;
    u64::try_from(wire).map_err(|_| Error::Protocol(format!("negative sequence {}", wire)))
}

fn write_field_str(enc: &mut Encoder, name: &str, val: &str) -> Result<()> {
    enc.variant_begin(name)?;
    enc.str(val)?;
    enc.variant_end()?;
    Ok(())
}
