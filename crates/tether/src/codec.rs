//! # Codec
//!
//! Translation between `Value` and the tetherpack wire format.
//!
//! ## Invariants
//! - **Bounded recursion**: nesting deeper than `max_depth` is rejected in both
//!   directions.
//! - **Exact kinds**: every scalar keeps its width on the wire.

use tetherpack::Decoder;
use tetherpack::Encoder;
use tetherpack::Tag;

use crate::error::Error;
use crate::error::Result;
use crate::handle::RemoteHandle;
use crate::value::Value;

/// Nesting limit used when no configuration is at hand.
pub const DEFAULT_MAX_DEPTH: usize = 64;

fn too_deep(max_depth: usize) -> Error {
    Error::Protocol(format!("value nesting exceeds {} levels", max_depth))
}

pub fn encode_value(enc: &mut Encoder, val: &Value, max_depth: usize) -> Result<()> {
    encode_value_impl(enc, val, 0, max_depth)
}

fn encode_value_impl(enc: &mut Encoder, val: &Value, depth: usize, max_depth: usize) -> Result<()> {
    if depth > max_depth {
        return Err(too_deep(max_depth));
    }

    match val {
        Value::Unit => enc.unit()?,
        Value::Bool(v) => enc.bool(*v)?,
        Value::Byte(v) => enc.s8(*v)?,
        Value::Short(v) => enc.s16(*v)?,
        Value::Int(v) => enc.s32(*v)?,
        Value::Long(v) => enc.s64(*v)?,
        Value::Float(v) => enc.f32(*v)?,
        Value::Double(v) => enc.f64(*v)?,
        Value::Char(v) => enc.char(*v)?,
        Value::String(v) => enc.str(v)?,
        Value::Handle(h) => enc.handle(h.id())?,
        Value::List(items) => {
            enc.list_begin()?;
            for item in items {
                encode_value_impl(enc, item, depth + 1, max_depth)?;
            }
            enc.list_end()?;
        }
        Value::Map(entries) => {
            enc.map_begin()?;
            for (key, value) in entries {
                encode_value_impl(enc, key, depth + 1, max_depth)?;
                encode_value_impl(enc, value, depth + 1, max_depth)?;
            }
            enc.map_end()?;
        }
    }
    Ok(())
}

/// Encodes an argument list as a single wire list.
pub fn encode_values(enc: &mut Encoder, vals: &[Value], max_depth: usize) -> Result<()> {
    enc.list_begin()?;
    for val in vals {
        encode_value(enc, val, max_depth)?;
    }
    enc.list_end()?;
    Ok(())
}

pub fn decode_value(dec: &mut Decoder, max_depth: usize) -> Result<Value> {
    decode_value_impl(dec, 0, max_depth)
}

fn decode_value_impl(dec: &mut Decoder, depth: usize, max_depth: usize) -> Result<Value> {
    if depth > max_depth {
        return Err(too_deep(max_depth));
    }

    let val = match dec.peek_tag()? {
        Tag::Unit => { dec.unit()?; Value::Unit }
        Tag::BoolTrue | Tag::BoolFalse => Value::Bool(dec.bool()?),
        Tag::S8 => Value::Byte(dec.s8()?),
        Tag::S16 => Value::Short(dec.s16()?),
        Tag::S32 => Value::Int(dec.s32()?),
        Tag::S64 => Value::Long(dec.s64()?),
        Tag::F32 => Value::Float(dec.f32()?),
        Tag::F64 => Value::Double(dec.f64()?),
        Tag::Char => Value::Char(dec.char()?),
        Tag::String => Value::String(dec.str()?.to_string()),
        Tag::Handle => Value::Handle(RemoteHandle::new(dec.handle()?)),
        Tag::List => {
            let mut items = dec.list()?;
            let mut out = Vec::new();
            while let Some(mut item) = items.next()? {
                out.push(decode_value_impl(&mut item, depth + 1, max_depth)?);
            }
            Value::List(out)
        }
        Tag::Map => {
            let mut entries = dec.map()?;
            let mut out = Vec::new();
            while let Some((mut key, mut value)) = entries.next()? {
                let key = decode_value_impl(&mut key, depth + 1, max_depth)?;
                let value = decode_value_impl(&mut value, depth + 1, max_depth)?;
                out.push((key, value));
            }
            Value::Map(out)
        }
        tag @ (Tag::Record | Tag::ResultOk | Tag::ResultErr | Tag::Variant) => {
            return Err(Error::Protocol(format!("{:?} is framing, not a value", tag)));
        }
    };
    Ok(val)
}

/// Decodes a wire list into its values.
pub fn decode_values(dec: &mut Decoder, max_depth: usize) -> Result<Vec<Value>> {
    let mut items = dec.list()?;
    let mut out = Vec::new();
    while let Some(mut item) = items.next()? {
        out.push(decode_value(&mut item, max_depth)?);
    }
    Ok(out)
}
