use bytes::Bytes;
use wasm_tokio::Utf8Codec;

use super::{AsyncKind, AsyncPosition, Decoded, Type, Value};
use crate::codec::{complete, ReadError, ReadResult, Reader};
use crate::error::{Result, WireError};
use crate::index::Index;

/// Decode parameters (or results) positioned at `[i]`.
///
/// Returns `Ok(None)` while `buf` is too short, otherwise the values and the
/// number of bytes consumed.
pub fn decode_values(types: &[Type], buf: &[u8]) -> Result<Option<(Decoded, usize)>> {
    let mut r = Reader::new(buf);
    let mut deferred = Vec::new();
    let values = complete(decode_params(types, &mut r, &mut deferred))?;
    Ok(values.map(|values| (Decoded { values, deferred }, r.position())))
}

fn decode_params(
    types: &[Type],
    r: &mut Reader<'_>,
    deferred: &mut Vec<AsyncPosition>,
) -> ReadResult<Vec<Value>> {
    let root = Index::root();
    let mut values = Vec::with_capacity(types.len());
    for (i, ty) in types.iter().enumerate() {
        values.push(decode_value(ty, r, &root.child(i as u32)?, deferred)?);
    }
    Ok(values)
}

/// Decode a single value rooted at `index`.
pub(crate) fn decode_one(
    ty: &Type,
    buf: &[u8],
    index: &Index,
) -> Result<Option<(Value, Vec<AsyncPosition>, usize)>> {
    let mut r = Reader::new(buf);
    let mut deferred = Vec::new();
    let value = complete(decode_value(ty, &mut r, index, &mut deferred))?;
    Ok(value.map(|v| (v, deferred, r.position())))
}

pub(super) fn decode_value(
    ty: &Type,
    r: &mut Reader<'_>,
    index: &Index,
    deferred: &mut Vec<AsyncPosition>,
) -> ReadResult<Value> {
    let value = match ty {
        Type::Bool => match r.read_u8()? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            b => return Err(invalid(format!("invalid bool {b:#04x} at {index}"))),
        },
        Type::S8 => Value::S8(r.read_u8()? as i8),
        Type::U8 => Value::U8(r.read_u8()?),
        Type::S16 => Value::S16(r.read_signed(16)? as i16),
        Type::U16 => Value::U16(r.read_unsigned(16)? as u16),
        Type::S32 => Value::S32(r.read_signed(32)? as i32),
        Type::U32 => Value::U32(r.read_u32()?),
        Type::S64 => Value::S64(r.read_signed(64)?),
        Type::U64 => Value::U64(r.read_unsigned(64)?),
        Type::F32 => {
            let b = r.read_bytes(4)?;
            Value::F32(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        }
        Type::F64 => {
            let b = r.read_bytes(8)?;
            let mut raw = [0; 8];
            raw.copy_from_slice(b);
            Value::F64(f64::from_le_bytes(raw))
        }
        Type::Char => Value::Char(read_char(r, index)?),
        Type::String => Value::String(r.read_string()?.to_owned()),
        Type::Resource => Value::Resource(Bytes::copy_from_slice(r.read_byte_list()?)),
        Type::List(elem) => Value::List(decode_list(elem, r, index, 0, deferred)?),
        Type::Record(fields) => {
            let mut items = Vec::with_capacity(fields.len());
            for (j, (_, t)) in fields.iter().enumerate() {
                items.push(decode_value(t, r, &index.child(j as u32)?, deferred)?);
            }
            Value::Record(items)
        }
        Type::Tuple(types) => {
            let mut items = Vec::with_capacity(types.len());
            for (j, t) in types.iter().enumerate() {
                items.push(decode_value(t, r, &index.child(j as u32)?, deferred)?);
            }
            Value::Tuple(items)
        }
        Type::Variant(arms) => {
            let case = r.read_u32()?;
            let (_, arm) = arms
                .get(case as usize)
                .ok_or_else(|| invalid(format!("variant discriminant {case} out of range at {index}")))?;
            let payload = match arm {
                Some(t) => Some(Box::new(decode_value(t, r, &index.child(case)?, deferred)?)),
                None => None,
            };
            Value::Variant { case, payload }
        }
        Type::Enum(cases) => {
            let case = r.read_u32()?;
            if case as usize >= cases.len() {
                return Err(invalid(format!("enum discriminant {case} out of range at {index}")));
            }
            Value::Enum(case)
        }
        Type::Option(inner) => match r.read_u8()? {
            0 => Value::Option(None),
            1 => Value::Option(Some(Box::new(decode_value(
                inner,
                r,
                &index.child(1)?,
                deferred,
            )?))),
            b => return Err(invalid(format!("invalid option status {b:#04x} at {index}"))),
        },
        Type::Result { ok, err } => match r.read_u8()? {
            0 => Value::Result(Ok(decode_payload(ok.as_deref(), r, &index.child(0)?, deferred)?)),
            1 => Value::Result(Err(decode_payload(err.as_deref(), r, &index.child(1)?, deferred)?)),
            b => return Err(invalid(format!("invalid result status {b:#04x} at {index}"))),
        },
        Type::Flags(labels) => {
            let n = labels.len();
            if n > 64 {
                return Err(ReadError::Invalid(WireError::TypeMismatch(format!(
                    "{n} flags exceed 64"
                ))));
            }
            let b = r.read_bytes(n.div_ceil(8))?;
            let mut raw = [0; 8];
            raw[..b.len()].copy_from_slice(b);
            let bits = u64::from_le_bytes(raw);
            if n < 64 && bits >> n != 0 {
                return Err(invalid(format!("unknown flag bits {bits:#x} at {index}")));
            }
            Value::Flags(bits)
        }
        Type::Future(inner) => match r.read_u8()? {
            0 => {
                deferred.push(AsyncPosition {
                    index: index.clone(),
                    kind: AsyncKind::Future((**inner).clone()),
                });
                Value::Future(None)
            }
            1 => Value::Future(Some(Box::new(decode_value(inner, r, &index.child(0)?, deferred)?))),
            b => return Err(invalid(format!("invalid future status {b:#04x} at {index}"))),
        },
        Type::Stream(elem) => match r.read_u8()? {
            0 => {
                deferred.push(AsyncPosition {
                    index: index.clone(),
                    kind: AsyncKind::Stream((**elem).clone()),
                });
                Value::Stream(None)
            }
            1 => Value::Stream(Some(decode_list(elem, r, index, 0, deferred)?)),
            b => return Err(invalid(format!("invalid stream status {b:#04x} at {index}"))),
        },
    };
    Ok(value)
}

pub(super) fn decode_list(
    elem: &Type,
    r: &mut Reader<'_>,
    index: &Index,
    first: u32,
    deferred: &mut Vec<AsyncPosition>,
) -> ReadResult<Vec<Value>> {
    let n = r.read_len()?;
    // capacity bounded by the bytes present
    let mut items = Vec::with_capacity(n.min(r.remaining()));
    for k in 0..n {
        let position = first
            .checked_add(k as u32)
            .ok_or_else(|| invalid("element index overflows u32".into()))?;
        items.push(decode_value(elem, r, &index.child(position)?, deferred)?);
    }
    Ok(items)
}

fn decode_payload(
    ty: Option<&Type>,
    r: &mut Reader<'_>,
    index: &Index,
    deferred: &mut Vec<AsyncPosition>,
) -> ReadResult<Option<Box<Value>>> {
    match ty {
        Some(t) => Ok(Some(Box::new(decode_value(t, r, index, deferred)?))),
        None => Ok(None),
    }
}

fn read_char(r: &mut Reader<'_>, index: &Index) -> ReadResult<char> {
    let first = *r.peek().ok_or(ReadError::Incomplete)?;
    let len = match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => return Err(invalid(format!("invalid char lead byte {first:#04x} at {index}"))),
    };
    r.decode(Utf8Codec, len).map_err(|err| match err {
        ReadError::Invalid(err) => invalid(format!("invalid char at {index}: {err}")),
        incomplete => incomplete,
    })
}

fn invalid(msg: String) -> ReadError {
    ReadError::Invalid(WireError::Malformed(msg))
}
