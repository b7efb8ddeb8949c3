use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;
use wasm_tokio::Utf8Codec;

use super::{AsyncKind, AsyncPosition, Encoded, Type, Value};
use crate::codec::{leb128, put_byte_list, put_string, wire_len};
use crate::error::{Result, WireError};
use crate::index::Index;

/// Encode parameters (or results) positioned at `[i]`.
pub fn encode_values(types: &[Type], values: &[Value]) -> Result<Encoded> {
    if types.len() != values.len() {
        return Err(WireError::TypeMismatch(format!(
            "expected {} values, got {}",
            types.len(),
            values.len()
        )));
    }
    let mut dst = BytesMut::new();
    let mut deferred = Vec::new();
    let root = Index::root();
    for (i, (ty, value)) in types.iter().zip(values).enumerate() {
        encode_value(ty, value, &root.child(i as u32)?, &mut dst, &mut deferred)?;
    }
    Ok(Encoded {
        bytes: dst.freeze(),
        deferred,
    })
}

/// Encode one value at `index`, appending pending positions to `deferred`.
pub fn encode_value(
    ty: &Type,
    value: &Value,
    index: &Index,
    dst: &mut BytesMut,
    deferred: &mut Vec<AsyncPosition>,
) -> Result<()> {
    match (ty, value) {
        (Type::Bool, Value::Bool(v)) => dst.put_u8(u8::from(*v)),
        (Type::S8, Value::S8(v)) => dst.put_i8(*v),
        (Type::U8, Value::U8(v)) => dst.put_u8(*v),
        (Type::S16, Value::S16(v)) => leb128::put_i32(dst, (*v).into())?,
        (Type::U16, Value::U16(v)) => leb128::put_u32(dst, (*v).into())?,
        (Type::S32, Value::S32(v)) => leb128::put_i32(dst, *v)?,
        (Type::U32, Value::U32(v)) => leb128::put_u32(dst, *v)?,
        (Type::S64, Value::S64(v)) => leb128::put_i64(dst, *v)?,
        (Type::U64, Value::U64(v)) => leb128::put_u64(dst, *v)?,
        (Type::F32, Value::F32(v)) => dst.put_f32_le(*v),
        (Type::F64, Value::F64(v)) => dst.put_f64_le(*v),
        (Type::Char, Value::Char(c)) => Utf8Codec.encode(*c, dst)?,
        (Type::String, Value::String(s)) => put_string(dst, s)?,
        (Type::Resource, Value::Resource(handle)) => put_byte_list(dst, handle)?,
        (Type::List(elem), Value::List(items)) => encode_list(elem, items, index, 0, dst, deferred)?,
        (Type::Record(fields), Value::Record(items)) => {
            check_arity("record", fields.len(), items.len())?;
            for (j, ((_, t), v)) in fields.iter().zip(items).enumerate() {
                encode_value(t, v, &index.child(j as u32)?, dst, deferred)?;
            }
        }
        (Type::Tuple(types), Value::Tuple(items)) => {
            check_arity("tuple", types.len(), items.len())?;
            for (j, (t, v)) in types.iter().zip(items).enumerate() {
                encode_value(t, v, &index.child(j as u32)?, dst, deferred)?;
            }
        }
        (Type::Variant(arms), Value::Variant { case, payload }) => {
            let (_, arm) = arms
                .get(*case as usize)
                .ok_or_else(|| WireError::TypeMismatch(format!("variant has no case {case}")))?;
            leb128::put_u32(dst, *case)?;
            encode_payload(arm.as_ref(), payload.as_deref(), &index.child(*case)?, dst, deferred)?;
        }
        (Type::Enum(cases), Value::Enum(case)) => {
            if *case as usize >= cases.len() {
                return Err(WireError::TypeMismatch(format!("enum has no case {case}")));
            }
            leb128::put_u32(dst, *case)?;
        }
        (Type::Option(inner), Value::Option(v)) => match v {
            None => dst.put_u8(0),
            Some(v) => {
                dst.put_u8(1);
                encode_value(inner, v, &index.child(1)?, dst, deferred)?;
            }
        },
        (Type::Result { ok, err }, Value::Result(v)) => match v {
            Ok(payload) => {
                dst.put_u8(0);
                encode_payload(ok.as_deref(), payload.as_deref(), &index.child(0)?, dst, deferred)?;
            }
            Err(payload) => {
                dst.put_u8(1);
                encode_payload(err.as_deref(), payload.as_deref(), &index.child(1)?, dst, deferred)?;
            }
        },
        (Type::Flags(labels), Value::Flags(bits)) => {
            let n = labels.len();
            if n > 64 {
                return Err(WireError::TypeMismatch(format!("{n} flags exceed 64")));
            }
            if n < 64 && bits >> n != 0 {
                return Err(WireError::TypeMismatch(format!("flag bits {bits:#x} exceed {n} labels")));
            }
            dst.put_slice(&bits.to_le_bytes()[..n.div_ceil(8)]);
        }
        (Type::Future(inner), Value::Future(v)) => match v {
            None => {
                dst.put_u8(0);
                deferred.push(AsyncPosition {
                    index: index.clone(),
                    kind: AsyncKind::Future((**inner).clone()),
                });
            }
            Some(v) => {
                dst.put_u8(1);
                encode_value(inner, v, &index.child(0)?, dst, deferred)?;
            }
        },
        (Type::Stream(elem), Value::Stream(v)) => match v {
            None => {
                dst.put_u8(0);
                deferred.push(AsyncPosition {
                    index: index.clone(),
                    kind: AsyncKind::Stream((**elem).clone()),
                });
            }
            Some(items) => {
                dst.put_u8(1);
                encode_list(elem, items, index, 0, dst, deferred)?;
            }
        },
        (ty, value) => {
            return Err(WireError::TypeMismatch(format!(
                "{} value for {ty:?} at {index}",
                value.kind()
            )))
        }
    }
    Ok(())
}

/// Elements are indexed from `first` so stream chunks keep counting.
pub(super) fn encode_list(
    elem: &Type,
    items: &[Value],
    index: &Index,
    first: u32,
    dst: &mut BytesMut,
    deferred: &mut Vec<AsyncPosition>,
) -> Result<()> {
    leb128::put_u32(dst, wire_len(items.len())?)?;
    for (k, item) in items.iter().enumerate() {
        let position = first
            .checked_add(k as u32)
            .ok_or_else(|| WireError::Malformed("element index overflows u32".into()))?;
        encode_value(elem, item, &index.child(position)?, dst, deferred)?;
    }
    Ok(())
}

fn encode_payload(
    ty: Option<&Type>,
    value: Option<&Value>,
    index: &Index,
    dst: &mut BytesMut,
    deferred: &mut Vec<AsyncPosition>,
) -> Result<()> {
    match (ty, value) {
        (None, None) => Ok(()),
        (Some(ty), Some(value)) => encode_value(ty, value, index, dst, deferred),
        (Some(_), None) => Err(WireError::TypeMismatch(format!("missing payload at {index}"))),
        (None, Some(_)) => Err(WireError::TypeMismatch(format!("unexpected payload at {index}"))),
    }
}

fn check_arity(what: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(WireError::TypeMismatch(format!(
            "{what} has {expected} members, got {got}"
        )));
    }
    Ok(())
}
