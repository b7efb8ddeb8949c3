//! Dynamically typed values and their async-aware encoding.
//!
//! A [`Type`] describes one parameter or result position the way an interface
//! description would. A [`Value`] is the matching runtime data. Encoding walks
//! both together, assigning every nested position its [`Index`]:
//!
//! | container        | child index appended          |
//! |------------------|-------------------------------|
//! | record / tuple   | field / member position       |
//! | variant          | arm position (payload only)   |
//! | `option<T>`      | `1` for `some`                |
//! | `result<T, E>`   | `0` for `ok`, `1` for `err`   |
//! | list / stream    | element emission order        |
//! | `future<T>`      | `0` for the value             |
//!
//! Futures and streams that are not ready at encode time are written as a
//! single `0` byte and reported as [`AsyncPosition`]s, which the caller then
//! fulfills on the channel addressed by their index. A future's value travels
//! on the future's own channel, but positions inside it are addressed below
//! `0`, so a ready future and a later delivery assign the same indices.
//!
//! # Example
//!
//! ```
//! use wrpc_wire::value::{decode_values, encode_values, Type, Value};
//!
//! let types = [Type::String, Type::Stream(Box::new(Type::U8))];
//! let values = [Value::String("key".into()), Value::Stream(None)];
//!
//! let encoded = encode_values(&types, &values).unwrap();
//! assert_eq!(encoded.deferred.len(), 1);
//! assert_eq!(encoded.deferred[0].index.as_slice(), &[1]);
//!
//! let (decoded, n) = decode_values(&types, &encoded.bytes).unwrap().unwrap();
//! assert_eq!(n, encoded.bytes.len());
//! assert_eq!(decoded.values, values);
//! ```

mod decode;
mod deferred;
mod encode;
mod paths;

use bytes::Bytes;

use crate::index::Index;

pub use decode::decode_values;
pub use deferred::{
    encode_stream_chunk, Delivered, FutureDecoder, StreamDecoder, StreamEvent, STREAM_END,
};
pub use encode::{encode_value, encode_values};
pub use paths::async_paths;

/// Type of a parameter or result position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Bool,
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    F32,
    F64,
    Char,
    String,
    List(Box<Type>),
    /// Named fields in declaration order.
    Record(Vec<(String, Type)>),
    Tuple(Vec<Type>),
    /// Named arms in declaration order, each with an optional payload.
    Variant(Vec<(String, Option<Type>)>),
    Enum(Vec<String>),
    Option(Box<Type>),
    Result {
        ok: Option<Box<Type>>,
        err: Option<Box<Type>>,
    },
    /// At most 64 labels.
    Flags(Vec<String>),
    Future(Box<Type>),
    Stream(Box<Type>),
    /// Opaque handle, encoded as `list<u8>`.
    Resource,
}

impl Type {
    /// Whether a future or stream occurs anywhere inside this type.
    pub fn is_async(&self) -> bool {
        match self {
            Type::Future(_) | Type::Stream(_) => true,
            Type::List(t) | Type::Option(t) => t.is_async(),
            Type::Record(fields) => fields.iter().any(|(_, t)| t.is_async()),
            Type::Tuple(ts) => ts.iter().any(Type::is_async),
            Type::Variant(arms) => arms.iter().any(|(_, t)| t.as_ref().is_some_and(Type::is_async)),
            Type::Result { ok, err } => {
                ok.as_deref().is_some_and(Type::is_async) || err.as_deref().is_some_and(Type::is_async)
            }
            _ => false,
        }
    }
}

/// Runtime value matching a [`Type`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    S8(i8),
    U8(u8),
    S16(i16),
    U16(u16),
    S32(i32),
    U32(u32),
    S64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    String(String),
    List(Vec<Value>),
    Record(Vec<Value>),
    Tuple(Vec<Value>),
    Variant {
        case: u32,
        payload: Option<Box<Value>>,
    },
    Enum(u32),
    Option(Option<Box<Value>>),
    Result(std::result::Result<Option<Box<Value>>, Option<Box<Value>>>),
    /// Bit `i` set means label `i` is present.
    Flags(u64),
    /// `None` is pending.
    Future(Option<Box<Value>>),
    /// `None` is pending, `Some` carries every element inline.
    Stream(Option<Vec<Value>>),
    Resource(Bytes),
}

impl Value {
    /// Short name used in type mismatch errors.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::S8(_) => "s8",
            Value::U8(_) => "u8",
            Value::S16(_) => "s16",
            Value::U16(_) => "u16",
            Value::S32(_) => "s32",
            Value::U32(_) => "u32",
            Value::S64(_) => "s64",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Tuple(_) => "tuple",
            Value::Variant { .. } => "variant",
            Value::Enum(_) => "enum",
            Value::Option(_) => "option",
            Value::Result(_) => "result",
            Value::Flags(_) => "flags",
            Value::Future(_) => "future",
            Value::Stream(_) => "stream",
            Value::Resource(_) => "resource",
        }
    }
}

/// Parameter and result types of one function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
}

impl Signature {
    pub fn new(params: Vec<Type>, results: Vec<Type>) -> Self {
        Self { params, results }
    }

    /// Index patterns the callee must accept parameter data on.
    pub fn param_paths(&self) -> Vec<crate::index::IndexPattern> {
        async_paths(&self.params)
    }

    /// Index patterns the caller must accept result data on.
    pub fn result_paths(&self) -> Vec<crate::index::IndexPattern> {
        async_paths(&self.results)
    }
}

/// What is outstanding at a deferred position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncKind {
    /// One `T` will be delivered.
    Future(Type),
    /// Chunks of `list<T>` will be delivered until the terminator.
    Stream(Type),
}

/// A pending future or stream discovered while encoding or decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncPosition {
    pub index: Index,
    pub kind: AsyncKind,
}

/// Output of [`encode_values`].
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Bytes,
    pub deferred: Vec<AsyncPosition>,
}

/// Output of [`decode_values`].
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub values: Vec<Value>,
    pub deferred: Vec<AsyncPosition>,
}
