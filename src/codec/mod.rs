//! Base structured-value encoding primitives.
//!
//! The protocol reuses a component-model style byte encoding for headers,
//! frames and values:
//!
//! - integers: LEB128 ([`leb128`])
//! - `string`: LEB128 byte length + UTF-8
//! - `list<u8>`: LEB128 length + raw bytes
//! - `list<u32>`: LEB128 count + LEB128 elements
//!
//! Strings and byte lists are written with the `wasm_tokio` core encoders.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use wrpc_wire::codec::put_string;
//!
//! let mut buf = BytesMut::new();
//! put_string(&mut buf, "demo").unwrap();
//! assert_eq!(&buf[..], &[0x04, b'd', b'e', b'm', b'o']);
//! ```

pub mod leb128;
mod reader;

use bytes::BytesMut;
use tokio_util::codec::Encoder;
use wasm_tokio::{CoreNameEncoder, CoreVecEncoderBytes};

use crate::error::{Result, WireError};

pub(crate) use reader::{complete, ReadError, ReadResult, Reader};

/// Convert a length to the `u32` carried on the wire.
#[inline]
pub fn wire_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| WireError::Malformed(format!("length {len} does not fit in u32")))
}

/// Encode a `string`.
pub fn put_string(dst: &mut BytesMut, s: &str) -> Result<()> {
    wire_len(s.len())?;
    CoreNameEncoder.encode(s, dst)?;
    Ok(())
}

/// Encode a `list<u8>`.
pub fn put_byte_list(dst: &mut BytesMut, bytes: &[u8]) -> Result<()> {
    wire_len(bytes.len())?;
    CoreVecEncoderBytes.encode(bytes, dst)?;
    Ok(())
}

/// Encode a `list<u32>`.
pub fn put_u32_list(dst: &mut BytesMut, values: &[u32]) -> Result<()> {
    leb128::put_u32(dst, wire_len(values.len())?)?;
    for v in values {
        leb128::put_u32(dst, *v)?;
    }
    Ok(())
}
