//! LEB128 variable-length integers.
//!
//! Encoding goes through `wasm_tokio::Leb128Encoder`. Decoding runs the
//! `wasm_tokio` LEB128 decoders over a window of at most the longest legal
//! encoding for the width, so a truncated value reads as incomplete while an
//! overlong one is rejected without waiting for more bytes.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use wrpc_wire::codec::leb128;
//!
//! let mut buf = BytesMut::new();
//! leb128::put_u32(&mut buf, 300).unwrap();
//! assert_eq!(&buf[..], &[0xac, 0x02]);
//! assert_eq!(leb128::get_u32(&buf).unwrap(), Some((300, 2)));
//! ```

use bytes::BytesMut;
use tokio_util::codec::Encoder;
use wasm_tokio::{Leb128DecoderI64, Leb128DecoderU64, Leb128Encoder};

use super::reader::{complete, decode_prefix, ReadError, ReadResult};
use crate::error::{Result, WireError};

/// Maximum encoded length of a `u32`.
pub const MAX_U32_LEN: usize = max_len(32);

/// Maximum encoded length of a `u64`.
pub const MAX_U64_LEN: usize = max_len(64);

const fn max_len(bits: u32) -> usize {
    bits.div_ceil(7) as usize
}

pub fn put_u32(dst: &mut BytesMut, v: u32) -> Result<()> {
    Leb128Encoder.encode(v, dst)?;
    Ok(())
}

pub fn put_u64(dst: &mut BytesMut, v: u64) -> Result<()> {
    Leb128Encoder.encode(v, dst)?;
    Ok(())
}

pub fn put_i32(dst: &mut BytesMut, v: i32) -> Result<()> {
    Leb128Encoder.encode(v, dst)?;
    Ok(())
}

pub fn put_i64(dst: &mut BytesMut, v: i64) -> Result<()> {
    Leb128Encoder.encode(v, dst)?;
    Ok(())
}

fn malformed(msg: String) -> ReadError {
    ReadError::Invalid(WireError::Malformed(msg))
}

/// Decode an unsigned value of at most `bits` bits.
pub(crate) fn read_unsigned(buf: &[u8], bits: u32) -> ReadResult<(u64, usize)> {
    let (value, n) = decode_prefix(Leb128DecoderU64, buf, max_len(bits))?;
    if bits < 64 && value >> bits != 0 {
        return Err(malformed(format!("LEB128 value overflows {bits} bits")));
    }
    Ok((value, n))
}

/// Decode a signed value of at most `bits` bits.
pub(crate) fn read_signed(buf: &[u8], bits: u32) -> ReadResult<(i64, usize)> {
    let (value, n) = decode_prefix(Leb128DecoderI64, buf, max_len(bits))?;
    if bits < 64 {
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        if value < min || value > max {
            return Err(malformed(format!("LEB128 value overflows {bits} bits")));
        }
    }
    Ok((value, n))
}

/// Decode a `u32` from the front of `buf`.
///
/// `Ok(None)` means more bytes are needed.
pub fn get_u32(buf: &[u8]) -> Result<Option<(u32, usize)>> {
    complete(read_unsigned(buf, 32).map(|(v, n)| (v as u32, n)))
}

/// Decode a `u64` from the front of `buf`.
pub fn get_u64(buf: &[u8]) -> Result<Option<(u64, usize)>> {
    complete(read_unsigned(buf, 64))
}

/// Decode an `i64` from the front of `buf`.
pub fn get_i64(buf: &[u8]) -> Result<Option<(i64, usize)>> {
    complete(read_signed(buf, 64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc_u64(v: u64) -> Vec<u8> {
        let mut buf = BytesMut::new();
        put_u64(&mut buf, v).unwrap();
        buf.to_vec()
    }

    fn enc_i64(v: i64) -> Vec<u8> {
        let mut buf = BytesMut::new();
        put_i64(&mut buf, v).unwrap();
        buf.to_vec()
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(enc_u64(127), vec![0x7f]);
        assert_eq!(enc_u64(624_485), vec![0xe5, 0x8e, 0x26]);
        assert_eq!(enc_u64(u32::MAX.into()).len(), MAX_U32_LEN);
        assert_eq!(enc_u64(u64::MAX).len(), MAX_U64_LEN);
        assert_eq!(enc_i64(-1), vec![0x7f]);
        assert_eq!(enc_i64(-123_456), vec![0xc0, 0xbb, 0x78]);
    }

    #[test]
    fn test_decode_reports_length_used() {
        assert_eq!(get_u32(&[0xe5, 0x8e, 0x26, 0xff]).unwrap(), Some((624_485, 3)));
        assert_eq!(get_u64(&enc_u64(u64::MAX)).unwrap(), Some((u64::MAX, 10)));
        for v in [0, -64, 64, i64::MIN] {
            let buf = enc_i64(v);
            assert_eq!(get_i64(&buf).unwrap(), Some((v, buf.len())), "value {v}");
        }
    }

    #[test]
    fn test_incomplete_returns_none() {
        assert_eq!(get_u32(&[]).unwrap(), None);
        assert_eq!(get_u32(&[0x80, 0x80]).unwrap(), None);
    }

    #[test]
    fn test_u32_width_enforced() {
        // 2^32 needs a fifth byte with bit 4 set
        assert!(get_u32(&[0x80, 0x80, 0x80, 0x80, 0x10]).is_err());
        assert!(get_u32(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x00]).is_err());
        assert_eq!(
            get_u32(&[0xff, 0xff, 0xff, 0xff, 0x0f]).unwrap(),
            Some((u32::MAX, 5))
        );
    }

    #[test]
    fn test_signed_range_check() {
        let buf = enc_i64(i64::from(i32::MAX) + 1);
        assert!(complete(read_signed(&buf, 32)).is_err());
        let buf = enc_i64(i64::from(i32::MIN));
        assert_eq!(
            complete(read_signed(&buf, 32)).unwrap(),
            Some((i64::from(i32::MIN), buf.len()))
        );
    }
}
