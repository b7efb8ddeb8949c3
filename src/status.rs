//! Status byte convention for operations layered on invocations.
//!
//! A leading `0x00` marks success followed by the success payload; `0x01`
//! marks an application error followed by a discriminant:
//!
//! | Bytes                     | Meaning                     |
//! |---------------------------|-----------------------------|
//! | `0x00 <payload>`          | ok                          |
//! | `0x01 0x00`               | not found                   |
//! | `0x01 0x01`               | access denied               |
//! | `0x01 0x02 <string>`      | other, with message         |
//!
//! Optional values use an option byte after the status, so `0x00 0x00` is an
//! absent value and `0x00 0x01 <list<u8>>` a present one.
//!
//! Application errors are data: they decode into `Ok(Err(AppError))`, never
//! into a [`WireError`].
//!
//! ```
//! use wrpc_wire::status::{decode_optional, AppError};
//!
//! let (status, used) = decode_optional(&[0x00, 0x00]).unwrap().unwrap();
//! assert_eq!(status, Ok(None));
//! assert_eq!(used, 2);
//!
//! let (status, _) = decode_optional(&[0x01, 0x00]).unwrap().unwrap();
//! assert_eq!(status, Err(AppError::NotFound));
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::codec::{complete, put_byte_list, put_string, ReadError, ReadResult, Reader};
use crate::error::{Result, WireError};

const STATUS_OK: u8 = 0x00;
const STATUS_ERROR: u8 = 0x01;

/// Well-known application error kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,
    #[error("access denied")]
    AccessDenied,
    #[error("{0}")]
    Other(String),
}

impl AppError {
    fn discriminant(&self) -> u8 {
        match self {
            AppError::NotFound => 0,
            AppError::AccessDenied => 1,
            AppError::Other(_) => 2,
        }
    }

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u8(STATUS_ERROR);
        dst.put_u8(self.discriminant());
        if let AppError::Other(msg) = self {
            put_string(dst, msg)?;
        }
        Ok(())
    }

    fn read(r: &mut Reader<'_>) -> ReadResult<Self> {
        match r.read_u8()? {
            0 => Ok(AppError::NotFound),
            1 => Ok(AppError::AccessDenied),
            2 => Ok(AppError::Other(r.read_string()?.to_string())),
            other => Err(invalid(format!("unknown error discriminant {other}"))),
        }
    }
}

/// Outcome carried by a status payload.
pub type Status<T> = std::result::Result<T, AppError>;

fn invalid(msg: String) -> ReadError {
    ReadError::Invalid(WireError::Malformed(msg))
}

fn encode_status<T>(
    status: &Status<T>,
    encode_ok: impl FnOnce(&T, &mut BytesMut) -> Result<()>,
) -> Result<BytesMut> {
    let mut dst = BytesMut::new();
    match status {
        Ok(value) => {
            dst.put_u8(STATUS_OK);
            encode_ok(value, &mut dst)?;
        }
        Err(err) => err.encode(&mut dst)?,
    }
    Ok(dst)
}

fn decode_status<T>(
    buf: &[u8],
    read_ok: impl FnOnce(&mut Reader<'_>) -> ReadResult<T>,
) -> Result<Option<(Status<T>, usize)>> {
    let mut r = Reader::new(buf);
    let status = read_status(&mut r, read_ok);
    Ok(complete(status)?.map(|status| (status, r.position())))
}

fn read_status<T>(
    r: &mut Reader<'_>,
    read_ok: impl FnOnce(&mut Reader<'_>) -> ReadResult<T>,
) -> ReadResult<Status<T>> {
    match r.read_u8()? {
        STATUS_OK => Ok(Ok(read_ok(r)?)),
        STATUS_ERROR => Ok(Err(AppError::read(r)?)),
        other => Err(invalid(format!("unknown status byte {other:#04x}"))),
    }
}

/// Encode a status with no success payload.
pub fn encode_unit(status: &Status<()>) -> Result<BytesMut> {
    encode_status(status, |_, _| Ok(()))
}

/// Decode a status with no success payload.
///
/// Returns `Ok(None)` when `buf` is incomplete, along with the bytes used
/// otherwise.
pub fn decode_unit(buf: &[u8]) -> Result<Option<(Status<()>, usize)>> {
    decode_status(buf, |_| Ok(()))
}

/// Encode a status whose success payload is a `bool`.
pub fn encode_bool(status: &Status<bool>) -> Result<BytesMut> {
    encode_status(status, |v, dst| {
        dst.put_u8(u8::from(*v));
        Ok(())
    })
}

pub fn decode_bool(buf: &[u8]) -> Result<Option<(Status<bool>, usize)>> {
    decode_status(buf, |r| match r.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(invalid(format!("invalid bool byte {other:#04x}"))),
    })
}

/// Encode a status whose success payload is an optional byte list.
pub fn encode_optional(status: &Status<Option<Bytes>>) -> Result<BytesMut> {
    encode_status(status, |v, dst| {
        match v {
            None => dst.put_u8(0),
            Some(bytes) => {
                dst.put_u8(1);
                put_byte_list(dst, bytes)?;
            }
        }
        Ok(())
    })
}

pub fn decode_optional(buf: &[u8]) -> Result<Option<(Status<Option<Bytes>>, usize)>> {
    decode_status(buf, |r| match r.read_u8()? {
        0 => Ok(None),
        1 => Ok(Some(Bytes::copy_from_slice(r.read_byte_list()?))),
        other => Err(invalid(format!("invalid option byte {other:#04x}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_value() {
        let (status, used) = decode_optional(&[0x00, 0x00]).unwrap().unwrap();
        assert_eq!(status, Ok(None));
        assert_eq!(used, 2);
        assert_eq!(&encode_optional(&Ok(None)).unwrap()[..], &[0x00, 0x00]);
    }

    #[test]
    fn test_present_value() {
        let encoded = encode_optional(&Ok(Some(Bytes::from_static(b"hi")))).unwrap();
        assert_eq!(&encoded[..], &[0x00, 0x01, 0x02, b'h', b'i']);
        let (status, used) = decode_optional(&encoded).unwrap().unwrap();
        assert_eq!(status, Ok(Some(Bytes::from_static(b"hi"))));
        assert_eq!(used, 5);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            decode_unit(&[0x01, 0x00]).unwrap().unwrap().0,
            Err(AppError::NotFound)
        );
        assert_eq!(
            decode_bool(&[0x01, 0x01]).unwrap().unwrap().0,
            Err(AppError::AccessDenied)
        );
        let encoded = encode_unit(&Err(AppError::Other("boom".into()))).unwrap();
        assert_eq!(&encoded[..], &[0x01, 0x02, 0x04, b'b', b'o', b'o', b'm']);
        assert_eq!(
            decode_unit(&encoded).unwrap().unwrap(),
            (Err(AppError::Other("boom".into())), 7)
        );
    }

    #[test]
    fn test_incomplete_and_invalid() {
        assert_eq!(decode_unit(&[]).unwrap(), None);
        assert_eq!(decode_optional(&[0x00]).unwrap(), None);
        assert_eq!(decode_optional(&[0x00, 0x01, 0x03, b'a']).unwrap(), None);
        assert_eq!(decode_unit(&[0x01, 0x02, 0x05, b'x']).unwrap(), None);
        assert!(matches!(decode_unit(&[0x02]), Err(WireError::Malformed(_))));
        assert!(matches!(decode_unit(&[0x01, 0x09]), Err(WireError::Malformed(_))));
        assert!(matches!(decode_bool(&[0x00, 0x02]), Err(WireError::Malformed(_))));
    }

    #[test]
    fn test_bool_roundtrip() {
        let encoded = encode_bool(&Ok(true)).unwrap();
        assert_eq!(&encoded[..], &[0x00, 0x01]);
        assert_eq!(decode_bool(&encoded).unwrap().unwrap(), (Ok(true), 2));
    }
}
