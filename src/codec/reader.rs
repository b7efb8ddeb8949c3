//! Cursor over a partially received buffer.
//!
//! Every read either succeeds, reports `Incomplete` (more bytes needed, the
//! caller retries once more data has arrived) or reports a protocol error.

use std::fmt::Display;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use super::leb128::{read_signed, read_unsigned};
use crate::error::{Result, WireError};

#[derive(Debug)]
pub(crate) enum ReadError {
    /// The buffer ends inside the record.
    Incomplete,
    /// The bytes present are invalid.
    Invalid(WireError),
}

impl From<WireError> for ReadError {
    fn from(err: WireError) -> Self {
        ReadError::Invalid(err)
    }
}

pub(crate) type ReadResult<T> = std::result::Result<T, ReadError>;

/// Map `Incomplete` to `Ok(None)`.
pub(crate) fn complete<T>(r: ReadResult<T>) -> Result<Option<T>> {
    match r {
        Ok(v) => Ok(Some(v)),
        Err(ReadError::Incomplete) => Ok(None),
        Err(ReadError::Invalid(err)) => Err(err),
    }
}

/// Run `decoder` over at most `limit` bytes at the front of `buf`.
///
/// `limit` is the longest legal encoding: a decoder still asking for more
/// once it has that many bytes is looking at garbage.
pub(crate) fn decode_prefix<D>(mut decoder: D, buf: &[u8], limit: usize) -> ReadResult<(D::Item, usize)>
where
    D: Decoder,
    D::Error: Display,
{
    let window = &buf[..buf.len().min(limit)];
    let mut src = BytesMut::from(window);
    match decoder.decode(&mut src) {
        Ok(Some(v)) => Ok((v, window.len() - src.len())),
        Ok(None) if window.len() < limit => Err(ReadError::Incomplete),
        Ok(None) => Err(ReadError::Invalid(WireError::Malformed(format!(
            "encoding longer than {limit} bytes"
        )))),
        Err(err) => Err(ReadError::Invalid(WireError::Malformed(err.to_string()))),
    }
}

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn peek(&self) -> Option<&u8> {
        self.buf.get(self.pos)
    }

    pub(crate) fn read_u8(&mut self) -> ReadResult<u8> {
        let b = *self.buf.get(self.pos).ok_or(ReadError::Incomplete)?;
        self.pos += 1;
        Ok(b)
    }

    pub(crate) fn read_bytes(&mut self, n: usize) -> ReadResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(ReadError::Incomplete);
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub(crate) fn read_unsigned(&mut self, bits: u32) -> ReadResult<u64> {
        let (v, n) = read_unsigned(&self.buf[self.pos..], bits)?;
        self.pos += n;
        Ok(v)
    }

    pub(crate) fn read_signed(&mut self, bits: u32) -> ReadResult<i64> {
        let (v, n) = read_signed(&self.buf[self.pos..], bits)?;
        self.pos += n;
        Ok(v)
    }

    /// Decode one item of at most `limit` bytes with `decoder`.
    pub(crate) fn decode<D>(&mut self, decoder: D, limit: usize) -> ReadResult<D::Item>
    where
        D: Decoder,
        D::Error: Display,
    {
        let (v, n) = decode_prefix(decoder, &self.buf[self.pos..], limit)?;
        self.pos += n;
        Ok(v)
    }

    #[inline]
    pub(crate) fn read_u32(&mut self) -> ReadResult<u32> {
        self.read_unsigned(32).map(|v| v as u32)
    }

    /// Length prefix, checked against what a well-formed record could carry.
    pub(crate) fn read_len(&mut self) -> ReadResult<usize> {
        let n = self.read_u32()?;
        usize::try_from(n)
            .map_err(|_| ReadError::Invalid(WireError::Malformed("length exceeds usize".into())))
    }

    pub(crate) fn read_byte_list(&mut self) -> ReadResult<&'a [u8]> {
        let n = self.read_len()?;
        self.read_bytes(n)
    }

    pub(crate) fn read_string(&mut self) -> ReadResult<&'a str> {
        let bytes = self.read_byte_list()?;
        std::str::from_utf8(bytes)
            .map_err(|err| ReadError::Invalid(WireError::Malformed(format!("invalid UTF-8: {err}"))))
    }

    /// A `list<u32>` of at most `max` elements.
    ///
    /// The count is checked before waiting for the elements, so an oversized
    /// list is rejected as soon as its prefix arrives.
    pub(crate) fn read_u32_list(&mut self, max: usize) -> ReadResult<Vec<u32>> {
        let n = self.read_len()?;
        if n > max {
            return Err(ReadError::Invalid(WireError::IndexTooDeep { depth: n, max }));
        }
        // every element takes at least one byte
        if self.remaining() < n {
            return Err(ReadError::Incomplete);
        }
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.read_u32()?);
        }
        Ok(out)
    }
}
