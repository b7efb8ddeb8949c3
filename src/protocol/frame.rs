//! Frame struct and encoders.
//!
//! A frame is one chunk of data for the channel named by its path:
//! ```text
//! ┌───────────────────────────┬───────────────────────────┐
//! │ path: list<u32>           │ data: list<u8>            │
//! │ LEB128 count + elements   │ LEB128 length + bytes     │
//! └───────────────────────────┴───────────────────────────┘
//! ```
//! Empty data closes the channel.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use wrpc_wire::protocol::{build_frame, FrameBuffer};
//! use wrpc_wire::Index;
//!
//! let index = Index::try_from([0, 1]).unwrap();
//! let bytes = build_frame(&index, b"hello").unwrap();
//! assert_eq!(&bytes[..4], &[0x02, 0x00, 0x01, 0x05]);
//!
//! let mut buffer = FrameBuffer::new();
//! let frames = buffer.push(&bytes).unwrap();
//! assert_eq!(frames[0].path, index);
//! assert_eq!(frames[0].data, Bytes::from_static(b"hello"));
//! ```

use bytes::{Bytes, BytesMut};

use crate::codec::{leb128, put_u32_list, wire_len};
use crate::error::Result;
use crate::index::Index;

/// An owned frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Channel the data belongs to.
    pub path: Index,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub data: Bytes,
}

impl Frame {
    pub fn new(path: Index, data: Bytes) -> Self {
        Self { path, data }
    }

    /// A frame closing `path`.
    pub fn close(path: Index) -> Self {
        Self {
            path,
            data: Bytes::new(),
        }
    }

    #[inline]
    pub fn is_close(&self) -> bool {
        self.data.is_empty()
    }
}

/// A borrowed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef<'a> {
    pub path: &'a [u32],
    pub data: &'a [u8],
}

impl<'a> From<&'a Frame> for FrameRef<'a> {
    fn from(Frame { path, data }: &'a Frame) -> Self {
        Self {
            path: path.as_slice(),
            data: data.as_ref(),
        }
    }
}

/// Build a complete frame as a single byte vector.
pub fn build_frame(path: &Index, data: &[u8]) -> Result<Vec<u8>> {
    let (prefix, data) = build_frame_parts(path, data)?;
    let mut buf = Vec::with_capacity(prefix.len() + data.len());
    buf.extend_from_slice(&prefix);
    buf.extend_from_slice(data);
    Ok(buf)
}

/// Build frame parts for scatter/gather I/O.
///
/// Returns the encoded path and data length, and a reference to the data.
pub fn build_frame_parts<'a>(path: &Index, data: &'a [u8]) -> Result<(Bytes, &'a [u8])> {
    let mut prefix = BytesMut::with_capacity(1 + path.depth() * leb128::MAX_U32_LEN + leb128::MAX_U32_LEN);
    put_u32_list(&mut prefix, path.as_slice())?;
    leb128::put_u32(&mut prefix, wire_len(data.len())?)?;
    Ok((prefix.freeze(), data))
}

impl FrameRef<'_> {
    /// Encode this frame.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::new();
        put_u32_list(&mut buf, self.path)?;
        leb128::put_u32(&mut buf, wire_len(self.data.len())?)?;
        buf.extend_from_slice(self.data);
        Ok(buf.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameBuffer;

    #[test]
    fn test_root_frame_layout() {
        let bytes = build_frame(&Index::root(), &[0xaa]).unwrap();
        assert_eq!(bytes, vec![0x00, 0x01, 0xaa]);
    }

    #[test]
    fn test_close_frame() {
        let frame = Frame::close(Index::try_from([3]).unwrap());
        assert!(frame.is_close());
        assert_eq!(build_frame(&frame.path, &frame.data).unwrap(), vec![0x01, 0x03, 0x00]);
    }

    #[test]
    fn test_build_frame_parts() {
        let path = Index::try_from([200]).unwrap();
        let (prefix, data) = build_frame_parts(&path, b"abc").unwrap();
        assert_eq!(&prefix[..], &[0x01, 0xc8, 0x01, 0x03]);
        assert_eq!(data, b"abc");
    }

    #[test]
    fn test_frame_ref_matches_build_frame() {
        let frame = Frame::new(Index::try_from([1, 2]).unwrap(), Bytes::from_static(b"xy"));
        let via_ref = FrameRef::from(&frame).encode().unwrap();
        assert_eq!(via_ref, build_frame(&frame.path, &frame.data).unwrap());
    }

    #[test]
    fn test_build_frame_roundtrip() {
        let path = Index::try_from([4, 0, 7]).unwrap();
        let bytes = build_frame(&path, b"0123456789").unwrap();

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].path, path);
        assert_eq!(&frames[0].data[..], b"0123456789");
    }
}
