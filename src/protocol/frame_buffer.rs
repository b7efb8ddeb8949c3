//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented input:
//! - `WaitingForVersion`: need the leading version byte
//! - `WaitingForHeader`: need a complete `{instance, name}` record
//! - `WaitingForFrame`: need a complete path and data length
//! - `WaitingForData`: path parsed, need N more data bytes
//!
//! A buffer created with [`FrameBuffer::new`] starts in `WaitingForFrame` and
//! decodes the reply direction. [`FrameBuffer::with_header`] decodes the
//! caller's direction, preamble first.
//!
//! # Example
//!
//! ```
//! use wrpc_wire::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::with_header();
//!
//! // Data arrives in chunks from the socket
//! assert!(buffer.push(&[0x00, 0x04, b'd', b'e']).unwrap().is_empty());
//! assert!(buffer.header().is_none());
//! buffer.push(&[b'm', b'o', 0x04, b'p', b'i', b'n', b'g']).unwrap();
//!
//! let header = buffer.header().unwrap();
//! assert_eq!(header.instance, "demo");
//! assert_eq!(header.name, "ping");
//! buffer.finish().unwrap();
//! ```

use bytes::{Buf, BytesMut};

use super::wire_format::{validate_version, Header, DEFAULT_MAX_FRAME_SIZE};
use super::Frame;
use crate::codec::{complete, Reader};
use crate::error::{Result, WireError};
use crate::index::{Index, MAX_INDEX_DEPTH};

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    WaitingForVersion,
    WaitingForHeader,
    WaitingForFrame,
    WaitingForData { path: Index, remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    header: Option<Header>,
    /// Maximum allowed frame data size.
    max_frame_size: u32,
}

impl FrameBuffer {
    /// Buffer for the reply direction: frames only.
    pub fn new() -> Self {
        Self::starting_in(State::WaitingForFrame)
    }

    /// Buffer for the invocation direction: version byte, header, frames.
    pub fn with_header() -> Self {
        Self::starting_in(State::WaitingForVersion)
    }

    fn starting_in(state: State) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state,
            header: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Set the maximum accepted frame data size.
    pub fn max_frame_size(mut self, max: u32) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is buffered internally for the next push. The header, once
    /// complete, is available from [`header`](Self::header).
    ///
    /// # Errors
    ///
    /// Unsupported version, malformed records, over-deep paths and frames
    /// exceeding the maximum size.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Try to make progress on a single record.
    ///
    /// Returns `Ok(Some(frame))` if a frame completed, `Ok(None)` if more data
    /// is needed. A completed header moves the state on and keeps going.
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        loop {
            match &self.state {
                State::WaitingForVersion => {
                    let Some(&version) = self.buffer.first() else {
                        return Ok(None);
                    };
                    validate_version(version)?;
                    self.buffer.advance(1);
                    self.state = State::WaitingForHeader;
                }

                State::WaitingForHeader => {
                    let Some((header, consumed)) = Header::decode(&self.buffer)? else {
                        return Ok(None);
                    };
                    self.buffer.advance(consumed);
                    tracing::trace!(instance = %header.instance, name = %header.name, "header decoded");
                    self.header = Some(header);
                    self.state = State::WaitingForFrame;
                }

                State::WaitingForFrame => {
                    let mut r = Reader::new(&self.buffer);
                    let Some((path, len)) = complete(r.read_u32_list(MAX_INDEX_DEPTH).and_then(|path| {
                        let len = r.read_u32()?;
                        Ok((path, len))
                    }))?
                    else {
                        return Ok(None);
                    };
                    let consumed = r.position();

                    if len > self.max_frame_size {
                        return Err(WireError::FrameTooLarge {
                            size: len.into(),
                            max: self.max_frame_size,
                        });
                    }
                    let path = Index::new(path)?;
                    self.buffer.advance(consumed);

                    self.state = State::WaitingForData {
                        path,
                        remaining: len as usize,
                    };
                }

                State::WaitingForData { path, remaining } => {
                    let remaining = *remaining;
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    // Extract data (zero-copy freeze)
                    let data = self.buffer.split_to(remaining).freeze();
                    let path = path.clone();

                    self.state = State::WaitingForFrame;
                    return Ok(Some(Frame::new(path, data)));
                }
            }
        }
    }

    /// The decoded header, once available.
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    pub fn take_header(&mut self) -> Option<Header> {
        self.header.take()
    }

    /// Signal transport end-of-stream.
    ///
    /// Fails with `UnexpectedEof` when the stream ended inside a record.
    pub fn finish(&self) -> Result<()> {
        match &self.state {
            State::WaitingForVersion | State::WaitingForHeader => {
                Err(WireError::UnexpectedEof("header"))
            }
            State::WaitingForFrame if self.buffer.is_empty() => Ok(()),
            State::WaitingForFrame | State::WaitingForData { .. } => {
                Err(WireError::UnexpectedEof("frame"))
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForVersion => "WaitingForVersion",
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForFrame => "WaitingForFrame",
            State::WaitingForData { .. } => "WaitingForData",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, encode_preamble};

    fn idx(path: &[u32]) -> Index {
        Index::try_from(path).unwrap()
    }

    fn stream_bytes(frames: &[(Vec<u32>, &[u8])]) -> Vec<u8> {
        let mut bytes = encode_preamble(&Header::new("demo", "echo")).unwrap().to_vec();
        for (path, data) in frames {
            bytes.extend(build_frame(&idx(path), data).unwrap());
        }
        bytes
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&build_frame(&idx(&[0]), b"hello").unwrap()).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].path, idx(&[0]));
        assert_eq!(&frames[0].data[..], b"hello");
        assert!(buffer.is_empty());
        buffer.finish().unwrap();
    }

    #[test]
    fn test_header_then_frames_in_one_push() {
        let bytes = stream_bytes(&[(vec![], b"\x01"), (vec![1], b"ab"), (vec![1], b"")]);
        let mut buffer = FrameBuffer::with_header();
        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(buffer.header(), Some(&Header::new("demo", "echo")));
        assert_eq!(frames.len(), 3);
        assert!(frames[0].path.is_root());
        assert!(frames[2].is_close());
    }

    #[test]
    fn test_fragmented_data() {
        let mut buffer = FrameBuffer::new();
        let bytes = build_frame(&idx(&[2, 3]), b"0123456789").unwrap();

        assert!(buffer.push(&bytes[..2]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForFrame");
        assert!(buffer.push(&bytes[2..6]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForData");

        let frames = buffer.push(&bytes[6..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].data[..], b"0123456789");
    }

    #[test]
    fn test_every_split_point() {
        let bytes = stream_bytes(&[(vec![0], b"first"), (vec![0, 4], b""), (vec![], b"root")]);
        let mut whole = FrameBuffer::with_header();
        let expected = whole.push(&bytes).unwrap();

        for split in 0..=bytes.len() {
            let mut buffer = FrameBuffer::with_header();
            let mut frames = buffer.push(&bytes[..split]).unwrap();
            frames.extend(buffer.push(&bytes[split..]).unwrap());
            assert_eq!(frames, expected, "split at {split}");
            assert_eq!(buffer.header(), whole.header());
            buffer.finish().unwrap();
        }
    }

    #[test]
    fn test_unsupported_version() {
        let mut buffer = FrameBuffer::with_header();
        let result = buffer.push(&[0x01, 0x00, 0x00]);
        assert!(matches!(result, Err(WireError::UnsupportedVersion(0x01))));
    }

    #[test]
    fn test_eof_before_header() {
        let buffer = FrameBuffer::with_header();
        assert!(matches!(buffer.finish(), Err(WireError::UnexpectedEof("header"))));

        let mut buffer = FrameBuffer::with_header();
        buffer.push(&[0x00, 0x04, b'd']).unwrap();
        assert_eq!(buffer.state_name(), "WaitingForHeader");
        assert!(matches!(buffer.finish(), Err(WireError::UnexpectedEof("header"))));
    }

    #[test]
    fn test_eof_inside_frame() {
        let mut buffer = FrameBuffer::new();
        buffer.push(&[0x01, 0x00, 0x05, b'a']).unwrap();
        assert!(matches!(buffer.finish(), Err(WireError::UnexpectedEof("frame"))));
    }

    #[test]
    fn test_frame_too_large() {
        let mut buffer = FrameBuffer::new().max_frame_size(4);
        let result = buffer.push(&build_frame(&idx(&[0]), b"hello").unwrap());
        assert!(matches!(result, Err(WireError::FrameTooLarge { size: 5, max: 4 })));
    }

    #[test]
    fn test_path_too_deep() {
        let mut bytes = vec![33];
        bytes.extend(std::iter::repeat(0).take(33));
        bytes.push(0);
        let mut buffer = FrameBuffer::new();
        assert!(matches!(buffer.push(&bytes), Err(WireError::IndexTooDeep { .. })));
    }

    #[test]
    fn test_huge_path_count_rejected_without_buffering() {
        let mut bytes = vec![0x80, 0x89, 0x7a];
        bytes.extend(std::iter::repeat(0).take(64 * 1024));
        let mut buffer = FrameBuffer::new();
        assert!(matches!(
            buffer.push(&bytes[..3]),
            Err(WireError::IndexTooDeep { depth: 2_000_000, .. })
        ));

        let mut buffer = FrameBuffer::new();
        assert!(matches!(buffer.push(&bytes), Err(WireError::IndexTooDeep { .. })));
    }
}
