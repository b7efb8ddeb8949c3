//! Framed stream preamble.
//!
//! A framed stream from caller to callee starts with:
//! ```text
//! ┌─────────┬──────────────────────┬──────────────────┐
//! │ Version │ Instance             │ Name             │
//! │ 1 byte  │ string (LEB128 len)  │ string           │
//! │ 0x00    │                      │                  │
//! └─────────┴──────────────────────┴──────────────────┘
//! ```
//! followed by zero or more frames. The reply direction carries frames only.

use bytes::{BufMut, BytesMut};

use crate::codec::{complete, put_string, ReadResult, Reader};
use crate::error::{Result, WireError};

/// The only framing revision understood.
pub const PROTOCOL_VERSION: u8 = 0x00;

/// Default maximum frame data size (1 GB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 1_073_741_824;

/// Identifies the function a framed stream invokes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    pub instance: String,
    pub name: String,
}

impl Header {
    pub fn new(instance: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            name: name.into(),
        }
    }

    /// Encode the header record (without version byte).
    ///
    /// # Example
    ///
    /// ```
    /// use wrpc_wire::protocol::Header;
    ///
    /// let bytes = Header::new("demo", "ping").encode().unwrap();
    /// assert_eq!(&bytes[..], &[0x04, b'd', b'e', b'm', b'o', 0x04, b'p', b'i', b'n', b'g']);
    /// ```
    pub fn encode(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(self.instance.len() + self.name.len() + 2);
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        put_string(dst, &self.instance)?;
        put_string(dst, &self.name)
    }

    /// Decode a header record from the front of `buf`.
    ///
    /// Returns `Ok(None)` if the buffer does not hold a complete record yet,
    /// otherwise the header and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<Option<(Self, usize)>> {
        let mut r = Reader::new(buf);
        let header = complete(Self::read(&mut r))?;
        Ok(header.map(|h| (h, r.position())))
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> ReadResult<Self> {
        let instance = r.read_string()?.to_owned();
        let name = r.read_string()?.to_owned();
        Ok(Self { instance, name })
    }
}

/// Version byte followed by the header, as written first by a caller.
pub fn encode_preamble(header: &Header) -> Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(1 + header.instance.len() + header.name.len() + 2);
    buf.put_u8(PROTOCOL_VERSION);
    header.encode_into(&mut buf)?;
    Ok(buf)
}

/// Check the leading version byte.
#[inline]
pub fn validate_version(version: u8) -> Result<()> {
    if version != PROTOCOL_VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    Ok(())
}
