//! Decoders for data delivered after the synchronous encoding.
//!
//! These are pure state machines: bytes go in as they arrive on a channel,
//! values come out once complete. The async readers in
//! [`invocation`](crate::invocation) drive them from a channel.

use bytes::{BufMut, BytesMut};

use super::decode::{decode_list, decode_one};
use super::encode::encode_list;
use super::{AsyncPosition, Type, Value};
use crate::codec::{complete, Reader};
use crate::error::{Result, WireError};
use crate::index::Index;

/// The empty `list<T>` chunk terminating a stream.
pub const STREAM_END: &[u8] = &[0x00];

/// A future's value once fully received.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub value: Value,
    /// Positions nested in `value` that are themselves pending.
    pub deferred: Vec<AsyncPosition>,
}

/// Encode one asynchronous stream chunk.
///
/// `first` is the number of elements already sent on this stream, so element
/// indices keep counting across chunks. An empty `items` would encode the
/// terminator, use [`STREAM_END`] for that.
pub fn encode_stream_chunk(
    elem: &Type,
    items: &[Value],
    index: &Index,
    first: u32,
    dst: &mut BytesMut,
    deferred: &mut Vec<AsyncPosition>,
) -> Result<()> {
    if items.is_empty() {
        return Err(WireError::TypeMismatch(
            "empty stream chunk is reserved for end of stream".into(),
        ));
    }
    encode_list(elem, items, index, first, dst, deferred)
}

/// Accumulates the single `T` delivered for a pending `future<T>`.
#[derive(Debug)]
pub struct FutureDecoder {
    index: Index,
    ty: Type,
    buf: BytesMut,
    done: bool,
}

impl FutureDecoder {
    pub fn new(index: Index, ty: Type) -> Self {
        Self {
            index,
            ty,
            buf: BytesMut::new(),
            done: false,
        }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Feed received bytes. Returns the value once complete.
    ///
    /// Data beyond the value, or any data after delivery, is rejected.
    pub fn push(&mut self, data: &[u8]) -> Result<Option<Delivered>> {
        if self.done {
            return Err(WireError::Malformed(format!(
                "data after future value on {}",
                self.index
            )));
        }
        self.buf.put_slice(data);
        let payload = self.index.child(0)?;
        let Some((value, deferred, consumed)) = decode_one(&self.ty, &self.buf, &payload)? else {
            return Ok(None);
        };
        if consumed != self.buf.len() {
            return Err(WireError::Malformed(format!(
                "{} trailing bytes after future value on {}",
                self.buf.len() - consumed,
                self.index
            )));
        }
        self.done = true;
        self.buf.clear();
        Ok(Some(Delivered { value, deferred }))
    }

    /// The channel closed.
    pub fn finish(&self) -> Result<()> {
        if self.done {
            Ok(())
        } else {
            Err(WireError::AbnormalClose(self.index.clone()))
        }
    }
}

/// One decoded step of an asynchronous stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Chunk {
        items: Vec<Value>,
        deferred: Vec<AsyncPosition>,
    },
    End,
}

/// Splits a stream channel's bytes into chunks and the terminator.
#[derive(Debug)]
pub struct StreamDecoder {
    index: Index,
    elem: Type,
    buf: BytesMut,
    /// Elements decoded so far, the index of the next one.
    next: u32,
    ended: bool,
}

impl StreamDecoder {
    pub fn new(index: Index, elem: Type) -> Self {
        Self {
            index,
            elem,
            buf: BytesMut::new(),
            next: 0,
            ended: false,
        }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Feed received bytes and return every complete event, in order.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<StreamEvent>> {
        if self.ended && !data.is_empty() {
            return Err(WireError::ChunkAfterEnd(self.index.clone()));
        }
        self.buf.put_slice(data);

        let mut events = Vec::new();
        while !self.buf.is_empty() {
            if self.ended {
                return Err(WireError::ChunkAfterEnd(self.index.clone()));
            }
            let mut r = Reader::new(&self.buf);
            let mut deferred = Vec::new();
            let Some(items) = complete(decode_list(&self.elem, &mut r, &self.index, self.next, &mut deferred))?
            else {
                break;
            };
            let consumed = r.position();
            let _ = self.buf.split_to(consumed);
            if items.is_empty() {
                self.ended = true;
                events.push(StreamEvent::End);
            } else {
                self.next = self
                    .next
                    .checked_add(items.len() as u32)
                    .ok_or_else(|| WireError::Malformed("stream element count overflows u32".into()))?;
                events.push(StreamEvent::Chunk { items, deferred });
            }
        }
        Ok(events)
    }

    /// The channel closed. Anything short of a complete terminated stream is
    /// abnormal.
    pub fn finish(&self) -> Result<()> {
        if !self.buf.is_empty() {
            return Err(WireError::UnexpectedEof("stream chunk"));
        }
        if !self.ended {
            return Err(WireError::AbnormalClose(self.index.clone()));
        }
        Ok(())
    }
}
