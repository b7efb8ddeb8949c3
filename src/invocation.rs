//! Per-invocation channel sets.
//!
//! One [`Invocation`] owns everything a participant needs for a single call:
//! an [`Outgoing`] set of channels it writes (parameters for a caller, results
//! for a callee) and an [`Incoming`] set it reads. Channels are addressed by
//! [`Index`]; the root channel carries the synchronous encoding.
//!
//! The transport is hidden behind [`ChannelSink`] on the writing side and a
//! demultiplexer fed by the transport's read loop on the reading side, so the
//! same readers and writers serve framed streams and NATS subjects.
//!
//! ```text
//!  Outgoing ──index()──► ChannelWriter ──► ChannelSink (writer task / publish)
//!
//!  read loop ──deliver()──► Demux ──take()──► ChannelReader ──► FutureReader
//!                                                           └─► StreamReader
//! ```

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::error::{Result, WireError};
use crate::index::{matches_any, Index, IndexPattern};
use crate::value::{
    decode_values, encode_stream_chunk, encode_value, encode_values, AsyncKind, AsyncPosition,
    Decoded, Delivered, FutureDecoder, StreamDecoder, StreamEvent, Type, Value, STREAM_END,
};

/// Boxed future used at object-safe seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transport side of outgoing channels.
pub trait ChannelSink: Send + Sync + 'static {
    /// Deliver `data` on `index`. Empty data closes the channel.
    fn send(&self, index: &Index, data: Bytes) -> BoxFuture<'_, Result<()>>;

    /// This direction is done. Framed transports signal it by half-closing
    /// once every writer is dropped, so the default does nothing.
    fn finish(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Open,
    Closed,
}

/// Channels written by this participant.
#[derive(Clone)]
pub struct Outgoing {
    sink: Arc<dyn ChannelSink>,
    channels: Arc<Mutex<HashMap<Index, ChannelState>>>,
}

impl Outgoing {
    pub fn new(sink: Arc<dyn ChannelSink>) -> Self {
        Self {
            sink,
            channels: Arc::default(),
        }
    }

    /// Open the channel at `index`. Each index may be opened once.
    pub fn index(&self, index: Index) -> Result<ChannelWriter> {
        let mut channels = lock(&self.channels);
        if channels.contains_key(&index) {
            return Err(WireError::DuplicateChannel(index));
        }
        channels.insert(index.clone(), ChannelState::Open);
        Ok(ChannelWriter {
            index,
            sink: self.sink.clone(),
            channels: self.channels.clone(),
        })
    }

    /// Encode `values` on the root channel.
    ///
    /// Returns the positions left pending, to be fulfilled with
    /// [`write_future`] and [`StreamWriter`].
    pub async fn write_values(&self, types: &[Type], values: &[Value]) -> Result<Vec<AsyncPosition>> {
        let encoded = encode_values(types, values)?;
        let root = self.index(Index::root())?;
        root.write(encoded.bytes).await?;
        Ok(encoded.deferred)
    }

    /// Mark this direction complete.
    pub async fn finish(&self) -> Result<()> {
        {
            let mut channels = lock(&self.channels);
            if channels.get(&Index::root()) == Some(&ChannelState::Closed) {
                return Ok(());
            }
            channels.insert(Index::root(), ChannelState::Closed);
        }
        self.sink.finish().await
    }

    /// Abnormally terminate: close every channel still open, then finish.
    ///
    /// The peer observes closes where values were expected and reports a trap
    /// instead of waiting forever.
    pub async fn trap(&self) -> Result<()> {
        let open: Vec<Index> = {
            let mut channels = lock(&self.channels);
            let open: Vec<Index> = channels
                .iter()
                .filter(|(index, state)| !index.is_root() && **state == ChannelState::Open)
                .map(|(index, _)| index.clone())
                .collect();
            for index in &open {
                channels.insert(index.clone(), ChannelState::Closed);
            }
            open
        };
        tracing::debug!(channels = open.len(), "trapping invocation");
        for index in &open {
            if let Err(e) = self.sink.send(index, Bytes::new()).await {
                tracing::warn!(%index, error = %e, "failed to close channel on trap");
            }
        }
        self.finish().await
    }
}

/// Write side of one outgoing channel.
pub struct ChannelWriter {
    index: Index,
    sink: Arc<dyn ChannelSink>,
    channels: Arc<Mutex<HashMap<Index, ChannelState>>>,
}

impl ChannelWriter {
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Send `data`. Empty data is skipped since it would close the channel.
    pub async fn write(&self, data: Bytes) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if lock(&self.channels).get(&self.index) != Some(&ChannelState::Open) {
            return Err(WireError::ConnectionClosed);
        }
        self.sink.send(&self.index, data).await
    }

    /// Close the channel. Closing the root finishes the whole direction.
    pub async fn close(self) -> Result<()> {
        if self.index.is_root() {
            return Outgoing {
                sink: self.sink,
                channels: self.channels,
            }
            .finish()
            .await;
        }
        let was_open = lock(&self.channels).insert(self.index.clone(), ChannelState::Closed)
            == Some(ChannelState::Open);
        if !was_open {
            return Ok(());
        }
        self.sink.send(&self.index, Bytes::new()).await
    }
}

#[derive(Default)]
struct Slot {
    tx: Option<mpsc::UnboundedSender<Result<Bytes>>>,
    rx: Option<mpsc::UnboundedReceiver<Result<Bytes>>>,
}

impl Slot {
    fn open() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Some(tx),
            rx: Some(rx),
        }
    }
}

#[derive(Default)]
struct DemuxState {
    channels: HashMap<Index, Slot>,
    eof: bool,
    failure: Option<String>,
}

/// Routes received data to per-index queues.
///
/// Delivery never blocks: each channel has an unbounded queue, so a slow
/// reader on one index cannot stall the transport for the others.
pub(crate) struct Demux {
    patterns: Vec<IndexPattern>,
    state: Mutex<DemuxState>,
}

impl Demux {
    pub(crate) fn new(patterns: Vec<IndexPattern>) -> Self {
        Self {
            patterns,
            state: Mutex::default(),
        }
    }

    fn check(&self, index: &Index) -> Result<()> {
        if index.is_root() || matches_any(index, &self.patterns) {
            Ok(())
        } else {
            Err(WireError::UnknownIndex(index.clone()))
        }
    }

    /// Hand received data to the channel at `index`. Empty data closes it.
    pub(crate) fn deliver(&self, index: Index, data: Bytes) -> Result<()> {
        self.check(&index)?;
        let mut state = lock(&self.state);
        let slot = state.channels.entry(index.clone()).or_insert_with(Slot::open);
        if data.is_empty() {
            tracing::trace!(%index, "channel closed by peer");
            slot.tx = None;
            return Ok(());
        }
        match &slot.tx {
            // a dropped reader is not an error for the transport
            Some(tx) => {
                let _ = tx.send(Ok(data));
                Ok(())
            }
            None => Err(WireError::Malformed(format!("data on closed channel {index}"))),
        }
    }

    /// Transport reached a clean end: every channel is closed.
    pub(crate) fn close_all(&self) {
        let mut state = lock(&self.state);
        state.eof = true;
        for slot in state.channels.values_mut() {
            slot.tx = None;
        }
    }

    /// Transport failed: every open channel reports `err`.
    pub(crate) fn fail(&self, err: &WireError) {
        let msg = err.to_string();
        let mut state = lock(&self.state);
        for slot in state.channels.values_mut() {
            if let Some(tx) = slot.tx.take() {
                let _ = tx.send(Err(WireError::Transport(msg.clone())));
            }
        }
        state.eof = true;
        state.failure = Some(msg);
    }

    fn take(&self, index: &Index) -> Result<mpsc::UnboundedReceiver<Result<Bytes>>> {
        self.check(index)?;
        let mut state = lock(&self.state);
        let eof = state.eof;
        let failure = state.failure.clone();
        let slot = state.channels.entry(index.clone()).or_insert_with(|| {
            let mut slot = Slot::open();
            if let Some(tx) = slot.tx.take() {
                if let Some(msg) = failure {
                    let _ = tx.send(Err(WireError::Transport(msg)));
                } else if !eof {
                    slot.tx = Some(tx);
                }
            }
            slot
        });
        slot.rx
            .take()
            .ok_or_else(|| WireError::DuplicateChannel(index.clone()))
    }
}

/// Channels read by this participant.
pub struct Incoming {
    demux: Arc<Demux>,
    timeout: Duration,
    reader: Option<AbortHandle>,
}

impl Incoming {
    pub(crate) fn new(demux: Arc<Demux>, timeout: Duration, reader: Option<AbortHandle>) -> Self {
        Self {
            demux,
            timeout,
            reader,
        }
    }

    /// Take the read side of the channel at `index`. Each index may be taken
    /// once; data that arrived earlier is queued.
    pub fn take(&self, index: Index) -> Result<ChannelReader> {
        let rx = self.demux.take(&index)?;
        Ok(ChannelReader {
            index,
            rx,
            timeout: self.timeout,
        })
    }

    /// Decode the synchronous values from the root channel.
    pub async fn read_values(&self, types: &[Type]) -> Result<Decoded> {
        read_values(&mut self.take(Index::root())?, types).await
    }

    /// Reader for a pending future discovered while decoding.
    pub fn future(&self, position: &AsyncPosition) -> Result<FutureReader> {
        let AsyncKind::Future(ty) = &position.kind else {
            return Err(WireError::TypeMismatch(format!("{} is not a future", position.index)));
        };
        Ok(FutureReader {
            reader: self.take(position.index.clone())?,
            decoder: FutureDecoder::new(position.index.clone(), ty.clone()),
        })
    }

    /// Reader for a pending stream discovered while decoding.
    pub fn stream(&self, position: &AsyncPosition) -> Result<StreamReader> {
        let AsyncKind::Stream(ty) = &position.kind else {
            return Err(WireError::TypeMismatch(format!("{} is not a stream", position.index)));
        };
        Ok(StreamReader {
            reader: self.take(position.index.clone())?,
            decoder: StreamDecoder::new(position.index.clone(), ty.clone()),
            events: VecDeque::new(),
            done: false,
        })
    }
}

impl Drop for Incoming {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Read side of one incoming channel.
pub struct ChannelReader {
    index: Index,
    rx: mpsc::UnboundedReceiver<Result<Bytes>>,
    timeout: Duration,
}

impl ChannelReader {
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Next chunk of data, `None` once the channel is closed.
    ///
    /// Gives up with `Timeout` if nothing arrives within the channel timeout.
    pub async fn recv(&mut self) -> Result<Option<Bytes>> {
        match tokio::time::timeout(self.timeout, self.rx.recv()).await {
            Ok(item) => item.transpose(),
            Err(_) => Err(WireError::Timeout(self.index.clone())),
        }
    }
}

/// Decode `types` from a root channel.
///
/// A close before the values are complete is a trap on the peer's side.
pub async fn read_values(reader: &mut ChannelReader, types: &[Type]) -> Result<Decoded> {
    let mut buf = BytesMut::new();
    loop {
        if let Some((decoded, consumed)) = decode_values(types, &buf)? {
            if consumed != buf.len() {
                return Err(WireError::Malformed(format!(
                    "{} trailing bytes after values on {}",
                    buf.len() - consumed,
                    reader.index
                )));
            }
            return Ok(decoded);
        }
        match reader.recv().await? {
            Some(data) => buf.extend_from_slice(&data),
            None => return Err(WireError::AbnormalClose(reader.index.clone())),
        }
    }
}

/// Receives the value of a pending future.
pub struct FutureReader {
    reader: ChannelReader,
    decoder: FutureDecoder,
}

impl FutureReader {
    pub fn index(&self) -> &Index {
        self.decoder.index()
    }

    pub async fn read(mut self) -> Result<Delivered> {
        loop {
            match self.reader.recv().await? {
                Some(data) => {
                    if let Some(delivered) = self.decoder.push(&data)? {
                        return Ok(delivered);
                    }
                }
                None => {
                    self.decoder.finish()?;
                    return Err(WireError::AbnormalClose(self.decoder.index().clone()));
                }
            }
        }
    }
}

/// Receives the chunks of a pending stream, in order.
pub struct StreamReader {
    reader: ChannelReader,
    decoder: StreamDecoder,
    events: VecDeque<StreamEvent>,
    done: bool,
}

impl StreamReader {
    pub fn index(&self) -> &Index {
        self.decoder.index()
    }

    /// Next chunk and the pending positions nested in it, `None` after the
    /// end of stream.
    pub async fn next_chunk(&mut self) -> Result<Option<(Vec<Value>, Vec<AsyncPosition>)>> {
        loop {
            if self.done {
                return Ok(None);
            }
            match self.events.pop_front() {
                Some(StreamEvent::Chunk { items, deferred }) => return Ok(Some((items, deferred))),
                Some(StreamEvent::End) => {
                    self.done = true;
                    return Ok(None);
                }
                None => {}
            }
            match self.reader.recv().await? {
                Some(data) => self.events.extend(self.decoder.push(&data)?),
                None => {
                    self.decoder.finish()?;
                    self.done = true;
                }
            }
        }
    }

    /// Next chunk of elements, `None` after the end of stream.
    pub async fn next(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.next_chunk().await?.map(|(items, _)| items))
    }

    /// Read to the end and concatenate every chunk.
    pub async fn collect(mut self) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        while let Some(items) = self.next().await? {
            out.extend(items);
        }
        Ok(out)
    }
}

/// Sends the chunks of a pending stream.
pub struct StreamWriter {
    writer: ChannelWriter,
    elem: Type,
    sent: u32,
}

impl StreamWriter {
    pub fn new(outgoing: &Outgoing, position: &AsyncPosition) -> Result<Self> {
        let AsyncKind::Stream(elem) = &position.kind else {
            return Err(WireError::TypeMismatch(format!("{} is not a stream", position.index)));
        };
        Ok(Self {
            writer: outgoing.index(position.index.clone())?,
            elem: elem.clone(),
            sent: 0,
        })
    }

    pub fn index(&self) -> &Index {
        self.writer.index()
    }

    /// Send one chunk. Returns pending positions nested in the elements.
    pub async fn send(&mut self, items: &[Value]) -> Result<Vec<AsyncPosition>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let mut buf = BytesMut::new();
        let mut deferred = Vec::new();
        encode_stream_chunk(&self.elem, items, self.writer.index(), self.sent, &mut buf, &mut deferred)?;
        self.writer.write(buf.freeze()).await?;
        self.sent = self
            .sent
            .checked_add(items.len() as u32)
            .ok_or_else(|| WireError::Malformed("stream element count overflows u32".into()))?;
        Ok(deferred)
    }

    /// Send the terminator and close the channel.
    pub async fn end(self) -> Result<()> {
        self.writer.write(Bytes::from_static(STREAM_END)).await?;
        self.writer.close().await
    }
}

/// Deliver the value of a pending future and close its channel.
pub async fn write_future(
    outgoing: &Outgoing,
    position: &AsyncPosition,
    value: &Value,
) -> Result<Vec<AsyncPosition>> {
    let AsyncKind::Future(ty) = &position.kind else {
        return Err(WireError::TypeMismatch(format!("{} is not a future", position.index)));
    };
    let writer = outgoing.index(position.index.clone())?;
    let mut buf = BytesMut::new();
    let mut deferred = Vec::new();
    encode_value(ty, value, &position.index.child(0)?, &mut buf, &mut deferred)?;
    writer.write(buf.freeze()).await?;
    writer.close().await?;
    Ok(deferred)
}

/// Both directions of one call.
pub struct Invocation {
    pub outgoing: Outgoing,
    pub incoming: Incoming,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::encode_values;

    /// Sink that loops written data straight into a demux.
    struct Loopback(Arc<Demux>);

    impl ChannelSink for Loopback {
        fn send(&self, index: &Index, data: Bytes) -> BoxFuture<'_, Result<()>> {
            let result = self.0.deliver(index.clone(), data);
            Box::pin(async move { result })
        }

        fn finish(&self) -> BoxFuture<'_, Result<()>> {
            self.0.close_all();
            Box::pin(async { Ok(()) })
        }
    }

    fn pair(types: &[Type]) -> (Outgoing, Incoming) {
        let demux = Arc::new(Demux::new(crate::value::async_paths(types)));
        let outgoing = Outgoing::new(Arc::new(Loopback(demux.clone())));
        let incoming = Incoming::new(demux, Duration::from_secs(5), None);
        (outgoing, incoming)
    }

    fn idx(path: &[u32]) -> Index {
        Index::try_from(path).unwrap()
    }

    #[test]
    fn test_duplicate_outgoing_channel() {
        let (outgoing, _incoming) = pair(&[]);
        outgoing.index(idx(&[0])).unwrap();
        assert!(matches!(outgoing.index(idx(&[0])), Err(WireError::DuplicateChannel(_))));
    }

    #[test]
    fn test_duplicate_and_unknown_incoming_channel() {
        let (_outgoing, incoming) = pair(&[Type::Stream(Box::new(Type::U8))]);
        incoming.take(idx(&[0])).unwrap();
        assert!(matches!(incoming.take(idx(&[0])), Err(WireError::DuplicateChannel(_))));
        assert!(matches!(incoming.take(idx(&[1])), Err(WireError::UnknownIndex(_))));
    }

    #[test]
    fn test_unknown_index_rejected_on_delivery() {
        let demux = Demux::new(vec![vec![Some(0), None]]);
        assert!(demux.deliver(idx(&[0, 9]), Bytes::from_static(b"x")).is_ok());
        assert!(matches!(
            demux.deliver(idx(&[1]), Bytes::from_static(b"x")),
            Err(WireError::UnknownIndex(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_roundtrip_with_values() {
        let types = [Type::String, Type::Stream(Box::new(Type::U32))];
        let (outgoing, incoming) = pair(&types);

        let deferred = outgoing
            .write_values(&types, &[Value::String("numbers".into()), Value::Stream(None)])
            .await
            .unwrap();
        let mut writer = StreamWriter::new(&outgoing, &deferred[0]).unwrap();
        writer.send(&[Value::U32(1), Value::U32(2)]).await.unwrap();
        writer.send(&[]).await.unwrap();
        writer.send(&[Value::U32(3)]).await.unwrap();
        writer.end().await.unwrap();

        let decoded = incoming.read_values(&types).await.unwrap();
        assert_eq!(decoded.values[0], Value::String("numbers".into()));
        let reader = incoming.stream(&decoded.deferred[0]).unwrap();
        assert_eq!(
            reader.collect().await.unwrap(),
            vec![Value::U32(1), Value::U32(2), Value::U32(3)]
        );
    }

    #[tokio::test]
    async fn test_future_delivery() {
        let types = [Type::Future(Box::new(Type::String))];
        let (outgoing, incoming) = pair(&types);

        let deferred = outgoing.write_values(&types, &[Value::Future(None)]).await.unwrap();
        write_future(&outgoing, &deferred[0], &Value::String("done".into()))
            .await
            .unwrap();

        let decoded = incoming.read_values(&types).await.unwrap();
        let delivered = incoming.future(&decoded.deferred[0]).unwrap().read().await.unwrap();
        assert_eq!(delivered.value, Value::String("done".into()));
    }

    #[tokio::test]
    async fn test_nested_future_delivery() {
        let types = [Type::Future(Box::new(Type::Future(Box::new(Type::U8))))];
        let (outgoing, incoming) = pair(&types);

        let outer = outgoing.write_values(&types, &[Value::Future(None)]).await.unwrap();
        let inner = write_future(&outgoing, &outer[0], &Value::Future(None)).await.unwrap();
        assert_eq!(inner[0].index, idx(&[0, 0]));
        write_future(&outgoing, &inner[0], &Value::U8(7)).await.unwrap();

        let decoded = incoming.read_values(&types).await.unwrap();
        let delivered = incoming.future(&decoded.deferred[0]).unwrap().read().await.unwrap();
        assert_eq!(delivered.value, Value::Future(None));
        let value = incoming.future(&delivered.deferred[0]).unwrap().read().await.unwrap();
        assert_eq!(value.value, Value::U8(7));
    }

    #[tokio::test]
    async fn test_future_of_stream_delivery() {
        let types = [Type::Future(Box::new(Type::Stream(Box::new(Type::U32))))];
        let (outgoing, incoming) = pair(&types);

        let outer = outgoing.write_values(&types, &[Value::Future(None)]).await.unwrap();
        let inner = write_future(&outgoing, &outer[0], &Value::Stream(None)).await.unwrap();
        let mut writer = StreamWriter::new(&outgoing, &inner[0]).unwrap();
        writer.send(&[Value::U32(4), Value::U32(5)]).await.unwrap();
        writer.end().await.unwrap();

        let decoded = incoming.read_values(&types).await.unwrap();
        let delivered = incoming.future(&decoded.deferred[0]).unwrap().read().await.unwrap();
        let stream = incoming.stream(&delivered.deferred[0]).unwrap();
        assert_eq!(stream.collect().await.unwrap(), vec![Value::U32(4), Value::U32(5)]);
    }

    #[tokio::test]
    async fn test_trap_closes_open_channels() {
        let types = [Type::Stream(Box::new(Type::U8)), Type::Future(Box::new(Type::U8))];
        let (outgoing, incoming) = pair(&types);

        let deferred = outgoing
            .write_values(&types, &[Value::Stream(None), Value::Future(None)])
            .await
            .unwrap();
        let mut writer = StreamWriter::new(&outgoing, &deferred[0]).unwrap();
        writer.send(&[Value::U8(1)]).await.unwrap();
        let _future = outgoing.index(deferred[1].index.clone()).unwrap();
        outgoing.trap().await.unwrap();

        let decoded = incoming.read_values(&types).await.unwrap();
        let mut stream = incoming.stream(&decoded.deferred[0]).unwrap();
        assert_eq!(stream.next().await.unwrap(), Some(vec![Value::U8(1)]));
        assert!(matches!(stream.next().await, Err(WireError::AbnormalClose(_))));
        let future = incoming.future(&decoded.deferred[1]).unwrap();
        assert!(matches!(future.read().await, Err(WireError::AbnormalClose(_))));
    }

    #[tokio::test]
    async fn test_root_close_before_values_is_abnormal() {
        let types = [Type::U32];
        let (outgoing, incoming) = pair(&types);
        outgoing.finish().await.unwrap();
        assert!(matches!(
            incoming.read_values(&types).await,
            Err(WireError::AbnormalClose(index)) if index.is_root()
        ));
    }

    #[tokio::test]
    async fn test_values_split_across_chunks() {
        let types = [Type::String];
        let (_outgoing, incoming) = pair(&types);
        let encoded = encode_values(&types, &[Value::String("split me".into())]).unwrap();
        incoming
            .demux
            .deliver(Index::root(), encoded.bytes.slice(..3))
            .unwrap();
        incoming
            .demux
            .deliver(Index::root(), encoded.bytes.slice(3..))
            .unwrap();
        let decoded = incoming.read_values(&types).await.unwrap();
        assert_eq!(decoded.values, vec![Value::String("split me".into())]);
    }

    #[tokio::test]
    async fn test_transport_failure_reaches_readers() {
        let types = [Type::Stream(Box::new(Type::U8))];
        let (_outgoing, incoming) = pair(&types);
        let mut early = incoming.take(idx(&[0])).unwrap();
        incoming.demux.fail(&WireError::ConnectionClosed);
        assert!(matches!(early.recv().await, Err(WireError::Transport(_))));
        let mut late = incoming.take(Index::root()).unwrap();
        assert!(matches!(late.recv().await, Err(WireError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reader_timeout() {
        let demux = Arc::new(Demux::new(Vec::new()));
        let incoming = Incoming::new(demux, Duration::from_millis(50), None);
        let mut root = incoming.take(Index::root()).unwrap();
        assert!(matches!(root.recv().await, Err(WireError::Timeout(_))));
    }
}
