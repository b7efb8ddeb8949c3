//! Dedicated writer task for framed transports.
//!
//! Every channel of an invocation writes through a cloneable [`WriterHandle`]
//! that feeds one task owning the write half of the byte stream. The task
//! batches queued frames into single `write_vectored` calls and half-closes
//! the stream once every handle has been dropped, which is how a framed
//! participant signals that it is done writing.
//!
//! # Architecture
//!
//! ```text
//! Channel [0]   ─┐
//! Channel [1,0] ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► socket
//! Root []       ─┘                                       └─ shutdown() on close
//! ```

use std::io::IoSlice;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::config::duration_ms;
use crate::error::{Result, WireError};
use crate::index::Index;
use crate::invocation::{BoxFuture, ChannelSink};
use crate::protocol::build_frame_parts;

/// Default maximum pending frames before backpressure kicks in.
pub const DEFAULT_MAX_PENDING_FRAMES: usize = 1024;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default backpressure timeout.
pub const DEFAULT_BACKPRESSURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// Bytes ready to be written to the stream.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Encoded path and data length, or a whole preamble.
    pub prefix: Bytes,
    /// Frame data (can be empty for a close).
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Frame carrying `data` on `path`.
    pub fn new(path: &Index, data: Bytes) -> Result<Self> {
        let (prefix, _) = build_frame_parts(path, &data)?;
        Ok(Self {
            prefix,
            payload: data,
        })
    }

    /// Frame closing `path`.
    pub fn close(path: &Index) -> Result<Self> {
        Self::new(path, Bytes::new())
    }

    /// Pre-encoded bytes written as-is (version byte and header).
    pub fn raw(bytes: Bytes) -> Self {
        Self {
            prefix: bytes,
            payload: Bytes::new(),
        }
    }

    /// Total size of this frame (prefix + payload).
    #[inline]
    pub fn size(&self) -> usize {
        self.prefix.len() + self.payload.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Maximum pending frames before backpressure kicks in.
    pub max_pending_frames: usize,
    /// Channel capacity for frame queue.
    pub channel_capacity: usize,
    /// Timeout when waiting for backpressure to clear.
    #[serde(with = "duration_ms", rename = "backpressure_timeout_ms")]
    pub backpressure_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            backpressure_timeout: DEFAULT_BACKPRESSURE_TIMEOUT,
        }
    }
}

/// A frame in the queue, holding one unit of the pending budget until it
/// has been written.
struct Queued {
    frame: OutboundFrame,
    _credit: OwnedSemaphorePermit,
}

/// Handle for sending frames to the writer task.
///
/// This is cheaply cloneable and shared by all outgoing channels of one
/// invocation. The stream is half-closed when the last clone is dropped.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Queued>,
    /// One permit per frame that may be queued or in flight.
    credits: Arc<Semaphore>,
    max_pending: usize,
    timeout: Duration,
}

impl WriterHandle {
    fn new(tx: mpsc::Sender<Queued>, max_pending: usize, timeout: Duration) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            tx,
            credits: Arc::new(Semaphore::new(max_pending)),
            max_pending,
            timeout,
        }
    }

    /// Queue a frame for writing.
    ///
    /// Waits while `max_pending_frames` frames are unwritten, giving up with
    /// `BackpressureTimeout` after the configured duration.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        let credit = match tokio::time::timeout(self.timeout, self.credits.clone().acquire_owned()).await {
            Ok(Ok(credit)) => credit,
            Ok(Err(_)) => return Err(WireError::ConnectionClosed),
            Err(_) => {
                tracing::debug!(pending = self.pending_count(), "backpressure did not clear");
                return Err(WireError::BackpressureTimeout);
            }
        };
        self.tx
            .send(Queued {
                frame,
                _credit: credit,
            })
            .await
            .map_err(|_| WireError::ConnectionClosed)
    }

    /// Queue a frame only if the pending budget allows it right now.
    pub fn try_send(&self, frame: OutboundFrame) -> Result<()> {
        let credit = self
            .credits
            .clone()
            .try_acquire_owned()
            .map_err(|_| WireError::BackpressureTimeout)?;
        self.tx
            .try_send(Queued {
                frame,
                _credit: credit,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => WireError::BackpressureTimeout,
                mpsc::error::TrySendError::Closed(_) => WireError::ConnectionClosed,
            })
    }

    /// Whether the next [`send`](Self::send) would have to wait.
    #[inline]
    pub fn is_backpressure_active(&self) -> bool {
        self.credits.available_permits() == 0
    }

    /// Frames queued or being written.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.max_pending - self.credits.available_permits()
    }
}

impl ChannelSink for WriterHandle {
    fn send(&self, index: &Index, data: Bytes) -> BoxFuture<'_, Result<()>> {
        let frame = OutboundFrame::new(index, data);
        Box::pin(async move { WriterHandle::send(self, frame?).await })
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The returned `JoinHandle` resolves once the queue is closed and the
/// stream has been shut down, or on the first write error.
pub fn spawn_writer_task<W>(
    writer: W,
    config: &WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let handle = WriterHandle::new(tx, config.max_pending_frames, config.backpressure_timeout);

    let task = tokio::spawn(async move {
        let result = drain_queue(rx, writer).await;
        if let Err(ref e) = result {
            tracing::warn!(error = %e, "writer task failed");
        }
        result
    });

    (handle, task)
}

/// Write queued frames in batches until every handle is gone, then
/// half-close the stream.
async fn drain_queue<W>(mut rx: mpsc::Receiver<Queued>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
    while let Some(first) = rx.recv().await {
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            let Ok(next) = rx.try_recv() else { break };
            batch.push(next);
        }

        let frames: Vec<&OutboundFrame> = batch.iter().map(|q| &q.frame).collect();
        write_batch(&mut writer, &frames).await?;
        tracing::trace!(frames = batch.len(), "batch written");
        // releases the credits
        batch.clear();
    }

    tracing::trace!("all writers dropped, shutting down write half");
    writer.shutdown().await?;
    Ok(())
}

/// Write a batch of frames with scatter/gather I/O.
async fn write_batch<W>(writer: &mut W, batch: &[&OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(|f| f.size()).sum();
    let mut written = 0;

    while written < total_size {
        let slices = remaining_slices(batch, written);
        let n = writer.write_vectored(&slices).await?;
        if n == 0 {
            return Err(WireError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "stream accepted no bytes",
            )));
        }
        written += n;
    }

    writer.flush().await?;
    Ok(())
}

/// Slices covering everything in `batch` after the first `skip` bytes.
fn remaining_slices<'a>(batch: &[&'a OutboundFrame], skip: usize) -> Vec<IoSlice<'a>> {
    batch
        .iter()
        .copied()
        .flat_map(|frame| [&frame.prefix, &frame.payload])
        .scan(0usize, |offset, part| {
            let start = *offset;
            *offset += part.len();
            Some((start, part))
        })
        .filter(|(start, part)| !part.is_empty() && skip < start + part.len())
        .map(|(start, part)| IoSlice::new(&part[skip.saturating_sub(start)..]))
        .collect()
}
