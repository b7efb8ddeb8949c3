//! Framed binding over one bidirectional byte stream per invocation.
//!
//! The caller writes the version byte, the header and then frames; the callee
//! answers with frames only. Each side half-closes its write direction once
//! every outgoing channel is done. Used for TCP, Unix sockets, a single QUIC
//! bidirectional stream and in-memory pipes alike.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use wrpc_wire::config::Config;
//! use wrpc_wire::transport::framed;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> wrpc_wire::Result<()> {
//! let (client, server) = tokio::io::duplex(1024);
//! let (client_rx, client_tx) = tokio::io::split(client);
//! let (server_rx, server_tx) = tokio::io::split(server);
//! let config = Config::default();
//!
//! let invocation =
//!     framed::invoke(client_rx, client_tx, "demo", "ping", Bytes::new(), Vec::new(), &config).await?;
//! drop(invocation.outgoing);
//!
//! let accepted = framed::accept(server_rx, server_tx, &config).await?;
//! assert_eq!(accepted.header().name, "ping");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::config::Config;
use crate::error::Result;
use crate::index::{Index, IndexPattern};
use crate::invocation::{Demux, Incoming, Invocation, Outgoing};
use crate::protocol::{encode_preamble, Frame, FrameBuffer, Header};
use crate::writer::{spawn_writer_task, OutboundFrame};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Start an invocation of `instance.name` on a fresh byte stream.
///
/// `params` is the synchronous parameter encoding, sent on the root channel
/// when non-empty. `paths` lists the result positions that may carry pending
/// data. Pending parameters are written through the returned outgoing side.
pub async fn invoke<R, W>(
    rx: R,
    tx: W,
    instance: &str,
    name: &str,
    params: Bytes,
    paths: Vec<IndexPattern>,
    config: &Config,
) -> Result<Invocation>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let header = Header::new(instance, name);
    let (writer, _task) = spawn_writer_task(tx, &config.writer);
    writer
        .send(OutboundFrame::raw(encode_preamble(&header)?.freeze()))
        .await?;
    tracing::debug!(instance, name, "invocation started");

    let outgoing = Outgoing::new(Arc::new(writer));
    if !params.is_empty() {
        outgoing.index(Index::root())?.write(params).await?;
    }

    let buffer = FrameBuffer::new().max_frame_size(config.max_frame_size);
    let incoming = spawn_reader(rx, buffer, Vec::new(), paths, config);
    Ok(Invocation { outgoing, incoming })
}

/// A byte stream whose header has been read.
pub struct Accepted<R, W> {
    header: Header,
    rx: R,
    tx: W,
    buffer: FrameBuffer,
    /// Frames that arrived together with the header.
    early: Vec<Frame>,
    config: Config,
}

/// Read the version byte and header of an incoming invocation.
///
/// # Errors
///
/// `UnsupportedVersion` for an unknown version byte, `UnexpectedEof` if the
/// stream ends before the header is complete.
pub async fn accept<R, W>(mut rx: R, tx: W, config: &Config) -> Result<Accepted<R, W>>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut buffer = FrameBuffer::with_header().max_frame_size(config.max_frame_size);
    let mut early = Vec::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    let header = loop {
        if let Some(header) = buffer.take_header() {
            break header;
        }
        let n = rx.read(&mut buf).await?;
        if n == 0 {
            buffer.finish()?;
        }
        early.extend(buffer.push(&buf[..n])?);
    };
    tracing::debug!(instance = %header.instance, name = %header.name, "invocation accepted");

    Ok(Accepted {
        header,
        rx,
        tx,
        buffer,
        early,
        config: config.clone(),
    })
}

impl<R, W> Accepted<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Begin reading parameters and allow writing results.
    ///
    /// `paths` lists the parameter positions that may carry pending data.
    pub fn into_invocation(self, paths: Vec<IndexPattern>) -> (Header, Invocation) {
        let (writer, _task) = spawn_writer_task(self.tx, &self.config.writer);
        let outgoing = Outgoing::new(Arc::new(writer));
        let incoming = spawn_reader(self.rx, self.buffer, self.early, paths, &self.config);
        (self.header, Invocation { outgoing, incoming })
    }
}

fn spawn_reader<R>(
    rx: R,
    buffer: FrameBuffer,
    early: Vec<Frame>,
    paths: Vec<IndexPattern>,
    config: &Config,
) -> Incoming
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let demux = Arc::new(Demux::new(paths));
    let task = tokio::spawn(read_loop(rx, buffer, early, demux.clone()));
    Incoming::new(demux, config.channel_timeout, Some(task.abort_handle()))
}

/// Route every received frame until EOF, then close all channels.
///
/// A framing error fails every channel of this invocation only.
async fn read_loop<R>(rx: R, buffer: FrameBuffer, early: Vec<Frame>, demux: Arc<Demux>)
where
    R: AsyncRead + Unpin,
{
    match pump(rx, buffer, early, &demux).await {
        Ok(()) => demux.close_all(),
        Err(e) => {
            tracing::warn!(error = %e, "framed read loop failed");
            demux.fail(&e);
        }
    }
}

async fn pump<R>(mut rx: R, mut buffer: FrameBuffer, early: Vec<Frame>, demux: &Demux) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    for frame in early {
        demux.deliver(frame.path, frame.data)?;
    }

    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = rx.read(&mut buf).await?;
        if n == 0 {
            tracing::trace!("peer finished writing");
            return buffer.finish();
        }
        for frame in buffer.push(&buf[..n])? {
            tracing::trace!(path = %frame.path, len = frame.data.len(), "frame received");
            demux.deliver(frame.path, frame.data)?;
        }
    }
}
