//! TCP binding: one connection per invocation.

use std::net::SocketAddr;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use super::{Accept, Connect};
use crate::error::Result;

/// Connects to a fixed TCP address.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    /// `addr` is anything `TcpStream::connect` resolves, e.g. `"127.0.0.1:7761"`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Connect for TcpConnector {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn connect(&self) -> Result<(OwnedReadHalf, OwnedWriteHalf)> {
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        tracing::trace!(addr = %self.addr, "tcp connected");
        Ok(stream.into_split())
    }
}

/// TCP listener handing out one connection per invocation.
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Connector for this listener's bound address.
    pub fn connector(&self) -> Result<TcpConnector> {
        Ok(TcpConnector::new(self.local_addr()?.to_string()))
    }
}

impl Accept for TcpAcceptor {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn accept(&self) -> Result<(OwnedReadHalf, OwnedWriteHalf)> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        tracing::trace!(%peer, "tcp accepted");
        Ok(stream.into_split())
    }
}
