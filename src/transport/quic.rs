//! QUIC binding: one bidirectional stream per invocation on a shared
//! connection.
//!
//! Endpoint setup (certificates, server names) is left to the application;
//! both sides start from an established [`quinn::Connection`].

use quinn::{Connection, RecvStream, SendStream};

use super::{Accept, Connect};
use crate::error::{Result, WireError};

fn transport_error(e: quinn::ConnectionError) -> WireError {
    WireError::Transport(e.to_string())
}

/// Opens a bidirectional stream for each invocation.
#[derive(Debug, Clone)]
pub struct QuicConnector(Connection);

impl From<Connection> for QuicConnector {
    fn from(conn: Connection) -> Self {
        Self(conn)
    }
}

impl Connect for QuicConnector {
    type Reader = RecvStream;
    type Writer = SendStream;

    async fn connect(&self) -> Result<(RecvStream, SendStream)> {
        let (tx, rx) = self.0.open_bi().await.map_err(transport_error)?;
        tracing::trace!(stream = %tx.id(), "quic stream opened");
        Ok((rx, tx))
    }
}

/// Accepts bidirectional streams opened by the peer.
#[derive(Debug, Clone)]
pub struct QuicAcceptor(Connection);

impl From<Connection> for QuicAcceptor {
    fn from(conn: Connection) -> Self {
        Self(conn)
    }
}

impl Accept for QuicAcceptor {
    type Reader = RecvStream;
    type Writer = SendStream;

    async fn accept(&self) -> Result<(RecvStream, SendStream)> {
        let (tx, rx) = self.0.accept_bi().await.map_err(transport_error)?;
        tracing::trace!(stream = %tx.id(), "quic stream accepted");
        Ok((rx, tx))
    }
}
