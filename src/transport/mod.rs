//! Transport module - byte streams carrying framed invocations.
//!
//! Every framed binding opens one bidirectional byte stream per invocation:
//! - TCP connections
//! - Unix domain sockets
//! - QUIC bidirectional streams (feature `quic`)
//!
//! [`Connect`] produces streams for callers, [`Accept`] yields them to a
//! server. The wire handling on top is shared, see [`framed`].

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

pub mod framed;
pub mod tcp;

#[cfg(unix)]
pub mod unix;

#[cfg(feature = "quic")]
pub mod quic;

pub use framed::Accepted;

/// Opens a fresh byte stream for each invocation.
pub trait Connect: Send + Sync + 'static {
    type Reader: AsyncRead + Unpin + Send + 'static;
    type Writer: AsyncWrite + Unpin + Send + 'static;

    fn connect(&self) -> impl Future<Output = Result<(Self::Reader, Self::Writer)>> + Send;
}

/// Yields the byte stream of each incoming invocation.
pub trait Accept: Send + Sync + 'static {
    type Reader: AsyncRead + Unpin + Send + 'static;
    type Writer: AsyncWrite + Unpin + Send + 'static;

    fn accept(&self) -> impl Future<Output = Result<(Self::Reader, Self::Writer)>> + Send;
}
