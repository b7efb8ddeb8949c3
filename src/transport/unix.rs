//! Unix domain socket binding: one connection per invocation.
//!
//! # Example
//!
//! ```ignore
//! use wrpc_wire::transport::unix::{generate_socket_path, UnixAcceptor};
//!
//! let path = generate_socket_path();
//! let acceptor = UnixAcceptor::bind(&path)?;
//! let connector = acceptor.connector();
//! ```

use std::path::{Path, PathBuf};

use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};

use super::{Accept, Connect};
use crate::error::Result;

/// Generate a unique socket path for this process.
///
/// Format: `{tmp}/wrpc-{pid}-{uuid}.sock`
pub fn generate_socket_path() -> PathBuf {
    std::env::temp_dir().join(format!(
        "wrpc-{}-{}.sock",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ))
}

/// Connects to a fixed socket path.
#[derive(Debug, Clone)]
pub struct UnixConnector {
    path: PathBuf,
}

impl UnixConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Connect for UnixConnector {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn connect(&self) -> Result<(OwnedReadHalf, OwnedWriteHalf)> {
        let stream = UnixStream::connect(&self.path).await?;
        Ok(stream.into_split())
    }
}

/// Unix socket listener. Removes its socket file on drop.
pub struct UnixAcceptor {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixAcceptor {
    /// Bind to a socket path.
    ///
    /// Removes any existing socket file at the path before binding.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connector(&self) -> UnixConnector {
        UnixConnector::new(self.path.clone())
    }
}

impl Accept for UnixAcceptor {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn accept(&self) -> Result<(OwnedReadHalf, OwnedWriteHalf)> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(stream.into_split())
    }
}

impl Drop for UnixAcceptor {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
