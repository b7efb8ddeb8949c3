//! Server builder and accept loop.
//!
//! The [`ServerBuilder`] provides a fluent API for registering functions and
//! tuning limits. The [`Server`] then serves invocations:
//! 1. Accept a byte stream (one per invocation)
//! 2. Read the version byte and header
//! 3. Decode the parameters declared by the function's signature
//! 4. Run the handler; finish the results, or trap if it fails
//!
//! The same dispatch path is used by the NATS binding.
//!
//! # Example
//!
//! ```no_run
//! use wrpc_wire::server::Server;
//! use wrpc_wire::transport::tcp::TcpAcceptor;
//! use wrpc_wire::value::{Signature, Type, Value};
//!
//! # #[tokio::main]
//! # async fn main() -> wrpc_wire::Result<()> {
//! let server = Server::builder()
//!     .handle(
//!         "demo",
//!         "echo",
//!         Signature::new(vec![Type::String], vec![Type::String]),
//!         |params: Vec<Value>, cx| async move {
//!             cx.respond(&params).await?;
//!             Ok(())
//!         },
//!     )
//!     .max_concurrent_invocations(64)
//!     .build();
//!
//! server.serve(TcpAcceptor::bind("127.0.0.1:7761").await?).await
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::error::{Result, WireError};
use crate::handler::{Handler, HandlerRegistry, HandlerResult, InvocationContext, Registered};
use crate::invocation::{Invocation, Outgoing};
use crate::transport::{framed, Accept};
use crate::value::{Signature, Value};

/// Builder for configuring and creating a [`Server`].
pub struct ServerBuilder {
    registry: HandlerRegistry,
    config: Config,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            config: Config::default(),
        }
    }

    /// Register a function handler.
    ///
    /// The handler receives the decoded parameters and a context for
    /// responding.
    pub fn handle<F, Fut>(mut self, instance: &str, name: &str, signature: Signature, handler: F) -> Self
    where
        F: Fn(Vec<Value>, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.register(instance, name, signature, handler);
        self
    }

    /// Register a [`Handler`] implementation.
    pub fn handler(
        mut self,
        instance: &str,
        name: &str,
        signature: Signature,
        handler: impl Handler,
    ) -> Self {
        self.registry.register_handler(instance, name, signature, handler);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of invocations served at once.
    ///
    /// Further connections wait for a slot.
    /// Default: 256
    pub fn max_concurrent_invocations(mut self, limit: usize) -> Self {
        self.config.max_concurrent_invocations = limit;
        self
    }

    /// Set the largest frame accepted from callers.
    ///
    /// Default: 1 GiB
    pub fn max_frame_size(mut self, max: u32) -> Self {
        self.config.max_frame_size = max;
        self
    }

    /// Set how long a handler waits on a quiet parameter channel.
    ///
    /// Default: 60 seconds
    pub fn channel_timeout(mut self, timeout: Duration) -> Self {
        self.config.channel_timeout = timeout;
        self
    }

    /// Set the maximum pending frames for backpressure.
    ///
    /// Default: 1024
    pub fn max_pending_frames(mut self, limit: usize) -> Self {
        self.config.writer.max_pending_frames = limit;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.writer.channel_capacity = capacity;
        self
    }

    /// Set the backpressure timeout.
    ///
    /// Default: 5 seconds
    pub fn backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.config.writer.backpressure_timeout = timeout;
        self
    }

    pub fn build(self) -> Server {
        Server {
            semaphore: Arc::new(Semaphore::new(self.config.max_concurrent_invocations)),
            registry: Arc::new(self.registry),
            config: Arc::new(self.config),
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Serves registered functions. Cheap to clone.
#[derive(Clone)]
pub struct Server {
    registry: Arc<HandlerRegistry>,
    config: Arc<Config>,
    semaphore: Arc<Semaphore>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn semaphore(&self) -> &Arc<Semaphore> {
        &self.semaphore
    }

    /// Accept invocations until the acceptor fails.
    ///
    /// Each accepted stream is served on its own task; a failing invocation
    /// is logged and does not affect the others.
    pub async fn serve<A: Accept>(&self, acceptor: A) -> Result<()> {
        loop {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WireError::ConnectionClosed)?;
            let (rx, tx) = acceptor.accept().await?;
            tracing::trace!("connection accepted");

            let server = self.clone();
            tokio::spawn(async move {
                // Permit is held until this task completes
                let _permit = permit;
                if let Err(e) = server.serve_connection(rx, tx).await {
                    tracing::warn!(error = %e, "invocation failed");
                }
            });
        }
    }

    /// Serve the single invocation carried by one byte stream.
    pub async fn serve_connection<R, W>(&self, rx: R, tx: W) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let accepted = framed::accept(rx, tx, &self.config).await?;
        let header = accepted.header();
        let Some(entry) = self.registry.get(&header.instance, &header.name) else {
            let err = WireError::HandlerNotFound {
                instance: header.instance.clone(),
                name: header.name.clone(),
            };
            tracing::warn!(error = %err, "dropping invocation");
            // dropping the stream half-closes it without results
            return Err(err);
        };
        let (_, invocation) = accepted.into_invocation(entry.signature.param_paths());
        dispatch(&entry, invocation).await
    }
}

/// Decode parameters, run the handler and complete the result direction.
///
/// A decoding or handler failure traps, so the caller never waits on a
/// result that will not come.
pub(crate) async fn dispatch(entry: &Registered, invocation: Invocation) -> Result<()> {
    tracing::debug!(instance = %entry.instance, name = %entry.name, "dispatching");
    let decoded = match invocation.incoming.read_values(&entry.signature.params).await {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(instance = %entry.instance, name = %entry.name, error = %e, "failed to read parameters");
            trap(&invocation.outgoing).await;
            return Err(e);
        }
    };

    let cx = InvocationContext::new(
        &entry.instance,
        &entry.name,
        &entry.signature.results,
        decoded.deferred,
        invocation,
    );
    match entry.handler.call(decoded.values, cx.clone()).await {
        Ok(()) => cx.outgoing().finish().await,
        Err(e) => {
            tracing::warn!(instance = %entry.instance, name = %entry.name, error = %e, "handler failed");
            trap(cx.outgoing()).await;
            Err(e)
        }
    }
}

async fn trap(outgoing: &Outgoing) {
    if let Err(e) = outgoing.trap().await {
        tracing::warn!(error = %e, "failed to trap invocation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Type;

    #[test]
    fn test_builder_method_chaining() {
        let server = Server::builder()
            .handle("demo", "echo", Signature::default(), |_params, _cx| async { Ok(()) })
            .handle("demo", "[method]res.get", Signature::default(), |_params, _cx| async {
                Ok(())
            })
            .build();

        assert!(server.registry().get("demo", "echo").is_some());
        assert!(server.registry().get("demo", "res.get").is_some());
        assert_eq!(server.registry().len(), 2);
    }

    #[test]
    fn test_builder_configuration() {
        let server = Server::builder()
            .max_concurrent_invocations(8)
            .max_frame_size(4096)
            .channel_timeout(Duration::from_secs(2))
            .max_pending_frames(2048)
            .channel_capacity(512)
            .backpressure_timeout(Duration::from_secs(10))
            .build();

        let config = server.config();
        assert_eq!(config.max_concurrent_invocations, 8);
        assert_eq!(config.max_frame_size, 4096);
        assert_eq!(config.channel_timeout, Duration::from_secs(2));
        assert_eq!(config.writer.max_pending_frames, 2048);
        assert_eq!(config.writer.channel_capacity, 512);
        assert_eq!(config.writer.backpressure_timeout, Duration::from_secs(10));
        assert_eq!(server.semaphore().available_permits(), 8);
    }

    #[tokio::test]
    async fn test_serve_connection_echo() {
        let server = Server::builder()
            .handle(
                "demo",
                "echo",
                Signature::new(vec![Type::String], vec![Type::String]),
                |params, cx| async move {
                    cx.respond(&params).await?;
                    Ok(())
                },
            )
            .build();

        let (client, remote) = tokio::io::duplex(4096);
        let (srx, stx) = tokio::io::split(remote);
        let serving = tokio::spawn(async move { server.serve_connection(srx, stx).await });

        let (crx, ctx) = tokio::io::split(client);
        let params = crate::value::encode_values(&[Type::String], &[Value::String("hi".into())])
            .unwrap()
            .bytes;
        let invocation = framed::invoke(crx, ctx, "demo", "echo", params, Vec::new(), &Config::default())
            .await
            .unwrap();
        drop(invocation.outgoing);

        let results = invocation.incoming.read_values(&[Type::String]).await.unwrap();
        assert_eq!(results.values, vec![Value::String("hi".into())]);
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unknown_function_drops_stream() {
        let server = Server::builder().build();
        let (client, remote) = tokio::io::duplex(4096);
        let (srx, stx) = tokio::io::split(remote);
        let serving = tokio::spawn(async move { server.serve_connection(srx, stx).await });

        let (crx, ctx) = tokio::io::split(client);
        let invocation = framed::invoke(crx, ctx, "demo", "missing", bytes::Bytes::new(), Vec::new(), &Config::default())
            .await
            .unwrap();

        assert!(matches!(
            serving.await.unwrap(),
            Err(WireError::HandlerNotFound { .. })
        ));
        assert!(matches!(
            invocation.incoming.read_values(&[Type::U8]).await,
            Err(WireError::AbnormalClose(_))
        ));
    }

    #[tokio::test]
    async fn test_handler_error_traps() {
        let server = Server::builder()
            .handle(
                "demo",
                "numbers",
                Signature::new(vec![], vec![Type::Stream(Box::new(Type::U32))]),
                |_params, cx| async move {
                    let pending = cx.respond(&[Value::Stream(None)]).await?;
                    let mut stream = cx.stream(&pending[0])?;
                    stream.send(&[Value::U32(7)]).await?;
                    Err(WireError::Transport("backend unavailable".into()))
                },
            )
            .build();

        let (client, remote) = tokio::io::duplex(4096);
        let (srx, stx) = tokio::io::split(remote);
        let serving = tokio::spawn(async move { server.serve_connection(srx, stx).await });

        let results = [Type::Stream(Box::new(Type::U32))];
        let (crx, ctx) = tokio::io::split(client);
        let invocation = framed::invoke(
            crx,
            ctx,
            "demo",
            "numbers",
            bytes::Bytes::new(),
            crate::value::async_paths(&results),
            &Config::default(),
        )
        .await
        .unwrap();
        drop(invocation.outgoing);

        let decoded = invocation.incoming.read_values(&results).await.unwrap();
        let mut stream = invocation.incoming.stream(&decoded.deferred[0]).unwrap();
        assert_eq!(stream.next().await.unwrap(), Some(vec![Value::U32(7)]));
        assert!(matches!(stream.next().await, Err(WireError::AbnormalClose(_))));
        assert!(serving.await.unwrap().is_err());
    }
}
