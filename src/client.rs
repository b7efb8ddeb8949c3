//! Invoking functions over a framed transport.
//!
//! [`Client`] opens one byte stream per invocation through a
//! [`Connect`] implementation:
//! - [`Client::invoke`] - raw parameter bytes in, an [`Invocation`] out
//! - [`Client::call`] - values in, decoded results out
//!
//! # Example
//!
//! ```no_run
//! use wrpc_wire::client::Client;
//! use wrpc_wire::transport::tcp::TcpConnector;
//! use wrpc_wire::value::{Signature, Type, Value};
//!
//! # #[tokio::main]
//! # async fn main() -> wrpc_wire::Result<()> {
//! let client = Client::new(TcpConnector::new("127.0.0.1:7761"));
//! let signature = Signature::new(vec![Type::String], vec![Type::String]);
//!
//! let response = client
//!     .call("demo", "echo", &signature, &[Value::String("hello".into())])
//!     .await?;
//! assert_eq!(response.values, vec![Value::String("hello".into())]);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use bytes::Bytes;

use crate::config::Config;
use crate::error::{Result, WireError};
use crate::handler::rpc_func_name;
use crate::index::IndexPattern;
use crate::invocation::{FutureReader, Incoming, Invocation, StreamReader};
use crate::transport::{framed, Connect};
use crate::value::{encode_values, AsyncPosition, Signature, Value};

/// Results of a completed [`call`](Client::call).
pub struct Response {
    pub values: Vec<Value>,
    /// Result positions still pending.
    pub deferred: Vec<AsyncPosition>,
    pub incoming: Incoming,
}

impl Response {
    /// Reader for a pending result future.
    pub fn future(&self, position: &AsyncPosition) -> Result<FutureReader> {
        self.incoming.future(position)
    }

    /// Reader for a pending result stream.
    pub fn stream(&self, position: &AsyncPosition) -> Result<StreamReader> {
        self.incoming.stream(position)
    }
}

/// Encode fully-ready parameters.
///
/// Pending futures and streams need their own writers, which only
/// `invoke` hands out.
pub(crate) fn encode_params(signature: &Signature, params: &[Value]) -> Result<Bytes> {
    let encoded = encode_values(&signature.params, params)?;
    if let Some(position) = encoded.deferred.first() {
        return Err(WireError::TypeMismatch(format!(
            "pending parameter at {} requires invoke",
            position.index
        )));
    }
    Ok(encoded.bytes)
}

/// Finish the parameter direction and decode the results.
pub(crate) async fn complete(invocation: Invocation, signature: &Signature) -> Result<Response> {
    let Invocation { outgoing, incoming } = invocation;
    outgoing.finish().await?;
    drop(outgoing);

    let decoded = incoming.read_values(&signature.results).await?;
    Ok(Response {
        values: decoded.values,
        deferred: decoded.deferred,
        incoming,
    })
}

/// Invokes functions through a framed transport.
pub struct Client<C> {
    connector: C,
    config: Config,
}

impl<C: Connect> Client<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            config: Config::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the largest frame accepted from servers.
    pub fn max_frame_size(mut self, max: u32) -> Self {
        self.config.max_frame_size = max;
        self
    }

    /// Set how long a reader waits on a quiet result channel.
    pub fn channel_timeout(mut self, timeout: Duration) -> Self {
        self.config.channel_timeout = timeout;
        self
    }

    /// Set the backpressure timeout for parameter writes.
    pub fn backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.config.writer.backpressure_timeout = timeout;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Start an invocation on a fresh stream.
    ///
    /// `params` is the synchronous encoding of the parameters; `paths` lists
    /// the result positions that may carry pending data. The returned
    /// outgoing side must be finished (or dropped) once pending parameters
    /// are written.
    pub async fn invoke(
        &self,
        instance: &str,
        name: &str,
        params: Bytes,
        paths: Vec<IndexPattern>,
    ) -> Result<Invocation> {
        let (rx, tx) = self.connector.connect().await?;
        framed::invoke(rx, tx, instance, rpc_func_name(name), params, paths, &self.config).await
    }

    /// Invoke with fully-ready parameters and decode the results.
    pub async fn call(
        &self,
        instance: &str,
        name: &str,
        signature: &Signature,
        params: &[Value],
    ) -> Result<Response> {
        let params = encode_params(signature, params)?;
        let invocation = self
            .invoke(instance, name, params, signature.result_paths())
            .await?;
        complete(invocation, signature).await
    }
}
