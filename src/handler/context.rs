//! Invocation context for handlers.
//!
//! Provides methods for answering an invocation:
//! - `respond` - encode the results on the root channel
//! - `stream` / `write_future` - fulfil pending result positions
//! - `param_future` / `param_stream` - read pending parameters
//! - `trap` - abort, closing every open result channel
//!
//! # Example
//!
//! ```ignore
//! async fn count(params: Vec<Value>, cx: InvocationContext) -> Result<()> {
//!     let pending = cx.respond(&[Value::Stream(None)]).await?;
//!     let mut stream = cx.stream(&pending[0])?;
//!     stream.send(&[Value::U32(1), Value::U32(2)]).await?;
//!     stream.end().await
//! }
//! ```

use std::sync::Arc;

use crate::error::Result;
use crate::invocation::{
    write_future, FutureReader, Incoming, Invocation, Outgoing, StreamReader, StreamWriter,
};
use crate::value::{AsyncPosition, Type, Value};

/// Context passed to handlers.
///
/// `InvocationContext` is `Clone`, so a handler may fulfil several pending
/// results from separate tasks. The server finishes the result direction once
/// the handler returns, so every spawned writer must be awaited first.
#[derive(Clone)]
pub struct InvocationContext {
    instance: Arc<str>,
    name: Arc<str>,
    results: Arc<[Type]>,
    deferred: Arc<[AsyncPosition]>,
    outgoing: Outgoing,
    incoming: Arc<Incoming>,
}

impl InvocationContext {
    pub(crate) fn new(
        instance: &str,
        name: &str,
        results: &[Type],
        deferred: Vec<AsyncPosition>,
        invocation: Invocation,
    ) -> Self {
        Self {
            instance: instance.into(),
            name: name.into(),
            results: results.into(),
            deferred: deferred.into(),
            outgoing: invocation.outgoing,
            incoming: Arc::new(invocation.incoming),
        }
    }

    #[inline]
    pub fn instance(&self) -> &str {
        &self.instance
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter positions still pending after decoding.
    pub fn deferred_params(&self) -> &[AsyncPosition] {
        &self.deferred
    }

    /// Encode the results on the root channel.
    ///
    /// Returns the positions left pending, to be fulfilled with
    /// [`stream`](Self::stream) and [`write_future`](Self::write_future).
    pub async fn respond(&self, values: &[Value]) -> Result<Vec<AsyncPosition>> {
        tracing::trace!(instance = %self.instance, name = %self.name, "responding");
        self.outgoing.write_values(&self.results, values).await
    }

    /// Writer for a pending result stream.
    pub fn stream(&self, position: &AsyncPosition) -> Result<StreamWriter> {
        StreamWriter::new(&self.outgoing, position)
    }

    /// Deliver a pending result future.
    pub async fn write_future(
        &self,
        position: &AsyncPosition,
        value: &Value,
    ) -> Result<Vec<AsyncPosition>> {
        write_future(&self.outgoing, position, value).await
    }

    /// Reader for a pending parameter future.
    pub fn param_future(&self, position: &AsyncPosition) -> Result<FutureReader> {
        self.incoming.future(position)
    }

    /// Reader for a pending parameter stream.
    pub fn param_stream(&self, position: &AsyncPosition) -> Result<StreamReader> {
        self.incoming.stream(position)
    }

    /// Abort the invocation. The caller observes abnormal closes.
    pub async fn trap(&self) -> Result<()> {
        self.outgoing.trap().await
    }

    /// Raw access to the result channels.
    pub fn outgoing(&self) -> &Outgoing {
        &self.outgoing
    }

    /// Raw access to the parameter channels.
    pub fn incoming(&self) -> &Incoming {
        &self.incoming
    }
}
