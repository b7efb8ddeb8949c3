//! Handler module - invocation handling and dispatch.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps `(instance, name)` to handlers
//! - [`InvocationContext`] - allows handlers to respond, stream, trap
//!
//! # Example
//!
//! ```
//! use wrpc_wire::handler::HandlerRegistry;
//! use wrpc_wire::value::{Signature, Type, Value};
//!
//! let mut registry = HandlerRegistry::new();
//!
//! // Unary function
//! registry.register(
//!     "demo",
//!     "echo",
//!     Signature::new(vec![Type::String], vec![Type::String]),
//!     |params: Vec<Value>, cx| async move {
//!         cx.respond(&params).await?;
//!         Ok(())
//!     },
//! );
//!
//! // Streaming function
//! registry.register(
//!     "demo",
//!     "count",
//!     Signature::new(vec![Type::U32], vec![Type::Stream(Box::new(Type::U32))]),
//!     |params: Vec<Value>, cx| async move {
//!         let Value::U32(n) = params[0] else { return Ok(()) };
//!         let pending = cx.respond(&[Value::Stream(None)]).await?;
//!         let mut stream = cx.stream(&pending[0])?;
//!         for i in 0..n {
//!             stream.send(&[Value::U32(i)]).await?;
//!         }
//!         stream.end().await
//!     },
//! );
//! ```

mod context;
mod registry;

pub use context::InvocationContext;
pub use registry::{rpc_func_name, FnHandler, Handler, HandlerRegistry, HandlerResult, Registered};
