//! Handler registry for dispatching invocations by `(instance, name)`.
//!
//! Each function is registered with its [`Signature`] so the server can
//! decode parameters before the handler runs and the context can encode
//! results.
//!
//! # Example
//!
//! ```
//! use wrpc_wire::handler::HandlerRegistry;
//! use wrpc_wire::value::{Signature, Type, Value};
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register(
//!     "wasi:keyvalue/store",
//!     "[method]bucket.get",
//!     Signature::new(vec![Type::String], vec![Type::Option(Box::new(Type::String))]),
//!     |params: Vec<Value>, cx| async move {
//!         let _key = &params[0];
//!         cx.respond(&[Value::Option(None)]).await?;
//!         Ok(())
//!     },
//! );
//!
//! assert!(registry.get("wasi:keyvalue/store", "bucket.get").is_some());
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use super::InvocationContext;
use crate::error::Result;
use crate::invocation::BoxFuture;
use crate::value::{Signature, Value};

/// Result type for handler functions.
pub type HandlerResult = Result<()>;

/// Trait for handler functions.
///
/// A handler receives the decoded synchronous parameters. Pending parameter
/// positions are available from the context. Returning an error traps the
/// invocation.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, params: Vec<Value>, cx: InvocationContext) -> BoxFuture<'static, HandlerResult>;
}

/// Adapter turning an async closure into a [`Handler`].
pub struct FnHandler<F, Fut>
where
    F: Fn(Vec<Value>, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(Vec<Value>, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Handler for FnHandler<F, Fut>
where
    F: Fn(Vec<Value>, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, params: Vec<Value>, cx: InvocationContext) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.handler)(params, cx))
    }
}

/// Name a function is invoked by on the wire.
///
/// Resource functions carry a kind prefix in interface definitions
/// (`[constructor]`, `[method]`, `[static]`) that is not transmitted.
pub fn rpc_func_name(name: &str) -> &str {
    ["[constructor]", "[static]", "[method]"]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

/// A registered function.
pub struct Registered {
    pub instance: String,
    pub name: String,
    pub signature: Signature,
    pub(crate) handler: Box<dyn Handler>,
}

/// Registry mapping `(instance, name)` to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    functions: HashMap<(String, String), Arc<Registered>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async closure. A later registration of the same function
    /// replaces the earlier one.
    pub fn register<F, Fut>(&mut self, instance: &str, name: &str, signature: Signature, handler: F)
    where
        F: Fn(Vec<Value>, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register_handler(instance, name, signature, FnHandler::new(handler));
    }

    pub fn register_handler(
        &mut self,
        instance: &str,
        name: &str,
        signature: Signature,
        handler: impl Handler,
    ) {
        let name = rpc_func_name(name);
        let entry = Registered {
            instance: instance.to_string(),
            name: name.to_string(),
            signature,
            handler: Box::new(handler),
        };
        if self
            .functions
            .insert((instance.to_string(), name.to_string()), Arc::new(entry))
            .is_some()
        {
            tracing::warn!(instance, name, "handler replaced");
        }
    }

    /// Look up a function by the name it is invoked with.
    pub fn get(&self, instance: &str, name: &str) -> Option<Arc<Registered>> {
        self.functions
            .get(&(instance.to_string(), rpc_func_name(name).to_string()))
            .cloned()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Arc<Registered>> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
